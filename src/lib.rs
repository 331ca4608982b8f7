// Hassanfy Library - one-screen music player
// The transport controller is the heart; the UI and rodio sit behind features

pub mod audio;  // playlist, engine seam, transport controller
pub mod config; // settings and the playlist override
#[cfg(feature = "tui")]
pub mod ui;     // terminal interface

// Export the stuff other modules actually use
pub use audio::{AudioEngine, Intent, PlaybackState, Playlist, Track, TransportController};
pub use config::Config;
