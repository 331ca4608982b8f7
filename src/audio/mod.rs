// Audio side of Hassanfy - the playlist, the engine seam and the transport
// controller that keeps the two in step.

pub mod engine;
pub mod playlist;
#[cfg(feature = "audio")]
pub mod rodio_engine;
pub mod track;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use engine::{AudioEngine, EngineError, EngineStatus};
pub use playlist::{Playlist, PlaylistError};
#[cfg(feature = "audio")]
pub use rodio_engine::RodioEngine;
pub use track::Track;
pub use transport::{Intent, PlaybackState, TransportController, TransportError, TransportPhase};

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub volume: f32, // 0.0 to 1.0
    pub poll_interval_ms: u64, // how often a live handle is asked for its status
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: 0.7,
            poll_interval_ms: 1000,
        }
    }
}

impl AudioConfig {
    pub fn poll_interval(&self) -> Duration {
        // a zero period would make tokio's interval panic
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn clamped_volume(&self) -> f32 {
        self.volume.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" | "oga" => AudioFormat::Ogg,
            "mp4" | "m4a" | "aac" => AudioFormat::Mp4,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AudioFormat::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("MP3"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_extension("m4a"), AudioFormat::Mp4);
        assert_eq!(AudioFormat::from_extension("oga"), AudioFormat::Ogg);
        assert!(!AudioFormat::from_extension("txt").is_supported());
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = AudioConfig { volume: 2.0, poll_interval_ms: 0 };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.clamped_volume(), 1.0);
    }
}
