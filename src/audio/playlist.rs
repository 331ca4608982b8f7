use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use super::track::Track;

#[derive(Debug, Error, PartialEq)]
pub enum PlaylistError {
    #[error("a playlist needs at least one track")]
    Empty,
    #[error("track id '{0}' appears more than once")]
    DuplicateId(String),
}

/// Fixed, ordered sequence of tracks known at startup.
///
/// The playlist is never empty, so every index produced by
/// [`Playlist::next_index`] and [`Playlist::previous_index`] is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Result<Self, PlaylistError> {
        if tracks.is_empty() {
            return Err(PlaylistError::Empty);
        }

        let mut seen = HashSet::new();
        for track in &tracks {
            if !seen.insert(track.id.as_str()) {
                return Err(PlaylistError::DuplicateId(track.id.clone()));
            }
        }

        Ok(Self { tracks })
    }

    /// The two Bensound tracks the player ships with.
    pub fn builtin(asset_dir: &Path) -> Self {
        let tracks = vec![
            Track::new(
                "1",
                "Longing",
                "Bensound",
                "bensound-longing.mp3",
                "https://images.pexels.com/photos/3016757/pexels-photo-3016757.jpeg",
            ),
            Track::new(
                "2",
                "Acoustic Breeze",
                "Bensound",
                "bensound-pulseoftime.mp3",
                "https://images.pexels.com/photos/1626481/pexels-photo-1626481.jpeg",
            ),
        ];

        Self { tracks }.with_asset_dir(asset_dir)
    }

    /// Resolve relative audio paths against `asset_dir` and log anything that
    /// will not be loadable. Missing files are kept: the engine reports the
    /// failure when the user actually tries to play them.
    pub fn with_asset_dir(self, asset_dir: &Path) -> Self {
        let tracks: Vec<Track> = self
            .tracks
            .into_iter()
            .map(|track| track.resolved_against(asset_dir))
            .collect();

        for track in tracks.iter().filter(|t| !t.is_playable()) {
            warn!("Track '{}' is not playable from {}", track.id, track.audio.display());
        }
        info!("Playlist ready with {} tracks", tracks.len());

        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < self.tracks.len()
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.len()
    }

    pub fn previous_index(&self, index: usize) -> usize {
        (index + self.len() - 1) % self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist_of(count: usize) -> Playlist {
        let tracks = (0..count)
            .map(|i| Track::new(format!("t{i}"), format!("Song {i}"), "Artist", format!("{i}.mp3"), ""))
            .collect();
        Playlist::new(tracks).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert_eq!(Playlist::new(Vec::new()), Err(PlaylistError::Empty));

        let dup = vec![
            Track::new("a", "One", "X", "1.mp3", ""),
            Track::new("a", "Two", "X", "2.mp3", ""),
        ];
        assert_eq!(Playlist::new(dup), Err(PlaylistError::DuplicateId("a".to_string())));
    }

    #[test]
    fn test_next_cycles_back_to_start() {
        for count in 1..=6 {
            let playlist = playlist_of(count);
            for start in 0..count {
                let mut index = start;
                for _ in 0..count {
                    index = playlist.next_index(index);
                    assert!(playlist.contains_index(index));
                }
                assert_eq!(index, start, "count={count} start={start}");
            }
        }
    }

    #[test]
    fn test_previous_and_next_are_inverse() {
        let playlist = playlist_of(4);
        for index in 0..4 {
            assert_eq!(playlist.next_index(playlist.previous_index(index)), index);
            assert_eq!(playlist.previous_index(playlist.next_index(index)), index);
        }
        assert_eq!(playlist.previous_index(0), 3);
    }

    #[test]
    fn test_builtin_resolves_assets() {
        let playlist = Playlist::builtin(Path::new("/srv/assets"));
        assert_eq!(playlist.len(), 2);
        let first = playlist.get(0).unwrap();
        assert_eq!(first.title, "Longing");
        assert_eq!(first.audio, Path::new("/srv/assets/bensound-longing.mp3"));
        assert_eq!(playlist.get(1).unwrap().title, "Acoustic Breeze");
    }
}
