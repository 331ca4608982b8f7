use super::AudioFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One entry of the playlist. Tracks never change once the playlist is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub audio: PathBuf,
    pub artwork_uri: String,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio: impl Into<PathBuf>,
        artwork_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            audio: audio.into(),
            artwork_uri: artwork_uri.into(),
        }
    }

    /// Relative audio paths are taken to live under `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        if self.audio.is_relative() {
            self.audio = base.join(&self.audio);
        }
        self
    }

    pub fn format(&self) -> AudioFormat {
        self.audio
            .extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }

    pub fn display_title(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.clone();
        }
        self.audio
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("Unknown")
            .to_string()
    }

    pub fn display_artist(&self) -> String {
        if self.artist.trim().is_empty() {
            "Unknown Artist".to_string()
        } else {
            self.artist.clone()
        }
    }

    pub fn is_playable(&self) -> bool {
        self.format().is_supported() && self.audio.exists()
    }
}
