// Configuration for Hassanfy
// Read-only: a missing file just means defaults, nothing is ever written back

use crate::audio::{AudioConfig, Playlist, Track};
use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub asset_dir: PathBuf,
    pub log_dir: PathBuf,
    pub audio: AudioConfig,
    pub ui: UiConfig,
    /// Replaces the built-in playlist when present.
    pub tracks: Option<Vec<Track>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub tick_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            log_dir: PathBuf::from("logs"),
            audio: AudioConfig::default(),
            ui: UiConfig::default(),
            tracks: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Hassanfy".to_string(),
            tick_rate_ms: 250,
        }
    }
}

impl UiConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(1))
    }
}

impl Config {
    /// Load from `path`, or from the per-user config file when no path is
    /// given. An explicit path must exist; the default one may not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let default_path = Self::config_path()?;
                if default_path.exists() {
                    Self::load_from(&default_path)
                } else {
                    debug!("No config at {}, using defaults", default_path.display());
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// The playlist this config describes, audio paths resolved.
    pub fn playlist(&self) -> Result<Playlist> {
        match &self.tracks {
            Some(tracks) => Ok(Playlist::new(tracks.clone())?.with_asset_dir(&self.asset_dir)),
            None => Ok(Playlist::builtin(&self.asset_dir)),
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("hassanfy");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[audio]\npoll_interval_ms = 500\n\n[ui]\ntitle = \"Jukebox\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.audio.poll_interval_ms, 500);
        assert_eq!(config.audio.volume, AudioConfig::default().volume);
        assert_eq!(config.ui.title, "Jukebox");
        assert_eq!(config.ui.tick_rate_ms, 250);
        assert_eq!(config.asset_dir, PathBuf::from("assets"));
    }

    #[test]
    fn test_tracks_override_builtin_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
asset_dir = "/srv/music"

[[tracks]]
id = "a"
title = "Intro"
artist = "Someone"
audio = "intro.ogg"
artwork_uri = "https://example.com/a.jpg"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        let playlist = config.playlist().unwrap();
        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.get(0).unwrap().audio, PathBuf::from("/srv/music/intro.ogg"));
    }

    #[test]
    fn test_empty_track_list_is_rejected() {
        let config = Config {
            tracks: Some(Vec::new()),
            ..Config::default()
        };
        assert!(config.playlist().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_default_playlist_is_builtin() {
        let playlist = Config::default().playlist().unwrap();
        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.get(0).unwrap().audio, PathBuf::from("assets/bensound-longing.mp3"));
    }
}
