// The seam between the transport controller and whatever actually makes noise.
// The controller only ever talks to this trait; rodio lives behind it in
// production and a scripted mock in tests.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("could not load '{}': {reason}", resource.display())]
    ResourceLoad { resource: PathBuf, reason: String },
    #[error("audio engine unavailable: {0}")]
    Transient(String),
    #[error("handle is no longer loaded")]
    UnknownHandle,
}

impl EngineError {
    pub fn resource_load(resource: &Path, reason: impl fmt::Display) -> Self {
        EngineError::ResourceLoad {
            resource: resource.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// What a live handle reports when polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatus {
    pub position_millis: u64,
    /// `None` until the decoder knows how long the track is.
    pub duration_millis: Option<u64>,
    pub is_playing: bool,
}

#[async_trait]
pub trait AudioEngine: Send + Sync + 'static {
    /// Opaque token for one loaded track.
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Load `resource` in a paused state.
    async fn load(&self, resource: &Path) -> Result<Self::Handle, EngineError>;

    async fn play(&self, handle: &Self::Handle) -> Result<(), EngineError>;

    async fn pause(&self, handle: &Self::Handle) -> Result<(), EngineError>;

    async fn seek_to(&self, handle: &Self::Handle, millis: u64) -> Result<(), EngineError>;

    /// Release the handle. The handle must not be used afterwards.
    async fn unload(&self, handle: &Self::Handle) -> Result<(), EngineError>;

    async fn status(&self, handle: &Self::Handle) -> Result<EngineStatus, EngineError>;
}
