// Scripted engine for transport tests. Records every call, can park loads
// until the test releases them, and can be told to fail.

use super::engine::{AudioEngine, EngineError, EngineStatus};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

pub const MOCK_DURATION_MILLIS: u64 = 180_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Load(PathBuf),
    Play(u64),
    Pause(u64),
    Seek(u64, u64),
    Unload(u64),
    Status(u64),
}

#[derive(Debug, Clone, Copy)]
struct MockSound {
    position_millis: u64,
    playing: bool,
}

pub struct MockEngine {
    calls: Mutex<Vec<Call>>,
    sounds: Mutex<BTreeMap<u64, MockSound>>,
    failing: Mutex<HashSet<PathBuf>>,
    next_id: AtomicU64,
    hold_loads: AtomicBool,
    load_gate: Semaphore,
    fail_next_play: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            sounds: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
            hold_loads: AtomicBool::new(false),
            load_gate: Semaphore::new(0),
            fail_next_play: AtomicBool::new(false),
        }
    }

    /// Park every following load until `release_loads` hands out a permit.
    pub fn hold_loads(&self) {
        self.hold_loads.store(true, Ordering::SeqCst);
    }

    pub fn release_loads(&self, count: usize) {
        self.load_gate.add_permits(count);
    }

    pub fn fail_resource(&self, resource: PathBuf) {
        self.failing.lock().unwrap().insert(resource);
    }

    pub fn heal_resource(&self, resource: &Path) {
        self.failing.lock().unwrap().remove(resource);
    }

    pub fn fail_next_play(&self) {
        self.fail_next_play.store(true, Ordering::SeqCst);
    }

    /// Move every playing sound forward.
    pub fn advance(&self, millis: u64) {
        for sound in self.sounds.lock().unwrap().values_mut().filter(|s| s.playing) {
            sound.position_millis = (sound.position_millis + millis).min(MOCK_DURATION_MILLIS);
        }
    }

    /// Run every sound to its end, as if the tracks finished.
    pub fn finish_all(&self) {
        for sound in self.sounds.lock().unwrap().values_mut() {
            sound.position_millis = MOCK_DURATION_MILLIS;
            sound.playing = false;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn loaded_resources(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Load(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn unloaded(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Unload(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn status_calls(&self) -> usize {
        self.calls().iter().filter(|call| matches!(call, Call::Status(_))).count()
    }

    pub fn live_handles(&self) -> Vec<u64> {
        self.sounds.lock().unwrap().keys().copied().collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn with_sound<T>(&self, id: u64, f: impl FnOnce(&mut MockSound) -> T) -> Result<T, EngineError> {
        self.sounds
            .lock()
            .unwrap()
            .get_mut(&id)
            .map(f)
            .ok_or(EngineError::UnknownHandle)
    }
}

#[async_trait]
impl AudioEngine for MockEngine {
    type Handle = u64;

    async fn load(&self, resource: &Path) -> Result<u64, EngineError> {
        self.record(Call::Load(resource.to_path_buf()));

        if self.hold_loads.load(Ordering::SeqCst) {
            let permit = self
                .load_gate
                .acquire()
                .await
                .map_err(|err| EngineError::Transient(err.to_string()))?;
            permit.forget();
        }

        if self.failing.lock().unwrap().contains(resource) {
            return Err(EngineError::resource_load(resource, "missing asset"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sounds.lock().unwrap().insert(
            id,
            MockSound {
                position_millis: 0,
                playing: false,
            },
        );
        Ok(id)
    }

    async fn play(&self, handle: &u64) -> Result<(), EngineError> {
        self.record(Call::Play(*handle));
        if self.fail_next_play.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Transient("output device busy".to_string()));
        }
        self.with_sound(*handle, |sound| sound.playing = true)
    }

    async fn pause(&self, handle: &u64) -> Result<(), EngineError> {
        self.record(Call::Pause(*handle));
        self.with_sound(*handle, |sound| sound.playing = false)
    }

    async fn seek_to(&self, handle: &u64, millis: u64) -> Result<(), EngineError> {
        self.record(Call::Seek(*handle, millis));
        self.with_sound(*handle, |sound| sound.position_millis = millis)
    }

    async fn unload(&self, handle: &u64) -> Result<(), EngineError> {
        self.record(Call::Unload(*handle));
        self.sounds
            .lock()
            .unwrap()
            .remove(handle)
            .map(|_| ())
            .ok_or(EngineError::UnknownHandle)
    }

    async fn status(&self, handle: &u64) -> Result<EngineStatus, EngineError> {
        self.record(Call::Status(*handle));
        self.with_sound(*handle, |sound| EngineStatus {
            position_millis: sound.position_millis,
            duration_millis: Some(MOCK_DURATION_MILLIS),
            is_playing: sound.playing,
        })
    }
}
