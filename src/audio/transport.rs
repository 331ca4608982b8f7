// Transport controller - the one place playback state changes.
//
// Every operation that touches the engine runs while holding the slot mutex,
// so unload -> load -> play sequences never interleave. Index changes happen
// up front (the carousel must move immediately) and bump a generation counter;
// anything that was queued or in flight for an older generation drops itself.

use super::engine::{AudioEngine, EngineError, EngineStatus};
use super::playlist::Playlist;
use super::track::Track;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of the single audio handle slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    Empty,
    Loading,
    Ready { playing: bool },
    Unloading,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not load track '{track_id}': {reason}")]
    ResourceLoadFailure { track_id: String, reason: String },
    #[error("audio engine failed to {operation} '{track_id}': {reason}")]
    TransientEngineFailure {
        operation: &'static str,
        track_id: String,
        reason: String,
    },
}

impl TransportError {
    fn from_engine(operation: &'static str, track: &Track, err: EngineError) -> Self {
        match err {
            EngineError::ResourceLoad { reason, .. } => TransportError::ResourceLoadFailure {
                track_id: track.id.clone(),
                reason,
            },
            other => TransportError::TransientEngineFailure {
                operation,
                track_id: track.id.clone(),
                reason: other.to_string(),
            },
        }
    }
}

/// Snapshot published to the presentation layer after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub current_track_index: usize,
    pub is_playing: bool,
    pub position_millis: u64,
    /// 0 while the engine has not reported a duration for the current track.
    pub duration_millis: u64,
    pub phase: TransportPhase,
    pub last_error: Option<TransportError>,
}

impl PlaybackState {
    fn at(index: usize) -> Self {
        Self {
            current_track_index: index,
            is_playing: false,
            position_millis: 0,
            duration_millis: 0,
            phase: TransportPhase::Empty,
            last_error: None,
        }
    }

    /// Fraction of the track played, 0.0 when the duration is unknown.
    pub fn progress_ratio(&self) -> f64 {
        if self.duration_millis == 0 {
            return 0.0;
        }
        (self.position_millis as f64 / self.duration_millis as f64).clamp(0.0, 1.0)
    }

    pub fn is_loading(&self) -> bool {
        self.phase == TransportPhase::Loading
    }
}

/// User intents forwarded by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    PlayPauseTapped,
    NextTapped,
    PreviousTapped,
    /// Slider released at `target_millis` while showing `track_index`.
    SlideComplete { track_index: usize, target_millis: i64 },
    CarouselSettled(usize),
}

/// Seek targets outside the track are clamped, never rejected.
pub fn clamp_seek_target(target_millis: i64, duration_millis: u64) -> u64 {
    if target_millis <= 0 {
        0
    } else {
        (target_millis as u64).min(duration_millis)
    }
}

struct LiveHandle<H> {
    handle: H,
    track_index: usize,
    epoch: u64,
    // set once the engine reports the sound ran out; it cannot resume
    finished: AtomicBool,
    cancel: CancellationToken,
    poller: JoinHandle<()>,
}

struct Slot<H> {
    live: Option<LiveHandle<H>>,
    next_epoch: u64,
}

struct Core<E: AudioEngine> {
    engine: Arc<E>,
    state: watch::Sender<PlaybackState>,
    slot: Mutex<Slot<E::Handle>>,
    // bumped together with every index change, under the state write lock
    generation: AtomicU64,
    // what the user last asked for; decides whether a skip keeps playing
    wants_playback: AtomicBool,
    play_pending: AtomicBool,
}

impl<E: AudioEngine> Core<E> {
    fn publish(&self, modify: impl FnOnce(&mut PlaybackState)) {
        self.state.send_modify(modify);
    }

    /// Current index together with the generation it belongs to.
    fn target(&self) -> (usize, u64) {
        let state = self.state.borrow();
        (state.current_track_index, self.generation.load(Ordering::Acquire))
    }

    /// Ask the live handle for its status and republish it. With `epoch` set,
    /// only that exact handle is polled.
    async fn poll_status(&self, slot: &Slot<E::Handle>, epoch: Option<u64>) {
        let Some(live) = slot.live.as_ref() else {
            return;
        };
        if epoch.is_some_and(|epoch| epoch != live.epoch) {
            return;
        }

        match self.engine.status(&live.handle).await {
            Ok(status) => {
                if self.apply_status(live.track_index, status) {
                    live.finished.store(true, Ordering::Release);
                }
            }
            Err(err) => debug!("Status poll for {:?} failed: {}", live.handle, err),
        }
    }

    /// Returns true when this status shows the track playing out.
    fn apply_status(&self, track_index: usize, status: EngineStatus) -> bool {
        let mut finished = false;
        self.state.send_if_modified(|state| {
            // the user has moved on; this handle's numbers are stale
            if state.current_track_index != track_index {
                return false;
            }
            let before = state.clone();

            state.duration_millis = status.duration_millis.unwrap_or(0);
            state.position_millis = status.position_millis.min(state.duration_millis);

            if state.phase == (TransportPhase::Ready { playing: true }) && !status.is_playing {
                state.is_playing = false;
                state.phase = TransportPhase::Ready { playing: false };
                finished = true;
            }

            *state != before
        });

        if finished {
            self.wants_playback.store(false, Ordering::Release);
            info!("Track {} reached the end", track_index);
        }
        finished
    }
}

/// Clears the pending-play flag however the play future ends.
struct PendingPlay<'a>(&'a AtomicBool);

impl Drop for PendingPlay<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct TransportController<E: AudioEngine> {
    core: Arc<Core<E>>,
    playlist: Playlist,
    poll_interval: Duration,
}

impl<E: AudioEngine> TransportController<E> {
    pub fn new(engine: Arc<E>, playlist: Playlist, poll_interval: Duration) -> Self {
        let (state, _) = watch::channel(PlaybackState::at(0));

        Self {
            core: Arc::new(Core {
                engine,
                state,
                slot: Mutex::new(Slot { live: None, next_epoch: 0 }),
                generation: AtomicU64::new(0),
                wants_playback: AtomicBool::new(false),
                play_pending: AtomicBool::new(false),
            }),
            playlist,
            poll_interval,
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn state(&self) -> PlaybackState {
        self.core.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.core.state.subscribe()
    }

    pub async fn dispatch(&self, intent: Intent) {
        debug!("Intent: {:?}", intent);
        match intent {
            Intent::PlayPauseTapped => self.toggle_play_pause().await,
            Intent::NextTapped => self.skip_next().await,
            Intent::PreviousTapped => self.skip_previous().await,
            Intent::SlideComplete { track_index, target_millis } => {
                self.seek_track(track_index, target_millis).await
            }
            Intent::CarouselSettled(index) => self.select(index).await,
        }
    }

    pub async fn toggle_play_pause(&self) {
        if self.state().is_playing {
            self.pause().await;
        } else {
            self.play().await;
        }
    }

    /// Start or resume the current track. A second call while one is still
    /// queued or loading is dropped.
    pub async fn play(&self) {
        self.core.wants_playback.store(true, Ordering::Release);
        if self.core.play_pending.swap(true, Ordering::AcqRel) {
            debug!("Play already in flight, ignoring repeat request");
            return;
        }
        let _pending = PendingPlay(&self.core.play_pending);

        let mut slot = self.core.slot.lock().await;
        self.play_locked(&mut slot).await;
    }

    pub async fn pause(&self) {
        self.core.wants_playback.store(false, Ordering::Release);
        let mut slot = self.core.slot.lock().await;
        self.pause_locked(&mut slot).await;
    }

    /// Jump within the current track. Ignored when nothing is loaded for it,
    /// or when a track switch happened after the request was made.
    pub async fn seek(&self, target_millis: i64) {
        let (_, generation) = self.core.target();
        self.seek_from(generation, target_millis).await;
    }

    /// Like `seek`, but only if `track_index` is still the current track.
    pub async fn seek_track(&self, track_index: usize, target_millis: i64) {
        let (index, generation) = self.core.target();
        if index != track_index {
            debug!("Dropping seek to {}ms meant for track {}, now on {}", target_millis, track_index, index);
            return;
        }
        self.seek_from(generation, target_millis).await;
    }

    async fn seek_from(&self, generation: u64, target_millis: i64) {
        let mut slot = self.core.slot.lock().await;

        if self.core.generation.load(Ordering::Acquire) != generation {
            debug!("Dropping seek to {}ms, track changed since", target_millis);
            return;
        }

        let state = self.state();
        let (handle, track_index) = match slot.live.as_ref() {
            Some(live) if live.track_index == state.current_track_index => {
                (live.handle.clone(), live.track_index)
            }
            _ => {
                debug!("Seek with no loaded track, ignoring");
                return;
            }
        };

        let target = clamp_seek_target(target_millis, state.duration_millis);
        if target as i64 != target_millis {
            debug!("Seek target {}ms clamped to {}ms", target_millis, target);
        }
        self.core.publish(|state| state.position_millis = target);

        if let Err(err) = self.core.engine.seek_to(&handle, target).await {
            let track = &self.playlist.tracks()[track_index];
            self.fail(&mut slot, TransportError::from_engine("seek", track, err)).await;
        }
    }

    pub async fn skip_next(&self) {
        self.switch_track("next", |playlist, index| Some(playlist.next_index(index)))
            .await;
    }

    pub async fn skip_previous(&self) {
        self.switch_track("previous", |playlist, index| Some(playlist.previous_index(index)))
            .await;
    }

    /// The carousel came to rest on `index`.
    pub async fn select(&self, index: usize) {
        if !self.playlist.contains_index(index) {
            warn!("Carousel settled on {} but the playlist has {} tracks", index, self.playlist.len());
            return;
        }
        self.switch_track("select", |_, current| (current != index).then_some(index))
            .await;
    }

    /// Poll the live handle once, outside the periodic timer.
    pub async fn refresh_status(&self) {
        let slot = self.core.slot.lock().await;
        self.core.poll_status(&slot, None).await;
    }

    /// Release the live handle, if any. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.core.wants_playback.store(false, Ordering::Release);
        let mut slot = self.core.slot.lock().await;
        self.release(&mut slot).await;
        info!("Transport shut down");
    }

    async fn switch_track(
        &self,
        reason: &str,
        pick: impl FnOnce(&Playlist, usize) -> Option<usize>,
    ) {
        let resume = self.core.wants_playback.load(Ordering::Acquire);
        let playlist = &self.playlist;
        let generation = &self.core.generation;
        let mut switched = None;

        self.core.state.send_if_modified(|state| {
            let Some(target) = pick(playlist, state.current_track_index) else {
                return false;
            };
            state.current_track_index = target;
            state.position_millis = 0;
            state.duration_millis = 0;
            switched = Some((target, generation.fetch_add(1, Ordering::AcqRel) + 1));
            true
        });

        let Some((index, my_generation)) = switched else {
            return;
        };
        debug!("Switched to track {} ({}), resume={}", index, reason, resume);

        let mut slot = self.core.slot.lock().await;
        if self.core.generation.load(Ordering::Acquire) != my_generation {
            debug!("Track switch to {} superseded by a newer one", index);
            return;
        }

        if resume {
            self.pause_locked(&mut slot).await;
            self.release(&mut slot).await;
            self.play_locked(&mut slot).await;
        } else {
            self.release(&mut slot).await;
        }
    }

    async fn play_locked(&self, slot: &mut Slot<E::Handle>) {
        let (index, generation) = self.core.target();
        let track = &self.playlist.tracks()[index];

        // a finished sound is reloaded from the start rather than resumed
        let resumable = |live: &&LiveHandle<E::Handle>| {
            live.track_index == index && !live.finished.load(Ordering::Acquire)
        };
        if let Some(live) = slot.live.as_ref().filter(resumable) {
            if self.state().is_playing {
                return;
            }
            let handle = live.handle.clone();
            match self.core.engine.play(&handle).await {
                Ok(()) => {
                    info!("Resumed '{}'", track.display_title());
                    self.mark_playing();
                }
                Err(err) => self.fail(slot, TransportError::from_engine("play", track, err)).await,
            }
            return;
        }

        self.release(slot).await;

        self.core.publish(|state| {
            state.phase = TransportPhase::Loading;
            state.last_error = None;
        });
        debug!("Loading '{}' from {}", track.id, track.audio.display());

        let handle = match self.core.engine.load(&track.audio).await {
            Ok(handle) => handle,
            Err(err) => {
                let error = TransportError::from_engine("load", track, err);
                warn!("{}", error);
                self.core.wants_playback.store(false, Ordering::Release);
                self.core.publish(|state| {
                    state.phase = TransportPhase::Empty;
                    state.is_playing = false;
                    state.last_error = Some(error);
                });
                return;
            }
        };

        if self.core.generation.load(Ordering::Acquire) != generation {
            debug!("Discarding stale load of '{}'", track.id);
            if let Err(err) = self.core.engine.unload(&handle).await {
                warn!("Failed to unload stale handle {:?}: {}", handle, err);
            }
            self.core.publish(|state| state.phase = TransportPhase::Empty);
            return;
        }

        self.install(slot, handle.clone(), index);

        match self.core.engine.play(&handle).await {
            Ok(()) => {
                info!("Playing '{}' by {}", track.display_title(), track.display_artist());
                self.mark_playing();
                self.core.poll_status(slot, None).await;
            }
            Err(err) => self.fail(slot, TransportError::from_engine("play", track, err)).await,
        }
    }

    async fn pause_locked(&self, slot: &mut Slot<E::Handle>) {
        let Some(live) = slot.live.as_ref() else {
            debug!("Pause with nothing loaded");
            return;
        };
        if !self.state().is_playing {
            return;
        }

        let handle = live.handle.clone();
        let track = &self.playlist.tracks()[live.track_index];
        match self.core.engine.pause(&handle).await {
            Ok(()) => {
                self.core.publish(|state| {
                    state.is_playing = false;
                    state.phase = TransportPhase::Ready { playing: false };
                });
                debug!("Paused '{}'", track.id);
            }
            Err(err) => self.fail(slot, TransportError::from_engine("pause", track, err)).await,
        }
    }

    fn mark_playing(&self) {
        self.core.publish(|state| {
            state.is_playing = true;
            state.phase = TransportPhase::Ready { playing: true };
            state.last_error = None;
        });
    }

    fn install(&self, slot: &mut Slot<E::Handle>, handle: E::Handle, track_index: usize) {
        slot.next_epoch += 1;
        let epoch = slot.next_epoch;
        let cancel = CancellationToken::new();
        let poller = tokio::spawn(run_poller(
            Arc::downgrade(&self.core),
            epoch,
            cancel.clone(),
            self.poll_interval,
        ));

        slot.live = Some(LiveHandle {
            handle,
            track_index,
            epoch,
            finished: AtomicBool::new(false),
            cancel,
            poller,
        });
        self.core.publish(|state| state.phase = TransportPhase::Ready { playing: false });
    }

    /// Stop polling, then unload. The poller has finished before the engine
    /// sees the unload, so no status request can follow it.
    async fn release(&self, slot: &mut Slot<E::Handle>) {
        let Some(live) = slot.live.take() else {
            return;
        };

        live.cancel.cancel();
        if let Err(err) = live.poller.await {
            debug!("Poller for epoch {} ended abnormally: {}", live.epoch, err);
        }

        self.core.publish(|state| {
            state.phase = TransportPhase::Unloading;
            state.is_playing = false;
        });
        if let Err(err) = self.core.engine.unload(&live.handle).await {
            warn!("Failed to unload {:?}: {}", live.handle, err);
        }
        self.core.publish(|state| {
            state.phase = TransportPhase::Empty;
            state.position_millis = 0;
            state.duration_millis = 0;
        });
        debug!("Released handle for track {}", live.track_index);
    }

    async fn fail(&self, slot: &mut Slot<E::Handle>, error: TransportError) {
        warn!("{}", error);
        self.core.wants_playback.store(false, Ordering::Release);
        self.release(slot).await;
        self.core.publish(|state| {
            state.is_playing = false;
            state.phase = TransportPhase::Empty;
            state.last_error = Some(error);
        });
    }
}

impl<E: AudioEngine> Drop for TransportController<E> {
    fn drop(&mut self) {
        let core = Arc::clone(&self.core);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let live = core.slot.lock().await.live.take();
                    let Some(live) = live else {
                        return;
                    };

                    live.cancel.cancel();
                    if let Err(err) = live.poller.await {
                        debug!("Poller for epoch {} ended abnormally: {}", live.epoch, err);
                    }
                    if let Err(err) = core.engine.unload(&live.handle).await {
                        warn!("Failed to unload {:?} on drop: {}", live.handle, err);
                    }
                });
            }
            Err(_) => {
                if let Some(live) = core.slot.try_lock().ok().and_then(|mut slot| slot.live.take()) {
                    live.cancel.cancel();
                    live.poller.abort();
                    warn!("No runtime left to unload {:?}", live.handle);
                }
            }
        }
    }
}

async fn run_poller<E: AudioEngine>(
    core: Weak<Core<E>>,
    epoch: u64,
    cancel: CancellationToken,
    period: Duration,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }

        let Some(core) = core.upgrade() else {
            break;
        };
        // a transport operation is in flight; it publishes its own state
        let Ok(slot) = core.slot.try_lock() else {
            continue;
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = core.poll_status(&slot, Some(epoch)) => {}
        }
    }

    debug!("Status polling stopped for epoch {}", epoch);
}
