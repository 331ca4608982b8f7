// rodio-backed audio engine.
//
// rodio's OutputStream can't leave the thread that opened it, so the engine
// owns a dedicated audio thread and talks to it over a channel. Each request
// carries a oneshot for the reply, which is what makes the calls async.

use super::engine::{AudioEngine, EngineError, EngineStatus};
use super::AudioConfig;
use anyhow::Result;
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Handle to one sink living on the audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundId(u64);

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum Command {
    Load { resource: PathBuf, reply: Reply<SoundId> },
    Play { id: SoundId, reply: Reply<()> },
    Pause { id: SoundId, reply: Reply<()> },
    Seek { id: SoundId, millis: u64, reply: Reply<()> },
    Unload { id: SoundId, reply: Reply<()> },
    Status { id: SoundId, reply: Reply<EngineStatus> },
    Shutdown,
}

pub struct RodioEngine {
    commands: mpsc::UnboundedSender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl RodioEngine {
    /// Open the default output device. Fails when there is none.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let volume = config.clamped_volume();

        let thread = thread::Builder::new()
            .name("hassanfy-audio".to_string())
            .spawn(move || {
                let (stream, stream_handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow::anyhow!("No audio output device: {}", e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                AudioThread::new(stream_handle, volume).run(receiver);
                drop(stream);
            })?;

        ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("Audio thread exited during startup"))??;
        info!("Audio output opened (volume {:.2})", volume);

        Ok(Self {
            commands,
            thread: Some(thread),
        })
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| EngineError::Transient("audio thread is gone".to_string()))?;
        response
            .await
            .map_err(|_| EngineError::Transient("audio thread dropped the request".to_string()))?
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio thread panicked");
            }
        }
    }
}

#[async_trait]
impl AudioEngine for RodioEngine {
    type Handle = SoundId;

    async fn load(&self, resource: &Path) -> Result<SoundId, EngineError> {
        let resource = resource.to_path_buf();
        self.request(|reply| Command::Load { resource, reply }).await
    }

    async fn play(&self, handle: &SoundId) -> Result<(), EngineError> {
        let id = *handle;
        self.request(|reply| Command::Play { id, reply }).await
    }

    async fn pause(&self, handle: &SoundId) -> Result<(), EngineError> {
        let id = *handle;
        self.request(|reply| Command::Pause { id, reply }).await
    }

    async fn seek_to(&self, handle: &SoundId, millis: u64) -> Result<(), EngineError> {
        let id = *handle;
        self.request(|reply| Command::Seek { id, millis, reply }).await
    }

    async fn unload(&self, handle: &SoundId) -> Result<(), EngineError> {
        let id = *handle;
        self.request(|reply| Command::Unload { id, reply }).await
    }

    async fn status(&self, handle: &SoundId) -> Result<EngineStatus, EngineError> {
        let id = *handle;
        self.request(|reply| Command::Status { id, reply }).await
    }
}

struct LoadedSound {
    sink: Sink,
    duration: Option<Duration>,
}

struct AudioThread {
    stream_handle: OutputStreamHandle,
    volume: f32,
    sounds: HashMap<SoundId, LoadedSound>,
    next_id: u64,
}

impl AudioThread {
    fn new(stream_handle: OutputStreamHandle, volume: f32) -> Self {
        Self {
            stream_handle,
            volume,
            sounds: HashMap::new(),
            next_id: 1,
        }
    }

    fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = receiver.blocking_recv() {
            match command {
                Command::Load { resource, reply } => {
                    let _ = reply.send(self.load(&resource));
                }
                Command::Play { id, reply } => {
                    let _ = reply.send(self.with_sink(id, |sink| sink.play()));
                }
                Command::Pause { id, reply } => {
                    let _ = reply.send(self.with_sink(id, |sink| sink.pause()));
                }
                Command::Seek { id, millis, reply } => {
                    let _ = reply.send(self.seek(id, millis));
                }
                Command::Unload { id, reply } => {
                    let _ = reply.send(self.unload(id));
                }
                Command::Status { id, reply } => {
                    let _ = reply.send(self.status(id));
                }
                Command::Shutdown => break,
            }
        }

        for (_, sound) in self.sounds.drain() {
            sound.sink.stop();
        }
        debug!("Audio thread stopped");
    }

    fn load(&mut self, resource: &Path) -> Result<SoundId, EngineError> {
        let file = File::open(resource).map_err(|e| EngineError::resource_load(resource, e))?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| {
            EngineError::resource_load(resource, format!("unsupported or corrupted audio: {}", e))
        })?;
        let duration = source.total_duration();

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| EngineError::Transient(format!("could not open sink: {}", e)))?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(source);

        let id = SoundId(self.next_id);
        self.next_id += 1;
        self.sounds.insert(id, LoadedSound { sink, duration });
        debug!("Loaded {} as {:?} (duration {:?})", resource.display(), id, duration);
        Ok(id)
    }

    fn with_sink(&self, id: SoundId, f: impl FnOnce(&Sink)) -> Result<(), EngineError> {
        let sound = self.sounds.get(&id).ok_or(EngineError::UnknownHandle)?;
        f(&sound.sink);
        Ok(())
    }

    fn seek(&self, id: SoundId, millis: u64) -> Result<(), EngineError> {
        let sound = self.sounds.get(&id).ok_or(EngineError::UnknownHandle)?;
        sound
            .sink
            .try_seek(Duration::from_millis(millis))
            .map_err(|e| EngineError::Transient(format!("seek refused: {}", e)))
    }

    fn unload(&mut self, id: SoundId) -> Result<(), EngineError> {
        let sound = self.sounds.remove(&id).ok_or(EngineError::UnknownHandle)?;
        sound.sink.stop();
        Ok(())
    }

    fn status(&self, id: SoundId) -> Result<EngineStatus, EngineError> {
        let sound = self.sounds.get(&id).ok_or(EngineError::UnknownHandle)?;
        let position_millis = sound.sink.get_pos().as_millis() as u64;
        let duration_millis = sound.duration.map(|d| d.as_millis() as u64);

        Ok(EngineStatus {
            position_millis,
            duration_millis,
            is_playing: !sound.sink.is_paused() && !sound.sink.empty(),
        })
    }
}
