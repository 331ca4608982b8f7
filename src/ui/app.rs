use super::{components, AppEvent, EventHandler, TerminalManager};
use crate::audio::{AudioEngine, Intent, PlaybackState, TransportController};
use crate::config::UiConfig;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How far one scrub key press moves the slider.
pub const SCRUB_STEP_MILLIS: i64 = 5_000;

pub struct App<E: AudioEngine> {
    ui: UiConfig,
    terminal: TerminalManager,
    event_handler: EventHandler,
    transport: Arc<TransportController<E>>,
    state_rx: watch::Receiver<PlaybackState>,
    intents: Option<mpsc::UnboundedSender<Intent>>,
    dispatcher: Option<JoinHandle<()>>,
    should_quit: bool,
}

impl<E: AudioEngine> App<E> {
    pub fn new(ui: UiConfig, transport: TransportController<E>) -> Result<Self> {
        let terminal = TerminalManager::new()?;
        let state_rx = transport.subscribe();
        let transport = Arc::new(transport);
        let (intents, dispatcher) = spawn_dispatcher(Arc::clone(&transport));

        Ok(Self {
            ui,
            terminal,
            event_handler: EventHandler::new(),
            transport,
            state_rx,
            intents: Some(intents),
            dispatcher: Some(dispatcher),
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.event_handler.start(self.ui.tick_rate());
        info!("UI running with {} tracks", self.transport.playlist().len());

        while !self.should_quit {
            let state = self.state_rx.borrow_and_update().clone();
            let title = &self.ui.title;
            let playlist = self.transport.playlist();
            self.terminal
                .draw(|f| components::render_ui(f, title, playlist, &state))?;

            // redraw on input, on ticks and whenever the transport publishes
            let event = tokio::select! {
                event = self.event_handler.next_event() => event,
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match event {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }

        // let queued intents drain before tearing the transport down
        self.intents.take();
        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(err) = dispatcher.await {
                debug!("Intent dispatcher ended abnormally: {}", err);
            }
        }
        self.transport.shutdown().await;
        Ok(())
    }

    fn handle_event(&mut self, event: AppEvent) {
        if event == AppEvent::Quit {
            self.should_quit = true;
            return;
        }

        let state = self.transport.state();
        let Some(intent) = intent_for_event(event, &state, self.transport.playlist().len()) else {
            return;
        };

        debug!("Queueing {:?}", intent);
        if let Some(intents) = &self.intents {
            if intents.send(intent).is_err() {
                debug!("Intent dispatcher is gone, dropping {:?}", intent);
            }
        }
    }
}

/// Run intents one after another, in the order the keys were pressed, off
/// the UI loop so a slow load never freezes drawing. Ends when the sender
/// is dropped.
pub fn spawn_dispatcher<E: AudioEngine>(
    transport: Arc<TransportController<E>>,
) -> (mpsc::UnboundedSender<Intent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Intent>();
    let task = tokio::spawn(async move {
        while let Some(intent) = rx.recv().await {
            transport.dispatch(intent).await;
        }
        info!("Intent dispatcher stopped");
    });
    (tx, task)
}

/// What a key event asks of the transport, given what is on screen now.
pub fn intent_for_event(event: AppEvent, state: &PlaybackState, track_count: usize) -> Option<Intent> {
    let index = state.current_track_index;
    let position = state.position_millis as i64;

    match event {
        AppEvent::TogglePlayPause => Some(Intent::PlayPauseTapped),
        AppEvent::NextTrack => Some(Intent::NextTapped),
        AppEvent::PreviousTrack => Some(Intent::PreviousTapped),
        AppEvent::ScrubForward => Some(Intent::SlideComplete {
            track_index: index,
            target_millis: position + SCRUB_STEP_MILLIS,
        }),
        AppEvent::ScrubBack => Some(Intent::SlideComplete {
            track_index: index,
            target_millis: position - SCRUB_STEP_MILLIS,
        }),
        AppEvent::SwipeRight => {
            Some(Intent::CarouselSettled((index + 1).min(track_count.saturating_sub(1))))
        }
        AppEvent::SwipeLeft => Some(Intent::CarouselSettled(index.saturating_sub(1))),
        AppEvent::JumpTo(target) => Some(Intent::CarouselSettled(target)),
        AppEvent::Quit | AppEvent::Tick | AppEvent::Render => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{Call, MockEngine};
    use crate::audio::{Playlist, Track, TransportPhase};
    use std::time::Duration;

    fn state_at(index: usize, position_millis: u64) -> PlaybackState {
        PlaybackState {
            current_track_index: index,
            is_playing: true,
            position_millis,
            duration_millis: 180_000,
            phase: TransportPhase::Ready { playing: true },
            last_error: None,
        }
    }

    #[test]
    fn test_scrub_is_relative_to_position() {
        let state = state_at(1, 3_000);
        assert_eq!(
            intent_for_event(AppEvent::ScrubForward, &state, 2),
            Some(Intent::SlideComplete { track_index: 1, target_millis: 8_000 })
        );
        // negative targets are left for the controller to clamp
        assert_eq!(
            intent_for_event(AppEvent::ScrubBack, &state, 2),
            Some(Intent::SlideComplete { track_index: 1, target_millis: -2_000 })
        );
    }

    #[test]
    fn test_swipe_stops_at_the_ends() {
        assert_eq!(
            intent_for_event(AppEvent::SwipeRight, &state_at(1, 0), 2),
            Some(Intent::CarouselSettled(1))
        );
        assert_eq!(
            intent_for_event(AppEvent::SwipeLeft, &state_at(0, 0), 2),
            Some(Intent::CarouselSettled(0))
        );
        assert_eq!(
            intent_for_event(AppEvent::SwipeRight, &state_at(0, 0), 2),
            Some(Intent::CarouselSettled(1))
        );
    }

    #[test]
    fn test_buttons_map_directly() {
        let state = state_at(0, 0);
        assert_eq!(intent_for_event(AppEvent::TogglePlayPause, &state, 2), Some(Intent::PlayPauseTapped));
        assert_eq!(intent_for_event(AppEvent::NextTrack, &state, 2), Some(Intent::NextTapped));
        assert_eq!(intent_for_event(AppEvent::PreviousTrack, &state, 2), Some(Intent::PreviousTapped));
        assert_eq!(intent_for_event(AppEvent::JumpTo(4), &state, 2), Some(Intent::CarouselSettled(4)));
        assert_eq!(intent_for_event(AppEvent::Tick, &state, 2), None);
    }

    #[tokio::test]
    async fn test_dispatcher_keeps_key_order() {
        let engine = Arc::new(MockEngine::new());
        let tracks = (0..2)
            .map(|i| Track::new(format!("{i}"), format!("Song {i}"), "Bensound", format!("/music/{i}.mp3"), ""))
            .collect();
        let transport = Arc::new(TransportController::new(
            Arc::clone(&engine),
            Playlist::new(tracks).unwrap(),
            Duration::from_millis(1000),
        ));
        transport.play().await;
        engine.clear_calls();

        // scrub then skip, both read off the same screen
        let state = transport.state();
        let (intents, dispatcher) = spawn_dispatcher(Arc::clone(&transport));
        for event in [AppEvent::ScrubForward, AppEvent::NextTrack, AppEvent::ScrubForward] {
            intents.send(intent_for_event(event, &state, 2).unwrap()).unwrap();
        }
        drop(intents);
        dispatcher.await.unwrap();

        let calls = engine.calls();
        let seek = calls.iter().position(|call| *call == Call::Seek(1, 5_000)).unwrap();
        let unload = calls.iter().position(|call| *call == Call::Unload(1)).unwrap();
        assert!(seek < unload);
        // the second scrub was meant for track 0 and must not land on track 1
        assert!(!calls.iter().any(|call| matches!(call, Call::Seek(2, _))));
        assert_eq!(transport.state().current_track_index, 1);
        assert_eq!(transport.state().position_millis, 0);
    }
}
