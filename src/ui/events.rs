use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    // UI Events
    Quit,
    Tick,
    Render,

    // Transport buttons
    TogglePlayPause,
    NextTrack,
    PreviousTrack,

    // Scrub bar
    ScrubForward,
    ScrubBack,

    // Carousel
    SwipeLeft,
    SwipeRight,
    JumpTo(usize),
}

pub struct EventHandler {
    event_sender: mpsc::UnboundedSender<AppEvent>,
    event_receiver: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        Self {
            event_sender,
            event_receiver,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.event_sender.clone()
    }

    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.event_receiver.recv().await
    }

    /// Start reading the keyboard and emitting ticks. Both stop on their own
    /// once this handler (the receiving end) is dropped.
    pub fn start(&self, tick_rate: Duration) {
        let keys = self.sender();
        tokio::task::spawn_blocking(move || read_terminal_events(keys));

        let ticks = self.sender();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(tick_rate);
            loop {
                tick.tick().await;
                if ticks.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn read_terminal_events(sender: mpsc::UnboundedSender<AppEvent>) {
    loop {
        if sender.is_closed() {
            break;
        }
        match event::poll(Duration::from_millis(50)) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                warn!("Terminal event poll failed: {}", e);
                break;
            }
        }

        let app_event = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key_to_app_event(key),
            Ok(Event::Resize(_, _)) => Some(AppEvent::Render),
            Ok(_) => None,
            Err(e) => {
                warn!("Terminal event read failed: {}", e);
                break;
            }
        };

        if let Some(app_event) = app_event {
            if sender.send(app_event).is_err() {
                break;
            }
        }
    }
    debug!("Keyboard reader stopped");
}

pub fn key_to_app_event(key: KeyEvent) -> Option<AppEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(AppEvent::Quit);
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Quit),

        // Playback controls
        KeyCode::Char(' ') => Some(AppEvent::TogglePlayPause),
        KeyCode::Char('n') | KeyCode::Right => Some(AppEvent::NextTrack),
        KeyCode::Char('b') | KeyCode::Left => Some(AppEvent::PreviousTrack),

        // Scrubbing
        KeyCode::Char('.') => Some(AppEvent::ScrubForward),
        KeyCode::Char(',') => Some(AppEvent::ScrubBack),

        // Carousel: swipe, or jump straight to a slide (1-based)
        KeyCode::Char(']') => Some(AppEvent::SwipeRight),
        KeyCode::Char('[') => Some(AppEvent::SwipeLeft),
        KeyCode::Char(c @ '1'..='9') => c.to_digit(10).map(|d| AppEvent::JumpTo(d as usize - 1)),

        _ => None,
    }
}
