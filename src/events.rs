//! Events emitted to the rest of the platform.
//!
//! Emission is fire-and-forget: sinks never report failure to the caller.
//! Hotword detections during a test go to [`EventTarget::Control`] only, so
//! automations listening on the general bus are not triggered.

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    HotwordDetected,
    /// Command recording finished.
    HotwordReleased,
    CommandDetected {
        hotword: String,
        command: String,
    },
    CommandError {
        reason: String,
    },
    TrainingOk,
    TrainingKo {
        error: String,
    },
}

impl Event {
    /// Wire name, e.g. `command.detected`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HotwordDetected => "hotword.detected",
            Self::HotwordReleased => "hotword.released",
            Self::CommandDetected { .. } => "command.detected",
            Self::CommandError { .. } => "command.error",
            Self::TrainingOk => "training.ok",
            Self::TrainingKo { .. } => "training.ko",
        }
    }

    /// Event payload as a JSON object (empty for events without data).
    pub fn params(&self) -> serde_json::Value {
        match self {
            Self::CommandDetected { hotword, command } => {
                json!({ "hotword": hotword, "command": command })
            }
            Self::CommandError { reason } => json!({ "error": reason }),
            Self::TrainingKo { error } => json!({ "error": error }),
            _ => json!({}),
        }
    }
}

/// Who should receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTarget {
    /// Every subscriber on the platform bus.
    All,
    /// Only the control interface (used for hotword tests).
    Control,
}

/// An event as delivered by [`ChannelEventSink`].
#[derive(Debug, Clone, Serialize)]
pub struct EmittedEvent {
    pub id: Uuid,
    pub name: &'static str,
    pub params: serde_json::Value,
    pub target: EventTarget,
}

impl EmittedEvent {
    pub fn new(event: &Event, target: EventTarget) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: event.name(),
            params: event.params(),
            target,
        }
    }
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event, target: EventTarget);
}

/// Writes every event to the log at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: Event, target: EventTarget) {
        log::info!("event: {} -> {:?} {}", event.name(), target, event.params());
    }
}

/// Forwards events into a bounded tokio channel. A full channel drops the
/// event with a warning rather than blocking the emitter.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<EmittedEvent>,
}

impl ChannelEventSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EmittedEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: Event, target: EventTarget) {
        match self.tx.try_send(EmittedEvent::new(&event, target)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                log::warn!("events: channel full, dropping {}", dropped.name);
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                log::debug!("events: no receiver for {}", dropped.name);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingEventSink  (test-only)
// ---------------------------------------------------------------------------

/// Keeps every emitted event for later assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: std::sync::Mutex<Vec<(Event, EventTarget)>>,
}

#[cfg(test)]
impl RecordingEventSink {
    pub fn events(&self) -> Vec<(Event, EventTarget)> {
        self.events.lock().expect("event log poisoned").clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|(e, _)| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| **n == name).count()
    }
}

#[cfg(test)]
impl EventSink for RecordingEventSink {
    fn emit(&self, event: Event, target: EventTarget) {
        self.events
            .lock()
            .expect("event log poisoned")
            .push((event, target));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_params() {
        let e = Event::CommandDetected {
            hotword: "jarvis".into(),
            command: "lights off".into(),
        };
        assert_eq!(e.name(), "command.detected");
        assert_eq!(e.params()["hotword"], "jarvis");
        assert_eq!(e.params()["command"], "lights off");

        assert_eq!(Event::HotwordReleased.name(), "hotword.released");
        assert_eq!(Event::HotwordDetected.params(), json!({}));
        assert_eq!(
            Event::TrainingKo { error: "boom".into() }.params()["error"],
            "boom"
        );
    }

    #[tokio::test]
    async fn channel_sink_delivers() {
        let (sink, mut rx) = ChannelEventSink::new(4);
        sink.emit(Event::TrainingOk, EventTarget::All);
        let got = rx.recv().await.unwrap();
        assert_eq!(got.name, "training.ok");
        assert_eq!(got.target, EventTarget::All);
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let (sink, mut rx) = ChannelEventSink::new(1);
        sink.emit(Event::HotwordDetected, EventTarget::Control);
        sink.emit(Event::HotwordReleased, EventTarget::All);
        assert_eq!(rx.recv().await.unwrap().name, "hotword.detected");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (sink, rx) = ChannelEventSink::new(1);
        drop(rx);
        sink.emit(Event::TrainingOk, EventTarget::All);
    }

    #[test]
    fn emitted_event_serialises() {
        let emitted = EmittedEvent::new(&Event::CommandError { reason: "x".into() }, EventTarget::All);
        let value = serde_json::to_value(&emitted).unwrap();
        assert_eq!(value["name"], "command.error");
        assert_eq!(value["target"], "all");
        assert_eq!(value["params"]["error"], "x");
    }

    #[test]
    fn recording_sink_counts() {
        let sink = RecordingEventSink::default();
        sink.emit(Event::HotwordDetected, EventTarget::All);
        sink.emit(Event::HotwordDetected, EventTarget::Control);
        assert_eq!(sink.count("hotword.detected"), 2);
    }
}
