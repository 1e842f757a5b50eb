//! Boundary to the peer-connection / data-channel engine.
//!
//! The engine is driven through [`PeerEngine`] and reports back through an
//! [`EventSink`]. Everything it reports lands in one queue that the owner of
//! the session drains at its own pace, so no engine callback ever touches
//! session state directly.

use sigdrop_core::{CandidateEntry, SignalKind};
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    New,
    InProgress,
    Complete,
}

impl fmt::Display for GatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::InProgress => "in-progress",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Something the engine reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A local description is ready to be published.
    LocalDescription { sdp: String, kind: SignalKind },
    /// A local candidate was gathered.
    LocalCandidate(CandidateEntry),
    /// The remote party opened a data channel towards us.
    DataChannel { label: String },
    ChannelOpen,
    ChannelClosed,
    /// Inbound text message on the data channel.
    Message(String),
    ConnectionState(ConnectionState),
    GatheringState(GatheringState),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid remote description: {0}")]
    InvalidDescription(String),
    #[error("invalid remote candidate: {0}")]
    InvalidCandidate(String),
    #[error("remote description not set")]
    NoRemoteDescription,
    #[error("cannot create local description: {0}")]
    LocalDescription(String),
    #[error("cannot create data channel: {0}")]
    DataChannel(String),
    #[error("data channel is not open")]
    ChannelNotOpen,
    #[error("engine is closed")]
    Closed,
}

/// Operations the bootstrap needs from a peer-connection engine.
///
/// Results of these calls (descriptions, candidates, channel state) arrive
/// later as [`EngineEvent`]s, possibly emitted from inside the call itself.
pub trait PeerEngine: Send {
    fn create_data_channel(&mut self, label: &str) -> Result<(), EngineError>;

    /// Start generating a local description of `kind`.
    fn set_local_description(&mut self, kind: SignalKind) -> Result<(), EngineError>;

    fn set_remote_description(&mut self, sdp: &str, kind: &SignalKind)
        -> Result<(), EngineError>;

    fn add_remote_candidate(&mut self, candidate: &CandidateEntry) -> Result<(), EngineError>;

    fn send(&mut self, message: &str) -> Result<(), EngineError>;

    fn close(&mut self);
}

/// Engine-side handle of the event queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    /// Queue an event. Returns `false` once the consumer is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Consumer side of the event queue.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected sink/stream pair.
///
/// The queue is unbounded: engines may emit from inside a call made by the
/// consumer, which must never block on its own queue.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, EventStream { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_emission_order() {
        let (sink, mut stream) = event_channel();
        assert!(sink.emit(EngineEvent::ChannelOpen));
        assert!(sink.emit(EngineEvent::Message("hi".into())));

        assert_eq!(stream.try_recv(), Some(EngineEvent::ChannelOpen));
        assert_eq!(stream.try_recv(), Some(EngineEvent::Message("hi".into())));
        assert_eq!(stream.try_recv(), None);
    }

    #[test]
    fn emit_reports_dropped_consumer() {
        let (sink, stream) = event_channel();
        drop(stream);
        assert!(!sink.emit(EngineEvent::ChannelClosed));
    }

    #[test]
    fn states_display_lowercase() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(GatheringState::InProgress.to_string(), "in-progress");
    }
}
