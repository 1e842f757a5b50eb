//! sigdrop peer: drives a two-party data-channel bootstrap over signal files.
//!
//! - [`engine`]: the boundary to the peer-connection engine, plus its event queue
//! - [`loopback`]: an in-process engine stub
//! - [`orchestrator`]: the polling offer/answer state machine
//! - [`session`]: the same exchange as externally driven calls, for embedding hosts
//! - [`runtime`] and [`console`]: the threaded driver used by the demo binary

#![forbid(unsafe_code)]

pub mod console;
pub mod engine;
pub mod error;
pub mod loopback;
pub mod orchestrator;
pub mod outbound;
pub mod runtime;
pub mod session;
pub mod types;

pub use console::{spawn_console_reader, EXIT_COMMAND};
pub use engine::{
    event_channel, ConnectionState, EngineError, EngineEvent, EventSink, EventStream,
    GatheringState, PeerEngine,
};
pub use error::PeerError;
pub use loopback::LoopbackEngine;
pub use orchestrator::{Orchestrator, TickReport};
pub use outbound::OutboundSignal;
pub use runtime::{run_peer, PeerCommand, PeerReport, StopReason, COMMAND_QUEUE_DEPTH};
pub use session::{AnswerSession, OfferApplyResult};
pub use types::{BootstrapState, PeerConfig, PeerStatus, Role};

/// Label of the data channel the offering side creates.
pub const DATA_CHANNEL_LABEL: &str = "sigdrop";
