//! Errors surfaced by the bootstrap orchestrator and its driver.

use crate::engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("data channel is not open yet")]
    ChannelNotOpen,

    #[error("session is closed")]
    Closed,

    #[error(transparent)]
    Common(#[from] sigdrop_common::Error),
}

impl PeerError {
    /// Transient conditions the caller reports as a warning and moves on from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ChannelNotOpen | Self::Engine(EngineError::ChannelNotOpen)
        )
    }
}
