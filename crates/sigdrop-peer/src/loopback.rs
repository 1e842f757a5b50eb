//! In-process engine stub.
//!
//! Produces plausible descriptions and host candidates, enforces the
//! ordering rules a real engine would (no answer before an offer, no
//! candidates before a remote description), and opens its channel as soon
//! as the remote description is applied. Messages sent on the channel are
//! echoed back as inbound messages; nothing leaves the process.

use crate::engine::{
    ConnectionState, EngineError, EngineEvent, EventSink, GatheringState, PeerEngine,
};
use rand::Rng;
use sigdrop_core::{CandidateEntry, SignalKind};
use tracing::debug;

/// Host candidates gathered per local description.
const CANDIDATE_COUNT: usize = 2;
const HOST_PRIORITY: u32 = 2_122_260_223;
const LOOPBACK_MEDIA_ID: &str = "0";
const REMOTE_CHANNEL_LABEL: &str = "remote";

#[derive(Debug)]
pub struct LoopbackEngine {
    sink: EventSink,
    session_id: u64,
    local_kind: Option<SignalKind>,
    local_channel: Option<String>,
    remote_set: bool,
    channel_open: bool,
    closed: bool,
}

impl LoopbackEngine {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            session_id: rand::thread_rng().gen_range(1..u32::MAX as u64),
            local_kind: None,
            local_channel: None,
            remote_set: false,
            channel_open: false,
            closed: false,
        }
    }

    pub fn is_channel_open(&self) -> bool {
        self.channel_open
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: EngineEvent) {
        if !self.sink.emit(event) {
            debug!("loopback engine event dropped: consumer gone");
        }
    }

    fn synthesize_sdp(&self, kind: &SignalKind) -> String {
        let setup = match kind {
            SignalKind::Offer => "actpass",
            _ => "active",
        };
        format!(
            "v=0\n\
             o=- {id} 2 IN IP4 127.0.0.1\n\
             s=-\n\
             t=0 0\n\
             a=group:BUNDLE {mid}\n\
             a=msid-semantic:WMS\n\
             m=application 9 UDP/DTLS/SCTP webrtc-datachannel\n\
             c=IN IP4 0.0.0.0\n\
             a=mid:{mid}\n\
             a=setup:{setup}\n\
             a=sctp-port:5000\n\
             a=max-message-size:262144\n",
            id = self.session_id,
            mid = LOOPBACK_MEDIA_ID,
        )
    }

    fn gather_candidates(&self) {
        let mut rng = rand::thread_rng();
        for foundation in 1..=CANDIDATE_COUNT {
            let port: u16 = rng.gen_range(49152..=65535);
            let candidate = format!(
                "candidate:{foundation} 1 UDP {HOST_PRIORITY} 127.0.0.1 {port} typ host"
            );
            self.emit(EngineEvent::LocalCandidate(
                CandidateEntry::new(LOOPBACK_MEDIA_ID, candidate).with_media_line_index(0),
            ));
        }
    }

    fn open_channel(&mut self) {
        if self.channel_open {
            return;
        }
        if self.local_channel.is_none() {
            self.emit(EngineEvent::DataChannel {
                label: REMOTE_CHANNEL_LABEL.to_string(),
            });
        }
        self.channel_open = true;
        self.emit(EngineEvent::ChannelOpen);
        self.emit(EngineEvent::ConnectionState(ConnectionState::Connected));
    }
}

impl PeerEngine for LoopbackEngine {
    fn create_data_channel(&mut self, label: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        if label.is_empty() {
            return Err(EngineError::DataChannel("label must not be empty".into()));
        }
        self.local_channel = Some(label.to_string());
        Ok(())
    }

    fn set_local_description(&mut self, kind: SignalKind) -> Result<(), EngineError> {
        self.ensure_open()?;
        match &kind {
            SignalKind::Offer => {}
            SignalKind::Answer if self.remote_set => {}
            SignalKind::Answer => {
                return Err(EngineError::LocalDescription(
                    "an answer needs a remote offer first".into(),
                ))
            }
            SignalKind::Other(other) => {
                return Err(EngineError::LocalDescription(format!(
                    "unsupported description kind `{other}`"
                )))
            }
        }

        let sdp = self.synthesize_sdp(&kind);
        self.local_kind = Some(kind.clone());
        self.emit(EngineEvent::GatheringState(GatheringState::InProgress));
        self.emit(EngineEvent::LocalDescription { sdp, kind });
        self.gather_candidates();
        self.emit(EngineEvent::GatheringState(GatheringState::Complete));
        Ok(())
    }

    fn set_remote_description(&mut self, sdp: &str, kind: &SignalKind) -> Result<(), EngineError> {
        self.ensure_open()?;
        if !sdp.trim_start().starts_with("v=") {
            return Err(EngineError::InvalidDescription(
                "missing `v=` version line".into(),
            ));
        }
        match kind {
            SignalKind::Offer if self.local_kind == Some(SignalKind::Offer) => {
                return Err(EngineError::InvalidDescription(
                    "offer received while a local offer is pending".into(),
                ))
            }
            SignalKind::Answer if self.local_kind != Some(SignalKind::Offer) => {
                return Err(EngineError::InvalidDescription(
                    "answer received without a local offer".into(),
                ))
            }
            SignalKind::Other(other) => {
                return Err(EngineError::InvalidDescription(format!(
                    "unsupported description kind `{other}`"
                )))
            }
            _ => {}
        }

        if !self.remote_set {
            self.remote_set = true;
            self.emit(EngineEvent::ConnectionState(ConnectionState::Connecting));
            self.open_channel();
        }
        Ok(())
    }

    fn add_remote_candidate(&mut self, candidate: &CandidateEntry) -> Result<(), EngineError> {
        self.ensure_open()?;
        if !self.remote_set {
            return Err(EngineError::NoRemoteDescription);
        }
        if !candidate.candidate.starts_with("candidate:") {
            return Err(EngineError::InvalidCandidate(candidate.candidate.clone()));
        }
        debug!(
            "loopback engine accepted candidate (mid {}, mline {}): {}",
            candidate.media_id,
            candidate.media_line_index_or_default(),
            candidate.candidate
        );
        Ok(())
    }

    fn send(&mut self, message: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        if !self.channel_open {
            return Err(EngineError::ChannelNotOpen);
        }
        self.emit(EngineEvent::Message(message.to_string()));
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.channel_open {
            self.channel_open = false;
            self.emit(EngineEvent::ChannelClosed);
        }
        self.emit(EngineEvent::ConnectionState(ConnectionState::Closed));
    }
}
