//! Offer/answer bootstrap over polled signal files.
//!
//! The orchestrator is the only writer of the local signal record. Each
//! poll tick re-reads the other party's file and feeds the engine what it
//! has not seen yet: the remote description exactly once, then remote
//! candidates strictly in file order, one position at a time. Anything the
//! engine rejects is simply tried again on the next tick.

use crate::engine::{EngineEvent, PeerEngine};
use crate::error::PeerError;
use crate::outbound::OutboundSignal;
use crate::types::{BootstrapState, PeerConfig, PeerStatus, Role};
use crate::DATA_CHANNEL_LABEL;
use sigdrop_core::{parse, FileStore, SignalKind, SignalStore};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one poll tick handed to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub description_applied: bool,
    pub candidates_applied: usize,
}

pub struct Orchestrator<E: PeerEngine, S: SignalStore = FileStore> {
    config: PeerConfig,
    engine: E,
    store: S,
    local_path: PathBuf,
    remote_path: PathBuf,
    local: OutboundSignal,
    state: BootstrapState,
    remote_applied: bool,
    answer_requested: bool,
    applied_candidates: usize,
    channel_open: bool,
    status: Arc<PeerStatus>,
}

impl<E: PeerEngine, S: SignalStore> Orchestrator<E, S> {
    pub fn new(config: PeerConfig, engine: E, store: S) -> Self {
        let local_path = config.local_signal_path();
        let remote_path = config.remote_signal_path();
        let local = OutboundSignal::new(config.role.local_kind());
        Self {
            config,
            engine,
            store,
            local_path,
            remote_path,
            local,
            state: BootstrapState::Idle,
            remote_applied: false,
            answer_requested: false,
            applied_candidates: 0,
            channel_open: false,
            status: Arc::new(PeerStatus::default()),
        }
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn status(&self) -> Arc<PeerStatus> {
        Arc::clone(&self.status)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn local_signal(&self) -> &OutboundSignal {
        &self.local
    }

    pub fn applied_candidate_count(&self) -> usize {
        self.applied_candidates
    }

    pub fn is_remote_applied(&self) -> bool {
        self.remote_applied
    }

    pub fn is_channel_open(&self) -> bool {
        self.channel_open
    }

    /// Kick off the exchange.
    ///
    /// The offerer creates its data channel and requests an offer right
    /// away; the answerer has nothing to do until the offer shows up.
    /// Errors here are startup failures.
    pub fn start(&mut self) -> Result<(), PeerError> {
        if self.state == BootstrapState::Closed {
            return Err(PeerError::Closed);
        }
        match self.config.role {
            Role::Offerer => {
                self.engine.create_data_channel(DATA_CHANNEL_LABEL)?;
                self.transition(BootstrapState::LocalDescriptionPending);
                self.engine.set_local_description(SignalKind::Offer)?;
            }
            Role::Answerer => {
                info!(
                    "waiting for offer at {}",
                    self.remote_path.display()
                );
            }
        }
        Ok(())
    }

    /// Apply one engine event. Returns the text of an inbound message.
    ///
    /// Once closed, only inbound messages and the channel closing are
    /// still taken into account.
    pub fn handle_event(&mut self, event: EngineEvent) -> Option<String> {
        if self.state == BootstrapState::Closed {
            return self.handle_event_after_close(event);
        }
        match event {
            EngineEvent::LocalDescription { sdp, kind } => {
                self.local.set_description(kind.clone(), sdp);
                if self.persist_local() {
                    info!("local {} written to {}", kind, self.local_path.display());
                }
                if matches!(
                    self.state,
                    BootstrapState::Idle | BootstrapState::LocalDescriptionPending
                ) {
                    self.transition(BootstrapState::LocalDescriptionPublished);
                }
            }
            EngineEvent::LocalCandidate(entry) => {
                debug!("local candidate gathered (mid {}): {}", entry.media_id, entry.candidate);
                self.local.push_candidate(entry);
                self.persist_local();
            }
            EngineEvent::DataChannel { label } => {
                info!("data channel '{}' received", label);
            }
            EngineEvent::ChannelOpen => {
                self.channel_open = true;
                self.status.channel_open.store(true, Ordering::Release);
                info!("data channel open");
                self.transition(BootstrapState::ChannelOpen);
                self.send_greeting();
            }
            EngineEvent::ChannelClosed => {
                self.channel_open = false;
                self.status.channel_open.store(false, Ordering::Release);
                info!("data channel closed");
                if self.state == BootstrapState::ChannelOpen {
                    self.transition(BootstrapState::CandidatesFlowing);
                }
            }
            EngineEvent::Message(text) => {
                self.status.messages_received.fetch_add(1, Ordering::Relaxed);
                return Some(text);
            }
            EngineEvent::ConnectionState(state) => {
                info!("connection state: {}", state);
            }
            EngineEvent::GatheringState(state) => {
                debug!("gathering state: {}", state);
            }
        }
        None
    }

    /// One read-parse-apply cycle against the remote signal file.
    pub fn poll_remote(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.state == BootstrapState::Closed {
            return report;
        }

        if self.local.is_dirty() {
            self.persist_local();
        }

        let Some(text) = self.store.read(&self.remote_path) else {
            debug!("no remote signal at {} yet", self.remote_path.display());
            return report;
        };
        let Some(remote) = parse(&text) else {
            debug!("remote signal at {} not parseable yet", self.remote_path.display());
            return report;
        };

        let expected = self.config.role.remote_kind();
        if remote.kind != expected {
            debug!("ignoring remote signal of kind {} (expected {})", remote.kind, expected);
            return report;
        }

        if !self.remote_applied {
            if !remote.has_description() {
                return report;
            }
            if let Err(err) = self.engine.set_remote_description(&remote.sdp, &remote.kind) {
                warn!("remote {} rejected, retrying next tick: {}", remote.kind, err);
                return report;
            }
            self.remote_applied = true;
            report.description_applied = true;
            info!("remote {} applied", remote.kind);
            self.transition(BootstrapState::RemoteApplied);
        } else if self.state == BootstrapState::RemoteApplied {
            self.transition(BootstrapState::CandidatesFlowing);
        }

        if self.config.role == Role::Answerer && !self.answer_requested {
            match self.engine.set_local_description(SignalKind::Answer) {
                Ok(()) => self.answer_requested = true,
                Err(err) => warn!("answer not created, retrying next tick: {}", err),
            }
        }

        for entry in remote.candidates.iter().skip(self.applied_candidates) {
            if let Err(err) = self.engine.add_remote_candidate(entry) {
                warn!(
                    "remote candidate #{} rejected, retrying next tick: {}",
                    self.applied_candidates, err
                );
                break;
            }
            info!(
                "remote candidate #{} applied (mid {})",
                self.applied_candidates, entry.media_id
            );
            self.applied_candidates += 1;
            self.status
                .applied_candidates
                .store(self.applied_candidates, Ordering::Release);
            report.candidates_applied += 1;
        }

        report
    }

    /// Send a message on the data channel. Nothing is queued when it is not open.
    pub fn send_message(&mut self, text: &str) -> Result<(), PeerError> {
        if self.state == BootstrapState::Closed {
            return Err(PeerError::Closed);
        }
        if !self.channel_open {
            return Err(PeerError::ChannelNotOpen);
        }
        self.engine.send(text)?;
        Ok(())
    }

    /// Close the engine. Terminal.
    pub fn close(&mut self) {
        if self.state == BootstrapState::Closed {
            return;
        }
        self.status.request_exit();
        self.engine.close();
        self.transition(BootstrapState::Closed);
    }

    fn handle_event_after_close(&mut self, event: EngineEvent) -> Option<String> {
        match event {
            EngineEvent::Message(text) => {
                self.status.messages_received.fetch_add(1, Ordering::Relaxed);
                Some(text)
            }
            EngineEvent::ChannelClosed => {
                self.channel_open = false;
                self.status.channel_open.store(false, Ordering::Release);
                None
            }
            other => {
                debug!("ignoring engine event after close: {:?}", other);
                None
            }
        }
    }

    fn send_greeting(&mut self) {
        if self.config.role != Role::Offerer {
            return;
        }
        let Some(greeting) = self.config.greeting.clone() else {
            return;
        };
        match self.engine.send(&greeting) {
            Ok(()) => info!("greeting sent"),
            Err(err) => warn!("greeting not sent: {}", err),
        }
    }

    /// Write the local record. A failed write is logged and retried on the
    /// next mutation or tick.
    fn persist_local(&mut self) -> bool {
        match self.local.persist(&self.store, &self.local_path) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "failed to write {}, will retry: {}",
                    self.local_path.display(),
                    err
                );
                false
            }
        }
    }

    fn transition(&mut self, next: BootstrapState) {
        if self.state == BootstrapState::Closed || self.state == next {
            return;
        }
        debug!("bootstrap state {} -> {}", self.state, next);
        self.state = next;
        self.status.set_state(next);
    }
}
