//! Answer-side session driven entirely by its host.
//!
//! Hosts without a background thread (a page, a plugin, an FFI caller) hand
//! the session the offer text whenever they have it, possibly the same text
//! several times as it grows. The session applies what is new, and the host
//! collects the resulting answer text, event log lines and inbound messages
//! whenever it next looks.

use crate::engine::{EngineEvent, EventStream, PeerEngine};
use crate::loopback::LoopbackEngine;
use crate::outbound::OutboundSignal;
use serde::Serialize;
use sigdrop_core::{parse, SignalKind};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Outcome of [`AnswerSession::apply_external_offer`].
///
/// Serialized in camelCase for script hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferApplyResult {
    pub success: bool,
    /// The offer's description is in effect.
    pub applied_description: bool,
    /// Distinct remote candidates applied so far, across all calls.
    pub applied_candidate_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OfferApplyResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelPhase {
    Absent,
    Received,
    Open,
    Closed,
}

pub struct AnswerSession<E: PeerEngine> {
    engine: E,
    events: EventStream,
    local: OutboundSignal,
    description_applied: bool,
    answer_requested: bool,
    applied: HashSet<(String, String)>,
    channel: ChannelPhase,
    event_log: VecDeque<String>,
    messages: VecDeque<String>,
}

impl AnswerSession<LoopbackEngine> {
    /// Session backed by the in-process loopback engine.
    pub fn loopback() -> Self {
        let (sink, events) = crate::engine::event_channel();
        Self::new(LoopbackEngine::new(sink), events)
    }
}

impl<E: PeerEngine> AnswerSession<E> {
    /// `events` must be the stream paired with the sink `engine` emits into.
    pub fn new(engine: E, events: EventStream) -> Self {
        Self {
            engine,
            events,
            local: OutboundSignal::new(SignalKind::Answer),
            description_applied: false,
            answer_requested: false,
            applied: HashSet::new(),
            channel: ChannelPhase::Absent,
            event_log: VecDeque::new(),
            messages: VecDeque::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Apply whatever in `text` has not been applied yet.
    ///
    /// The description is applied on the first successful call only.
    /// Candidates are deduplicated by `(media id, candidate)`, so the same
    /// text can be submitted any number of times.
    pub fn apply_external_offer(&mut self, text: &str) -> OfferApplyResult {
        self.pump();
        let result = self.apply_offer_text(text);
        self.pump();
        if let Some(err) = &result.error {
            self.log_event(format!("offer not applied: {err}"));
        }
        result
    }

    fn apply_offer_text(&mut self, text: &str) -> OfferApplyResult {
        let mut result = OfferApplyResult {
            applied_description: self.description_applied,
            applied_candidate_count: self.applied.len(),
            ..Default::default()
        };

        let Some(record) = parse(text) else {
            result.error = Some("offer text is not a signal record".into());
            return result;
        };
        if record.kind != SignalKind::Offer {
            result.error = Some(format!("expected an offer, got `{}`", record.kind));
            return result;
        }

        if !self.description_applied {
            if !record.has_description() {
                result.error = Some("offer has no session description".into());
                return result;
            }
            if let Err(err) = self.engine.set_remote_description(&record.sdp, &record.kind) {
                warn!("offer rejected: {}", err);
                result.error = Some(err.to_string());
                return result;
            }
            self.description_applied = true;
            result.applied_description = true;
            info!("remote offer applied");
            self.log_event("remote offer applied".into());
        }

        if !self.answer_requested {
            match self.engine.set_local_description(SignalKind::Answer) {
                Ok(()) => self.answer_requested = true,
                Err(err) => {
                    warn!("answer not created: {}", err);
                    result.error = Some(err.to_string());
                }
            }
        }

        for entry in &record.candidates {
            let key = (entry.media_id.clone(), entry.candidate.clone());
            if self.applied.contains(&key) {
                continue;
            }
            match self.engine.add_remote_candidate(entry) {
                Ok(()) => {
                    info!("remote candidate applied (mid {})", entry.media_id);
                    self.applied.insert(key);
                }
                Err(err) => {
                    warn!("remote candidate rejected: {}", err);
                    result.error.get_or_insert_with(|| err.to_string());
                }
            }
        }

        result.applied_candidate_count = self.applied.len();
        result.success = result.error.is_none();
        result
    }

    /// Whether the answer changed since it was last consumed.
    pub fn has_pending_outbound_signal(&mut self) -> bool {
        self.pump();
        self.local.is_dirty()
    }

    /// The serialized answer if it changed since the last call, else an empty string.
    pub fn consume_outbound_signal(&mut self) -> String {
        self.pump();
        self.local.consume().unwrap_or_default()
    }

    pub fn drain_events(&mut self) -> Vec<String> {
        self.pump();
        self.event_log.drain(..).collect()
    }

    pub fn drain_messages(&mut self) -> Vec<String> {
        self.pump();
        self.messages.drain(..).collect()
    }

    /// Send on the data channel. Returns `false` (and sends nothing) unless
    /// a channel exists and is open.
    pub fn send_message(&mut self, text: &str) -> bool {
        self.pump();
        if self.channel != ChannelPhase::Open {
            debug!("send dropped: data channel not open");
            return false;
        }
        match self.engine.send(text) {
            Ok(()) => true,
            Err(err) => {
                warn!("send failed: {}", err);
                false
            }
        }
    }

    pub fn is_channel_open(&mut self) -> bool {
        self.pump();
        self.channel == ChannelPhase::Open
    }

    /// Fold queued engine events into session state.
    fn pump(&mut self) {
        while let Some(event) = self.events.try_recv() {
            match event {
                EngineEvent::LocalDescription { sdp, kind } => {
                    self.local.set_description(kind.clone(), sdp);
                    self.log_event(format!("local {kind} ready"));
                }
                EngineEvent::LocalCandidate(entry) => {
                    self.log_event(format!("local candidate: {}", entry.candidate));
                    self.local.push_candidate(entry);
                }
                EngineEvent::DataChannel { label } => {
                    self.channel = ChannelPhase::Received;
                    self.log_event(format!("data channel '{label}' received"));
                }
                EngineEvent::ChannelOpen => {
                    self.channel = ChannelPhase::Open;
                    self.log_event("data channel open".into());
                }
                EngineEvent::ChannelClosed => {
                    self.channel = ChannelPhase::Closed;
                    self.log_event("data channel closed".into());
                }
                EngineEvent::Message(text) => {
                    self.messages.push_back(text);
                }
                EngineEvent::ConnectionState(state) => {
                    self.log_event(format!("connection state: {state}"));
                }
                EngineEvent::GatheringState(state) => {
                    self.log_event(format!("gathering state: {state}"));
                }
            }
        }
    }

    fn log_event(&mut self, line: String) {
        debug!("{}", line);
        self.event_log.push_back(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigdrop_core::{serialize, CandidateEntry, SignalRecord};

    const FIRST: &str = "candidate:1 1 UDP 2122260223 127.0.0.1 50000 typ host";
    const SECOND: &str = "candidate:2 1 UDP 2122260223 127.0.0.1 50001 typ host";

    fn offer_text(candidates: &[&str]) -> String {
        let mut record = SignalRecord::with_sdp(SignalKind::Offer, "v=0\ns=-\n");
        for text in candidates {
            record.push_candidate(CandidateEntry::new("0", *text));
        }
        serialize(&record)
    }

    #[test]
    fn applying_offer_produces_answer() {
        let mut session = AnswerSession::loopback();
        assert!(!session.has_pending_outbound_signal());
        assert_eq!(session.consume_outbound_signal(), "");

        let result = session.apply_external_offer(&offer_text(&[FIRST, SECOND]));
        assert_eq!(
            result,
            OfferApplyResult {
                success: true,
                applied_description: true,
                applied_candidate_count: 2,
                error: None,
            }
        );

        assert!(session.has_pending_outbound_signal());
        let answer = parse(&session.consume_outbound_signal()).unwrap();
        assert_eq!(answer.kind, SignalKind::Answer);
        assert!(answer.has_description());
        assert_eq!(answer.candidates.len(), 2);

        assert!(!session.has_pending_outbound_signal());
        assert_eq!(session.consume_outbound_signal(), "");
    }

    #[test]
    fn identical_offer_twice_keeps_count() {
        let mut session = AnswerSession::loopback();
        let text = offer_text(&[FIRST, SECOND]);

        let first = session.apply_external_offer(&text);
        let second = session.apply_external_offer(&text);
        assert!(first.success && second.success);
        assert_eq!(first.applied_candidate_count, 2);
        assert_eq!(second.applied_candidate_count, 2);
        assert!(second.applied_description);
    }

    #[test]
    fn growing_offer_applies_only_new_candidates() {
        let mut session = AnswerSession::loopback();
        assert_eq!(
            session
                .apply_external_offer(&offer_text(&[FIRST]))
                .applied_candidate_count,
            1
        );
        assert_eq!(
            session
                .apply_external_offer(&offer_text(&[FIRST, SECOND]))
                .applied_candidate_count,
            2
        );
    }

    #[test]
    fn rejects_non_offer_and_garbage() {
        let mut session = AnswerSession::loopback();

        let garbage = session.apply_external_offer("hello there");
        assert!(!garbage.success);
        assert!(garbage.error.is_some());

        let answer = serialize(&SignalRecord::with_sdp(SignalKind::Answer, "v=0\n"));
        let wrong_kind = session.apply_external_offer(&answer);
        assert!(!wrong_kind.success);
        assert!(!wrong_kind.applied_description);

        let empty = session.apply_external_offer("type:offer\nsdp-begin\nsdp-end\n");
        assert_eq!(
            empty.error.as_deref(),
            Some("offer has no session description")
        );
        assert!(!session.has_pending_outbound_signal());
    }

    #[test]
    fn rejected_candidate_is_reported_and_retried() {
        let mut session = AnswerSession::loopback();
        let result = session.apply_external_offer(&offer_text(&[FIRST, "bogus"]));
        assert!(!result.success);
        assert!(result.applied_description);
        assert_eq!(result.applied_candidate_count, 1);

        let again = session.apply_external_offer(&offer_text(&[FIRST]));
        assert!(again.success);
        assert_eq!(again.applied_candidate_count, 1);
    }

    #[test]
    fn channel_opens_and_echoes_messages() {
        let mut session = AnswerSession::loopback();
        assert!(!session.is_channel_open());
        assert!(!session.send_message("too early"));

        session.apply_external_offer(&offer_text(&[FIRST]));
        assert!(session.is_channel_open());

        let events = session.drain_events();
        assert!(events.iter().any(|e| e == "data channel open"));
        assert!(events.iter().any(|e| e == "data channel 'remote' received"));
        assert!(session.drain_events().is_empty());

        assert!(session.send_message("ping"));
        assert_eq!(session.drain_messages(), vec!["ping".to_string()]);
        assert!(session.drain_messages().is_empty());
    }

    #[test]
    fn result_serializes_camel_case() {
        let ok = OfferApplyResult {
            success: true,
            applied_description: true,
            applied_candidate_count: 2,
            error: None,
        };
        assert_eq!(
            ok.to_json().unwrap(),
            r#"{"success":true,"appliedDescription":true,"appliedCandidateCount":2}"#
        );

        let failed = OfferApplyResult {
            error: Some("bad".into()),
            ..Default::default()
        };
        let value: serde_json::Value = serde_json::from_str(&failed.to_json().unwrap()).unwrap();
        assert_eq!(value["error"], "bad");
        assert_eq!(value["success"], false);
    }
}
