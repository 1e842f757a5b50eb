//! The signal record: one party's negotiation state as written to its signal file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KindError {
    #[error("signal kind is empty")]
    Empty,
}

/// Description kind carried on the `type:` line.
///
/// Only `offer` and `answer` drive the bootstrap; any other non-empty
/// value is kept verbatim so a record survives a parse/serialize cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SignalKind {
    Offer,
    Answer,
    Other(String),
}

impl SignalKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(KindError::Empty),
            "offer" => Ok(Self::Offer),
            "answer" => Ok(Self::Answer),
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

impl From<SignalKind> for String {
    fn from(kind: SignalKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for SignalKind {
    type Error = KindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One ICE candidate as exchanged through the signal file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateEntry {
    /// Media stream identification ("sdpMid").
    pub media_id: String,
    /// Transport description, opaque at this layer.
    pub candidate: String,
    /// SDP media line index; absent on canonical candidate lines.
    #[serde(default)]
    pub media_line_index: Option<u16>,
}

impl CandidateEntry {
    pub fn new(media_id: impl Into<String>, candidate: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            candidate: candidate.into(),
            media_line_index: None,
        }
    }

    pub fn with_media_line_index(mut self, index: u16) -> Self {
        self.media_line_index = Some(index);
        self
    }

    /// Media line index handed to the engine when the wire did not carry one.
    pub fn media_line_index_or_default(&self) -> u16 {
        self.media_line_index.unwrap_or(0)
    }
}

/// Description plus candidates published by one party.
///
/// `candidates` is append-only and kept in discovery order: the remote
/// side tracks what it has applied by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub kind: SignalKind,
    pub sdp: String,
    #[serde(default)]
    pub candidates: Vec<CandidateEntry>,
}

impl SignalRecord {
    /// An empty record of the given kind, before the engine produced a description.
    pub fn new(kind: SignalKind) -> Self {
        Self {
            kind,
            sdp: String::new(),
            candidates: Vec::new(),
        }
    }

    pub fn with_sdp(kind: SignalKind, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
            candidates: Vec::new(),
        }
    }

    pub fn has_description(&self) -> bool {
        !self.sdp.is_empty()
    }

    pub fn push_candidate(&mut self, entry: CandidateEntry) {
        self.candidates.push(entry);
    }
}
