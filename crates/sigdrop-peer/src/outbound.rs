//! The local signal record and its "needs publishing" flag.

use sigdrop_common::Result;
use sigdrop_core::{encode, CandidateEntry, CandidateFormat, SignalKind, SignalRecord, SignalStore};
use std::path::Path;

/// Local record owned by one writer.
///
/// Every mutation marks the record dirty; publishing it (to a file or to a
/// host that consumes the text) clears the flag.
#[derive(Debug, Clone)]
pub struct OutboundSignal {
    record: SignalRecord,
    format: CandidateFormat,
    dirty: bool,
}

impl OutboundSignal {
    pub fn new(kind: SignalKind) -> Self {
        Self {
            record: SignalRecord::new(kind),
            format: CandidateFormat::Canonical,
            dirty: false,
        }
    }

    pub fn with_format(mut self, format: CandidateFormat) -> Self {
        self.format = format;
        self
    }

    pub fn record(&self) -> &SignalRecord {
        &self.record
    }

    pub fn set_description(&mut self, kind: SignalKind, sdp: String) {
        self.record.kind = kind;
        self.record.sdp = sdp;
        self.dirty = true;
    }

    pub fn push_candidate(&mut self, entry: CandidateEntry) {
        self.record.push_candidate(entry);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn text(&self) -> String {
        encode(&self.record, self.format)
    }

    /// Serialized record if it changed since the last publish, clearing the flag.
    pub fn consume(&mut self) -> Option<String> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.text())
    }

    /// Write the record to `path`. On failure the record stays dirty.
    pub fn persist(&mut self, store: &dyn SignalStore, path: &Path) -> Result<()> {
        store.write(path, &self.text())?;
        self.dirty = false;
        Ok(())
    }
}
