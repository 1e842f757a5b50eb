//! Line-based signal file format.
//!
//! ```text
//! type:<kind>
//! sdp-begin
//! <sdp body, verbatim>
//! sdp-end
//! candidate:<media id>|<candidate text>
//! ```
//!
//! Parsing is lenient about what a concurrent writer may leave behind: a
//! missing `sdp-end` yields whatever SDP was read so far, and anything that
//! does not start like a signal file is "no record" rather than an error.

use crate::record::{CandidateEntry, SignalKind, SignalRecord};

const TYPE_PREFIX: &str = "type:";
const CANDIDATE_PREFIX: &str = "candidate:";
const SDP_BEGIN: &str = "sdp-begin";
const SDP_END: &str = "sdp-end";
const FIELD_SEPARATOR: char = '|';

/// How candidate lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateFormat {
    /// `candidate:<mid>|<text>`; the media line index is not written.
    #[default]
    Canonical,
    /// `candidate:<mid>|<index>|<text>` for entries that carry an index.
    WithMediaLineIndex,
}

/// Serialize a record in the canonical form.
pub fn serialize(record: &SignalRecord) -> String {
    encode(record, CandidateFormat::Canonical)
}

pub fn encode(record: &SignalRecord, format: CandidateFormat) -> String {
    let mut out = String::with_capacity(record.sdp.len() + 64 * (record.candidates.len() + 1));

    out.push_str(TYPE_PREFIX);
    out.push_str(record.kind.as_str());
    out.push('\n');

    out.push_str(SDP_BEGIN);
    out.push('\n');
    if !record.sdp.is_empty() {
        out.push_str(&record.sdp);
        if !record.sdp.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str(SDP_END);
    out.push('\n');

    for entry in &record.candidates {
        out.push_str(CANDIDATE_PREFIX);
        out.push_str(&entry.media_id);
        out.push(FIELD_SEPARATOR);
        if let (CandidateFormat::WithMediaLineIndex, Some(index)) =
            (format, entry.media_line_index)
        {
            out.push_str(&index.to_string());
            out.push(FIELD_SEPARATOR);
        }
        out.push_str(&entry.candidate);
        out.push('\n');
    }

    out
}

/// Parse signal file text.
///
/// Returns `None` when the text does not open with a `type:` line followed
/// by `sdp-begin`; callers treat that exactly like a missing file.
pub fn parse(text: &str) -> Option<SignalRecord> {
    // Split on '\n' only so SDP lines keep a trailing '\r' verbatim.
    let mut lines = text
        .split_inclusive('\n')
        .map(|line| line.strip_suffix('\n').unwrap_or(line));

    let kind_line = next_significant(&mut lines)?;
    let kind: SignalKind = kind_line.strip_prefix(TYPE_PREFIX)?.trim().parse().ok()?;

    if next_significant(&mut lines)? != SDP_BEGIN {
        return None;
    }

    let mut sdp = String::new();
    for line in lines.by_ref() {
        if line.trim() == SDP_END {
            break;
        }
        sdp.push_str(line);
        sdp.push('\n');
    }

    let candidates = lines
        .filter_map(|line| line.trim().strip_prefix(CANDIDATE_PREFIX))
        .filter_map(parse_candidate)
        .collect();

    Some(SignalRecord {
        kind,
        sdp,
        candidates,
    })
}

fn next_significant<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Option<&'a str> {
    lines.map(str::trim).find(|line| !line.is_empty())
}

fn parse_candidate(payload: &str) -> Option<CandidateEntry> {
    let (media_id, rest) = payload.split_once(FIELD_SEPARATOR)?;

    let (media_line_index, candidate) = match rest.split_once(FIELD_SEPARATOR) {
        Some((index, text)) if is_index_field(index) => (index.parse::<u16>().ok(), text),
        _ => (None, rest),
    };

    if candidate.is_empty() {
        return None;
    }

    Some(CandidateEntry {
        media_id: media_id.to_string(),
        candidate: candidate.to_string(),
        media_line_index,
    })
}

fn is_index_field(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}
