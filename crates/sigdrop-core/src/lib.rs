//! Core sigdrop signaling types, wire format, and persistence.
//!
//! This crate provides:
//! - The signal record exchanged between the two parties
//! - The line-based codec that writes and reads the signal files
//! - Signal stores: the shared-directory file store and an in-memory store

#![forbid(unsafe_code)]

pub mod codec;
pub mod record;
pub mod store;

pub use codec::{encode, parse, serialize, CandidateFormat};
pub use record::{CandidateEntry, KindError, SignalKind, SignalRecord};
pub use store::{FileStore, MemoryStore, SignalStore};

/// File name written by the offering party.
pub const OFFER_FILE_NAME: &str = "offer.txt";
/// File name written by the answering party.
pub const ANSWER_FILE_NAME: &str = "answer.txt";
