use sigdrop_common::{Error, Result};
use sigdrop_core::{SignalKind, ANSWER_FILE_NAME, OFFER_FILE_NAME};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

pub const DEFAULT_SIGNAL_DIR: &str = "./signals";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_GREETING: &str = "Hello from the offerer!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Offerer,
    Answerer,
}

impl Role {
    /// Kind of description this role publishes.
    pub fn local_kind(self) -> SignalKind {
        match self {
            Self::Offerer => SignalKind::Offer,
            Self::Answerer => SignalKind::Answer,
        }
    }

    /// Kind of description this role expects from the other party.
    pub fn remote_kind(self) -> SignalKind {
        match self {
            Self::Offerer => SignalKind::Answer,
            Self::Answerer => SignalKind::Offer,
        }
    }

    pub fn local_file_name(self) -> &'static str {
        match self {
            Self::Offerer => OFFER_FILE_NAME,
            Self::Answerer => ANSWER_FILE_NAME,
        }
    }

    pub fn remote_file_name(self) -> &'static str {
        match self {
            Self::Offerer => ANSWER_FILE_NAME,
            Self::Answerer => OFFER_FILE_NAME,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offerer => f.write_str("offer"),
            Self::Answerer => f.write_str("answer"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub role: Role,
    pub signal_dir: PathBuf,
    pub poll_interval: Duration,
    /// Sent by the offerer as soon as the data channel opens.
    pub greeting: Option<String>,
}

impl PeerConfig {
    pub fn new(role: Role, signal_dir: impl Into<PathBuf>) -> Self {
        let greeting = match role {
            Role::Offerer => Some(DEFAULT_GREETING.to_string()),
            Role::Answerer => None,
        };
        Self {
            role,
            signal_dir: signal_dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            greeting,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_greeting(mut self, greeting: Option<String>) -> Self {
        self.greeting = greeting;
        self
    }

    pub fn local_signal_path(&self) -> PathBuf {
        self.signal_dir.join(self.role.local_file_name())
    }

    pub fn remote_signal_path(&self) -> PathBuf {
        self.signal_dir.join(self.role.remote_file_name())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be non-zero"));
        }
        if self.signal_dir.as_os_str().is_empty() {
            return Err(Error::config("signal directory must not be empty"));
        }
        Ok(())
    }
}

/// Progress of the bootstrap, most advanced milestone first reached.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BootstrapState {
    Idle = 0,
    LocalDescriptionPending = 1,
    LocalDescriptionPublished = 2,
    RemoteApplied = 3,
    CandidatesFlowing = 4,
    ChannelOpen = 5,
    Closed = 6,
}

impl BootstrapState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::LocalDescriptionPending,
            2 => Self::LocalDescriptionPublished,
            3 => Self::RemoteApplied,
            4 => Self::CandidatesFlowing,
            5 => Self::ChannelOpen,
            6 => Self::Closed,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LocalDescriptionPending => "local-description-pending",
            Self::LocalDescriptionPublished => "local-description-published",
            Self::RemoteApplied => "remote-applied",
            Self::CandidatesFlowing => "candidates-flowing",
            Self::ChannelOpen => "channel-open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Session flags observable from other threads.
///
/// Each flag has a single writer and only moves monotonically (or is set
/// once), so plain atomics are enough.
#[derive(Debug, Default)]
pub struct PeerStatus {
    pub channel_open: AtomicBool,
    pub exit_requested: AtomicBool,
    pub applied_candidates: AtomicUsize,
    pub messages_received: AtomicU64,
    state: AtomicU8,
}

impl PeerStatus {
    pub fn state(&self) -> BootstrapState {
        BootstrapState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: BootstrapState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn should_exit(&self) -> bool {
        self.exit_requested.load(Ordering::Acquire)
    }

    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_paths_point_at_each_other() {
        let offer = PeerConfig::new(Role::Offerer, "/tmp/signals");
        let answer = PeerConfig::new(Role::Answerer, "/tmp/signals");

        assert_eq!(offer.local_signal_path(), answer.remote_signal_path());
        assert_eq!(offer.remote_signal_path(), answer.local_signal_path());
        assert!(offer.local_signal_path().ends_with("offer.txt"));
    }

    #[test]
    fn role_displays_file_stem() {
        assert_eq!(Role::Offerer.to_string(), "offer");
        assert_eq!(Role::Answerer.to_string(), "answer");
    }

    #[test]
    fn only_offerer_greets_by_default() {
        assert!(PeerConfig::new(Role::Offerer, ".").greeting.is_some());
        assert!(PeerConfig::new(Role::Answerer, ".").greeting.is_none());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = PeerConfig::new(Role::Offerer, ".").with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
        assert!(PeerConfig::new(Role::Offerer, ".").validate().is_ok());
    }

    #[test]
    fn status_state_round_trips() {
        let status = PeerStatus::default();
        assert_eq!(status.state(), BootstrapState::Idle);
        status.set_state(BootstrapState::CandidatesFlowing);
        assert_eq!(status.state(), BootstrapState::CandidatesFlowing);
        status.set_state(BootstrapState::Closed);
        assert_eq!(status.state(), BootstrapState::Closed);
    }
}
