//! The driver task: one loop owning the orchestrator.

use crate::engine::{EventStream, PeerEngine};
use crate::error::PeerError;
use crate::orchestrator::Orchestrator;
use crate::types::BootstrapState;
use sigdrop_core::SignalStore;
use std::future::Future;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Depth of the console command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCommand {
    /// Send a line on the data channel.
    Send(String),
    Exit,
}

/// Why the driver loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A [`PeerCommand::Exit`] arrived.
    ExitCommand,
    /// The shutdown future completed.
    Shutdown,
}

/// Summary handed back once the driver stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerReport {
    pub stop_reason: StopReason,
    pub final_state: BootstrapState,
    pub applied_candidates: usize,
    pub messages_received: u64,
}

/// Run the bootstrap until an exit command or `shutdown`.
///
/// Multiplexes the poll interval, engine events and commands in a single
/// task, so the orchestrator is never touched concurrently. A closed command
/// channel (console at end of input) only stops command handling; polling
/// goes on. `on_message` is called with each inbound data-channel message.
/// Only startup errors are returned; everything after that is logged and
/// retried.
pub async fn run_peer<E, S, F>(
    mut orchestrator: Orchestrator<E, S>,
    mut events: EventStream,
    mut commands: mpsc::Receiver<PeerCommand>,
    shutdown: F,
    mut on_message: impl FnMut(&str),
) -> Result<PeerReport, PeerError>
where
    E: PeerEngine,
    S: SignalStore,
    F: Future<Output = ()>,
{
    let role = orchestrator.role();
    orchestrator.start()?;
    info!(
        "{} peer started, signal dir {}",
        role,
        orchestrator.config().signal_dir.display()
    );

    let mut ticker = time::interval(orchestrator.config().poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    let mut commands_open = true;

    let stop_reason = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break StopReason::Shutdown;
            }

            Some(event) = events.recv() => {
                if let Some(text) = orchestrator.handle_event(event) {
                    on_message(&text);
                }
            }

            command = commands.recv(), if commands_open => {
                match command {
                    Some(PeerCommand::Send(text)) => {
                        match orchestrator.send_message(&text) {
                            Ok(()) => debug!("sent {} bytes", text.len()),
                            Err(err) if err.is_transient() => {
                                warn!("channel not open yet, message dropped")
                            }
                            Err(err) => warn!("send failed: {}", err),
                        }
                    }
                    Some(PeerCommand::Exit) => {
                        info!("exit requested");
                        break StopReason::ExitCommand;
                    }
                    None => {
                        debug!("command channel closed, still polling");
                        commands_open = false;
                    }
                }
            }

            _ = ticker.tick() => {
                let report = orchestrator.poll_remote();
                if report.description_applied || report.candidates_applied > 0 {
                    debug!(
                        "tick: description_applied={} candidates_applied={}",
                        report.description_applied, report.candidates_applied
                    );
                }
            }
        }
    };

    orchestrator.close();
    while let Some(event) = events.try_recv() {
        if let Some(text) = orchestrator.handle_event(event) {
            on_message(&text);
        }
    }

    let status = orchestrator.status();
    let report = PeerReport {
        stop_reason,
        final_state: orchestrator.state(),
        applied_candidates: orchestrator.applied_candidate_count(),
        messages_received: status.messages_received.load(Ordering::Relaxed),
    };
    info!(
        "{} peer stopped: {} remote candidate(s) applied, {} message(s) received",
        role, report.applied_candidates, report.messages_received
    );
    Ok(report)
}
