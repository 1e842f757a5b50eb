//! Line-oriented console input.
//!
//! Reading a line blocks, so the reader lives on its own OS thread and
//! forwards commands to the driver over a channel. It never touches the
//! orchestrator.

use crate::runtime::PeerCommand;
use crate::types::PeerStatus;
use std::io::BufRead;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Typed on its own line, ends the session.
pub const EXIT_COMMAND: &str = "/exit";

/// Spawn the reader thread.
///
/// Every non-blank line becomes a [`PeerCommand::Send`] and [`EXIT_COMMAND`]
/// becomes [`PeerCommand::Exit`]. End of input only ends the thread; the
/// driver keeps running until it is told to exit or shut down. The thread
/// also stops when the driver goes away or has requested exit, but only
/// once its current blocking read returns.
pub fn spawn_console_reader<R>(
    input: R,
    tx: mpsc::Sender<PeerCommand>,
    status: Arc<PeerStatus>,
) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        for line in input.lines() {
            if status.should_exit() {
                return;
            }
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("console read error: {}", err);
                    break;
                }
            };
            let trimmed = line.trim_end_matches('\r');
            if trimmed.trim().is_empty() {
                continue;
            }
            if trimmed.trim() == EXIT_COMMAND {
                let _ = tx.blocking_send(PeerCommand::Exit);
                return;
            }
            if tx.blocking_send(PeerCommand::Send(trimmed.to_string())).is_err() {
                debug!("console reader stopping: driver gone");
                return;
            }
        }
        debug!("console input closed, reader stopping");
    })
}
