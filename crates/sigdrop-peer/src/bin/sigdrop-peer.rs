#![forbid(unsafe_code)]

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use sigdrop_core::FileStore;
use sigdrop_peer::types::{DEFAULT_POLL_INTERVAL, DEFAULT_SIGNAL_DIR};
use sigdrop_peer::{
    event_channel, run_peer, spawn_console_reader, LoopbackEngine, Orchestrator, PeerConfig,
    Role, StopReason, COMMAND_QUEUE_DEPTH, EXIT_COMMAND,
};
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Offer,
    Answer,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Offer => Role::Offerer,
            RoleArg::Answer => Role::Answerer,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "sigdrop-peer", version, about = "Bootstrap a data channel through signal files")]
struct Args {
    /// Side of the exchange this process plays
    #[arg(long, value_enum)]
    role: RoleArg,
    /// Directory shared with the other peer
    #[arg(long, env = "SIGDROP_SIGNAL_DIR", default_value = DEFAULT_SIGNAL_DIR)]
    signal_dir: PathBuf,
    /// How often the other peer's file is re-read
    #[arg(long, env = "SIGDROP_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,
    /// Message the offerer sends once the channel opens
    #[arg(long)]
    greeting: Option<String>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    sigdrop_common::init_tracing();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = PeerConfig::new(args.role.into(), args.signal_dir)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));
    if args.greeting.is_some() {
        config = config.with_greeting(args.greeting);
    }
    config.validate()?;
    FileStore::ensure_dir(&config.signal_dir).with_context(|| {
        format!(
            "signal directory {} is not usable",
            config.signal_dir.display()
        )
    })?;

    let (sink, events) = event_channel();
    let orchestrator = Orchestrator::new(config, LoopbackEngine::new(sink), FileStore::new());
    let status = orchestrator.status();

    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let console = spawn_console_reader(BufReader::new(io::stdin()), tx, Arc::clone(&status));
    info!(
        "type a line to send it once the channel is open, {} to quit",
        EXIT_COMMAND
    );

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    let report = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_peer(orchestrator, events, rx, shutdown, |text| {
            println!("[remote] {text}");
        }))
        .context("peer failed to start")?;

    // `/exit` came from the reader, which is returning now. Otherwise a reader
    // still blocked on stdin is left behind and ends with the process.
    if report.stop_reason == StopReason::ExitCommand || console.is_finished() {
        console
            .join()
            .map_err(|_| sigdrop_common::Error::internal("console reader panicked"))?;
    } else {
        debug!("console reader still blocked on input, not waiting for it");
    }

    info!("final state: {}", report.final_state);
    Ok(())
}
