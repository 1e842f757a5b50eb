//! Two peers bootstrapping each other through a shared signal directory.

use sigdrop_core::{parse, FileStore, SignalKind, ANSWER_FILE_NAME, OFFER_FILE_NAME};
use sigdrop_peer::{
    event_channel, run_peer, BootstrapState, LoopbackEngine, Orchestrator, PeerCommand,
    PeerConfig, PeerStatus, Role, COMMAND_QUEUE_DEPTH,
};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

struct Peer {
    status: Arc<PeerStatus>,
    commands: mpsc::Sender<PeerCommand>,
    shutdown: oneshot::Sender<()>,
    inbox: Arc<Mutex<Vec<String>>>,
    driver: JoinHandle<Result<sigdrop_peer::PeerReport, sigdrop_peer::PeerError>>,
}

fn spawn_peer(role: Role, dir: &Path) -> Peer {
    let (sink, events) = event_channel();
    let config = PeerConfig::new(role, dir).with_poll_interval(Duration::from_millis(20));
    let orchestrator = Orchestrator::new(config, LoopbackEngine::new(sink), FileStore::new());
    let status = orchestrator.status();

    let (commands, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (shutdown, stop) = oneshot::channel::<()>();
    let inbox = Arc::new(Mutex::new(Vec::new()));
    let sink_inbox = Arc::clone(&inbox);

    let driver = tokio::spawn(run_peer(
        orchestrator,
        events,
        rx,
        async move {
            let _ = stop.await;
        },
        move |text: &str| sink_inbox.lock().unwrap().push(text.to_string()),
    ));

    Peer {
        status,
        commands,
        shutdown,
        inbox,
        driver,
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peers did not converge in time");
}

#[tokio::test]
async fn peers_exchange_signals_and_open_channel() {
    let dir = tempfile::tempdir().unwrap();
    let offerer = spawn_peer(Role::Offerer, dir.path());
    let answerer = spawn_peer(Role::Answerer, dir.path());

    wait_until(|| {
        offerer.status.state() == BootstrapState::ChannelOpen
            && answerer.status.state() == BootstrapState::ChannelOpen
            && offerer.status.applied_candidates.load(Ordering::Acquire) == 2
            && answerer.status.applied_candidates.load(Ordering::Acquire) == 2
            && !offerer.inbox.lock().unwrap().is_empty()
    })
    .await;

    // The loopback engine echoes, so the greeting comes straight back.
    assert_eq!(
        offerer.inbox.lock().unwrap().first().map(String::as_str),
        Some("Hello from the offerer!")
    );

    answerer
        .commands
        .send(PeerCommand::Send("hello from the answerer".into()))
        .await
        .unwrap();
    wait_until(|| !answerer.inbox.lock().unwrap().is_empty()).await;

    offerer.shutdown.send(()).unwrap();
    answerer.commands.send(PeerCommand::Exit).await.unwrap();
    let offer_report = offerer.driver.await.unwrap().unwrap();
    let answer_report = answerer.driver.await.unwrap().unwrap();

    assert_eq!(offer_report.final_state, BootstrapState::Closed);
    assert_eq!(answer_report.final_state, BootstrapState::Closed);
    assert_eq!(offer_report.applied_candidates, 2);
    assert_eq!(answer_report.applied_candidates, 2);
    assert!(offer_report.messages_received >= 1);
    assert!(offerer.status.should_exit());

    let offer = parse(&std::fs::read_to_string(dir.path().join(OFFER_FILE_NAME)).unwrap()).unwrap();
    let answer =
        parse(&std::fs::read_to_string(dir.path().join(ANSWER_FILE_NAME)).unwrap()).unwrap();
    assert_eq!(offer.kind, SignalKind::Offer);
    assert_eq!(answer.kind, SignalKind::Answer);
    assert_eq!(offer.candidates.len(), 2);
    assert_eq!(answer.candidates.len(), 2);
}

#[tokio::test]
async fn answerer_waits_without_offer() {
    let dir = tempfile::tempdir().unwrap();
    let answerer = spawn_peer(Role::Answerer, dir.path());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(answerer.status.state(), BootstrapState::Idle);
    assert!(!dir.path().join(ANSWER_FILE_NAME).exists());

    answerer.commands.send(PeerCommand::Exit).await.unwrap();
    let report = answerer.driver.await.unwrap().unwrap();
    assert_eq!(report.final_state, BootstrapState::Closed);
    assert_eq!(report.applied_candidates, 0);
}
