//! Session establishment, release and monitor attachment

use std::future::{pending, ready};
use std::sync::Arc;
use std::time::Duration;

use mqchat_core::{
    CapturedConsole, ChatError, EventLogger, MemoryBroker, MemoryEventLog, Participants,
    QueueProvider, Role,
};
use mqchat_runtime::{
    ChannelLease, ChatSession, GuiMonitor, MonitorStats, ShutdownReason, SESSION_ENDED_NOTICE,
};
use tokio::io::AsyncWriteExt;

use test_utils::{
    console_pipe, eventually, fast_settings, named, within, FailingProvider, FaultyProvider, Peer,
};

const MONITOR_BACKOFF: Duration = Duration::from_millis(20);

#[test]
fn test_lease_release_is_idempotent() {
    let broker = MemoryBroker::new();
    let (lease, channels) = ChannelLease::acquire(Arc::new(broker.clone()), &named("alice", "bob"))
        .expect("channels should open");

    assert!(broker.exists("/mq_alice_to_bob"));
    assert!(!lease.is_released());

    assert!(lease.release());
    assert!(!lease.release());
    assert!(lease.is_released());

    assert!(channels.to_peer.is_closed());
    assert!(channels.gui_in.is_closed());
    assert!(!broker.exists("/mq_alice_to_bob"));
    assert!(!broker.exists("/mq_bob_to_alice"));
    assert!(!broker.exists("/mq_gui_tx_alice"));

    // Dropping after an explicit release does nothing further
    drop(lease);
}

#[test]
fn test_dropping_lease_releases_channels() {
    let broker = MemoryBroker::new();
    let (_alice_lease, _alice_channels) =
        ChannelLease::acquire(Arc::new(broker.clone()), &named("alice", "bob")).unwrap();
    let (lease, channels) =
        ChannelLease::acquire(Arc::new(broker.clone()), &named("bob", "alice")).unwrap();
    drop(lease);

    assert!(channels.from_peer.is_closed());
    // bob attached to the pair alice created, so it is hers to remove
    assert!(broker.exists("/mq_bob_to_alice"));
    assert!(broker.exists("/mq_alice_to_bob"));
    assert!(!broker.exists("/mq_gui_rx_bob"));
}

#[test]
fn test_failed_startup_releases_earlier_channels() {
    let provider = Arc::new(FailingProvider::new(MemoryBroker::new(), 3));

    let err = ChannelLease::acquire(provider.clone(), &named("alice", "bob"))
        .err()
        .expect("third open should fail");
    match err {
        ChatError::ChannelSetup { name, .. } => assert_eq!(name, "/mq_gui_rx_alice"),
        other => panic!("unexpected error: {other}"),
    }

    let opened = provider.opened();
    assert_eq!(opened.len(), 2);
    assert!(opened.iter().all(|queue| queue.is_closed()));
    assert!(!provider.exists("/mq_alice_to_bob"));
    assert!(!provider.exists("/mq_bob_to_alice"));
}

#[test]
fn test_establish_fails_when_peer_created_incompatible_channel() {
    let broker = MemoryBroker::new();
    // A fixed-role channel with the same name but a smaller message size
    let fixed = Participants::fixed_role(Role::B);
    let (_lease, _channels) = ChannelLease::acquire(Arc::new(broker.clone()), &fixed).unwrap();

    let err = ChatSession::establish(
        named("a", "b"),
        Arc::new(broker.clone()),
        EventLogger::new(Arc::new(MemoryEventLog::new())),
        Arc::new(CapturedConsole::new()),
        fast_settings(),
    )
    .err()
    .expect("geometry mismatch should fail");
    assert!(matches!(err, ChatError::ChannelSetup { ref name, .. } if name == "/mq_a_to_b"));
}

#[test]
fn test_session_release_is_idempotent() {
    let broker = MemoryBroker::new();
    let alice = Peer::establish(Arc::new(broker.clone()), "alice", "bob");

    assert!(alice.session.release());
    assert!(!alice.session.release());
    assert!(!broker.exists("/mq_alice_to_bob"));
}

#[tokio::test]
async fn test_termination_signal_announces_departure() {
    let broker = MemoryBroker::new();
    let _alice = Peer::establish(Arc::new(broker.clone()), "alice", "bob");
    let bob = Peer::establish(Arc::new(broker.clone()), "bob", "alice");
    let (_keys, input) = console_pipe();

    let outcome = within("bob to finish", bob.session.run(input, ready(()))).await;

    assert_eq!(outcome.reason, ShutdownReason::Signal);
    assert_eq!(outcome.aborted_loops, 0);
    assert_eq!(broker.pending("/mq_bob_to_alice"), Some(1));
    assert!(bob.console.contains(SESSION_ENDED_NOTICE));
    assert!(!broker.exists("/mq_gui_tx_bob"));
}

#[tokio::test]
async fn test_fixed_role_pair_chats_and_role_a_cleans_up() {
    let broker = MemoryBroker::new();
    let open = |role: Role| {
        let console = Arc::new(CapturedConsole::new());
        let session = ChatSession::establish(
            Participants::fixed_role(role),
            Arc::new(broker.clone()),
            EventLogger::new(Arc::new(MemoryEventLog::new())),
            console.clone(),
            fast_settings(),
        )
        .unwrap();
        (session, console)
    };
    let (a, a_console) = open(Role::A);
    let (b, _b_console) = open(Role::B);

    let (_a_keys, a_input) = console_pipe();
    let (mut b_keys, b_input) = console_pipe();
    let a_run = tokio::spawn(a.run(a_input, pending()));
    let b_run = tokio::spawn(b.run(b_input, pending()));

    b_keys.write_all(b"hi A\nexit\n").await.unwrap();
    let a_outcome = within("A to finish", a_run).await.unwrap();
    within("B to finish", b_run).await.unwrap();

    assert_eq!(a_outcome.reason, ShutdownReason::PeerExit);
    assert!(a_console.contains("[B]: hi A"));
    assert!(!broker.exists("/mq_a_to_b"));
    assert!(!broker.exists("/mq_b_to_a"));
}

// ----------------------------------------------------------------------------
// Monitor
// ----------------------------------------------------------------------------

#[test]
fn test_monitor_requires_running_relay() {
    let broker = MemoryBroker::new();
    let err = GuiMonitor::attach(
        &broker,
        named("alice", "bob"),
        Arc::new(CapturedConsole::new()),
        MONITOR_BACKOFF,
    )
    .err()
    .expect("nothing to attach to");
    assert!(matches!(err, ChatError::ChannelSetup { .. }));
    assert!(!broker.exists("/mq_gui_tx_alice"));
}

#[tokio::test]
async fn test_monitor_counts_sent_and_received() {
    let broker = MemoryBroker::new();
    let alice = Peer::establish(Arc::new(broker.clone()), "alice", "bob");
    let bob = Peer::establish(Arc::new(broker.clone()), "bob", "alice");

    let monitor_console = Arc::new(CapturedConsole::new());
    let monitor = GuiMonitor::attach(
        &broker,
        named("alice", "bob"),
        monitor_console.clone(),
        MONITOR_BACKOFF,
    )
    .unwrap();

    let (_alice_keys, alice_input) = console_pipe();
    let (mut bob_keys, bob_input) = console_pipe();
    let (mut monitor_keys, monitor_input) = console_pipe();
    let alice_run = tokio::spawn(alice.session.run(alice_input, pending()));
    let bob_run = tokio::spawn(bob.session.run(bob_input, pending()));
    let monitor_run = tokio::spawn(monitor.run(monitor_input, pending()));

    monitor_keys.write_all(b"from gui\n").await.unwrap();
    eventually("the sent mirror", || {
        monitor_console.contains("-> [alice]: from gui")
    })
    .await;
    assert!(bob.console.contains("[alice]: from gui"));

    bob_keys.write_all(b"yo\n").await.unwrap();
    eventually("the received mirror", || {
        monitor_console.contains("<- [bob]: yo")
    })
    .await;
    eventually("the totals line", || {
        monitor_console.contains("Sent: 1 | Received: 1")
    })
    .await;

    drop(monitor_keys);
    let stats = within("monitor to finish", monitor_run).await.unwrap();
    assert_eq!(stats, MonitorStats { sent: 1, received: 1 });

    // The monitor never removes the relay's channels
    assert!(broker.exists("/mq_gui_tx_alice"));

    bob_keys.write_all(b"exit\n").await.unwrap();
    within("bob to finish", bob_run).await.unwrap();
    within("alice to finish", alice_run).await.unwrap();
}

#[tokio::test]
async fn test_monitor_backs_off_after_receive_errors() {
    let broker = MemoryBroker::new();
    let _alice = Peer::establish(Arc::new(broker.clone()), "alice", "bob");
    let provider = FaultyProvider::new(broker.clone(), "/mq_gui_rx_alice");

    let monitor = GuiMonitor::attach(
        &provider,
        named("alice", "bob"),
        Arc::new(CapturedConsole::new()),
        MONITOR_BACKOFF,
    )
    .unwrap();

    let (_keys, input) = console_pipe();
    let stats = within(
        "monitor to finish",
        monitor.run(input, tokio::time::sleep(Duration::from_millis(60))),
    )
    .await;

    assert_eq!(stats, MonitorStats::default());
    let attempts = provider.receive_attempts();
    assert!(attempts >= 1);
    assert!(attempts <= 10, "monitor retried {attempts} times without pausing");
}

#[test]
fn test_monitor_stats_display() {
    let stats = MonitorStats {
        sent: 3,
        received: 7,
    };
    assert_eq!(stats.to_string(), "Sent: 3 | Received: 7");
}
