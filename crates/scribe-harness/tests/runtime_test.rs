//! Runtime tests over the scripted transport.
//!
//! These run the real session task on a paused tokio clock: timers fire as
//! soon as every task is idle, so multi-second retry sequences finish
//! instantly and deterministically.

use std::time::Duration;

use scribe_app::{App, AppAction, AppEvent};
use scribe_client::{ChannelObserver, ClientError, SessionHandle};
use scribe_core::{Endpoint, SessionConfig, SessionEvent, SessionState, SystemEnv};
use scribe_harness::{ConnectOutcome, ScriptedTransport};
use scribe_proto::{Fragment, HistoryTurn, OutgoingRequest, Role, StreamKind};
use tokio::{sync::mpsc::UnboundedReceiver, time::Instant};

fn chat() -> Endpoint {
    Endpoint::new("ws://backend:8000", StreamKind::Chat).unwrap()
}

fn open(
    transport: &ScriptedTransport,
    endpoint: Endpoint,
) -> (SessionHandle, UnboundedReceiver<SessionEvent>) {
    let (observer, events) = ChannelObserver::new();
    let handle = SessionHandle::open(
        transport.clone(),
        SystemEnv,
        endpoint,
        SessionConfig::default(),
        observer,
    );
    (handle, events)
}

/// Collect events up to and including the first one matching `pred`.
async fn wait_for(
    events: &mut UnboundedReceiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
    panic!("event stream ended; saw {seen:?}");
}

fn is_state(state: SessionState) -> impl Fn(&SessionEvent) -> bool {
    move |e| matches!(e, SessionEvent::StateChanged { state: s, .. } if *s == state)
}

fn is_terminal(e: &SessionEvent) -> bool {
    matches!(e, SessionEvent::TerminalFailure { .. })
}

/// Let every runnable task make progress.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn drain(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn streamed_answer_is_assembled() {
    let transport = ScriptedTransport::new();
    let (mut handle, mut events) = open(&transport, chat());

    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().expect("link accepted");
    assert_eq!(server.url(), "ws://backend:8000/ws/chat");

    let request = OutgoingRequest::new("  ¿Dosis?  ").unwrap().with_history(vec![
        HistoryTurn::new(Role::User, "hola"),
        HistoryTurn::new(Role::Model, "¿En qué puedo ayudar?"),
    ]);
    handle.send(request.clone()).unwrap();
    settle().await;

    assert_eq!(server.requests(), vec![request]);

    server.push_fragment(&Fragment::chunk("a"));
    server.push_fragment(&Fragment::chunk("b"));
    server.push(r#"{"done": true}"#);

    let seen = wait_for(&mut events, |e| matches!(e, SessionEvent::ResponseFinished(_))).await;
    let Some(SessionEvent::ResponseFinished(response)) = seen.last() else {
        unreachable!()
    };
    assert_eq!(response.content, "ab");
    assert!(response.finished);

    let chunks: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Chunk { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, ["a", "b"]);

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn repeated_closures_fail_once() {
    let transport = ScriptedTransport::new();
    transport.set_fallback(ConnectOutcome::Refuse("connection refused".into()));
    let transport = transport.then(ConnectOutcome::Accept);
    let (_handle, mut events) = open(&transport, chat());

    wait_for(&mut events, is_state(SessionState::Open)).await;
    transport.last_link().unwrap().hang_up();

    let seen = wait_for(&mut events, is_terminal).await;
    assert_eq!(seen.last(), Some(&SessionEvent::TerminalFailure { attempts: 3 }));
    // The open link plus two refused retries.
    assert_eq!(transport.attempts(), 3);

    // Nothing after the terminal notification, however long we wait.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(drain(&mut events).is_empty());
    assert_eq!(transport.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn success_restores_full_budget() {
    let transport = ScriptedTransport::new()
        .then(ConnectOutcome::Accept)
        .then(ConnectOutcome::Refuse("refused".into()))
        .then(ConnectOutcome::Accept);
    transport.set_fallback(ConnectOutcome::Refuse("refused".into()));
    let (_handle, mut events) = open(&transport, chat());

    wait_for(&mut events, is_state(SessionState::Open)).await;
    transport.last_link().unwrap().hang_up();

    // The second open comes on the last attempt the budget allows.
    let seen = wait_for(&mut events, is_state(SessionState::Open)).await;
    assert!(seen.contains(&SessionEvent::StateChanged {
        state: SessionState::Connecting,
        attempt: 2,
    }));
    assert!(seen.contains(&SessionEvent::StateChanged { state: SessionState::Open, attempt: 0 }));
    transport.last_link().unwrap().hang_up();

    let seen = wait_for(&mut events, is_terminal).await;
    let retries: Vec<u32> = seen
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged { state: SessionState::Connecting, attempt } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retries, [1, 2]);
    assert_eq!(seen.last(), Some(&SessionEvent::TerminalFailure { attempts: 3 }));
    assert_eq!(transport.attempts(), 5);
}

#[tokio::test(start_paused = true)]
async fn unschedulable_timeouts_still_open_and_close() {
    let transport = ScriptedTransport::new();
    let config = SessionConfig {
        connect_timeout: Duration::from_secs(u64::MAX),
        reconnect_delay: Duration::from_secs(u64::MAX),
        max_reconnect_attempts: 3,
    };
    let (observer, mut events) = ChannelObserver::new();
    let mut handle = SessionHandle::open(transport.clone(), SystemEnv, chat(), config, observer);

    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().unwrap();

    // Closing bounds the link shutdown by the connect timeout.
    handle.close().await;
    assert_eq!(handle.state(), SessionState::Closed);
    assert!(server.is_closed());
}

#[tokio::test(start_paused = true)]
async fn fragment_error_does_not_reconnect() {
    let transport = ScriptedTransport::new();
    let (handle, mut events) = open(&transport, chat());

    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().unwrap();
    server.push_fragment(&Fragment::chunk("partial "));
    server.push(r#"{"error": "x", "code": "stream_error"}"#);

    let seen =
        wait_for(&mut events, |e| matches!(e, SessionEvent::FragmentError { .. })).await;
    let Some(SessionEvent::FragmentError { error, partial }) = seen.last() else {
        unreachable!()
    };
    assert_eq!(error.message, "x");
    assert_eq!(error.code.as_deref(), Some("stream_error"));
    assert_eq!(partial.as_ref().map(|r| r.content.as_str()), Some("partial "));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.state(), SessionState::Open);
    assert_eq!(transport.attempts(), 1);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn close_twice_is_noop_and_final() {
    let transport = ScriptedTransport::new();
    let (mut handle, mut events) = open(&transport, chat());

    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().unwrap();

    handle.close().await;
    assert_eq!(handle.state(), SessionState::Closed);
    assert!(server.is_closed());

    let after_first = drain(&mut events);
    assert_eq!(
        after_first,
        vec![SessionEvent::StateChanged { state: SessionState::Closed, attempt: 0 }]
    );

    handle.close().await;
    server.push_fragment(&Fragment::chunk("late"));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(drain(&mut events).is_empty());
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn send_while_reconnecting_is_rejected_without_io() {
    let transport = ScriptedTransport::new();
    let (handle, mut events) = open(&transport, chat());

    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().unwrap();
    server.hang_up();
    wait_for(&mut events, is_state(SessionState::Reconnecting)).await;

    let result = handle.send(OutgoingRequest::new("hola").unwrap());
    assert!(matches!(
        result,
        Err(ClientError::ConnectionUnavailable { state: SessionState::Reconnecting })
    ));

    settle().await;
    assert!(server.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hung_handshake_times_out_then_retries() {
    let transport = ScriptedTransport::new().then(ConnectOutcome::Hang);
    let started = Instant::now();
    let (_handle, mut events) = open(&transport, chat());

    let seen = wait_for(&mut events, is_state(SessionState::Open)).await;
    assert!(started.elapsed() >= Duration::from_secs(8));
    assert!(seen.iter().any(
        |e| matches!(e, SessionEvent::LinkError { reason } if reason.contains("timed out"))
    ));
    assert_eq!(transport.attempts(), 2);
    assert_eq!(transport.links().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn link_loss_abandons_partial_response() {
    let transport = ScriptedTransport::new();
    let (_handle, mut events) = open(&transport, chat());

    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().unwrap();
    server.push_fragment(&Fragment::chunk("half"));
    server.break_link("connection reset");

    let seen =
        wait_for(&mut events, |e| matches!(e, SessionEvent::ResponseAbandoned(_))).await;
    let Some(SessionEvent::ResponseAbandoned(partial)) = seen.last() else {
        unreachable!()
    };
    assert_eq!(partial.content, "half");
    assert!(!partial.finished);

    // The next link starts from a clean slate.
    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().unwrap();
    server.push_fragment(&Fragment::chunk("new"));
    server.push_fragment(&Fragment::done());
    let seen = wait_for(&mut events, |e| matches!(e, SessionEvent::ResponseFinished(_))).await;
    assert!(matches!(seen.last(), Some(SessionEvent::ResponseFinished(r)) if r.content == "new"));
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_skipped() {
    let transport = ScriptedTransport::new();
    let (handle, mut events) = open(&transport, chat());

    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().unwrap();
    server.push("<html>502 Bad Gateway</html>");
    server.push_fragment(&Fragment::chunk("ok"));
    server.push_fragment(&Fragment::done());

    let seen = wait_for(&mut events, |e| matches!(e, SessionEvent::ResponseFinished(_))).await;
    assert!(matches!(seen.last(), Some(SessionEvent::ResponseFinished(r)) if r.content == "ok"));
    assert_eq!(handle.state(), SessionState::Open);
}

#[tokio::test(start_paused = true)]
async fn transcription_feed_delivers_transcript() {
    let transport = ScriptedTransport::new();
    let endpoint =
        Endpoint::new("wss://backend", StreamKind::Transcription { encounter_id: 42 }).unwrap();
    let (handle, mut events) = open(&transport, endpoint);

    wait_for(&mut events, is_state(SessionState::Open)).await;
    let server = transport.last_link().unwrap();
    assert_eq!(server.url(), "wss://backend/ws/transcription/42");

    server.push(r#"{"status": "processing"}"#);
    server.push(r#"{"status": "completed", "content": "Paciente refiere cefalea."}"#);

    let seen = wait_for(&mut events, |e| matches!(e, SessionEvent::ResponseFinished(_))).await;
    assert!(matches!(seen[0], SessionEvent::ResponseStarted { .. }));
    assert!(matches!(
        seen.last(),
        Some(SessionEvent::ResponseFinished(r)) if r.content == "Paciente refiere cefalea."
    ));

    assert!(matches!(
        handle.send(OutgoingRequest::new("hola").unwrap()),
        Err(ClientError::ReadOnlyStream { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn app_conversation_over_session() {
    let transport = ScriptedTransport::new();
    let (mut handle, mut events) = open(&transport, chat());
    let mut app = App::new(StreamKind::Chat);

    // Feed session events to the app until it reports the link open.
    while !matches!(app.status(), SessionState::Open) {
        let event = events.recv().await.expect("session alive");
        app.handle(AppEvent::Session(event));
    }

    for action in app.handle(AppEvent::Input("¿Qué es la HTA?".into())) {
        if let AppAction::Send { request } = action {
            handle.send(request).unwrap();
        }
    }
    settle().await;

    let server = transport.last_link().unwrap();
    assert_eq!(server.requests()[0].message, "¿Qué es la HTA?");
    server.push_fragment(&Fragment::chunk("Hipertensión "));
    server.push_fragment(&Fragment::chunk("arterial."));
    server.push_fragment(&Fragment::done());

    while app.is_loading() {
        let event = events.recv().await.expect("session alive");
        app.handle(AppEvent::Session(event));
    }

    let last = app.messages().last().unwrap();
    assert_eq!(last.content, "Hipertensión arterial.");
    assert_eq!(app.history().len(), 2);

    handle.close().await;
}
