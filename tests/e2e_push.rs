//! End-to-end push engine tests.
//!
//! These run the real engine against an in-process scripted NETCONF
//! server: hello exchange, edit-config/commit replies, and injectable
//! commit conflicts.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use confsync::codec::{decode_message, encode_message, FrameDecoder, MESSAGE_SEPARATOR};
use confsync::protocol::{NetconfMessage, OPTIMISTIC_LOCK_APP_TAG};
use confsync::{CapabilityPoller, CapabilitySet, ConfigPusher, ConfigSnapshot, ConfsyncError, PusherConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Scripted server behavior and observation log.
#[derive(Debug)]
struct ServerState {
    capabilities: CapabilitySet,
    /// Commits to reject with a version conflict before succeeding.
    conflicts_remaining: usize,
    /// First config child of every edit-config received, in order.
    edits_seen: Vec<String>,
    sessions_opened: u64,
}

impl ServerState {
    fn new(capabilities: CapabilitySet) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            capabilities,
            conflicts_remaining: 0,
            edits_seen: Vec::new(),
            sessions_opened: 0,
        }))
    }
}

async fn spawn_server(state: Arc<Mutex<ServerState>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(serve_session(stream, Arc::clone(&state)));
        }
    });
    address
}

async fn read_frame(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> Option<Vec<u8>> {
    loop {
        if let Some(frame) = decoder.take_frame() {
            return Some(frame.to_vec());
        }
        let mut chunk = [0u8; 4096];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => decoder.feed(&chunk[..n]),
        }
    }
}

async fn write_message(stream: &mut TcpStream, message: &NetconfMessage) {
    let bytes = encode_message(message, None).unwrap();
    stream.write_all(&bytes).await.unwrap();
    stream.write_all(MESSAGE_SEPARATOR).await.unwrap();
}

async fn serve_session(mut stream: TcpStream, state: Arc<Mutex<ServerState>>) {
    let mut decoder = FrameDecoder::new();

    let Some(frame) = read_frame(&mut stream, &mut decoder).await else {
        return;
    };
    let (hello, _header) = decode_message(&frame).unwrap();
    assert!(hello.is_hello(), "first client message must be a hello");

    let (capabilities, session_id) = {
        let mut state = state.lock().unwrap();
        state.sessions_opened += 1;
        (state.capabilities.clone(), state.sessions_opened)
    };
    write_message(&mut stream, &NetconfMessage::server_hello(&capabilities, session_id)).await;

    while let Some(frame) = read_frame(&mut stream, &mut decoder).await {
        let (request, _) = decode_message(&frame).unwrap();
        let id = request.message_id().unwrap_or("0").to_string();
        let operation = request
            .root()
            .children
            .iter()
            .filter_map(xmltree::XMLNode::as_element)
            .next()
            .map(|el| el.name.clone())
            .unwrap_or_default();

        match operation.as_str() {
            "edit-config" => {
                let marker = request
                    .root()
                    .children
                    .iter()
                    .filter_map(xmltree::XMLNode::as_element)
                    .next()
                    .and_then(|edit| edit.get_child("config"))
                    .and_then(|config| {
                        config
                            .children
                            .iter()
                            .filter_map(xmltree::XMLNode::as_element)
                            .next()
                    })
                    .map(|el| el.name.clone())
                    .unwrap_or_default();
                state.lock().unwrap().edits_seen.push(marker);
                write_message(&mut stream, &NetconfMessage::ok_reply(&id)).await;
            }
            "commit" => {
                let conflict = {
                    let mut state = state.lock().unwrap();
                    if state.conflicts_remaining > 0 {
                        state.conflicts_remaining -= 1;
                        true
                    } else {
                        false
                    }
                };
                if conflict {
                    write_message(
                        &mut stream,
                        &NetconfMessage::error_reply(
                            &id,
                            "operation-failed",
                            Some(OPTIMISTIC_LOCK_APP_TAG),
                            "conflicting version of configuration detected",
                        ),
                    )
                    .await;
                } else {
                    write_message(&mut stream, &NetconfMessage::ok_reply(&id)).await;
                }
            }
            "close-session" => {
                write_message(&mut stream, &NetconfMessage::ok_reply(&id)).await;
                return;
            }
            other => panic!("unexpected rpc operation {other}"),
        }
    }
}

fn quick_config(address: SocketAddr) -> PusherConfig {
    PusherConfig {
        address,
        connection_timeout_ms: 1000,
        max_wait_for_capabilities_ms: 3000,
        capability_poll_delay_ms: 20,
        max_push_attempts: 5,
        conflict_retry_delay_ms: 10,
        rpc_send_attempts: 5,
        rpc_attempt_delay_ms: 300,
    }
}

fn snapshot(name: &str, element: &str) -> ConfigSnapshot {
    ConfigSnapshot::new(
        name,
        format!("<data><{element} xmlns=\"urn:test:modules\"/></data>"),
        CapabilitySet::new(),
    )
}

#[tokio::test]
async fn test_push_all_without_conflicts() {
    let state = ServerState::new(CapabilitySet::base());
    let address = spawn_server(Arc::clone(&state)).await;

    let snapshots = vec![
        snapshot("first", "module-a"),
        snapshot("second", "module-b"),
        snapshot("third", "module-c"),
    ];
    let pusher = ConfigPusher::new(quick_config(address));
    let results = pusher.push_all(&snapshots).await.unwrap();

    assert_eq!(results.len(), 3);
    let keys: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(keys, ["first", "second", "third"]);
    for result in results.values() {
        assert_eq!(result.attempts, 1);
    }

    let edits = state.lock().unwrap().edits_seen.clone();
    assert_eq!(edits, ["module-a", "module-b", "module-c"]);
}

#[tokio::test]
async fn test_conflicts_consume_attempts_then_succeed() {
    let state = ServerState::new(CapabilitySet::base());
    state.lock().unwrap().conflicts_remaining = 2;
    let address = spawn_server(Arc::clone(&state)).await;

    let snapshots = vec![snapshot("contended", "module-a"), snapshot("calm", "module-b")];
    let pusher = ConfigPusher::new(quick_config(address));
    let results = pusher.push_all(&snapshots).await.unwrap();

    // Two rejected commits before the third try lands
    assert_eq!(results["contended"].attempts, 3);
    // The conflict storm on the first snapshot leaves the second untouched
    assert_eq!(results["calm"].attempts, 1);
}

#[tokio::test]
async fn test_max_attempts_exhausted_aborts_run() {
    let state = ServerState::new(CapabilitySet::base());
    state.lock().unwrap().conflicts_remaining = usize::MAX;
    let address = spawn_server(Arc::clone(&state)).await;

    let snapshots = vec![snapshot("doomed", "module-a"), snapshot("never-reached", "module-b")];
    let pusher = ConfigPusher::new(quick_config(address));
    let result = pusher.push_all(&snapshots).await;

    match result {
        Err(ConfsyncError::MaxAttemptsExceeded { snapshot, last_conflict }) => {
            assert_eq!(snapshot, "doomed");
            assert!(matches!(
                last_conflict.as_deref(),
                Some(ConfsyncError::VersionConflict(_))
            ));
        }
        other => panic!("expected MaxAttemptsExceeded, got {other:?}"),
    }

    // Five attempts on the first snapshot, none on the second
    let edits = state.lock().unwrap().edits_seen.clone();
    assert_eq!(edits.len(), 5);
    assert!(edits.iter().all(|marker| marker == "module-a"));
}

#[tokio::test]
async fn test_malformed_snapshot_is_fatal_not_retried() {
    let state = ServerState::new(CapabilitySet::base());
    let address = spawn_server(Arc::clone(&state)).await;

    let snapshots = vec![ConfigSnapshot::new(
        "broken",
        "<data><unclosed>",
        CapabilitySet::new(),
    )];
    let pusher = ConfigPusher::new(quick_config(address));
    let result = pusher.push_all(&snapshots).await;

    match result {
        Err(ConfsyncError::Parse(message)) => assert!(message.contains("broken")),
        other => panic!("expected parse error, got {other:?}"),
    }
    // No edit-config ever reached the server
    assert!(state.lock().unwrap().edits_seen.is_empty());
}

#[tokio::test]
async fn test_wait_for_capabilities_empty_set_takes_first_session() {
    let state = ServerState::new(CapabilitySet::new().with("urn:whatever:cap:1.0"));
    let address = spawn_server(Arc::clone(&state)).await;

    let poller = CapabilityPoller::new(&quick_config(address));
    let session = poller.wait_for_capabilities(&CapabilitySet::new()).await.unwrap();
    assert_eq!(session.session_id(), 1);
    session.close().await;
}

#[tokio::test]
async fn test_missing_capability_reported_exactly() {
    let state = ServerState::new(CapabilitySet::new().with("urn:only:y:1.0"));
    let address = spawn_server(Arc::clone(&state)).await;

    let mut config = quick_config(address);
    config.max_wait_for_capabilities_ms = 300;
    let poller = CapabilityPoller::new(&config);

    let expected = CapabilitySet::new().with("urn:wanted:x:1.0");
    let result = poller.wait_for_capabilities(&expected).await;

    match result {
        Err(ConfsyncError::CapabilityTimeout { message, missing }) => {
            assert_eq!(missing, expected);
            assert!(message.contains("urn:wanted:x:1.0"));
            assert!(message.contains("urn:only:y:1.0"));
        }
        other => panic!("expected capability timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_required_capability_satisfied_session_returned() {
    let caps = CapabilitySet::base().with("urn:needed:cap:1.0");
    let state = ServerState::new(caps);
    let address = spawn_server(Arc::clone(&state)).await;

    let snapshots = vec![ConfigSnapshot::new(
        "needs-cap",
        "<data><module-a xmlns=\"urn:test:modules\"/></data>",
        CapabilitySet::new().with("urn:needed:cap:1.0"),
    )];
    let pusher = ConfigPusher::new(quick_config(address));
    let results = pusher.push_all(&snapshots).await.unwrap();
    assert_eq!(results["needs-cap"].attempts, 1);
}

#[tokio::test]
async fn test_concurrent_push_all_calls_serialize() {
    let state = ServerState::new(CapabilitySet::base());
    let address = spawn_server(Arc::clone(&state)).await;

    let pusher = Arc::new(ConfigPusher::new(quick_config(address)));
    let first = {
        let pusher = Arc::clone(&pusher);
        tokio::spawn(async move { pusher.push_all(&[snapshot("one", "module-a")]).await })
    };
    let second = {
        let pusher = Arc::clone(&pusher);
        tokio::spawn(async move { pusher.push_all(&[snapshot("two", "module-b")]).await })
    };

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first["one"].attempts, 1);
    assert_eq!(second["two"].attempts, 1);

    // Serialized runs never interleave their edit-config calls
    let edits = state.lock().unwrap().edits_seen.clone();
    assert_eq!(edits.len(), 2);
    assert_ne!(edits[0], edits[1]);
}
