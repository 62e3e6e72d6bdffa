//! End-to-end lifecycle tests against a scripted in-memory transport.
//!
//! All tests run under paused tokio time, so heartbeat intervals, hello
//! timeouts, and reconnect backoff elapse instantly once every task is
//! idle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wstether_client::error::{ClientError, Result as ClientResult};
use wstether_client::transport::{Connector, Frame, Transport};
use wstether_client::{
    ClientConfig, Connection, ConnectionHandle, ConnectionState, Dispatcher, Subscriber,
};
use wstether_core::protocol::DispatchEvent;

// ── Scripted transport ───────────────────────────────────────

struct ScriptedTransport {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<Bytes>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, payload: Bytes) -> ClientResult<()> {
        self.outbound.send(payload).map_err(|_| ClientError::Shutdown)
    }

    async fn recv(&mut self) -> ClientResult<Option<Frame>> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> ClientResult<()> {
        Ok(())
    }
}

/// The test's side of one scripted connection.
struct ServerEnd {
    to_client: mpsc::UnboundedSender<Frame>,
    from_client: mpsc::UnboundedReceiver<Bytes>,
}

impl ServerEnd {
    fn send_json(&self, v: Value) {
        let _ = self
            .to_client
            .send(Frame::Payload(Bytes::from(v.to_string())));
    }

    fn hello(&self, interval_ms: u64) {
        self.send_json(json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}));
    }

    fn ready(&self, session_id: &str, seq: u64, resume_url: Option<&str>) {
        let mut d = json!({"session_id": session_id});
        if let Some(url) = resume_url {
            d["resume_gateway_url"] = json!(url);
        }
        self.send_json(json!({"op": 0, "s": seq, "t": "READY", "d": d}));
    }

    fn dispatch(&self, t: &str, seq: u64) {
        self.send_json(json!({"op": 0, "s": seq, "t": t, "d": {}}));
    }

    fn close(&self, code: u16) {
        let _ = self.to_client.send(Frame::Close(Some(code)));
    }

    async fn next_sent(&mut self) -> Value {
        let bytes = self.from_client.recv().await.expect("client hung up");
        serde_json::from_slice(&bytes).expect("client sent invalid json")
    }

    /// Next non-heartbeat frame; heartbeats along the way are acked.
    async fn next_command(&mut self) -> Value {
        loop {
            let v = self.next_sent().await;
            if v["op"] == 1 {
                self.send_json(json!({"op": 11}));
                continue;
            }
            return v;
        }
    }

    /// Next heartbeat frame, left unacked.
    async fn next_heartbeat(&mut self) -> Value {
        loop {
            let v = self.next_sent().await;
            if v["op"] == 1 {
                return v;
            }
        }
    }
}

/// Hands out pre-scripted connections in order; connects past the script
/// fail at the transport level.
struct ScriptedConnector {
    pending: Mutex<VecDeque<ScriptedTransport>>,
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn Transport>> {
        self.urls.lock().expect("poisoned").push(url.to_string());
        match self.pending.lock().expect("poisoned").pop_front() {
            Some(t) => Ok(Box::new(t)),
            None => Err(ClientError::Shutdown),
        }
    }
}

fn scripted(connections: usize) -> (Arc<ScriptedConnector>, Vec<ServerEnd>) {
    let mut pending = VecDeque::new();
    let mut servers = Vec::new();
    for _ in 0..connections {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        pending.push_back(ScriptedTransport { inbound, outbound });
        servers.push(ServerEnd {
            to_client,
            from_client,
        });
    }
    let connector = Arc::new(ScriptedConnector {
        pending: Mutex::new(pending),
        urls: Mutex::new(Vec::new()),
    });
    (connector, servers)
}

fn test_config() -> ClientConfig {
    let mut cfg = ClientConfig::new("tok-1", "wss://gateway.test");
    cfg.backoff_base_ms = 10;
    cfg.backoff_max_ms = 50;
    cfg
}

struct ConnectorShim(Arc<ScriptedConnector>);

#[async_trait]
impl Connector for ConnectorShim {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn Transport>> {
        self.0.connect(url).await
    }
}

fn spawn_connection(
    cfg: ClientConfig,
    connector: Arc<ScriptedConnector>,
    dispatcher: Arc<Dispatcher>,
) -> (ConnectionHandle, JoinHandle<ClientResult<()>>) {
    let mut conn = Connection::new(cfg, Box::new(ConnectorShim(connector)), dispatcher)
        .expect("config is valid");
    let handle = conn.handle();
    let join = tokio::spawn(async move { conn.run().await });
    (handle, join)
}

/// Forwards every delivered event to the test.
struct Recorder {
    tx: mpsc::UnboundedSender<(String, Option<u64>)>,
}

#[async_trait]
impl Subscriber for Recorder {
    async fn handle(&self, event: &DispatchEvent) {
        let _ = self.tx.send((event.name.clone(), event.seq));
    }
}

fn recorder(
    dispatcher: &Dispatcher,
) -> mpsc::UnboundedReceiver<(String, Option<u64>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    dispatcher.subscribe_all(Arc::new(Recorder { tx }));
    rx
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn identify_handshake_delivers_events() {
    let (connector, mut servers) = scripted(1);
    let mut server = servers.remove(0);
    let dispatcher = Arc::new(Dispatcher::new());
    let mut events = recorder(&dispatcher);
    let (mut handle, join) = spawn_connection(test_config(), connector, dispatcher);

    server.hello(41_250);
    let identify = server.next_command().await;
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], "tok-1");
    assert_eq!(identify["d"]["properties"]["browser"], "wstether");
    assert!(identify["d"]["intents"].is_u64());
    assert!(identify.get("t").is_none());

    server.ready("abc123", 1, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();

    server.dispatch("MESSAGE_CREATE", 2);
    assert_eq!(events.recv().await, Some(("READY".into(), Some(1))));
    assert_eq!(
        events.recv().await,
        Some(("MESSAGE_CREATE".into(), Some(2)))
    );

    handle.shutdown();
    join.await.expect("task panicked").expect("clean shutdown");
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn resumable_close_resumes_with_session_and_seq() {
    let (connector, mut servers) = scripted(2);
    let mut second = servers.remove(1);
    let mut first = servers.remove(0);
    let dispatcher = Arc::new(Dispatcher::new());
    let (mut handle, join) = spawn_connection(test_config(), connector.clone(), dispatcher);

    first.hello(41_250);
    assert_eq!(first.next_command().await["op"], 2);
    first.ready("abc123", 0, Some("wss://resume.test"));
    handle.wait_for(ConnectionState::Connected).await.unwrap();
    first.dispatch("MESSAGE_CREATE", 1);
    first.close(4009);

    second.hello(41_250);
    let resume = second.next_command().await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc123");
    assert_eq!(resume["d"]["seq"], 1);
    assert_eq!(resume["d"]["token"], "tok-1");

    second.send_json(json!({"op": 0, "s": 1, "t": "RESUMED", "d": null}));
    handle.wait_for(ConnectionState::Connected).await.unwrap();

    // The second connect went to the announced resume URL.
    let urls = connector.urls.lock().unwrap().clone();
    assert_eq!(urls, vec!["wss://gateway.test", "wss://resume.test"]);

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn fatal_close_code_is_terminal() {
    let (connector, mut servers) = scripted(1);
    let mut server = servers.remove(0);
    let (handle, join) = spawn_connection(test_config(), connector, Arc::new(Dispatcher::new()));

    server.hello(41_250);
    assert_eq!(server.next_command().await["op"], 2);
    server.close(4004);

    let err = join.await.unwrap().unwrap_err();
    match err {
        ClientError::FatalClose { code, policy } => {
            assert_eq!(code, 4004);
            assert!(!policy.reconnect);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn invalid_session_not_resumable_reidentifies() {
    let (connector, mut servers) = scripted(2);
    let mut second = servers.remove(1);
    let mut first = servers.remove(0);
    let (mut handle, join) =
        spawn_connection(test_config(), connector, Arc::new(Dispatcher::new()));

    first.hello(41_250);
    assert_eq!(first.next_command().await["op"], 2);
    first.ready("abc123", 5, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();
    first.send_json(json!({"op": 9, "d": false}));

    second.hello(41_250);
    let auth = second.next_command().await;
    assert_eq!(auth["op"], 2, "cleared session must identify, not resume");

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn reconnect_request_keeps_session() {
    let (connector, mut servers) = scripted(2);
    let mut second = servers.remove(1);
    let mut first = servers.remove(0);
    let (mut handle, join) =
        spawn_connection(test_config(), connector, Arc::new(Dispatcher::new()));

    first.hello(41_250);
    assert_eq!(first.next_command().await["op"], 2);
    first.ready("abc123", 3, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();
    first.send_json(json!({"op": 7}));

    second.hello(41_250);
    let resume = second.next_command().await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc123");
    assert_eq!(resume["d"]["seq"], 3);

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn missed_heartbeat_ack_forces_resume() {
    let (connector, mut servers) = scripted(2);
    let mut second = servers.remove(1);
    let mut first = servers.remove(0);
    let (mut handle, join) =
        spawn_connection(test_config(), connector, Arc::new(Dispatcher::new()));

    first.hello(1000);
    assert_eq!(first.next_command().await["op"], 2);
    first.ready("abc123", 0, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();

    // Swallow the first heartbeat without acking; the next deadline
    // declares the connection dead.
    let beat = first.next_heartbeat().await;
    assert_eq!(beat["op"], 1);

    second.hello(1000);
    let resume = second.next_command().await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc123");

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn heartbeat_carries_latest_sequence() {
    let (connector, mut servers) = scripted(1);
    let mut server = servers.remove(0);
    let (mut handle, join) =
        spawn_connection(test_config(), connector, Arc::new(Dispatcher::new()));

    server.hello(1000);
    assert_eq!(server.next_command().await["op"], 2);
    server.ready("abc123", 1, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();
    server.dispatch("MESSAGE_CREATE", 2);

    // The first beat may be jitter-fired before the dispatch is observed;
    // once it has been, every beat carries the latest sequence.
    let mut carried = None;
    for _ in 0..5 {
        let beat = server.next_heartbeat().await;
        server.send_json(json!({"op": 11}));
        if beat["d"] == 2 {
            carried = Some(beat);
            break;
        }
    }
    assert!(carried.is_some(), "no heartbeat carried the latest sequence");

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn hello_timeout_triggers_reconnect() {
    let (connector, mut servers) = scripted(2);
    let mut second = servers.remove(1);
    let first = servers.remove(0);
    let (mut handle, join) =
        spawn_connection(test_config(), connector.clone(), Arc::new(Dispatcher::new()));

    // First connection stays silent; the hello timeout elapses under
    // paused time and the client moves on.
    second.hello(41_250);
    assert_eq!(second.next_command().await["op"], 2);
    second.ready("abc123", 1, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();
    assert_eq!(connector.urls.lock().unwrap().len(), 2);

    drop(first);
    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn connect_failures_exhaust_retry_ceiling() {
    let (connector, _servers) = scripted(0);
    let mut cfg = test_config();
    cfg.max_reconnect_attempts = 3;
    let (_handle, join) = spawn_connection(cfg, connector, Arc::new(Dispatcher::new()));

    let err = join.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::RetriesExhausted(3)));
}

#[tokio::test(start_paused = true)]
async fn outbound_requests_rejected_until_connected() {
    let (connector, mut servers) = scripted(1);
    let mut server = servers.remove(0);
    let (mut handle, join) =
        spawn_connection(test_config(), connector, Arc::new(Dispatcher::new()));

    // Session not live yet: the handle reports the rejection instead of
    // silently succeeding.
    let err = handle
        .update_presence(json!({"status": "idle"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));

    server.hello(41_250);
    assert_eq!(server.next_command().await["op"], 2);
    server.ready("abc123", 1, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();

    handle
        .update_presence(json!({"status": "idle"}))
        .await
        .unwrap();
    assert_eq!(server.next_command().await["op"], 3);

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn handshake_send_failure_retries_on_a_fresh_connection() {
    let (connector, mut servers) = scripted(2);
    let mut second = servers.remove(1);
    let first = servers.remove(0);
    let (mut handle, join) =
        spawn_connection(test_config(), connector.clone(), Arc::new(Dispatcher::new()));

    // Keep the inbound side alive but drop the outbound receiver, so the
    // hello arrives and the identify send fails.
    let ServerEnd {
        to_client,
        from_client,
    } = first;
    drop(from_client);
    let _ = to_client.send(Frame::Payload(Bytes::from(
        json!({"op": 10, "d": {"heartbeat_interval": 41_250}}).to_string(),
    )));

    second.hello(41_250);
    assert_eq!(second.next_command().await["op"], 2);
    second.ready("abc123", 1, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();
    assert_eq!(connector.urls.lock().unwrap().len(), 2);

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn presence_update_flows_through_event_loop() {
    let (connector, mut servers) = scripted(1);
    let mut server = servers.remove(0);
    let (mut handle, join) =
        spawn_connection(test_config(), connector, Arc::new(Dispatcher::new()));

    server.hello(41_250);
    assert_eq!(server.next_command().await["op"], 2);
    server.ready("abc123", 1, None);
    handle.wait_for(ConnectionState::Connected).await.unwrap();

    handle
        .update_presence(json!({"status": "idle", "afk": true}))
        .await
        .unwrap();
    let sent = server.next_command().await;
    assert_eq!(sent["op"], 3);
    assert_eq!(sent["d"]["status"], "idle");

    handle
        .request_guild_members(json!({"guild_id": "42", "query": "", "limit": 0}))
        .await
        .unwrap();
    let sent = server.next_command().await;
    assert_eq!(sent["op"], 8);
    assert_eq!(sent["d"]["guild_id"], "42");

    handle.shutdown();
    join.await.unwrap().unwrap();
}
