//! The connection state machine.
//!
//! One `Connection` owns one logical session and however many physical
//! connections it takes to keep it alive. A single `select!` loop per
//! physical connection serializes everything that can touch the transport:
//! inbound frames, the heartbeat deadline, outbound command requests, and
//! the shutdown signal. There is exactly one writer and no lock around the
//! write path.
//!
//! The reconnect policy lives in [`Connection::run`]: transient failures
//! retry with full-jitter backoff (resuming the session when it is
//! eligible); a non-reconnectable close-code verdict or an exhausted
//! attempt ceiling is terminal and surfaces as the `Err` of `run`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::value::RawValue;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use wstether_core::protocol::control::{self, Hello, Ready};
use wstether_core::protocol::{close, DispatchEvent, Envelope, EventKind, OpCode};

use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ClientError, Result};
use crate::heartbeat::{Beat, HeartbeatDriver};
use crate::session::Session;
use crate::transport::{Connector, Frame, Transport};

/// Observable lifecycle state of a connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No physical connection; may be between retries.
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Transport up, waiting for the server's Hello.
    AwaitingHello,
    /// Identify sent, waiting for Ready.
    Identifying,
    /// Resume sent, waiting for the replay to begin.
    Resuming,
    /// Session live; dispatch events are flowing.
    Connected,
    /// Shutdown requested; tearing down.
    Closing,
}

/// Outbound control requests from handles, forwarded by the event loop so
/// writes stay serialized.
enum Command {
    PresenceUpdate(Box<RawValue>),
    VoiceStateUpdate(Box<RawValue>),
    RequestGuildMembers(Box<RawValue>),
}

/// How one physical connection ended.
#[derive(Debug)]
enum LoopEnd {
    /// Shutdown was requested; stop entirely.
    Shutdown,
    /// Reconnect; `resume` says whether the session may be kept.
    Retry { resume: bool },
}

/// Disposition of one connection attempt, as seen by the retry loop.
enum Disposition {
    Shutdown,
    Retry { resume: bool, stable: bool },
}

/// Cheap cloneable handle to a running [`Connection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<Command>,
    shutdown_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Wait until the connection reaches `target`.
    pub async fn wait_for(&mut self, target: ConnectionState) -> Result<()> {
        while *self.state_rx.borrow_and_update() != target {
            self.state_rx
                .changed()
                .await
                .map_err(|_| ClientError::Shutdown)?;
        }
        Ok(())
    }

    /// Request a graceful shutdown. Idempotent; never an error condition.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Send a presence update (`op=3`). Errors with
    /// [`ClientError::NotConnected`] unless the session is live.
    pub async fn update_presence(&self, payload: serde_json::Value) -> Result<()> {
        self.command(Command::PresenceUpdate(raw(payload)?)).await
    }

    /// Send a voice state update (`op=4`). Errors with
    /// [`ClientError::NotConnected`] unless the session is live.
    pub async fn update_voice_state(&self, payload: serde_json::Value) -> Result<()> {
        self.command(Command::VoiceStateUpdate(raw(payload)?)).await
    }

    /// Request guild member chunks (`op=8`). Errors with
    /// [`ClientError::NotConnected`] unless the session is live.
    pub async fn request_guild_members(&self, payload: serde_json::Value) -> Result<()> {
        self.command(Command::RequestGuildMembers(raw(payload)?)).await
    }

    async fn command(&self, cmd: Command) -> Result<()> {
        if *self.state_rx.borrow() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| ClientError::Shutdown)
    }
}

fn raw(payload: serde_json::Value) -> Result<Box<RawValue>> {
    serde_json::value::to_raw_value(&payload)
        .map_err(|e| wstether_core::ProtocolError::Encode(e.to_string()).into())
}

/// One logical session over any number of physical connections.
pub struct Connection {
    config: ClientConfig,
    connector: Box<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    session: Session,
    initial_presence: Option<Box<RawValue>>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
    cmd_tx: mpsc::Sender<Command>,
    cmd_rx: mpsc::Receiver<Command>,
}

impl Connection {
    /// Build a connection instance. Validates the config up front.
    pub fn new(
        config: ClientConfig,
        connector: Box<dyn Connector>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self> {
        config.validate()?;
        let session = Session::new(config.intents, config.shard_pair());
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        Ok(Self {
            config,
            connector,
            dispatcher,
            session,
            initial_presence: None,
            state_tx,
            shutdown_tx,
            shutdown_rx,
            cmd_tx,
            cmd_rx,
        })
    }

    /// Presence to announce inside Identify.
    pub fn with_initial_presence(mut self, payload: serde_json::Value) -> Result<Self> {
        self.initial_presence = Some(raw(payload)?);
        Ok(self)
    }

    /// Handle for state observation, outbound requests, and shutdown.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            cmd_tx: self.cmd_tx.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Session snapshot (for diagnostics and tests).
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until shutdown (`Ok`) or a terminal error (`Err`).
    ///
    /// Everything transient is absorbed here: the retry loop sleeps out
    /// the backoff and reconnects, resuming when the session allows it.
    pub async fn run(&mut self) -> Result<()> {
        let mut backoff = Backoff::new(self.config.backoff_base_ms, self.config.backoff_max_ms);
        let mut attempts: u32 = 0;

        loop {
            match self.connect_once().await {
                Ok(Disposition::Shutdown) => {
                    self.set_state(ConnectionState::Disconnected);
                    info!("shutdown complete");
                    return Ok(());
                }
                Ok(Disposition::Retry { resume, stable }) => {
                    self.set_state(ConnectionState::Disconnected);
                    if stable {
                        backoff.reset();
                        attempts = 0;
                    }
                    if !resume {
                        self.session.clear();
                    }
                    attempts = attempts.saturating_add(1);
                    if attempts > self.config.max_reconnect_attempts {
                        self.session.clear();
                        return Err(ClientError::RetriesExhausted(
                            self.config.max_reconnect_attempts,
                        ));
                    }

                    let delay = if self.session.can_resume() {
                        // Short randomized delay before a resume; the full
                        // backoff curve is for fresh identifies.
                        Duration::from_millis(fastrand::u64(1000..=5000))
                    } else {
                        backoff.next_delay()
                    };
                    info!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempts,
                        resume = self.session.can_resume(),
                        "reconnecting"
                    );
                    if !self.sleep_or_shutdown(delay).await {
                        self.set_state(ConnectionState::Disconnected);
                        return Ok(());
                    }
                }
                Err(fatal) => {
                    self.set_state(ConnectionState::Disconnected);
                    self.session.clear();
                    warn!(error = %fatal, "giving up");
                    return Err(fatal);
                }
            }
        }
    }

    /// One physical connection: connect, hello, identify/resume, event
    /// loop, teardown.
    async fn connect_once(&mut self) -> Result<Disposition> {
        let url = self
            .session
            .resume_url
            .clone()
            .unwrap_or_else(|| self.config.gateway_url.clone());

        self.set_state(ConnectionState::Connecting);
        debug!(url = %url, "connecting");
        let mut transport = match self.connector.connect(&url).await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "connect failed");
                return Ok(self.retry(false));
            }
        };

        self.set_state(ConnectionState::AwaitingHello);
        let hello = match self.await_hello(transport.as_mut()).await? {
            HelloWait::Hello(hello) => hello,
            HelloWait::Shutdown => {
                let _ = transport.close().await;
                return Ok(Disposition::Shutdown);
            }
            HelloWait::Retry => {
                let _ = transport.close().await;
                return Ok(self.retry(false));
            }
        };

        let mut heartbeat = HeartbeatDriver::start(hello.heartbeat_interval);
        debug!(
            interval_ms = hello.heartbeat_interval,
            "heartbeat driver started"
        );

        let auth = if self.session.can_resume() {
            self.set_state(ConnectionState::Resuming);
            info!(
                session_id = self.session.session_id.as_deref().unwrap_or(""),
                seq = self.session.sequence().unwrap_or(0),
                "resuming session"
            );
            control::resume(
                &self.config.token,
                self.session.session_id.as_deref().unwrap_or(""),
                self.session.sequence().unwrap_or(0),
            )?
        } else {
            self.set_state(ConnectionState::Identifying);
            info!(shard = ?self.config.shard, "identifying");
            control::identify(
                &self.config.token,
                self.config.intents,
                self.config.shard_pair(),
                self.initial_presence.as_deref(),
            )?
        };
        if let Err(e) = transport.send(auth.encode()?).await {
            warn!(error = %e, "send failed during handshake");
            let _ = transport.close().await;
            return Ok(self.retry(false));
        }

        let mut connected_at: Option<Instant> = None;
        let end = self
            .event_loop(transport.as_mut(), &mut heartbeat, &mut connected_at);
        let end = end.await;

        // Teardown: the heartbeat deadline dies with this scope, the
        // transport is closed, and no further control frames go out.
        let _ = transport.close().await;

        let stable = connected_at
            .map(|t| t.elapsed() >= Duration::from_millis(self.config.stable_grace_ms))
            .unwrap_or(false);
        match end? {
            LoopEnd::Shutdown => Ok(Disposition::Shutdown),
            LoopEnd::Retry { resume } => Ok(Disposition::Retry { resume, stable }),
        }
    }

    fn retry(&self, stable: bool) -> Disposition {
        Disposition::Retry {
            resume: self.session.can_resume(),
            stable,
        }
    }

    /// Wait for the server's Hello, bounded by the configured timeout.
    async fn await_hello(&mut self, transport: &mut dyn Transport) -> Result<HelloWait> {
        let deadline = Instant::now() + Duration::from_millis(self.config.hello_timeout_ms);
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    self.set_state(ConnectionState::Closing);
                    return Ok(HelloWait::Shutdown);
                }

                _ = tokio::time::sleep_until(deadline) => {
                    warn!(error = %ClientError::HelloTimeout, "handshake failed");
                    return Ok(HelloWait::Retry);
                }

                frame = transport.recv() => match frame {
                    Ok(Some(Frame::Payload(bytes))) => {
                        let env = match Envelope::decode(&bytes) {
                            Ok(env) => env,
                            Err(e) => {
                                warn!(error = %e, "dropping malformed frame");
                                continue;
                            }
                        };
                        if env.op == OpCode::Hello {
                            match env.payload::<Hello>("hello") {
                                Ok(hello) => return Ok(HelloWait::Hello(hello)),
                                Err(e) => {
                                    warn!(error = %e, "malformed hello");
                                    return Ok(HelloWait::Retry);
                                }
                            }
                        }
                        warn!(op = env.op.as_u8(), "frame before hello");
                    }
                    Ok(Some(Frame::Close(code))) => {
                        return match self.close_verdict(code)? {
                            LoopEnd::Retry { .. } => Ok(HelloWait::Retry),
                            LoopEnd::Shutdown => Ok(HelloWait::Shutdown),
                        };
                    }
                    Ok(None) | Err(_) => {
                        warn!("transport lost before hello");
                        return Ok(HelloWait::Retry);
                    }
                },
            }
        }
    }

    /// The per-connection event loop. Owns the transport until the
    /// connection ends one way or another.
    async fn event_loop(
        &mut self,
        transport: &mut dyn Transport,
        heartbeat: &mut HeartbeatDriver,
        connected_at: &mut Option<Instant>,
    ) -> Result<LoopEnd> {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    info!("shutdown requested");
                    self.set_state(ConnectionState::Closing);
                    return Ok(LoopEnd::Shutdown);
                }

                _ = tokio::time::sleep_until(heartbeat.deadline()) => {
                    match heartbeat.fire(self.session.sequence())? {
                        Beat::Pulse(env) => {
                            trace!(seq = ?self.session.sequence(), "heartbeat");
                            if let Err(e) = transport.send(env.encode()?).await {
                                warn!(error = %e, "send failed during heartbeat");
                                return Ok(LoopEnd::Retry { resume: self.session.can_resume() });
                            }
                        }
                        Beat::Dead => {
                            // The server never invalidated the session, so
                            // the next connection is resume-eligible.
                            warn!("heartbeat ack missed, connection is dead");
                            return Ok(LoopEnd::Retry { resume: self.session.can_resume() });
                        }
                    }
                }

                Some(cmd) = self.cmd_rx.recv() => {
                    if *self.state_tx.borrow() != ConnectionState::Connected {
                        warn!("rejecting outbound request while not connected");
                        continue;
                    }
                    let env = match cmd {
                        Command::PresenceUpdate(p) => control::presence_update(&p)?,
                        Command::VoiceStateUpdate(p) => control::voice_state_update(&p)?,
                        Command::RequestGuildMembers(p) => control::request_guild_members(&p)?,
                    };
                    if let Err(e) = transport.send(env.encode()?).await {
                        warn!(error = %e, "send failed");
                        return Ok(LoopEnd::Retry { resume: self.session.can_resume() });
                    }
                }

                frame = transport.recv() => match frame {
                    Ok(Some(Frame::Payload(bytes))) => {
                        let env = match Envelope::decode(&bytes) {
                            // One bad frame never takes the session down.
                            Err(e) => {
                                warn!(error = %e, "dropping malformed frame");
                                continue;
                            }
                            Ok(env) => env,
                        };
                        if let Some(end) = self
                            .handle_envelope(env, transport, heartbeat, connected_at)
                            .await?
                        {
                            return Ok(end);
                        }
                    }
                    Ok(Some(Frame::Close(code))) => {
                        return self.close_verdict(code);
                    }
                    Ok(None) => {
                        warn!("stream ended");
                        return Ok(LoopEnd::Retry { resume: self.session.can_resume() });
                    }
                    Err(e) => {
                        warn!(error = %e, "transport error");
                        return Ok(LoopEnd::Retry { resume: self.session.can_resume() });
                    }
                },
            }
        }
    }

    /// Handle one decoded envelope. `Some` ends the physical connection.
    async fn handle_envelope(
        &mut self,
        env: Envelope,
        transport: &mut dyn Transport,
        heartbeat: &mut HeartbeatDriver,
        connected_at: &mut Option<Instant>,
    ) -> Result<Option<LoopEnd>> {
        match env.op {
            OpCode::Dispatch => {
                self.handle_dispatch(env, connected_at).await;
                Ok(None)
            }
            OpCode::Heartbeat => {
                // Server asked for an immediate pulse.
                let pulse = heartbeat.forced_pulse(self.session.sequence())?;
                if let Err(e) = transport.send(pulse.encode()?).await {
                    warn!(error = %e, "send failed");
                    return Ok(Some(LoopEnd::Retry { resume: self.session.can_resume() }));
                }
                Ok(None)
            }
            OpCode::HeartbeatAck => {
                trace!("heartbeat acked");
                heartbeat.ack();
                Ok(None)
            }
            OpCode::Reconnect => {
                // Always resumable by definition of the opcode.
                info!("server requested reconnect");
                Ok(Some(LoopEnd::Retry { resume: true }))
            }
            OpCode::InvalidSession => {
                let resumable = env.payload::<bool>("invalid_session").unwrap_or(false);
                if resumable {
                    info!("invalid session, resumable");
                } else {
                    info!("invalid session, starting over");
                    self.session.clear();
                }
                Ok(Some(LoopEnd::Retry { resume: resumable }))
            }
            OpCode::Hello => {
                warn!("unexpected hello mid-session");
                Ok(None)
            }
            other => {
                warn!(op = other.as_u8(), "unexpected opcode from server");
                Ok(None)
            }
        }
    }

    /// Handle a dispatch envelope: advance the sequence, drive the state
    /// machine for Ready/Resumed, and fan the event out in arrival order.
    async fn handle_dispatch(&mut self, env: Envelope, connected_at: &mut Option<Instant>) {
        if let Some(s) = env.s {
            self.session.observe_seq(s);
        }

        let name = env.event_name().to_string();
        let kind = EventKind::from_name(&name);
        let state = *self.state_tx.borrow();

        match kind {
            EventKind::Ready => match env.payload::<Ready>("ready") {
                Ok(ready) => {
                    info!(session_id = %ready.session_id, "session established");
                    self.session.established(ready.session_id, ready.resume_gateway_url);
                    *connected_at = Some(Instant::now());
                    self.set_state(ConnectionState::Connected);
                }
                Err(e) => warn!(error = %e, "malformed ready"),
            },
            EventKind::Resumed => {
                info!(seq = ?self.session.sequence(), "session resumed");
                *connected_at = Some(Instant::now());
                self.set_state(ConnectionState::Connected);
            }
            _ => {
                if state == ConnectionState::Resuming {
                    // Replay of missed events has begun; the session is
                    // live again. Replayed events may duplicate ones seen
                    // before the drop — downstream handling is idempotent.
                    debug!(event = %name, "resume replay started");
                    *connected_at = Some(Instant::now());
                    self.set_state(ConnectionState::Connected);
                } else if state != ConnectionState::Connected {
                    warn!(event = %name, "dispatch before ready");
                }
            }
        }

        let event = DispatchEvent {
            kind,
            name,
            seq: env.s,
            data: env.d,
        };
        self.dispatcher.dispatch(&event).await;
    }

    /// Apply the close-code policy table. Consulted exactly once per
    /// physical disconnect.
    fn close_verdict(&mut self, code: Option<u16>) -> Result<LoopEnd> {
        let Some(code) = code else {
            warn!("closed without a code");
            return Ok(LoopEnd::Retry { resume: self.session.can_resume() });
        };
        let policy = close::lookup(code);
        if policy.reconnect {
            info!(code, description = policy.description, "server closed, will retry");
            Ok(LoopEnd::Retry { resume: self.session.can_resume() })
        } else {
            Err(ClientError::FatalClose { code, policy })
        }
    }

    /// Sleep out a retry delay. Returns false if shutdown arrived first.
    async fn sleep_or_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown_rx.recv() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        if *self.state_tx.borrow() != state {
            debug!(?state, "state transition");
            self.state_tx.send_replace(state);
        }
    }
}

enum HelloWait {
    Hello(Hello),
    Shutdown,
    Retry,
}
