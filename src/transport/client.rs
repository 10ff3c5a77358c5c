//! WebSocket driver and caller handle.
//!
//! # Responsibilities
//! - Own the socket and the `Connection` state machine in one task
//! - Feed socket events, caller commands and timer ticks into the machine
//! - Execute the returned actions
//!
//! # Design Decisions
//! - Callers talk to the task over a channel; the handle is cheap to clone
//! - The heartbeat timer keeps ticking while disconnected so pause detection
//!   stays accurate across reconnects

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::config::TransportConfig;
use crate::transport::frame::Frame;
use crate::transport::state::{Action, Connection, Reply};
use crate::transport::types::{ConnectionState, TransportError, TransportResult};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Request {
        command: String,
        params: Option<Value>,
        tag: String,
        reply: Reply,
    },
    Cancel(String),
    Justsaying {
        subject: String,
        body: Option<Value>,
    },
    Close,
}

/// Handle to a persistent node connection.
#[derive(Clone)]
pub struct TransportClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    notifications: broadcast::Sender<Frame>,
    request_timeout: Option<Duration>,
}

impl TransportClient {
    /// Start connecting in the background. Must be called within a Tokio runtime.
    pub fn connect(config: TransportConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));

        let period = config.tick_interval().max(Duration::from_millis(1));
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(url = %config.url, "Transport starting");

        let driver = Driver {
            connection: Connection::new(&config, Instant::now()),
            commands: commands_rx,
            handles_gone: false,
            state: state_tx,
            notifications: notifications.clone(),
            ticker,
            config: config.clone(),
        };
        tokio::spawn(driver.run());

        Self {
            commands: commands_tx,
            state: state_rx,
            notifications,
            request_timeout: config.request_timeout(),
        }
    }

    /// Send a request and wait for its correlated response.
    ///
    /// Uses the configured default timeout, if any.
    pub async fn request(&self, command: &str, params: Option<Value>) -> TransportResult<Value> {
        match self.request_timeout {
            Some(timeout) => self.request_with_timeout(command, params, timeout).await,
            None => {
                let (_, rx) = self.submit(command, params)?;
                rx.await.unwrap_or(Err(TransportError::Closed))
            }
        }
    }

    /// Send a request and give up after `timeout`.
    pub async fn request_with_timeout(
        &self,
        command: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> TransportResult<Value> {
        let (tag, rx) = self.submit(command, params)?;
        match time::timeout(timeout, rx).await {
            Ok(result) => result.unwrap_or(Err(TransportError::Closed)),
            Err(_) => {
                let _ = self.commands.send(Command::Cancel(tag));
                Err(TransportError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Fire-and-forget message.
    pub fn justsaying(&self, subject: &str, body: Option<Value>) -> TransportResult<()> {
        self.commands
            .send(Command::Justsaying {
                subject: subject.to_string(),
                body,
            })
            .map_err(|_| TransportError::Closed)
    }

    /// Close the connection. Deferred while the handshake is in progress.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the connection reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> TransportResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| TransportError::Closed)
    }

    /// Frames that did not answer one of our requests.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Frame> {
        self.notifications.subscribe()
    }

    fn submit(
        &self,
        command: &str,
        params: Option<Value>,
    ) -> TransportResult<(String, oneshot::Receiver<TransportResult<Value>>)> {
        let tag = Uuid::new_v4().to_string();
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Request {
                command: command.to_string(),
                params,
                tag: tag.clone(),
                reply,
            })
            .map_err(|_| TransportError::Closed)?;
        Ok((tag, rx))
    }
}

struct Driver {
    connection: Connection,
    commands: mpsc::UnboundedReceiver<Command>,
    handles_gone: bool,
    state: watch::Sender<ConnectionState>,
    notifications: broadcast::Sender<Frame>,
    ticker: Interval,
    config: TransportConfig,
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.publish_state();
            let delay = match self.dial().await {
                Some(socket) => {
                    let actions = self.connection.opened(Instant::now());
                    self.serve(socket, actions).await
                }
                None => self.reconnect_delay(),
            };

            match delay {
                Some(delay) if self.connection.state() == ConnectionState::Reconnecting => {
                    self.publish_state();
                    self.wait(delay).await;
                    self.connection.reconnecting();
                }
                _ => break,
            }
            if self.connection.state() == ConnectionState::Closed {
                break;
            }
        }
        self.publish_state();
        tracing::info!("Transport stopped");
    }

    /// Handshake while still accepting commands and ticks.
    async fn dial(&mut self) -> Option<Socket> {
        let url = self.config.url.clone();
        let connect = time::timeout(self.config.connect_timeout(), connect_async(url));
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(Ok((socket, _))) => Some(socket),
                        Ok(Err(e)) => {
                            let error = TransportError::Connect(e.to_string());
                            tracing::warn!(url = %self.config.url, error = %error, "Connect failed");
                            None
                        }
                        Err(_) => {
                            tracing::warn!(url = %self.config.url, "Connect timed out");
                            None
                        }
                    };
                }
                command = self.commands.recv(), if !self.handles_gone => {
                    // Nothing is sent while connecting; requests only queue.
                    let _ = self.apply(command);
                }
                _ = self.ticker.tick() => {
                    let _ = self.connection.tick(Instant::now());
                }
            }
        }
    }

    /// Pump an open socket until the machine leaves the open state.
    async fn serve(&mut self, socket: Socket, initial: Vec<Action>) -> Option<Duration> {
        let (mut sink, mut stream) = socket.split();
        let mut queue = initial;

        loop {
            let mut reconnect = None;
            let mut index = 0;
            while index < queue.len() {
                match queue[index].clone() {
                    Action::Send(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::warn!(error = %e, "Send failed");
                            queue.extend(self.connection.closed());
                        }
                    }
                    Action::Close => {
                        let _ = sink.close().await;
                        queue.extend(self.connection.closed());
                    }
                    Action::Reconnect(delay) => reconnect = Some(delay),
                    Action::Notify(frame) => {
                        let _ = self.notifications.send(frame);
                    }
                }
                index += 1;
            }
            queue.clear();
            self.publish_state();

            match self.connection.state() {
                ConnectionState::Reconnecting => return reconnect,
                ConnectionState::Closed => return None,
                _ => {}
            }

            tokio::select! {
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        queue = self.connection.frame_received(text.as_str(), Instant::now());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Node closed the connection");
                        queue = self.connection.closed();
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Socket error");
                        queue = self.connection.closed();
                    }
                },
                command = self.commands.recv(), if !self.handles_gone => {
                    queue = self.apply(command);
                }
                _ = self.ticker.tick() => {
                    queue = self.connection.tick(Instant::now());
                }
            }
        }
    }

    /// Reconnect delay while still accepting commands and ticks.
    async fn wait(&mut self, delay: Duration) {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return,
                command = self.commands.recv(), if !self.handles_gone => {
                    let _ = self.apply(command);
                    if self.connection.state() == ConnectionState::Closed {
                        return;
                    }
                }
                _ = self.ticker.tick() => {
                    let _ = self.connection.tick(Instant::now());
                }
            }
        }
    }

    fn apply(&mut self, command: Option<Command>) -> Vec<Action> {
        match command {
            Some(Command::Request {
                command,
                params,
                tag,
                reply,
            }) => self.connection.request(&command, params, tag, reply),
            Some(Command::Cancel(tag)) => {
                self.connection.cancel(&tag);
                Vec::new()
            }
            Some(Command::Justsaying { subject, body }) => {
                self.connection.justsaying(&subject, body)
            }
            Some(Command::Close) => self.connection.close(),
            None => {
                tracing::debug!("All transport handles dropped, closing");
                self.handles_gone = true;
                self.connection.close()
            }
        }
    }

    /// Report a failed handshake to the machine.
    fn reconnect_delay(&mut self) -> Option<Duration> {
        self.connection
            .closed()
            .into_iter()
            .find_map(|action| match action {
                Action::Reconnect(delay) => Some(delay),
                _ => None,
            })
    }

    fn publish_state(&self) {
        let current = self.connection.state();
        self.state.send_if_modified(|state| {
            if *state == current {
                false
            } else {
                *state = current;
                true
            }
        });
    }
}
