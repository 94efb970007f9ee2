//! Connection actor: one Tokio task that owns the socket, the poller, and
//! the session state for a single relay connection.
//!
//! The task multiplexes three sources with `tokio::select!`:
//!
//! - inbound frames from the socket, classified by the [`Codec`] and
//!   dispatched to the [`DirectoryCache`] and the UI's event channel
//! - poller ticks, each one a fetch request
//! - intents from [`ConnectionHandle`]s, answered over `oneshot` replies
//!
//! Nothing is shared between tasks except channels, so the cache and the
//! recipient selection need no locks.
//!
//! ```text
//!   Connecting ──socket open──→ Open ──local close / remote close──→ Closed
//!       │                                                             ↑
//!       └──────────────connect failed / close requested───────────────┘
//! ```
//!
//! `Closed` is terminal. Reconnecting means spawning a new `Connection`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mixchat_poll::Poller;
use mixchat_protocol::{
    ChatMessage, Codec, JsonCodec, PeerIdentity, ProtocolError, Request,
    ResponseKind, DIRECTORY_FIELD, IDENTITY_FIELD,
};
use mixchat_session::{DirectoryCache, RecipientSelection, SessionError};
use mixchat_transport::{
    Connection as Socket, ConnectionId, Connector, Received, TransportError,
    Url, ABNORMAL_CLOSURE,
};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{ClientConfig, Event, MixchatError};

/// Intents buffered between handles and the actor.
const COMMAND_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// Public state types
// ---------------------------------------------------------------------------

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// What happened to a [`ConnectionHandle::send_text`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message went out; the recipient is now locked.
    Sent,
    /// No recipient was chosen, so nothing was sent.
    NoRecipient,
    /// The relay has not reported our identity yet, so the sender keys are
    /// unknown. The message was dropped.
    IdentityPending,
}

// ---------------------------------------------------------------------------
// Commands and handle
// ---------------------------------------------------------------------------

/// Intents sent to the actor. Each carries a reply channel.
enum Command {
    ChooseRecipient {
        index: usize,
        reply: oneshot::Sender<Result<PeerIdentity, MixchatError>>,
    },
    SendText {
        text: String,
        reply: oneshot::Sender<Result<SendOutcome, MixchatError>>,
    },
    RefreshDirectory {
        reply: oneshot::Sender<Result<(), MixchatError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running connection. Used by the UI to issue intents.
///
/// Cheap to clone: an `mpsc::Sender` plus a `watch::Receiver`. Once the
/// connection is `Closed` every intent fails with
/// [`MixchatError::ProtocolMisuse`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// The state as last published by the actor.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Chooses the peer at `index` in the current directory snapshot.
    ///
    /// # Errors
    /// - `Session(NotFound)` if the index is stale or out of range
    /// - `Session(SelectionLocked)` once a message has been sent
    pub async fn choose_recipient(
        &self,
        index: usize,
    ) -> Result<PeerIdentity, MixchatError> {
        self.request(|reply| Command::ChooseRecipient { index, reply })
            .await?
    }

    /// Sends `text` to the chosen recipient.
    ///
    /// Without a recipient this is a no-op reported as
    /// [`SendOutcome::NoRecipient`].
    ///
    /// # Errors
    /// `ProtocolMisuse` unless the connection is `Open`; encode or transport
    /// errors from the send itself.
    pub async fn send_text(
        &self,
        text: impl Into<String>,
    ) -> Result<SendOutcome, MixchatError> {
        self.ensure_open("send_text")?;
        let text = text.into();
        self.request(|reply| Command::SendText { text, reply })
            .await?
    }

    /// Asks the relay for a fresh directory. The result arrives later as
    /// [`Event::DirectoryUpdated`].
    ///
    /// # Errors
    /// `ProtocolMisuse` unless the connection is `Open`.
    pub async fn refresh_directory(&self) -> Result<(), MixchatError> {
        self.ensure_open("refresh_directory")?;
        self.request(|reply| Command::RefreshDirectory { reply })
            .await?
    }

    /// Closes the connection and waits until it is `Closed`. Idempotent.
    pub async fn close(&self) {
        if self.state().is_closed() {
            return;
        }
        // A remote close can win the race; the actor then exits without
        // replying, which is fine.
        let _ = self.request(|reply| Command::Close { reply }).await;
        self.wait_closed().await;
    }

    /// Resolves once the connection reaches `Closed`.
    pub async fn wait_closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(ConnectionState::is_closed).await;
    }

    fn ensure_open(&self, operation: &str) -> Result<(), MixchatError> {
        match self.state() {
            ConnectionState::Open => Ok(()),
            other => Err(MixchatError::misuse(format!(
                "{operation} called while {other}"
            ))),
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, MixchatError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| MixchatError::misuse("connection is closed"))?;
        reply_rx
            .await
            .map_err(|_| MixchatError::misuse("connection is closed"))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The connection state machine. Lives inside its own task; the outside
/// world only sees the [`ConnectionHandle`] returned by
/// [`spawn`](Connection::spawn).
pub struct Connection<C, K = JsonCodec> {
    connector: Arc<C>,
    codec: K,
    endpoint: Url,
    poll_interval: Duration,
    events: mpsc::UnboundedSender<Event>,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<ConnectionState>,
    cache: DirectoryCache,
    selection: RecipientSelection,
    poller: Poller<Request>,
}

impl<C> Connection<C, JsonCodec>
where
    C: Connector<Error = TransportError>,
    C::Connection: Socket<Error = TransportError>,
{
    /// Spawns a connection speaking the relay's JSON protocol.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`MixchatError::InvalidConfig`] if `config` does not validate.
    pub fn spawn(
        connector: Arc<C>,
        config: &ClientConfig,
        events: mpsc::UnboundedSender<Event>,
    ) -> Result<ConnectionHandle, MixchatError> {
        Self::spawn_with_codec(connector, JsonCodec, config, events)
    }
}

impl<C, K> Connection<C, K>
where
    C: Connector<Error = TransportError>,
    C::Connection: Socket<Error = TransportError>,
    K: Codec,
{
    /// Spawns a connection task using `codec` for the wire format.
    ///
    /// # Errors
    /// Returns [`MixchatError::InvalidConfig`] if `config` does not validate.
    pub fn spawn_with_codec(
        connector: Arc<C>,
        codec: K,
        config: &ClientConfig,
        events: mpsc::UnboundedSender<Event>,
    ) -> Result<ConnectionHandle, MixchatError> {
        config.validate()?;
        let endpoint = config.endpoint()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let actor = Self {
            connector,
            codec,
            endpoint,
            poll_interval: config.poll_interval,
            events,
            commands: command_rx,
            state: state_tx,
            cache: DirectoryCache::new(),
            selection: RecipientSelection::default(),
            poller: Poller::new(),
        };

        tokio::spawn(actor.run());

        Ok(ConnectionHandle {
            commands: command_tx,
            state: state_rx,
        })
    }

    async fn run(mut self) {
        tracing::info!(endpoint = %self.endpoint, "connecting to relay");

        let Some(socket) = self.connect().await else {
            return;
        };
        let conn_id = socket.id();

        self.open(&socket).await;
        self.serve(&socket).await;

        tracing::info!(%conn_id, "connection actor stopped");
    }

    /// `Connecting` phase. Returns `None` if the connection ended before
    /// the socket opened.
    async fn connect(&mut self) -> Option<C::Connection> {
        let connector = Arc::clone(&self.connector);
        let endpoint = self.endpoint.clone();
        let connecting = connector.connect(&endpoint);
        tokio::pin!(connecting);

        loop {
            tokio::select! {
                result = &mut connecting => match result {
                    Ok(socket) => return Some(socket),
                    Err(e) => {
                        tracing::warn!(%endpoint, error = %e, "connect failed");
                        self.set_state(ConnectionState::Closed);
                        self.emit(Event::ConnectionClosed {
                            code: ABNORMAL_CLOSURE,
                            reason: e.to_string(),
                        });
                        return None;
                    }
                },
                command = self.commands.recv() => {
                    let closed = match command {
                        Some(command) => self.handle_connecting_command(command),
                        None => true,
                    };
                    if closed {
                        tracing::info!(%endpoint, "closed before the socket opened");
                        self.set_state(ConnectionState::Closed);
                        return None;
                    }
                }
            }
        }
    }

    /// `Connecting → Open` side effects, in order: directory request,
    /// identity request, poller start.
    async fn open(&mut self, socket: &C::Connection) {
        let conn_id = socket.id();
        self.set_state(ConnectionState::Open);
        tracing::info!(%conn_id, endpoint = %self.endpoint, "connection open");

        let directory = self.codec.encode_directory_request();
        if let Err(e) = self.transmit(socket, DIRECTORY_FIELD, directory).await {
            self.report_send_failure(conn_id, DIRECTORY_FIELD, e);
        }
        let identity = self.codec.encode_own_identity_request();
        if let Err(e) = self.transmit(socket, IDENTITY_FIELD, identity).await {
            self.report_send_failure(conn_id, IDENTITY_FIELD, e);
        }

        if let Err(e) = self.poller.start(self.poll_interval, Request::fetch) {
            tracing::error!(%conn_id, error = %e, "poller failed to start");
        }
    }

    /// `Open` phase. Returns once the connection is `Closed`.
    async fn serve(&mut self, socket: &C::Connection) {
        let conn_id = socket.id();

        loop {
            tokio::select! {
                received = socket.recv() => match received {
                    Ok(Received::Message(frame)) => {
                        self.handle_frame(conn_id, &frame);
                    }
                    Ok(Received::Closed(info)) => {
                        self.poller.stop();
                        self.set_state(ConnectionState::Closed);
                        tracing::info!(%conn_id, close = %info, "relay closed the connection");
                        self.emit(Event::ConnectionClosed {
                            code: info.code,
                            reason: info.reason,
                        });
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "transport error");
                        self.emit(Event::TransportError(e.to_string()));
                    }
                },
                request = self.poller.next_tick() => {
                    tracing::trace!(%conn_id, tick = self.poller.tick_count(), "poll");
                    let frame = self.codec.encode_request(&request);
                    if let Err(e) = self.transmit(socket, request.name(), frame).await {
                        self.report_send_failure(conn_id, request.name(), e);
                    }
                }
                command = self.commands.recv() => {
                    let closed = match command {
                        Some(command) => self.handle_command(socket, command).await,
                        None => {
                            tracing::debug!(%conn_id, "all handles dropped");
                            self.shutdown(socket).await;
                            true
                        }
                    };
                    if closed {
                        break;
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Handles an intent while connecting. Returns `true` on close.
    fn handle_connecting_command(&mut self, command: Command) -> bool {
        match command {
            Command::ChooseRecipient { index, reply } => {
                let _ = reply.send(self.choose(index));
            }
            Command::SendText { reply, .. } => {
                let _ = reply.send(Err(MixchatError::misuse(
                    "send_text called while Connecting",
                )));
            }
            Command::RefreshDirectory { reply } => {
                let _ = reply.send(Err(MixchatError::misuse(
                    "refresh_directory called while Connecting",
                )));
            }
            Command::Close { reply } => {
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    /// Handles an intent while open. Returns `true` if the connection
    /// should close.
    async fn handle_command(
        &mut self,
        socket: &C::Connection,
        command: Command,
    ) -> bool {
        match command {
            Command::ChooseRecipient { index, reply } => {
                let _ = reply.send(self.choose(index));
            }
            Command::SendText { text, reply } => {
                let result = self.send_text(socket, text).await;
                let _ = reply.send(result);
            }
            Command::RefreshDirectory { reply } => {
                let frame = self.codec.encode_directory_request();
                let result = self.transmit(socket, DIRECTORY_FIELD, frame).await;
                let _ = reply.send(result);
            }
            Command::Close { reply } => {
                self.shutdown(socket).await;
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    fn choose(&mut self, index: usize) -> Result<PeerIdentity, MixchatError> {
        let peer = self.cache.resolve(index).cloned().ok_or(
            SessionError::NotFound {
                index,
                len: self.cache.len(),
            },
        )?;
        self.selection.choose(peer.clone())?;
        tracing::debug!(index, recipient = %peer, "recipient chosen");
        Ok(peer)
    }

    async fn send_text(
        &mut self,
        socket: &C::Connection,
        text: String,
    ) -> Result<SendOutcome, MixchatError> {
        let conn_id = socket.id();

        let Some(recipient) = self.selection.recipient().cloned() else {
            tracing::debug!(%conn_id, "no recipient chosen, message ignored");
            return Ok(SendOutcome::NoRecipient);
        };
        let Some(own) = self.cache.own_identity() else {
            tracing::warn!(%conn_id, "own identity not known yet, message dropped");
            return Ok(SendOutcome::IdentityPending);
        };

        let message = ChatMessage {
            content: text,
            sender_public_key: own.public_key.clone(),
            sender_provider_public_key: own.provider.public_key.clone(),
        };
        let frame = self.codec.encode_send_request(&message, &recipient)?;
        socket.send(&frame).await?;
        self.selection.lock()?;

        tracing::debug!(
            %conn_id,
            recipient = %recipient,
            bytes = frame.len(),
            "message sent"
        );
        self.emit(Event::MessageSent { message, recipient });
        Ok(SendOutcome::Sent)
    }

    /// `Open → Closed` on a local request. The poller stops before the
    /// socket is torn down so no tick can hit a dead transport.
    async fn shutdown(&mut self, socket: &C::Connection) {
        let conn_id = socket.id();
        self.poller.stop();
        if let Err(e) = socket.close().await {
            tracing::debug!(%conn_id, error = %e, "socket close failed");
        }
        self.set_state(ConnectionState::Closed);
        tracing::info!(%conn_id, "connection closed locally");
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    fn handle_frame(&mut self, conn_id: ConnectionId, frame: &[u8]) {
        debug_assert!(
            self.state.borrow().is_open(),
            "frame delivered outside the Open state"
        );

        match self.codec.decode_response(frame) {
            Ok(kind) => {
                tracing::debug!(%conn_id, kind = kind.name(), "response");
                self.dispatch(conn_id, kind);
            }
            Err(e) => {
                let raw = e
                    .raw()
                    .map(str::to_owned)
                    .unwrap_or_else(|| String::from_utf8_lossy(frame).into_owned());
                tracing::warn!(%conn_id, error = %e, "undecodable frame dropped");
                self.emit(Event::DecodeWarning {
                    raw,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn dispatch(&mut self, conn_id: ConnectionId, kind: ResponseKind) {
        match kind {
            ResponseKind::Fetched(blobs) => {
                if !blobs.is_empty() {
                    tracing::debug!(%conn_id, count = blobs.len(), "messages fetched");
                }
                // One bad blob must not cost the rest of the batch.
                for blob in blobs {
                    match self.codec.decode_message(&blob) {
                        Ok(message) => {
                            self.emit(Event::MessageReceived(message));
                        }
                        Err(e) => {
                            tracing::warn!(%conn_id, error = %e, "fetched message dropped");
                            let reason = e.to_string();
                            self.emit(Event::DecodeWarning { raw: blob, reason });
                        }
                    }
                }
            }
            ResponseKind::DirectoryUpdated(peers) => {
                self.cache.replace_directory(peers.clone());
                self.emit(Event::DirectoryUpdated(peers));
            }
            ResponseKind::OwnIdentity(identity) => {
                if self.cache.set_own_identity(identity.clone()) {
                    self.emit(Event::OwnIdentityKnown(identity));
                }
            }
            ResponseKind::SendAcknowledged => {
                tracing::debug!(%conn_id, "relay acknowledged send");
            }
            ResponseKind::Unrecognized(raw) => {
                tracing::warn!(%conn_id, %raw, "unrecognized response ignored");
                self.emit(Event::DecodeWarning {
                    raw,
                    reason: "unrecognized response".to_string(),
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Puts one encoded request on the socket.
    async fn transmit(
        &self,
        socket: &C::Connection,
        request: &'static str,
        frame: Result<Vec<u8>, ProtocolError>,
    ) -> Result<(), MixchatError> {
        let frame = frame?;
        socket.send(&frame).await?;
        tracing::debug!(conn_id = %socket.id(), request, "request sent");
        Ok(())
    }

    fn report_send_failure(
        &self,
        conn_id: ConnectionId,
        request: &'static str,
        error: MixchatError,
    ) {
        tracing::warn!(%conn_id, request, %error, "request not sent");
        self.emit(Event::TransportError(error.to_string()));
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        tracing::debug!(from = %previous, to = %state, "connection state");
    }

    /// Hands an event to the UI without waiting on the consumer.
    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::debug!("event receiver dropped, event discarded");
        }
    }
}
