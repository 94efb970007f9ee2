//! `MixClient`: the UI-facing entry point that survives reconnects.

use std::sync::Arc;

use mixchat_transport::{
    Connection as Socket, Connector, TransportError, WebSocketConnector,
};
use tokio::sync::mpsc;

use crate::{ClientConfig, Connection, ConnectionHandle, Event, MixchatError};

/// Owns the configuration, the connector, and the current connection.
///
/// A [`Connection`] is single-use: once `Closed` it stays closed. The client
/// replaces it with a fresh one on [`reopen`](Self::reopen), while the UI
/// keeps reading the same event receiver across connections.
///
/// # Example
///
/// ```rust,no_run
/// use mixchat::prelude::*;
///
/// # async fn demo() -> Result<(), MixchatError> {
/// let (client, mut events) = MixClient::connect(ClientConfig::default())?;
/// while let Some(event) = events.recv().await {
///     if let Event::DirectoryUpdated(peers) = event {
///         client.handle().choose_recipient(0).await?;
///         client.handle().send_text("hello").await?;
///         # let _ = peers;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct MixClient<C = WebSocketConnector> {
    config: ClientConfig,
    connector: Arc<C>,
    events: mpsc::UnboundedSender<Event>,
    handle: ConnectionHandle,
}

impl MixClient<WebSocketConnector> {
    /// Connects to the relay over WebSocket.
    ///
    /// Returns immediately; the socket opens in the background and its
    /// progress shows up as events. Must be called within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`MixchatError::InvalidConfig`] if `config` does not validate.
    pub fn connect(
        config: ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Event>), MixchatError> {
        Self::with_connector(WebSocketConnector, config)
    }
}

impl<C> MixClient<C>
where
    C: Connector<Error = TransportError>,
    C::Connection: Socket<Error = TransportError>,
{
    /// Connects using a custom connector.
    ///
    /// # Errors
    /// Returns [`MixchatError::InvalidConfig`] if `config` does not validate.
    pub fn with_connector(
        connector: C,
        config: ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Event>), MixchatError> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(connector);

        let handle = Connection::spawn(
            Arc::clone(&connector),
            &config,
            events_tx.clone(),
        )?;

        let client = Self {
            config,
            connector,
            events: events_tx,
            handle,
        };
        Ok((client, events_rx))
    }

    /// The current connection.
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts a brand-new connection with empty session state.
    ///
    /// # Errors
    /// Returns [`MixchatError::ProtocolMisuse`] unless the current
    /// connection is `Closed`.
    pub fn reopen(&mut self) -> Result<&ConnectionHandle, MixchatError> {
        let state = self.handle.state();
        if !state.is_closed() {
            return Err(MixchatError::misuse(format!(
                "reopen called while {state}"
            )));
        }

        tracing::info!(host = %self.config.host, port = self.config.port, "reopening connection");
        self.handle = Connection::spawn(
            Arc::clone(&self.connector),
            &self.config,
            self.events.clone(),
        )?;
        Ok(&self.handle)
    }

    /// Closes the current connection. Idempotent.
    pub async fn close(&self) {
        self.handle.close().await;
    }
}
