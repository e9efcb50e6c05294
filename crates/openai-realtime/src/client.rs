//! Connection setup and the duplex transport.

use crate::{
    error::RealtimeError,
    types::{ClientEvent, ServerEvent, event_type},
};
use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{debug, info, warn};

pub const DEFAULT_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of a realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Failed,
}

/// A duplex channel carrying realtime events.
///
/// Inbound events are delivered in arrival order. There is no replay and no
/// reconnection: once the transport leaves `Open` it stays closed.
#[async_trait]
pub trait RealtimeTransport: Send {
    fn state(&self) -> ConnectionState;

    /// Sends one event. Fails fast when the session is not open.
    async fn send(&mut self, event: &ClientEvent) -> Result<(), RealtimeError>;

    /// Sends several events back to back with a single flush.
    async fn send_batch(&mut self, events: &[ClientEvent]) -> Result<(), RealtimeError>;

    /// Waits for the next inbound event.
    ///
    /// Returns [`RealtimeError::Closed`] once the server closes the
    /// connection. Must be cancel-safe so it can sit in a `select!`.
    async fn next_event(&mut self) -> Result<ServerEvent, RealtimeError>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<(), RealtimeError>;
}

/// Builds authenticated connections to the realtime endpoint.
#[derive(Clone)]
pub struct RealtimeClient {
    url: String,
    model: String,
    api_key: SecretString,
    connect_timeout: Duration,
}

impl RealtimeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            api_key: SecretString::from(api_key.into()),
            connect_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The full endpoint URL including the model query parameter.
    pub fn endpoint(&self) -> String {
        format!("{}?model={}", self.url, self.model)
    }

    /// Opens the WebSocket with bearer authentication and the protocol
    /// version header. Resolves only once the handshake has completed.
    pub async fn connect(&self) -> Result<RealtimeSession, RealtimeError> {
        let mut request = self
            .endpoint()
            .into_client_request()
            .map_err(RealtimeError::Connect)?;
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret()).parse()?,
        );
        request
            .headers_mut()
            .insert("OpenAI-Beta", "realtime=v1".parse()?);

        debug!(url = %self.url, model = %self.model, "Connecting to realtime endpoint");
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| RealtimeError::ConnectTimeout(self.connect_timeout))?
            .map_err(RealtimeError::Connect)?;
        info!(model = %self.model, "Connected to OpenAI Realtime API.");

        Ok(RealtimeSession::new(ws_stream))
    }
}

/// An open realtime connection.
pub struct RealtimeSession {
    sink: SplitSink<WsStream, WsMessage>,
    stream: SplitStream<WsStream>,
    state: ConnectionState,
}

impl RealtimeSession {
    fn new(ws_stream: WsStream) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            sink,
            stream,
            state: ConnectionState::Open,
        }
    }

    fn ensure_open(&self) -> Result<(), RealtimeError> {
        match self.state {
            ConnectionState::Open => Ok(()),
            other => Err(RealtimeError::NotOpen(other)),
        }
    }

    fn encode(event: &ClientEvent) -> Result<WsMessage, RealtimeError> {
        Ok(WsMessage::Text(serde_json::to_string(event)?.into()))
    }

    fn fail(&mut self, err: RealtimeError) -> RealtimeError {
        self.state = ConnectionState::Failed;
        err
    }
}

#[async_trait]
impl RealtimeTransport for RealtimeSession {
    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn send(&mut self, event: &ClientEvent) -> Result<(), RealtimeError> {
        self.ensure_open()?;
        let message = Self::encode(event)?;
        debug!(event_type = event_type(event), "Sending client event");
        if let Err(e) = self.sink.send(message).await {
            return Err(self.fail(e.into()));
        }
        Ok(())
    }

    async fn send_batch(&mut self, events: &[ClientEvent]) -> Result<(), RealtimeError> {
        self.ensure_open()?;
        // Encode everything up front so a bad event can't leave half a batch
        // on the wire.
        let messages = events
            .iter()
            .map(Self::encode)
            .collect::<Result<Vec<_>, _>>()?;
        for (event, message) in events.iter().zip(messages) {
            debug!(event_type = event_type(event), "Queueing client event");
            if let Err(e) = self.sink.feed(message).await {
                return Err(self.fail(e.into()));
            }
        }
        if let Err(e) = self.sink.flush().await {
            return Err(self.fail(e.into()));
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Result<ServerEvent, RealtimeError> {
        self.ensure_open()?;
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => return Ok(event),
                        Err(e) => warn!(error = %e, "Ignoring non-JSON text frame"),
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    self.state = ConnectionState::Closed;
                    let reason = frame.map(|f| format!("{} {}", u16::from(f.code), f.reason));
                    warn!(?reason, "Realtime connection closed by server.");
                    return Err(RealtimeError::Closed(reason));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(self.fail(e.into())),
                None => {
                    self.state = ConnectionState::Closed;
                    return Err(RealtimeError::Closed(None));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), RealtimeError> {
        if self.state != ConnectionState::Open {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.sink.close().await?;
        info!("Realtime connection closed.");
        Ok(())
    }
}
