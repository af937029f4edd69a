//! Dashboard-side realtime client.
//!
//! One owned connection object with an open/request/close lifecycle. The
//! client dials the gateway, immediately requests the initial snapshot, and
//! applies every pushed event to a shared [`DashboardState`]. When the
//! connection drops for any reason it reconnects after a fixed delay,
//! indefinitely; only a credential rejection ends the loop.

pub mod state;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, http::StatusCode, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use clinic_common::protocol::{ClientRequest, ServerEvent, CLOSE_UNAUTHORIZED};

pub use state::{DashboardState, SharedDashboard};

/// Fixed delay between reconnect attempts. No backoff, no retry cap.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A live WebSocket connection to the gateway.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the bearer credential. Terminal for this client
    /// instance — the caller must discard stored credentials and
    /// re-authenticate.
    #[error("credentials rejected by the server")]
    Unauthorized,
    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Connection factory, injectable so the reconnect loop is testable
/// without a network.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, url: &str) -> Result<WsStream, ClientError>;
}

/// Default dialer backed by tokio-tungstenite.
pub struct WsDialer;

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, url: &str) -> Result<WsStream, ClientError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|err| match err {
                tungstenite::Error::Http(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                    ClientError::Unauthorized
                }
                other => ClientError::Transport(other),
            })?;
        Ok(stream)
    }
}

/// The dashboard's single realtime connection.
///
/// Construct once and share the [`SharedDashboard`] handle with whatever
/// renders it; dropping the future returned by [`RealtimeClient::run`]
/// (e.g. on logout or navigation) tears the client down.
pub struct RealtimeClient<D = WsDialer> {
    url: String,
    token: String,
    state: SharedDashboard,
    dialer: D,
}

impl RealtimeClient<WsDialer> {
    /// `url` is the gateway endpoint without the token query parameter,
    /// e.g. `ws://localhost:4010/ws`.
    pub fn new(url: impl Into<String>, token: impl Into<String>, state: SharedDashboard) -> Self {
        Self::with_dialer(url, token, state, WsDialer)
    }
}

impl<D: Dialer> RealtimeClient<D> {
    pub fn with_dialer(
        url: impl Into<String>,
        token: impl Into<String>,
        state: SharedDashboard,
        dialer: D,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            state,
            dialer,
        }
    }

    pub fn state(&self) -> SharedDashboard {
        self.state.clone()
    }

    /// Drive the connection until the credential is rejected.
    ///
    /// Returns `Err(ClientError::Unauthorized)` when the server closes with
    /// the unauthorized close code (or refuses the handshake with 401);
    /// every other failure re-enters the retry loop after
    /// [`RECONNECT_DELAY`].
    pub async fn run(&self) -> Result<(), ClientError> {
        let url = format!("{}?token={}", self.url, self.token);
        loop {
            match self.dialer.dial(&url).await {
                Ok(stream) => {
                    let result = self.drive(stream).await;
                    self.state.lock().connected = false;
                    match result {
                        Ok(()) => tracing::debug!("gateway connection closed"),
                        Err(ClientError::Unauthorized) => {
                            return Err(ClientError::Unauthorized);
                        }
                        Err(err) => tracing::debug!(%err, "gateway connection failed"),
                    }
                }
                Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
                Err(err) => tracing::debug!(%err, "dial failed"),
            }

            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// One connection's lifetime: request the snapshot, then apply pushed
    /// events until the stream ends.
    async fn drive(&self, stream: WsStream) -> Result<(), ClientError> {
        let (mut ws_tx, mut ws_rx) = stream.split();

        self.state.lock().connected = true;

        // A failed send is not fatal here: the server may already have
        // queued a close frame (e.g. credential rejection) that the read
        // loop below must still observe.
        let request = serde_json::to_string(&ClientRequest::FetchInitialData)?;
        if let Err(err) = ws_tx.send(Message::Text(request.into())).await {
            tracing::debug!(%err, "failed to send initial data request");
        }

        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => self.state.lock().apply(event),
                    Err(err) => {
                        tracing::debug!(%err, "ignoring unrecognized server frame");
                    }
                },
                Ok(Message::Close(Some(frame)))
                    if u16::from(frame.code) == CLOSE_UNAUTHORIZED =>
                {
                    return Err(ClientError::Unauthorized);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    tracing::debug!(%err, "gateway read error");
                    break;
                }
            }
        }

        Ok(())
    }
}
