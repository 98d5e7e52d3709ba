//! Network transport speaking a Mattermost-style v4 API.
//!
//! - REST calls go through one `reqwest::Client` per entity, with the user's session
//!   token installed as a default `Authorization` header.
//! - The event socket is opened lazily on the first [`EntityTransport::next_event`]
//!   call and authenticated with an `authentication_challenge` frame.

use super::transport::{EntityTransport, ServerEvent, TransportError, TransportProvider};
use crate::model::{ConnectionConfig, UserIdentity};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

const API_SUFFIX: &str = "/api/v4";

type EventSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frames on the event socket: pushed events carry `event`, replies to our own
/// requests carry `status` instead.
#[derive(Debug, Deserialize)]
struct SocketFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    seq: u64,
}

#[derive(Debug, Deserialize)]
struct PostList {
    #[serde(default)]
    order: Vec<String>,
}

pub struct HttpTransport {
    client: Client,
    api_url: String,
    socket_url: String,
    username: String,
    token: String,
    socket: Mutex<Option<EventSocket>>,
    next_seq: AtomicU64,
}

impl HttpTransport {
    pub fn new(connection: &ConnectionConfig, user: &UserIdentity) -> Result<Self, TransportError> {
        let api_url = with_api_suffix(&connection.server_url)?;
        let socket_url = format!("{}/websocket", with_api_suffix(&connection.websocket_url)?);

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", user.auth_token))
            .map_err(|_| TransportError::InvalidCredentials(user.username.clone()))?;
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(connection.request_timeout())
            .build()?;

        Ok(Self {
            client,
            api_url,
            socket_url,
            username: user.username.clone(),
            token: user.auth_token.clone(),
            socket: Mutex::new(None),
            next_seq: AtomicU64::new(1),
        })
    }

    async fn open_socket(&self) -> Result<EventSocket, TransportError> {
        let (mut socket, _) = connect_async(self.socket_url.as_str()).await?;
        let challenge = serde_json::json!({
            "seq": self.next_seq.fetch_add(1, Ordering::SeqCst),
            "action": "authentication_challenge",
            "data": { "token": self.token },
        });
        socket.send(Message::Text(challenge.to_string())).await?;
        info!(username = %self.username, "Event socket connected");
        Ok(socket)
    }
}

/// Normalizes a base URL and appends the API suffix.
fn with_api_suffix(base: &str) -> Result<String, TransportError> {
    let parsed = Url::parse(base).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base, e)))?;
    Ok(format!("{}{}", parsed.as_str().trim_end_matches('/'), API_SUFFIX))
}

#[async_trait]
impl EntityTransport for HttpTransport {
    async fn create_post(&self, channel_id: &str, message: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/posts", self.api_url))
            .json(&serde_json::json!({ "channel_id": channel_id, "message": message }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn recent_posts(&self, channel_id: &str, limit: usize) -> Result<usize, TransportError> {
        let response = self
            .client
            .get(format!("{}/channels/{}/posts", self.api_url, channel_id))
            .query(&[("page", 0), ("per_page", limit)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        let posts: PostList = response.json().await?;
        Ok(posts.order.len())
    }

    async fn next_event(&self) -> Result<ServerEvent, TransportError> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_socket().await?);
        }
        let Some(socket) = guard.as_mut() else {
            return Err(TransportError::StreamClosed);
        };

        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: SocketFrame = serde_json::from_str(&text)?;
                    if let Some(event) = frame.event {
                        return Ok(ServerEvent {
                            event,
                            seq: frame.seq,
                        });
                    }
                    debug!(username = %self.username, "Skipping socket reply");
                }
                Some(Ok(Message::Close(_))) | None => {
                    *guard = None;
                    return Err(TransportError::StreamClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    *guard = None;
                    return Err(e.into());
                }
            }
        }
    }
}

/// Builds one [`HttpTransport`] per entity.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransports;

impl TransportProvider for HttpTransports {
    fn connect(
        &self,
        connection: &ConnectionConfig,
        user: &UserIdentity,
    ) -> Result<Arc<dyn EntityTransport>, TransportError> {
        Ok(Arc::new(HttpTransport::new(connection, user)?))
    }
}
