//! JSON WebSocket client for driving the lobby server in tests.

use std::error::Error;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type BoxError = Box<dyn Error>;

pub struct WebSocketClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketClient {
    pub async fn connect(url: &str) -> Result<Self, BoxError> {
        let (stream, _) = connect_async(url).await?;
        Ok(Self { stream })
    }

    /// Connects, retrying until the server accepts or `timeout` elapses.
    pub async fn connect_retry(url: &str, timeout: Duration) -> Result<Self, BoxError> {
        let start = tokio::time::Instant::now();
        loop {
            match connect_async(url).await {
                Ok((stream, _)) => return Ok(Self { stream }),
                Err(err) => {
                    if start.elapsed() >= timeout {
                        return Err(Box::new(err));
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        }
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), BoxError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    pub async fn send_json(&mut self, value: &Value) -> Result<(), BoxError> {
        self.send_text(&value.to_string()).await
    }

    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<(), BoxError> {
        self.stream.send(Message::binary(bytes)).await?;
        Ok(())
    }

    /// Next text frame parsed as JSON. Control frames are skipped; `None`
    /// means the server closed the socket.
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<Option<Value>, BoxError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let next = tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .map_err(|_| "timeout waiting for message")?;
            match next.transpose()? {
                Some(Message::Text(text)) => return Ok(Some(serde_json::from_str(text.as_str())?)),
                Some(Message::Close(_)) | None => return Ok(None),
                Some(_) => continue,
            }
        }
    }

    /// Reads messages until one has the given `type`, discarding the rest.
    pub async fn recv_type(&mut self, kind: &str, timeout: Duration) -> Result<Value, BoxError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.recv_json_timeout(remaining).await? {
                Some(msg) if msg["type"] == kind => return Ok(msg),
                Some(_) => continue,
                None => return Err(format!("connection closed before {kind}").into()),
            }
        }
    }

    /// Asserts-friendly check that nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) -> Result<(), BoxError> {
        match tokio::time::timeout(window, self.stream.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => Ok(()),
            Ok(other) => Err(format!("unexpected frame: {other:?}").into()),
        }
    }

    pub async fn close(&mut self) -> Result<(), BoxError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
