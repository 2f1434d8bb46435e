//! Shared WebSocket plumbing.
//!
//! Thin wrapper around `tokio-tungstenite` that hands back split
//! reader/writer halves, so the transport task can `select!` over inbound
//! frames and outbound commands. Nothing else in the crate touches
//! `tokio-tungstenite` directly.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use crate::constants::{CLOSE_ABNORMAL, CLOSE_NO_STATUS};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A frame read from the socket, reduced to what the session cares about.
#[derive(Debug, PartialEq, Eq)]
pub enum WsFrame {
    /// UTF-8 text frame (binary frames are decoded lossily into this too).
    Text(String),
    /// Peer closed the connection.
    Closed {
        /// WebSocket close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

/// Write half of a WebSocket connection.
#[derive(Debug)]
pub struct WsWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    /// Send a UTF-8 text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .context("WebSocket send_text failed")
    }

    /// Send a close frame and flush the sink.
    pub async fn close(&mut self) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Close(None))
            .await
            .context("WebSocket send_close failed")?;
        self.sink.close().await.context("WebSocket close failed")
    }
}

/// Read half of a WebSocket connection.
#[derive(Debug)]
pub struct WsReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReader {
    /// Receive the next text or close frame.
    ///
    /// Pings are answered by tungstenite and skipped here, as are pongs and
    /// raw frames. A stream that ends without a close frame is reported as
    /// an abnormal close.
    pub async fn recv(&mut self) -> Result<WsFrame> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Ok(WsFrame::Text(text.to_string()));
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    return Ok(WsFrame::Text(String::from_utf8_lossy(&data).into_owned()));
                }
                Some(Ok(tungstenite::Message::Close(close_frame))) => {
                    let (code, reason) = close_frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    return Ok(WsFrame::Closed { code, reason });
                }
                Some(Ok(
                    tungstenite::Message::Ping(_)
                    | tungstenite::Message::Pong(_)
                    | tungstenite::Message::Frame(_),
                )) => continue,
                Some(Err(e)) => {
                    return Err(anyhow::anyhow!("WebSocket read error: {e}"));
                }
                None => {
                    return Ok(WsFrame::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    }
}

/// Connect to a WebSocket URL.
///
/// Performs the handshake and returns split (writer, reader) halves.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    install_crypto_provider();

    let request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .context("WebSocket connect failed")?;

    let (sink, stream) = ws_stream.split();

    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Pick ring as the process-wide rustls provider for `wss://`.
///
/// Errors only when a provider is already installed, which is fine.
fn install_crypto_provider() {
    static INSTALL: std::sync::Once = std::sync::Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            log::debug!("[ws] rustls crypto provider already installed");
        }
    });
}

/// Convert an HTTP(S) URL to WS(S) scheme.
///
/// Passes `ws://` and `wss://` through unchanged.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if url.starts_with("wss://") || url.starts_with("ws://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
