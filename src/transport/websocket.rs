//! WebSocket transport.
//!
//! Each attempt runs on its own tokio task. The task owns the socket, reads
//! frames and forwards them through the attempt's [`EventSink`], and listens
//! on an unbounded `mpsc` channel for outgoing text and close requests.
//!
//! The task reports `Closed` exactly once, on every exit path: handshake
//! failure, close requested before the handshake settled, peer close, read
//! or write error, or an orderly local close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{EventSink, Transport, TransportError, TransportEvent, TransportFactory};
use crate::constants::{CLOSE_ABNORMAL, CLOSE_NORMAL};
use crate::ws::{self, WsFrame};

/// Outgoing command from the controller to the attempt task.
#[derive(Debug)]
enum WsCommand {
    /// Send a UTF-8 text frame.
    Text(String),
    /// Initiate a graceful close.
    Close,
}

/// Opens [`WsTransport`] attempts.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransportFactory;

impl WsTransportFactory {
    /// Create a factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TransportFactory for WsTransportFactory {
    type Transport = WsTransport;

    fn open(&mut self, url: &str, events: EventSink) -> WsTransport {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let attempt = events.attempt();

        log::debug!("[ws] Attempt {} connecting to {}", attempt, url);

        let task_open = Arc::clone(&open);
        let url = url.to_string();
        tokio::spawn(async move {
            let (code, reason) = run_attempt(&url, &events, command_rx, &task_open).await;
            task_open.store(false, Ordering::SeqCst);
            log::debug!("[ws] Attempt {} closed ({}: {})", events.attempt(), code, reason);
            let _ = events.emit(TransportEvent::Closed { code, reason });
        });

        WsTransport {
            command_tx,
            open,
            close_requested: false,
        }
    }
}

/// Handle to one WebSocket attempt.
///
/// Dropping the handle closes the attempt.
#[derive(Debug)]
pub struct WsTransport {
    command_tx: mpsc::UnboundedSender<WsCommand>,
    open: Arc<AtomicBool>,
    close_requested: bool,
}

impl WsTransport {
    /// Whether the handshake completed and the attempt has not closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.close_requested && self.open.load(Ordering::SeqCst)
    }
}

impl Transport for WsTransport {
    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.command_tx
            .send(WsCommand::Text(frame.to_string()))
            .map_err(|e| TransportError::SendFailed(format!("connection task gone: {e}")))
    }

    fn close(&mut self) {
        if self.close_requested {
            return;
        }
        self.close_requested = true;
        // The task may already have exited, in which case it has reported Closed.
        let _ = self.command_tx.send(WsCommand::Close);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drive one attempt to completion, returning the close code and reason.
async fn run_attempt(
    url: &str,
    events: &EventSink,
    mut commands: mpsc::UnboundedReceiver<WsCommand>,
    open: &AtomicBool,
) -> (u16, String) {
    // Only Close (or a dropped handle) can arrive before the handshake settles,
    // since send() refuses until the open flag is set.
    let connected = tokio::select! {
        result = ws::connect(url) => result,
        _ = commands.recv() => {
            return (CLOSE_NORMAL, "closed before open".to_string());
        }
    };

    let (mut writer, mut reader) = match connected {
        Ok(pair) => pair,
        Err(e) => {
            log::warn!("[ws] Attempt {} failed to connect: {:#}", events.attempt(), e);
            return (CLOSE_ABNORMAL, format!("{e:#}"));
        }
    };

    open.store(true, Ordering::SeqCst);
    if !events.emit(TransportEvent::Opened) {
        let _ = writer.close().await;
        return (CLOSE_NORMAL, "session gone".to_string());
    }

    loop {
        tokio::select! {
            frame = reader.recv() => {
                match frame {
                    Ok(WsFrame::Text(text)) => {
                        if !events.emit(TransportEvent::Message(text)) {
                            let _ = writer.close().await;
                            return (CLOSE_NORMAL, "session gone".to_string());
                        }
                    }
                    Ok(WsFrame::Closed { code, reason }) => return (code, reason),
                    Err(e) => {
                        let _ = events.emit(TransportEvent::Error(format!("{e:#}")));
                        return (CLOSE_ABNORMAL, format!("{e:#}"));
                    }
                }
            }
            command = commands.recv() => {
                match command {
                    Some(WsCommand::Text(text)) => {
                        if let Err(e) = writer.send_text(&text).await {
                            open.store(false, Ordering::SeqCst);
                            let _ = events.emit(TransportEvent::Error(format!("{e:#}")));
                            return (CLOSE_ABNORMAL, format!("{e:#}"));
                        }
                    }
                    Some(WsCommand::Close) | None => {
                        open.store(false, Ordering::SeqCst);
                        if let Err(e) = writer.close().await {
                            log::debug!("[ws] Close handshake failed: {:#}", e);
                        }
                        return (CLOSE_NORMAL, "client requested close".to_string());
                    }
                }
            }
        }
    }
}
