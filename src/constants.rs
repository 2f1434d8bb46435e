//! Application-wide constants for chatwire.
//!
//! Centralizes the defaults the session controller and CLI fall back to
//! when the config file and environment are silent.

use std::time::Duration;

// ============================================================================
// Connection
// ============================================================================

/// Default streaming chat endpoint.
///
/// The backend serves one conversation per WebSocket on `/ws/chat`.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws/chat";

/// Path appended to an endpoint given as a bare host URL.
pub const DEFAULT_CHAT_PATH: &str = "/ws/chat";

/// Delay before a new transport attempt after a disconnect.
///
/// The backend is a co-located service, so a short fixed delay covers a
/// restart without hammering it.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

// ============================================================================
// WebSocket close codes
// ============================================================================

/// Orderly close requested by this side.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close frame carried no status code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Connection dropped (or never established) without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

// ============================================================================
// Environment
// ============================================================================

/// Overrides the directory holding `config.json`.
pub const ENV_CONFIG_DIR: &str = "CHATWIRE_CONFIG_DIR";

/// Overrides the session endpoint.
pub const ENV_ENDPOINT: &str = "CHATWIRE_ENDPOINT";

/// Overrides the reconnect delay (milliseconds).
pub const ENV_RECONNECT_DELAY_MS: &str = "CHATWIRE_RECONNECT_DELAY_MS";

/// Overrides the reconnect attempt bound.
pub const ENV_MAX_RECONNECTS: &str = "CHATWIRE_MAX_RECONNECTS";

/// Updates a subscriber may leave unread before it is dropped.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;
