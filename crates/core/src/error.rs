//! Error types for the Arbor domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Arbor operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// The category of a network-level failure, used by the retry policy to
/// decide whether a call is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFault {
    /// The peer reset the connection mid-flight.
    ConnectionReset,
    /// Name resolution failed.
    Dns,
    /// The connection could not be established in time.
    ConnectTimeout,
    /// Anything else (TLS failure, malformed response, ...).
    Other,
}

impl std::fmt::Display for NetworkFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::Dns => write!(f, "dns failure"),
            Self::ConnectTimeout => write!(f, "connect timeout"),
            Self::Other => write!(f, "network failure"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error ({kind}): {message}")]
    Network { kind: NetworkFault, message: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the retry policy should attempt this call again.
    ///
    /// Transient: rate limiting and server-side failures (429, 500, 503),
    /// request timeouts, and recognized network faults (connection reset,
    /// DNS failure, connect timeout). Everything else propagates immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => matches!(status, 429 | 500 | 503),
            Self::Timeout(_) => true,
            Self::Network { kind, .. } => *kind != NetworkFault::Other,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) | Self::InvalidResponse(_) => {
                false
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
