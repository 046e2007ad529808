use std::io;

use thiserror::Error;

/// Errors from the framed I/O layer (C1): malformed framing, transport
/// failure, or a frame whose body does not parse as JSON.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("frame was not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("frame header missing or malformed Content-Length")]
    MissingContentLength,
    #[error("malformed frame header: {0}")]
    BadHeader(String),
    #[error("frame body did not parse as JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("LF-framed body must not contain the delimiter byte")]
    EmbeddedDelimiter,
}

/// Error taxonomy shared by the JSON-RPC driver (C6).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("transport closed")]
    TransportClosed,
    #[error(transparent)]
    Transport(#[from] FramingError),
    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("call was cancelled")]
    Cancelled,
    #[error("call timed out")]
    Timedout,
    #[error("peer returned error {code}: {message}")]
    Peer { code: i64, message: String },
    #[error("output channel closed")]
    ChannelClosed,
}

/// Error taxonomy for the DAP client (C7); same shape as [`DriverError`] plus
/// a decode-failure variant for typed response construction.
#[derive(Debug, Error)]
pub enum DapError {
    #[error("transport closed")]
    TransportClosed,
    #[error(transparent)]
    Transport(#[from] FramingError),
    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("call was cancelled")]
    Cancelled,
    #[error("call timed out")]
    Timedout,
    #[error("peer reported failure: {0}")]
    Peer(String),
    #[error("output channel closed")]
    ChannelClosed,
    #[error("failed to decode {expected} response: {source}")]
    Decode {
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid DAP message: {0}")]
    InvalidMessage(String),
}

impl From<DriverError> for DapError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::TransportClosed => DapError::TransportClosed,
            DriverError::Transport(e) => DapError::Transport(e),
            DriverError::Encode(e) => DapError::Encode(e),
            DriverError::Cancelled => DapError::Cancelled,
            DriverError::Timedout => DapError::Timedout,
            DriverError::Peer { code, message } => DapError::Peer(format!("{code}: {message}")),
            DriverError::ChannelClosed => DapError::ChannelClosed,
        }
    }
}

/// Errors surfaced by the MCP server (C8).
#[derive(Debug, Error)]
pub enum McpError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("no such method `{0}`")]
    MethodNotFound(String),
    #[error("no such tool `{0}`")]
    ToolNotFound(String),
    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("tool call failed: {0}")]
    ToolFailed(String),
}

/// Errors from spawning an external tool's stdio as a transport.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("child stdin unavailable")]
    StdinUnavailable,
    #[error("child stdout unavailable")]
    StdoutUnavailable,
}
