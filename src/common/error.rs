//! Error types for the application.

use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Discord error: {0}")]
    Discord(#[from] DiscordError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Archipelago protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid packet: {message}")]
    InvalidPacket { message: String },

    #[error("Packet '{cmd}' is missing field '{field}'")]
    MissingField { cmd: String, field: &'static str },

    #[error("Connection refused by server: {}", .reasons.join(", "))]
    ConnectionRefused { reasons: Vec<String> },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Transport connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to connect to {url}: {message}")]
    ConnectFailed { url: String, message: String },

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Handshake timed out")]
    Timeout,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Discord-related errors.
#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity::Error),
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open database '{path}': {message}")]
    Open { path: String, message: String },

    #[error("Query failed: {0}")]
    Query(#[from] tokio_rusqlite::Error<rusqlite::Error>),

    #[error("Stored value for '{key}' is invalid: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for connection operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
