//! Error types for the Depot client core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No server is configured, or the base URL + path failed to parse.
    #[error("invalid request URL")]
    InvalidUrl,

    /// The server answered with a non-2xx status. The body is kept verbatim
    /// for diagnostics and never parsed here.
    #[error("HTTP error {status}")]
    Http { status: u16, body: String },

    /// An error from the underlying HTTP transport. Connection failures,
    /// timeouts, and malformed responses all surface here.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The settings store could not be written.
    #[error("settings store error: {0}")]
    Store(#[from] std::io::Error),

    /// A TOTP code was submitted while no challenge was pending.
    #[error("no TOTP challenge is pending")]
    NotAwaitingTotp,

    /// The server reported success but returned no usable token.
    #[error("server response did not include a token")]
    MissingToken,

    /// The referenced server profile does not exist.
    #[error("unknown server profile")]
    UnknownProfile,
}

pub type Result<T> = std::result::Result<T, ClientError>;
