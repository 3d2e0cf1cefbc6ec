/// Shared error type used across all sensorlink crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    /// The inbound request could not be authenticated. Always terminal,
    /// never retried.
    #[error("signature: {0}")]
    Signature(String),

    /// The inbound body did not match the event envelope contract.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The event type is outside the recognized set. Terminal, but expected
    /// traffic — handled as an acknowledged ignore, not an alert.
    #[error("unsupported event type: {0}")]
    UnsupportedEvent(String),

    /// Credential acquisition failed, or the platform rejected the bearer
    /// token. Eligible for exactly one forced refresh-and-retry.
    #[error("auth: {0}")]
    Auth(String),

    /// Network-level or 429/5xx failure — eligible for bounded retry.
    #[error("transient: {0}")]
    Transient(String),

    /// Non-auth 4xx from the platform — not retried.
    #[error("permanent: {0}")]
    Permanent(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
