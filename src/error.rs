use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The peer answered with something other than `200 OK`.
    #[error("http response status {0}")]
    Status(reqwest::StatusCode),

    /// Raised by an exchange responder while processing an inbound reader.
    #[error("Responder error: {0}")]
    Responder(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] axum::http::header::InvalidHeaderValue),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
