use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timed out waiting for {what}")]
    Timeout { what: &'static str },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stream error: {0}")]
    Stream(String),
}
