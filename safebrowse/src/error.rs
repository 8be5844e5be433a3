#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("invalid URL: {0}")]
  InvalidUrl(String),

  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("HTTP {status} from {endpoint}")]
  HttpStatus { endpoint: String, status: u16 },

  #[error("protocol error: {0}")]
  Protocol(String),

  #[error("checksum mismatch for list {list}")]
  ChecksumMismatch { list: String },

  #[error("storage error: {0}")]
  Storage(String),
}

impl Error {
  pub fn storage(msg: impl Into<String>) -> Self {
    Error::Storage(msg.into())
  }

  pub fn protocol(msg: impl Into<String>) -> Self {
    Error::Protocol(msg.into())
  }
}
