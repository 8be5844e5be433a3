use crate::error::Error;
use std::time::Duration;

/// Engine configuration. `api_key` is the only field without a usable
/// default; everything else mirrors the service defaults.
#[derive(Debug, Clone)]
pub struct Config {
  pub api_key: String,

  /// List selectors, e.g. `"MALWARE/WINDOWS/URL"` or `"*/WINDOWS/*"`. Empty
  /// means every list the service advertises.
  pub lists: Vec<String>,

  pub base_url: String,
  pub timeout: Duration,

  /// Ask for compressed response bodies (Accept-Encoding: gzip).
  pub compression: bool,

  pub client_id: String,
  pub client_version: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_key: String::new(),
      lists: Vec::new(),
      base_url: default_base_url(),
      timeout: default_timeout(),
      compression: true,
      client_id: default_client_id(),
      client_version: default_client_version(),
    }
  }
}

impl Config {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      api_key: api_key.into(),
      ..Self::default()
    }
  }

  pub fn validate(&self) -> Result<(), Error> {
    if self.api_key.trim().is_empty() {
      return Err(Error::protocol("api_key must not be empty"));
    }
    if self.timeout.is_zero() {
      return Err(Error::protocol("timeout must be > 0"));
    }

    let url = reqwest::Url::parse(&self.base_url)
      .map_err(|e| Error::protocol(format!("invalid base_url `{}`: {e}", self.base_url)))?;
    if url.scheme() != "https" && url.scheme() != "http" {
      return Err(Error::protocol(format!(
        "base_url must be http(s), got `{}`",
        self.base_url
      )));
    }
    if url.host_str().is_none() {
      return Err(Error::protocol(format!("base_url has no host: `{}`", self.base_url)));
    }

    Ok(())
  }
}

fn default_base_url() -> String {
  "https://safebrowsing.googleapis.com".to_string()
}

fn default_timeout() -> Duration {
  Duration::from_secs(60)
}

fn default_client_id() -> String {
  env!("CARGO_PKG_NAME").to_string()
}

fn default_client_version() -> String {
  env!("CARGO_PKG_VERSION").to_string()
}
