use crate::config::Config;
use crate::error::Error;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod schema;

/// The wire seam. The update and lookup engines only ever talk to this
/// trait, so tests drive them with a scripted implementation instead of a
/// live endpoint.
pub trait ApiClient {
  fn fetch_threat_lists(&self) -> Result<schema::ThreatListsResponse, Error>;
  fn fetch_updates(&self, request: &schema::FetchRequest) -> Result<schema::FetchResponse, Error>;
  fn find_full_hashes(&self, request: &schema::FindRequest) -> Result<schema::FindResponse, Error>;
}

/// Blocking HTTPS client for the /v4 endpoints.
pub struct HttpApiClient {
  http: Client,
  base_url: String,
  api_key: String,
}

impl HttpApiClient {
  pub fn new(config: &Config) -> Result<Self, Error> {
    let http = Client::builder()
      .timeout(config.timeout)
      .gzip(config.compression)
      .user_agent(format!("{}/{}", config.client_id, config.client_version))
      .build()?;

    Ok(Self {
      http,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      api_key: config.api_key.clone(),
    })
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}/v4/{}?key={}", self.base_url, path, self.api_key)
  }

  fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, Error> {
    let response = self.http.get(self.endpoint(path)).send()?;
    Self::decode(path, response)
  }

  fn post_json<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> Result<R, Error> {
    let response = self
      .http
      .post(self.endpoint(path))
      .header(CONTENT_TYPE, "application/json")
      .json(body)
      .send()?;
    Self::decode(path, response)
  }

  fn decode<R: DeserializeOwned>(path: &str, response: reqwest::blocking::Response) -> Result<R, Error> {
    let status = response.status();
    if !status.is_success() {
      // The path alone identifies the call; the full URL would leak the key.
      return Err(Error::HttpStatus {
        endpoint: path.to_string(),
        status: status.as_u16(),
      });
    }

    let body = response.text()?;
    serde_json::from_str(&body)
      .map_err(|e| Error::protocol(format!("decoding {path} response: {e}")))
  }
}

impl ApiClient for HttpApiClient {
  fn fetch_threat_lists(&self) -> Result<schema::ThreatListsResponse, Error> {
    self.get_json("threatLists")
  }

  fn fetch_updates(&self, request: &schema::FetchRequest) -> Result<schema::FetchResponse, Error> {
    self.post_json("threatListUpdates:fetch", request)
  }

  fn find_full_hashes(&self, request: &schema::FindRequest) -> Result<schema::FindResponse, Error> {
    self.post_json("fullHashes:find", request)
  }
}

/// Parse a service duration literal such as `"593.44s"` into seconds.
pub(crate) fn parse_duration_secs(raw: &str) -> Option<f64> {
  let trimmed = raw.trim().strip_suffix('s')?;
  let secs: f64 = trimmed.parse().ok()?;
  if secs.is_finite() && secs >= 0.0 {
    Some(secs)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn duration_literals_parse() {
    assert_eq!(parse_duration_secs("593.44s"), Some(593.44));
    assert_eq!(parse_duration_secs("300s"), Some(300.0));
    assert_eq!(parse_duration_secs("0s"), Some(0.0));
    assert_eq!(parse_duration_secs(" 60s "), Some(60.0));
    assert_eq!(parse_duration_secs("60"), None);
    assert_eq!(parse_duration_secs("-5s"), None);
    assert_eq!(parse_duration_secs("abcs"), None);
  }

  #[test]
  fn endpoint_layout() {
    let mut cfg = Config::new("SECRET");
    cfg.base_url = "https://example.test/".to_string();
    let client = HttpApiClient::new(&cfg).unwrap();
    assert_eq!(
      client.endpoint("threatListUpdates:fetch"),
      "https://example.test/v4/threatListUpdates:fetch?key=SECRET"
    );
  }
}
