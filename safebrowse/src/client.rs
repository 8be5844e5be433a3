use crate::api::{schema, ApiClient, HttpApiClient};
use crate::config::Config;
use crate::error::Error;
use crate::list::{self, ListSelector, ThreatList};
use crate::storage::Storage;

/// The engine: owns the storage, the API client and the lazily fetched
/// known-list catalog. One instance per storage; callers needing concurrent
/// use serialize `update` and `lookup` behind their own lock.
pub struct SafeBrowser<S: Storage> {
  pub(crate) config: Config,
  pub(crate) storage: S,
  pub(crate) api: Box<dyn ApiClient>,
  pub(crate) catalog: Option<Vec<ThreatList>>,
}

impl<S: Storage> SafeBrowser<S> {
  pub fn new(config: Config, storage: S) -> Result<Self, Error> {
    config.validate()?;
    let api = Box::new(HttpApiClient::new(&config)?);
    Ok(Self {
      config,
      storage,
      api,
      catalog: None,
    })
  }

  /// Construct with a caller-supplied API client. This is the seam the tests
  /// use; it also allows alternative transports.
  pub fn with_api_client(config: Config, storage: S, api: Box<dyn ApiClient>) -> Result<Self, Error> {
    config.validate()?;
    Ok(Self {
      config,
      storage,
      api,
      catalog: None,
    })
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  pub fn storage_mut(&mut self) -> &mut S {
    &mut self.storage
  }

  /// Fetch the threat-list catalog from the service. The result is cached
  /// and reused for wildcard selector expansion until the next call.
  pub fn get_lists(&mut self) -> Result<Vec<ThreatList>, Error> {
    let response = self.api.fetch_threat_lists()?;
    if response.threat_lists.is_empty() {
      tracing::warn!("service advertised an empty threat list catalog");
    }
    self.catalog = Some(response.threat_lists.clone());
    Ok(response.threat_lists)
  }

  pub(crate) fn client_info(&self) -> schema::ClientInfo {
    schema::ClientInfo {
      client_id: self.config.client_id.clone(),
      client_version: self.config.client_version.clone(),
    }
  }

  /// Expand selector strings (the per-call override, or the configured set)
  /// into concrete lists, fetching the catalog on demand when a wildcard or
  /// an empty selector set requires it.
  pub(crate) fn expand_selectors(&mut self, overrides: Option<&[String]>) -> Result<Vec<ThreatList>, Error> {
    let raw = overrides.unwrap_or(&self.config.lists);
    let selectors = ListSelector::parse_all(raw)?;

    if list::needs_catalog(&selectors) && self.catalog.is_none() {
      self.get_lists()?;
    }

    let catalog = self.catalog.as_deref().unwrap_or(&[]);
    Ok(list::expand(&selectors, catalog))
  }
}
