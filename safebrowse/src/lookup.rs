use crate::api::{parse_duration_secs, schema};
use crate::canon::canonicalize;
use crate::client::SafeBrowser;
use crate::error::Error;
use crate::expression::expressions;
use crate::hash::{FullHash, HashPrefix};
use crate::list::ThreatList;
use crate::storage::Storage;
use crate::types::{now_unix_secs, PrefixMatch, UrlMatch};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
  /// Selector override; `None` uses the configured lists.
  pub lists: Option<Vec<String>>,
}

impl<S: Storage> SafeBrowser<S> {
  /// Check a URL against the local database, confirming any prefix hits with
  /// the service. Unparseable URLs and transport failures yield an empty
  /// result, not an error: absence of a confirmed match is the only honest
  /// answer in both cases.
  pub fn lookup(&mut self, url: &str, options: &LookupOptions) -> Result<Vec<UrlMatch>, Error> {
    let canonical = match canonicalize(url) {
      Ok(c) => c,
      Err(Error::InvalidUrl(reason)) => {
        tracing::debug!(reason = %reason, "lookup skipped unparseable URL");
        return Ok(Vec::new());
      }
      Err(e) => return Err(e),
    };

    let exprs = expressions(&canonical);
    let hashes: Vec<FullHash> = exprs.iter().map(|e| FullHash::of_expression(e)).collect();

    let lists = match self.expand_selectors(options.lists.as_deref()) {
      Ok(l) => l,
      Err(e @ Error::Storage(_)) => return Err(e),
      Err(e) => {
        tracing::warn!(error = %e, "lookup could not expand list selectors");
        return Ok(Vec::new());
      }
    };
    if lists.is_empty() {
      return Ok(Vec::new());
    }

    let prefix_hits = self.storage.prefix_matches(&hashes, &lists)?;
    if prefix_hits.is_empty() {
      return Ok(Vec::new());
    }
    tracing::debug!(prefixes = prefix_hits.len(), "local prefix match, confirming");

    let now = now_unix_secs();
    let mut cached = Vec::new();
    for hash in &hashes {
      cached.extend(self.storage.full_hashes(hash, &lists, now)?);
    }
    if !cached.is_empty() {
      tracing::debug!(entries = cached.len(), "serving lookup from full hash cache");
      return Ok(
        cached
          .into_iter()
          .map(|e| UrlMatch {
            hash: e.hash,
            list: e.list,
            metadata: e.metadata,
            cache_duration_secs: e.expires_at_unix.saturating_sub(now),
          })
          .collect(),
      );
    }

    let found = match self.request_full_hashes(&prefix_hits) {
      Ok(f) => f,
      Err(e @ Error::Storage(_)) => return Err(e),
      Err(e) => {
        tracing::warn!(error = %e, "full hash request failed");
        return Ok(Vec::new());
      }
    };

    let computed: HashSet<FullHash> = hashes.iter().copied().collect();
    let confirmed: Vec<UrlMatch> = found
      .into_iter()
      .filter(|m| computed.contains(&m.hash))
      .collect();

    if !confirmed.is_empty() {
      self.storage.add_full_hashes(&confirmed, now)?;
    }
    Ok(confirmed)
  }

  /// Ask the service for the full hashes behind the matched prefixes
  /// (§fullHashes:find): one distinct client state per referenced list, the
  /// distinct type tokens across those lists, and each distinct prefix.
  fn request_full_hashes(&mut self, prefix_hits: &[PrefixMatch]) -> Result<Vec<UrlMatch>, Error> {
    let lists: BTreeSet<&ThreatList> = prefix_hits.iter().map(|m| &m.list).collect();
    let mut client_states = Vec::with_capacity(lists.len());
    for list in &lists {
      client_states.push(self.storage.state(list)?);
    }

    let threat_types: BTreeSet<&str> = lists.iter().map(|l| l.threat_type.as_str()).collect();
    let platform_types: BTreeSet<&str> = lists.iter().map(|l| l.platform_type.as_str()).collect();
    let entry_types: BTreeSet<&str> = lists.iter().map(|l| l.threat_entry_type.as_str()).collect();
    let prefixes: BTreeSet<&HashPrefix> = prefix_hits.iter().map(|m| &m.prefix).collect();

    let request = schema::FindRequest {
      client: self.client_info(),
      client_states,
      threat_info: schema::ThreatInfo {
        threat_types: threat_types.into_iter().map(String::from).collect(),
        platform_types: platform_types.into_iter().map(String::from).collect(),
        threat_entry_types: entry_types.into_iter().map(String::from).collect(),
        threat_entries: prefixes
          .into_iter()
          .map(|p| schema::ThreatEntry {
            hash: STANDARD.encode(p.as_bytes()),
          })
          .collect(),
      },
    };

    let response = self.api.find_full_hashes(&request)?;

    let mut out = Vec::with_capacity(response.matches.len());
    for m in response.matches {
      match decode_match(m) {
        Ok(entry) => out.push(entry),
        Err(e) => tracing::warn!(error = %e, "skipping malformed full hash match"),
      }
    }
    Ok(out)
  }
}

fn decode_match(m: schema::ThreatMatch) -> Result<UrlMatch, Error> {
  let threat = m
    .threat
    .ok_or_else(|| Error::protocol("match without threat entry"))?;
  let hash_bytes = STANDARD
    .decode(&threat.hash)
    .map_err(|e| Error::protocol(format!("threat hash is not valid base64: {e}")))?;
  let hash = FullHash::from_bytes(&hash_bytes)?;

  let cache_duration_secs = m
    .cache_duration
    .as_deref()
    .and_then(parse_duration_secs)
    .map_or(0, |s| s as u64);

  let mut metadata = BTreeMap::new();
  if let Some(md) = m.threat_entry_metadata {
    for entry in md.entries {
      let key = STANDARD
        .decode(&entry.key)
        .map_err(|e| Error::protocol(format!("metadata key is not valid base64: {e}")))?;
      let value = STANDARD
        .decode(&entry.value)
        .map_err(|e| Error::protocol(format!("metadata value is not valid base64: {e}")))?;
      metadata.insert(key, value);
    }
  }

  Ok(UrlMatch {
    hash,
    list: m.list,
    metadata,
    cache_duration_secs,
  })
}
