use crate::api::{parse_duration_secs, schema};
use crate::client::SafeBrowser;
use crate::error::Error;
use crate::hash::{HashPrefix, MAX_PREFIX_LEN, MIN_PREFIX_LEN};
use crate::list::{self, ListSelector};
use crate::storage::Storage;
use crate::types::{now_unix_secs, UpdateStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

// Fallback when the server omits minimumWaitDuration.
const DEFAULT_WAIT_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
  /// Selector override; `None` uses the configured lists.
  pub lists: Option<Vec<String>>,

  /// Update even when the schedule says the window is not open yet.
  pub force: bool,
}

enum ListOutcome {
  Applied { had_additions: bool },
  Reset,
}

impl<S: Storage> SafeBrowser<S> {
  /// Synchronize the local database against the service. Transport and
  /// protocol failures come back as a status (with backoff recorded), not as
  /// an `Err`; only storage failures abort the call.
  pub fn update(&mut self, options: &UpdateOptions) -> Result<UpdateStatus, Error> {
    let now = now_unix_secs();
    let next_allowed = self.storage.next_update()?;
    if !options.force && next_allowed > now {
      tracing::debug!(next_update_unix = next_allowed, "update window not open yet");
      return Ok(UpdateStatus::NoUpdate);
    }

    let raw = options.lists.as_deref().unwrap_or(&self.config.lists);
    let selectors = match ListSelector::parse_all(raw) {
      Ok(s) => s,
      Err(e) => {
        tracing::warn!(error = %e, "refusing update with invalid list selectors");
        return Ok(UpdateStatus::InternalError);
      }
    };

    if list::needs_catalog(&selectors) && self.catalog.is_none() {
      if let Err(e) = self.get_lists() {
        tracing::warn!(error = %e, "threat list catalog fetch failed");
        self.record_failure(now)?;
        return Ok(UpdateStatus::ServerError);
      }
    }

    let lists = list::expand(&selectors, self.catalog.as_deref().unwrap_or(&[]));
    if lists.is_empty() {
      tracing::warn!("no threat lists to update");
      return Ok(UpdateStatus::InternalError);
    }

    let mut update_requests = Vec::with_capacity(lists.len());
    for l in &lists {
      update_requests.push(schema::ListUpdateRequest {
        list: l.clone(),
        state: self.storage.state(l)?,
        constraints: schema::Constraints::raw_only(),
      });
    }
    let request = schema::FetchRequest {
      client: self.client_info(),
      list_update_requests: update_requests,
    };

    let response = match self.api.fetch_updates(&request) {
      Ok(r) => r,
      Err(e) => {
        tracing::warn!(error = %e, "threat list update fetch failed");
        self.record_failure(now)?;
        return Ok(UpdateStatus::ServerError);
      }
    };

    let mut any_additions = false;
    let mut any_reset = false;
    for list_update in &response.list_update_responses {
      match self.apply_list_update(list_update) {
        Ok(ListOutcome::Applied { had_additions }) => any_additions |= had_additions,
        Ok(ListOutcome::Reset) => any_reset = true,
        Err(e @ Error::Storage(_)) => return Err(e),
        Err(e) => {
          // One bad list must not sink the others.
          tracing::warn!(list = %list_update.list, error = %e, "skipping malformed list update");
        }
      }
    }

    let wait = response
      .minimum_wait_duration
      .as_deref()
      .and_then(parse_duration_secs)
      .map_or(DEFAULT_WAIT_SECS, |s| s as u64);
    let next = now + wait;
    self.storage.record_update(now, next)?;
    tracing::info!(
      lists = response.list_update_responses.len(),
      next_update_unix = next,
      "threat list update applied"
    );

    if any_reset {
      Ok(UpdateStatus::DatabaseReset)
    } else if any_additions {
      Ok(UpdateStatus::Successful)
    } else {
      Ok(UpdateStatus::NoData)
    }
  }

  fn apply_list_update(&mut self, update: &schema::ListUpdateResponse) -> Result<ListOutcome, Error> {
    let mut additions: Vec<HashPrefix> = Vec::new();
    for set in &update.additions {
      if let Some(raw) = &set.raw_hashes {
        additions.extend(decode_raw_hashes(raw)?);
      }
    }

    let mut removals: Vec<usize> = Vec::new();
    for set in &update.removals {
      if let Some(raw) = &set.raw_indices {
        removals.extend(raw.indices.iter().copied());
      }
    }

    let had_additions = !additions.is_empty();
    let replace = update.response_type == "FULL_UPDATE";
    let stored = self.storage.save(
      &update.list,
      &update.new_client_state,
      additions,
      &removals,
      replace,
    )?;

    if let Some(checksum) = &update.checksum {
      if table_checksum(&stored) != checksum.sha256 {
        tracing::warn!(list = %update.list, "checksum mismatch after update, resetting list");
        self.storage.reset(&update.list)?;
        return Ok(ListOutcome::Reset);
      }
    }

    tracing::debug!(
      list = %update.list,
      prefixes = stored.len(),
      response_type = %update.response_type,
      "list update applied"
    );
    Ok(ListOutcome::Applied { had_additions })
  }

  fn record_failure(&mut self, now: u64) -> Result<(), Error> {
    let errors = self.storage.schedule()?.consecutive_errors + 1;
    let wait = backoff_wait_secs(errors);
    tracing::warn!(consecutive_errors = errors, wait_secs = wait, "scheduling update backoff");
    self.storage.record_error(now, wait, errors)
  }
}

/// Split the base64 blob of concatenated fixed-width prefixes.
fn decode_raw_hashes(raw: &schema::RawHashes) -> Result<Vec<HashPrefix>, Error> {
  let size = raw.prefix_size;
  if !(MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&size) {
    return Err(Error::protocol(format!("prefixSize {size} outside 4..=32")));
  }

  let bytes = STANDARD
    .decode(&raw.raw_hashes)
    .map_err(|e| Error::protocol(format!("rawHashes is not valid base64: {e}")))?;
  if bytes.len() % size != 0 {
    return Err(Error::protocol(format!(
      "rawHashes length {} is not a multiple of prefixSize {size}",
      bytes.len()
    )));
  }

  bytes
    .chunks_exact(size)
    .map(|chunk| HashPrefix::new(chunk.to_vec()))
    .collect()
}

/// base64(SHA-256(concatenation of the sorted prefix table)), the form the
/// server publishes in `checksum.sha256`.
fn table_checksum(prefixes: &[HashPrefix]) -> String {
  let mut hasher = Sha256::new();
  for p in prefixes {
    hasher.update(p.as_bytes());
  }
  STANDARD.encode(hasher.finalize())
}

/// Backoff window after `consecutive_errors` failed updates in a row.
fn backoff_wait_secs(consecutive_errors: u32) -> u64 {
  let mut rng = rand::thread_rng();
  match consecutive_errors {
    0 | 1 => 60,
    2 => rng.gen_range(30 * 60..=60 * 60),
    3 => rng.gen_range(60 * 60..=120 * 60),
    4 => rng.gen_range(120 * 60..=240 * 60),
    5 => rng.gen_range(240 * 60..=480 * 60),
    _ => 480 * 60,
  }
}
