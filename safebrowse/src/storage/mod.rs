use crate::error::Error;
use crate::hash::{FullHash, HashPrefix};
use crate::list::ThreatList;
use crate::types::{FullHashEntry, PrefixMatch, ScheduleState, UrlMatch};

pub mod memory;

/// Persistence contract the engines run against. Implementations must keep
/// each list's prefix table sorted and duplicate-free across restarts, and
/// make `save` atomic: after a crash either the old table+state pair or the
/// new one is visible, never a mix.
pub trait Storage {
  /// Apply one list update. With `replace` the table restarts from empty
  /// (FULL_UPDATE); otherwise `removals` index into the current sorted
  /// table, then `additions` are merged in. Returns the resulting sorted
  /// table so the caller can verify the server checksum against exactly
  /// what was persisted.
  fn save(
    &mut self,
    list: &ThreatList,
    state: &str,
    additions: Vec<HashPrefix>,
    removals: &[usize],
    replace: bool,
  ) -> Result<Vec<HashPrefix>, Error>;

  /// Drop the table and client state for `list`.
  fn reset(&mut self, list: &ThreatList) -> Result<(), Error>;

  /// Current client state for `list`; empty string when the list is unknown.
  fn state(&self, list: &ThreatList) -> Result<String, Error>;

  /// For every (hash, list) pair, the longest stored prefix that is a
  /// byte-prefix of the hash, if any.
  fn prefix_matches(
    &self,
    hashes: &[FullHash],
    lists: &[ThreatList],
  ) -> Result<Vec<PrefixMatch>, Error>;

  /// Merge confirmed full hashes into the cache, stamping each entry with
  /// `now_unix + cache_duration`.
  fn add_full_hashes(&mut self, entries: &[UrlMatch], now_unix: u64) -> Result<(), Error>;

  /// Unexpired cached entries for `hash` in any of `lists`.
  fn full_hashes(
    &self,
    hash: &FullHash,
    lists: &[ThreatList],
    now_unix: u64,
  ) -> Result<Vec<FullHashEntry>, Error>;

  /// Earliest allowed time of the next update; 0 when never scheduled.
  fn next_update(&self) -> Result<u64, Error>;

  /// Record a successful update and clear the error counter.
  fn record_update(&mut self, time_unix: u64, next_unix: u64) -> Result<(), Error>;

  /// Record a failed update and its backoff window.
  fn record_error(&mut self, time_unix: u64, wait_secs: u64, errors: u32) -> Result<(), Error>;

  fn schedule(&self) -> Result<ScheduleState, Error>;
}

/// Shared table transition: removals by index into the pre-removal sorted
/// table, then merge-add, then lexicographic sort with duplicates dropped.
pub fn apply_update(
  current: &[HashPrefix],
  removals: &[usize],
  additions: Vec<HashPrefix>,
) -> Result<Vec<HashPrefix>, Error> {
  for &idx in removals {
    if idx >= current.len() {
      return Err(Error::protocol(format!(
        "removal index {idx} out of range for table of {} prefixes",
        current.len()
      )));
    }
  }

  let drop: std::collections::HashSet<usize> = removals.iter().copied().collect();
  let mut table: Vec<HashPrefix> = current
    .iter()
    .enumerate()
    .filter(|(i, _)| !drop.contains(i))
    .map(|(_, p)| p.clone())
    .collect();

  table.extend(additions);
  table.sort();
  table.dedup();
  Ok(table)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn prefix(bytes: &[u8]) -> HashPrefix {
    HashPrefix::new(bytes.to_vec()).unwrap()
  }

  #[test]
  fn apply_update_sorts_and_dedupes() {
    let table = apply_update(
      &[],
      &[],
      vec![prefix(b"bbbb"), prefix(b"aaaa"), prefix(b"bbbb")],
    )
    .unwrap();
    assert_eq!(table, vec![prefix(b"aaaa"), prefix(b"bbbb")]);
  }

  #[test]
  fn apply_update_removes_by_pre_removal_index() {
    let current = vec![prefix(b"aaaa"), prefix(b"bbbb"), prefix(b"cccc")];
    let table = apply_update(&current, &[0, 2], vec![]).unwrap();
    assert_eq!(table, vec![prefix(b"bbbb")]);
  }

  #[test]
  fn apply_update_rejects_out_of_range_index() {
    let current = vec![prefix(b"aaaa")];
    assert!(apply_update(&current, &[1], vec![]).is_err());
  }
}
