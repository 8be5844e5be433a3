use crate::error::Error;
use crate::hash::{FullHash, HashPrefix};
use crate::list::ThreatList;
use crate::storage::{apply_update, Storage};
use crate::types::{FullHashEntry, PrefixMatch, ScheduleState, UrlMatch};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub(crate) struct PrefixTable {
  pub(crate) state: String,
  pub(crate) prefixes: Vec<HashPrefix>,
  // Distinct prefix lengths present, so matching probes only lengths that
  // can exist in this table.
  lengths: BTreeSet<usize>,
}

impl PrefixTable {
  pub(crate) fn replace(&mut self, state: &str, prefixes: Vec<HashPrefix>) {
    self.state = state.to_string();
    self.lengths = prefixes.iter().map(|p| p.len()).collect();
    self.prefixes = prefixes;
  }

  fn longest_match(&self, hash: &FullHash) -> Option<HashPrefix> {
    for &len in self.lengths.iter().rev() {
      let probe = hash.prefix(len);
      if self.prefixes.binary_search(&probe).is_ok() {
        return Some(probe);
      }
    }
    None
  }
}

/// The reference `Storage`: everything in process memory. Also the engine
/// behind the file-backed store, which persists a mirror of this state.
#[derive(Debug, Default)]
pub struct MemoryStore {
  tables: BTreeMap<ThreatList, PrefixTable>,
  cache: Vec<FullHashEntry>,
  schedule: ScheduleState,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Install an already-validated table, bypassing the update transition.
  /// Used by persistent backends when loading their snapshot.
  pub fn install_table(&mut self, list: &ThreatList, state: &str, prefixes: Vec<HashPrefix>) {
    let mut sorted = prefixes;
    sorted.sort();
    sorted.dedup();
    self.tables.entry(list.clone()).or_default().replace(state, sorted);
  }

  pub fn install_cache(&mut self, entries: Vec<FullHashEntry>) {
    self.cache = entries;
  }

  pub fn install_schedule(&mut self, schedule: ScheduleState) {
    self.schedule = schedule;
  }

  pub fn lists(&self) -> Vec<ThreatList> {
    self.tables.keys().cloned().collect()
  }

  pub fn table_snapshot(&self, list: &ThreatList) -> Option<(String, Vec<HashPrefix>)> {
    self
      .tables
      .get(list)
      .map(|t| (t.state.clone(), t.prefixes.clone()))
  }

  pub fn cache_snapshot(&self) -> Vec<FullHashEntry> {
    self.cache.clone()
  }
}

impl Storage for MemoryStore {
  fn save(
    &mut self,
    list: &ThreatList,
    state: &str,
    additions: Vec<HashPrefix>,
    removals: &[usize],
    replace: bool,
  ) -> Result<Vec<HashPrefix>, Error> {
    let table = self.tables.entry(list.clone()).or_default();
    let current: &[HashPrefix] = if replace { &[] } else { &table.prefixes };
    let next = apply_update(current, removals, additions)?;
    table.replace(state, next.clone());
    Ok(next)
  }

  fn reset(&mut self, list: &ThreatList) -> Result<(), Error> {
    self.tables.remove(list);
    Ok(())
  }

  fn state(&self, list: &ThreatList) -> Result<String, Error> {
    Ok(self.tables.get(list).map(|t| t.state.clone()).unwrap_or_default())
  }

  fn prefix_matches(
    &self,
    hashes: &[FullHash],
    lists: &[ThreatList],
  ) -> Result<Vec<PrefixMatch>, Error> {
    let mut out = BTreeSet::new();
    for list in lists {
      let Some(table) = self.tables.get(list) else {
        continue;
      };
      for hash in hashes {
        if let Some(prefix) = table.longest_match(hash) {
          out.insert(PrefixMatch {
            prefix,
            list: list.clone(),
          });
        }
      }
    }
    Ok(out.into_iter().collect())
  }

  fn add_full_hashes(&mut self, entries: &[UrlMatch], now_unix: u64) -> Result<(), Error> {
    self.cache.retain(|e| !e.is_expired(now_unix));
    for entry in entries {
      self
        .cache
        .retain(|e| !(e.hash == entry.hash && e.list == entry.list));
      self.cache.push(FullHashEntry {
        hash: entry.hash,
        list: entry.list.clone(),
        metadata: entry.metadata.clone(),
        expires_at_unix: now_unix + entry.cache_duration_secs,
      });
    }
    Ok(())
  }

  fn full_hashes(
    &self,
    hash: &FullHash,
    lists: &[ThreatList],
    now_unix: u64,
  ) -> Result<Vec<FullHashEntry>, Error> {
    Ok(
      self
        .cache
        .iter()
        .filter(|e| e.hash == *hash && lists.contains(&e.list) && !e.is_expired(now_unix))
        .cloned()
        .collect(),
    )
  }

  fn next_update(&self) -> Result<u64, Error> {
    Ok(self.schedule.next_update_unix)
  }

  fn record_update(&mut self, time_unix: u64, next_unix: u64) -> Result<(), Error> {
    self.schedule = ScheduleState {
      last_update_unix: time_unix,
      next_update_unix: next_unix,
      consecutive_errors: 0,
    };
    Ok(())
  }

  fn record_error(&mut self, time_unix: u64, wait_secs: u64, errors: u32) -> Result<(), Error> {
    self.schedule = ScheduleState {
      last_update_unix: time_unix,
      next_update_unix: time_unix + wait_secs,
      consecutive_errors: errors,
    };
    Ok(())
  }

  fn schedule(&self) -> Result<ScheduleState, Error> {
    Ok(self.schedule)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  fn list() -> ThreatList {
    ThreatList::new("MALWARE", "ANY_PLATFORM", "URL")
  }

  fn prefix(bytes: &[u8]) -> HashPrefix {
    HashPrefix::new(bytes.to_vec()).unwrap()
  }

  fn url_match(hash: FullHash, duration: u64) -> UrlMatch {
    UrlMatch {
      hash,
      list: list(),
      metadata: BTreeMap::new(),
      cache_duration_secs: duration,
    }
  }

  #[test]
  fn save_sorts_dedupes_and_records_state() {
    let mut store = MemoryStore::new();
    let stored = store
      .save(
        &list(),
        "state-1",
        vec![prefix(b"dddd"), prefix(b"aaaa"), prefix(b"aaaa")],
        &[],
        true,
      )
      .unwrap();

    assert_eq!(stored, vec![prefix(b"aaaa"), prefix(b"dddd")]);
    assert_eq!(store.state(&list()).unwrap(), "state-1");

    let mut sorted = stored.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(stored, sorted);
  }

  #[test]
  fn partial_save_removes_then_adds() {
    let mut store = MemoryStore::new();
    store
      .save(
        &list(),
        "s1",
        vec![prefix(b"aaaa"), prefix(b"bbbb"), prefix(b"cccc")],
        &[],
        true,
      )
      .unwrap();

    let stored = store
      .save(&list(), "s2", vec![prefix(b"zzzz")], &[0], false)
      .unwrap();
    assert_eq!(stored, vec![prefix(b"bbbb"), prefix(b"cccc"), prefix(b"zzzz")]);
    assert_eq!(store.state(&list()).unwrap(), "s2");
  }

  #[test]
  fn replace_ignores_previous_contents() {
    let mut store = MemoryStore::new();
    store.save(&list(), "s1", vec![prefix(b"aaaa")], &[], true).unwrap();
    let stored = store.save(&list(), "s2", vec![prefix(b"bbbb")], &[], true).unwrap();
    assert_eq!(stored, vec![prefix(b"bbbb")]);
  }

  #[test]
  fn reset_clears_table_and_state() {
    let mut store = MemoryStore::new();
    store.save(&list(), "s1", vec![prefix(b"aaaa")], &[], true).unwrap();
    store.reset(&list()).unwrap();
    assert_eq!(store.state(&list()).unwrap(), "");
    let h = FullHash::of_expression("whatever");
    assert!(store.prefix_matches(&[h], &[list()]).unwrap().is_empty());
  }

  #[test]
  fn prefix_matching_returns_longest_and_only_real_prefixes() {
    let mut store = MemoryStore::new();
    let hash = FullHash::of_expression("evil.com/");
    let p4 = hash.prefix(4);
    let p8 = hash.prefix(8);
    let unrelated = prefix(b"\xff\xff\xff\xff");

    store
      .save(&list(), "s", vec![p4.clone(), p8.clone(), unrelated], &[], true)
      .unwrap();

    let matches = store.prefix_matches(&[hash], &[list()]).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].prefix, p8);
    assert!(hash.has_prefix(&matches[0].prefix));

    let other = FullHash::of_expression("good.com/");
    for m in store.prefix_matches(&[other], &[list()]).unwrap() {
      assert!(other.has_prefix(&m.prefix));
    }
  }

  #[test]
  fn prefix_matching_ignores_unknown_lists() {
    let mut store = MemoryStore::new();
    let hash = FullHash::of_expression("evil.com/");
    store.save(&list(), "s", vec![hash.prefix(4)], &[], true).unwrap();

    let other_list = ThreatList::new("MALWARE", "WINDOWS", "URL");
    assert!(store.prefix_matches(&[hash], &[other_list]).unwrap().is_empty());
  }

  #[test]
  fn cache_entries_expire_inclusively() {
    let mut store = MemoryStore::new();
    let hash = FullHash::of_expression("evil.com/");
    store.add_full_hashes(&[url_match(hash, 300)], 1_000).unwrap();

    assert_eq!(store.full_hashes(&hash, &[list()], 1_299).unwrap().len(), 1);
    assert!(store.full_hashes(&hash, &[list()], 1_300).unwrap().is_empty());
    assert!(store.full_hashes(&hash, &[list()], 2_000).unwrap().is_empty());
  }

  #[test]
  fn cache_merge_replaces_same_hash_and_list() {
    let mut store = MemoryStore::new();
    let hash = FullHash::of_expression("evil.com/");
    store.add_full_hashes(&[url_match(hash, 100)], 1_000).unwrap();
    store.add_full_hashes(&[url_match(hash, 500)], 1_050).unwrap();

    let entries = store.full_hashes(&hash, &[list()], 1_200).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].expires_at_unix, 1_550);
  }

  #[test]
  fn cache_filters_by_list() {
    let mut store = MemoryStore::new();
    let hash = FullHash::of_expression("evil.com/");
    store.add_full_hashes(&[url_match(hash, 300)], 1_000).unwrap();

    let other = ThreatList::new("SOCIAL_ENGINEERING", "ANY_PLATFORM", "URL");
    assert!(store.full_hashes(&hash, &[other], 1_100).unwrap().is_empty());
  }

  #[test]
  fn schedule_round_trip() {
    let mut store = MemoryStore::new();
    assert_eq!(store.next_update().unwrap(), 0);

    store.record_error(1_000, 60, 1).unwrap();
    let s = store.schedule().unwrap();
    assert_eq!(s.last_update_unix, 1_000);
    assert_eq!(s.next_update_unix, 1_060);
    assert_eq!(s.consecutive_errors, 1);

    store.record_update(2_000, 2_600).unwrap();
    let s = store.schedule().unwrap();
    assert_eq!(s.last_update_unix, 2_000);
    assert_eq!(s.next_update_unix, 2_600);
    assert_eq!(s.consecutive_errors, 0);
  }
}
