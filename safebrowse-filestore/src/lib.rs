//! File-backed storage for the `safebrowse` client.
//!
//! Layout under the store directory:
//!
//! ```text
//! lists/<THREAT>_<PLATFORM>_<ENTRY>.json   state + base64 prefixes
//! cache.json                               full-hash cache
//! schedule.json                            update schedule
//! ```
//!
//! Every write goes to a staging file first and is renamed into place, so a
//! crash leaves either the previous file or the new one, never a torn mix.
//! The in-memory mirror is the source of truth between writes; files are
//! only read back at `open`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use safebrowse::error::Error;
use safebrowse::hash::{FullHash, HashPrefix};
use safebrowse::list::ThreatList;
use safebrowse::storage::memory::MemoryStore;
use safebrowse::storage::Storage;
use safebrowse::types::{FullHashEntry, PrefixMatch, ScheduleState, UrlMatch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct ListFile {
  threat_type: String,
  platform_type: String,
  threat_entry_type: String,
  state: String,
  // base64, stored in table order
  prefixes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
  entries: Vec<CacheEntryFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntryFile {
  hash: String,
  threat_type: String,
  platform_type: String,
  threat_entry_type: String,
  metadata: Vec<MetadataPair>,
  expires_at_unix: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataPair {
  key: String,
  value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScheduleFile {
  last_update_unix: u64,
  next_update_unix: u64,
  consecutive_errors: u32,
}

pub struct FileStore {
  root: PathBuf,
  inner: MemoryStore,
}

impl FileStore {
  /// Open (or create) a store rooted at `root`, loading any persisted lists,
  /// cache and schedule. Unreadable files are an error rather than silently
  /// dropped state.
  pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
    let root = root.into();
    let lists_dir = root.join("lists");
    fs::create_dir_all(&lists_dir)
      .map_err(|e| Error::storage(format!("create {}: {e}", lists_dir.display())))?;

    let mut inner = MemoryStore::new();

    for entry in fs::read_dir(&lists_dir)
      .map_err(|e| Error::storage(format!("read {}: {e}", lists_dir.display())))?
      .flatten()
    {
      let path = entry.path();
      if path.extension().and_then(|s| s.to_str()) != Some("json") {
        continue;
      }
      let file: ListFile = read_json(&path)?;
      let list = ThreatList::new(file.threat_type, file.platform_type, file.threat_entry_type);
      let mut prefixes = Vec::with_capacity(file.prefixes.len());
      for raw in &file.prefixes {
        prefixes.push(decode_prefix(raw, &path)?);
      }
      inner.install_table(&list, &file.state, prefixes);
      tracing::debug!(list = %list, "loaded threat list table");
    }

    let cache_path = root.join("cache.json");
    if cache_path.exists() {
      let file: CacheFile = read_json(&cache_path)?;
      let mut entries = Vec::with_capacity(file.entries.len());
      for e in file.entries {
        entries.push(decode_cache_entry(e, &cache_path)?);
      }
      inner.install_cache(entries);
    }

    let schedule_path = root.join("schedule.json");
    if schedule_path.exists() {
      let file: ScheduleFile = read_json(&schedule_path)?;
      inner.install_schedule(ScheduleState {
        last_update_unix: file.last_update_unix,
        next_update_unix: file.next_update_unix,
        consecutive_errors: file.consecutive_errors,
      });
    }

    Ok(Self { root, inner })
  }

  fn list_path(&self, list: &ThreatList) -> PathBuf {
    self.root.join("lists").join(format!(
      "{}_{}_{}.json",
      list.threat_type, list.platform_type, list.threat_entry_type
    ))
  }

  fn persist_list(&self, list: &ThreatList) -> Result<(), Error> {
    let Some((state, prefixes)) = self.inner.table_snapshot(list) else {
      return Ok(());
    };
    let file = ListFile {
      threat_type: list.threat_type.clone(),
      platform_type: list.platform_type.clone(),
      threat_entry_type: list.threat_entry_type.clone(),
      state,
      prefixes: prefixes.iter().map(|p| STANDARD.encode(p.as_bytes())).collect(),
    };
    write_json_atomic(&self.list_path(list), &file)
  }

  fn persist_cache(&self) -> Result<(), Error> {
    let entries = self
      .inner
      .cache_snapshot()
      .into_iter()
      .map(|e| CacheEntryFile {
        hash: STANDARD.encode(e.hash.as_bytes()),
        threat_type: e.list.threat_type,
        platform_type: e.list.platform_type,
        threat_entry_type: e.list.threat_entry_type,
        metadata: e
          .metadata
          .into_iter()
          .map(|(k, v)| MetadataPair {
            key: STANDARD.encode(k),
            value: STANDARD.encode(v),
          })
          .collect(),
        expires_at_unix: e.expires_at_unix,
      })
      .collect();
    write_json_atomic(&self.root.join("cache.json"), &CacheFile { entries })
  }

  fn persist_schedule(&self) -> Result<(), Error> {
    let s = self.inner.schedule()?;
    write_json_atomic(
      &self.root.join("schedule.json"),
      &ScheduleFile {
        last_update_unix: s.last_update_unix,
        next_update_unix: s.next_update_unix,
        consecutive_errors: s.consecutive_errors,
      },
    )
  }
}

impl Storage for FileStore {
  fn save(
    &mut self,
    list: &ThreatList,
    state: &str,
    additions: Vec<HashPrefix>,
    removals: &[usize],
    replace: bool,
  ) -> Result<Vec<HashPrefix>, Error> {
    let stored = self.inner.save(list, state, additions, removals, replace)?;
    self.persist_list(list)?;
    Ok(stored)
  }

  fn reset(&mut self, list: &ThreatList) -> Result<(), Error> {
    self.inner.reset(list)?;
    let path = self.list_path(list);
    if path.exists() {
      fs::remove_file(&path).map_err(|e| Error::storage(format!("remove {}: {e}", path.display())))?;
    }
    Ok(())
  }

  fn state(&self, list: &ThreatList) -> Result<String, Error> {
    self.inner.state(list)
  }

  fn prefix_matches(
    &self,
    hashes: &[FullHash],
    lists: &[ThreatList],
  ) -> Result<Vec<PrefixMatch>, Error> {
    self.inner.prefix_matches(hashes, lists)
  }

  fn add_full_hashes(&mut self, entries: &[UrlMatch], now_unix: u64) -> Result<(), Error> {
    self.inner.add_full_hashes(entries, now_unix)?;
    self.persist_cache()
  }

  fn full_hashes(
    &self,
    hash: &FullHash,
    lists: &[ThreatList],
    now_unix: u64,
  ) -> Result<Vec<FullHashEntry>, Error> {
    self.inner.full_hashes(hash, lists, now_unix)
  }

  fn next_update(&self) -> Result<u64, Error> {
    self.inner.next_update()
  }

  fn record_update(&mut self, time_unix: u64, next_unix: u64) -> Result<(), Error> {
    self.inner.record_update(time_unix, next_unix)?;
    self.persist_schedule()
  }

  fn record_error(&mut self, time_unix: u64, wait_secs: u64, errors: u32) -> Result<(), Error> {
    self.inner.record_error(time_unix, wait_secs, errors)?;
    self.persist_schedule()
  }

  fn schedule(&self) -> Result<ScheduleState, Error> {
    self.inner.schedule()
  }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
  let raw = fs::read(path).map_err(|e| Error::storage(format!("read {}: {e}", path.display())))?;
  serde_json::from_slice(&raw).map_err(|e| Error::storage(format!("parse {}: {e}", path.display())))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
  let parent = path
    .parent()
    .ok_or_else(|| Error::storage(format!("file path has no parent: {}", path.display())))?;
  fs::create_dir_all(parent)
    .map_err(|e| Error::storage(format!("create {}: {e}", parent.display())))?;

  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));
  let raw = serde_json::to_vec_pretty(value)
    .map_err(|e| Error::storage(format!("encode {}: {e}", path.display())))?;
  fs::write(&tmp, raw).map_err(|e| Error::storage(format!("write {}: {e}", tmp.display())))?;
  fs::rename(&tmp, path)
    .map_err(|e| Error::storage(format!("replace {}: {e}", path.display())))
}

fn decode_prefix(raw: &str, path: &Path) -> Result<HashPrefix, Error> {
  let bytes = STANDARD
    .decode(raw)
    .map_err(|e| Error::storage(format!("bad prefix base64 in {}: {e}", path.display())))?;
  HashPrefix::new(bytes).map_err(|e| Error::storage(format!("bad prefix in {}: {e}", path.display())))
}

fn decode_cache_entry(entry: CacheEntryFile, path: &Path) -> Result<FullHashEntry, Error> {
  let hash_bytes = STANDARD
    .decode(&entry.hash)
    .map_err(|e| Error::storage(format!("bad hash base64 in {}: {e}", path.display())))?;
  let hash = FullHash::from_bytes(&hash_bytes)
    .map_err(|e| Error::storage(format!("bad hash in {}: {e}", path.display())))?;

  let mut metadata = BTreeMap::new();
  for pair in entry.metadata {
    let key = STANDARD
      .decode(&pair.key)
      .map_err(|e| Error::storage(format!("bad metadata base64 in {}: {e}", path.display())))?;
    let value = STANDARD
      .decode(&pair.value)
      .map_err(|e| Error::storage(format!("bad metadata base64 in {}: {e}", path.display())))?;
    metadata.insert(key, value);
  }

  Ok(FullHashEntry {
    hash,
    list: ThreatList::new(entry.threat_type, entry.platform_type, entry.threat_entry_type),
    metadata,
    expires_at_unix: entry.expires_at_unix,
  })
}
