use crate::hash::{FullHash, HashPrefix};
use crate::list::ThreatList;
use std::collections::BTreeMap;

/// Outcome of one `update()` call. The discriminants are the wire-stable
/// status codes exposed through `UpdateStatus::code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum UpdateStatus {
  DatabaseReset = -6,
  InternalError = -3,
  ServerError = -2,
  NoUpdate = -1,
  NoData = 0,
  Successful = 1,
}

impl UpdateStatus {
  pub fn code(self) -> i8 {
    self as i8
  }
}

/// A locally stored prefix that matched some computed full hash, together
/// with the list it came from. This is what drives the full-hash request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrefixMatch {
  pub prefix: HashPrefix,
  pub list: ThreatList,
}

/// A confirmed full-hash entry in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullHashEntry {
  pub hash: FullHash,
  pub list: ThreatList,
  pub metadata: BTreeMap<Vec<u8>, Vec<u8>>,
  pub expires_at_unix: u64,
}

impl FullHashEntry {
  pub fn is_expired(&self, now_unix: u64) -> bool {
    self.expires_at_unix <= now_unix
  }
}

/// A positive lookup verdict for a URL. `cache_duration_secs` is how long the
/// verdict may be reused without asking the service again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
  pub hash: FullHash,
  pub list: ThreatList,
  pub metadata: BTreeMap<Vec<u8>, Vec<u8>>,
  pub cache_duration_secs: u64,
}

/// Process-wide update schedule; one schedule governs all lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleState {
  pub last_update_unix: u64,
  pub next_update_unix: u64,
  pub consecutive_errors: u32,
}

pub fn now_unix_secs() -> u64 {
  use std::time::{SystemTime, UNIX_EPOCH};
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}
