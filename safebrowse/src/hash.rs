use crate::error::Error;
use sha2::{Digest, Sha256};
use std::fmt;

pub const FULL_HASH_LEN: usize = 32;
pub const MIN_PREFIX_LEN: usize = 4;
pub const MAX_PREFIX_LEN: usize = 32;

/// Complete SHA-256 digest of a lookup expression. A match at this level is
/// the authoritative verdict.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullHash([u8; FULL_HASH_LEN]);

impl FullHash {
  pub fn of_expression(expression: &str) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(expression.as_bytes());
    Self(hasher.finalize().into())
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
    let arr: [u8; FULL_HASH_LEN] = bytes
      .try_into()
      .map_err(|_| Error::protocol(format!("full hash must be {FULL_HASH_LEN} bytes, got {}", bytes.len())))?;
    Ok(Self(arr))
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// Leading-bytes view of this hash. `len` must be within 4..=32.
  pub fn prefix(&self, len: usize) -> HashPrefix {
    debug_assert!((MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&len));
    HashPrefix(self.0[..len].to_vec())
  }

  pub fn has_prefix(&self, prefix: &HashPrefix) -> bool {
    self.0.starts_with(prefix.as_bytes())
  }
}

impl fmt::Debug for FullHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in &self.0 {
      write!(f, "{b:02x}")?;
    }
    Ok(())
  }
}

/// A 4..=32 byte leading view of a full hash, the unit the local database
/// stores. Ordering is lexicographic byte order, which is also the order the
/// server's checksum is computed over.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashPrefix(Vec<u8>);

impl HashPrefix {
  pub fn new(bytes: Vec<u8>) -> Result<Self, Error> {
    if !(MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&bytes.len()) {
      return Err(Error::protocol(format!(
        "hash prefix must be {MIN_PREFIX_LEN}..={MAX_PREFIX_LEN} bytes, got {}",
        bytes.len()
      )));
    }
    Ok(Self(bytes))
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Debug for HashPrefix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in &self.0 {
      write!(f, "{b:02x}")?;
    }
    Ok(())
  }
}
