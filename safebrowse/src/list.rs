use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identity of a threat list: the (threatType, platformType, threatEntryType)
/// triple. Two lists are the same channel iff all three tokens match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatList {
  pub threat_type: String,
  pub platform_type: String,
  pub threat_entry_type: String,
}

impl ThreatList {
  pub fn new(
    threat_type: impl Into<String>,
    platform_type: impl Into<String>,
    threat_entry_type: impl Into<String>,
  ) -> Self {
    Self {
      threat_type: threat_type.into(),
      platform_type: platform_type.into(),
      threat_entry_type: threat_entry_type.into(),
    }
  }
}

impl fmt::Display for ThreatList {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}/{}/{}",
      self.threat_type, self.platform_type, self.threat_entry_type
    )
  }
}

/// A list selector string such as `MALWARE/WINDOWS/URL` or `*/WINDOWS/*`.
/// Wildcard fields expand against the known-list catalog; a selector with no
/// wildcards names a list directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSelector {
  threat_type: Option<String>,
  platform_type: Option<String>,
  threat_entry_type: Option<String>,
}

impl ListSelector {
  pub fn parse(raw: &str) -> Result<Self, Error> {
    let fields: Vec<&str> = raw.split('/').collect();
    if fields.len() != 3 || fields.iter().any(|f| f.trim().is_empty()) {
      return Err(Error::protocol(format!(
        "invalid threat list selector `{raw}`: expected THREAT/PLATFORM/ENTRY"
      )));
    }

    let field = |s: &str| -> Option<String> {
      let s = s.trim();
      if s == "*" {
        None
      } else {
        Some(s.to_ascii_uppercase())
      }
    };

    Ok(Self {
      threat_type: field(fields[0]),
      platform_type: field(fields[1]),
      threat_entry_type: field(fields[2]),
    })
  }

  pub fn parse_all(raw: &[String]) -> Result<Vec<Self>, Error> {
    raw.iter().map(|s| Self::parse(s)).collect()
  }

  pub fn is_concrete(&self) -> bool {
    self.threat_type.is_some() && self.platform_type.is_some() && self.threat_entry_type.is_some()
  }

  pub fn matches(&self, list: &ThreatList) -> bool {
    fn field_matches(sel: &Option<String>, value: &str) -> bool {
      match sel {
        Some(token) => token == value,
        None => true,
      }
    }

    field_matches(&self.threat_type, &list.threat_type)
      && field_matches(&self.platform_type, &list.platform_type)
      && field_matches(&self.threat_entry_type, &list.threat_entry_type)
  }
}

/// True when expanding `selectors` requires the known-list catalog: an empty
/// selector set means "every known list", and wildcards filter the catalog.
pub fn needs_catalog(selectors: &[ListSelector]) -> bool {
  selectors.is_empty() || selectors.iter().any(|s| !s.is_concrete())
}

/// Expand selectors against the catalog into a sorted, duplicate-free set of
/// lists. Concrete selectors are taken at face value even when the catalog is
/// absent from `catalog` (the server is authoritative for what exists).
pub fn expand(selectors: &[ListSelector], catalog: &[ThreatList]) -> Vec<ThreatList> {
  let mut out = BTreeSet::new();

  if selectors.is_empty() {
    out.extend(catalog.iter().cloned());
    return out.into_iter().collect();
  }

  for sel in selectors {
    if sel.is_concrete() {
      out.insert(ThreatList::new(
        sel.threat_type.clone().unwrap_or_default(),
        sel.platform_type.clone().unwrap_or_default(),
        sel.threat_entry_type.clone().unwrap_or_default(),
      ));
      continue;
    }
    out.extend(catalog.iter().filter(|l| sel.matches(l)).cloned());
  }

  out.into_iter().collect()
}
