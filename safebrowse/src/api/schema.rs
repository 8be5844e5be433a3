use crate::list::ThreatList;
use serde::{Deserialize, Serialize};

// JSON bodies for the three /v4 endpoints. Response structs default every
// field so a sparse server answer deserializes instead of failing; whether
// the content is usable is the engines' call.

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
  pub client_id: String,
  pub client_version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
  pub supported_compressions: Vec<String>,
}

impl Constraints {
  pub fn raw_only() -> Self {
    Self {
      supported_compressions: vec!["RAW".to_string()],
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUpdateRequest {
  #[serde(flatten)]
  pub list: ThreatList,
  pub state: String,
  pub constraints: Constraints,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
  pub client: ClientInfo,
  pub list_update_requests: Vec<ListUpdateRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
  #[serde(default)]
  pub list_update_responses: Vec<ListUpdateResponse>,

  #[serde(default)]
  pub minimum_wait_duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUpdateResponse {
  #[serde(flatten)]
  pub list: ThreatList,

  #[serde(default)]
  pub response_type: String,

  #[serde(default)]
  pub additions: Vec<ThreatEntrySet>,

  #[serde(default)]
  pub removals: Vec<ThreatEntrySet>,

  #[serde(default)]
  pub new_client_state: String,

  #[serde(default)]
  pub checksum: Option<Checksum>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatEntrySet {
  #[serde(default)]
  pub compression_type: Option<String>,

  #[serde(default)]
  pub raw_hashes: Option<RawHashes>,

  #[serde(default)]
  pub raw_indices: Option<RawIndices>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHashes {
  #[serde(default)]
  pub prefix_size: usize,

  // base64 of the concatenated fixed-width prefixes
  #[serde(default)]
  pub raw_hashes: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIndices {
  #[serde(default)]
  pub indices: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checksum {
  #[serde(default)]
  pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRequest {
  pub client: ClientInfo,
  pub client_states: Vec<String>,
  pub threat_info: ThreatInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatInfo {
  pub threat_types: Vec<String>,
  pub platform_types: Vec<String>,
  pub threat_entry_types: Vec<String>,
  pub threat_entries: Vec<ThreatEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatEntry {
  #[serde(default)]
  pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindResponse {
  #[serde(default)]
  pub matches: Vec<ThreatMatch>,

  #[serde(default)]
  pub minimum_wait_duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatMatch {
  #[serde(flatten)]
  pub list: ThreatList,

  #[serde(default)]
  pub threat: Option<ThreatEntry>,

  #[serde(default)]
  pub threat_entry_metadata: Option<ThreatEntryMetadata>,

  #[serde(default)]
  pub cache_duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatEntryMetadata {
  #[serde(default)]
  pub entries: Vec<MetadataEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
  #[serde(default)]
  pub key: String,

  #[serde(default)]
  pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatListsResponse {
  #[serde(default)]
  pub threat_lists: Vec<ThreatList>,
}
