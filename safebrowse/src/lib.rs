//! Client library for the Google Safe Browsing v4 Update API.
//!
//! The client keeps a local database of hash prefixes per threat list,
//! synchronized against the service with incremental updates, and answers
//! URL lookups by combining local prefix matches with on-demand full-hash
//! confirmation:
//!
//! ```no_run
//! use safebrowse::{Config, LookupOptions, SafeBrowser, UpdateOptions};
//! use safebrowse::storage::memory::MemoryStore;
//!
//! # fn main() -> Result<(), safebrowse::Error> {
//! let mut sb = SafeBrowser::new(Config::new("API_KEY"), MemoryStore::new())?;
//! sb.update(&UpdateOptions::default())?;
//! let matches = sb.lookup("http://example.com/", &LookupOptions::default())?;
//! # let _ = matches;
//! # Ok(())
//! # }
//! ```
//!
//! Storage is pluggable through the [`storage::Storage`] trait;
//! `safebrowse-filestore` provides a file-backed implementation.

pub mod api;
pub mod canon;
pub mod client;
pub mod config;
pub mod error;
pub mod expression;
pub mod hash;
pub mod list;
pub mod lookup;
pub mod storage;
pub mod types;
pub mod update;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::SafeBrowser;
pub use config::Config;
pub use error::Error;
pub use list::ThreatList;
pub use lookup::LookupOptions;
pub use types::{UpdateStatus, UrlMatch};
pub use update::UpdateOptions;
