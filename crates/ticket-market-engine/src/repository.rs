//! Implementation of the store for saved configurations

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use ticket_market_core::Config;
use tracing::debug;

use crate::error::RepositoryError;

/// A configuration saved by an operator
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRecord {
    pub id: u64,
    #[serde(flatten)]
    pub config: Config,
}

/// Store of saved configurations
///
/// Records are independent of the running market: saving one does not apply
/// it. With a backing file, every save rewrites the file.
#[derive(Clone, Debug)]
pub struct ConfigurationRepository {
    /// Saved records, oldest first
    records: Vec<ConfigurationRecord>,
    next_id: u64,
    path: Option<PathBuf>,
}

impl Default for ConfigurationRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationRepository {
    /// Create a new, in-memory [`ConfigurationRepository`].
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            path: None,
        }
    }

    /// Open a repository backed by the JSON file at `path`.
    ///
    /// A missing file yields an empty repository; the file is created on the
    /// first save.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<ConfigurationRecord> = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), records = records.len(), "opened configuration store");

        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Ok(Self {
            records,
            next_id,
            path: Some(path),
        })
    }

    /// Store `config` as a new record and return it.
    pub fn save(&mut self, config: Config) -> Result<ConfigurationRecord, RepositoryError> {
        let record = ConfigurationRecord {
            id: self.next_id,
            config,
        };
        self.records.push(record);
        if let Err(e) = self.flush() {
            self.records.pop();
            return Err(e);
        }
        self.next_id += 1;
        Ok(record)
    }

    /// The most recently saved record
    pub fn latest(&self) -> Option<&ConfigurationRecord> {
        self.records.last()
    }

    pub fn find(&self, id: u64) -> Option<&ConfigurationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn all(&self) -> &[ConfigurationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn flush(&self) -> Result<(), RepositoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.records)?;
        fs::write(path, json)?;
        Ok(())
    }
}
