//! Persistent cache of categorization results.
//!
//! One pretty-printed JSON document per corpus identity:
//! `<cache_dir>/<identity>_categories.json`. Records never expire; callers
//! that want a fresh result skip [`ResultCache::get`] and overwrite.
//!
//! The cache is advisory. A corrupt record is a miss, and a failed write is
//! reported to the caller without invalidating the in-memory result.

use std::path::{Path, PathBuf};

use crate::structure::CategoricalStructure;

const RECORD_SUFFIX: &str = "_categories.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to write cache record {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode cache record for `{identity}`: {source}")]
    Encode {
        identity: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, identity: &str) -> PathBuf {
        let key: String = identity
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{key}{RECORD_SUFFIX}"))
    }

    pub fn get(&self, identity: &str) -> Option<CategoricalStructure> {
        let path = self.record_path(identity);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(identity, path = %path.display(), "cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(identity, path = %path.display(), error = %e, "could not read cache record; treating as miss");
                return None;
            }
        };
        match serde_json::from_str::<CategoricalStructure>(&text) {
            Ok(structure) => {
                tracing::debug!(identity, fields = structure.len(), "cache hit");
                Some(structure)
            }
            Err(e) => {
                tracing::warn!(identity, path = %path.display(), error = %e, "corrupt cache record; treating as miss");
                None
            }
        }
    }

    /// Overwrites the record for `identity`, returning where it was written.
    pub fn put(
        &self,
        identity: &str,
        structure: &CategoricalStructure,
    ) -> Result<PathBuf, CacheError> {
        let path = self.record_path(identity);
        let json = serde_json::to_string_pretty(structure).map_err(|source| CacheError::Encode {
            identity: identity.to_string(),
            source,
        })?;
        std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
