
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::index::snapshot::LedgerDigest;
use crate::preprocess::Category;
use crate::store::staging::StagedFile;
use crate::{MemoryError, Result};

const CATEGORY_MARKER: &str = " (Category:";

/// Identifies the source file behind one indexed vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    pub path: PathBuf,
    pub category: Option<Category>,
}

impl SourceReference {
    #[inline]
    pub fn new(path: impl Into<PathBuf>, category: Option<Category>) -> Self {
        Self {
            path: path.into(),
            category,
        }
    }

    /// Strip a trailing `" (Category: ...)"` annotation from a stored reference
    #[inline]
    pub fn path_of(reference: &str) -> &str {
        reference
            .split_once(CATEGORY_MARKER)
            .map_or(reference, |(path, _)| path)
    }
}

impl fmt::Display for SourceReference {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Some(category) => write!(
                f,
                "{}{} {})",
                self.path.display(),
                CATEGORY_MARKER,
                category
            ),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Ordered list of source references, position-aligned with a vector index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilenameLedger {
    references: Vec<String>,
}

impl FilenameLedger {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn append(&mut self, reference: impl Into<String>) {
        self.references.push(reference.into());
    }

    #[inline]
    pub fn resolve(&self, position: usize) -> Result<&str> {
        self.references
            .get(position)
            .map(String::as_str)
            .ok_or(MemoryError::OutOfRange {
                position,
                len: self.references.len(),
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(String::as_str)
    }

    /// SHA-256 over the length-prefixed references, in order
    #[inline]
    pub fn digest(&self) -> LedgerDigest {
        let mut hasher = Sha256::new();
        for reference in &self.references {
            hasher.update((reference.len() as u64).to_le_bytes());
            hasher.update(reference.as_bytes());
        }
        hasher.finalize().into()
    }

    pub(crate) fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Persist as a JSON array of strings
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        StagedFile::write(path, &self.to_json()?)?.commit()?;

        info!(
            "Saved {} references to {}",
            self.references.len(),
            path.display()
        );
        Ok(())
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MemoryError::IndexNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let ledger: Self = serde_json::from_str(&content)?;

        debug!(
            "Loaded {} references from {}",
            ledger.references.len(),
            path.display()
        );
        Ok(ledger)
    }
}
