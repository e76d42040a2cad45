// Knowledge base module
// Pairs every indexed vector with its source reference

pub(crate) mod staging;


use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::index::snapshot;
use crate::index::{SearchHit, VectorIndex};
use crate::ledger::FilenameLedger;
use staging::StagedFile;
use crate::{MemoryError, Result};

pub const INDEX_FILE_NAME: &str = "game_memory.index";
pub const LEDGER_FILE_NAME: &str = "game_filenames.json";

/// One embedded source file
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    pub vector: Vec<f32>,
    pub reference: String,
}

/// Borrowed view of a stored entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryRef<'a> {
    pub position: usize,
    pub vector: &'a [f32],
    pub reference: &'a str,
}

/// A search hit resolved to its source reference
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredReference {
    pub position: usize,
    pub distance: f32,
    pub reference: String,
}

/// Ordered collection of `{vector, reference}` records.
///
/// Vectors and references live in a [`VectorIndex`] and a [`FilenameLedger`]
/// so each can be persisted in its own format, but the only way to add data
/// is one whole record at a time, which keeps both the same length and order.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    index: VectorIndex,
    ledger: FilenameLedger,
}

impl KnowledgeBase {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        Ok(Self {
            index: VectorIndex::build(dimension)?,
            ledger: FilenameLedger::new(),
        })
    }

    /// Reassemble from separately persisted parts
    #[inline]
    pub fn from_parts(index: VectorIndex, ledger: FilenameLedger) -> Result<Self> {
        if index.len() != ledger.len() {
            return Err(MemoryError::Misaligned {
                vectors: index.len(),
                references: ledger.len(),
            });
        }
        Ok(Self { index, ledger })
    }

    #[inline]
    pub fn push(&mut self, entry: IndexedEntry) -> Result<()> {
        self.index.insert(&entry.vector)?;
        self.ledger.append(entry.reference);
        Ok(())
    }

    /// Append a batch of records. Nothing is added unless every vector has
    /// the index dimension.
    #[inline]
    pub fn extend(&mut self, entries: Vec<IndexedEntry>) -> Result<()> {
        let (vectors, references): (Vec<Vec<f32>>, Vec<String>) = entries
            .into_iter()
            .map(|entry| (entry.vector, entry.reference))
            .unzip();

        self.index.insert_all(&vectors)?;
        for reference in references {
            self.ledger.append(reference);
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn ledger(&self) -> &FilenameLedger {
        &self.ledger
    }

    #[inline]
    pub fn vector(&self, position: usize) -> Result<&[f32]> {
        self.index.reconstruct(position)
    }

    #[inline]
    pub fn reference(&self, position: usize) -> Result<&str> {
        self.ledger.resolve(position)
    }

    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = EntryRef<'_>> {
        self.index
            .iter()
            .zip(self.ledger.iter())
            .enumerate()
            .map(|(position, (vector, reference))| EntryRef {
                position,
                vector,
                reference,
            })
    }

    /// Nearest references to `query`, skipping any position the ledger cannot
    /// resolve.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredReference>> {
        let hits = self.index.search(query, k)?;
        Ok(self.resolve_hits(&hits))
    }

    fn resolve_hits(&self, hits: &[SearchHit]) -> Vec<ScoredReference> {
        hits.iter()
            .filter_map(|hit| match self.ledger.resolve(hit.position) {
                Ok(reference) => Some(ScoredReference {
                    position: hit.position,
                    distance: hit.distance,
                    reference: reference.to_string(),
                }),
                Err(e) => {
                    warn!("Skipping unresolvable search hit: {}", e);
                    None
                }
            })
            .collect()
    }

    #[inline]
    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE_NAME)
    }

    #[inline]
    pub fn ledger_path(dir: &Path) -> PathBuf {
        dir.join(LEDGER_FILE_NAME)
    }

    #[inline]
    pub fn exists(dir: &Path) -> bool {
        Self::index_path(dir).exists() && Self::ledger_path(dir).exists()
    }

    /// Write the index snapshot and ledger into `dir`.
    ///
    /// Both files are staged before either replaces its predecessor, and the
    /// snapshot records a digest of the ledger it was saved with. A failed
    /// save leaves the previous pair in place.
    #[inline]
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let index_bytes = snapshot::encode(&self.index, &self.ledger.digest())?;
        let ledger_bytes = self.ledger.to_json()?;

        let index_file = StagedFile::write(&Self::index_path(dir), &index_bytes)?;
        let ledger_file = StagedFile::write(&Self::ledger_path(dir), &ledger_bytes)?;
        ledger_file.commit()?;
        index_file.commit()?;

        info!("Stored {} entries in {}", self.len(), dir.display());
        Ok(())
    }

    /// Load a pair written by [`save`](Self::save). Fails with `Misaligned`
    /// when the lengths differ and `LedgerMismatch` when the ledger is not the
    /// one the snapshot was saved with.
    #[inline]
    pub fn load(dir: &Path) -> Result<Self> {
        let snapshot = snapshot::read_snapshot(&Self::index_path(dir))?;
        let ledger = FilenameLedger::load(&Self::ledger_path(dir))?;
        debug!(
            "Loaded knowledge base: {} vectors, {} references",
            snapshot.index.len(),
            ledger.len()
        );

        let base = Self::from_parts(snapshot.index, ledger)?;
        if base.ledger.digest() != snapshot.ledger_digest {
            return Err(MemoryError::LedgerMismatch);
        }
        Ok(base)
    }
}
