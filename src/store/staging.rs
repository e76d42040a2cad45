// Two-phase file writes: stage every file as a `.tmp` sibling, then rename
// them into place once all of them are on disk.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::Result;

/// A fully written temporary file waiting to replace `target`.
///
/// Dropping it without calling [`commit`](Self::commit) removes the
/// temporary file and leaves `target` untouched.
#[derive(Debug)]
pub(crate) struct StagedFile {
    tmp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub(crate) fn write(target: &Path, bytes: &[u8]) -> Result<Self> {
        let tmp_path = target.with_extension("tmp");

        let file = File::create(&tmp_path)?;
        let staged = Self {
            tmp_path,
            target: target.to_path_buf(),
            committed: false,
        };

        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        debug!(
            "Staged {} bytes for {}",
            bytes.len(),
            staged.target.display()
        );
        Ok(staged)
    }

    pub(crate) fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                warn!(
                    "Could not remove staged file {}: {}",
                    self.tmp_path.display(),
                    e
                );
            }
        }
    }
}
