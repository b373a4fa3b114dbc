//! Local temporary payload file lifecycle
//!
//! The payload is transfer fodder: pseudo-random bytes of an exact size,
//! living in a per-run temporary directory that is removed when the run
//! ends, on success, failure or panic.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::RngCore;
use tempfile::TempDir;
use tracing::debug;

use crate::error::Result;

/// A local payload file inside a per-run temporary directory.
///
/// Dropping the value removes the directory and anything in it, which is
/// the guaranteed local-side cleanup path.
pub struct LocalPayload {
    _dir: TempDir,
    path: PathBuf,
}

impl LocalPayload {
    /// Create the temporary directory that will hold the payload
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("speedtest-ssh.").tempdir()?;
        let path = dir.path().join("payload.tmp");
        debug!(path = %path.display(), "local payload location");
        Ok(Self { _dir: dir, path })
    }

    /// Path of the payload file. The file may not exist yet.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Grow or shrink the payload file to exactly `size` bytes.
    ///
    /// Content already present is kept and extended with pseudo-random
    /// blocks, so growing an existing payload does not rewrite it from
    /// scratch. Runs before the transfer timer starts.
    pub fn ensure_size(&self, size: u64) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut written = file.metadata()?.len();

        let mut rng = rand::thread_rng();
        let mut block = vec![0u8; crate::defaults::COPY_BLOCK_SIZE];
        while written < size {
            rng.fill_bytes(&mut block);
            file.write_all(&block)?;
            written += block.len() as u64;
        }
        file.set_len(size)?;
        file.sync_all()?;
        Ok(())
    }

    /// Remove the payload file; a missing file is fine
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
