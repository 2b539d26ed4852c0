//! Post-write compression: shell out to an external gzip-compatible binary
//! and replace the closed file with its `.gz` result.
//!
//! Grounded on `examples/original_source/FileCompressor.cpp`/`.hpp`, which
//! invokes an external `pigz` process rather than linking a compression
//! library, so that compression work never blocks the ingest thread.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

/// Invokes an external gzip-compatible compressor on closed product and
/// raw-capture files.
pub struct Compressor {
    /// Name or path of the external binary, e.g. `"pigz"` or `"gzip"`.
    binary: String,
}

impl Compressor {
    /// Create a compressor that shells out to `binary`.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Compress `path` in place, leaving `path.gz` and removing the
    /// original on success. Failure is logged and non-fatal: the
    /// uncompressed file is left behind.
    pub fn compress(&self, path: &Path) -> PathBuf {
        debug!("compressing {}", path.display());
        let status = Command::new(&self.binary).arg(path).status();
        match status {
            Ok(s) if s.success() => {
                let mut gz = path.as_os_str().to_os_string();
                gz.push(".gz");
                PathBuf::from(gz)
            }
            Ok(s) => {
                warn!("{} exited with {s} for {}", self.binary, path.display());
                path.to_path_buf()
            }
            Err(e) => {
                warn!("failed to launch {}: {e}", self.binary);
                path.to_path_buf()
            }
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new("gzip")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_leaves_file_untouched() {
        let tmpd = tempfile::tempdir().unwrap();
        let path = tmpd.path().join("x.fit");
        std::fs::write(&path, b"data").unwrap();

        let compressor = Compressor::new("definitely-not-a-real-binary-xyz");
        let out = compressor.compress(&path);
        assert_eq!(out, path);
        assert!(path.exists());
    }
}
