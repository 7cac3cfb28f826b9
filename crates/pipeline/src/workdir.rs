//! Per-watershed scratch directory

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vbet_core::{Error, Result};

/// Scratch directory owned by one run.
///
/// With `cleanup` set the directory is removed when the guard drops, which
/// covers success, error returns and panic unwinding alike.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    cleanup: bool,
}

impl WorkDir {
    /// `temp_folder/<huc>` when a temp folder is given, else `<output>/scratch`
    pub fn create(temp_folder: Option<&Path>, output_dir: &Path, huc: &str, cleanup: bool) -> Result<Self> {
        let path = match temp_folder {
            Some(t) => t.join(huc),
            None => output_dir.join("scratch"),
        };
        std::fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), cleanup, "working directory ready");
        Ok(Self { path, cleanup })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.cleanup {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "could not remove working directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let wd = WorkDir::create(Some(root.path()), root.path(), "17010203", true).unwrap();
            std::fs::write(wd.path().join("x"), b"1").unwrap();
            wd.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_kept_without_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let wd = WorkDir::create(None, root.path(), "17010203", false).unwrap();
            wd.path().to_path_buf()
        };
        assert!(path.exists());
        assert!(path.ends_with("scratch"));
    }

    #[test]
    fn test_cleanup_during_panic() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("h");
        let base = root.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let _wd = WorkDir::create(Some(&base), &base, "h", true).unwrap();
            panic!("stage blew up");
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
