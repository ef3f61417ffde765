use log::debug;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory for one handler invocation.
///
/// Everything staged here is removed when the value is dropped, whether the
/// handler returned normally, failed, or its task was cancelled.
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    pub fn new(parent: &Path) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("media-relay-")
            .tempdir_in(parent)?;
        debug!("Staging directory created: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file inside the staging directory. Only the final path
    /// component of `name` is used.
    pub fn file(&self, name: &str) -> PathBuf {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "asset".into());
        self.dir.path().join(file_name)
    }
}
