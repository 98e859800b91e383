use std::{
    fmt::{Display, Formatter},
    fs, io,
    path::{Path, PathBuf},
};

use ulid::Ulid;

pub(crate) type FileId = Ulid;

pub(crate) enum FileType {
    SpillData,
    SpillDb,
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::SpillData => write!(f, "spill"),
            FileType::SpillDb => write!(f, "redb"),
        }
    }
}

/// Uniquely named scratch subdirectory owned by one spill store.
///
/// `close` removes the directory tree; `Drop` is the abnormal-termination
/// fallback so an aborted read never leaks spill files. Both are idempotent.
#[derive(Debug)]
pub(crate) struct ScratchDir {
    path: Option<PathBuf>,
}

impl ScratchDir {
    pub(crate) fn create(root: &Path) -> io::Result<Self> {
        let path = root.join(format!("fg-spill-{}", FileId::new()));
        fs::create_dir_all(&path)?;

        Ok(Self { path: Some(path) })
    }

    pub(crate) fn file_path(&self, id: FileId, file_type: FileType) -> PathBuf {
        // Only valid while the directory is live; callers never hold paths
        // past close().
        self.path
            .as_ref()
            .expect("scratch dir already released")
            .join(format!("{}.{}", id, file_type))
    }

    pub(crate) fn close(&mut self) -> io::Result<()> {
        if let Some(path) = self.path.take() {
            fs::remove_dir_all(&path)?;
        }
        Ok(())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = fs::remove_dir_all(&path) {
                tracing::warn!(path = %path.display(), "failed to remove scratch dir: {err}");
            }
        }
    }
}
