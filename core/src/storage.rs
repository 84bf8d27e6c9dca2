// printflow/src/storage.rs

//! The storage root every stored artifact lives under, and the guard that
//! keeps file names from escaping it.

use crate::error::FlowError;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct StorageRoot {
  root: PathBuf,
}

impl StorageRoot {
  /// Creates the directory if needed and pins its canonical path.
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, FlowError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let root = dir.canonicalize()?;
    Ok(Self { root })
  }

  pub fn path(&self) -> &Path {
    &self.root
  }

  /// Rejects anything but a bare file name.
  pub fn check_name(name: &str) -> Result<(), FlowError> {
    if name.trim().is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') || name.contains('\0')
    {
      return Err(FlowError::PathTraversal(name.to_string()));
    }
    Ok(())
  }

  /// Joins `name` onto the root and checks the normalized result is still inside it.
  pub fn resolve(&self, name: &str) -> Result<PathBuf, FlowError> {
    Self::check_name(name)?;
    let candidate = normalize(&self.root.join(name));
    if !candidate.starts_with(&self.root) || candidate == self.root {
      return Err(FlowError::PathTraversal(name.to_string()));
    }
    Ok(candidate)
  }

  pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, FlowError> {
    let path = self.resolve(name)?;
    tokio::fs::write(&path, bytes).await?;
    debug!(file = %name, bytes = bytes.len(), "Stored file.");
    Ok(path)
  }

  pub async fn read(&self, name: &str) -> Result<Vec<u8>, FlowError> {
    let path = self.resolve(name)?;
    Ok(tokio::fs::read(&path).await?)
  }

  /// Removes a stored file.
  ///
  /// The name is checked before touching the filesystem, and the resolved
  /// path is canonicalized and checked again before removal, so a symlink
  /// inside the root cannot redirect the delete elsewhere.
  pub async fn delete_file(&self, name: &str) -> Result<(), FlowError> {
    let candidate = self.resolve(name)?;
    let resolved = tokio::fs::canonicalize(&candidate).await?;
    if !resolved.starts_with(&self.root) {
      warn!(file = %name, resolved = %resolved.display(), "Refusing to delete outside the storage root.");
      return Err(FlowError::PathTraversal(name.to_string()));
    }
    tokio::fs::remove_file(&resolved).await?;
    debug!(file = %name, "Deleted stored file.");
    Ok(())
  }
}

fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::ParentDir => {
        out.pop();
      }
      Component::CurDir => {}
      other => out.push(other.as_os_str()),
    }
  }
  out
}
