use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::session::state::SessionError;

/// Exclusive directory holding every artifact of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create `<output_dir>/<session_id>`. Fails if the directory already
    /// exists, so two sessions can never share a workspace.
    pub fn create(output_dir: &Path, session_id: &Uuid) -> io::Result<Self> {
        fs::create_dir_all(output_dir)?;

        let root = output_dir.join(session_id.to_string());
        fs::create_dir(&root)?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path, refusing anything that would land
    /// outside the workspace
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, SessionError> {
        let relative = relative.as_ref();

        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if escapes || relative.as_os_str().is_empty() {
            return Err(SessionError::PathEscapesWorkspace(relative.to_path_buf()));
        }

        Ok(self.root.join(relative))
    }

    /// Path of `path` relative to the workspace root
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }

    /// Write an artifact and return its workspace-relative path
    pub fn write_artifact(&self, relative: impl AsRef<Path>, contents: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.resolve(relative.as_ref())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(relative.as_ref().to_path_buf())
    }

    /// Create a sub-directory and return its absolute path
    pub fn create_dir(&self, relative: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let path = self.resolve(relative)?;
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_is_exclusive() {
        let output = TempDir::new().unwrap();
        let id = Uuid::new_v4();

        let workspace = Workspace::create(output.path(), &id).unwrap();
        assert!(workspace.root().is_dir());
        assert_eq!(workspace.root(), output.path().join(id.to_string()));

        let second = Workspace::create(output.path(), &id);
        assert_eq!(second.unwrap_err().kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_create_makes_missing_output_dir() {
        let output = TempDir::new().unwrap();
        let nested = output.path().join("cases").join("2024-001");

        let workspace = Workspace::create(&nested, &Uuid::new_v4()).unwrap();
        assert!(workspace.root().starts_with(&nested));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let output = TempDir::new().unwrap();
        let workspace = Workspace::create(output.path(), &Uuid::new_v4()).unwrap();

        assert!(workspace.resolve("logs/kmsg").is_ok());
        assert!(workspace.resolve("./getprop.txt").is_ok());
        assert!(matches!(
            workspace.resolve("../outside.txt"),
            Err(SessionError::PathEscapesWorkspace(_))
        ));
        assert!(workspace.resolve("/etc/passwd").is_err());
        assert!(workspace.resolve("").is_err());
    }

    #[test]
    fn test_write_artifact_creates_parents() {
        let output = TempDir::new().unwrap();
        let workspace = Workspace::create(output.path(), &Uuid::new_v4()).unwrap();

        let relative = workspace.write_artifact("apks/com.example/base.apk", b"PK").unwrap();
        assert_eq!(relative, PathBuf::from("apks/com.example/base.apk"));
        assert_eq!(fs::read(workspace.root().join(&relative)).unwrap(), b"PK");
        assert_eq!(workspace.relative(&workspace.root().join(&relative)), relative);
    }
}
