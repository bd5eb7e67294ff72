use std::io::Write;
use std::path::{Path, PathBuf};

/// Blob names carrying this prefix belong to a dry run and never outlive it.
pub const TEMP_FILENAME_PREFIX: &str = "__TEMP__";

/// Name-keyed store for encoded measurement blobs. Writes and deletes are
/// independent of any database transaction.
pub trait BlobStore {
    fn write(&self, name: &str, bytes: &[u8]) -> std::io::Result<()>;
    fn read(&self, name: &str) -> std::io::Result<Vec<u8>>;
    fn delete(&self, name: &str) -> std::io::Result<()>;
    fn exists(&self, name: &str) -> bool;
    /// Every blob name currently stored.
    fn list(&self) -> std::io::Result<Vec<String>>;
}

pub fn is_temp_blob(name: &str) -> bool {
    Path::new(name)
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with(TEMP_FILENAME_PREFIX))
}

/// Blob store backed by a flat directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> std::io::Result<PathBuf> {
        let file = Path::new(name);
        match file.file_name() {
            Some(f) if f == file.as_os_str() => Ok(self.root.join(file)),
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid blob name '{name}'"),
            )),
        }
    }
}

impl BlobStore for FsBlobStore {
    /// Write to a temp file in the store directory, then rename into place.
    fn write(&self, name: &str, bytes: &[u8]) -> std::io::Result<()> {
        let target = self.path_of(name)?;
        std::fs::create_dir_all(&self.root)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.persist(&target).map_err(|e| e.error)?;
        tracing::debug!(blob = name, size = bytes.len(), "Blob written");
        Ok(())
    }

    fn read(&self, name: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path_of(name)?)
    }

    fn delete(&self, name: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.path_of(name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_ok_and(|p| p.is_file())
    }

    fn list(&self) -> std::io::Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
