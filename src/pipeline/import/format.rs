use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;

/// Upload formats accepted for meta-data and measurement tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Jsonl,
}

impl FileFormat {
    pub const ALL: [FileFormat; 3] = [Self::Csv, Self::Xlsx, Self::Jsonl];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Jsonl => "jsonl",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// An explicit format wins; otherwise infer from the filename extension.
    pub fn resolve(explicit: Option<Self>, filename: &str) -> Result<Self, ImportError> {
        explicit
            .or_else(|| Self::from_filename(filename))
            .ok_or_else(|| {
                ImportError::Format(format!(
                    "'{filename}': expected one of .csv, .xlsx, .jsonl"
                ))
            })
    }
}

/// An uploaded byte stream and the name it arrived with.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_inference_ignores_case() {
        assert_eq!(FileFormat::from_filename("meta.CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_filename("data.xlsx"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_filename("blob.jsonl"), Some(FileFormat::Jsonl));
        assert_eq!(FileFormat::from_filename("notes.txt"), None);
    }

    #[test]
    fn explicit_format_overrides_name() {
        let f = FileFormat::resolve(Some(FileFormat::Jsonl), "upload.bin").unwrap();
        assert_eq!(f, FileFormat::Jsonl);
    }

    #[test]
    fn unresolvable_format_is_format_error() {
        let err = FileFormat::resolve(None, "upload").unwrap_err();
        assert!(matches!(err, ImportError::Format(_)));
    }

    #[test]
    fn upload_from_path_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.csv");
        std::fs::write(&path, "patient_id\n1\n").unwrap();
        let upload = Upload::from_path(&path).unwrap();
        assert_eq!(upload.name, "meta.csv");
        assert_eq!(upload.bytes.len(), 13);
    }
}
