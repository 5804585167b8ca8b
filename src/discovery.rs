//! Non-recursive directory scanning by extension allow-list

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scanner for the direct entries of a directory
#[derive(Debug, Clone)]
pub struct FileScanner {
    /// Lowercase extensions without the leading dot
    extensions: Vec<String>,
}

impl FileScanner {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Regular files directly inside `directory` whose extension is allowed,
    /// in directory-listing order.
    pub fn scan(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        list_files(directory).map(|files| {
            files
                .into_iter()
                .filter(|path| self.is_supported(path))
                .collect()
        })
    }

    /// Check if a path carries one of the allowed extensions (case-insensitive)
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions.contains(&ext.to_lowercase()))
    }
}

/// All regular files directly inside `directory`, in directory-listing order
pub fn list_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(PipelineError::io(
            directory,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(directory).to_path_buf();
            PipelineError::io(path, std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_filters_by_extension_case_insensitively() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.aac"), b"x").unwrap();
        fs::write(temp_dir.path().join("b.MP3"), b"x").unwrap();
        fs::write(temp_dir.path().join("c.txt"), b"x").unwrap();
        fs::create_dir(temp_dir.path().join("nested.wav")).unwrap();

        let scanner = FileScanner::new(&["aac", ".mp3", "wav"]);
        let mut found: Vec<String> = scanner
            .scan(temp_dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        found.sort();

        assert_eq!(found, vec!["a.aac", "b.MP3"]);
    }

    #[test]
    fn test_scan_is_not_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("season1");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("deep.aac"), b"x").unwrap();

        let scanner = FileScanner::new(&["aac"]);
        assert!(scanner.scan(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = list_files(&temp_dir.path().join("absent")).unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
