pub mod formats;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::ScannedFile;
use crate::error::{Error, Result};
use formats::format_of;

/// Files found under a folder, split by whether the importer can read them.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    pub unsupported: Vec<PathBuf>,
}

/// Recursively scan a directory for supported photo files. Results are
/// sorted by path.
pub fn scan_directory(path: &Path) -> Result<ScanResult> {
    if !path.exists() {
        return Err(Error::FolderNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }

    let mut result = ScanResult::default();
    for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let file_path = entry.into_path();
        match format_of(&file_path) {
            Some(format) => result.files.push(ScannedFile {
                path: file_path,
                format,
            }),
            None => result.unsupported.push(file_path),
        }
    }

    debug!(
        root = %path.display(),
        files = result.files.len(),
        unsupported = result.unsupported.len(),
        "scanned folder"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_directory_finds_photos() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("photo.jpg"), b"fake jpeg").unwrap();
        fs::write(tmp.path().join("photo.png"), b"fake png").unwrap();
        fs::write(tmp.path().join("readme.txt"), b"not a photo").unwrap();

        let scan = scan_directory(tmp.path()).unwrap();
        assert_eq!(scan.files.len(), 2);
        assert_eq!(scan.unsupported, vec![tmp.path().join("readme.txt")]);
    }

    #[test]
    fn test_scan_nested_preserves_full_path() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("2024/06/15");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("photo.webp"), b"data").unwrap();

        let scan = scan_directory(tmp.path()).unwrap();
        assert_eq!(scan.files.len(), 1);
        assert_eq!(scan.files[0].path, sub.join("photo.webp"));
    }

    #[test]
    fn test_scan_is_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["c.jpg", "a.jpg", "b.tif"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }

        let scan = scan_directory(tmp.path()).unwrap();
        let names: Vec<_> = scan
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.tif", "c.jpg"]);
    }

    #[test]
    fn test_scan_raw_files_are_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("shot.cr2"), b"raw").unwrap();

        let scan = scan_directory(tmp.path()).unwrap();
        assert!(scan.files.is_empty());
        assert_eq!(scan.unsupported.len(), 1);
    }

    #[test]
    fn test_scan_missing_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let err = scan_directory(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::FolderNotFound(_)));
    }

    #[test]
    fn test_scan_file_is_not_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("photo.jpg");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(scan_directory(&file), Err(Error::NotADirectory(_))));
    }
}
