//! PDF discovery with mirrored output paths

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::error::{Result, StampError};

/// One discovered input document and where its stamped copy goes
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRef {
    pub input_path: PathBuf,
    pub relative_path: PathBuf,
    pub output_path: PathBuf,
}

/// Collect every PDF under `input_root`, in a stable order
///
/// # Arguments
/// * `input_root` - Directory tree to scan recursively
/// * `output_root` - Directory the input layout is mirrored into
///
/// # Returns
/// Documents sorted by input path, so label assignment is reproducible
/// run over run. Only an inaccessible root is fatal; unreadable entries
/// deeper in the tree are skipped with a warning.
pub fn locate_documents(input_root: &Path, output_root: &Path) -> Result<Vec<DocumentRef>> {
    let metadata = fs::metadata(input_root).map_err(|e| StampError::Discovery {
        path: input_root.to_path_buf(),
        detail: e.to_string(),
    })?;
    if !metadata.is_dir() {
        return Err(StampError::Discovery {
            path: input_root.to_path_buf(),
            detail: "not a directory".to_string(),
        });
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(input_root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("⚠️  Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext) = entry.path().extension() {
            if ext.to_string_lossy().to_lowercase() == "pdf" {
                let input_path = entry.path().to_path_buf();
                let relative_path = match input_path.strip_prefix(input_root) {
                    Ok(relative) => relative.to_path_buf(),
                    Err(_) => continue,
                };
                documents.push(DocumentRef {
                    output_path: output_root.join(&relative_path),
                    input_path,
                    relative_path,
                });
            }
        }
    }

    // Numbering depends on a stable document order
    documents.sort_by(|a, b| a.input_path.cmp(&b.input_path));
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_locates_nested_pdfs_in_sorted_order() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("sub");
        fs::create_dir(&subdir).unwrap();

        File::create(temp_dir.path().join("b.pdf")).unwrap();
        File::create(subdir.join("a.pdf")).unwrap();
        File::create(temp_dir.path().join("notes.txt")).unwrap();

        let out_root = PathBuf::from("/tmp/out");
        let documents = locate_documents(temp_dir.path(), &out_root).unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].relative_path, PathBuf::from("b.pdf"));
        assert_eq!(documents[1].relative_path, PathBuf::from("sub/a.pdf"));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("UPPER.PDF")).unwrap();

        let documents = locate_documents(temp_dir.path(), Path::new("/tmp/out")).unwrap();
        assert_eq!(documents.len(), 1);
    }

    #[test]
    fn test_output_paths_mirror_layout() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("depo/2024");
        fs::create_dir_all(&nested).unwrap();
        File::create(nested.join("exhibit.pdf")).unwrap();

        let out_root = PathBuf::from("/stamped");
        let documents = locate_documents(temp_dir.path(), &out_root).unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents[0].output_path,
            PathBuf::from("/stamped/depo/2024/exhibit.pdf")
        );
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let err = locate_documents(Path::new("/no/such/root"), Path::new("/tmp/out")).unwrap_err();
        assert!(matches!(err, StampError::Discovery { .. }));
    }

    #[test]
    fn test_file_as_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("single.pdf");
        File::create(&file_path).unwrap();

        let err = locate_documents(&file_path, Path::new("/tmp/out")).unwrap_err();
        assert!(matches!(err, StampError::Discovery { .. }));
    }
}
