use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::upload::{MAX_FILE_SIZE, SourceFile};

// @module: File and directory utilities

/// Media type used when the extension is not recognised
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    /// Declared media type for a file, from its extension
    pub fn detect_media_type<P: AsRef<Path>>(path: P) -> &'static str {
        let extension = path
            .as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "doc" => "application/msword",
            "txt" => "text/plain",
            _ => FALLBACK_MEDIA_TYPE,
        }
    }

    /// Expand the given paths into a list of files.
    ///
    /// Files are kept as given; directories are walked recursively in file
    /// name order so the submission order is stable.
    pub fn collect_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if Self::file_exists(path) {
                result.push(path.to_path_buf());
            } else if Self::dir_exists(path) {
                for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
                    let entry = entry.context("Failed to read directory entry")?;
                    if entry.file_type().is_file() {
                        result.push(entry.into_path());
                    }
                }
            } else {
                return Err(anyhow!("Input path does not exist: {:?}", path));
            }
        }
        Ok(result)
    }

    /// Turn a file on disk into an upload candidate.
    ///
    /// Files over the upload size limit are not read; the candidate carries
    /// only their metadata.
    pub async fn load_source_file<P: AsRef<Path>>(path: P) -> Result<SourceFile> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("Path has no file name: {:?}", path))?;
        let media_type = Self::detect_media_type(path);

        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;
        if metadata.len() > MAX_FILE_SIZE {
            return Ok(SourceFile::metadata_only(name, media_type, metadata.len()));
        }

        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {:?}", path))?;
        Ok(SourceFile::from_bytes(name, media_type, payload))
    }

    /// Size in megabytes with two decimals, e.g. `2.00 MB`
    pub fn format_size(bytes: u64) -> String {
        format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
    }

    /// Short document label shown next to a file name
    pub fn document_label(name: &str) -> &'static str {
        let name = name.to_lowercase();
        if name.ends_with(".pdf") {
            "PDF"
        } else if name.ends_with(".docx") || name.ends_with(".doc") {
            "DOC"
        } else if name.ends_with(".txt") {
            "TXT"
        } else {
            "FILE"
        }
    }
}
