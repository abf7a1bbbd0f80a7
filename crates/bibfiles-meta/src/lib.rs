//! # bibfiles-meta
//!
//! Catalog metadata model for the bibfiles library.
//!
//! The storage and migration engine never talks to a database directly; it
//! goes through the [`Catalog`] trait, an injected capability with exactly
//! the lookups and inserts the engine needs. Any persistence engine can sit
//! behind it — the bundled [`JsonCatalog`] is a plain JSON file, which is
//! all a single-user library requires.

mod json;

pub use json::{CatalogData, JsonCatalog};

use std::fmt;
use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MetaError>;

/// Catalog-assigned identifier for one bibliographic record.
pub type PaperId = u64;

/// Where an attachment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Arxiv,
    Publisher,
    AdsScan,
    Manual,
}

impl SourceType {
    /// Stable label used for alias filenames and log output.
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arxiv",
            SourceType::Publisher => "publisher",
            SourceType::AdsScan => "ads_scan",
            SourceType::Manual => "manual",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What an attachment is, relative to its paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Pdf,
    Supplement,
    Data,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    /// Blob confirmed on disk.
    Ready,
}

/// One bibliographic record, as the storage engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: PaperId,
    pub bibcode: String,
}

/// Metadata row linking one paper to one stored blob.
///
/// At most one association exists per (`paper_id`, `digest`) pair; the
/// same blob may legitimately back associations for several papers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAssociation {
    pub paper_id: PaperId,
    /// 64-char lowercase hex content digest
    pub digest: String,
    /// `<digest><ext>`, the blob's on-disk name
    pub stored_filename: String,
    /// Pre-migration filename, kept for provenance
    pub original_name: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub role: FileRole,
    pub source_type: SourceType,
    pub added_date: DateTime<Utc>,
    pub status: FileStatus,
}

/// Row from the legacy attachments table, consumed during migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyAttachment {
    pub paper_id: PaperId,
    pub filename: String,
    /// Free-form type string from the old schema; role is re-derived from
    /// the extension during migration.
    pub file_type: String,
}

/// The Metadata Repository capability.
///
/// Everything the storage/migration core needs from the catalog database,
/// and nothing more.
pub trait Catalog {
    fn paper_by_bibcode(&self, bibcode: &str) -> Result<Option<PaperRecord>>;

    fn paper_by_id(&self, id: PaperId) -> Result<Option<PaperRecord>>;

    /// All associations recorded for a digest, across papers.
    fn files_by_digest(&self, digest: &str) -> Result<Vec<FileAssociation>>;

    fn add_paper_file(&mut self, assoc: FileAssociation) -> Result<()>;

    /// Legacy attachment rows awaiting migration.
    fn all_attachments(&self) -> Result<Vec<LegacyAttachment>>;

    fn schema_version(&self) -> Result<u32>;

    fn set_schema_version(&mut self, version: u32) -> Result<()>;
}

/// MIME type for an extension (with or without leading dot).
///
/// Fixed lookup used for attachment rows that carry no explicit type;
/// unknown extensions fall back to octet-stream.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.trim_start_matches('.').to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "ps" => "application/postscript",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "fits" => "application/fits",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "tex" => "application/x-tex",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "gz" => "application/gzip",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        _ => "application/octet-stream",
    }
}

/// Role classification for attachment rows, derived from the extension.
pub fn role_for_extension(ext: &str) -> FileRole {
    match ext.trim_start_matches('.').to_lowercase().as_str() {
        "pdf" | "ps" => FileRole::Supplement,
        "csv" | "fits" | "json" | "xml" => FileRole::Data,
        _ => FileRole::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_labels() {
        assert_eq!(SourceType::Arxiv.label(), "arxiv");
        assert_eq!(SourceType::AdsScan.label(), "ads_scan");
        assert_eq!(SourceType::Publisher.to_string(), "publisher");
    }

    #[test]
    fn test_mime_lookup() {
        assert_eq!(mime_for_extension(".pdf"), "application/pdf");
        assert_eq!(mime_for_extension("FITS"), "application/fits");
        assert_eq!(mime_for_extension(".weird"), "application/octet-stream");
        assert_eq!(mime_for_extension(""), "application/octet-stream");
    }

    #[test]
    fn test_role_classification() {
        assert_eq!(role_for_extension(".pdf"), FileRole::Supplement);
        assert_eq!(role_for_extension(".csv"), FileRole::Data);
        assert_eq!(role_for_extension(".fits"), FileRole::Data);
        assert_eq!(role_for_extension(".mp4"), FileRole::Other);
    }

    #[test]
    fn test_association_serde_roundtrip() {
        let assoc = FileAssociation {
            paper_id: 7,
            digest: "ab".repeat(32),
            stored_filename: format!("{}.pdf", "ab".repeat(32)),
            original_name: "2019ApJ...875L...1E_PUB_PDF.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            byte_size: 1024,
            role: FileRole::Pdf,
            source_type: SourceType::Publisher,
            added_date: Utc::now(),
            status: FileStatus::Ready,
        };

        let json = serde_json::to_string(&assoc).unwrap();
        assert!(json.contains("\"source_type\":\"publisher\""));
        assert!(json.contains("\"status\":\"ready\""));
        let back: FileAssociation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.paper_id, 7);
        assert_eq!(back.role, FileRole::Pdf);
    }
}
