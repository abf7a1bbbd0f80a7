//! JSON-file catalog backing.
//!
//! A single-user library does not need a database server; the whole catalog
//! fits comfortably in one JSON document. Writes go through a temp file and
//! an atomic rename so a crash mid-save never truncates the catalog.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Catalog, FileAssociation, LegacyAttachment, PaperId, PaperRecord, Result,
};

/// Catalog document as persisted on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogData {
    pub schema_version: u32,
    pub papers: Vec<PaperRecord>,
    pub files: Vec<FileAssociation>,
    #[serde(default)]
    pub attachments: Vec<LegacyAttachment>,
}

/// File-backed [`Catalog`] implementation.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    data: CatalogData,
}

impl JsonCatalog {
    /// Open a catalog file, creating an empty catalog if the file is absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader(reader)?
        } else {
            debug!(path = %path.display(), "no catalog file, starting empty");
            CatalogData::default()
        };
        Ok(Self { path, data })
    }

    /// Build an in-memory catalog around existing data; saved to `path`
    /// on the first mutation.
    pub fn with_data<P: AsRef<Path>>(path: P, data: CatalogData) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            data,
        }
    }

    pub fn data(&self) -> &CatalogData {
        &self.data
    }

    /// Write-rename save: the catalog file is either the old document or
    /// the new one, never a partial write.
    pub fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(writer, &self.data)?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Catalog for JsonCatalog {
    fn paper_by_bibcode(&self, bibcode: &str) -> Result<Option<PaperRecord>> {
        Ok(self.data.papers.iter().find(|p| p.bibcode == bibcode).cloned())
    }

    fn paper_by_id(&self, id: PaperId) -> Result<Option<PaperRecord>> {
        Ok(self.data.papers.iter().find(|p| p.id == id).cloned())
    }

    fn files_by_digest(&self, digest: &str) -> Result<Vec<FileAssociation>> {
        Ok(self
            .data
            .files
            .iter()
            .filter(|f| f.digest == digest)
            .cloned()
            .collect())
    }

    fn add_paper_file(&mut self, assoc: FileAssociation) -> Result<()> {
        self.data.files.push(assoc);
        self.save()
    }

    fn all_attachments(&self) -> Result<Vec<LegacyAttachment>> {
        Ok(self.data.attachments.clone())
    }

    fn schema_version(&self) -> Result<u32> {
        Ok(self.data.schema_version)
    }

    fn set_schema_version(&mut self, version: u32) -> Result<()> {
        self.data.schema_version = version;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileRole, FileStatus, SourceType};
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_assoc(paper_id: PaperId, digest: &str) -> FileAssociation {
        FileAssociation {
            paper_id,
            digest: digest.to_string(),
            stored_filename: format!("{digest}.pdf"),
            original_name: "old_name.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            byte_size: 10,
            role: FileRole::Pdf,
            source_type: SourceType::Arxiv,
            added_date: Utc::now(),
            status: FileStatus::Ready,
        }
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cat = JsonCatalog::open(dir.path().join("catalog.json")).unwrap();
        assert_eq!(cat.schema_version().unwrap(), 0);
        assert!(cat.all_attachments().unwrap().is_empty());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");

        let mut cat = JsonCatalog::with_data(
            &path,
            CatalogData {
                schema_version: 1,
                papers: vec![PaperRecord {
                    id: 1,
                    bibcode: "2019ApJ...875L...1E".to_string(),
                }],
                ..Default::default()
            },
        );
        cat.add_paper_file(sample_assoc(1, &"cd".repeat(32))).unwrap();
        cat.set_schema_version(2).unwrap();

        let reopened = JsonCatalog::open(&path).unwrap();
        assert_eq!(reopened.schema_version().unwrap(), 2);
        assert_eq!(
            reopened
                .paper_by_bibcode("2019ApJ...875L...1E")
                .unwrap()
                .unwrap()
                .id,
            1
        );
        assert_eq!(reopened.files_by_digest(&"cd".repeat(32)).unwrap().len(), 1);
    }

    #[test]
    fn test_files_by_digest_spans_papers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        let digest = "ef".repeat(32);

        let mut cat = JsonCatalog::open(&path).unwrap();
        cat.add_paper_file(sample_assoc(1, &digest)).unwrap();
        cat.add_paper_file(sample_assoc(2, &digest)).unwrap();

        assert_eq!(cat.files_by_digest(&digest).unwrap().len(), 2);
        assert!(cat.files_by_digest(&"00".repeat(32)).unwrap().is_empty());
    }
}
