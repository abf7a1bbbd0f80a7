//! Legacy layout discovery.
//!
//! The pre-content-store layout kept one file per record directly under
//! `library/papers/`, named `<bibcode>_<SOURCETAG>.<ext>`. The tag set is
//! closed; anything that does not parse is counted and skipped, never fatal.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use bibfiles_meta::SourceType;

use crate::{MigrateError, Result};

/// Source tags embedded in legacy filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    EprintPdf,
    PubPdf,
    AdsPdf,
    Attached,
}

impl SourceTag {
    pub const ALL: [SourceTag; 4] = [
        SourceTag::EprintPdf,
        SourceTag::PubPdf,
        SourceTag::AdsPdf,
        SourceTag::Attached,
    ];

    /// The literal tag as it appears in legacy filenames.
    pub fn tag_str(&self) -> &'static str {
        match self {
            SourceTag::EprintPdf => "EPRINT_PDF",
            SourceTag::PubPdf => "PUB_PDF",
            SourceTag::AdsPdf => "ADS_PDF",
            SourceTag::Attached => "ATTACHED",
        }
    }

    /// Normalized source classification for the metadata row.
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceTag::EprintPdf => SourceType::Arxiv,
            SourceTag::PubPdf => SourceType::Publisher,
            SourceTag::AdsPdf => SourceType::AdsScan,
            SourceTag::Attached => SourceType::Manual,
        }
    }
}

/// One discovered per-record legacy file. Transient: consumed by the
/// orchestrator and dropped, never persisted.
#[derive(Debug, Clone)]
pub struct LegacyFile {
    pub path: PathBuf,
    pub bibcode: String,
    pub tag: SourceTag,
    /// Filename as found on disk, kept for provenance.
    pub original_name: String,
}

/// Result of one scan pass over the legacy papers directory.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub candidates: Vec<LegacyFile>,
    /// Files present but not matching the legacy naming pattern.
    pub unmatched: u64,
}

/// Split `<bibcode>_<SOURCETAG>.<ext>` into its parts.
///
/// Tags contain underscores themselves, so matching is suffix-based over
/// the closed tag set rather than a split on `_`.
pub fn parse_legacy_name(name: &str) -> Option<(String, SourceTag)> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    for tag in SourceTag::ALL {
        let suffix = format!("_{}", tag.tag_str());
        if let Some(bibcode) = stem.strip_suffix(&suffix) {
            if bibcode.is_empty() {
                return None;
            }
            return Some((bibcode.to_string(), tag));
        }
    }
    None
}

/// Enumerate legacy per-record files under `papers_dir`.
///
/// A missing directory is an empty library, not an error. A directory that
/// exists but cannot be listed is a hard error for this phase: candidates
/// would silently be lost otherwise.
pub fn scan_papers(papers_dir: &Path) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();

    if !papers_dir.exists() {
        debug!(dir = %papers_dir.display(), "no legacy papers directory");
        return Ok(outcome);
    }

    for entry in WalkDir::new(papers_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| MigrateError::ScanDir {
            dir: papers_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        match parse_legacy_name(&name) {
            Some((bibcode, tag)) => {
                outcome.candidates.push(LegacyFile {
                    path: entry.into_path(),
                    bibcode,
                    tag,
                    original_name: name,
                });
            }
            None => {
                warn!(file = %name, "skipping file not matching legacy pattern");
                outcome.unmatched += 1;
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_all_tags() {
        let cases = [
            ("2019ApJ...875L...1E_EPRINT_PDF.pdf", SourceTag::EprintPdf),
            ("2019ApJ...875L...1E_PUB_PDF.pdf", SourceTag::PubPdf),
            ("1998AJ....116.1009R_ADS_PDF.pdf", SourceTag::AdsPdf),
            ("2003A&A...402..701B_ATTACHED.dat", SourceTag::Attached),
        ];
        for (name, expect) in cases {
            let (bibcode, tag) = parse_legacy_name(name).unwrap();
            assert_eq!(tag, expect, "{name}");
            assert!(!bibcode.contains(tag.tag_str()));
        }
    }

    #[test]
    fn test_parse_extracts_bibcode() {
        let (bibcode, tag) = parse_legacy_name("2019ApJ...875L...1E_PUB_PDF.pdf").unwrap();
        assert_eq!(bibcode, "2019ApJ...875L...1E");
        assert_eq!(tag.source_type(), bibfiles_meta::SourceType::Publisher);
    }

    #[test]
    fn test_parse_rejects_non_matching() {
        assert!(parse_legacy_name("notes.txt").is_none());
        assert!(parse_legacy_name("_EPRINT_PDF.pdf").is_none());
        assert!(parse_legacy_name("2019ApJ_SOMETHING_ELSE.pdf").is_none());
    }

    #[test]
    fn test_scan_classifies_and_counts_unmatched() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2019ApJ...875L...1E_PUB_PDF.pdf"), b"x").unwrap();
        fs::write(dir.path().join("2019ApJ...875L...1E_EPRINT_PDF.pdf"), b"y").unwrap();
        fs::write(dir.path().join("random_notes.txt"), b"z").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let outcome = scan_papers(dir.path()).unwrap();
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.unmatched, 1);
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let outcome = scan_papers(&dir.path().join("papers")).unwrap();
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.unmatched, 0);
    }
}
