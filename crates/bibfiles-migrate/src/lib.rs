//! # bibfiles-migrate
//!
//! One-shot migration of the legacy one-file-per-record layout into the
//! content-addressed store.
//!
//! The pass is gated on the catalog's persisted schema version: once the
//! library reports [`CONTENT_STORE_SCHEMA_VERSION`] the orchestrator is a
//! no-op. Per-file failures are collected into the returned summary rather
//! than aborting the run; placement and metadata insertion are individually
//! idempotent, so an interrupted pass converges on re-run without
//! duplicating blobs or rows.

pub mod project;
pub mod scan;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use bibfiles_cas::{
    digest_to_hex, extension_of, hash_file_with_buffer, BlobStore, CasError,
    DEFAULT_HASH_BUF_SIZE,
};
use bibfiles_meta::{
    mime_for_extension, role_for_extension, Catalog, FileAssociation, FileRole, FileStatus,
    MetaError, PaperRecord, SourceType,
};

use project::{project_alias, sanitize_component};
use scan::{scan_papers, LegacyFile};

/// Schema version at which a library stores attachments content-addressed.
pub const CONTENT_STORE_SCHEMA_VERSION: u32 = 2;

/// Lock file guarding a migration pass, at the library root.
const LOCK_FILE: &str = ".bibfiles.lock";

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Cas(#[from] CasError),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error("library is locked by another process: {path}")]
    Locked { path: PathBuf },

    #[error("cannot list legacy directory {dir}: {message}")]
    ScanDir { dir: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, MigrateError>;

/// Outcome of one migration pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationSummary {
    /// Candidates hashed, stored, and recorded this run.
    pub migrated: u64,
    /// Candidates visited but not migrated: orphans, missing sources,
    /// unmatched filenames, already-recorded associations.
    pub skipped: u64,
    /// Per-file failures, verbatim. Never aborts the pass.
    pub errors: Vec<String>,
}

/// Whether the library still needs the content-store migration.
pub fn needs_migration<C: Catalog>(catalog: &C) -> Result<bool> {
    Ok(catalog.schema_version()? < CONTENT_STORE_SCHEMA_VERSION)
}

/// Tunables for one migration pass.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Chunk size for streaming content hashes.
    pub hash_buffer_size: usize,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            hash_buffer_size: DEFAULT_HASH_BUF_SIZE,
        }
    }
}

/// Advisory exclusive lock over one library, held for a whole pass.
///
/// Two concurrent passes would race rename-into-place on shared digests;
/// the flock makes the second invocation fail fast instead.
struct LibraryLock {
    file: File,
    path: PathBuf,
}

impl LibraryLock {
    fn acquire(library_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(library_root)?;
        let path = library_root.join(LOCK_FILE);
        let file = File::create(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| MigrateError::Locked { path: path.clone() })?;
        Ok(Self { file, path })
    }
}

impl Drop for LibraryLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release library lock");
        }
    }
}

/// One fully-resolved migration candidate, either shape.
struct Candidate {
    path: PathBuf,
    original_name: String,
    paper: PaperRecord,
    role: FileRole,
    source_type: SourceType,
    /// Alias filename stem under `papers/<bibcode>/`.
    label: String,
}

enum Visit {
    Migrated,
    Skipped,
}

/// Run the full migration pass over one library.
///
/// Returns a zeroed summary without touching disk when the library is
/// already at the content-store schema version. Otherwise: scan the legacy
/// papers directory, then the legacy attachment rows, and for each
/// candidate run hash → place → record → link in order. The schema version
/// is advanced only once every discovered candidate has been visited.
pub fn migrate_library<C: Catalog>(catalog: &mut C, library_root: &Path) -> Result<MigrationSummary> {
    migrate_library_with(catalog, library_root, &MigrateOptions::default())
}

/// [`migrate_library`] with explicit tunables.
pub fn migrate_library_with<C: Catalog>(
    catalog: &mut C,
    library_root: &Path,
    options: &MigrateOptions,
) -> Result<MigrationSummary> {
    if !needs_migration(catalog)? {
        info!("library already at content-store schema, nothing to do");
        return Ok(MigrationSummary::default());
    }

    let _lock = LibraryLock::acquire(library_root)?;
    let store = BlobStore::new(library_root)?;
    let mut summary = MigrationSummary::default();

    // Phase 1: per-record files under papers/. A listing failure stops
    // this phase only; the attachment phase is independent.
    let papers_dir = library_root.join("papers");
    let mut scan_complete = true;
    match scan_papers(&papers_dir) {
        Ok(outcome) => {
            info!(
                candidates = outcome.candidates.len(),
                unmatched = outcome.unmatched,
                "legacy scan complete"
            );
            summary.skipped += outcome.unmatched;
            for legacy in outcome.candidates {
                process_record_file(catalog, &store, legacy, options, &mut summary);
            }
        }
        Err(e) => {
            warn!(error = %e, "legacy scan failed; leaving schema version unchanged");
            summary.errors.push(e.to_string());
            scan_complete = false;
        }
    }

    // Phase 2: rows from the legacy attachments table.
    for attachment in catalog.all_attachments()? {
        let cand = match resolve_attachment(catalog, library_root, &attachment) {
            Ok(Some(cand)) => cand,
            Ok(None) => {
                summary.skipped += 1;
                continue;
            }
            Err(msg) => {
                summary.errors.push(msg);
                continue;
            }
        };
        match visit_candidate(catalog, &store, cand, options) {
            Ok(Visit::Migrated) => summary.migrated += 1,
            Ok(Visit::Skipped) => summary.skipped += 1,
            Err(msg) => summary.errors.push(msg),
        }
    }

    // Only a fully-traversed candidate set advances the version; per-file
    // errors do not hold it back, an aborted scan does.
    if scan_complete {
        catalog.set_schema_version(CONTENT_STORE_SCHEMA_VERSION)?;
        info!(
            migrated = summary.migrated,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "migration complete"
        );
    }

    Ok(summary)
}

fn process_record_file<C: Catalog>(
    catalog: &mut C,
    store: &BlobStore,
    legacy: LegacyFile,
    options: &MigrateOptions,
    summary: &mut MigrationSummary,
) {
    // Orphan check: a file whose bibcode has no catalog record is skipped,
    // untouched on disk.
    let paper = match catalog.paper_by_bibcode(&legacy.bibcode) {
        Ok(Some(p)) => p,
        Ok(None) => {
            debug!(bibcode = %legacy.bibcode, "no catalog record, skipping orphan");
            summary.skipped += 1;
            return;
        }
        Err(e) => {
            summary
                .errors
                .push(format!("{}: catalog lookup failed: {e}", legacy.original_name));
            return;
        }
    };

    let cand = Candidate {
        path: legacy.path,
        original_name: legacy.original_name,
        paper,
        role: FileRole::Pdf,
        source_type: legacy.tag.source_type(),
        label: legacy.tag.source_type().label().to_string(),
    };

    match visit_candidate(catalog, store, cand, options) {
        Ok(Visit::Migrated) => summary.migrated += 1,
        Ok(Visit::Skipped) => summary.skipped += 1,
        Err(msg) => summary.errors.push(msg),
    }
}

/// Resolve a legacy attachment row to a candidate, or `None` for orphans.
fn resolve_attachment<C: Catalog>(
    catalog: &C,
    library_root: &Path,
    attachment: &bibfiles_meta::LegacyAttachment,
) -> std::result::Result<Option<Candidate>, String> {
    let paper = match catalog
        .paper_by_id(attachment.paper_id)
        .map_err(|e| format!("{}: catalog lookup failed: {e}", attachment.filename))?
    {
        Some(p) => p,
        None => {
            debug!(
                paper_id = attachment.paper_id,
                file = %attachment.filename,
                "attachment row has no catalog record, skipping orphan"
            );
            return Ok(None);
        }
    };

    let path = if Path::new(&attachment.filename).is_absolute() {
        PathBuf::from(&attachment.filename)
    } else {
        library_root.join("papers").join(&attachment.filename)
    };

    let ext = extension_of(&attachment.filename);
    let stem = Path::new(&attachment.filename)
        .file_stem()
        .map(|s| sanitize_component(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "attachment".to_string());

    Ok(Some(Candidate {
        path,
        original_name: attachment.filename.clone(),
        paper,
        role: role_for_extension(&ext),
        source_type: SourceType::Manual,
        label: stem,
    }))
}

/// Per-candidate pipeline: hash → place → record → link, strictly in order.
fn visit_candidate<C: Catalog>(
    catalog: &mut C,
    store: &BlobStore,
    cand: Candidate,
    options: &MigrateOptions,
) -> std::result::Result<Visit, String> {
    // A referenced file no longer on disk is a skip, not an error.
    if !cand.path.exists() {
        debug!(path = %cand.path.display(), "source missing, skipping");
        return Ok(Visit::Skipped);
    }

    let ext = extension_of(&cand.original_name);

    let (digest, byte_size) = hash_file_with_buffer(&cand.path, options.hash_buffer_size)
        .map_err(|e| format!("{}: hash failed: {e}", cand.original_name))?;

    let blob_path = store
        .place(&cand.path, &digest, &ext)
        .map_err(|e| format!("{}: store failed: {e}", cand.original_name))?;

    let digest_hex = digest_to_hex(&digest);
    let stored_filename = BlobStore::stored_filename(&digest, &ext);

    let existing = catalog
        .files_by_digest(&digest_hex)
        .map_err(|e| format!("{}: catalog lookup failed: {e}", cand.original_name))?;

    let visit = match existing.iter().find(|f| f.paper_id == cand.paper.id) {
        Some(prior) => {
            // A prior row for this (paper, digest) pair must agree with what
            // the bytes resolve to now; disagreement means the catalog and
            // the store have drifted and is surfaced, not trusted.
            if prior.stored_filename != stored_filename {
                return Err(format!(
                    "{}: conflicting association for paper {}: catalog records '{}', content resolves to '{}'",
                    cand.original_name, cand.paper.id, prior.stored_filename, stored_filename
                ));
            }
            debug!(
                paper_id = cand.paper.id,
                digest = %digest_hex,
                "association already recorded, skipping insert"
            );
            Visit::Skipped
        }
        None => {
            catalog
                .add_paper_file(FileAssociation {
                    paper_id: cand.paper.id,
                    digest: digest_hex,
                    stored_filename,
                    original_name: cand.original_name.clone(),
                    mime_type: mime_for_extension(&ext).to_string(),
                    byte_size,
                    role: cand.role,
                    source_type: cand.source_type,
                    added_date: Utc::now(),
                    status: FileStatus::Ready,
                })
                .map_err(|e| format!("{}: catalog insert failed: {e}", cand.original_name))?;
            Visit::Migrated
        }
    };

    // Aliases are disposable projections; failure to create one never
    // fails the file, the association row is already the source of truth.
    if let Err(e) = project_alias(store, &cand.paper.bibcode, &cand.label, &ext, &blob_path) {
        warn!(
            bibcode = %cand.paper.bibcode,
            label = %cand.label,
            error = %e,
            "alias projection failed"
        );
    }

    Ok(visit)
}
