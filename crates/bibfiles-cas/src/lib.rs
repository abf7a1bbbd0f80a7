//! # bibfiles-cas
//!
//! Content-addressed blob store for library attachments.
//!
//! Each attachment is stored exactly once under its BLAKE3 content digest,
//! with a 2-char hex prefix fan-out so no single directory holds more than
//! roughly 1/256th of the library.
//!
//! ## Directory layout
//!
//! ```text
//! <library>/
//! └── files/
//!     └── ab/
//!         └── abcd1234...ef90.pdf   # <digest><original extension>
//! ```
//!
//! Human-readable access goes through relative symlinks created by
//! [`BlobStore::project_link`]; the blob tree itself is only ever addressed
//! by digest.

mod digest;

pub use digest::{
    digest_to_hex, hash_bytes, hash_file, hash_file_with_buffer, hex_to_digest, Digest,
    DEFAULT_HASH_BUF_SIZE,
};

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument};

use thiserror::Error;

/// Errors that can occur during blob store operations
#[derive(Error, Debug)]
pub enum CasError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("blob not found: {digest}")]
    Missing { digest: String },

    #[error("symlink target {target} is not under the library root")]
    ForeignTarget { target: PathBuf },
}

pub type Result<T> = std::result::Result<T, CasError>;

/// Normalize a filename's extension for blob naming.
///
/// Returns the extension with its leading dot, lowercased, or an empty
/// string when the name has none. `"2019ApJ...Smith.PDF"` → `".pdf"`.
pub fn extension_of(name: &str) -> String {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => String::new(),
    }
}

/// Content-addressed store rooted at a library directory.
///
/// Owns the physical bytes under `<library>/files/`; callers never write
/// into that tree directly.
#[derive(Debug, Clone)]
pub struct BlobStore {
    library_root: PathBuf,
    files_dir: PathBuf,
}

impl BlobStore {
    /// Open (and create if needed) the blob tree under a library root.
    pub fn new<P: AsRef<Path>>(library_root: P) -> Result<Self> {
        let library_root = library_root.as_ref().to_path_buf();
        let files_dir = library_root.join("files");
        fs::create_dir_all(&files_dir)?;
        Ok(Self {
            library_root,
            files_dir,
        })
    }

    /// The library root this store was opened at.
    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// The root of the content-addressed tree (`<library>/files`).
    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Deterministic blob location: `files/<hex[..2]>/<hex><ext>`.
    ///
    /// Pure path arithmetic; does not touch the filesystem.
    pub fn shard_path(&self, digest: &Digest, ext: &str) -> PathBuf {
        let hex = digest_to_hex(digest);
        let prefix = &hex[..2];
        self.files_dir.join(prefix).join(format!("{hex}{ext}"))
    }

    /// The stored filename for a digest + extension, as recorded in
    /// catalog metadata.
    pub fn stored_filename(digest: &Digest, ext: &str) -> String {
        format!("{}{}", digest_to_hex(digest), ext)
    }

    /// Whether a blob for this digest (with this extension) is on disk.
    pub fn contains(&self, digest: &Digest, ext: &str) -> bool {
        self.shard_path(digest, ext).exists()
    }

    /// Move `source` into its content-addressed location.
    ///
    /// The common path is a rename, not a copy — attachments can be large
    /// and doubling the I/O is not acceptable. If a blob with this digest
    /// already exists the source is a duplicate by content and is deleted;
    /// the existing blob is reused. Either way exactly one physical file
    /// per digest remains.
    #[instrument(skip(self, digest), fields(digest = %digest_to_hex(digest)), level = "debug")]
    pub fn place(&self, source: &Path, digest: &Digest, ext: &str) -> Result<PathBuf> {
        let dest = self.shard_path(digest, ext);

        if dest.exists() {
            debug!(source = %source.display(), "duplicate content, discarding source");
            fs::remove_file(source)?;
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::rename(source, &dest) {
            Ok(()) => {}
            // Legacy tree and blob tree may live on different filesystems.
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                fs::copy(source, &dest)?;
                fs::remove_file(source)?;
            }
            Err(e) => {
                // If the target appeared meanwhile the content is already
                // stored; drop the duplicate source.
                if dest.exists() {
                    fs::remove_file(source)?;
                } else {
                    return Err(CasError::Io(e));
                }
            }
        }

        Ok(dest)
    }

    /// Create a human-readable alias at `link_path` resolving to `blob_path`.
    ///
    /// Any pre-existing entry at `link_path` (regular file, symlink, even a
    /// dangling one) is removed first, so projection is idempotent. The
    /// symlink target is written relative to the link's own directory: the
    /// whole library stays valid if the tree is moved as a unit.
    #[cfg(unix)]
    pub fn project_link(&self, link_path: &Path, blob_path: &Path) -> Result<()> {
        use std::os::unix::fs::symlink;

        if !blob_path.exists() {
            return Err(CasError::Missing {
                digest: blob_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });
        }

        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // symlink_metadata catches dangling links that exists() misses
        if link_path.symlink_metadata().is_ok() {
            fs::remove_file(link_path)?;
        }

        let link_dir = link_path.parent().unwrap_or(Path::new("."));
        let target = relative_path(link_dir, blob_path).ok_or_else(|| CasError::ForeignTarget {
            target: blob_path.to_path_buf(),
        })?;

        symlink(&target, link_path)?;
        debug!(link = %link_path.display(), target = %target.display(), "projected alias");
        Ok(())
    }

    /// Walk the shard tree and total up stored blobs.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut blob_count = 0u64;
        let mut total_bytes = 0u64;
        let mut shard_dirs = 0u64;

        if !self.files_dir.exists() {
            return Ok(StoreStats::default());
        }

        for shard in fs::read_dir(&self.files_dir)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            shard_dirs += 1;

            for blob in fs::read_dir(shard.path())? {
                let blob = blob?;
                if blob.file_type()?.is_file() {
                    blob_count += 1;
                    total_bytes += blob.metadata()?.len();
                }
            }
        }

        Ok(StoreStats {
            blob_count,
            total_bytes,
            shard_dirs,
        })
    }
}

/// Compute `to` relative to `from_dir` by walking up over the uncommon
/// prefix. Both paths must share at least a root component.
fn relative_path(from_dir: &Path, to: &Path) -> Option<PathBuf> {
    let from: Vec<Component> = from_dir.components().collect();
    let to_parts: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 && from_dir.is_absolute() && to.is_absolute() {
        return None;
    }

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part);
    }
    Some(rel)
}

/// Aggregate numbers for `bibfiles status`
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Number of unique blobs stored
    pub blob_count: u64,
    /// Total bytes stored (deduplicated)
    pub total_bytes: u64,
    /// Number of populated shard directories (≤ 256)
    pub shard_dirs: u64,
}
