//! Human-readable alias projection.
//!
//! Aliases live under `library/papers/<sanitized-bibcode>/<label>.<ext>`
//! and resolve, via relative symlinks, into the content-addressed tree.
//! They are disposable projections: the FileAssociation rows are the source
//! of truth and any alias can be regenerated from them.

use std::path::{Path, PathBuf};

use bibfiles_cas::{BlobStore, CasError};

/// Replace path-hostile characters in one path component.
pub fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '&' | '+' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Make a bibcode safe for use as a directory name.
///
/// ADS bibcodes are already close to path-safe (`2003A&A...402..701B`),
/// but separators and control characters must not leak into the tree.
pub fn sanitize_bibcode(bibcode: &str) -> String {
    sanitize_component(bibcode)
}

/// Alias path for one stored file: `papers/<bibcode>/<label><ext>`.
pub fn alias_path(library_root: &Path, bibcode: &str, label: &str, ext: &str) -> PathBuf {
    library_root
        .join("papers")
        .join(sanitize_bibcode(bibcode))
        .join(format!("{label}{ext}"))
}

/// Project a relative symlink alias for a stored blob.
pub fn project_alias(
    store: &BlobStore,
    bibcode: &str,
    label: &str,
    ext: &str,
    blob_path: &Path,
) -> Result<PathBuf, CasError> {
    let link = alias_path(store.library_root(), bibcode, label, ext);
    store.project_link(&link, blob_path)?;
    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibfiles_cas::hash_file;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_keeps_bibcode_punctuation() {
        assert_eq!(
            sanitize_bibcode("2003A&A...402..701B"),
            "2003A&A...402..701B"
        );
        assert_eq!(sanitize_bibcode("1999x/evil:name"), "1999x_evil_name");
    }

    #[test]
    fn test_alias_path_shape() {
        let p = alias_path(Path::new("/lib"), "2019ApJ...875L...1E", "arxiv", ".pdf");
        assert_eq!(
            p,
            PathBuf::from("/lib/papers/2019ApJ...875L...1E/arxiv.pdf")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_project_alias_resolves_to_blob_bytes() {
        let lib = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let store = BlobStore::new(lib.path()).unwrap();

        let src = staging.path().join("x.pdf");
        fs::write(&src, b"alias bytes").unwrap();
        let (digest, _) = hash_file(&src).unwrap();
        let blob = store.place(&src, &digest, ".pdf").unwrap();

        let link = project_alias(&store, "2019ApJ...875L...1E", "publisher", ".pdf", &blob)
            .unwrap();
        assert_eq!(fs::read(&link).unwrap(), b"alias bytes");
    }
}
