//! On-disk layout invariants across a larger batch of blobs.

use std::collections::HashSet;
use std::fs;

use tempfile::TempDir;

use bibfiles_cas::{digest_to_hex, hash_file, BlobStore};

#[test]
fn batch_placement_shards_by_digest_prefix() {
    let lib = TempDir::new().unwrap();
    let staging = TempDir::new().unwrap();
    let store = BlobStore::new(lib.path()).unwrap();

    let mut expected = HashSet::new();
    for i in 0..64u32 {
        let src = staging.path().join(format!("file{i}.pdf"));
        fs::write(&src, format!("distinct content {i}")).unwrap();
        let (digest, _) = hash_file(&src).unwrap();
        let dest = store.place(&src, &digest, ".pdf").unwrap();

        let hex = digest_to_hex(&digest);
        expected.insert(hex.clone());
        // blob sits in the shard named by its own first two hex chars
        assert_eq!(
            dest.parent().unwrap().file_name().unwrap().to_str().unwrap(),
            &hex[..2]
        );
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.blob_count, 64);
    assert!(stats.shard_dirs <= 256);

    // every stored filename begins with its shard's prefix
    let mut seen = HashSet::new();
    for shard in fs::read_dir(lib.path().join("files")).unwrap() {
        let shard = shard.unwrap();
        let prefix = shard.file_name().to_string_lossy().into_owned();
        for blob in fs::read_dir(shard.path()).unwrap() {
            let name = blob.unwrap().file_name().to_string_lossy().into_owned();
            assert!(name.starts_with(&prefix));
            seen.insert(name.trim_end_matches(".pdf").to_string());
        }
    }
    assert_eq!(seen, expected);
}

#[test]
fn repeated_placement_is_idempotent_on_disk() {
    let lib = TempDir::new().unwrap();
    let staging = TempDir::new().unwrap();
    let store = BlobStore::new(lib.path()).unwrap();

    for round in 0..3 {
        let src = staging.path().join(format!("copy{round}.pdf"));
        fs::write(&src, b"the same large scan").unwrap();
        let (digest, _) = hash_file(&src).unwrap();
        store.place(&src, &digest, ".pdf").unwrap();
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.blob_count, 1);
    assert_eq!(stats.total_bytes, b"the same large scan".len() as u64);
}
