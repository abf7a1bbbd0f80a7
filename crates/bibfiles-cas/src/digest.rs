//! Content digests for stored blobs.
//!
//! A digest is a 256-bit BLAKE3 hash, rendered as 64 lowercase hex
//! characters everywhere it crosses an API boundary.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::Result;

/// BLAKE3 hash type (32 bytes)
pub type Digest = [u8; 32];

/// Default chunk size for streaming file hashes. Large enough to keep
/// syscall overhead negligible for the multi-hundred-MB scans this
/// library holds.
pub const DEFAULT_HASH_BUF_SIZE: usize = 64 * 1024;

/// Convert a digest to its lowercase hex representation.
#[inline]
pub fn digest_to_hex(digest: &Digest) -> String {
    hex::encode(digest)
}

/// Parse a 64-character hex string into a digest.
pub fn hex_to_digest(s: &str) -> Option<Digest> {
    if s.len() != 64 {
        return None;
    }
    let bytes = hex::decode(s).ok()?;
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&bytes);
    Some(digest)
}

/// Hash a file's contents without loading it into memory.
///
/// Returns the digest plus the byte count consumed. Read errors
/// (permission, file vanishing mid-stream) propagate to the caller;
/// there is no retry here.
pub fn hash_file<P: AsRef<Path>>(path: P) -> Result<(Digest, u64)> {
    hash_file_with_buffer(path, DEFAULT_HASH_BUF_SIZE)
}

/// [`hash_file`] with a caller-chosen chunk size.
///
/// The digest is independent of the chunk size; only the read pattern
/// changes. Sizes below one byte are clamped.
pub fn hash_file_with_buffer<P: AsRef<Path>>(path: P, buf_size: usize) -> Result<(Digest, u64)> {
    let buf_size = buf_size.max(1);
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::with_capacity(buf_size, file);
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; buf_size];
    let mut total: u64 = 0;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((*hasher.finalize().as_bytes(), total))
}

/// Hash in-memory bytes. Mostly useful in tests and integrity checks.
#[inline]
pub fn hash_bytes(data: &[u8]) -> Digest {
    *blake3::hash(data).as_bytes()
}
