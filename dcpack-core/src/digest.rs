//! SHA-1 digests over asset files.
//!
//! Every asset's identity in a PKL rests on a base64 SHA-1 of its on-disk
//! bytes. The digest is streamed in 64 KiB chunks with optional progress
//! reporting, and the progress callback can cancel the walk.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A progress callback taking a fraction in `0..=1` and returning `false`
/// to cancel the operation.
pub type ProgressFn<'a> = &'a mut dyn FnMut(f32) -> bool;

/// Compute the base64-encoded SHA-1 digest of a file.
///
/// `progress`, if given, is called after each chunk; returning `false`
/// aborts the digest with [`Error::Cancelled`].
pub fn make_digest(path: &Path, mut progress: Option<ProgressFn>) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| Error::read(format!("could not open {} to compute digest: {e}", path.display())))?;
    let size = file.metadata()?.len();

    let mut sha = Sha1::new();
    let mut buffer = [0u8; 65536];
    let mut done: u64 = 0;

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        sha.update(&buffer[..read]);
        done += read as u64;
        if let Some(cb) = progress.as_mut() {
            if !cb(if size == 0 { 1.0 } else { done as f32 / size as f32 }) {
                return Err(Error::Cancelled);
            }
        }
    }

    Ok(BASE64.encode(sha.finalize()))
}

/// Compute the base64-encoded SHA-1 digest of a byte slice.
pub fn make_digest_of_bytes(data: &[u8]) -> String {
    let mut sha = Sha1::new();
    sha.update(data);
    BASE64.encode(sha.finalize())
}

/// Base64-encode bytes without line breaks.
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode base64, first stripping any line breaks.
pub fn base64_decode(data: &str) -> Result<Vec<u8>> {
    let clean: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(clean)
        .map_err(|e| Error::misc(format!("bad base64: {e}")))
}
