//! Streaming file hashing and byte-wise comparison primitives.

use std::fmt;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use digest::Digest;
use md5::Md5;
use sha2::Sha256;

use crate::BLOCK_SIZE;

/// Digest algorithms offered by the verifier's hashing methods.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HashAlgorithm {
    /// MD5, the fast default. Not a security primitive here; it only has to
    /// make accidental divergence visible.
    Md5,
    /// SHA-256, the opt-in strong digest.
    Sha256,
}

impl HashAlgorithm {
    /// Length of the lower-case hex rendering for this algorithm.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => f.write_str("MD5"),
            HashAlgorithm::Sha256 => f.write_str("SHA-256"),
        }
    }
}

/// Renders a digest as lower-case hex.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(&mut out, "{byte:02x}").expect("write! to String cannot fail");
    }
    out
}

/// Hashes `path` with `algorithm`, reading in [`BLOCK_SIZE`] blocks.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> io::Result<String> {
    match algorithm {
        HashAlgorithm::Md5 => hash_file_with::<Md5>(path),
        HashAlgorithm::Sha256 => hash_file_with::<Sha256>(path),
    }
}

fn hash_file_with<D: Digest>(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buffer = [0u8; BLOCK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(to_hex(&hasher.finalize()))
}

/// Compares two files byte by byte in [`BLOCK_SIZE`] blocks.
///
/// Stops at the first differing block. Length differences surface as a
/// short read on one side.
pub fn compare_files(left: &Path, right: &Path) -> io::Result<bool> {
    let mut left_file = File::open(left)?;
    let mut right_file = File::open(right)?;

    let mut left_buf = [0u8; BLOCK_SIZE];
    let mut right_buf = [0u8; BLOCK_SIZE];

    loop {
        let left_read = read_full(&mut left_file, &mut left_buf)?;
        let right_read = read_full(&mut right_file, &mut right_buf)?;

        if left_read != right_read {
            return Ok(false);
        }
        if left_read == 0 {
            return Ok(true);
        }
        if left_buf[..left_read] != right_buf[..right_read] {
            return Ok(false);
        }
    }
}

/// Fills `buffer` as far as the reader allows, returning the byte count.
fn read_full(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buffer.len() {
        let read = reader.read(&mut buffer[total..])?;
        if read == 0 {
            break;
        }
        total += read;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).expect("create file");
        file.write_all(content).expect("write file");
        path
    }

    #[test]
    fn md5_matches_known_vector() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "abc.txt", b"abc");
        let digest = hash_file(&path, HashAlgorithm::Md5).expect("hash");
        assert_eq!(digest, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(digest.len(), HashAlgorithm::Md5.hex_len());
    }

    #[test]
    fn sha256_matches_known_vector() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "abc.txt", b"abc");
        let digest = hash_file(&path, HashAlgorithm::Sha256).expect("hash");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest.len(), HashAlgorithm::Sha256.hex_len());
    }

    #[test]
    fn hashing_spans_multiple_blocks() {
        let dir = TempDir::new().expect("tempdir");
        let content: Vec<u8> = (0..3 * BLOCK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        let path = write_file(&dir, "big.bin", &content);

        let streamed = hash_file(&path, HashAlgorithm::Md5).expect("hash");
        let one_shot = to_hex(&Md5::digest(&content));
        assert_eq!(streamed, one_shot);
    }

    #[test]
    fn hash_missing_file_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("missing");
        assert!(hash_file(&missing, HashAlgorithm::Md5).is_err());
    }

    #[test]
    fn compare_detects_equal_and_differing_content() {
        let dir = TempDir::new().expect("tempdir");
        let a = write_file(&dir, "a", b"identical content");
        let b = write_file(&dir, "b", b"identical content");
        let c = write_file(&dir, "c", b"identical-content");

        assert!(compare_files(&a, &b).expect("compare"));
        assert!(!compare_files(&a, &c).expect("compare"));
    }

    #[test]
    fn compare_detects_difference_past_first_block() {
        let dir = TempDir::new().expect("tempdir");
        let mut base: Vec<u8> = vec![0x5a; 2 * BLOCK_SIZE];
        let a = write_file(&dir, "a", &base);
        *base.last_mut().unwrap() = 0x5b;
        let b = write_file(&dir, "b", &base);

        assert!(!compare_files(&a, &b).expect("compare"));
    }

    #[test]
    fn compare_treats_prefix_as_mismatch() {
        let dir = TempDir::new().expect("tempdir");
        let a = write_file(&dir, "a", b"prefix and more");
        let b = write_file(&dir, "b", b"prefix");
        assert!(!compare_files(&a, &b).expect("compare"));
    }

    #[test]
    fn to_hex_is_lower_case() {
        assert_eq!(to_hex(&[0x00, 0xab, 0xff]), "00abff");
    }
}
