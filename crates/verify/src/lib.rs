#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Content verification between a source tree and its mirror.
//!
//! The [`Verifier`] decides whether a destination path faithfully mirrors its
//! source under a chosen [`VerifyMethod`], from a cheap size comparison up to
//! a streaming byte-wise compare. Hashing methods consult a concurrent cache
//! keyed by the file's `(size, mtime)` fingerprint so unchanged files are
//! never re-read.
//!
//! Directory verification walks both trees: every regular file under the
//! source is paired with its destination counterpart, files present only on
//! one side are reported, and the pair list can be checked by a bounded
//! worker pool.

mod cache;
mod hash;
mod verifier;

pub use cache::HashCache;
pub use hash::{to_hex, HashAlgorithm};
pub use verifier::{VerifyMethod, VerifyResult, Verifier};

/// Block size for all file reads, in bytes.
pub const BLOCK_SIZE: usize = 8 * 1024;
