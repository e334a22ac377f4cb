//! File and directory verification.

use std::fmt;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::cache::HashCache;
use crate::hash::{self, HashAlgorithm};

/// How thoroughly a source/destination pair is compared, cheapest first.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VerifyMethod {
    /// File sizes must be equal.
    SizeOnly,
    /// Modification times must agree within one second (sizes must match
    /// regardless).
    Timestamp,
    /// MD5 digests over the full content must be equal.
    #[default]
    FastHash,
    /// SHA-256 digests over the full content must be equal.
    StrongHash,
    /// Streaming byte-wise comparison.
    FullCompare,
}

impl VerifyMethod {
    /// The digest algorithm this method hashes with, if any.
    #[must_use]
    pub const fn algorithm(self) -> Option<HashAlgorithm> {
        match self {
            VerifyMethod::FastHash => Some(HashAlgorithm::Md5),
            VerifyMethod::StrongHash => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for VerifyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerifyMethod::SizeOnly => "size-only",
            VerifyMethod::Timestamp => "timestamp",
            VerifyMethod::FastHash => "fast-hash",
            VerifyMethod::StrongHash => "strong-hash",
            VerifyMethod::FullCompare => "full-compare",
        };
        f.write_str(name)
    }
}

/// Outcome of a single verification.
#[derive(Clone, Debug)]
pub struct VerifyResult {
    /// Whether the destination faithfully mirrors the source.
    pub matches: bool,
    /// Hex digest of the source content; empty when the method did not hash.
    pub source_hash: String,
    /// Hex digest of the destination content; empty when the method did not
    /// hash.
    pub dest_hash: String,
    /// Human-readable mismatch reason; empty exactly when `matches` is true.
    pub error_message: String,
    /// Elapsed wall time of the verification.
    pub duration: Duration,
}

impl VerifyResult {
    /// A successful comparison.
    #[must_use]
    pub fn matched() -> Self {
        Self {
            matches: true,
            source_hash: String::new(),
            dest_hash: String::new(),
            error_message: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// A failed comparison with the given reason.
    #[must_use]
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self {
            matches: false,
            source_hash: String::new(),
            dest_hash: String::new(),
            error_message: message.into(),
            duration: Duration::ZERO,
        }
    }
}

/// Verifies that destination paths mirror their sources.
///
/// Hashing methods go through an internal [`HashCache`] so repeated
/// verification of unchanged files skips the content read. The verifier is
/// safe to share across threads.
#[derive(Debug, Default)]
pub struct Verifier {
    cache: HashCache,
}

impl Verifier {
    /// Creates a verifier with an empty hash cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `source` against `dest` under `method`.
    ///
    /// Never returns an error: missing files, size mismatches and I/O
    /// failures are all reported through the result's `error_message`.
    pub fn verify(&self, source: &Path, dest: &Path, method: VerifyMethod) -> VerifyResult {
        let started = Instant::now();
        let mut result = self.verify_inner(source, dest, method);
        result.duration = started.elapsed();
        result
    }

    fn verify_inner(&self, source: &Path, dest: &Path, method: VerifyMethod) -> VerifyResult {
        let Ok(source_meta) = fs::metadata(source) else {
            return VerifyResult::mismatch("Source file does not exist");
        };
        let Ok(dest_meta) = fs::metadata(dest) else {
            return VerifyResult::mismatch("Destination file does not exist");
        };

        // Size inequality is a mismatch for every method.
        if source_meta.len() != dest_meta.len() {
            return VerifyResult::mismatch("File sizes don't match");
        }

        match method {
            VerifyMethod::SizeOnly => VerifyResult::matched(),
            VerifyMethod::Timestamp => {
                Self::verify_timestamps(source, &source_meta, dest, &dest_meta)
            }
            VerifyMethod::FastHash | VerifyMethod::StrongHash => {
                let algorithm = method
                    .algorithm()
                    .expect("hashing methods carry an algorithm");
                self.verify_hashes(source, &source_meta, dest, &dest_meta, algorithm)
            }
            VerifyMethod::FullCompare => match hash::compare_files(source, dest) {
                Ok(true) => VerifyResult::matched(),
                Ok(false) => VerifyResult::mismatch("File contents don't match"),
                Err(error) => VerifyResult::mismatch(format!("Comparison failed: {error}")),
            },
        }
    }

    fn verify_timestamps(
        source: &Path,
        source_meta: &Metadata,
        dest: &Path,
        dest_meta: &Metadata,
    ) -> VerifyResult {
        let source_mtime = match source_meta.modified() {
            Ok(mtime) => mtime,
            Err(error) => {
                return VerifyResult::mismatch(format!(
                    "Failed to read mtime of {}: {error}",
                    source.display()
                ));
            }
        };
        let dest_mtime = match dest_meta.modified() {
            Ok(mtime) => mtime,
            Err(error) => {
                return VerifyResult::mismatch(format!(
                    "Failed to read mtime of {}: {error}",
                    dest.display()
                ));
            }
        };

        let drift = source_mtime
            .duration_since(dest_mtime)
            .unwrap_or_else(|ahead| ahead.duration());
        if drift <= Duration::from_secs(1) {
            VerifyResult::matched()
        } else {
            VerifyResult::mismatch("Timestamps don't match within threshold")
        }
    }

    fn verify_hashes(
        &self,
        source: &Path,
        source_meta: &Metadata,
        dest: &Path,
        dest_meta: &Metadata,
        algorithm: HashAlgorithm,
    ) -> VerifyResult {
        let source_hash = match self.hash_cached(source, source_meta, algorithm) {
            Ok(hash) => hash,
            Err(error) => {
                return VerifyResult::mismatch(format!(
                    "Failed to hash {}: {error}",
                    source.display()
                ));
            }
        };
        let dest_hash = match self.hash_cached(dest, dest_meta, algorithm) {
            Ok(hash) => hash,
            Err(error) => {
                return VerifyResult::mismatch(format!(
                    "Failed to hash {}: {error}",
                    dest.display()
                ));
            }
        };

        let mut result = if source_hash == dest_hash {
            VerifyResult::matched()
        } else {
            VerifyResult::mismatch(format!("{algorithm} checksums don't match"))
        };
        result.source_hash = source_hash;
        result.dest_hash = dest_hash;
        result
    }

    /// Hashes `path`, reusing the cached digest while the `(size, mtime)`
    /// fingerprint is unchanged.
    fn hash_cached(
        &self,
        path: &Path,
        meta: &Metadata,
        algorithm: HashAlgorithm,
    ) -> io::Result<String> {
        let size = meta.len();
        let mtime = meta.modified()?;

        if let Some(hash) = self.cache.lookup(path, algorithm, size, mtime) {
            return Ok(hash);
        }

        let hash = hash::hash_file(path, algorithm)?;
        self.cache.insert(path, algorithm, size, mtime, hash.clone());
        Ok(hash)
    }

    /// Verifies every regular file under `source_root` against its mirror
    /// under `dest_root`.
    ///
    /// Returns `(relative_path, result)` pairs. Files missing on the
    /// destination side report `"File missing in destination"`; files present
    /// only on the destination side report `"Extra file in destination"`.
    /// With `parallel` set, the pair list is drained by `max_threads` scoped
    /// workers; worker `w` takes pairs `w`, `w + threads`, `w + 2*threads`
    /// and so on, so no shared cursor is needed.
    pub fn verify_directory(
        &self,
        source_root: &Path,
        dest_root: &Path,
        method: VerifyMethod,
        parallel: bool,
        max_threads: usize,
    ) -> Vec<(PathBuf, VerifyResult)> {
        if !source_root.is_dir() {
            return vec![(
                PathBuf::new(),
                VerifyResult::mismatch("Source directory does not exist or is not a directory"),
            )];
        }
        if !dest_root.is_dir() {
            return vec![(
                PathBuf::new(),
                VerifyResult::mismatch(
                    "Destination directory does not exist or is not a directory",
                ),
            )];
        }

        let mut results = Vec::new();
        let mut pairs = Vec::new();

        for relative in collect_regular_files(source_root) {
            if dest_root.join(&relative).is_file() {
                pairs.push(relative);
            } else {
                results.push((relative, VerifyResult::mismatch("File missing in destination")));
            }
        }

        for relative in collect_regular_files(dest_root) {
            if !source_root.join(&relative).is_file() {
                results.push((relative, VerifyResult::mismatch("Extra file in destination")));
            }
        }

        if parallel && pairs.len() > 1 {
            let threads = max_threads.max(1).min(pairs.len());
            let shared = Mutex::new(&mut results);

            thread::scope(|scope| {
                for worker in 0..threads {
                    let pairs = &pairs;
                    let shared = &shared;
                    scope.spawn(move || {
                        for index in (worker..pairs.len()).step_by(threads) {
                            let relative = &pairs[index];
                            let outcome = self.verify(
                                &source_root.join(relative),
                                &dest_root.join(relative),
                                method,
                            );
                            shared
                                .lock()
                                .expect("verify results mutex poisoned")
                                .push((relative.clone(), outcome));
                        }
                    });
                }
            });
        } else {
            for relative in pairs {
                let outcome = self.verify(
                    &source_root.join(&relative),
                    &dest_root.join(&relative),
                    method,
                );
                results.push((relative, outcome));
            }
        }

        results
    }

    /// Number of entries currently in the hash cache.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached hash.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The underlying cache, exposed for inspection.
    #[must_use]
    pub fn cache(&self) -> &HashCache {
        &self.cache
    }
}

/// Collects the relative paths of all regular files under `root`.
///
/// Unreadable directories are skipped with a warning so one bad subtree does
/// not abort a reconciliation pass.
fn collect_regular_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![PathBuf::new()];

    while let Some(prefix) = stack.pop() {
        let dir = root.join(&prefix);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(path = %dir.display(), %error, "skipping unreadable directory");
                continue;
            }
        };

        let mut names: Vec<_> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.file_name()),
                Err(error) => {
                    warn!(path = %dir.display(), %error, "skipping unreadable entry");
                    None
                }
            })
            .collect();
        names.sort();

        for name in names {
            let relative = prefix.join(&name);
            match fs::symlink_metadata(root.join(&relative)) {
                Ok(meta) if meta.is_dir() => stack.push(relative),
                Ok(meta) if meta.is_file() => files.push(relative),
                _ => {}
            }
        }
    }

    files.sort();
    files
}
