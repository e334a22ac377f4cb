//! Change notification sources.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

/// One detected filesystem change.
///
/// `action` is an opaque label the engine never interprets; `mask` carries
/// whatever the underlying notification API reported, zero otherwise.
#[derive(Clone, Debug)]
pub struct FsEvent {
    /// Path the change was observed on.
    pub path: PathBuf,
    /// Free-form action label, e.g. `"modified"`.
    pub action: String,
    /// When the change was detected.
    pub timestamp: SystemTime,
    /// Raw event mask from the notification API, if any.
    pub mask: u32,
}

/// Callback invoked for each detected change.
pub type ChangeCallback = Box<dyn Fn(&Path) + Send>;

/// Pushes filesystem change notifications into the engine.
///
/// The engine only consumes the pushed stream; how changes are detected
/// (kernel API, polling, test injection) is up to the implementation.
pub trait ChangeSource: Send {
    /// Registers a callback invoked once per detected change.
    fn set_callback(&mut self, callback: ChangeCallback);
    /// Starts watching `path` (a file or a directory tree).
    fn add_watch(&mut self, path: &Path);
    /// Stops watching `path`.
    fn remove_watch(&mut self, path: &Path);
    /// Pops the next queued event, if any.
    fn next_event(&mut self) -> Option<FsEvent>;
    /// Whether the event queue is empty.
    fn empty(&self) -> bool;
    /// Stops the source; no further events are produced.
    fn stop(&mut self);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct FileStamp {
    size: u64,
    mtime: SystemTime,
}

/// Change source that diffs `(size, mtime)` snapshots of the watched trees.
///
/// Adding a watch primes its snapshot without emitting events, so only
/// changes after the watch was added are reported. Call
/// [`poll`](Self::poll) on whatever cadence the process can afford; each
/// poll appends `created` / `modified` / `removed` events and fires the
/// registered callback.
#[derive(Default)]
pub struct PollingChangeSource {
    watches: Vec<PathBuf>,
    snapshot: HashMap<PathBuf, FileStamp>,
    events: VecDeque<FsEvent>,
    callback: Option<ChangeCallback>,
    stopped: bool,
}

impl PollingChangeSource {
    /// Creates a source with no watches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans every watched tree and queues events for observed differences.
    /// Returns the number of new events.
    pub fn poll(&mut self) -> usize {
        if self.stopped {
            return 0;
        }

        let mut current = HashMap::new();
        for watch in &self.watches {
            stamp_tree(watch, &mut current);
        }

        let mut produced = 0;
        for (path, stamp) in &current {
            match self.snapshot.get(path) {
                None => {
                    produced += self.push_event(path.clone(), "created");
                }
                Some(previous) if previous != stamp => {
                    produced += self.push_event(path.clone(), "modified");
                }
                Some(_) => {}
            }
        }
        let removed: Vec<PathBuf> = self
            .snapshot
            .keys()
            .filter(|path| !current.contains_key(*path))
            .cloned()
            .collect();
        for path in removed {
            produced += self.push_event(path, "removed");
        }

        self.snapshot = current;
        produced
    }

    fn push_event(&mut self, path: PathBuf, action: &str) -> usize {
        debug!(path = %path.display(), action, "change detected");
        if let Some(callback) = &self.callback {
            callback(&path);
        }
        self.events.push_back(FsEvent {
            path,
            action: action.to_string(),
            timestamp: SystemTime::now(),
            mask: 0,
        });
        1
    }
}

impl ChangeSource for PollingChangeSource {
    fn set_callback(&mut self, callback: ChangeCallback) {
        self.callback = Some(callback);
    }

    fn add_watch(&mut self, path: &Path) {
        if self.watches.iter().any(|watch| watch == path) {
            return;
        }
        let watch = path.to_path_buf();
        // Prime the snapshot so pre-existing files don't fire as created.
        stamp_tree(&watch, &mut self.snapshot);
        self.watches.push(watch);
    }

    fn remove_watch(&mut self, path: &Path) {
        self.watches.retain(|watch| watch != path);
        self.snapshot
            .retain(|stamped, _| !stamped.starts_with(path));
    }

    fn next_event(&mut self) -> Option<FsEvent> {
        self.events.pop_front()
    }

    fn empty(&self) -> bool {
        self.events.is_empty()
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Records the `(size, mtime)` stamp of every regular file under `path`.
fn stamp_tree(path: &Path, into: &mut HashMap<PathBuf, FileStamp>) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };

    if meta.is_file() {
        if let Ok(mtime) = meta.modified() {
            into.insert(
                path.to_path_buf(),
                FileStamp {
                    size: meta.len(),
                    mtime,
                },
            );
        }
        return;
    }

    if meta.is_dir() {
        let Ok(entries) = fs::read_dir(path) else {
            return;
        };
        for entry in entries.flatten() {
            stamp_tree(&entry.path(), into);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn pre_existing_files_do_not_fire() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("old.txt"), b"old").expect("write");

        let mut source = PollingChangeSource::new();
        source.add_watch(dir.path());
        assert_eq!(source.poll(), 0);
        assert!(source.empty());
    }

    #[test]
    fn created_modified_and_removed_are_detected() {
        let dir = TempDir::new().expect("tempdir");
        let mut source = PollingChangeSource::new();
        source.add_watch(dir.path());

        fs::write(dir.path().join("new.txt"), b"v1").expect("write");
        assert_eq!(source.poll(), 1);
        let event = source.next_event().expect("created event");
        assert_eq!(event.action, "created");
        assert_eq!(event.path, dir.path().join("new.txt"));

        // Different size guarantees the stamp changes even on coarse mtime.
        fs::write(dir.path().join("new.txt"), b"version two").expect("write");
        assert_eq!(source.poll(), 1);
        assert_eq!(source.next_event().expect("modified event").action, "modified");

        fs::remove_file(dir.path().join("new.txt")).expect("remove");
        assert_eq!(source.poll(), 1);
        assert_eq!(source.next_event().expect("removed event").action, "removed");
        assert!(source.empty());
    }

    #[test]
    fn nested_files_are_watched() {
        let dir = TempDir::new().expect("tempdir");
        let mut source = PollingChangeSource::new();
        source.add_watch(dir.path());

        fs::create_dir_all(dir.path().join("a/b")).expect("mkdir");
        fs::write(dir.path().join("a/b/deep.txt"), b"x").expect("write");
        assert_eq!(source.poll(), 1);
        assert_eq!(
            source.next_event().expect("event").path,
            dir.path().join("a/b/deep.txt")
        );
    }

    #[test]
    fn callback_fires_per_change() {
        let dir = TempDir::new().expect("tempdir");
        let mut source = PollingChangeSource::new();
        source.add_watch(dir.path());

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        source.set_callback(Box::new(move |_path| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        fs::write(dir.path().join("a.txt"), b"a").expect("write");
        fs::write(dir.path().join("b.txt"), b"b").expect("write");
        assert_eq!(source.poll(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removed_watch_goes_quiet() {
        let dir = TempDir::new().expect("tempdir");
        let mut source = PollingChangeSource::new();
        source.add_watch(dir.path());
        source.remove_watch(dir.path());

        fs::write(dir.path().join("ignored.txt"), b"x").expect("write");
        assert_eq!(source.poll(), 0);
    }

    #[test]
    fn stopped_source_produces_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let mut source = PollingChangeSource::new();
        source.add_watch(dir.path());
        source.stop();

        fs::write(dir.path().join("late.txt"), b"x").expect("write");
        assert_eq!(source.poll(), 0);
        assert!(source.next_event().is_none());
    }

    #[test]
    fn duplicate_watches_are_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let mut source = PollingChangeSource::new();
        source.add_watch(dir.path());
        source.add_watch(dir.path());

        fs::write(dir.path().join("once.txt"), b"x").expect("write");
        assert_eq!(source.poll(), 1);
    }
}
