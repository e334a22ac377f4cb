//! Happy-path mirroring and engine lifecycle scenarios.

mod integration;

use std::fs;
use std::time::Duration;

use integration::helpers::*;
use manager::{Priority, SyncManager};

#[test]
fn synced_file_lands_with_content_mtime_and_journal_chain() {
    let dirs = MirrorDirs::new().expect("dirs");
    let source = dirs.write_source("a.txt", b"hello").expect("source");

    let (metrics, forwarder) = shared_metrics();
    let config = dirs.config().build().expect("config");
    let mapper = manager::RootPathMapper::new(dirs.source_root(), dirs.dest_root());
    let sync_manager =
        SyncManager::with_parts(config, Box::new(mapper), forwarder).expect("manager");
    sync_manager.start().expect("start");

    assert!(sync_manager.sync_file(&source, Priority::Normal));
    assert_eq!(metrics.count_of("file_queued"), 1);

    let dest = dirs.dest_root().join("a.txt");
    assert!(
        wait_until(Duration::from_secs(1), || metrics.count_of("tx_completed") == 1),
        "sync did not complete within a second"
    );
    sync_manager.stop();

    assert_eq!(fs::read(&dest).expect("mirrored file"), b"hello");

    // mtime carried over within a second.
    let source_mtime = fs::metadata(&source)
        .and_then(|meta| meta.modified())
        .expect("source mtime");
    let dest_mtime = fs::metadata(&dest)
        .and_then(|meta| meta.modified())
        .expect("dest mtime");
    let drift = source_mtime
        .duration_since(dest_mtime)
        .unwrap_or_else(|ahead| ahead.duration());
    assert!(drift <= Duration::from_secs(1), "mtime drift {drift:?}");

    // Journal chain: Pending, InProgress, Completed for one id.
    let completed = dirs.journal_lines_with_status(2);
    assert_eq!(completed.len(), 1);
    let tx_id = completed[0]["id"].as_str().expect("id").to_string();
    let chain: Vec<i64> = dirs
        .journal_lines()
        .into_iter()
        .filter(|line| line["id"].as_str() == Some(tx_id.as_str()))
        .map(|line| line["status"].as_i64().unwrap())
        .collect();
    assert_eq!(chain, vec![0, 1, 2]);
    assert_eq!(metrics.values_of("tx_completed"), vec![tx_id]);

    // Lifecycle metrics bracket the run.
    assert_eq!(
        metrics.values_of("sync_manager"),
        vec!["started".to_string(), "stopped".to_string()]
    );
}

#[test]
fn nested_paths_are_mirrored_with_parents() {
    let dirs = MirrorDirs::new().expect("dirs");
    let source = dirs
        .write_source("deep/tree/of/dirs/file.bin", &[7u8; 4096])
        .expect("source");

    let manager = SyncManager::new(dirs.config().build().expect("config")).expect("manager");
    manager.start().expect("start");
    assert!(manager.sync_file(&source, Priority::High));

    let dest = dirs.dest_root().join("deep/tree/of/dirs/file.bin");
    assert!(wait_until(Duration::from_secs(1), || dest.is_file()));
    manager.stop();
    assert_eq!(fs::read(&dest).expect("mirrored").len(), 4096);
}

#[test]
fn stop_twice_and_start_twice_are_no_ops() {
    let dirs = MirrorDirs::new().expect("dirs");
    let (metrics, forwarder) = shared_metrics();
    let mapper = manager::RootPathMapper::new(dirs.source_root(), dirs.dest_root());
    let manager = SyncManager::with_parts(
        dirs.config().build().expect("config"),
        Box::new(mapper),
        forwarder,
    )
    .expect("manager");

    manager.start().expect("start");
    manager.start().expect("restart no-op");
    manager.stop();
    manager.stop();

    assert_eq!(
        metrics.values_of("sync_manager"),
        vec!["started".to_string(), "stopped".to_string()]
    );
}

#[test]
fn unopenable_journal_is_fatal_at_construction() {
    let dirs = MirrorDirs::new().expect("dirs");
    // Block the journal directory with a regular file.
    fs::write(dirs.log_dir(), b"in the way").expect("blocker");

    let config = dirs.config().build().expect("config");
    assert!(SyncManager::new(config).is_err());
}

#[test]
fn sync_file_against_stopped_manager_fails() {
    let dirs = MirrorDirs::new().expect("dirs");
    let source = dirs.write_source("late.txt", b"late").expect("source");

    let manager = SyncManager::new(dirs.config().build().expect("config")).expect("manager");
    manager.start().expect("start");
    manager.stop();

    assert!(!manager.sync_file(&source, Priority::Normal));
}
