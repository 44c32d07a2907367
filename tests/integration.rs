//! Library-level tests of integration passes and the background watcher.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use intake::config::Config;
use intake::error::WatchError;
use intake::integrator::Integrator;
use intake::models::{ExtractionSummary, FileCategory};
use intake::progress::NoReporter;
use intake::watcher::{WatchSchedule, Watcher};

fn setup() -> (TempDir, PathBuf, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("inbox");
    fs::create_dir_all(&root).unwrap();
    let config = Config::for_root(&root);
    (tmp, root, config)
}

fn write_zip(path: &Path, names: &[&str]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for name in names {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(name.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn empty_root_integrates_nothing() {
    let (_tmp, _root, config) = setup();
    let integrator = Integrator::open(config);

    let result = integrator.scan_once().unwrap();
    assert_eq!(result.new_count(), 0);
    assert_eq!(result.live_files, 0);
    assert_eq!(integrator.stats().total_integrated, 0);
}

#[test]
fn contact_line_is_summarised() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("contact.txt"), "contact a@b.com or 555-123-4567").unwrap();
    let integrator = Integrator::open(config);

    let result = integrator.scan_once().unwrap();
    assert_eq!(result.integrated, vec!["contact.txt".to_string()]);

    let entries = integrator.entries();
    match &entries[0].1.summary {
        ExtractionSummary::Text { emails, phones, .. } => {
            assert_eq!(emails, &vec!["a@b.com".to_string()]);
            assert!(!phones.is_empty());
        }
        other => panic!("expected text summary, got {:?}", other),
    }
}

#[test]
fn zip_with_three_files_reports_three() {
    let (tmp, root, config) = setup();
    write_zip(&root.join("bundle.zip"), &["a.txt", "b.txt", "c/d.txt"]);
    let integrator = Integrator::open(config);

    integrator.scan_once().unwrap();
    let entries = integrator.entries();
    match &entries[0].1.summary {
        ExtractionSummary::Archive {
            extracted_files,
            extract_path,
        } => {
            assert_eq!(*extracted_files, 3);
            assert_eq!(extract_path, &tmp.path().join("extracted").join("bundle"));
        }
        other => panic!("expected archive summary, got {:?}", other),
    }
}

#[test]
fn second_scan_without_changes_is_a_no_op() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("b.bin"), [1u8, 2, 3]).unwrap();
    let integrator = Integrator::open(config);

    assert_eq!(integrator.scan_once().unwrap().new_count(), 2);
    let second = integrator.scan_once().unwrap();
    assert_eq!(second.new_count(), 0);
    assert_eq!(second.live_files, 2);
    assert_eq!(integrator.stats().total_integrated, 2);
}

#[test]
fn copies_and_renames_are_not_reintegrated() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("original.md"), "# same bytes").unwrap();
    let integrator = Integrator::open(config);
    integrator.scan_once().unwrap();

    fs::copy(root.join("original.md"), root.join("copy.md")).unwrap();
    fs::create_dir_all(root.join("moved")).unwrap();
    fs::rename(root.join("original.md"), root.join("moved/renamed.txt")).unwrap();

    let result = integrator.scan_once().unwrap();
    assert_eq!(result.new_count(), 0);
    assert_eq!(integrator.stats().total_integrated, 1);
}

#[test]
fn identical_new_files_in_one_pass_count_once() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("a.txt"), "twin").unwrap();
    fs::write(root.join("b.txt"), "twin").unwrap();
    let integrator = Integrator::open(config);

    let result = integrator.scan_once().unwrap();
    assert_eq!(result.integrated, vec!["a.txt".to_string()]);
    let stats = integrator.stats();
    assert_eq!(stats.total_integrated, 1);
    assert_eq!(stats.processed_files, 1);
}

#[test]
fn total_never_decreases_when_files_are_deleted() {
    let (_tmp, root, config) = setup();
    for i in 0..3 {
        fs::write(root.join(format!("f{}.txt", i)), format!("file {}", i)).unwrap();
    }
    let integrator = Integrator::open(config);
    assert_eq!(integrator.scan_once().unwrap().total_integrated, 3);

    fs::remove_file(root.join("f0.txt")).unwrap();
    fs::remove_file(root.join("f1.txt")).unwrap();
    let result = integrator.scan_once().unwrap();
    assert_eq!(result.removed, 2);
    assert_eq!(result.live_files, 1);
    assert_eq!(result.total_integrated, 3);

    let stats = integrator.stats();
    assert_eq!(stats.total_integrated, 3);
    assert_eq!(stats.knowledge_size, 3);
}

#[test]
fn changed_content_at_same_path_is_integrated_again() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("notes.txt"), "first draft").unwrap();
    let integrator = Integrator::open(config);
    integrator.scan_once().unwrap();

    fs::write(root.join("notes.txt"), "second draft").unwrap();
    let result = integrator.scan_once().unwrap();
    assert_eq!(result.integrated, vec!["notes.txt".to_string()]);

    let stats = integrator.stats();
    assert_eq!(stats.total_integrated, 2);
    assert_eq!(stats.processed_files, 2);
    assert_eq!(stats.knowledge_size, 1);
}

#[test]
fn corrupt_archive_does_not_abort_the_batch() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("1.txt"), "one").unwrap();
    fs::write(root.join("2.md"), "two").unwrap();
    fs::write(root.join("3.bin"), [3u8; 8]).unwrap();
    write_zip(&root.join("4.zip"), &["inner.txt"]);
    fs::write(root.join("5.zip"), "definitely not a zip").unwrap();
    let integrator = Integrator::open(config);

    let result = integrator.scan_once().unwrap();
    assert_eq!(result.integrated.len(), 4);
    assert_eq!(result.failed, vec!["5.zip".to_string()]);
    assert_eq!(result.total_integrated, 5);

    let entries = integrator.entries();
    let (_, broken) = entries.iter().find(|(p, _)| p == "5.zip").unwrap();
    match &broken.summary {
        ExtractionSummary::Failed { category, error } => {
            assert_eq!(*category, FileCategory::Archive);
            assert!(!error.is_empty());
        }
        other => panic!("expected failed summary, got {:?}", other),
    }
}

#[test]
fn state_survives_reopen() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("keep.txt"), "persist me").unwrap();

    let first = Integrator::open(config.clone());
    first.scan_once().unwrap();
    assert!(config.watch.state_path.exists());
    drop(first);

    let second = Integrator::open(config);
    assert_eq!(second.stats().total_integrated, 1);
    assert_eq!(second.scan_once().unwrap().new_count(), 0);
}

#[test]
fn unreadable_state_starts_empty() {
    let (_tmp, root, config) = setup();
    fs::create_dir_all(config.watch.state_path.parent().unwrap()).unwrap();
    fs::write(&config.watch.state_path, "garbage").unwrap();
    fs::write(root.join("a.txt"), "a").unwrap();

    let integrator = Integrator::open(config);
    assert_eq!(integrator.stats().total_integrated, 0);
    assert_eq!(integrator.scan_once().unwrap().new_count(), 1);
}

#[test]
fn state_file_inside_root_is_never_integrated() {
    let (_tmp, root, mut config) = setup();
    config.watch.state_path = root.join("state.json");
    assert!(config.validate().is_err());
    fs::write(root.join("a.txt"), "alpha").unwrap();

    let integrator = Integrator::open(config);
    let counts: Vec<usize> = (0..4)
        .map(|_| integrator.scan_once().unwrap().new_count())
        .collect();
    assert_eq!(counts, vec![1, 0, 0, 0]);
    assert_eq!(integrator.stats().total_integrated, 1);
    assert!(root.join("state.json").exists());
}

#[test]
fn persist_failure_does_not_fail_the_pass() {
    let (tmp, root, mut config) = setup();
    let blocker = tmp.path().join("not-a-dir");
    fs::write(&blocker, "plain file").unwrap();
    config.watch.state_path = blocker.join("knowledge/state.json");
    fs::write(root.join("a.txt"), "alpha").unwrap();

    let integrator = Integrator::open(config);
    let result = integrator.scan_once().unwrap();
    assert_eq!(result.new_count(), 1);
    assert_eq!(result.total_integrated, 1);

    let stats = integrator.stats();
    assert_eq!(stats.total_integrated, 1);
    assert_eq!(stats.processed_files, 1);
    assert!(stats.last_scan_at.is_some());
    assert!(integrator.persist().is_err());
}

#[test]
fn missing_root_fails_the_pass() {
    let (_tmp, root, config) = setup();
    fs::remove_dir_all(&root).unwrap();
    let integrator = Integrator::open(config);
    assert!(matches!(
        integrator.scan_once(),
        Err(WatchError::RootMissing(_))
    ));
}

#[test]
fn stats_stay_consistent_during_a_scan() {
    let (_tmp, root, config) = setup();
    for i in 0..200 {
        fs::write(root.join(format!("doc{:03}.txt", i)), format!("document number {}", i))
            .unwrap();
    }
    let integrator = Arc::new(Integrator::open(config));

    let scanner = {
        let integrator = integrator.clone();
        std::thread::spawn(move || integrator.scan_once().unwrap())
    };

    let mut last = 0;
    while !scanner.is_finished() {
        let stats = integrator.stats();
        assert_eq!(stats.total_integrated as usize, stats.processed_files);
        assert_eq!(stats.processed_files, stats.knowledge_size);
        assert!(stats.total_integrated >= last);
        last = stats.total_integrated;
    }

    let result = scanner.join().unwrap();
    assert_eq!(result.new_count(), 200);
    assert_eq!(integrator.stats().total_integrated, 200);
}

#[test]
fn aggregates_collect_distinct_values() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("a.txt"), "x@example.com and y@example.com").unwrap();
    fs::write(root.join("b.txt"), "again x@example.com, call 555-000-1111").unwrap();
    let integrator = Integrator::open(config);
    integrator.scan_once().unwrap();

    assert_eq!(
        integrator.emails(),
        vec!["x@example.com".to_string(), "y@example.com".to_string()]
    );
    assert_eq!(integrator.phones(), vec!["555-000-1111".to_string()]);
    assert!(integrator.words().contains(&"again".to_string()));
}

// ============ Watcher ============

fn slow_schedule() -> WatchSchedule {
    WatchSchedule {
        interval: Duration::from_secs(3600),
        retry: Duration::from_secs(3600),
    }
}

fn watcher_for(config: Config) -> Watcher {
    Watcher::new(
        Arc::new(Integrator::open(config)),
        slow_schedule(),
        Box::new(NoReporter),
    )
}

async fn wait_for_passes(watcher: &Watcher, n: u64) {
    let mut passes = watcher.passes();
    tokio::time::timeout(Duration::from_secs(10), passes.wait_for(|count| *count >= n))
        .await
        .expect("watcher pass did not complete in time")
        .unwrap();
}

#[tokio::test]
async fn start_is_idempotent() {
    let (_tmp, root, config) = setup();
    fs::write(root.join("a.txt"), "a").unwrap();
    let watcher = watcher_for(config);

    assert!(watcher.start().unwrap());
    assert!(!watcher.start().unwrap());
    assert!(watcher.is_running());

    wait_for_passes(&watcher, 1).await;
    assert_eq!(*watcher.passes().borrow(), 1);
    assert_eq!(watcher.integrator().stats().total_integrated, 1);

    watcher.stop().await.unwrap();
    assert!(!watcher.is_running());
}

#[tokio::test]
async fn trigger_runs_a_pass_without_waiting_the_interval() {
    let (_tmp, root, config) = setup();
    let watcher = watcher_for(config);
    watcher.start().unwrap();
    wait_for_passes(&watcher, 1).await;
    assert_eq!(watcher.integrator().stats().total_integrated, 0);

    fs::write(root.join("late.txt"), "arrived later").unwrap();
    watcher.trigger();
    wait_for_passes(&watcher, 2).await;
    assert_eq!(watcher.integrator().stats().total_integrated, 1);

    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn stop_flushes_state_and_allows_restart() {
    let (_tmp, root, config) = setup();
    let state_path = config.watch.state_path.clone();
    fs::write(root.join("a.txt"), "a").unwrap();
    let watcher = watcher_for(config);

    watcher.start().unwrap();
    wait_for_passes(&watcher, 1).await;
    fs::remove_file(&state_path).unwrap();

    watcher.stop().await.unwrap();
    assert!(state_path.exists());

    assert!(watcher.start().unwrap());
    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn missing_root_is_fatal_at_start() {
    let (_tmp, root, config) = setup();
    fs::remove_dir_all(&root).unwrap();
    let watcher = watcher_for(config);

    let err = watcher.start().unwrap_err();
    assert!(err.is_fatal());
    assert!(!watcher.is_running());
}

#[tokio::test]
async fn failed_pass_is_retried_not_fatal() {
    let (_tmp, root, config) = setup();
    let watcher = watcher_for(config);
    watcher.start().unwrap();
    wait_for_passes(&watcher, 1).await;

    fs::remove_dir_all(&root).unwrap();
    watcher.trigger();
    wait_for_passes(&watcher, 2).await;
    assert!(watcher.is_running());

    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("back.txt"), "root is back").unwrap();
    watcher.trigger();
    wait_for_passes(&watcher, 3).await;
    assert_eq!(watcher.integrator().stats().total_integrated, 1);

    watcher.stop().await.unwrap();
}
