mod common;

use std::sync::Arc;
use std::time::Duration;

use asset_upload_rs::cancel::CauseToken;
use asset_upload_rs::dryrun::DryRunPipeline;
use asset_upload_rs::events::EventCounters;
use asset_upload_rs::render::{OutputMode, ProgressReporter};
use asset_upload_rs::supervisor::{Outcome, Supervisor};
use asset_upload_rs::types::EventCode;
use common::SharedBuf;

fn supervisor(root: &std::path::Path, err: &SharedBuf) -> (Supervisor<DryRunPipeline>, Arc<EventCounters>) {
    let events = Arc::new(EventCounters::new());
    let pipeline = Arc::new(DryRunPipeline::new(root, events.clone(), 4));
    let reporter = ProgressReporter::with_writers(
        OutputMode::Text,
        Box::new(SharedBuf::default()),
        Box::new(err.clone()),
    );
    let sup = Supervisor::new(pipeline, events.clone(), reporter).with_tick(Duration::from_secs(3600));
    (sup, events)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dry_run_walks_nested_folders() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("2024");
    std::fs::create_dir(&sub).unwrap();
    std::fs::create_dir(dir.path().join(".thumbs")).unwrap();
    std::fs::write(dir.path().join("a.jpg"), b"12345").unwrap();
    std::fs::write(dir.path().join("a.xmp"), b"x").unwrap();
    std::fs::write(sub.join("b.mp4"), b"123").unwrap();
    std::fs::write(sub.join("readme.txt"), b"hi").unwrap();
    std::fs::write(dir.path().join(".thumbs").join("c.jpg"), b"skip").unwrap();

    let err = SharedBuf::default();
    let (sup, events) = supervisor(dir.path(), &err);
    let report = sup.run(CauseToken::new()).await;

    assert_eq!(report.outcome, Outcome::Success);
    let s = events.snapshot();
    assert_eq!(s.assets_found(), 2);
    assert_eq!(s.uploaded(), 2);
    assert_eq!(s.size(EventCode::UploadSuccess), 8);
    assert_eq!(s.count(EventCode::DiscoveredUnsupported), 1);
    assert_eq!(
        err.lines(),
        vec!["Remote read 100%, Assets found: 2, Upload errors: 0, Uploaded 2".to_string()]
    );
}

#[tokio::test]
async fn missing_source_aborts_before_upload() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");

    let err = SharedBuf::default();
    let (sup, events) = supervisor(&missing, &err);
    let report = sup.run(CauseToken::new()).await;

    assert_eq!(report.outcome, Outcome::Aborted);
    let msg = format!("{:#}", report.cause.unwrap());
    assert!(msg.contains("cannot read source"), "{msg}");
    assert_eq!(events.snapshot().uploaded(), 0);
    assert_eq!(err.lines().len(), 1);
}
