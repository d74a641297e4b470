/*!
 * Integration tests for the upload session manager
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use instimem::upload::{
    ALLOWED_MEDIA_TYPES, MAX_FILE_SIZE, PROGRESS_CEILING, SessionEvent, SourceFile, UploadId,
    UploadItem, UploadSessionManager, UploadStatus,
};
use instimem::uploader::{MockBehavior, MockUploader};

use crate::common::gated_uploader::GatedUploader;
use crate::common::{self, MIB, PDF, fast_options, names, pdf, settle, wait_for};

fn gated_session() -> (Arc<GatedUploader>, UploadSessionManager) {
    common::init_test_logging();
    let uploader = Arc::new(GatedUploader::new());
    let manager = UploadSessionManager::new(uploader.clone(), fast_options());
    (uploader, manager)
}

/// Invariants that must hold in every snapshot
fn assert_item_invariants(item: &UploadItem) {
    let name = item.source_file().name();
    assert!(
        (0.0..=100.0).contains(&item.progress()),
        "{} progress out of range: {}",
        name,
        item.progress()
    );
    assert_eq!(
        item.progress() == 100.0,
        item.status() == UploadStatus::Complete,
        "{}: progress 100 iff complete",
        name
    );
    assert_eq!(
        item.error_detail().is_some(),
        item.status() == UploadStatus::Error,
        "{}: error detail iff error",
        name
    );
    if item.status() == UploadStatus::Uploading {
        assert!(item.progress() < PROGRESS_CEILING, "{} reached the ceiling while uploading", name);
    }
}

#[tokio::test]
async fn test_pdfAndExecutable_shouldAdmitOnlyThePdf() {
    let (uploader, manager) = gated_session();
    let _gate = uploader.gate("report.pdf");

    let ids = manager.submit_files(vec![
        pdf("report.pdf", 2 * MIB),
        SourceFile::from_bytes("setup.exe", "application/x-msdownload", vec![0u8; MIB]),
    ]);

    assert_eq!(ids.len(), 1);
    let items = manager.items();
    assert_eq!(names(&items), vec!["report.pdf"]);
    assert_eq!(items[0].status(), UploadStatus::Uploading);
    assert_eq!(items[0].progress(), 0.0);
}

#[tokio::test]
async fn test_sixtyMegabytePdf_shouldCreateNoItem() {
    let (uploader, manager) = gated_session();

    let ids = manager.submit_files(vec![pdf("huge.pdf", 60 * MIB)]);

    assert!(ids.is_empty());
    assert!(manager.is_empty());
    settle(&manager).await;
    assert_eq!(uploader.calls(), 0);
}

#[tokio::test]
async fn test_mixedCandidates_shouldAdmitExactlyThePolicyMatches() {
    let (_uploader, manager) = gated_session();
    let limit = MAX_FILE_SIZE;
    let candidates = vec![
        SourceFile::metadata_only("a.pdf", PDF, 10),
        SourceFile::metadata_only("b.png", "image/png", 10),
        SourceFile::metadata_only("c.txt", "text/plain", limit),
        SourceFile::metadata_only("d.doc", "application/msword", limit + 1),
        SourceFile::metadata_only(
            "e.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            0,
        ),
        SourceFile::metadata_only("f.zip", "application/zip", 1),
    ];

    manager.submit_files(candidates);
    settle(&manager).await;

    let items = manager.items();
    assert_eq!(names(&items), vec!["a.pdf", "c.txt", "e.docx"]);
    for item in &items {
        let file = item.source_file();
        assert!(ALLOWED_MEDIA_TYPES.contains(&file.media_type()));
        assert!(file.size() <= MAX_FILE_SIZE);
    }
}

#[tokio::test]
async fn test_outOfOrderCompletion_shouldKeepSubmissionOrder() {
    let (uploader, manager) = gated_session();
    let first = uploader.gate("first.pdf");
    let second = uploader.gate("second.pdf");

    let ids = manager.submit_files(vec![pdf("first.pdf", 1024), pdf("second.pdf", 1024)]);

    second.send(Ok(())).unwrap();
    wait_for(&manager, ids[1], |item| item.status() == UploadStatus::Complete).await;
    assert_eq!(manager.get(ids[0]).unwrap().status(), UploadStatus::Uploading);
    assert_eq!(names(&manager.completed_items()), vec!["second.pdf"]);

    first.send(Ok(())).unwrap();
    settle(&manager).await;

    assert_eq!(names(&manager.completed_items()), vec!["first.pdf", "second.pdf"]);
    assert!(manager.active_items().is_empty());
}

#[tokio::test]
async fn test_rejectedUpload_shouldOnlyFailThatItem() {
    let (uploader, manager) = gated_session();
    let a = uploader.gate("a.pdf");
    let b = uploader.gate("b.pdf");
    let c = uploader.gate("c.pdf");

    let ids = manager.submit_files(vec![pdf("a.pdf", 10), pdf("b.pdf", 10), pdf("c.pdf", 10)]);
    b.send(Err("network timeout".to_string())).unwrap();
    a.send(Ok(())).unwrap();
    c.send(Ok(())).unwrap();
    settle(&manager).await;

    let failed = manager.get(ids[1]).unwrap();
    assert_eq!(failed.status(), UploadStatus::Error);
    assert_eq!(failed.error_detail(), Some("network timeout"));
    assert!(failed.progress() < 100.0);

    assert_eq!(manager.get(ids[0]).unwrap().status(), UploadStatus::Complete);
    assert_eq!(manager.get(ids[2]).unwrap().status(), UploadStatus::Complete);
    assert_eq!(names(&manager.active_items()), vec!["b.pdf"]);
    assert_eq!(names(&manager.completed_items()), vec!["a.pdf", "c.pdf"]);
}

#[tokio::test]
async fn test_emptyFailureMessage_shouldFallBackToGenericDetail() {
    let (uploader, manager) = gated_session();
    let gate = uploader.gate("a.pdf");
    let id = manager.submit_files(vec![pdf("a.pdf", 10)])[0];

    gate.send(Err(String::new())).unwrap();
    settle(&manager).await;

    assert_eq!(manager.get(id).unwrap().error_detail(), Some("Upload failed"));
}

async fn observe_invariants(manager: UploadSessionManager, files: Vec<SourceFile>) -> usize {
    let mut events = manager.subscribe();
    manager.submit_files(files);

    let mut last_progress: HashMap<UploadId, f64> = HashMap::new();
    let mut observed = 0;
    let observe = async {
        loop {
            for item in manager.items() {
                assert_item_invariants(&item);
                let previous = last_progress.insert(item.id(), item.progress()).unwrap_or(0.0);
                if item.status() == UploadStatus::Uploading {
                    assert!(item.progress() >= previous, "progress went backwards");
                }
            }
            if manager.is_settled() {
                break;
            }
            if events.recv().await.is_ok() {
                observed += 1;
            }
        }
    };
    tokio::time::timeout(common::TEST_TIMEOUT, observe).await.unwrap();
    observed
}

#[tokio::test]
async fn test_successfulUploads_shouldKeepInvariantsAtEveryEvent() {
    common::init_test_logging();
    let manager = UploadSessionManager::new(Arc::new(MockUploader::working(40)), fast_options());
    let files = vec![pdf("a.pdf", 10), pdf("b.pdf", 10), pdf("c.pdf", 10)];

    let observed = observe_invariants(manager.clone(), files).await;

    assert!(observed > 0);
    assert_eq!(manager.summary().complete, 3);
}

#[tokio::test]
async fn test_failingUploads_shouldKeepInvariantsAtEveryEvent() {
    common::init_test_logging();
    let uploader = MockUploader::new(MockBehavior::Failing {
        delay_ms: 40,
        message: "disk full".to_string(),
    });
    let manager = UploadSessionManager::new(Arc::new(uploader), fast_options());

    observe_invariants(manager.clone(), vec![pdf("a.pdf", 10), pdf("b.pdf", 10)]).await;

    assert_eq!(manager.summary().failed, 2);
    for item in manager.items() {
        assert_eq!(item.error_detail(), Some("disk full"));
    }
}

#[tokio::test]
async fn test_progressWhileUploading_shouldAdvanceButStayBelowCeiling() {
    let (uploader, manager) = gated_session();
    let gate = uploader.gate("slow.pdf");
    let id = manager.submit_files(vec![pdf("slow.pdf", 10)])[0];

    let item = wait_for(&manager, id, |item| item.progress() > 0.0).await;
    assert_eq!(item.status(), UploadStatus::Uploading);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let item = manager.get(id).unwrap();
    assert!(item.progress() > 0.0 && item.progress() < PROGRESS_CEILING);

    gate.send(Ok(())).unwrap();
    let item = wait_for(&manager, id, |item| item.status().is_terminal()).await;
    assert_eq!(item.progress(), 100.0);
}

#[tokio::test]
async fn test_activeAndCompleted_shouldPartitionTheCollectionInOrder() {
    let (uploader, manager) = gated_session();
    let _pending = uploader.gate("c.pdf");
    let failing = uploader.gate("d.pdf");

    manager.submit_files(vec![
        pdf("a.pdf", 10),
        pdf("b.pdf", 10),
        pdf("c.pdf", 10),
        pdf("d.pdf", 10),
        pdf("e.pdf", 10),
    ]);
    failing.send(Err("rejected".to_string())).unwrap();
    let ids: Vec<UploadId> = manager.items().iter().map(|i| i.id()).collect();
    for id in [ids[0], ids[1], ids[3], ids[4]] {
        wait_for(&manager, id, |item| item.status().is_terminal()).await;
    }

    let all = manager.items();
    let active = manager.active_items();
    let completed = manager.completed_items();

    assert_eq!(active.len() + completed.len(), all.len());
    assert_eq!(names(&active), vec!["c.pdf", "d.pdf"]);
    assert_eq!(names(&completed), vec!["a.pdf", "b.pdf", "e.pdf"]);
    assert!(active.iter().all(|i| !i.is_complete()));
    assert!(completed.iter().all(|i| i.is_complete()));
}

#[tokio::test]
async fn test_clearCompleted_shouldRemoveOnlyCompletedItems() {
    let (uploader, manager) = gated_session();
    let _held = uploader.gate("held.pdf");
    let broken = uploader.gate("broken.pdf");

    manager.submit_files(vec![
        pdf("done-1.pdf", 10),
        pdf("held.pdf", 10),
        pdf("broken.pdf", 10),
        pdf("done-2.pdf", 10),
    ]);
    broken.send(Err("bad file".to_string())).unwrap();
    let ids: Vec<UploadId> = manager.items().iter().map(|i| i.id()).collect();
    for id in [ids[0], ids[2], ids[3]] {
        wait_for(&manager, id, |item| item.status().is_terminal()).await;
    }

    let mut events = manager.subscribe();
    assert_eq!(manager.clear_completed(), 2);

    assert!(manager.completed_items().is_empty());
    assert_eq!(names(&manager.items()), vec!["held.pdf", "broken.pdf"]);
    // held.pdf keeps ticking, so skip its progress events
    let mut cleared = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Cleared { ids } = event {
            cleared.push(ids);
        }
    }
    assert_eq!(cleared, vec![vec![ids[0], ids[3]]]);

    // items added afterwards are unaffected by the earlier clear
    let later = manager.submit_files(vec![pdf("later.pdf", 10)])[0];
    wait_for(&manager, later, |item| item.is_complete()).await;
    assert_eq!(names(&manager.completed_items()), vec!["later.pdf"]);
}

#[tokio::test]
async fn test_removeItemTwice_shouldBeANoOpTheSecondTime() {
    let (_uploader, manager) = gated_session();
    let ids = manager.submit_files(vec![pdf("a.pdf", 10), pdf("b.pdf", 10)]);
    settle(&manager).await;

    assert!(manager.remove_item(ids[0]));
    assert!(!manager.remove_item(ids[0]));
    assert_eq!(names(&manager.items()), vec!["b.pdf"]);
    assert!(!manager.remove_item(UploadId::new()));
}

#[tokio::test]
async fn test_removeWhileUploading_shouldStopTickerAndDiscardLateResult() {
    let (uploader, manager) = gated_session();
    let gate = uploader.gate("a.pdf");
    let id = manager.submit_files(vec![pdf("a.pdf", 10)])[0];
    wait_for(&manager, id, |item| item.progress() > 0.0).await;

    let mut events = manager.subscribe();
    assert!(manager.remove_item(id));
    assert!(manager.is_settled());

    // give a leaked ticker plenty of chances to fire
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.send(Ok(())).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    // a tick may land between subscribing and removing, nothing after the removal
    assert_eq!(seen.last(), Some(&SessionEvent::Removed { id }));
    assert_eq!(
        seen.iter()
            .filter(|e| matches!(e, SessionEvent::Removed { .. }))
            .count(),
        1
    );
    assert!(manager.get(id).is_none());
    assert!(manager.is_empty());
    assert_eq!(uploader.calls(), 1);
}

#[tokio::test]
async fn test_manyConcurrentUploads_shouldAllComplete() {
    common::init_test_logging();
    let uploader = Arc::new(MockUploader::working(20));
    let manager = UploadSessionManager::new(uploader.clone(), fast_options());

    let files: Vec<SourceFile> = (0..25).map(|i| pdf(&format!("doc-{:02}.pdf", i), 128)).collect();
    let expected: Vec<String> = files.iter().map(|f| f.name().to_string()).collect();
    manager.submit_files(files);

    // every item is uploading at once before any completes
    assert_eq!(manager.summary().uploading, 25);

    settle(&manager).await;
    assert_eq!(uploader.request_count(), 25);
    assert_eq!(names(&manager.completed_items()), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_largeBatchOnWorkerThreads_shouldKeepInvariantsAndOrder() {
    common::init_test_logging();
    let uploader = Arc::new(MockUploader::working(30));
    let manager = UploadSessionManager::new(uploader.clone(), fast_options());

    let files: Vec<SourceFile> = (0..200).map(|i| pdf(&format!("doc-{:03}.pdf", i), 64)).collect();
    let expected: Vec<String> = files.iter().map(|f| f.name().to_string()).collect();

    observe_invariants(manager.clone(), files).await;

    assert_eq!(uploader.request_count(), 200);
    assert_eq!(manager.summary().complete, 200);
    assert_eq!(names(&manager.completed_items()), expected);
    for item in manager.items() {
        assert_eq!(item.progress(), 100.0);
    }
}

#[tokio::test]
async fn test_secondBatch_shouldAppendAfterFirst() {
    let (uploader, manager) = gated_session();
    let _held = uploader.gate("one.pdf");

    manager.submit_files(vec![pdf("one.pdf", 10)]);
    manager.submit_files(vec![pdf("two.pdf", 10), pdf("three.pdf", 10)]);

    assert_eq!(names(&manager.items()), vec!["one.pdf", "two.pdf", "three.pdf"]);
}
