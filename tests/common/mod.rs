/*!
 * Common test utilities for the instimem test suite
 */

use std::time::Duration;

use instimem::upload::{
    ProgressSimulation, SessionOptions, SourceFile, UploadId, UploadItem, UploadSessionManager,
};

pub mod gated_uploader;

pub const MIB: usize = 1024 * 1024;
pub const PDF: &str = "application/pdf";

/// Upper bound for any wait in the suite
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Route library logs to the test harness; safe to call repeatedly
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A PDF candidate of the given size
pub fn pdf(name: &str, size: usize) -> SourceFile {
    SourceFile::from_bytes(name, PDF, vec![0u8; size])
}

/// Options with a fast progress ticker so tests see several increments
pub fn fast_options() -> SessionOptions {
    SessionOptions {
        progress: ProgressSimulation {
            interval: Duration::from_millis(2),
            max_step: 30.0,
        },
        event_capacity: 4096,
    }
}

/// Wait until no item is pending or uploading
pub async fn settle(manager: &UploadSessionManager) {
    tokio::time::timeout(TEST_TIMEOUT, manager.wait_until_settled())
        .await
        .expect("uploads did not settle in time");
}

/// Wait until the item satisfies `condition`
pub async fn wait_for(
    manager: &UploadSessionManager,
    id: UploadId,
    condition: impl Fn(&UploadItem) -> bool,
) -> UploadItem {
    let mut events = manager.subscribe();
    let wait = async {
        loop {
            if let Some(item) = manager.get(id) {
                if condition(&item) {
                    return item;
                }
            }
            // lagging only means we re-check the snapshot
            let _ = events.recv().await;
        }
    };
    tokio::time::timeout(TEST_TIMEOUT, wait)
        .await
        .expect("item did not reach the expected state in time")
}

/// File names of the given items, in order
pub fn names(items: &[UploadItem]) -> Vec<String> {
    items.iter().map(|i| i.source_file().name().to_string()).collect()
}
