//! Pending jobs are dispatched oldest first.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use common::{pdf_bytes, CountingGateway, TestHarness};
use faxqueue::NewJob;

fn enqueue_out_of_order(harness: &TestHarness) {
    let path = harness.write_input("doc.pdf", &pdf_bytes());
    let source = path.to_string_lossy().to_string();
    let t = |minute| Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap();

    // Inserted t3, t1, t2.
    for (minute, destination) in [(30, "t3"), (10, "t1"), (20, "t2")] {
        harness
            .store
            .create(NewJob::new(source.clone(), destination).with_created_at(t(minute)))
            .unwrap();
    }
}

#[tokio::test]
async fn dispatch_follows_created_at_in_memory() {
    let harness = TestHarness::new();
    enqueue_out_of_order(&harness);
    let gateway = Arc::new(CountingGateway::new(Duration::ZERO));

    TestHarness::drain(&harness.engine(gateway.clone())).await;

    assert_eq!(gateway.destinations(), vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn dispatch_follows_created_at_in_sqlite() {
    let harness = TestHarness::with_sqlite();
    enqueue_out_of_order(&harness);
    let gateway = Arc::new(CountingGateway::new(Duration::ZERO));

    TestHarness::drain(&harness.engine(gateway.clone())).await;

    assert_eq!(gateway.destinations(), vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn equal_timestamps_keep_insertion_order() {
    let harness = TestHarness::with_sqlite();
    let path = harness.write_input("doc.pdf", &pdf_bytes());
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    for destination in ["first", "second", "third"] {
        harness
            .store
            .create(NewJob::new(path.to_string_lossy(), destination).with_created_at(at))
            .unwrap();
    }
    let gateway = Arc::new(CountingGateway::new(Duration::ZERO));

    TestHarness::drain(&harness.engine(gateway.clone())).await;

    assert_eq!(gateway.destinations(), vec!["first", "second", "third"]);
}
