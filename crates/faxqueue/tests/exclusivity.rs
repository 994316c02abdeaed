//! At most one transmission is in flight, however many engines run.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{pdf_bytes, CountingGateway, TestHarness};
use faxqueue::{JobStatus, TransmissionChannel};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_engines_sharing_a_channel_never_overlap() {
    let harness = TestHarness::with_sqlite();
    let gateway = Arc::new(CountingGateway::new(Duration::from_millis(30)));

    let mut ids = Vec::new();
    for i in 0..6 {
        let path = harness.write_input(&format!("doc{}.pdf", i), &pdf_bytes());
        ids.push(harness.enqueue(path.to_string_lossy(), &format!("03-1234-000{}", i)).id);
    }

    let channel = TransmissionChannel::new();
    let first = harness.engine(gateway.clone()).with_channel(channel.clone());
    let second = harness.engine(gateway.clone()).with_channel(channel);

    tokio::join!(TestHarness::drain(&first), TestHarness::drain(&second));

    assert_eq!(gateway.max_concurrency(), 1);
    assert_eq!(gateway.sent().len(), 6, "each job is sent exactly once");
    for id in ids {
        assert_eq!(harness.job(&id).status, JobStatus::Completed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engines_built_separately_share_the_process_line() {
    let harness = TestHarness::new();
    let gateway = Arc::new(CountingGateway::new(Duration::from_millis(50)));

    for i in 0..6 {
        let path = harness.write_input(&format!("doc{}.pdf", i), &pdf_bytes());
        harness.enqueue(path.to_string_lossy(), "0432119261");
    }

    let first = harness.engine(gateway.clone());
    let second = harness.engine(gateway.clone());

    tokio::join!(TestHarness::drain(&first), TestHarness::drain(&second));

    assert_eq!(gateway.max_concurrency(), 1);
    assert_eq!(gateway.sent().len(), 6);
    assert_eq!(harness.store.queue_status().unwrap().completed, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_engines_drain_queue_one_at_a_time() {
    let harness = TestHarness::new();
    let gateway = Arc::new(CountingGateway::new(Duration::from_millis(10)));

    for i in 0..4 {
        let path = harness.write_input(&format!("doc{}.pdf", i), &pdf_bytes());
        harness.enqueue(path.to_string_lossy(), "0432119261");
    }

    let channel = TransmissionChannel::new();
    let (first, first_task) = harness
        .engine(gateway.clone())
        .with_channel(channel.clone())
        .spawn();
    let (second, second_task) = harness
        .engine(gateway.clone())
        .with_channel(channel)
        .spawn();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while harness.store.queue_status().unwrap().completed < 4 {
        assert!(tokio::time::Instant::now() < deadline, "queue did not drain");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    first.shutdown();
    second.shutdown();
    first_task.await.unwrap();
    second_task.await.unwrap();

    assert_eq!(gateway.max_concurrency(), 1);
    assert_eq!(gateway.sent().len(), 4);
}
