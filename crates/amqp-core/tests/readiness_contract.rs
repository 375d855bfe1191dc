//! Contract Test: Readiness Poller
//!
//! Constraints verified:
//! - Polling stops on the first ready status
//! - A failed status ends the wait with the instance id and status
//! - Pending forever ends with a timeout at the deadline
//! - An instance that is not visible yet counts as pending

use amqp_core::{Error, ReadinessPoller};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn poller() -> ReadinessPoller {
    ReadinessPoller::new(
        Duration::from_secs(5),
        vec!["SERVING".to_string()],
        vec!["Failed".to_string()],
    )
}

/// Status source answering from a script, repeating the last entry
fn scripted(
    statuses: &[Option<&str>],
) -> (
    Arc<AtomicU32>,
    impl FnMut() -> std::future::Ready<amqp_core::Result<Option<String>>>,
) {
    let queue: VecDeque<Option<String>> = statuses
        .iter()
        .map(|s| s.map(str::to_string))
        .collect();
    let queue = Arc::new(Mutex::new(queue));
    let reads = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&reads);
    let refresh = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let mut queue = queue.lock().unwrap();
        let status = if queue.len() > 1 {
            queue.pop_front().flatten()
        } else {
            queue.front().cloned().flatten()
        };
        std::future::ready(Ok(status))
    };
    (reads, refresh)
}

#[tokio::test(start_paused = true)]
async fn stops_on_first_ready_status() {
    let (reads, refresh) = scripted(&[Some("DEPLOYING"), Some("DEPLOYING"), Some("SERVING")]);

    let started = Instant::now();
    let readiness = poller()
        .wait_for("amqp-1", started + Duration::from_secs(600), refresh)
        .await
        .unwrap();

    assert_eq!(readiness.status, "SERVING");
    assert_eq!(readiness.polls, 3);
    assert_eq!(reads.load(Ordering::SeqCst), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn failed_status_ends_wait() {
    let (reads, refresh) = scripted(&[Some("DEPLOYING"), Some("Failed")]);

    let err = poller()
        .wait_for("amqp-1", Instant::now() + Duration::from_secs(600), refresh)
        .await
        .unwrap_err();

    match err {
        Error::ReadinessFailed {
            instance_id,
            status,
        } => {
            assert_eq!(instance_id, "amqp-1");
            assert_eq!(status, "Failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn pending_forever_times_out_at_deadline() {
    let (reads, refresh) = scripted(&[Some("DEPLOYING")]);

    let budget = Duration::from_secs(30);
    let started = Instant::now();
    let err = poller()
        .wait_for("amqp-1", started + budget, refresh)
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert!(err.to_string().contains("amqp-1"));
    assert_eq!(started.elapsed(), budget);
    // Reads at 0, 5, ..., 30 seconds
    assert_eq!(reads.load(Ordering::SeqCst), 7);
}

#[tokio::test(start_paused = true)]
async fn invisible_instance_counts_as_pending() {
    let (_reads, refresh) = scripted(&[None, None, Some("SERVING")]);

    let readiness = poller()
        .wait_for("amqp-1", Instant::now() + Duration::from_secs(600), refresh)
        .await
        .unwrap();

    assert_eq!(readiness.polls, 3);
}

#[tokio::test(start_paused = true)]
async fn refresh_error_ends_wait() {
    let reads = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&reads);
    let refresh = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(Error::invalid_response("Data.Instances is not an array")))
    };

    let err = poller()
        .wait_for("amqp-1", Instant::now() + Duration::from_secs(600), refresh)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidResponse(_)));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn default_poller_targets_serving() {
    let (_reads, refresh) = scripted(&[Some("SERVING")]);

    let readiness = ReadinessPoller::default()
        .wait_for("amqp-1", Instant::now() + Duration::from_secs(1), refresh)
        .await
        .unwrap();

    assert_eq!(readiness.polls, 1);
}
