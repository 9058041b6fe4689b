use rna::core::queue::TaskQueue;
use rna::utils::RnaError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_results_follow_submission_order() {
    let mut queue = TaskQueue::new();

    // Later tasks finish first
    for i in 0..8u64 {
        queue.enqueue(move || async move {
            tokio::time::sleep(Duration::from_millis((8 - i) * 5)).await;
            Ok(i)
        });
    }

    let results = queue.run(8).await.unwrap();
    assert_eq!(results, (0..8).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    for limit in [1usize, 2, 5] {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut queue = TaskQueue::new();

        for i in 0..20usize {
            let running = running.clone();
            let peak = peak.clone();
            queue.enqueue(move || async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2 + (i % 3) as u64)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            });
        }

        let results = queue.run(limit).await.unwrap();
        assert_eq!(results.len(), 20);
        assert!(
            peak.load(Ordering::SeqCst) <= limit,
            "peak {} exceeded limit {}",
            peak.load(Ordering::SeqCst),
            limit
        );
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_failure_is_reported_and_stops_new_starts() {
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let mut queue = TaskQueue::new();

    for i in 0..10usize {
        let started = started.clone();
        let finished = finished.clone();
        queue.enqueue(move || async move {
            started.fetch_add(1, Ordering::SeqCst);
            if i == 1 {
                return Err(RnaError::Parse {
                    message: "boom".to_string(),
                    context: None,
                });
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(i)
        });
    }

    let err = queue.run(2).await.unwrap_err();
    match err {
        RnaError::TaskFailure { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, RnaError::Parse { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Task 0 was in flight; nothing after task 1 was started.
    assert_eq!(started.load(Ordering::SeqCst), 2);

    // The in-flight task is not cancelled and still completes.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_queue_is_reusable_between_runs() {
    let mut queue = TaskQueue::new();
    queue.enqueue(|| async { Ok("a") });
    assert_eq!(queue.run(1).await.unwrap(), vec!["a"]);

    queue.enqueue(|| async { Ok("b") });
    queue.enqueue(|| async { Ok("c") });
    assert_eq!(queue.run(4).await.unwrap(), vec!["b", "c"]);
}
