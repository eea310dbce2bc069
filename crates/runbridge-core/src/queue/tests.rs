use super::*;

fn queue() -> Arc<WorkQueue<String>> {
    Arc::new(WorkQueue::new(
        BackoffConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(1))
            .with_jitter(false),
    ))
}

#[tokio::test]
async fn test_add_deduplicates() {
    let q = queue();
    q.add("a".to_string());
    q.add("a".to_string());
    q.add("b".to_string());
    assert_eq!(q.len(), 2);

    assert_eq!(q.get().await.as_deref(), Some("a"));
    assert_eq!(q.get().await.as_deref(), Some("b"));
    assert!(q.is_empty());
}

#[tokio::test]
async fn test_key_is_never_handed_out_twice_concurrently() {
    let q = queue();
    q.add("a".to_string());
    let key = q.get().await.unwrap();

    // Re-added while processing: held back until done
    q.add("a".to_string());
    assert!(q.is_empty());

    q.done(&key);
    assert_eq!(q.len(), 1);
    assert_eq!(q.get().await.as_deref(), Some("a"));
}

#[tokio::test]
async fn test_done_without_readd_drops_key() {
    let q = queue();
    q.add("a".to_string());
    let key = q.get().await.unwrap();
    q.done(&key);
    assert!(q.is_empty());
}

#[test]
fn test_get_waits_for_add() {
    let q = queue();
    let mut get = tokio_test::task::spawn(q.get());
    tokio_test::assert_pending!(get.poll());

    q.add("late".to_string());
    assert!(get.is_woken());
    let got = tokio_test::assert_ready!(get.poll());
    assert_eq!(got.as_deref(), Some("late"));
}

#[tokio::test]
async fn test_shutdown_wakes_waiting_workers() {
    let q = queue();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.get().await })
        })
        .collect();

    tokio::task::yield_now().await;
    q.shut_down();

    for waiter in waiters {
        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(got.is_none());
    }
}

#[tokio::test]
async fn test_add_after_shutdown_is_ignored() {
    let q = queue();
    q.shut_down();
    assert!(q.is_shutting_down());
    q.add("a".to_string());
    assert!(q.is_empty());
    assert!(q.get().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_add_after_delays() {
    let q = queue();
    q.add_after("a".to_string(), Duration::from_secs(5));
    tokio::task::yield_now().await;
    assert!(q.is_empty());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(q.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_add_after_is_cancelled_by_shutdown() {
    let q = queue();
    q.add_after("a".to_string(), Duration::from_secs(5));
    q.shut_down();

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(q.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_backoff_grows_and_forget_resets() {
    let q = queue();
    let key = "a".to_string();

    assert_eq!(q.add_rate_limited(key.clone()), Duration::from_millis(100));
    assert_eq!(q.add_rate_limited(key.clone()), Duration::from_millis(200));
    assert_eq!(q.add_rate_limited(key.clone()), Duration::from_millis(400));
    assert_eq!(q.num_requeues(&key), 3);

    q.forget(&key);
    assert_eq!(q.num_requeues(&key), 0);
    assert_eq!(q.add_rate_limited(key.clone()), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_backoff_is_capped() {
    let q = queue();
    let key = "a".to_string();
    let last = (0..10)
        .map(|_| q.add_rate_limited(key.clone()))
        .last()
        .unwrap();
    assert_eq!(last, Duration::from_secs(1));
}
