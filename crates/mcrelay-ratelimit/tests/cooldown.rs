//! Cooldown behaviour over (paused) time.

use std::time::Duration;

use mcrelay_ratelimit::RateLimiter;

const COOLDOWN: Duration = Duration::from_millis(2_000);

#[tokio::test(start_paused = true)]
async fn test_try_acquire_within_window_denied_then_permitted() {
    let mut limiter = RateLimiter::new();

    assert!(limiter.try_acquire("global", COOLDOWN));
    assert!(!limiter.try_acquire("global", COOLDOWN));

    tokio::time::advance(COOLDOWN).await;
    assert!(limiter.try_acquire("global", COOLDOWN));
}

#[tokio::test(start_paused = true)]
async fn test_denied_call_does_not_extend_cooldown() {
    let mut limiter = RateLimiter::new();
    assert!(limiter.try_acquire("global", COOLDOWN));

    tokio::time::advance(Duration::from_millis(1_500)).await;
    assert!(!limiter.try_acquire("global", COOLDOWN));

    tokio::time::advance(Duration::from_millis(500)).await;
    assert!(limiter.try_acquire("global", COOLDOWN));
}

#[tokio::test(start_paused = true)]
async fn test_keys_are_independent() {
    let mut limiter = RateLimiter::new();
    assert!(limiter.try_acquire("Steve".to_string(), COOLDOWN));
    assert!(limiter.try_acquire("Alex".to_string(), COOLDOWN));
    assert!(!limiter.try_acquire("Steve".to_string(), COOLDOWN));
    assert_eq!(limiter.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_remaining_counts_down() {
    let mut limiter = RateLimiter::new();
    limiter.try_acquire("global", COOLDOWN);

    tokio::time::advance(Duration::from_millis(750)).await;
    assert_eq!(
        limiter.remaining(&"global", COOLDOWN),
        Duration::from_millis(1_250)
    );

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(limiter.remaining(&"global", COOLDOWN), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_evict_idle_drops_only_stale_entries() {
    let mut limiter = RateLimiter::new();
    limiter.try_acquire("old", COOLDOWN);
    tokio::time::advance(Duration::from_secs(60)).await;
    limiter.try_acquire("fresh", COOLDOWN);

    let evicted = limiter.evict_idle(Duration::from_secs(30));

    assert_eq!(evicted, 1);
    assert_eq!(limiter.len(), 1);
    assert_eq!(limiter.remaining(&"fresh", COOLDOWN), COOLDOWN);
}
