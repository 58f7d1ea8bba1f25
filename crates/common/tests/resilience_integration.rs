//! Integration tests for the composed resilience stack: circuit breaker
//! around retry around timeout, plus breaker fallbacks against the offline
//! queue.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use prismflow_common::{
    ActionKind, BackoffKind, CallOutcome, CircuitBreaker, CircuitBreakerConfig, FallbackPlan,
    FixedRandom, MockClock, OfflineAction, OfflineQueue, Priority, QueueConfig, RetryConfig,
    RetryExecutor, TimeoutExecutor,
};
use prismflow_domain::{PrismError, Result};

/// Submit fails twice with HTTP 503 then succeeds on the third attempt
/// (max_attempts = 3, exponential, base = 100ms): the stack returns success
/// after roughly 300ms of backoff and no exhaustion error surfaces.
#[tokio::test]
async fn test_transient_failures_absorbed_by_retry() {
    let breaker = CircuitBreaker::new("external-ai-api", CircuitBreakerConfig::default())
        .expect("valid config");
    let retry = RetryExecutor::with_random(
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            strategy: BackoffKind::Exponential,
            ..RetryConfig::default()
        },
        Arc::new(FixedRandom::constant(0.0)),
    );
    let timeout = TimeoutExecutor::new(Duration::from_secs(1));

    let calls = Arc::new(AtomicU32::new(0));
    let calls_outer = Arc::clone(&calls);

    let started = Instant::now();
    let result = breaker
        .execute(|| {
            let retry = &retry;
            let timeout = &timeout;
            let calls = Arc::clone(&calls_outer);
            async move {
                retry
                    .execute("submit", move |_attempt| {
                        let calls = Arc::clone(&calls);
                        let timeout = timeout.clone();
                        async move {
                            timeout
                                .run("submit", move |_token| async move {
                                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                                        Err(PrismError::api(503, "service unavailable"))
                                    } else {
                                        Ok("job-123".to_string())
                                    }
                                })
                                .await
                        }
                    })
                    .await
            }
        })
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.expect("third attempt succeeds"), "job-123");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Backoff slept 100ms then 200ms.
    assert!(elapsed >= Duration::from_millis(290), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
}

/// Three failures within a 10s window trip a threshold-3 breaker; the
/// fourth call short-circuits with `CircuitOpen` without attempting I/O.
#[tokio::test]
async fn test_breaker_short_circuits_within_window() {
    let clock = MockClock::new();
    let breaker = CircuitBreaker::with_clock(
        "external-ai-api",
        CircuitBreakerConfig {
            failure_threshold: 3,
            monitoring_window: Duration::from_secs(10),
            recovery_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        },
        Arc::new(clock.clone()),
    )
    .expect("valid config");

    for _ in 0..3 {
        clock.advance(Duration::from_millis(600));
        let result: Result<()> = breaker
            .execute(|| async { Err(PrismError::network("connection refused")) })
            .await;
        assert!(result.is_err());
    }

    let io_attempted = Arc::new(AtomicU32::new(0));
    let io = Arc::clone(&io_attempted);
    let result: Result<()> = breaker
        .execute(|| async move {
            io.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

    match result {
        Err(PrismError::CircuitOpen { service, .. }) => assert_eq!(service, "external-ai-api"),
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(io_attempted.load(Ordering::SeqCst), 0);
}

/// With the `Enqueue` fallback, an open breaker hands the request to the
/// offline queue and reports it as queued instead of failing.
#[tokio::test]
async fn test_open_breaker_enqueues_fallback_action() {
    let breaker = CircuitBreaker::new(
        "external-ai-api",
        CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        },
    )
    .expect("valid config");

    let queue = Arc::new(
        OfflineQueue::open(QueueConfig::default())
            .await
            .expect("queue opens"),
    );

    // Trip the breaker.
    let _: Result<()> = breaker
        .execute(|| async { Err(PrismError::network("down")) })
        .await;

    let plan: FallbackPlan<String> = FallbackPlan::Enqueue {
        queue: Arc::clone(&queue),
        make_action: Arc::new(|| {
            OfflineAction::new(
                ActionKind::SubmitJob,
                serde_json::json!({"transform": "upscale"}),
                Priority::Critical,
                0,
            )
        }),
    };

    let outcome = breaker
        .execute_with_fallback(|| async { Ok("never".to_string()) }, &plan)
        .await
        .expect("queued outcome");

    match outcome {
        CallOutcome::Queued { action_id } => {
            assert!(queue.contains(&action_id));
            let action = queue.get(&action_id).expect("queued action");
            assert_eq!(action.priority, Priority::Critical);
        }
        other => panic!("expected Queued, got {other:?}"),
    }
}

/// Jittered backoff is deterministic under an injected randomness source.
#[tokio::test]
async fn test_jitter_deterministic_with_injected_source() {
    let config = RetryConfig {
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(5),
        backoff_multiplier: 2.0,
        strategy: BackoffKind::Jitter,
        ..RetryConfig::default()
    };

    let random = FixedRandom::constant(0.5);
    let first = config.delay_for_attempt(2, &random);
    let second = config.delay_for_attempt(2, &random);
    assert_eq!(first, second);
    // attempt 2 exponential value is 400ms; factor 0.75 gives 300ms.
    assert_eq!(first, Duration::from_millis(300));
}
