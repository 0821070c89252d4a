//! Resilience benchmarks
//!
//! Measures the per-request overhead the session pipeline pays: breaker
//! admission on the happy path, rejection while open, and delay
//! computation for each backoff curve.
//!
//! Run with: `cargo bench --bench resilience_bench -p unigate-common
//! --features runtime`

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Builder as RuntimeBuilder;
use unigate_common::resilience::{
    policies, BackoffConfig, BackoffKind, BackoffPolicy, CircuitBreaker, CircuitBreakerConfig,
    MockClock, RequestContext, ResilienceError,
};

// ============================================================================
// Circuit Breaker Benchmarks
// ============================================================================

fn bench_circuit_breaker(c: &mut Criterion) {
    let runtime = RuntimeBuilder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime for benchmarks");
    let mut group = c.benchmark_group("circuit_breaker");

    group.bench_function("execute_success", |b| {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default())
            .expect("default breaker config is valid");
        b.iter(|| {
            runtime.block_on(async {
                let result: Result<_, ResilienceError<std::io::Error>> =
                    breaker.execute(|| async { Ok::<_, std::io::Error>(()) }).await;
                black_box(result).ok();
            });
        });
    });

    group.bench_function("open_short_circuit", |b| {
        let config = CircuitBreakerConfig::builder()
            .max_failures(1)
            .reset_timeout(Duration::from_secs(60))
            .build()
            .expect("valid circuit breaker config for benchmarks");
        let breaker = CircuitBreaker::with_clock(config, MockClock::new())
            .expect("circuit breaker should build for short-circuit");

        runtime.block_on(async {
            let _ = breaker
                .execute(|| async { Err::<(), _>(std::io::Error::other("initial failure")) })
                .await;
        });

        b.iter(|| {
            runtime.block_on(async {
                let result = breaker.execute(|| async { Ok::<_, std::io::Error>(()) }).await;
                black_box(result).ok();
            });
        });
    });

    group.finish();
}

// ============================================================================
// Backoff Benchmarks
// ============================================================================

fn bench_backoff_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff_delay");

    for strategy in [BackoffKind::Exponential, BackoffKind::Linear, BackoffKind::Fixed] {
        let config = BackoffConfig::builder()
            .strategy(strategy)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(10))
            .jitter_fraction(0.2)
            .build()
            .expect("valid backoff config for benchmarks");
        let policy = BackoffPolicy::new(config).expect("valid backoff policy");

        group.bench_with_input(
            BenchmarkId::new("delay", format!("{strategy:?}")),
            &policy,
            |b, policy| {
                b.iter(|| {
                    for attempt in 0..8 {
                        black_box(policy.delay(black_box(attempt)));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_retry_happy_path(c: &mut Criterion) {
    let runtime = RuntimeBuilder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime for benchmarks");
    let policy = BackoffPolicy::with_policy(BackoffConfig::default(), policies::AlwaysRetry)
        .expect("default policy is valid");

    c.bench_function("retry_first_attempt_success", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let ctx = RequestContext::new();
                let result =
                    policy.retry(&ctx, |_| async { Ok::<_, std::io::Error>(42_u32) }).await;
                black_box(result).ok();
            });
        });
    });
}

criterion_group!(benches, bench_circuit_breaker, bench_backoff_delay, bench_retry_happy_path);
criterion_main!(benches);
