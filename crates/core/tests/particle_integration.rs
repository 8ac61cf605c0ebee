//! Integration tests for particle limiters
//!
//! Tests idempotent, times and barrier limiters end to end, including the
//! body-running helpers and concurrent admission

use std::convert::Infallible;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lumen_common::time::MockClock;
use lumen_core::light::{CacheError, KeyGenerator, LightCache};
use lumen_core::particle::{
    BarrierLimiter, Guarded, IdempotentLimiter, LimitError, Limiter, LimiterExt,
    LimiterRegistry, TimesLimiter,
};
use lumen_domain::{CacheConfig, LimiterKind, LimiterSpec, ParticleSettings, TimesWindow};

const MINUTE: Duration = Duration::from_secs(60);

fn store(name: &str, clock: &MockClock) -> LightCache<u64, MockClock> {
    LightCache::with_clock(name, CacheConfig::lru(4096), None, clock.clone()).unwrap()
}

fn idempotent(clock: &MockClock) -> IdempotentLimiter<MockClock> {
    IdempotentLimiter::new(
        "idempotentLimiter",
        KeyGenerator::new("particle:idempotentLimiter:"),
        MINUTE,
        store("particle_idempotentLimiter", clock),
    )
}

fn times(clock: &MockClock, limit_times: u64) -> TimesLimiter<MockClock> {
    TimesLimiter::new(
        "timesLimiter",
        KeyGenerator::new("particle:timesLimiter:"),
        limit_times,
        TimesWindow::Day,
        store("particle_timesLimiter", clock),
    )
}

/// Verifies a duplicate submission is reported to the body.
///
/// # Test Steps
/// 1. Call `limit` twice with the same token
/// 2. Verify the first body sees an admitted particle
/// 3. Verify the second body sees a limited idempotent particle
#[test]
fn test_idempotent_limit_reports_duplicate() {
    let clock = MockClock::new();
    let limiter = idempotent(&clock);
    let reply = |p: &lumen_core::particle::Particle| {
        Ok::<_, Infallible>(if p.limited { "duplicate" } else { "ok" })
    };

    assert_eq!(limiter.limit("order-9", MINUTE, reply).unwrap(), "ok");
    assert_eq!(limiter.limit("order-9", MINUTE, reply).unwrap(), "duplicate");
    assert_eq!(limiter.limit("order-10", MINUTE, reply).unwrap(), "ok");
}

/// Verifies `guard` skips the action for a limited call.
///
/// # Test Steps
/// 1. Guard an action twice with the same token
/// 2. Verify the action ran once
/// 3. Verify the second outcome is `Limited`
#[test]
fn test_idempotent_guard_skips_action() {
    let clock = MockClock::new();
    let limiter = idempotent(&clock);
    let runs = AtomicUsize::new(0);
    let action = |_: &lumen_core::particle::Particle| {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Infallible>("charged")
    };

    let first = limiter.guard("pay-1", MINUTE, action).unwrap();
    let second = limiter.guard("pay-1", MINUTE, action).unwrap();

    assert_eq!(first.output(), Some("charged"));
    assert!(matches!(second, Guarded::Limited(ref p) if p.kind == LimiterKind::Idempotent));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Verifies the idempotent window expires.
///
/// # Test Steps
/// 1. Admit a token with a 60 second window
/// 2. Advance the clock by 60 seconds
/// 3. Verify the token is admitted again
#[test]
fn test_idempotent_window_expires() {
    let clock = MockClock::new();
    let limiter = idempotent(&clock);

    assert!(!limiter.admit("t", MINUTE).unwrap().limited);
    clock.advance_secs(30);
    assert!(limiter.admit("t", MINUTE).unwrap().limited);
    clock.advance_secs(30);
    assert!(!limiter.admit("t", MINUTE).unwrap().limited);
}

/// Verifies a failing body does not roll back the marker.
///
/// # Test Steps
/// 1. Run a body that fails under the idempotent limiter
/// 2. Verify the error is `BodyFailed` with the body's error
/// 3. Verify a retry with the same token is limited
#[test]
fn test_body_failure_keeps_marker() {
    let clock = MockClock::new();
    let limiter = idempotent(&clock);

    let err = limiter
        .limit("order-1", MINUTE, |_| {
            Err::<(), _>(io::Error::new(io::ErrorKind::Other, "downstream"))
        })
        .unwrap_err();
    match err {
        LimitError::BodyFailed { source } => assert_eq!(source.to_string(), "downstream"),
        other => panic!("unexpected error: {:?}", other),
    }

    assert!(limiter.admit("order-1", MINUTE).unwrap().limited);
}

/// Verifies an empty identifier is rejected before any state is written.
///
/// # Test Steps
/// 1. Call `limit` with a blank identifier
/// 2. Verify `MissingKey` and that the body never ran
#[test]
fn test_blank_identifier_rejected() {
    let clock = MockClock::new();
    let limiter = times(&clock, 3);

    let result = limiter.limit("  ", MINUTE, |_| -> Result<(), Infallible> {
        panic!("body must not run")
    });
    assert!(matches!(result, Err(LimitError::Cache(CacheError::MissingKey { .. }))));
    assert!(limiter.store().is_empty());
}

/// Verifies the times ceiling over a day window.
///
/// # Test Steps
/// 1. Call a times limiter with a ceiling of 3 four times
/// 2. Verify values 1, 2, 3 are admitted
/// 3. Verify call 4 is limited and carries the count
#[test]
fn test_times_ceiling() {
    let clock = MockClock::new();
    let limiter = times(&clock, 3);

    let verdicts: Vec<(bool, u64)> = (0..4)
        .map(|_| {
            let p = limiter.admit("13800000000", MINUTE).unwrap();
            (p.limited, p.value)
        })
        .collect();

    assert_eq!(verdicts, vec![(false, 1), (false, 2), (false, 3), (true, 4)]);
}

/// Verifies the barrier stops at the idempotent member.
///
/// # Test Steps
/// 1. Chain [idempotent, times(3)] in a barrier
/// 2. Submit the same identifier twice
/// 3. Verify the second verdict is the idempotent one
/// 4. Verify the times counter was only incremented by the first call
#[test]
fn test_barrier_short_circuits() {
    let clock = MockClock::new();
    let idem = Arc::new(idempotent(&clock));
    let counter = Arc::new(times(&clock, 3));
    let barrier = BarrierLimiter::new(
        "barrierLimiter",
        vec![Arc::clone(&idem) as Arc<dyn Limiter>, Arc::clone(&counter) as Arc<dyn Limiter>],
    )
    .unwrap();

    let first = barrier.admit("phone", MINUTE).unwrap();
    let second = barrier.admit("phone", MINUTE).unwrap();

    assert!(!first.limited);
    assert_eq!(first.kind, LimiterKind::Times);
    assert!(second.fired_by(LimiterKind::Idempotent));
    assert_eq!(second.limiter, "idempotentLimiter");
    assert_eq!(counter.store().peek("particle:timesLimiter:phone"), Some(1));
}

/// Verifies the barrier reports the times member once it fires.
///
/// # Test Steps
/// 1. Wrap a times limiter with a ceiling of 2 in a barrier
/// 2. Submit the same identifier three times
/// 3. Verify the third verdict is the times one
#[test]
fn test_barrier_reports_times() {
    let clock = MockClock::new();
    let counter: Arc<dyn Limiter> = Arc::new(times(&clock, 2));
    let barrier = BarrierLimiter::new("sms", vec![counter]).unwrap();

    let verdicts: Vec<_> = (0..3).map(|_| barrier.admit("phone", MINUTE).unwrap()).collect();

    assert!(!verdicts[0].limited);
    assert!(!verdicts[1].limited);
    assert!(verdicts[2].fired_by(LimiterKind::Times));
    assert_eq!(verdicts[2].value, 3);
}

/// Verifies limiters built from settings behave like hand-built ones.
///
/// # Test Steps
/// 1. Declare idempotent, times(3) and a barrier over both
/// 2. Build the registry
/// 3. Run the barrier through `guard` and verify one admitted action
#[test]
fn test_registry_barrier_from_settings() {
    let settings = ParticleSettings {
        limiters: vec![
            LimiterSpec::idempotent("idempotentLimiter", 60),
            LimiterSpec::times("timesLimiter", 3, TimesWindow::Day),
            LimiterSpec::barrier("barrierLimiter", ["idempotentLimiter", "timesLimiter"]),
        ],
        ..ParticleSettings::default()
    };
    let registry = LimiterRegistry::from_settings(&settings).unwrap();
    let barrier = registry.get("barrierLimiter").unwrap();
    let sent = AtomicUsize::new(0);

    for _ in 0..3 {
        barrier
            .guard("13800000000", MINUTE, |_| {
                sent.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(())
            })
            .unwrap();
    }

    assert_eq!(sent.load(Ordering::SeqCst), 1);
    let times = registry.get("timesLimiter").unwrap();
    let direct = times.admit("13800000000", MINUTE).unwrap();
    assert_eq!(direct.value, 2);
}

/// Verifies default limiter stores keep live state under heavy traffic.
///
/// # Test Steps
/// 1. Build idempotent and times(2) limiters with the default store
/// 2. Admit one id, then 5000 other ids through both
/// 3. Verify the repeat inside the window is still limited
/// 4. Verify the times counter for the first id kept counting
#[test]
fn test_live_state_survives_filler_traffic() {
    let settings = ParticleSettings {
        limiters: vec![
            LimiterSpec::idempotent("idem", 60),
            LimiterSpec::times("sms", 2, TimesWindow::Hour),
        ],
        ..ParticleSettings::default()
    };
    let clock = MockClock::new();
    let registry = LimiterRegistry::with_clock(&settings, clock.clone()).unwrap();
    let idem = registry.get("idem").unwrap();
    let sms = registry.get("sms").unwrap();

    assert!(!idem.admit("victim", MINUTE).unwrap().limited);
    assert_eq!(sms.admit("victim", MINUTE).unwrap().value, 1);
    for i in 0..5_000 {
        let id = format!("filler-{}", i);
        idem.admit(&id, MINUTE).unwrap();
        sms.admit(&id, MINUTE).unwrap();
    }
    clock.advance_secs(30);

    assert!(idem.admit("victim", MINUTE).unwrap().limited);
    let repeat = sms.admit("victim", MINUTE).unwrap();
    assert_eq!(repeat.value, 2);
    assert!(!repeat.limited);
    assert!(sms.admit("victim", MINUTE).unwrap().limited);
}

/// Verifies exactly one concurrent submission is admitted.
///
/// # Test Steps
/// 1. Spawn 16 threads submitting the same token
/// 2. Count admitted verdicts
/// 3. Verify exactly one was admitted
#[test]
fn test_idempotent_concurrent_single_admission() {
    let clock = MockClock::new();
    let limiter = Arc::new(idempotent(&clock));
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                if !limiter.admit("submit-42", MINUTE).unwrap().limited {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
}

/// Verifies the times ceiling holds under contention.
///
/// # Test Steps
/// 1. Spawn 10 threads each calling 10 times with a ceiling of 50
/// 2. Count admitted verdicts
/// 3. Verify exactly 50 were admitted and the counter reached 100
#[test]
fn test_times_concurrent_ceiling() {
    let clock = MockClock::new();
    let limiter = Arc::new(times(&clock, 50));
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                for _ in 0..10 {
                    if !limiter.admit("hot-key", MINUTE).unwrap().limited {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 50);
    assert_eq!(limiter.store().peek("particle:timesLimiter:hot-key"), Some(100));
}
