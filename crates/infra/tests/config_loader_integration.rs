//! Integration tests for the settings loader
//!
//! Tests the end-to-end behavior of loading settings from files and the
//! environment, and building registries from them.

use std::convert::Infallible;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lumen_core::light::{CacheableOptions, L2Store};
use lumen_core::particle::LimiterExt;
use lumen_domain::{DiscardStrategy, LimiterKind, LumenError, TimesWindow};
use lumen_infra::{config, Lumen, MemoryStore};
use once_cell::sync::Lazy;
use tempfile::{Builder, TempDir};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const ENV_KEYS: [&str; 6] = [
    "LUMEN_CONFIG",
    "LUMEN_L1_MAX_COUNT",
    "LUMEN_L1_DISCARD_PERCENT",
    "LUMEN_L1_EXPIRE",
    "LUMEN_L2_EXPIRE",
    "LUMEN_STRATEGY",
];

const TOML_SETTINGS: &str = r#"
[light.defaults]
l1MaxCount = 128
l1DiscardPercent = 0.25
l2Expire = 600
strategy = "LRU"

[light.instances.orders]
onlyCacheL1 = true
l1MaxCount = 16

[particle.store]
l1MaxCount = 1024
onlyCacheL1 = true
strategy = "LRU"

[[particle.limiters]]
name = "idempotentLimiter"
type = "idempotent"
keyExpire = 60

[[particle.limiters]]
name = "timesLimiter"
type = "times"
limitTimes = 3
window = "day"

[[particle.limiters]]
name = "barrierLimiter"
type = "barrier"
chain = ["idempotentLimiter", "timesLimiter"]
"#;

fn write_settings(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

/// Verifies a TOML settings file loads every section.
///
/// # Test Steps
/// 1. Write a TOML file with cache defaults, an instance and three limiters
/// 2. Load it with `load_from_file`
/// 3. Verify the template, the override and the limiter declarations
#[test]
fn test_load_settings_from_toml_file() {
    let dir = Builder::new().prefix("lumen").tempdir().unwrap();
    let path = write_settings(&dir, "lumen.toml", TOML_SETTINGS);

    let settings = config::load_from_file(Some(path)).unwrap();

    assert_eq!(settings.light.defaults.l1_max_count, Some(128));
    assert_eq!(settings.light.defaults.l2_expire, 600);
    assert_eq!(settings.light.defaults.strategy, DiscardStrategy::Lru);
    assert_eq!(settings.light.instances["orders"].l1_max_count, Some(16));
    assert_eq!(settings.particle.store.l1_max_count, Some(1024));
    assert_eq!(settings.particle.limiters.len(), 3);
    assert_eq!(settings.particle.limiters[1].window, TimesWindow::Day);
    assert_eq!(settings.particle.limiters[2].kind, LimiterKind::Barrier);
}

/// Verifies a JSON settings file with snake_case keys loads.
///
/// # Test Steps
/// 1. Write a JSON file using snake_case field names
/// 2. Load it with `load_from_file`
/// 3. Verify the values
#[test]
fn test_load_settings_from_json_file() {
    let dir = Builder::new().prefix("lumen").tempdir().unwrap();
    let json = r#"{
        "light": {
            "defaults": { "l1_max_count": 32, "l1_expire": 30, "strategy": "LazyExpire" }
        },
        "particle": {
            "limiters": [
                { "name": "smsTimes", "type": "times", "limitTimes": 5, "window": "hour" }
            ]
        }
    }"#;
    let path = write_settings(&dir, "lumen.json", json);

    let settings = config::load_from_file(Some(path)).unwrap();

    assert_eq!(settings.light.defaults.l1_max_count, Some(32));
    assert_eq!(settings.light.defaults.l1_expire, 30);
    assert_eq!(settings.light.defaults.strategy, DiscardStrategy::LazyExpire);
    assert_eq!(settings.particle.limiters[0].limit_times, 5);
    assert_eq!(settings.particle.limiters[0].resolved_key_prefix(), "particle:smsTimes:");
}

/// Verifies invalid files are rejected with a configuration error.
///
/// # Test Steps
/// 1. Write a malformed TOML file and a file with a broken barrier
/// 2. Load each
/// 3. Verify both fail with `LumenError::Config`
#[test]
fn test_invalid_files_rejected() {
    let dir = Builder::new().prefix("lumen").tempdir().unwrap();
    let malformed = write_settings(&dir, "bad.toml", "[light.defaults\nl1MaxCount = ");
    let broken = write_settings(
        &dir,
        "broken.toml",
        "[[particle.limiters]]\nname = \"b\"\ntype = \"barrier\"\nchain = [\"missing\"]\n",
    );

    assert!(matches!(config::load_from_file(Some(malformed)), Err(LumenError::Config(_))));
    assert!(matches!(config::load_from_file(Some(broken)), Err(LumenError::Config(_))));
}

/// Verifies environment overrides layer on the `LUMEN_CONFIG` file.
///
/// # Test Steps
/// 1. Point `LUMEN_CONFIG` at a TOML file
/// 2. Override the bound and strategy through the environment
/// 3. Verify `load` picks the environment and keeps file-only values
#[test]
fn test_env_overrides_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    let dir = Builder::new().prefix("lumen").tempdir().unwrap();
    let path = write_settings(&dir, "lumen.toml", TOML_SETTINGS);
    std::env::set_var("LUMEN_CONFIG", &path);
    std::env::set_var("LUMEN_L1_MAX_COUNT", "512");
    std::env::set_var("LUMEN_STRATEGY", "LFU");

    let result = config::load();
    clear_env();

    let settings = result.unwrap();
    assert_eq!(settings.light.defaults.l1_max_count, Some(512));
    assert_eq!(settings.light.defaults.strategy, DiscardStrategy::Lfu);
    assert_eq!(settings.light.defaults.l2_expire, 600);
    assert_eq!(settings.particle.limiters.len(), 3);
}

/// Verifies an invalid environment value fails the load.
///
/// # Test Steps
/// 1. Set an unknown strategy
/// 2. Verify `load` returns a configuration error instead of falling back
#[test]
fn test_invalid_env_not_ignored() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("LUMEN_STRATEGY", "random");

    let result = config::load();
    clear_env();

    assert!(matches!(result, Err(LumenError::Config(_))));
}

/// Verifies registries built from a loaded file work end to end.
///
/// # Test Steps
/// 1. Load the TOML file and bootstrap with a shared memory store
/// 2. Read through the `orders` instance (L1 only by override)
/// 3. Run the barrier limiter three times with the same phone number
/// 4. Verify L2 stayed empty and the action ran once
#[test]
fn test_bootstrap_from_file() -> anyhow::Result<()> {
    let dir = Builder::new().prefix("lumen").tempdir()?;
    let path = write_settings(&dir, "lumen.toml", TOML_SETTINGS);
    let settings = config::load_from_file(Some(path))?;
    let store = MemoryStore::shared();

    let lumen: Lumen<String> =
        Lumen::from_settings(settings, Some(store.clone() as Arc<dyn L2Store>))?;

    let order = lumen.caches().cacheable(
        "orders",
        &CacheableOptions::default(),
        "order:",
        "42",
        |_| Ok::<_, Infallible>("shipped".to_string()),
    )?;
    assert_eq!(order, "shipped");
    assert!(store.is_empty());

    let barrier = lumen
        .limiters()
        .get("barrierLimiter")
        .ok_or_else(|| anyhow::anyhow!("barrierLimiter not built"))?;
    let mut sent = 0;
    for _ in 0..3 {
        let outcome = barrier.guard("13800000000", Duration::from_secs(60), |_| {
            sent += 1;
            Ok::<_, Infallible>(())
        })?;
        if outcome.is_limited() {
            assert!(outcome.particle().fired_by(LimiterKind::Idempotent));
        }
    }
    assert_eq!(sent, 1);
    Ok(())
}
