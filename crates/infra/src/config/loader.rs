//! Settings loader
//!
//! Loads [`Settings`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If any `LUMEN_*` variable is set, load from the environment
//! 2. Otherwise probe the standard paths for a settings file
//! 3. Without a file, fall back to the built-in defaults
//!
//! ## Environment Variables
//! - `LUMEN_CONFIG`: settings file used as the base
//! - `LUMEN_L1_MAX_COUNT`: L1 bound of the default template (`unbounded` for
//!   none)
//! - `LUMEN_L1_DISCARD_PERCENT`: share of L1 removed per discard pass
//! - `LUMEN_L1_EXPIRE`: L1 expiry in seconds (`-1` for never)
//! - `LUMEN_L2_EXPIRE`: L2 expiry in seconds (`-1` for never)
//! - `LUMEN_STRATEGY`: discard strategy (`LRU`, `LFU`, `LazyExpire`)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./lumen.toml`, `./lumen.json`, `./config.toml`, `./config.json`
//! 2. The same names in `..` and `../..`
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use lumen_domain::{DiscardStrategy, LumenError, Result, Settings};

const ENV_CONFIG: &str = "LUMEN_CONFIG";
const ENV_L1_MAX_COUNT: &str = "LUMEN_L1_MAX_COUNT";
const ENV_L1_DISCARD_PERCENT: &str = "LUMEN_L1_DISCARD_PERCENT";
const ENV_L1_EXPIRE: &str = "LUMEN_L1_EXPIRE";
const ENV_L2_EXPIRE: &str = "LUMEN_L2_EXPIRE";
const ENV_STRATEGY: &str = "LUMEN_STRATEGY";

const ENV_KEYS: [&str; 6] =
    [ENV_CONFIG, ENV_L1_MAX_COUNT, ENV_L1_DISCARD_PERCENT, ENV_L1_EXPIRE, ENV_L2_EXPIRE, ENV_STRATEGY];

const FILE_NAMES: [&str; 4] = ["lumen.toml", "lumen.json", "config.toml", "config.json"];

/// Load settings with automatic fallback strategy
///
/// # Errors
/// Returns `LumenError::Config` if:
/// - An environment variable or the chosen file is invalid
/// - The loaded settings fail validation
pub fn load() -> Result<Settings> {
    match load_from_env() {
        Ok(settings) => {
            tracing::info!("Settings loaded from environment variables");
            Ok(settings)
        }
        Err(LumenError::NotFound(reason)) => {
            tracing::debug!(reason = %reason, "No environment settings, trying file");
            match load_from_file(None) {
                Err(LumenError::NotFound(reason)) => {
                    tracing::info!(reason = %reason, "Using built-in settings");
                    Ok(Settings::default())
                }
                other => other,
            }
        }
        Err(e) => Err(e),
    }
}

/// Load settings from environment variables
///
/// `LUMEN_CONFIG` names the base file; the other variables override the
/// default cache template on top of it.
///
/// # Errors
/// Returns `LumenError::NotFound` if no `LUMEN_*` variable is set, and
/// `LumenError::Config` if a value is invalid.
pub fn load_from_env() -> Result<Settings> {
    if ENV_KEYS.iter().all(|key| std::env::var_os(key).is_none()) {
        return Err(LumenError::NotFound("No LUMEN_* environment variables set".to_string()));
    }

    let mut settings = match std::env::var(ENV_CONFIG) {
        Ok(path) => read_settings(Path::new(&path))?,
        Err(_) => Settings::default(),
    };

    let defaults = &mut settings.light.defaults;
    if let Some(raw) = env_opt(ENV_L1_MAX_COUNT) {
        defaults.l1_max_count = if raw.eq_ignore_ascii_case("unbounded") {
            None
        } else {
            Some(parse_env(ENV_L1_MAX_COUNT, &raw)?)
        };
    }
    if let Some(raw) = env_opt(ENV_L1_DISCARD_PERCENT) {
        defaults.l1_discard_percent = parse_env(ENV_L1_DISCARD_PERCENT, &raw)?;
    }
    if let Some(raw) = env_opt(ENV_L1_EXPIRE) {
        defaults.l1_expire = parse_env(ENV_L1_EXPIRE, &raw)?;
    }
    if let Some(raw) = env_opt(ENV_L2_EXPIRE) {
        defaults.l2_expire = parse_env(ENV_L2_EXPIRE, &raw)?;
    }
    if let Some(raw) = env_opt(ENV_STRATEGY) {
        defaults.strategy = DiscardStrategy::from_str(&raw)
            .map_err(|e| LumenError::Config(format!("Invalid {}: {}", ENV_STRATEGY, e)))?;
    }

    settings.validate()?;
    Ok(settings)
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected
/// by file extension.
///
/// # Errors
/// Returns `LumenError::Config` if the given file does not exist or is
/// invalid, and `LumenError::NotFound` if probing found no file.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Settings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(LumenError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            LumenError::NotFound("No config file found in any of the standard locations".to_string())
        })?,
    };

    read_settings(&config_path)
}

/// Parse and validate settings from string content
///
/// # Errors
/// Returns `LumenError::Config` if the format is unsupported, parsing fails
/// or validation fails.
pub fn parse_settings(contents: &str, path: &Path) -> Result<Settings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    let settings: Settings = match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| LumenError::Config(format!("Invalid TOML format: {}", e)))?,
        "json" => serde_json::from_str(contents)
            .map_err(|e| LumenError::Config(format!("Invalid JSON format: {}", e)))?,
        _ => return Err(LumenError::Config(format!("Unsupported config format: {}", extension))),
    };

    settings.validate()?;
    Ok(settings)
}

/// Probe the standard paths for a settings file
///
/// # Returns
/// The first file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn read_settings(path: &Path) -> Result<Settings> {
    tracing::info!(path = %path.display(), "Loading settings from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| LumenError::Config(format!("Failed to read config file: {}", e)))?;

    parse_settings(&contents, path)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| LumenError::Config(format!("Invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    //! Unit tests for config::loader.
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    /// Validates environment overrides on top of the defaults.
    ///
    /// Assertions:
    /// - Confirms every override lands on the default template.
    #[test]
    fn test_load_from_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var(ENV_L1_MAX_COUNT, "256");
        std::env::set_var(ENV_L1_DISCARD_PERCENT, "0.2");
        std::env::set_var(ENV_L1_EXPIRE, "120");
        std::env::set_var(ENV_L2_EXPIRE, "3600");
        std::env::set_var(ENV_STRATEGY, "lazy-expire");

        let settings = load_from_env().unwrap();
        clear_env();

        let defaults = settings.light.defaults;
        assert_eq!(defaults.l1_max_count, Some(256));
        assert!((defaults.l1_discard_percent - 0.2).abs() < f32::EPSILON);
        assert_eq!(defaults.l1_expire, 120);
        assert_eq!(defaults.l2_expire, 3600);
        assert_eq!(defaults.strategy, DiscardStrategy::LazyExpire);
    }

    /// Validates `unbounded` clears the L1 bound.
    ///
    /// Assertions:
    /// - Confirms `l1_max_count` is `None`.
    #[test]
    fn test_load_from_env_unbounded() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var(ENV_L1_MAX_COUNT, "Unbounded");

        let settings = load_from_env().unwrap();
        clear_env();

        assert_eq!(settings.light.defaults.l1_max_count, None);
    }

    /// Validates missing and invalid environment values.
    ///
    /// Assertions:
    /// - Ensures no variables yields `NotFound`.
    /// - Ensures a non-numeric bound yields `Config`.
    /// - Ensures an out-of-range percent fails validation.
    #[test]
    fn test_load_from_env_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        assert!(matches!(load_from_env(), Err(LumenError::NotFound(_))));

        std::env::set_var(ENV_L1_MAX_COUNT, "lots");
        assert!(matches!(load_from_env(), Err(LumenError::Config(_))));
        clear_env();

        std::env::set_var(ENV_L1_DISCARD_PERCENT, "1.5");
        assert!(matches!(load_from_env(), Err(LumenError::Config(_))));
        clear_env();
    }

    /// Validates format detection by extension.
    ///
    /// Assertions:
    /// - Confirms TOML and JSON documents parse to the same settings.
    /// - Ensures an unknown extension is rejected.
    #[test]
    fn test_parse_settings_formats() {
        let toml_doc = r#"
            [light.defaults]
            l1MaxCount = 32
            strategy = "LRU"
        "#;
        let json_doc = r#"{ "light": { "defaults": { "l1_max_count": 32, "strategy": "lru" } } }"#;

        let from_toml = parse_settings(toml_doc, Path::new("lumen.toml")).unwrap();
        let from_json = parse_settings(json_doc, Path::new("lumen.json")).unwrap();

        assert_eq!(from_toml, from_json);
        assert_eq!(from_toml.light.defaults.l1_max_count, Some(32));
        assert!(matches!(
            parse_settings("a: b", Path::new("lumen.yaml")),
            Err(LumenError::Config(_))
        ));
    }

    /// Validates parsed settings are validated.
    ///
    /// Assertions:
    /// - Ensures a zero bound is rejected.
    #[test]
    fn test_parse_settings_validates() {
        let doc = "[light.defaults]\nl1MaxCount = 0\n";
        assert!(matches!(parse_settings(doc, Path::new("lumen.toml")), Err(LumenError::Config(_))));
    }

    /// Validates an explicit missing path.
    ///
    /// Assertions:
    /// - Ensures the error is `Config`, not `NotFound`.
    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/lumen.toml")));
        assert!(matches!(result, Err(LumenError::Config(_))));
    }
}
