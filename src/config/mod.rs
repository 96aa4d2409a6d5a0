// src/config/mod.rs
pub mod app;

pub use app::{
    AppConfig, FetchConfig, ModelConfig, PlatformConfig, PromptConfig, RateLimitsConfig,
    RetryConfig, SearchConfig, StoreKind,
};

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "REPORT_CONFIG_PATH";
/// "1"/"0" override of `rate_limits.enabled` without editing the file.
pub const ENV_RATE_LIMITS: &str = "REPORT_RATE_LIMITS";

pub const DEFAULT_TOML_PATH: &str = "config/report.toml";
pub const DEFAULT_JSON_PATH: &str = "config/report.json";

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))?;
    finish(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $REPORT_CONFIG_PATH
/// 2) config/report.toml
/// 3) config/report.json
/// 4) built-in defaults
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    finish(AppConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        _ => {
            if let Ok(v) = toml::from_str(s) {
                return Ok(v);
            }
            serde_json::from_str(s).map_err(|_| anyhow!("unsupported config format"))
        }
    }
}

fn finish(mut cfg: AppConfig) -> Result<AppConfig> {
    if let Ok(v) = std::env::var(ENV_RATE_LIMITS) {
        match v.trim() {
            "1" | "true" => cfg.rate_limits.enabled = true,
            "0" | "false" => cfg.rate_limits.enabled = false,
            other => tracing::warn!(value = other, "ignoring invalid {ENV_RATE_LIMITS}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let toml = r#"
            deadline_secs = 120

            [rate_limits]
            enabled = true
            report_generation = 1

            [platforms.google]
            enabled = true

            [platforms.google.retry]
            max_attempts = 2
            delay_secs = 5
            retry_on = "any"

            [platforms.google.models.gemini-flash]
            label = "Flash"
            api_model = "gemini-2.0-flash"
        "#;
        let cfg = parse_config(toml, "toml").unwrap();
        assert_eq!(cfg.deadline_secs, 120);
        assert!(cfg.rate_limits.enabled);
        assert_eq!(cfg.rate_limits.report_generation, 1);
        assert_eq!(cfg.rate_limits.content_fetch, 10);
        let g = &cfg.platforms["google"];
        assert_eq!(g.retry.max_attempts, 2);
        assert!(g.models["gemini-flash"].enabled);
        // A file that names platforms replaces the built-in table.
        assert!(!cfg.platforms.contains_key("openai"));
    }

    #[test]
    fn json_is_accepted_by_extension() {
        let json = r#"{ "deadline_secs": 42 }"#;
        let cfg = parse_config(json, "json").unwrap();
        assert_eq!(cfg.deadline_secs, 42);
        assert!(cfg.platforms.contains_key("google"));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_RATE_LIMITS);

        // No files → built-in defaults
        let cfg = load_default().unwrap();
        assert_eq!(cfg.deadline_secs, 300);

        // Env path wins
        let p = tmp.path().join("custom.json");
        fs::write(&p, r#"{ "deadline_secs": 7 }"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(load_default().unwrap().deadline_secs, 7);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_var(ENV_RATE_LIMITS, "1");
        assert!(load_default().unwrap().rate_limits.enabled);
        env::remove_var(ENV_RATE_LIMITS);

        env::set_current_dir(&old).unwrap();
    }
}
