use anyhow::{Context, Result, bail};
use finboard_api::{ClientConfig, DEFAULT_BASE_URL, PollerConfig};
use finboard_core::Currency;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state::ensure_finboard_home;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiSection,
    pub poll: PollSection,
    pub display: DisplaySection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Development only: 401s on paths under this prefix keep the session.
    pub dev_bypass_prefix: Option<String>,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            dev_bypass_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollSection {
    pub interval_ms: u64,
    pub max_consecutive_errors: u32,
}

impl Default for PollSection {
    fn default() -> Self {
        let d = PollerConfig::default();
        Self {
            interval_ms: d.interval.as_millis() as u64,
            max_consecutive_errors: d.max_consecutive_errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplaySection {
    /// Currency dashboard totals are shown in
    pub currency: String,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
        }
    }
}

impl Config {
    /// Apply environment overrides. `FINBOARD_API_URL` wins over the legacy
    /// `NEXT_PUBLIC_API_URL`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("FINBOARD_API_URL") {
            self.api.base_url = url;
        } else if let Some(url) = get("NEXT_PUBLIC_API_URL") {
            tracing::debug!("using legacy NEXT_PUBLIC_API_URL");
            self.api.base_url = url;
        }
        if let Some(prefix) = get("FINBOARD_DEV_BYPASS_PREFIX") {
            self.api.dev_bypass_prefix = Some(prefix);
        }
        if let Some(ms) = get("FINBOARD_POLL_INTERVAL_MS") {
            self.poll.interval_ms = ms
                .parse()
                .with_context(|| format!("FINBOARD_POLL_INTERVAL_MS is not a number: {ms}"))?;
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            dev_bypass_prefix: self.api.dev_bypass_prefix.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.poll.interval_ms.max(100)),
            max_consecutive_errors: self.poll.max_consecutive_errors.max(1),
        }
    }

    pub fn display_currency(&self) -> Result<Currency> {
        self.display
            .currency
            .parse()
            .with_context(|| format!("display.currency = {:?}", self.display.currency))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_finboard_home()?.join("config.toml"))
}

pub fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(s).context("parse config.toml")?;
    if !cfg.api.base_url.starts_with("http://") && !cfg.api.base_url.starts_with("https://") {
        bail!("api.base_url must start with http:// or https://");
    }
    Ok(cfg)
}

/// Config file (or defaults) with environment overrides applied.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?, |k| std::env::var(k).ok())
}

pub fn load_config_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut cfg = if path.exists() {
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        parse_config(&s).with_context(|| format!("in {}", path.display()))?
    } else {
        Config::default()
    };
    cfg.apply_env(env)?;
    tracing::debug!(base_url = %cfg.api.base_url, "config loaded");
    Ok(cfg)
}

/// Write the default config unless one exists. `force` overwrites it,
/// readable or not. Returns whether the file was written.
pub fn write_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    let s = toml::to_string_pretty(&Config::default()).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(true)
}

pub fn init_config(force: bool) -> Result<()> {
    let p = config_path()?;
    if write_default_config(&p, force)? {
        println!("Wrote {}", p.display());
    } else {
        println!("Config already exists: {} (use --force to overwrite)", p.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let cfg = parse_config("[api]\nbase_url = \"https://fin.example.com\"\n").unwrap();
        assert_eq!(cfg.api.base_url, "https://fin.example.com");
        assert_eq!(cfg.api.timeout_secs, 30);
        assert_eq!(cfg.poll.interval_ms, 2000);
        assert_eq!(cfg.poll.max_consecutive_errors, 5);
        assert_eq!(cfg.display_currency().unwrap(), Currency::USD);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(parse_config("[api]\nbase_url = \"localhost:8000\"\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("NEXT_PUBLIC_API_URL", "http://legacy:8000"),
            ("FINBOARD_API_URL", "http://api:9000"),
            ("FINBOARD_POLL_INTERVAL_MS", "500"),
        ]))
        .unwrap();
        assert_eq!(cfg.api.base_url, "http://api:9000");
        assert_eq!(cfg.poller_config().interval, Duration::from_millis(500));

        let mut cfg = Config::default();
        cfg.apply_env(env(&[("NEXT_PUBLIC_API_URL", "http://legacy:8000")]))
            .unwrap();
        assert_eq!(cfg.api.base_url, "http://legacy:8000");
        assert_eq!(cfg.client_config().dev_bypass_prefix, None);

        let mut cfg = Config::default();
        assert!(
            cfg.apply_env(env(&[("FINBOARD_POLL_INTERVAL_MS", "fast")]))
                .is_err()
        );
    }

    #[test]
    fn test_load_from_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(load_config_from(&path, env(&[])).unwrap(), Config::default());

        fs::write(
            &path,
            "[api]\nbase_url = \"http://file:8000\"\n[display]\ncurrency = \"pen\"\n",
        )
        .unwrap();
        let cfg = load_config_from(&path, env(&[("FINBOARD_DEV_BYPASS_PREFIX", "/statements")]))
            .unwrap();
        assert_eq!(cfg.api.base_url, "http://file:8000");
        assert_eq!(cfg.display_currency().unwrap(), Currency::PEN);
        assert_eq!(
            cfg.client_config().dev_bypass_prefix.as_deref(),
            Some("/statements")
        );

        fs::write(&path, "[api]\nbase_url = 42\n").unwrap();
        assert!(load_config_from(&path, env(&[])).is_err());
    }

    #[test]
    fn test_init_force_repairs_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\nbase_url = ").unwrap();
        assert!(load_config_from(&path, env(&[])).is_err());

        assert!(!write_default_config(&path, false).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[api\nbase_url = ");

        assert!(write_default_config(&path, true).unwrap());
        assert_eq!(load_config_from(&path, env(&[])).unwrap(), Config::default());
    }

    #[test]
    fn test_roundtrips_through_toml() {
        let mut cfg = Config::default();
        cfg.api.dev_bypass_prefix = Some("/statements".into());
        let s = toml::to_string_pretty(&cfg).unwrap();
        assert_eq!(parse_config(&s).unwrap(), cfg);
    }
}
