use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use client::monitor::DEFAULT_MAX_CONSECUTIVE_FAILURES;
use client::MonitorConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};

pub const API_URL_ENV: &str = "MEDIA_TOOLS_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8010";

fn user_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mediatools")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_consecutive_failures() -> Option<u32> {
    Some(DEFAULT_MAX_CONSECUTIVE_FAILURES)
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize, Eq, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "user_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// `null` polls for as long as the download runs.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: Option<u32>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: None,
            download_dir: user_download_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Updates a single key from its command line representation. `none`
    /// clears the optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let cleared = value.is_empty() || value.eq_ignore_ascii_case("none");
        match key {
            "api_url" => self.api_url = (!cleared).then(|| value.to_owned()),
            "download_dir" => self.download_dir = PathBuf::from(value),
            "poll_interval_ms" => {
                self.poll_interval_ms = parse_number(key, value)?;
            }
            "max_consecutive_failures" => {
                self.max_consecutive_failures = if cleared {
                    None
                } else {
                    Some(parse_number(key, value)?)
                };
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = parse_number(key, value)?;
            }
            _ => bail!(
                "Unknown setting '{}', expected one of api_url, download_dir, \
                 poll_interval_ms, max_consecutive_failures, request_timeout_secs",
                key
            ),
        }
        Ok(())
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value '{}' for {}", value, key))
}

/// Picks the backend base url: command line flag, runtime environment,
/// settings file, build time environment, then the local default.
pub fn resolve_api_url(flag: Option<&str>, env: Option<&str>, settings: &Settings) -> String {
    [
        flag,
        env,
        settings.api_url.as_deref(),
        option_env!("MEDIA_TOOLS_API_URL"),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|url| !url.is_empty())
    .unwrap_or(DEFAULT_API_URL)
    .to_owned()
}

pub fn default_settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mediatools")
        .join("settings.yaml")
}

#[derive(Debug, Clone)]
pub struct SettingManager {
    inner: Arc<RwLock<Settings>>,
    path: PathBuf,
}

impl SettingManager {
    pub async fn load(p: Option<PathBuf>) -> Result<Self> {
        let path = p.unwrap_or_else(default_settings_path);
        let settings = load_settings(&path).await?;
        Ok(Self {
            inner: Arc::new(RwLock::new(settings)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> RwLockReadGuard<Settings> {
        self.inner.read().await
    }

    /// Replaces the settings and persists them.
    pub async fn write(&self, settings: Settings) -> Result<()> {
        let mut guard = self.inner.write().await;
        save_settings(&self.path, &settings).await?;
        *guard = settings;
        Ok(())
    }
}

async fn load_settings(p: &Path) -> Result<Settings> {
    let file_exists = tokio::fs::try_exists(p).await.unwrap_or(false);
    if file_exists {
        log::info!("Found settings file at {}, reading...", p.to_string_lossy());
        let file = tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("Error reading settings file {}", p.to_string_lossy()))?;
        if file.trim().is_empty() {
            return Ok(Settings::default());
        }
        let settings: Settings = serde_yaml::from_str(&file)
            .with_context(|| format!("Invalid settings file {}", p.to_string_lossy()))?;
        log::info!("Settings loaded: {:?}", settings);
        return Ok(settings);
    }
    log::info!(
        "No settings file found at {}, creating...",
        p.to_string_lossy()
    );
    let settings = Settings::default();
    save_settings(p, &settings).await?;
    Ok(settings)
}

async fn save_settings(p: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = p.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let settings_str = serde_yaml::to_string(settings)?;
    tokio::fs::write(p, settings_str)
        .await
        .with_context(|| format!("Error writing settings file {}", p.to_string_lossy()))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use test_log::test;

    #[test]
    fn missing_keys_take_defaults() -> Result<()> {
        let decoded: Settings = serde_yaml::from_str("{}")?;
        assert_eq!(decoded, Settings::default());
        let decoded: Settings = serde_yaml::from_str("poll_interval_ms: 250\n")?;
        assert_eq!(decoded.poll_interval_ms, 250);
        assert_eq!(decoded.request_timeout_secs, 60);
        assert_eq!(decoded.max_consecutive_failures, Some(30));
        Ok(())
    }

    #[test]
    fn null_failure_bound_polls_forever() -> Result<()> {
        let decoded: Settings = serde_yaml::from_str("max_consecutive_failures: null\n")?;
        assert_eq!(decoded.monitor_config().max_consecutive_failures, None);
        Ok(())
    }

    #[test]
    fn api_url_precedence() {
        let mut settings = Settings::default();
        settings.api_url = Some("http://from-settings:8010".to_owned());
        assert_eq!(
            resolve_api_url(Some("http://flag:1"), Some("http://env:2"), &settings),
            "http://flag:1"
        );
        assert_eq!(
            resolve_api_url(None, Some("http://env:2"), &settings),
            "http://env:2"
        );
        // blank values fall through
        assert_eq!(
            resolve_api_url(Some(" "), Some(""), &settings),
            "http://from-settings:8010"
        );
        settings.api_url = None;
        let fallback = option_env!("MEDIA_TOOLS_API_URL").unwrap_or(DEFAULT_API_URL);
        assert_eq!(resolve_api_url(None, None, &settings), fallback.trim());
    }

    #[test]
    fn set_updates_known_keys() -> Result<()> {
        let mut settings = Settings::default();
        settings.set("api_url", "http://media.local:9000")?;
        settings.set("poll_interval_ms", "500")?;
        settings.set("max_consecutive_failures", "none")?;
        assert_eq!(settings.api_url.as_deref(), Some("http://media.local:9000"));
        assert_eq!(
            settings.monitor_config(),
            MonitorConfig {
                interval: Duration::from_millis(500),
                max_consecutive_failures: None,
            }
        );
        assert!(settings.set("poll_interval_ms", "soon").is_err());
        assert!(settings.set("colour", "blue").is_err());
        Ok(())
    }

    #[test(tokio::test)]
    async fn creates_and_persists_settings_file() -> Result<()> {
        let tmp_dir = TempDir::new()?;
        let path = tmp_dir.path().join("nested").join("settings.yaml");
        let manager = SettingManager::load(Some(path.clone())).await?;
        assert!(path.exists());
        assert_eq!(*manager.read().await, Settings::default());
        let mut settings = manager.read().await.clone();
        settings.set("request_timeout_secs", "5")?;
        manager.write(settings).await?;
        let reloaded = SettingManager::load(Some(path)).await?;
        assert_eq!(reloaded.read().await.request_timeout(), Duration::from_secs(5));
        Ok(())
    }

    #[test(tokio::test)]
    async fn broken_settings_file_is_an_error() -> Result<()> {
        let tmp_dir = TempDir::new()?;
        let path = tmp_dir.path().join("settings.yaml");
        tokio::fs::write(&path, "poll_interval_ms: [1, 2]\n").await?;
        assert!(SettingManager::load(Some(path)).await.is_err());
        Ok(())
    }
}
