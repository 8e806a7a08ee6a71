use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use search_core::{tmdb::DEFAULT_API_BASE_URL, DEFAULT_DEBOUNCE};

pub const SETTINGS_FILE: &str = "moviesearch.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub recorder_url: Option<String>,
    pub debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            api_key: None,
            recorder_url: None,
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

impl Settings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let base = self.api_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            bail!("api base url must be an http(s) url, got '{base}'");
        }
        if let Some(url) = &self.recorder_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("recorder url must be an http(s) url, got '{url}'");
            }
        }
        Ok(())
    }

    fn apply_file(&mut self, file_cfg: &HashMap<String, String>) {
        if let Some(v) = file_cfg.get("api_base_url") {
            self.api_base_url = v.clone();
        }
        if let Some(v) = file_cfg.get("api_key") {
            self.api_key = non_blank(v);
        }
        if let Some(v) = file_cfg.get("recorder_url") {
            self.recorder_url = non_blank(v);
        }
        if let Some(v) = file_cfg.get("debounce_ms") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.debounce_ms = parsed;
            }
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("TMDB_API_KEY") {
            self.api_key = non_blank(&v);
        }
        if let Some(v) = var("APP__API_KEY") {
            self.api_key = non_blank(&v);
        }

        if let Some(v) = var("APP__API_BASE_URL") {
            self.api_base_url = v;
        }

        if let Some(v) = var("APP__RECORDER_URL") {
            self.recorder_url = non_blank(&v);
        }

        if let Some(v) = var("APP__DEBOUNCE_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.debounce_ms = parsed;
            }
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Defaults, then `moviesearch.toml` in the working directory, then the
/// environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |name| std::env::var(name).ok())
}

fn load_settings_from(
    path: &Path,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg = toml::from_str::<HashMap<String, String>>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        settings.apply_file(&file_cfg);
    }

    settings.apply_env(var);
    Ok(settings)
}
