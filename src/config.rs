//! Configuration for the invoice back-office.
//!
//! Settings are assembled once at process start - an optional TOML file,
//! then `INVOICEBOX_*` environment overrides - and passed by reference into
//! services and the worker. There is no process-wide cached instance.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::validation::{RuleProfile, ValidationConfig};

/// Default interval between mailbox polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Default timeout for one mailbox API call.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

/// Mailbox polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxSettings {
    /// MailHog v2 API base URL.
    pub api_url: String,
    pub poll_interval_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8025/api/v2".to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub uploads_dir: PathBuf,
    /// Process-wide currency allow-list; tenants may override it.
    pub allowed_currencies: Vec<String>,
    pub rule_profile: RuleProfile,
    pub mailbox: MailboxSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("invoicebox");
        Self {
            database_url: data_dir.join("invoicebox.db").display().to_string(),
            uploads_dir: data_dir.join("uploads"),
            allowed_currencies: vec![
                "AED".to_string(),
                "USD".to_string(),
                "EUR".to_string(),
                "GBP".to_string(),
            ],
            rule_profile: RuleProfile::PerField,
            mailbox: MailboxSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings: explicit config file if given, `invoicebox.toml` in
    /// the working directory if present, defaults otherwise. Environment
    /// overrides are applied last.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = config_path
            .map(PathBuf::from)
            .or_else(|| {
                let local = PathBuf::from("invoicebox.toml");
                local.exists().then_some(local)
            });

        let mut settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Read(path.clone(), e))?;
                Self::parse(&content).map_err(|e| ConfigError::Parse(path, e))?
            }
            None => Self::default(),
        };

        settings.apply_env();
        Ok(settings)
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("INVOICEBOX_DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(dir) = std::env::var("INVOICEBOX_UPLOADS_DIR") {
            self.uploads_dir = PathBuf::from(shellexpand::tilde(&dir).into_owned());
        }
        if let Ok(currencies) = std::env::var("INVOICEBOX_ALLOWED_CURRENCIES") {
            self.allowed_currencies = currencies
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Ok(url) = std::env::var("INVOICEBOX_MAILBOX_URL") {
            self.mailbox.api_url = url;
        }
        if let Ok(secs) = std::env::var("INVOICEBOX_POLL_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                self.mailbox.poll_interval_secs = secs;
            }
        }
    }

    /// Rule engine configuration derived from these settings.
    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            default_currencies: self.allowed_currencies.clone(),
            profile: self.rule_profile,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.mailbox.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.mailbox.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.allowed_currencies, ["AED", "USD", "EUR", "GBP"]);
        assert_eq!(settings.rule_profile, RuleProfile::PerField);
        assert_eq!(settings.mailbox.poll_interval_secs, 15);
    }

    #[test]
    fn test_parse_partial_toml() {
        let settings = Settings::parse(
            r#"
            database_url = "/tmp/test.db"
            allowed_currencies = ["USD"]
            rule_profile = "consolidated"

            [mailbox]
            api_url = "http://mailhog:8025/api/v2"
            "#,
        )
        .unwrap();

        assert_eq!(settings.database_url, "/tmp/test.db");
        assert_eq!(settings.allowed_currencies, ["USD"]);
        assert_eq!(settings.rule_profile, RuleProfile::Consolidated);
        assert_eq!(settings.mailbox.api_url, "http://mailhog:8025/api/v2");
        // Unspecified values keep their defaults.
        assert_eq!(settings.mailbox.fetch_timeout_secs, 10);
    }
}
