// src/config/app.rs
use std::time::Duration;
use std::{env, fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::notify::sms_gateway_address;
use crate::report::DEFAULT_LINK;
use crate::source::county_html::DEFAULT_SOURCE_URL;

const ENV_SMTP_PASS: &str = "SMTP_PASS";

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}
fn default_source_timeout_secs() -> u64 {
    20
}
fn default_send_timeout_secs() -> u64 {
    30
}
fn default_batch_gap_secs() -> u64 {
    5
}
fn default_link() -> String {
    DEFAULT_LINK.to_string()
}
fn default_trend_days() -> i64 {
    3
}
fn default_average_days() -> i64 {
    7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneCredential {
    pub number: String,
    pub carrier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailCredentials {
    pub user: String,
    /// "ENV" means: read from SMTP_PASS
    pub pass: String,
    /// SMTP relay host.
    pub url: String,
    /// Sender address when `user` is not one.
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            timeout_secs: default_source_timeout_secs(),
        }
    }
}

impl SourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    #[serde(default = "default_send_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum pause between the update batch and the analysis batch.
    #[serde(default = "default_batch_gap_secs")]
    pub batch_gap_secs: u64,
    #[serde(default = "default_link")]
    pub link: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_send_timeout_secs(),
            batch_gap_secs: default_batch_gap_secs(),
            link: default_link(),
        }
    }
}

impl NotifySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn batch_gap(&self) -> Duration {
        Duration::from_secs(self.batch_gap_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default = "default_trend_days")]
    pub trend_days: i64,
    #[serde(default = "default_average_days")]
    pub average_days: i64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            trend_days: default_trend_days(),
            average_days: default_average_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub phone_credentials: Vec<PhoneCredential>,
    pub email_credentials: EmailCredentials,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub notify: NotifySettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
}

impl AppConfig {
    /// Load from JSON (default) or TOML (by `.toml` extension) and validate.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&data, &ext).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        let mut cfg: AppConfig = if hint_ext == "toml" {
            toml::from_str(s).context("parsing TOML config")?
        } else {
            serde_json::from_str(s).context("parsing JSON config")?
        };

        // Resolve password if "ENV"
        if cfg.email_credentials.pass.trim().eq_ignore_ascii_case("env") {
            cfg.email_credentials.pass = env::var(ENV_SMTP_PASS)
                .map_err(|_| anyhow!("Missing {ENV_SMTP_PASS} env var"))?;
        }

        for (name, value) in [
            ("email_credentials.user", &cfg.email_credentials.user),
            ("email_credentials.url", &cfg.email_credentials.url),
            ("source.url", &cfg.source.url),
        ] {
            if value.trim().is_empty() {
                bail!("{name} must not be empty");
            }
        }

        // Zero timeouts would make every call fail immediately.
        if cfg.source.timeout_secs == 0 {
            cfg.source.timeout_secs = default_source_timeout_secs();
        }
        if cfg.notify.timeout_secs == 0 {
            cfg.notify.timeout_secs = default_send_timeout_secs();
        }

        cfg.recipients()?;
        if cfg.phone_credentials.is_empty() {
            tracing::warn!(target: "config", "no phone_credentials configured; updates will not be texted");
        }
        Ok(cfg)
    }

    /// SMS gateway addresses for every configured phone.
    pub fn recipients(&self) -> Result<Vec<String>> {
        self.phone_credentials
            .iter()
            .map(|p| sms_gateway_address(&p.number, &p.carrier))
            .collect()
    }
}
