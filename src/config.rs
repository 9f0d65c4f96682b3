//! Configuration file parser for ~/.config/rss2push/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
//!
//! Sink credentials are layered: command-line flag, then environment
//! variable (both handled by clap), then this file. Resolution happens once
//! at startup, before any feed is touched.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::DEFAULT_TIMEOUT;
use crate::notify::{EmailTemplate, PushoverSink, SendySink, SinkSet, TemplateError};
use crate::util::UrlValidationError;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("{sink} required parameters missing: {}", .fields.join(", "))]
    MissingCredentials {
        sink: &'static str,
        fields: Vec<&'static str>,
    },

    #[error("You must use either sendy or pushover")]
    NoSinkEnabled,

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Invalid Sendy hostname: {0}")]
    InvalidHostname(#[from] UrlValidationError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed list location. Defaults to `feeds.txt` in the config directory.
    pub feeds_file: Option<PathBuf>,

    /// Seen-state database location. Defaults to `seen.db` in the config directory.
    pub seen_db: Option<PathBuf>,

    /// Per-request timeout for feeds and sinks, in seconds.
    pub timeout_secs: u64,

    /// Feeds processed at the same time. 1 = sequential.
    pub concurrency: usize,

    pub pushover: PushoverConfig,

    pub sendy: SendyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds_file: None,
            seen_db: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            concurrency: 4,
            pushover: PushoverConfig::default(),
            sendy: SendyConfig::default(),
        }
    }
}

/// `[pushover]` table.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct PushoverConfig {
    /// Enable for `send` without passing `--use-pushover`.
    pub enabled: bool,
    pub api_key: Option<String>,
    pub user_key: Option<String>,
}

/// `[sendy]` table.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SendyConfig {
    pub enabled: bool,
    pub hostname: Option<String>,
    pub api_key: Option<String>,
    pub list_id: Option<String>,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub template: Option<PathBuf>,
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "[REDACTED]")
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("feeds_file", &self.feeds_file)
            .field("seen_db", &self.seen_db)
            .field("timeout_secs", &self.timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("pushover", &self.pushover)
            .field("sendy", &self.sendy)
            .finish()
    }
}

impl std::fmt::Debug for PushoverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &redact(&self.api_key))
            .field("user_key", &redact(&self.user_key))
            .finish()
    }
}

impl std::fmt::Debug for SendyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendyConfig")
            .field("enabled", &self.enabled)
            .field("hostname", &self.hostname)
            .field("api_key", &redact(&self.api_key))
            .field("list_id", &self.list_id)
            .field("from_name", &self.from_name)
            .field("from_email", &self.from_email)
            .field("template", &self.template)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "feeds_file",
        "seen_db",
        "timeout_secs",
        "concurrency",
        "pushover",
        "sendy",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            0 => DEFAULT_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    /// Merges command-line/environment Pushover values over the file.
    ///
    /// Returns `Ok(None)` when Pushover is not enabled anywhere.
    pub fn resolve_pushover(
        &self,
        overrides: PushoverOverrides,
    ) -> Result<Option<PushoverSettings>, ConfigError> {
        if !(overrides.enabled || self.pushover.enabled) {
            return Ok(None);
        }

        let api_key = pick(overrides.api_key, &self.pushover.api_key);
        let user_key = pick(overrides.user_key, &self.pushover.user_key);

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push("api key");
        }
        if user_key.is_none() {
            missing.push("user key");
        }

        match (api_key, user_key) {
            (Some(api_key), Some(user_key)) => Ok(Some(PushoverSettings {
                api_key: SecretString::from(api_key),
                user_key: SecretString::from(user_key),
            })),
            _ => Err(ConfigError::MissingCredentials {
                sink: "pushover",
                fields: missing,
            }),
        }
    }

    /// Merges command-line/environment Sendy values over the file and loads
    /// the email template, if any.
    pub fn resolve_sendy(
        &self,
        overrides: SendyOverrides,
    ) -> Result<Option<SendySettings>, ConfigError> {
        if !(overrides.enabled || self.sendy.enabled) {
            return Ok(None);
        }

        let file = &self.sendy;
        let hostname = pick(overrides.hostname, &file.hostname);
        let api_key = pick(overrides.api_key, &file.api_key);
        let list_id = pick(overrides.list_id, &file.list_id);
        let from_name = pick(overrides.from_name, &file.from_name);
        let from_email = pick(overrides.from_email, &file.from_email);

        let mut missing = Vec::new();
        for (field, value) in [
            ("api hostname", &hostname),
            ("api key", &api_key),
            ("list id", &list_id),
            ("from name", &from_name),
            ("from email", &from_email),
        ] {
            if value.is_none() {
                missing.push(field);
            }
        }

        let (Some(hostname), Some(api_key), Some(list_id), Some(from_name), Some(from_email)) =
            (hostname, api_key, list_id, from_name, from_email)
        else {
            return Err(ConfigError::MissingCredentials {
                sink: "sendy",
                fields: missing,
            });
        };

        let template = match overrides.template.or_else(|| file.template.clone()) {
            Some(path) => Some(EmailTemplate::load(&path)?),
            None => None,
        };

        Ok(Some(SendySettings {
            hostname,
            api_key: SecretString::from(api_key),
            list_id,
            from_name,
            from_email,
            template,
        }))
    }
}

/// Flag value if given, else the file value. Blank strings count as unset.
fn pick(flag: Option<String>, file: &Option<String>) -> Option<String> {
    flag.or_else(|| file.clone())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Resolved sink settings
// ============================================================================

/// Pushover values from the command line and environment.
#[derive(Debug, Clone, Default)]
pub struct PushoverOverrides {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub user_key: Option<String>,
}

/// Sendy values from the command line and environment.
#[derive(Debug, Clone, Default)]
pub struct SendyOverrides {
    pub enabled: bool,
    pub hostname: Option<String>,
    pub api_key: Option<String>,
    pub list_id: Option<String>,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub template: Option<PathBuf>,
}

#[derive(Debug)]
pub struct PushoverSettings {
    pub api_key: SecretString,
    pub user_key: SecretString,
}

#[derive(Debug)]
pub struct SendySettings {
    pub hostname: String,
    pub api_key: SecretString,
    pub list_id: String,
    pub from_name: String,
    pub from_email: String,
    pub template: Option<EmailTemplate>,
}

/// The sinks a run will dispatch to, after validation.
#[derive(Debug, Default)]
pub struct SinkSelection {
    pub pushover: Option<PushoverSettings>,
    pub sendy: Option<SendySettings>,
}

impl SinkSelection {
    /// Fails with [`ConfigError::NoSinkEnabled`] when nothing is selected.
    pub fn require_any(self) -> Result<Self, ConfigError> {
        if self.pushover.is_none() && self.sendy.is_none() {
            return Err(ConfigError::NoSinkEnabled);
        }
        Ok(self)
    }

    /// Builds the sinks, Pushover first, sharing `client`.
    pub fn into_sinks(self, client: &reqwest::Client) -> Result<SinkSet, ConfigError> {
        let mut sinks = SinkSet::new();
        if let Some(p) = self.pushover {
            sinks = sinks.with(PushoverSink::new(client.clone(), p.api_key, p.user_key));
        }
        if let Some(s) = self.sendy {
            let mut sink = SendySink::new(
                client.clone(),
                &s.hostname,
                s.api_key,
                s.list_id,
                s.from_name,
                s.from_email,
            )?;
            if let Some(template) = s.template {
                sink = sink.with_template(template);
            }
            sinks = sinks.with(sink);
        }
        Ok(sinks)
    }
}

// ============================================================================
// Tests
// ============================================================================
