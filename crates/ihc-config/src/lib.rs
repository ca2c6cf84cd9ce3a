//! Configuration for the IHC bridge.
//!
//! TOML file plus `IHC_`-prefixed environment overrides, credential
//! resolution (env + keyring + plaintext), and translation into the
//! engine's `BindingConfig`, `ControllerEndpoint` and item table.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use ihc_api::ResourceId;
use ihc_core::{BindingConfig, ControllerEndpoint, ItemBinding, ItemKind, StaticProvider};

const KEYRING_SERVICE: &str = "ihc-bridge";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing [controller] {field}")]
    Missing { field: &'static str },

    #[error("no password configured for user '{username}'")]
    NoCredentials { username: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerSection,

    #[serde(default)]
    pub binding: BindingSection,

    /// Bound items, one `[[items]]` table each.
    #[serde(default)]
    pub items: Vec<ItemEntry>,
}

/// Where the controller lives and how to log in.
#[derive(Debug, Deserialize, Serialize)]
pub struct ControllerSection {
    /// Controller base URL (e.g., "https://192.168.1.3").
    pub url: Option<String>,

    pub username: Option<String>,

    /// Password (plaintext — prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            password_env: None,
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

/// Engine tuning. Every field falls back to the engine default.
#[derive(Debug, Deserialize, Serialize)]
pub struct BindingSection {
    #[serde(default = "default_true")]
    pub refresh_enabled: bool,
    #[serde(default = "default_refresh_tick_ms")]
    pub refresh_tick_ms: u64,
    #[serde(default = "default_wait_secs")]
    pub notification_timeout_secs: u64,
    #[serde(default = "default_wait_secs")]
    pub state_change_timeout_secs: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_recovery_backoff_ms")]
    pub recovery_backoff_ms: u64,
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

impl Default for BindingSection {
    fn default() -> Self {
        Self {
            refresh_enabled: true,
            refresh_tick_ms: default_refresh_tick_ms(),
            notification_timeout_secs: default_wait_secs(),
            state_change_timeout_secs: default_wait_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            recovery_backoff_ms: default_recovery_backoff_ms(),
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_refresh_tick_ms() -> u64 {
    1000
}
fn default_wait_secs() -> u64 {
    10
}
fn default_settle_delay_ms() -> u64 {
    1000
}
fn default_recovery_backoff_ms() -> u64 {
    1000
}
fn default_error_backoff_ms() -> u64 {
    5000
}

/// One bound item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemEntry {
    pub name: String,

    /// Controller resource id, decimal or `0x` hex.
    #[serde(deserialize_with = "resource_id")]
    pub resource: ResourceId,

    /// Item kind: number, switch, contact, datetime or string.
    pub kind: String,

    /// Poll interval in seconds; 0 relies on notifications only.
    #[serde(default)]
    pub refresh: u32,

    /// Never update the item from controller notifications.
    #[serde(default)]
    pub out_only: bool,
}

impl ItemEntry {
    pub fn item_kind(&self) -> Result<ItemKind, ConfigError> {
        self.kind.parse().map_err(|_| {
            invalid(
                format!("items.{}.kind", self.name),
                format!(
                    "expected number, switch, contact, datetime or string, got '{}'",
                    self.kind
                ),
            )
        })
    }

    pub fn binding(&self) -> ItemBinding {
        let binding = ItemBinding::new(&self.name, self.resource).with_refresh(self.refresh);
        if self.out_only {
            binding.out_only()
        } else {
            binding
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawResource {
    Number(i64),
    Text(String),
}

fn resource_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ResourceId, D::Error> {
    use serde::de::Error as _;

    match RawResource::deserialize(deserializer)? {
        RawResource::Number(n) => ResourceId::try_from(n)
            .map_err(|_| D::Error::custom(format!("resource id {n} out of range"))),
        RawResource::Text(text) => parse_resource_id(&text).ok_or_else(|| {
            D::Error::custom(format!("expected decimal or 0x hex resource id, got '{text}'"))
        }),
    }
}

fn parse_resource_id(text: &str) -> Option<ResourceId> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => ResourceId::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "ihc-bridge", "ihc-bridge").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("ihc-bridge");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the Config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment.
///
/// Environment keys nest on double underscores, so
/// `IHC_BINDING__REFRESH_TICK_MS=500` overrides `[binding] refresh_tick_ms`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("IHC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    /// Check the item table: non-empty unique names, positive resource
    /// ids, known kinds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.name.trim().is_empty() {
                return Err(invalid("items.name", "item names must not be empty"));
            }
            if !seen.insert(item.name.as_str()) {
                return Err(invalid(
                    format!("items.{}", item.name),
                    "duplicate item name",
                ));
            }
            if item.resource <= 0 {
                return Err(invalid(
                    format!("items.{}.resource", item.name),
                    format!("resource ids are positive, got {}", item.resource),
                ));
            }
            item.item_kind()?;
        }
        Ok(())
    }

    pub fn binding_config(&self) -> BindingConfig {
        let b = &self.binding;
        BindingConfig {
            refresh_tick: Duration::from_millis(b.refresh_tick_ms),
            refresh_enabled: b.refresh_enabled,
            notification_timeout: Duration::from_secs(b.notification_timeout_secs),
            state_change_timeout: Duration::from_secs(b.state_change_timeout_secs),
            settle_delay: Duration::from_millis(b.settle_delay_ms),
            recovery_backoff: Duration::from_millis(b.recovery_backoff_ms),
            error_backoff: Duration::from_millis(b.error_backoff_ms),
        }
    }

    /// Build the item table after validating it.
    pub fn item_table(&self) -> Result<StaticProvider, ConfigError> {
        self.validate()?;
        let provider = StaticProvider::new();
        for item in &self.items {
            provider.insert(item.binding(), item.item_kind()?);
        }
        Ok(provider)
    }

    /// Controller endpoint with the password resolved.
    pub fn endpoint(&self) -> Result<ControllerEndpoint, ConfigError> {
        let section = &self.controller;
        let raw_url = section
            .url
            .as_deref()
            .ok_or(ConfigError::Missing { field: "url" })?;
        let url: url::Url = raw_url
            .parse()
            .map_err(|_| invalid("controller.url", format!("invalid URL: {raw_url}")))?;
        let username = section
            .username
            .clone()
            .or_else(|| std::env::var("IHC_USERNAME").ok())
            .ok_or(ConfigError::Missing { field: "username" })?;
        let password = resolve_password(section, &username)?;

        Ok(ControllerEndpoint {
            url,
            username,
            password,
            timeout: Duration::from_secs(section.timeout),
        })
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the controller password.
///
/// Order: the section's `password_env` variable, `IHC_PASSWORD`, the
/// system keyring (service `ihc-bridge`, account = username), then the
/// plaintext `password`.
pub fn resolve_password(
    section: &ControllerSection,
    username: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(ref env_name) = section.password_env {
        if let Ok(pw) = std::env::var(env_name) {
            return Ok(SecretString::from(pw));
        }
    }

    // 2. Well-known env var
    if let Ok(pw) = std::env::var("IHC_PASSWORD") {
        return Ok(SecretString::from(pw));
    }

    // 3. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, username) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = section.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        username: username.into(),
    })
}
