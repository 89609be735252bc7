// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the integration engine.
//!
//! Configuration is passed to [`IntegrationEngine::new()`](crate::IntegrationEngine::new)
//! through a `watch` channel. Every scheduler tick and trigger takes a
//! snapshot of the current value, so a running invocation never sees a
//! config change half-way through.
//!
//! # Quick Start
//!
//! ```rust
//! use integration_engine::config::IntegrationConfig;
//!
//! let config = IntegrationConfig::from_json_str(r#"{
//!     "frappe": { "baseUrl": "https://erp.example.com", "apiKey": "k", "apiSecret": "s" },
//!     "source": { "baseUrl": "https://hr.example.com/api", "apiToken": "t" }
//! }"#).unwrap();
//! assert!(config.frappe.enabled);
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! IntegrationConfig
//! ├── frappe: FrappeConfig          # primary ERP (enabled, baseUrl, apiKey, apiSecret, timeout, retryAttempts)
//! ├── generic: GenericConfig        # generic ERP (enabled, baseUrl, authType, token, username, password)
//! ├── sync: SyncSettings
//! │   ├── employee|payroll|accounting|leave: EntitySyncConfig
//! │   └── singleFlight: bool        # serialize same-entity invocations
//! ├── source: SourceConfig          # HR system (baseUrl, apiToken)
//! ├── errorDirectory: path          # dead-letter files
//! ├── redelivery: RedeliveryConfig  # outer retry pacing
//! ├── errorHandling: ErrorHandlingConfig
//! └── server: ServerConfig          # trigger gateway bind address
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "frappe": { "enabled": true, "baseUrl": "https://erp.local", "apiKey": "k", "apiSecret": "s", "timeout": "30s" },
//!   "generic": { "enabled": true, "baseUrl": "https://other.local", "authType": "api-key", "token": "t" },
//!   "sync": {
//!     "employee": { "enabled": true, "batchSize": 50 },
//!     "accounting": { "enabled": true, "period": "12h" }
//!   },
//!   "errorDirectory": "/var/lib/integration/errors"
//! }
//! ```

use crate::error::{IntegrationError, Result};
use crate::model::EntityType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `IntegrationEngine::new()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    /// Primary ERP destination.
    #[serde(default)]
    pub frappe: FrappeConfig,

    /// Generic ERP destination.
    #[serde(default)]
    pub generic: GenericConfig,

    /// Per-entity scheduling and batch sizes.
    #[serde(default)]
    pub sync: SyncSettings,

    /// HR source system.
    #[serde(default)]
    pub source: SourceConfig,

    /// Directory that receives dead-letter files.
    #[serde(default = "default_error_directory")]
    pub error_directory: PathBuf,

    #[serde(default)]
    pub redelivery: RedeliveryConfig,

    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_error_directory() -> PathBuf {
    PathBuf::from("./errors")
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            frappe: FrappeConfig::default(),
            generic: GenericConfig::default(),
            sync: SyncSettings::default(),
            source: SourceConfig::default(),
            error_directory: default_error_directory(),
            redelivery: RedeliveryConfig::default(),
            error_handling: ErrorHandlingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl IntegrationConfig {
    /// Create a config pointing every remote system at `base_url`, with
    /// millisecond waits so tests do not sleep for real.
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            frappe: FrappeConfig {
                enabled: true,
                base_url: base_url.to_string(),
                api_key: "test-key".to_string(),
                api_secret: "test-secret".to_string(),
                timeout: "2s".to_string(),
                retry_attempts: 3,
            },
            generic: GenericConfig {
                base_url: base_url.to_string(),
                ..GenericConfig::default()
            },
            source: SourceConfig {
                base_url: format!("{}/api", base_url.trim_end_matches('/')),
                api_token: "test-token".to_string(),
            },
            redelivery: RedeliveryConfig {
                initial_delay: "10ms".to_string(),
                backoff_multiplier: 2.0,
                max_delay: "100ms".to_string(),
            },
            error_handling: ErrorHandlingConfig {
                rate_limit_wait: "10ms".to_string(),
                timeout_wait: "1ms".to_string(),
                connection_wait: "1ms".to_string(),
            },
            ..Self::default()
        }
    }

    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| IntegrationError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            IntegrationError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Check that every duration parses and enabled destinations are addressable.
    pub fn validate(&self) -> Result<()> {
        check_duration("frappe.timeout", &self.frappe.timeout)?;
        check_duration("redelivery.initialDelay", &self.redelivery.initial_delay)?;
        check_duration("redelivery.maxDelay", &self.redelivery.max_delay)?;
        check_duration("errorHandling.rateLimitWait", &self.error_handling.rate_limit_wait)?;
        check_duration("errorHandling.timeoutWait", &self.error_handling.timeout_wait)?;
        check_duration("errorHandling.connectionWait", &self.error_handling.connection_wait)?;

        for entity in EntityType::ALL {
            let cfg = self.sync.get(entity);
            if let Some(d) = &cfg.initial_delay {
                check_duration(&format!("sync.{entity}.initialDelay"), d)?;
            }
            if let Some(p) = &cfg.period {
                check_duration(&format!("sync.{entity}.period"), p)?;
                if humantime::parse_duration(p).map(|d| d.is_zero()).unwrap_or(false) {
                    return Err(IntegrationError::Config(format!(
                        "sync.{entity}.period must be greater than zero"
                    )));
                }
            }
            if cfg.batch_size == Some(0) {
                return Err(IntegrationError::Config(format!(
                    "sync.{entity}.batchSize must be at least 1"
                )));
            }
        }

        if self.frappe.enabled && self.frappe.base_url.trim().is_empty() {
            return Err(IntegrationError::Config(
                "frappe.baseUrl is required when frappe is enabled".to_string(),
            ));
        }
        if self.generic.enabled && self.generic.base_url.trim().is_empty() {
            return Err(IntegrationError::Config(
                "generic.baseUrl is required when generic is enabled".to_string(),
            ));
        }
        if self.redelivery.backoff_multiplier < 1.0 {
            return Err(IntegrationError::Config(
                "redelivery.backoffMultiplier must be >= 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Timeout applied to every outbound request.
    pub fn request_timeout(&self) -> Duration {
        parse_or(&self.frappe.timeout, Duration::from_secs(30))
    }
}

fn check_duration(key: &str, value: &str) -> Result<()> {
    humantime::parse_duration(value)
        .map(|_| ())
        .map_err(|e| IntegrationError::Config(format!("{key}: invalid duration {value:?}: {e}")))
}

fn parse_or(value: &str, fallback: Duration) -> Duration {
    humantime::parse_duration(value).unwrap_or(fallback)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Destinations
// ═══════════════════════════════════════════════════════════════════════════════

/// Primary ERP (Frappe-style `/api/resource/<DocType>` API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrappeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_frappe_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Request timeout (humantime, e.g. `"30s"`).
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Total delivery attempts per job before dead-lettering.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_true() -> bool {
    true
}

fn default_frappe_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

impl Default for FrappeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_frappe_base_url(),
            api_key: String::new(),
            api_secret: String::new(),
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

/// Generic ERP with a configurable auth scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    /// One of `bearer`, `basic`, `api-key`.
    #[serde(default = "default_auth_type")]
    pub auth_type: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_auth_type() -> String {
    "bearer".to_string()
}

impl Default for GenericConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            auth_type: default_auth_type(),
            token: String::new(),
            username: String::new(),
            password: String::new(),
        }
    }
}

/// HR source-of-record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Base URL including any API prefix (e.g. `http://hr.local/api`).
    #[serde(default = "default_source_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
}

fn default_source_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_base_url(),
            api_token: String::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SyncSettings: per-entity schedules
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-entity sync options.
///
/// Every field is optional; anything left out falls back to the entity's
/// built-in default (see [`EntitySchedule::defaults`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncConfig {
    pub enabled: Option<bool>,
    pub batch_size: Option<usize>,
    /// Delay before the first scheduled run (humantime).
    pub initial_delay: Option<String>,
    /// Interval between scheduled runs (humantime).
    pub period: Option<String>,
    /// Calendar expression. Recognized but not evaluated; the fixed period applies.
    pub cron: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default)]
    pub employee: EntitySyncConfig,
    #[serde(default)]
    pub payroll: EntitySyncConfig,
    #[serde(default)]
    pub accounting: EntitySyncConfig,
    #[serde(default)]
    pub leave: EntitySyncConfig,
    /// Skip an invocation when one for the same entity is still running.
    #[serde(default)]
    pub single_flight: bool,
}

impl SyncSettings {
    pub fn get(&self, entity: EntityType) -> &EntitySyncConfig {
        match entity {
            EntityType::Employee => &self.employee,
            EntityType::Payroll => &self.payroll,
            EntityType::Accounting => &self.accounting,
            EntityType::Leave => &self.leave,
        }
    }

    pub fn get_mut(&mut self, entity: EntityType) -> &mut EntitySyncConfig {
        match entity {
            EntityType::Employee => &mut self.employee,
            EntityType::Payroll => &mut self.payroll,
            EntityType::Accounting => &mut self.accounting,
            EntityType::Leave => &mut self.leave,
        }
    }

    /// Resolved schedule for `entity`, with defaults applied.
    pub fn schedule(&self, entity: EntityType) -> EntitySchedule {
        let defaults = EntitySchedule::defaults(entity);
        let cfg = self.get(entity);
        EntitySchedule {
            enabled: cfg.enabled.unwrap_or(defaults.enabled),
            batch_size: cfg.batch_size.unwrap_or(defaults.batch_size),
            initial_delay: cfg
                .initial_delay
                .as_deref()
                .map(|d| parse_or(d, defaults.initial_delay))
                .unwrap_or(defaults.initial_delay),
            period: cfg
                .period
                .as_deref()
                .map(|p| parse_or(p, defaults.period))
                .unwrap_or(defaults.period),
            cron: cfg.cron.clone(),
        }
    }
}

/// Fully resolved per-entity schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchedule {
    pub enabled: bool,
    pub batch_size: usize,
    pub initial_delay: Duration,
    pub period: Duration,
    pub cron: Option<String>,
}

impl EntitySchedule {
    /// Built-in defaults.
    ///
    /// ```text
    /// Entity      Enabled  Batch  Initial  Period
    /// ----------  -------  -----  -------  ------
    /// employee    yes      100    60s      2h
    /// payroll     yes      50     120s     3h
    /// accounting  no       50     300s     24h
    /// leave       yes      100    180s     3h
    /// ```
    pub fn defaults(entity: EntityType) -> Self {
        let (enabled, batch_size, initial, period) = match entity {
            EntityType::Employee => (true, 100, 60, 2 * 3600),
            EntityType::Payroll => (true, 50, 120, 3 * 3600),
            EntityType::Accounting => (false, 50, 300, 24 * 3600),
            EntityType::Leave => (true, 100, 180, 3 * 3600),
        };
        Self {
            enabled,
            batch_size,
            initial_delay: Duration::from_secs(initial),
            period: Duration::from_secs(period),
            cron: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Redelivery and error handling
// ═══════════════════════════════════════════════════════════════════════════════

/// Pacing of whole-invocation redelivery.
///
/// The attempt cap comes from `frappe.retryAttempts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeliveryConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay: String,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay: String,
}

fn default_initial_delay() -> String {
    "5s".to_string()
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> String {
    "5m".to_string()
}

impl Default for RedeliveryConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
        }
    }
}

impl RedeliveryConfig {
    pub fn initial_delay(&self) -> Duration {
        parse_or(&self.initial_delay, Duration::from_secs(5))
    }

    pub fn max_delay(&self) -> Duration {
        parse_or(&self.max_delay, Duration::from_secs(300))
    }
}

/// Fixed waits applied by the error classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHandlingConfig {
    #[serde(default = "default_rate_limit_wait")]
    pub rate_limit_wait: String,
    #[serde(default = "default_timeout_wait")]
    pub timeout_wait: String,
    #[serde(default = "default_connection_wait")]
    pub connection_wait: String,
}

fn default_rate_limit_wait() -> String {
    "30s".to_string()
}

fn default_timeout_wait() -> String {
    "5s".to_string()
}

fn default_connection_wait() -> String {
    "10s".to_string()
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            rate_limit_wait: default_rate_limit_wait(),
            timeout_wait: default_timeout_wait(),
            connection_wait: default_connection_wait(),
        }
    }
}

impl ErrorHandlingConfig {
    pub fn rate_limit_wait(&self) -> Duration {
        parse_or(&self.rate_limit_wait, Duration::from_secs(30))
    }

    pub fn timeout_wait(&self) -> Duration {
        parse_or(&self.timeout_wait, Duration::from_secs(5))
    }

    pub fn connection_wait(&self) -> Duration {
        parse_or(&self.connection_wait, Duration::from_secs(10))
    }
}

/// Trigger gateway listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8083".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}
