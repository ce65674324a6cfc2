// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for fleetvault.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level fleetvault configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FleetConfig {
    /// Encrypted credential vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Plain-text audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Concurrent dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Bulk import settings.
    #[serde(default)]
    pub import: ImportConfig,

    /// Diagnostic logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Credential vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Path to the vault file (JSON array of encrypted records).
    #[serde(default = "default_vault_path")]
    pub path: String,

    /// Generate and persist a random salt for new vaults instead of the
    /// compiled-in one. The salt file is created by the first command that
    /// adds records; read-only commands leave a missing vault untouched.
    #[serde(default)]
    pub per_vault_salt: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
            per_vault_salt: false,
        }
    }
}

impl VaultConfig {
    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

fn default_vault_path() -> String {
    data_file("connections.json")
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Path to the append-only audit log.
    #[serde(default = "default_audit_path")]
    pub path: String,

    /// Number of lines shown by `fleetvault log` when none is given.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl AuditConfig {
    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

fn default_audit_path() -> String {
    data_file("fleetvault.log")
}

fn default_tail_lines() -> usize {
    25
}

/// Largest accepted `dispatch.max_concurrency`.
pub const MAX_CONCURRENCY: usize = 1024;

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum number of hosts worked on at the same time, 1 to
    /// [`MAX_CONCURRENCY`].
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Deadline for one host, covering connect and command execution.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// TCP connect timeout per host.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Lines of command output kept per host outcome.
    #[serde(default = "default_output_tail_lines")]
    pub output_tail_lines: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            task_timeout_secs: default_task_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            output_tail_lines: default_output_tail_lines(),
        }
    }
}

impl DispatchConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_max_concurrency() -> usize {
    16
}

fn default_task_timeout_secs() -> u64 {
    // Full upgrades on slow mirrors routinely take tens of minutes.
    3600
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_output_tail_lines() -> usize {
    20
}

/// Bulk import configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// Descriptor read by `fleetvault import` when no file is given.
    #[serde(default = "default_descriptor_path")]
    pub descriptor_path: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            descriptor_path: default_descriptor_path(),
        }
    }
}

fn default_descriptor_path() -> String {
    "list.json".to_string()
}

/// Diagnostic logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("fleetvault").join(name))
        .unwrap_or_else(|| PathBuf::from(name))
        .to_string_lossy()
        .into_owned()
}
