// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./fleetvault.toml` > `~/.config/fleetvault/fleetvault.toml`
//! > `/etc/fleetvault/fleetvault.toml` with environment variable overrides via
//! the `FLEETVAULT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::FleetConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/fleetvault/fleetvault.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "fleetvault.toml";

/// Per-user configuration file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fleetvault").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/fleetvault/fleetvault.toml` (system-wide)
/// 3. `~/.config/fleetvault/fleetvault.toml` (user XDG config)
/// 4. `./fleetvault.toml` (local directory)
/// 5. `FLEETVAULT_*` environment variables
pub fn load_config() -> Result<FleetConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<FleetConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FleetConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FleetConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FleetConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FleetConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Map `FLEETVAULT_*` variables onto dotted keys.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `FLEETVAULT_DISPATCH_MAX_CONCURRENCY` must become
/// `dispatch.max_concurrency`, not `dispatch.max.concurrency`.
/// `FLEETVAULT_PASSPHRASE` is read by the passphrase prompt, not here.
fn env_provider() -> Env {
    Env::prefixed("FLEETVAULT_")
        .ignore(&["passphrase"])
        .map(|key| {
            let mapped = map_env_key(key.as_str());
            mapped.into()
        })
}

/// Turn a lowercased, prefix-stripped env var name into a dotted config key.
pub fn map_env_key(key: &str) -> String {
    for section in ["vault", "audit", "dispatch", "import", "logging"] {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}
