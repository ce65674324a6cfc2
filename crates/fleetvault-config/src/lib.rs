// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for fleetvault.
//!
//! TOML configuration with strict key checking (`deny_unknown_fields`), XDG
//! file hierarchy lookup, `FLEETVAULT_*` environment overrides, and miette
//! diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use fleetvault_config::load_and_validate;
//!
//! let config = load_and_validate(None).expect("config errors");
//! println!("vault: {}", config.vault.path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::FleetConfig;

/// Load configuration and validate it.
///
/// With `explicit_path`, only that file (plus env overrides) is read;
/// otherwise the XDG hierarchy is merged. Figment errors are converted into
/// diagnostics carrying source spans where the offending file can be read.
pub fn load_and_validate(explicit_path: Option<&Path>) -> Result<FleetConfig, Vec<ConfigError>> {
    let loaded = match explicit_path {
        Some(path) => loader::load_config_from_path(path),
        None => loader::load_config(),
    };
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = collect_toml_sources(explicit_path);
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<FleetConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

fn collect_toml_sources(explicit_path: Option<&Path>) -> Vec<(String, String)> {
    let candidates: Vec<std::path::PathBuf> = match explicit_path {
        Some(path) => vec![path.to_path_buf()],
        None => {
            let mut paths = vec![std::path::PathBuf::from(loader::SYSTEM_CONFIG_PATH)];
            paths.extend(loader::user_config_path());
            if let Ok(dir) = std::env::current_dir() {
                paths.push(dir.join(loader::LOCAL_CONFIG_FILE));
            }
            paths
        }
    };

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
