// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, non-zero limits, and known log levels.

use crate::diagnostic::ConfigError;
use crate::model::{FleetConfig, MAX_CONCURRENCY};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &FleetConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.vault.path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "vault.path must not be empty".to_string(),
        });
    }

    if config.audit.path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "audit.path must not be empty".to_string(),
        });
    }

    if config.audit.tail_lines == 0 {
        errors.push(ConfigError::Validation {
            message: "audit.tail_lines must be at least 1".to_string(),
        });
    }

    if config.dispatch.max_concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.max_concurrency must be at least 1".to_string(),
        });
    }

    if config.dispatch.max_concurrency > MAX_CONCURRENCY {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.max_concurrency ({}) must not exceed {MAX_CONCURRENCY}",
                config.dispatch.max_concurrency
            ),
        });
    }

    if config.dispatch.task_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.task_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.dispatch.connect_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.connect_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.dispatch.connect_timeout_secs > config.dispatch.task_timeout_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.connect_timeout_secs ({}) must not exceed dispatch.task_timeout_secs ({})",
                config.dispatch.connect_timeout_secs, config.dispatch.task_timeout_secs
            ),
        });
    }

    if config.import.descriptor_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "import.descriptor_path must not be empty".to_string(),
        });
    }

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
