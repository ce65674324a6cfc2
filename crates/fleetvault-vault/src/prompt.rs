// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase acquisition via command line, FLEETVAULT_PASSPHRASE, or TTY prompt.

use fleetvault_core::FleetError;
use secrecy::SecretString;

/// The environment variable name for providing the vault passphrase.
pub const PASSPHRASE_ENV_VAR: &str = "FLEETVAULT_PASSPHRASE";

/// Get the vault passphrase.
///
/// Priority:
/// 1. `explicit` (the `--key` option)
/// 2. `FLEETVAULT_PASSPHRASE` environment variable (for cron and CI)
/// 3. Interactive TTY prompt via `rpassword`
pub fn get_passphrase(explicit: Option<String>) -> Result<SecretString, FleetError> {
    if let Some(key) = explicit {
        if key.is_empty() {
            return Err(FleetError::Validation(
                "empty passphrase not allowed".to_string(),
            ));
        }
        return Ok(SecretString::from(key));
    }

    if let Ok(key) = std::env::var(PASSPHRASE_ENV_VAR)
        && !key.is_empty()
    {
        return Ok(SecretString::from(key));
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let passphrase = rpassword::prompt_password("Vault passphrase: ")
            .map_err(|e| FleetError::Internal(format!("failed to read passphrase: {e}")))?;
        if passphrase.is_empty() {
            return Err(FleetError::Validation(
                "empty passphrase not allowed".to_string(),
            ));
        }
        return Ok(SecretString::from(passphrase));
    }

    Err(FleetError::Validation(
        "No passphrase provided. Pass --key, set FLEETVAULT_PASSPHRASE, or run interactively."
            .to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn explicit_key_wins_over_env() {
        // SAFETY: test-only env mutation, serialized.
        unsafe { std::env::set_var(PASSPHRASE_ENV_VAR, "from-env") };
        let result = get_passphrase(Some("from-flag".to_string()));
        unsafe { std::env::remove_var(PASSPHRASE_ENV_VAR) };

        assert_eq!(result.unwrap().expose_secret(), "from-flag");
    }

    #[test]
    #[serial]
    fn env_var_is_used_without_flag() {
        unsafe { std::env::set_var(PASSPHRASE_ENV_VAR, "from-env") };
        let result = get_passphrase(None);
        unsafe { std::env::remove_var(PASSPHRASE_ENV_VAR) };

        assert_eq!(result.unwrap().expose_secret(), "from-env");
    }

    #[test]
    fn empty_explicit_key_is_rejected() {
        assert!(matches!(
            get_passphrase(Some(String::new())),
            Err(FleetError::Validation(_))
        ));
    }
}
