// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for fleetvault.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type used across the vault, the dispatcher, and the CLI.
///
/// Vault-level variants (`Decryption`, `CorruptVault`, `VaultIo`) abort the
/// whole command. `RemoteSession` and `Timeout` are per-host and are turned
/// into dispatch outcomes instead of being propagated.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Malformed operator input (blank field, bad port, unknown package manager).
    #[error("invalid input: {0}")]
    Validation(String),

    /// Wrong key or corrupted blob. Deliberately carries no detail.
    #[error("decryption failed -- wrong key or corrupted vault data")]
    Decryption,

    /// The vault file exists but is not a JSON array of strings.
    #[error("vault file {path} is corrupt: {reason}")]
    CorruptVault { path: PathBuf, reason: String },

    /// No record in the vault matches the host.
    #[error("host `{host}` not found in vault")]
    NotFound { host: String },

    /// A record for the host already exists.
    #[error("host `{host}` already exists in vault")]
    DuplicateHost { host: String },

    /// Reading or writing the vault (or its salt file) failed.
    #[error("vault I/O error on {path}: {source}")]
    VaultIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Appending to or reading the audit log failed.
    #[error("audit log error: {source}")]
    Audit { source: std::io::Error },

    /// Connecting to or talking to one remote host failed.
    #[error("remote session error on {host}: {message}")]
    RemoteSession { host: String, message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Operator interrupt (Ctrl+C / SIGTERM).
    #[error("interrupted by operator")]
    Interrupted,

    /// Configuration errors outside of the figment diagnostics path.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Shorthand for a per-host session failure.
    pub fn remote(host: impl Into<String>, message: impl Into<String>) -> Self {
        FleetError::RemoteSession {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Whether this error invalidates the whole vault view and must abort the command.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FleetError::Decryption
                | FleetError::CorruptVault { .. }
                | FleetError::VaultIo { .. }
                | FleetError::Interrupted
                | FleetError::Config(_)
                | FleetError::Internal(_)
        )
    }
}
