// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-invocation state shared by every command.

use std::sync::Arc;

use fleetvault_audit::AuditLog;
use fleetvault_config::FleetConfig;
use fleetvault_core::FleetError;
use fleetvault_vault::{DerivedKey, SaltAccess, VaultStore, derive_vault_key, get_passphrase};
use tracing::debug;

/// How the operator supplied the vault key.
#[derive(Debug, Default, Clone)]
pub struct KeySource {
    /// `--key`: passphrase given on the command line.
    pub passphrase: Option<String>,
    /// `--derived-key`: base64 key, skips derivation.
    pub derived: Option<String>,
}

/// Configured vault and audit log for one command run.
pub struct App {
    pub config: FleetConfig,
    pub store: VaultStore,
    pub audit: Arc<AuditLog>,
}

impl App {
    pub fn new(config: FleetConfig) -> Self {
        let store = VaultStore::new(config.vault.path_buf());
        let audit = Arc::new(AuditLog::new(config.audit.path_buf()));
        Self {
            config,
            store,
            audit,
        }
    }

    /// Resolve the vault key from `source`, prompting when needed.
    ///
    /// Only [`SaltAccess::Write`] may create a per-vault salt file.
    pub fn key(&self, source: KeySource, access: SaltAccess) -> Result<DerivedKey, FleetError> {
        if let Some(encoded) = source.derived {
            debug!("using derived key from command line");
            return DerivedKey::from_base64(&encoded);
        }
        let passphrase = get_passphrase(source.passphrase)?;
        derive_vault_key(&passphrase, &self.config.vault, access)
    }
}
