// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Isolated vault, audit log and config rooted in a temp directory.

use std::sync::Arc;

use fleetvault_audit::AuditLog;
use fleetvault_config::model::FleetConfig;
use fleetvault_core::{CredentialRecord, FleetError, PackageManager};
use fleetvault_vault::kdf::FIXED_SALT;
use fleetvault_vault::{DerivedKey, VaultStore, derive_key};

/// Iteration count used by tests; the production count is far slower.
pub const TEST_KDF_ITERATIONS: u32 = 1_000;

/// A throwaway fleet: temp dir, config pointing into it, vault and audit log.
pub struct TestFleet {
    pub config: FleetConfig,
    pub store: VaultStore,
    pub audit: Arc<AuditLog>,
    pub key: DerivedKey,
    // Held so the directory outlives the fleet.
    _dir: tempfile::TempDir,
}

impl TestFleet {
    pub fn new() -> Result<Self, FleetError> {
        let dir = tempfile::tempdir().map_err(|e| FleetError::Internal(e.to_string()))?;
        let mut config = FleetConfig::default();
        config.vault.path = dir.path().join("connections.json").display().to_string();
        config.audit.path = dir.path().join("fleetvault.log").display().to_string();
        config.import.descriptor_path = dir.path().join("list.json").display().to_string();

        let store = VaultStore::new(config.vault.path_buf());
        let audit = Arc::new(AuditLog::new(config.audit.path_buf()));
        let key = derive_key(b"test passphrase", FIXED_SALT, TEST_KDF_ITERATIONS)?;
        Ok(Self {
            config,
            store,
            audit,
            key,
            _dir: dir,
        })
    }

    /// Create a fleet whose vault already holds `hosts`.
    pub fn with_hosts(hosts: &[&str]) -> Result<Self, FleetError> {
        let fleet = Self::new()?;
        let records = hosts.iter().map(|h| sample_record(h)).collect();
        fleet.store.add_many(&fleet.key, records)?;
        Ok(fleet)
    }

    pub fn records(&self) -> Result<Vec<CredentialRecord>, FleetError> {
        Ok(self.store.unlock(&self.key)?.into_records())
    }
}

/// A valid record for `host` with a host-specific password.
pub fn sample_record(host: &str) -> CredentialRecord {
    CredentialRecord {
        user: "ops".to_string(),
        host: host.to_string(),
        port: 22,
        password: format!("pw-{host}"),
        passwordless_sudo: false,
        package_manager: PackageManager::Apt,
    }
}
