// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault file lifecycle: load, save, and record-level CRUD.
//!
//! The vault is one JSON array of [`EncryptedBlob`] strings. Every mutation
//! reads the whole file, decrypts every record, changes the in-memory view,
//! and writes the whole file back through a temp file and rename, so a crash
//! never leaves a half-written vault behind.
//!
//! - Additions append new blobs; existing blobs are written back untouched.
//! - Edits and removals re-encrypt every surviving record under a fresh nonce.
//! - A host index (first position per host) is rebuilt on every unlock.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use fleetvault_core::{CredentialRecord, EditField, FleetError};
use tracing::{debug, info};

use crate::cipher::{EncryptedBlob, decrypt_record, encrypt_record};
use crate::kdf::DerivedKey;

/// The durable, ordered collection of encrypted records.
#[derive(Debug, Clone)]
pub struct VaultStore {
    path: PathBuf,
}

/// Every record of a vault, decrypted, in insertion order.
///
/// Debug output comes from [`CredentialRecord`]'s, which omits passwords.
#[derive(Debug, Clone, Default)]
pub struct DecryptedVault {
    records: Vec<CredentialRecord>,
    index: HashMap<String, usize>,
}

impl DecryptedVault {
    pub fn from_records(records: Vec<CredentialRecord>) -> Self {
        let mut vault = Self {
            records,
            index: HashMap::new(),
        };
        vault.rebuild_index();
        vault
    }

    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CredentialRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of the first record for `host`.
    pub fn position(&self, host: &str) -> Option<usize> {
        self.index.get(host).copied()
    }

    pub fn get(&self, host: &str) -> Option<&CredentialRecord> {
        self.position(host).map(|i| &self.records[i])
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.index.contains_key(host)
    }

    fn push(&mut self, record: CredentialRecord) {
        self.index
            .entry(record.host.clone())
            .or_insert(self.records.len());
        self.records.push(record);
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, record) in self.records.iter().enumerate() {
            // First match wins for vaults written before duplicates were rejected.
            self.index.entry(record.host.clone()).or_insert(i);
        }
    }
}

impl VaultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read every blob. A missing file is an empty vault.
    pub fn load(&self) -> Result<Vec<EncryptedBlob>, FleetError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "vault file absent, treating as empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(FleetError::VaultIo {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice::<Vec<EncryptedBlob>>(&content).map_err(|e| {
            FleetError::CorruptVault {
                path: self.path.clone(),
                reason: format!("expected a JSON array of strings: {e}"),
            }
        })
    }

    /// Replace the vault file atomically with `blobs`.
    pub fn save(&self, blobs: &[EncryptedBlob]) -> Result<(), FleetError> {
        let io_err = |source| FleetError::VaultIo {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(io_err)?;

        let json = serde_json::to_vec(blobs)
            .map_err(|e| FleetError::Internal(format!("failed to serialize vault: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        debug!(path = %self.path.display(), count = blobs.len(), "vault written");
        Ok(())
    }

    /// Add one blob at the end of the vault.
    pub fn append(&self, blob: EncryptedBlob) -> Result<(), FleetError> {
        let mut blobs = self.load()?;
        blobs.push(blob);
        self.save(&blobs)
    }

    /// Decrypt the whole vault. Any undecryptable blob aborts with
    /// [`FleetError::Decryption`].
    pub fn unlock(&self, key: &DerivedKey) -> Result<DecryptedVault, FleetError> {
        Ok(self.open(key)?.1)
    }

    /// First record whose host matches, decrypting in insertion order and
    /// stopping at the match.
    pub fn find_by_host(&self, key: &DerivedKey, host: &str) -> Result<CredentialRecord, FleetError> {
        for blob in self.load()? {
            let record = decrypt_record(&blob, key)?;
            if record.host == host {
                return Ok(record);
            }
        }
        Err(FleetError::NotFound {
            host: host.to_string(),
        })
    }

    /// Validate and append one record.
    pub fn add(&self, key: &DerivedKey, record: CredentialRecord) -> Result<(), FleetError> {
        self.add_many(key, vec![record]).map(|_| ())
    }

    /// Validate and append several records with a single rewrite.
    ///
    /// Nothing is written if any record is invalid or duplicates a host
    /// already in the vault or earlier in the batch.
    pub fn add_many(&self, key: &DerivedKey, records: Vec<CredentialRecord>) -> Result<usize, FleetError> {
        if records.is_empty() {
            return Ok(0);
        }

        let (mut blobs, mut vault) = self.open(key)?;
        for record in &records {
            record.validate()?;
            if vault.contains_host(&record.host) {
                return Err(FleetError::DuplicateHost {
                    host: record.host.clone(),
                });
            }
            blobs.push(encrypt_record(record, key)?);
            vault.push(record.clone());
        }

        self.save(&blobs)?;
        info!(count = records.len(), "records added to vault");
        Ok(records.len())
    }

    /// Change one field of the record for `host` and rewrite the vault.
    ///
    /// Returns the updated record. On `NotFound` or a validation error the
    /// file is left untouched.
    pub fn edit(
        &self,
        key: &DerivedKey,
        host: &str,
        field: EditField,
        value: &str,
    ) -> Result<CredentialRecord, FleetError> {
        let mut vault = self.unlock(key)?;
        let position = vault.position(host).ok_or_else(|| FleetError::NotFound {
            host: host.to_string(),
        })?;

        let mut updated = vault.records[position].clone();
        updated.apply_edit(field, value)?;
        if updated.host != host && vault.contains_host(&updated.host) {
            return Err(FleetError::DuplicateHost {
                host: updated.host,
            });
        }

        vault.records[position] = updated.clone();
        vault.rebuild_index();
        self.write_all(key, &vault)?;
        info!(host = %host, field = %field, "vault record edited");
        Ok(updated)
    }

    /// Drop the first record for `host` and rewrite the vault.
    pub fn remove(&self, key: &DerivedKey, host: &str) -> Result<CredentialRecord, FleetError> {
        let mut vault = self.unlock(key)?;
        let position = vault.position(host).ok_or_else(|| FleetError::NotFound {
            host: host.to_string(),
        })?;

        let removed = vault.records.remove(position);
        vault.rebuild_index();
        self.write_all(key, &vault)?;
        info!(host = %host, "vault record removed");
        Ok(removed)
    }

    fn open(&self, key: &DerivedKey) -> Result<(Vec<EncryptedBlob>, DecryptedVault), FleetError> {
        let blobs = self.load()?;
        let records = blobs
            .iter()
            .map(|blob| decrypt_record(blob, key))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((blobs, DecryptedVault::from_records(records)))
    }

    /// Re-encrypt every record under a fresh nonce and save.
    fn write_all(&self, key: &DerivedKey, vault: &DecryptedVault) -> Result<(), FleetError> {
        let blobs = vault
            .records()
            .iter()
            .map(|record| encrypt_record(record, key))
            .collect::<Result<Vec<_>, _>>()?;
        self.save(&blobs)
    }
}
