// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PBKDF2-HMAC-SHA256 key derivation from a passphrase.
//!
//! The derivation is deterministic for a given (passphrase, salt, iterations)
//! triple. The salt is the compiled-in [`FIXED_SALT`] unless the vault has a
//! persisted per-vault salt next to it.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use fleetvault_config::model::VaultConfig;
use fleetvault_core::FleetError;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt shared by every vault that has no salt file of its own.
pub const FIXED_SALT: &[u8] = b"salt1234";

/// Length of a generated per-vault salt.
pub const SALT_LEN: usize = 16;

/// Length of a derived key.
pub const KEY_LEN: usize = 32;

/// A 32-byte symmetric key, zeroed on drop.
///
/// Debug output intentionally omits the key material.
#[derive(Clone)]
pub struct DerivedKey(Zeroizing<[u8; KEY_LEN]>);

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        ring::constant_time::verify_slices_are_equal(self.0.as_ref(), other.0.as_ref()).is_ok()
    }
}

impl Eq for DerivedKey {}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// URL-safe base64 form, suitable for passing the key directly.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(URL_SAFE.encode(self.0.as_ref()))
    }

    /// Parse a key previously produced by [`DerivedKey::to_base64`].
    pub fn from_base64(encoded: &str) -> Result<Self, FleetError> {
        let bytes = Zeroizing::new(URL_SAFE.decode(encoded.trim()).map_err(|_| {
            FleetError::Validation("derived key is not valid URL-safe base64".to_string())
        })?);
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            FleetError::Validation(format!(
                "derived key must decode to {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(key))
    }
}

/// Derive a 32-byte key from a passphrase.
pub fn derive_key(passphrase: &[u8], salt: &[u8], iterations: u32) -> Result<DerivedKey, FleetError> {
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| FleetError::Validation("PBKDF2 iterations must be non-zero".to_string()))?;

    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        passphrase,
        out.as_mut(),
    );
    Ok(DerivedKey(out))
}

/// Whether the caller is about to create records in the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaltAccess {
    /// Only reads, or edits records that must already exist.
    Read,
    /// May write the first record of a new vault.
    Write,
}

/// Resolve the salt for the vault and derive its key from `passphrase`.
pub fn derive_vault_key(
    passphrase: &SecretString,
    config: &VaultConfig,
    access: SaltAccess,
) -> Result<DerivedKey, FleetError> {
    let salt = resolve_salt(&config.path_buf(), config.per_vault_salt, access)?;
    let key = derive_key(
        passphrase.expose_secret().as_bytes(),
        &salt,
        PBKDF2_ITERATIONS,
    )?;
    debug!("vault key derived");
    Ok(key)
}

/// Path of the per-vault salt file for `vault_path`.
pub fn salt_path(vault_path: &Path) -> PathBuf {
    let mut name = vault_path.as_os_str().to_owned();
    name.push(".salt");
    PathBuf::from(name)
}

/// Pick the salt for a vault.
///
/// An existing salt file always wins. With `per_vault_salt` set, a vault
/// that does not exist yet gets a fresh random salt persisted beside it, but
/// only for [`SaltAccess::Write`]. Readers of a missing vault get the fixed
/// salt and touch nothing on disk. An existing vault without a salt file
/// keeps the fixed salt so it stays readable.
pub fn resolve_salt(
    vault_path: &Path,
    per_vault_salt: bool,
    access: SaltAccess,
) -> Result<Vec<u8>, FleetError> {
    let path = salt_path(vault_path);
    match std::fs::read_to_string(&path) {
        Ok(encoded) => {
            return STANDARD.decode(encoded.trim()).map_err(|_| FleetError::CorruptVault {
                path: path.clone(),
                reason: "salt file is not valid base64".to_string(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => return Err(FleetError::VaultIo { path, source }),
    }

    if !per_vault_salt {
        return Ok(FIXED_SALT.to_vec());
    }

    if vault_path.exists() {
        warn!(
            vault = %vault_path.display(),
            "per-vault salt requested but vault predates it; using the fixed salt"
        );
        return Ok(FIXED_SALT.to_vec());
    }

    // A missing vault holds no records, so any key reads it.
    if access == SaltAccess::Read {
        debug!(vault = %vault_path.display(), "vault absent, salt deferred to first write");
        return Ok(FIXED_SALT.to_vec());
    }

    let salt = generate_salt()?;
    write_salt(&path, &salt)?;
    info!(path = %path.display(), "generated per-vault salt");
    Ok(salt.to_vec())
}

/// Generate a random salt using the system CSPRNG.
pub fn generate_salt() -> Result<[u8; SALT_LEN], FleetError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| FleetError::Internal("failed to generate random salt".to_string()))?;
    Ok(salt)
}

fn write_salt(path: &Path, salt: &[u8]) -> Result<(), FleetError> {
    let io_err = |source| FleetError::VaultIo {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, STANDARD.encode(salt)).map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(io_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low iteration count keeps unit tests fast; the production constant is
    // exercised by the integration tests.
    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn derive_key_is_deterministic() {
        let key1 = derive_key(b"passphrase", FIXED_SALT, TEST_ITERATIONS).unwrap();
        let key2 = derive_key(b"passphrase", FIXED_SALT, TEST_ITERATIONS).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn different_passphrase_gives_different_key() {
        let key1 = derive_key(b"one", FIXED_SALT, TEST_ITERATIONS).unwrap();
        let key2 = derive_key(b"two", FIXED_SALT, TEST_ITERATIONS).unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn different_salt_gives_different_key() {
        let key1 = derive_key(b"same", b"salt-a", TEST_ITERATIONS).unwrap();
        let key2 = derive_key(b"same", b"salt-b", TEST_ITERATIONS).unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(matches!(
            derive_key(b"p", FIXED_SALT, 0),
            Err(FleetError::Validation(_))
        ));
    }

    #[test]
    fn matches_pbkdf2_sha256_reference_vector() {
        // RFC 7914 section 11: PBKDF2-HMAC-SHA256("passwd", "salt", c=1).
        let key = derive_key(b"passwd", b"salt", 1).unwrap();
        assert_eq!(
            &key.as_bytes()[..8],
            &[0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]
        );
    }

    #[test]
    fn base64_form_round_trips_and_is_url_safe() {
        let key = derive_key(b"k", FIXED_SALT, TEST_ITERATIONS).unwrap();
        let encoded = key.to_base64();
        assert_eq!(encoded.len(), 44);
        assert!(!encoded.contains('+') && !encoded.contains('/'));
        assert_eq!(DerivedKey::from_base64(&encoded).unwrap(), key);
    }

    #[test]
    fn from_base64_rejects_wrong_length() {
        assert!(DerivedKey::from_base64("c2hvcnQ=").is_err());
        assert!(DerivedKey::from_base64("not base64 !!").is_err());
    }

    #[test]
    fn debug_hides_key() {
        let key = DerivedKey::from_bytes([7u8; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "DerivedKey([REDACTED])");
    }

    #[test]
    fn salt_path_appends_suffix() {
        assert_eq!(
            salt_path(Path::new("/var/lib/fv/connections.json")),
            PathBuf::from("/var/lib/fv/connections.json.salt")
        );
    }

    #[test]
    fn fixed_salt_used_when_per_vault_salt_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let vault = dir.path().join("connections.json");
        assert_eq!(resolve_salt(&vault, false, SaltAccess::Write).unwrap(), FIXED_SALT);
        assert!(!salt_path(&vault).exists());
    }

    #[test]
    fn per_vault_salt_is_generated_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let vault = dir.path().join("connections.json");

        let first = resolve_salt(&vault, true, SaltAccess::Write).unwrap();
        assert_eq!(first.len(), SALT_LEN);
        assert!(salt_path(&vault).exists());

        let second = resolve_salt(&vault, true, SaltAccess::Write).unwrap();
        assert_eq!(first, second);

        // Turning the flag off later must not change the key.
        let third = resolve_salt(&vault, false, SaltAccess::Write).unwrap();
        assert_eq!(first, third);
    }

    #[test]
    fn existing_vault_without_salt_keeps_fixed_salt() {
        let dir = tempfile::tempdir().unwrap();
        let vault = dir.path().join("connections.json");
        std::fs::write(&vault, "[]").unwrap();

        assert_eq!(resolve_salt(&vault, true, SaltAccess::Write).unwrap(), FIXED_SALT);
        assert!(!salt_path(&vault).exists());
    }

    #[test]
    fn readers_of_missing_vault_create_no_salt() {
        let dir = tempfile::tempdir().unwrap();
        let vault = dir.path().join("data").join("connections.json");

        assert_eq!(resolve_salt(&vault, true, SaltAccess::Read).unwrap(), FIXED_SALT);
        assert!(!salt_path(&vault).exists());
        assert!(!dir.path().join("data").exists());

        let written = resolve_salt(&vault, true, SaltAccess::Write).unwrap();
        assert_eq!(written.len(), SALT_LEN);
        assert_eq!(resolve_salt(&vault, true, SaltAccess::Read).unwrap(), written);
    }
}
