// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record-level encryption: one [`CredentialRecord`] to one printable blob.
//!
//! Blob layout before base64: `nonce (12) || ciphertext || tag (16)`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fleetvault_core::{CredentialRecord, FleetError};
use ring::aead::NONCE_LEN;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{self, TAG_LEN};
use crate::kdf::DerivedKey;

/// One encrypted, base64-encoded credential record as stored in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedBlob(String);

impl EncryptedBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for EncryptedBlob {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Serialize `record` canonically and encrypt it under a fresh nonce.
pub fn encrypt_record(record: &CredentialRecord, key: &DerivedKey) -> Result<EncryptedBlob, FleetError> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(record)
            .map_err(|e| FleetError::Internal(format!("failed to serialize record: {e}")))?,
    );
    let (ciphertext, nonce) = crypto::seal(key.as_bytes(), &plaintext)?;

    let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);
    Ok(EncryptedBlob(STANDARD.encode(raw)))
}

/// Decrypt a blob back into a record.
///
/// Malformed base64, truncated input, authentication failure and
/// undecodable plaintext all yield [`FleetError::Decryption`].
pub fn decrypt_record(blob: &EncryptedBlob, key: &DerivedKey) -> Result<CredentialRecord, FleetError> {
    let raw = STANDARD
        .decode(blob.as_str())
        .map_err(|_| FleetError::Decryption)?;
    if raw.len() < NONCE_LEN + TAG_LEN {
        return Err(FleetError::Decryption);
    }

    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
    let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| FleetError::Decryption)?;
    let plaintext = Zeroizing::new(crypto::open(key.as_bytes(), &nonce, ciphertext)?);

    serde_json::from_slice(&plaintext).map_err(|_| FleetError::Decryption)
}
