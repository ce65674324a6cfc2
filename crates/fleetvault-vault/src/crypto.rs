// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Every call to [`seal`] draws a fresh random 96-bit nonce from the system
//! CSPRNG. Nonce reuse under one key would break GCM.

use fleetvault_core::FleetError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Length of the authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

fn aead_key(key: &[u8; 32]) -> Result<LessSafeKey, FleetError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| FleetError::Internal("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt plaintext with AES-256-GCM using a random nonce.
///
/// Returns `(ciphertext_with_tag, nonce_bytes)`.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN]), FleetError> {
    let key = aead_key(key)?;

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| FleetError::Internal("failed to generate random nonce".to_string()))?;

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::empty(),
        &mut in_out,
    )
    .map_err(|_| FleetError::Internal("AES-256-GCM encryption failed".to_string()))?;

    Ok((in_out, nonce_bytes))
}

/// Decrypt and authenticate `ciphertext` (which ends with the tag).
///
/// Any failure is reported as [`FleetError::Decryption`] so that a wrong key
/// and tampered data are indistinguishable to the caller.
pub fn open(
    key: &[u8; 32],
    nonce_bytes: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, FleetError> {
    let key = aead_key(key).map_err(|_| FleetError::Decryption)?;

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext = key
        .open_in_place(
            Nonce::assume_unique_for_key(*nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| FleetError::Decryption)?;

    Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn seal_open_roundtrip() {
        let (ciphertext, nonce) = seal(&KEY, b"ssh password").unwrap();
        assert_eq!(open(&KEY, &nonce, &ciphertext).unwrap(), b"ssh password");
    }

    #[test]
    fn seal_uses_fresh_nonce_each_call() {
        let (ct1, nonce1) = seal(&KEY, b"same input").unwrap();
        let (ct2, nonce2) = seal(&KEY, b"same input").unwrap();
        assert_ne!(nonce1, nonce2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn ciphertext_carries_tag() {
        let (ciphertext, _) = seal(&KEY, b"hello").unwrap();
        assert_eq!(ciphertext.len(), 5 + TAG_LEN);
    }

    #[test]
    fn wrong_key_is_decryption_error() {
        let (ciphertext, nonce) = seal(&KEY, b"data").unwrap();
        let other = [0x43; 32];
        assert!(matches!(
            open(&other, &nonce, &ciphertext),
            Err(FleetError::Decryption)
        ));
    }

    #[test]
    fn tampered_tag_is_decryption_error() {
        let (mut ciphertext, nonce) = seal(&KEY, b"data").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x80;
        assert!(matches!(
            open(&KEY, &nonce, &ciphertext),
            Err(FleetError::Decryption)
        ));
    }
}
