// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for record encryption and vault persistence.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fleetvault_core::{CredentialRecord, FleetError, PackageManager};
use fleetvault_vault::{DerivedKey, EncryptedBlob, VaultStore, decrypt_record, encrypt_record};
use proptest::prelude::*;

fn arb_manager() -> impl Strategy<Value = PackageManager> {
    prop_oneof![
        Just(PackageManager::Apt),
        Just(PackageManager::Dnf),
        Just(PackageManager::Yum),
        Just(PackageManager::Pacman),
    ]
}

fn arb_record() -> impl Strategy<Value = CredentialRecord> {
    (
        "[a-z][a-z0-9_]{0,15}",
        "[a-z0-9.-]{1,30}",
        1u16..,
        "\\PC{1,40}",
        any::<bool>(),
        arb_manager(),
    )
        .prop_map(
            |(user, host, port, password, passwordless_sudo, package_manager)| CredentialRecord {
                user,
                host,
                port,
                password,
                passwordless_sudo,
                package_manager,
            },
        )
}

fn arb_key() -> impl Strategy<Value = DerivedKey> {
    any::<[u8; 32]>().prop_map(DerivedKey::from_bytes)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn decrypt_inverts_encrypt(record in arb_record(), key in arb_key()) {
        let blob = encrypt_record(&record, &key).unwrap();
        prop_assert_eq!(decrypt_record(&blob, &key).unwrap(), record);
    }

    #[test]
    fn flipping_any_byte_is_detected(
        record in arb_record(),
        key in arb_key(),
        index in any::<prop::sample::Index>(),
        mask in 1u8..,
    ) {
        let blob = encrypt_record(&record, &key).unwrap();
        let mut raw = STANDARD.decode(blob.as_str()).unwrap();
        let i = index.index(raw.len());
        raw[i] ^= mask;

        let tampered = EncryptedBlob::from(STANDARD.encode(&raw));
        prop_assert!(matches!(
            decrypt_record(&tampered, &key),
            Err(FleetError::Decryption)
        ));
    }

    #[test]
    fn other_key_is_rejected(record in arb_record(), k1 in arb_key(), k2 in arb_key()) {
        prop_assume!(k1 != k2);
        let blob = encrypt_record(&record, &k1).unwrap();
        prop_assert!(matches!(decrypt_record(&blob, &k2), Err(FleetError::Decryption)));
    }

    #[test]
    fn truncated_blob_is_rejected(record in arb_record(), key in arb_key(), keep in 0usize..28) {
        let blob = encrypt_record(&record, &key).unwrap();
        let raw = STANDARD.decode(blob.as_str()).unwrap();
        let truncated = EncryptedBlob::from(STANDARD.encode(&raw[..keep]));
        prop_assert!(matches!(decrypt_record(&truncated, &key), Err(FleetError::Decryption)));
    }

    #[test]
    fn save_then_load_preserves_blobs(blobs in prop::collection::vec("[A-Za-z0-9+/=]{0,40}", 0..12)) {
        let dir = tempfile::tempdir().unwrap();
        let store = VaultStore::new(dir.path().join("connections.json"));
        let blobs: Vec<EncryptedBlob> = blobs.into_iter().map(EncryptedBlob::from).collect();

        store.save(&blobs).unwrap();
        prop_assert_eq!(store.load().unwrap(), blobs);
    }
}
