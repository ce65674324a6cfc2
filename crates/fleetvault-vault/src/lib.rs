// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encrypted SSH credential vault.
//!
//! Each host record is serialized to JSON and sealed independently under a
//! key derived from the operator's passphrase with PBKDF2-HMAC-SHA256. The
//! vault file is a JSON array of the resulting base64 blobs.

pub mod cipher;
pub mod crypto;
pub mod import;
pub mod kdf;
pub mod prompt;
pub mod store;

pub use cipher::{EncryptedBlob, decrypt_record, encrypt_record};
pub use import::{ImportDescriptor, read_descriptor};
pub use kdf::{DerivedKey, SaltAccess, derive_key, derive_vault_key};
pub use prompt::get_passphrase;
pub use store::{DecryptedVault, VaultStore};
