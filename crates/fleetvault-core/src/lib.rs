// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for fleetvault.
//!
//! This crate provides the error type, the credential and dispatch types,
//! and the remote session traits shared by every other crate in the
//! workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FleetError;
pub use traits::{RemoteSession, SessionConnector};
pub use types::{
    CredentialRecord, EditField, ExitReport, Operation, Outcome, OutcomeStatus, PackageManager,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_vault_level() {
        assert!(FleetError::Decryption.is_fatal());
        assert!(FleetError::Interrupted.is_fatal());
        assert!(
            FleetError::CorruptVault {
                path: "v.json".into(),
                reason: "x".into()
            }
            .is_fatal()
        );
        assert!(!FleetError::NotFound { host: "h".into() }.is_fatal());
        assert!(!FleetError::remote("h", "refused").is_fatal());
        assert!(!FleetError::Validation("bad".into()).is_fatal());
    }

    #[test]
    fn decryption_error_does_not_leak_cause() {
        let msg = FleetError::Decryption.to_string();
        assert!(msg.contains("wrong key or corrupted"));
    }

    #[test]
    fn session_traits_are_object_safe() {
        fn _assert_connector(_: &dyn SessionConnector) {}
        fn _assert_session(_: &dyn RemoteSession) {}
    }
}
