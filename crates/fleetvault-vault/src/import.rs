// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk import of host credentials from a JSON descriptor.
//!
//! The descriptor supports two modes that may be combined: one shared set
//! of credentials applied to a list of hosts, and a list of independent
//! connections. Legacy field names (`ip`, `passwordSudo`, `manager`) are
//! accepted alongside the record names.

use std::path::Path;
use std::str::FromStr;

use fleetvault_core::types::{DEFAULT_SSH_PORT, parse_flag, parse_port};
use fleetvault_core::{CredentialRecord, FleetError, PackageManager};
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// Parsed import descriptor.
#[derive(Debug, Default, Deserialize)]
pub struct ImportDescriptor {
    /// Apply `creds` to every entry of `ips`.
    #[serde(rename = "loop", default)]
    pub shared: bool,
    #[serde(default, alias = "hosts")]
    pub ips: Vec<String>,
    #[serde(default)]
    pub creds: Option<SharedCredentials>,
    #[serde(default)]
    pub connections: Vec<ImportedConnection>,
}

/// Credentials shared by every host in shared mode.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCredentials {
    pub user: String,
    #[serde(default = "default_port", deserialize_with = "de_port")]
    pub port: u16,
    pub password: String,
    #[serde(default, alias = "passwordSudo", deserialize_with = "de_flag")]
    pub passwordless_sudo: bool,
    #[serde(alias = "manager")]
    pub package_manager: String,
}

impl std::fmt::Debug for SharedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCredentials")
            .field("user", &self.user)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .field("passwordless_sudo", &self.passwordless_sudo)
            .field("package_manager", &self.package_manager)
            .finish()
    }
}

/// One independently specified connection.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedConnection {
    pub user: String,
    #[serde(alias = "ip")]
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "de_port")]
    pub port: u16,
    pub password: String,
    #[serde(default, alias = "passwordSudo", deserialize_with = "de_flag")]
    pub passwordless_sudo: bool,
    #[serde(alias = "manager")]
    pub package_manager: String,
}

impl std::fmt::Debug for ImportedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportedConnection")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

fn de_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => u16::try_from(n)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| serde::de::Error::custom(format!("port {n} out of range"))),
        PortValue::Text(s) if s.trim().is_empty() => Ok(DEFAULT_SSH_PORT),
        PortValue::Text(s) => parse_port(&s).map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Text(String),
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match FlagValue::deserialize(deserializer)? {
        FlagValue::Bool(b) => Ok(b),
        FlagValue::Text(s) => parse_flag(&s).map_err(serde::de::Error::custom),
    }
}

fn parse_manager(value: &str) -> Result<PackageManager, FleetError> {
    PackageManager::from_str(value.trim()).map_err(|_| {
        FleetError::Validation(format!(
            "unknown package manager `{}` (expected apt, dnf, yum or pacman)",
            value.trim()
        ))
    })
}

/// Read and parse a descriptor file.
pub fn read_descriptor(path: &Path) -> Result<ImportDescriptor, FleetError> {
    let content = std::fs::read_to_string(path).map_err(|source| FleetError::VaultIo {
        path: path.to_path_buf(),
        source,
    })?;
    ImportDescriptor::from_json(&content)
}

impl ImportDescriptor {
    pub fn from_json(content: &str) -> Result<Self, FleetError> {
        serde_json::from_str(content)
            .map_err(|e| FleetError::Validation(format!("invalid import descriptor: {e}")))
    }

    /// Expand the descriptor into validated records, shared mode first.
    pub fn into_records(self) -> Result<Vec<CredentialRecord>, FleetError> {
        let mut records = Vec::with_capacity(self.ips.len() + self.connections.len());

        if self.shared {
            let creds = self.creds.ok_or_else(|| {
                FleetError::Validation("`loop` is set but `creds` is missing".to_string())
            })?;
            let package_manager = parse_manager(&creds.package_manager)?;
            for ip in &self.ips {
                records.push(CredentialRecord {
                    user: creds.user.clone(),
                    host: ip.trim().to_string(),
                    port: creds.port,
                    password: creds.password.clone(),
                    passwordless_sudo: creds.passwordless_sudo,
                    package_manager,
                });
            }
            debug!(count = self.ips.len(), "expanded shared-credential hosts");
        }

        for conn in self.connections {
            records.push(CredentialRecord {
                package_manager: parse_manager(&conn.package_manager)?,
                user: conn.user,
                host: conn.host.trim().to_string(),
                port: conn.port,
                password: conn.password,
                passwordless_sudo: conn.passwordless_sudo,
            });
        }

        for record in &records {
            record.validate()?;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"{
        "loop": true,
        "ips": ["10.0.0.1", "10.0.0.2"],
        "creds": {"user": "ops", "port": "2222", "password": "pw",
                  "passwordSudo": "y", "manager": "apt"},
        "connections": [
            {"user": "root", "ip": "10.0.0.9", "port": 22, "password": "pw9",
             "passwordSudo": "", "manager": "Pacman"}
        ]
    }"#;

    #[test]
    fn legacy_descriptor_expands_both_modes() {
        let records = ImportDescriptor::from_json(LEGACY)
            .unwrap()
            .into_records()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].host, "10.0.0.1");
        assert_eq!(records[1].port, 2222);
        assert!(records[1].passwordless_sudo);
        assert_eq!(records[2].host, "10.0.0.9");
        assert!(!records[2].passwordless_sudo);
        assert_eq!(records[2].package_manager, PackageManager::Pacman);
    }

    #[test]
    fn record_field_names_are_accepted() {
        let json = r#"{"connections": [
            {"user": "u", "host": "h", "password": "p",
             "passwordlessSudo": true, "packageManager": "dnf"}
        ]}"#;
        let records = ImportDescriptor::from_json(json)
            .unwrap()
            .into_records()
            .unwrap();
        assert_eq!(records[0].port, 22);
        assert!(records[0].passwordless_sudo);
        assert_eq!(records[0].package_manager, PackageManager::Dnf);
    }

    #[test]
    fn shared_hosts_ignored_without_loop() {
        let json = r#"{"loop": false, "ips": ["a", "b"], "connections": []}"#;
        let records = ImportDescriptor::from_json(json)
            .unwrap()
            .into_records()
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn loop_without_creds_is_rejected() {
        let json = r#"{"loop": true, "ips": ["a"]}"#;
        let err = ImportDescriptor::from_json(json)
            .unwrap()
            .into_records()
            .unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));
    }

    #[test]
    fn unknown_manager_is_rejected() {
        let json = r#"{"connections": [
            {"user": "u", "ip": "h", "password": "p", "manager": "brew"}
        ]}"#;
        assert!(
            ImportDescriptor::from_json(json)
                .unwrap()
                .into_records()
                .is_err()
        );
    }

    #[test]
    fn out_of_range_port_fails_to_parse() {
        let json = r#"{"connections": [
            {"user": "u", "ip": "h", "port": 70000, "password": "p", "manager": "apt"}
        ]}"#;
        assert!(ImportDescriptor::from_json(json).is_err());
    }

    #[test]
    fn debug_output_hides_passwords() {
        let descriptor = ImportDescriptor::from_json(LEGACY).unwrap();
        let debug = format!("{descriptor:?}");
        assert!(!debug.contains("pw9"));
        assert!(!debug.contains("\"pw\""));
    }
}
