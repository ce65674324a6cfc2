// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the vault, the dispatcher, and the CLI.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::FleetError;

/// Default SSH port applied when none is given.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Package manager used on a remote host.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
}

impl PackageManager {
    /// Shell command that upgrades every package on the host.
    pub fn update_command(&self) -> &'static str {
        match self {
            PackageManager::Apt => "sudo apt update && sudo apt upgrade -y",
            PackageManager::Dnf => "sudo dnf upgrade -y",
            PackageManager::Yum => "sudo yum update -y",
            PackageManager::Pacman => "sudo pacman -Syu --noconfirm",
        }
    }
}

/// Remote maintenance operation dispatched to every host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    /// Connectivity and sudo check.
    Test,
    /// Full package upgrade.
    Update,
}

impl Operation {
    /// Shell command issued for this operation on a host using `manager`.
    pub fn command_for(&self, manager: PackageManager) -> &'static str {
        match self {
            Operation::Test => "sudo whoami",
            Operation::Update => manager.update_command(),
        }
    }
}

/// Credentials and settings for one remote host.
///
/// Field order is the canonical serialization order used for encryption.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CredentialRecord {
    pub user: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub password: String,
    pub passwordless_sudo: bool,
    pub package_manager: PackageManager,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .field("passwordless_sudo", &self.passwordless_sudo)
            .field("package_manager", &self.package_manager)
            .finish()
    }
}

impl CredentialRecord {
    /// Check the invariants every stored record must satisfy.
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.user.trim().is_empty() {
            return Err(FleetError::Validation("user must not be blank".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(FleetError::Validation("host must not be blank".to_string()));
        }
        if self.port == 0 {
            return Err(FleetError::Validation(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(FleetError::Validation(
                "password must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// `user@host:port` label used in listings and log lines.
    pub fn label(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    /// Replace one field with a parsed value.
    pub fn apply_edit(&mut self, field: EditField, value: &str) -> Result<(), FleetError> {
        match field {
            EditField::User => self.user = value.trim().to_string(),
            EditField::Host => self.host = value.trim().to_string(),
            EditField::Port => self.port = parse_port(value)?,
            EditField::Password => self.password = value.to_string(),
            EditField::PasswordlessSudo => self.passwordless_sudo = parse_flag(value)?,
            EditField::PackageManager => {
                self.package_manager = PackageManager::from_str(value.trim()).map_err(|_| {
                    FleetError::Validation(format!(
                        "unknown package manager `{}` (expected apt, dnf, yum or pacman)",
                        value.trim()
                    ))
                })?
            }
        }
        self.validate()
    }
}

/// Record field that can be changed with an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum EditField {
    #[strum(to_string = "user", serialize = "username")]
    User,
    #[strum(to_string = "host", serialize = "ip")]
    Host,
    #[strum(to_string = "port")]
    Port,
    #[strum(to_string = "password")]
    Password,
    #[strum(
        to_string = "passwordless_sudo",
        serialize = "passwordlesssudo",
        serialize = "password_sudo",
        serialize = "passwordsudo",
        serialize = "sudo"
    )]
    PasswordlessSudo,
    #[strum(
        to_string = "package_manager",
        serialize = "packagemanager",
        serialize = "manager"
    )]
    PackageManager,
}

impl EditField {
    /// Parse operator input such as `IP`, `passwordless sudo` or `package-manager`.
    pub fn parse(input: &str) -> Result<Self, FleetError> {
        let normalized: String = input
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        EditField::from_str(&normalized).map_err(|_| {
            FleetError::Validation(format!(
                "unknown field `{}` (expected user, host, port, password, passwordless_sudo or package_manager)",
                input.trim()
            ))
        })
    }
}

/// Parse a port number, rejecting 0 and anything above 65535.
pub fn parse_port(input: &str) -> Result<u16, FleetError> {
    match input.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(FleetError::Validation(format!(
            "port `{}` must be a number between 1 and 65535",
            input.trim()
        ))),
        Ok(port) => Ok(port),
    }
}

/// Parse a yes/no answer. Blank counts as no.
pub fn parse_flag(input: &str) -> Result<bool, FleetError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => Ok(true),
        "" | "n" | "no" | "false" => Ok(false),
        other => Err(FleetError::Validation(format!(
            "expected yes or no, got `{other}`"
        ))),
    }
}

/// Exit status and captured output of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub exit_status: i32,
    pub output: String,
}

/// Final state of one dispatched host task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    /// Could not reach or authenticate to the host.
    ConnectFailed,
    /// Connected, but the command errored or exited nonzero.
    CommandFailed,
    /// The per-task deadline elapsed.
    TimedOut,
    /// The operator interrupted the dispatch.
    Cancelled,
}

/// Result of running one operation against one host.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub host: String,
    pub operation: Operation,
    pub status: OutcomeStatus,
    pub message: String,
    pub exit_status: Option<i32>,
    /// Tail of the command output, with the host password redacted.
    pub output: Vec<String>,
}

impl Outcome {
    pub fn new(
        host: impl Into<String>,
        operation: Operation,
        status: OutcomeStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            operation,
            status,
            message: message.into(),
            exit_status: None,
            output: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CredentialRecord {
        CredentialRecord {
            user: "ops".into(),
            host: "10.0.0.5".into(),
            port: 22,
            password: "x".into(),
            passwordless_sudo: false,
            package_manager: PackageManager::Apt,
        }
    }

    #[test]
    fn canonical_json_uses_camel_case_in_field_order() {
        let json = serde_json::to_string(&record()).unwrap();
        assert_eq!(
            json,
            r#"{"user":"ops","host":"10.0.0.5","port":22,"password":"x","passwordlessSudo":false,"packageManager":"apt"}"#
        );
    }

    #[test]
    fn missing_port_defaults_to_22() {
        let json = r#"{"user":"a","host":"h","password":"p","passwordlessSudo":true,"packageManager":"dnf"}"#;
        let parsed: CredentialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.port, 22);
        assert_eq!(parsed.package_manager, PackageManager::Dnf);
    }

    #[test]
    fn debug_output_hides_password() {
        let mut r = record();
        r.password = "hunter2-secret".into();
        let debug = format!("{r:?}");
        assert!(!debug.contains("hunter2-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let mut r = record();
        r.user = "  ".into();
        assert!(matches!(r.validate(), Err(FleetError::Validation(_))));

        let mut r = record();
        r.host.clear();
        assert!(r.validate().is_err());

        let mut r = record();
        r.port = 0;
        assert!(r.validate().is_err());

        let mut r = record();
        r.password.clear();
        assert!(r.validate().is_err());
    }

    #[test]
    fn edit_field_accepts_legacy_names() {
        assert_eq!(EditField::parse("IP").unwrap(), EditField::Host);
        assert_eq!(EditField::parse("port").unwrap(), EditField::Port);
        assert_eq!(
            EditField::parse("passwordless sudo").unwrap(),
            EditField::PasswordlessSudo
        );
        assert_eq!(
            EditField::parse("package manager").unwrap(),
            EditField::PackageManager
        );
        assert_eq!(EditField::parse("manager").unwrap(), EditField::PackageManager);
        assert!(EditField::parse("colour").is_err());
    }

    #[test]
    fn apply_edit_normalizes_port_to_integer() {
        let mut r = record();
        r.apply_edit(EditField::Port, " 2222 ").unwrap();
        assert_eq!(r.port, 2222);
        assert!(r.apply_edit(EditField::Port, "70000").is_err());
        assert!(r.apply_edit(EditField::Port, "ssh").is_err());
    }

    #[test]
    fn apply_edit_parses_flags_and_managers() {
        let mut r = record();
        r.apply_edit(EditField::PasswordlessSudo, "Yes").unwrap();
        assert!(r.passwordless_sudo);
        r.apply_edit(EditField::PackageManager, "Pacman").unwrap();
        assert_eq!(r.package_manager, PackageManager::Pacman);
        assert!(r.apply_edit(EditField::PackageManager, "brew").is_err());
    }

    #[test]
    fn parse_flag_treats_blank_as_no() {
        assert!(!parse_flag("").unwrap());
        assert!(parse_flag("Y").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn operation_commands_match_package_manager() {
        assert_eq!(Operation::Test.command_for(PackageManager::Yum), "sudo whoami");
        assert_eq!(
            Operation::Update.command_for(PackageManager::Apt),
            "sudo apt update && sudo apt upgrade -y"
        );
        assert_eq!(
            Operation::Update.command_for(PackageManager::Pacman),
            "sudo pacman -Syu --noconfirm"
        );
    }

    #[test]
    fn outcome_status_display_is_snake_case() {
        assert_eq!(OutcomeStatus::TimedOut.to_string(), "timed_out");
        assert_eq!(OutcomeStatus::ConnectFailed.to_string(), "connect_failed");
    }
}
