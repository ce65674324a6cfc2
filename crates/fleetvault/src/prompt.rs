// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interactive operator input.
//!
//! Commands read answers through the [`Ask`] trait so the same flows run
//! against a terminal or a scripted answer list in tests.

use std::str::FromStr;

use colored::Colorize;
use fleetvault_core::types::{DEFAULT_SSH_PORT, parse_flag, parse_port};
use fleetvault_core::{CredentialRecord, FleetError, PackageManager};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// A source of operator answers.
pub trait Ask {
    /// Read one visible line.
    fn line(&mut self, prompt: &str) -> Result<String, FleetError>;

    /// Read one line without echo.
    fn secret(&mut self, prompt: &str) -> Result<String, FleetError>;
}

/// Terminal prompter: rustyline for visible input, rpassword for secrets.
pub struct TerminalPrompter {
    editor: DefaultEditor,
}

impl TerminalPrompter {
    pub fn new() -> Result<Self, FleetError> {
        let editor = DefaultEditor::new()
            .map_err(|e| FleetError::Internal(format!("failed to initialize readline: {e}")))?;
        Ok(Self { editor })
    }
}

impl Ask for TerminalPrompter {
    fn line(&mut self, prompt: &str) -> Result<String, FleetError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Err(FleetError::Interrupted),
            Err(e) => Err(FleetError::Internal(format!("failed to read input: {e}"))),
        }
    }

    fn secret(&mut self, prompt: &str) -> Result<String, FleetError> {
        rpassword::prompt_password(prompt)
            .map_err(|e| FleetError::Internal(format!("failed to read password: {e}")))
    }
}

/// Ask until `parse` accepts the answer, reporting each rejection.
pub fn ask_until<T>(
    ask: &mut dyn Ask,
    prompt: &str,
    parse: impl Fn(&str) -> Result<T, FleetError>,
) -> Result<T, FleetError> {
    loop {
        let answer = ask.line(prompt)?;
        match parse(&answer) {
            Ok(value) => return Ok(value),
            Err(e) => eprintln!("{}: {e}", "error".red()),
        }
    }
}

/// Yes/no question where blank means no.
pub fn confirm(ask: &mut dyn Ask, prompt: &str) -> Result<bool, FleetError> {
    ask_until(ask, prompt, parse_flag)
}

fn non_blank(field: &'static str) -> impl Fn(&str) -> Result<String, FleetError> {
    move |input| {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            Err(FleetError::Validation(format!("{field} must not be blank")))
        } else {
            Ok(trimmed.to_string())
        }
    }
}

fn port_or_default(input: &str) -> Result<u16, FleetError> {
    if input.trim().is_empty() {
        Ok(DEFAULT_SSH_PORT)
    } else {
        parse_port(input)
    }
}

fn package_manager(input: &str) -> Result<PackageManager, FleetError> {
    PackageManager::from_str(input.trim()).map_err(|_| {
        FleetError::Validation(format!(
            "unknown package manager `{}` (expected apt, dnf, yum or pacman)",
            input.trim()
        ))
    })
}

/// Collect one complete, valid record field by field.
pub fn read_record(ask: &mut dyn Ask) -> Result<CredentialRecord, FleetError> {
    let user = ask_until(ask, "User: ", non_blank("user"))?;
    let host = ask_until(ask, "IP or hostname: ", non_blank("host"))?;
    let port = ask_until(ask, &format!("Port [{DEFAULT_SSH_PORT}]: "), port_or_default)?;
    let password = loop {
        let password = ask.secret("Password: ")?;
        if password.is_empty() {
            eprintln!("{}: password must not be blank", "error".red());
        } else {
            break password;
        }
    };
    let passwordless_sudo = confirm(ask, "Passwordless sudo? [y/N]: ")?;
    let package_manager = ask_until(
        ask,
        "Package manager (apt, dnf, yum, pacman): ",
        package_manager,
    )?;

    let record = CredentialRecord {
        user,
        host,
        port,
        password,
        passwordless_sudo,
        package_manager,
    };
    record.validate()?;
    Ok(record)
}
