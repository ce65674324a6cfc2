// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault management commands: add, list, edit, remove, import and log.

use std::path::Path;

use colored::Colorize;
use fleetvault_core::{CredentialRecord, EditField, FleetError};
use fleetvault_vault::{DerivedKey, read_descriptor};
use tracing::info;

use crate::context::App;
use crate::prompt::{Ask, ask_until, confirm, read_record};

const NO_CONNECTIONS: &str =
    "No connections found. Use `fleetvault add` or `fleetvault import` to add new connections.";

fn added_message(record: &CredentialRecord) -> String {
    format!(
        "Added connection: {} using {}",
        record.label(),
        record.package_manager
    )
}

/// Interactively add one or more hosts, written in a single batch.
pub fn add(app: &App, key: &DerivedKey, ask: &mut dyn Ask) -> Result<usize, FleetError> {
    // Unlocking first rejects a wrong key before the operator types anything.
    let existing = app.store.unlock(key)?;
    let mut pending: Vec<CredentialRecord> = Vec::new();

    loop {
        let record = read_record(ask)?;
        let taken = existing.contains_host(&record.host)
            || pending.iter().any(|r| r.host == record.host);
        if taken {
            eprintln!(
                "{}: {}",
                "error".red(),
                FleetError::DuplicateHost {
                    host: record.host.clone()
                }
            );
        } else {
            pending.push(record);
        }

        if !confirm(ask, "Do you want to add another system? [y/N]: ")? {
            break;
        }
    }

    let messages: Vec<String> = pending.iter().map(added_message).collect();
    let count = app.store.add_many(key, pending)?;
    for message in messages {
        println!("{message}");
        app.audit.record_or_warn(&message);
    }
    Ok(count)
}

/// One display line per record.
pub fn list_lines(app: &App, key: &DerivedKey) -> Result<Vec<String>, FleetError> {
    let vault = app.store.unlock(key)?;
    Ok(vault
        .records()
        .iter()
        .map(|r| {
            format!(
                "{}, Manager: {}, Passwordless sudo: {}",
                r.label(),
                r.package_manager,
                if r.passwordless_sudo { "Yes" } else { "No" }
            )
        })
        .collect())
}

pub fn list(app: &App, key: &DerivedKey) -> Result<(), FleetError> {
    let lines = list_lines(app, key)?;
    if lines.is_empty() {
        println!("{NO_CONNECTIONS}");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Fields supplied on the command line for `edit`.
#[derive(Debug, Default)]
pub struct EditRequest {
    pub host: Option<String>,
    pub field: Option<String>,
    pub value: Option<String>,
}

impl EditRequest {
    fn is_complete(&self) -> bool {
        self.host.is_some() && self.field.is_some() && self.value.is_some()
    }
}

/// Edit one field of a record; prompts for whatever was not given.
///
/// A fully specified request runs once. Otherwise the operator may keep
/// editing further records. An absent host or invalid value is reported
/// and audited, not returned.
pub fn edit(
    app: &App,
    key: &DerivedKey,
    request: EditRequest,
    ask: &mut dyn Ask,
) -> Result<(), FleetError> {
    let repeat = !request.is_complete();
    let mut request = Some(request);

    loop {
        let current = request.take().unwrap_or_default();
        let host = match current.host {
            Some(host) => host,
            None => ask_until(
                ask,
                "Type the IP of the connection you would like to change: ",
                |s| Ok(s.trim().to_string()),
            )?,
        };
        let field = match current.field {
            Some(field) => EditField::parse(&field)?,
            None => ask_until(
                ask,
                "What would you like to change? (IP, user, port, password, passwordless sudo or package manager) ",
                EditField::parse,
            )?,
        };
        let value = match current.value {
            Some(value) => value,
            None if field == EditField::Password => ask.secret("New password: ")?,
            None => ask.line("What would you like to change it to?: ")?,
        };

        match app.store.edit(key, &host, field, &value) {
            Ok(updated) => {
                let shown = if field == EditField::Password {
                    "********".to_string()
                } else {
                    value.trim().to_string()
                };
                let message = format!("Changed {field} of {host} to {shown}");
                info!(host = %host, field = %field, "record edited");
                println!("{message} ({})", updated.label());
                app.audit.record_or_warn(&message);
            }
            Err(e) if !e.is_fatal() => {
                let message = format!("Error editing {host}, {e}");
                eprintln!("{}: {message}", "error".red());
                app.audit.record_or_warn(&message);
            }
            Err(e) => return Err(e),
        }

        if !repeat || !confirm(ask, "Do you want to change another connection? [y/N]: ")? {
            return Ok(());
        }
    }
}

/// Remove a host, prompting for it when not given.
///
/// `Ok(None)` when the host is not in the vault; that case is reported and
/// audited here.
pub fn remove(
    app: &App,
    key: &DerivedKey,
    host: Option<String>,
    ask: &mut dyn Ask,
) -> Result<Option<CredentialRecord>, FleetError> {
    let host = match host {
        Some(host) => host,
        None => ask_until(
            ask,
            "Type the IP of the connection you would like to remove: ",
            |s| {
                let s = s.trim();
                if s.is_empty() {
                    Err(FleetError::Validation("host must not be blank".to_string()))
                } else {
                    Ok(s.to_string())
                }
            },
        )?,
    };

    match app.store.remove(key, &host) {
        Ok(removed) => {
            let message = format!("Removed connection: {}", removed.label());
            println!("{message}");
            app.audit.record_or_warn(&message);
            Ok(Some(removed))
        }
        Err(e) if !e.is_fatal() => {
            let message = format!("Error removing {host}, {e}");
            eprintln!("{}: {message}", "error".red());
            app.audit.record_or_warn(&message);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Import every host from a descriptor in one write.
pub fn import(app: &App, key: &DerivedKey, path: &Path) -> Result<usize, FleetError> {
    let records = read_descriptor(path)
        .and_then(|d| d.into_records())
        .inspect_err(|e| {
            app.audit
                .record_or_warn(&format!("Error importing connections from file, {e}"));
        })?;

    app.audit.record_or_warn(&format!(
        "Importing {} connections from {}",
        records.len(),
        path.display()
    ));
    let messages: Vec<String> = records.iter().map(added_message).collect();
    let count = app.store.add_many(key, records)?;
    for message in messages {
        println!("{message}");
        app.audit.record_or_warn(&message);
    }
    Ok(count)
}

/// Print the last `lines` audit log entries.
pub fn show_log(app: &App, lines: usize) -> Result<(), FleetError> {
    for line in app.audit.tail(lines)? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use fleetvault_test_utils::{TestFleet, sample_record};

    use super::*;
    use crate::prompt::testing::Scripted;

    fn app(fleet: &TestFleet) -> App {
        App::new(fleet.config.clone())
    }

    #[test]
    fn add_writes_all_answers_in_one_batch() {
        let fleet = TestFleet::new().unwrap();
        let app = app(&fleet);
        let mut ask = Scripted::new(&[
            "ops", "h1", "", "pw1", "n", "apt", "y", //
            "root", "h2", "2222", "pw2", "y", "pacman", "n",
        ]);

        assert_eq!(add(&app, &fleet.key, &mut ask).unwrap(), 2);
        let records = fleet.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].port, 2222);
        assert!(fleet.audit.tail(5).unwrap()[0].contains("Added connection: ops@h1:22 using apt"));
    }

    #[test]
    fn add_skips_duplicate_host() {
        let fleet = TestFleet::with_hosts(&["h1"]).unwrap();
        let app = app(&fleet);
        let mut ask = Scripted::new(&["ops", "h1", "", "pw", "", "apt", ""]);

        assert_eq!(add(&app, &fleet.key, &mut ask).unwrap(), 0);
        assert_eq!(fleet.records().unwrap().len(), 1);
    }

    #[test]
    fn interrupted_add_writes_nothing() {
        let fleet = TestFleet::new().unwrap();
        let app = app(&fleet);
        let mut ask = Scripted::new(&["ops", "h1", "", "pw", "", "apt", "y", "ops"]);

        assert!(matches!(
            add(&app, &fleet.key, &mut ask),
            Err(FleetError::Interrupted)
        ));
        assert!(!fleet.store.exists());
    }

    #[test]
    fn list_formats_each_record() {
        let fleet = TestFleet::new().unwrap();
        let mut record = sample_record("10.0.0.5");
        record.passwordless_sudo = true;
        fleet.store.add(&fleet.key, record).unwrap();

        let lines = list_lines(&app(&fleet), &fleet.key).unwrap();
        assert_eq!(
            lines,
            vec!["ops@10.0.0.5:22, Manager: apt, Passwordless sudo: Yes"]
        );
    }

    #[test]
    fn edit_from_flags_runs_once() {
        let fleet = TestFleet::with_hosts(&["h1", "h2"]).unwrap();
        let request = EditRequest {
            host: Some("h2".into()),
            field: Some("port".into()),
            value: Some("2200".into()),
        };
        let mut ask = Scripted::new(&[]);

        edit(&app(&fleet), &fleet.key, request, &mut ask).unwrap();
        assert!(ask.prompts.is_empty());
        let records = fleet.records().unwrap();
        assert_eq!(records[1].port, 2200);
        assert_eq!(records[0], sample_record("h1"));
    }

    #[test]
    fn interactive_edit_reports_unknown_host_and_continues() {
        let fleet = TestFleet::with_hosts(&["h1"]).unwrap();
        let mut ask = Scripted::new(&[
            "nope", "port", "2200", "y", //
            "h1", "package manager", "dnf", "n",
        ]);

        edit(&app(&fleet), &fleet.key, EditRequest::default(), &mut ask).unwrap();
        let records = fleet.records().unwrap();
        assert_eq!(
            records[0].package_manager,
            fleetvault_core::PackageManager::Dnf
        );
        let log = fleet.audit.tail(10).unwrap().join("\n");
        assert!(log.contains("Error editing nope"));
    }

    #[test]
    fn edit_password_is_not_logged() {
        let fleet = TestFleet::with_hosts(&["h1"]).unwrap();
        let request = EditRequest {
            host: Some("h1".into()),
            field: Some("password".into()),
            value: Some("n3w-s3cret".into()),
        };
        edit(&app(&fleet), &fleet.key, request, &mut Scripted::new(&[])).unwrap();

        assert_eq!(fleet.records().unwrap()[0].password, "n3w-s3cret");
        let log = fleet.audit.tail(10).unwrap().join("\n");
        assert!(!log.contains("n3w-s3cret"));
    }

    #[test]
    fn remove_prompts_for_host() {
        let fleet = TestFleet::with_hosts(&["A", "B", "C"]).unwrap();
        let mut ask = Scripted::new(&["", "B"]);

        let removed = remove(&app(&fleet), &fleet.key, None, &mut ask)
            .unwrap()
            .unwrap();
        assert_eq!(removed.host, "B");
        let hosts: Vec<_> = fleet.records().unwrap().into_iter().map(|r| r.host).collect();
        assert_eq!(hosts, vec!["A", "C"]);
    }

    #[test]
    fn remove_of_absent_host_is_reported_once() {
        let fleet = TestFleet::with_hosts(&["A"]).unwrap();
        let before = std::fs::read_to_string(fleet.store.path()).unwrap();

        let removed = remove(
            &app(&fleet),
            &fleet.key,
            Some("Z".into()),
            &mut Scripted::new(&[]),
        )
        .unwrap();
        assert!(removed.is_none());
        assert_eq!(std::fs::read_to_string(fleet.store.path()).unwrap(), before);

        let log = fleet.audit.tail(10).unwrap();
        assert_eq!(log.iter().filter(|l| l.contains("Z")).count(), 1);
        assert!(log.iter().any(|l| l.contains("Error removing Z")));
    }

    #[test]
    fn edit_from_flags_of_absent_host_is_reported_once() {
        let fleet = TestFleet::with_hosts(&["h1"]).unwrap();
        let request = EditRequest {
            host: Some("nope".into()),
            field: Some("port".into()),
            value: Some("2200".into()),
        };
        let mut ask = Scripted::new(&[]);

        edit(&app(&fleet), &fleet.key, request, &mut ask).unwrap();
        assert!(ask.prompts.is_empty());
        assert_eq!(fleet.records().unwrap()[0], sample_record("h1"));
        let log = fleet.audit.tail(10).unwrap();
        assert_eq!(log.iter().filter(|l| l.contains("nope")).count(), 1);
    }

    #[test]
    fn import_reads_descriptor_from_path() {
        let fleet = TestFleet::new().unwrap();
        let path = Path::new(&fleet.config.import.descriptor_path).to_path_buf();
        std::fs::write(
            &path,
            r#"{"loop": true, "ips": ["a", "b"],
                "creds": {"user": "ops", "port": 22, "password": "pw",
                          "passwordSudo": "y", "manager": "apt"},
                "connections": []}"#,
        )
        .unwrap();

        assert_eq!(import(&app(&fleet), &fleet.key, &path).unwrap(), 2);
        assert_eq!(fleet.records().unwrap().len(), 2);
    }

    #[test]
    fn import_of_missing_file_is_logged() {
        let fleet = TestFleet::new().unwrap();
        let path = Path::new(&fleet.config.import.descriptor_path).to_path_buf();

        assert!(import(&app(&fleet), &fleet.key, &path).is_err());
        let log = fleet.audit.tail(5).unwrap().join("\n");
        assert!(log.contains("Error importing connections from file"));
    }
}
