// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fleetvault test` and `fleetvault update`: run an operation on every host.

use std::sync::Arc;

use colored::Colorize;
use fleetvault_core::{FleetError, Operation, Outcome, OutcomeStatus, SessionConnector};
use fleetvault_dispatch::Dispatcher;
use fleetvault_vault::DerivedKey;
use tokio_util::sync::CancellationToken;

use crate::context::App;

/// Summary of a finished dispatch.
#[derive(Debug)]
pub struct FleetReport {
    pub outcomes: Vec<Outcome>,
}

impl FleetReport {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Decrypt the vault, then dispatch `operation` to every host.
///
/// Any decryption failure aborts before a single connection is made.
pub async fn run(
    app: &App,
    key: &DerivedKey,
    operation: Operation,
    connector: Arc<dyn SessionConnector>,
    cancel: CancellationToken,
) -> Result<FleetReport, FleetError> {
    let records = app.store.unlock(key)?.into_records();
    if records.is_empty() {
        println!(
            "No connections found. Use `fleetvault add` or `fleetvault import` to add new connections."
        );
        app.audit
            .record_or_warn(&format!("{operation} skipped, no connections in vault"));
        return Ok(FleetReport {
            outcomes: Vec::new(),
        });
    }

    let dispatcher = Dispatcher::new(connector, app.config.dispatch.clone(), Arc::clone(&app.audit));
    let outcomes = dispatcher.run(operation, records, cancel.clone()).await;
    if cancel.is_cancelled() {
        app.audit
            .record_or_warn(&format!("{operation} cancelled, keyboard interrupt"));
    }

    Ok(FleetReport { outcomes })
}

/// Print one block per host, then a summary line.
pub fn print_report(report: &FleetReport) {
    for outcome in &report.outcomes {
        let status = match outcome.status {
            OutcomeStatus::Success => outcome.status.to_string().green(),
            OutcomeStatus::Cancelled | OutcomeStatus::TimedOut => {
                outcome.status.to_string().yellow()
            }
            _ => outcome.status.to_string().red(),
        };
        println!("[{status}] {}", outcome.message);
        if !outcome.is_success() {
            for line in &outcome.output {
                println!("    {}", line.dimmed());
            }
        }
    }

    if !report.outcomes.is_empty() {
        let total = report.outcomes.len();
        let failed = report.failed();
        let summary = format!("{} of {total} hosts succeeded", total - failed);
        if failed == 0 {
            println!("{}", summary.bold().green());
        } else {
            println!("{}", summary.bold().red());
        }
    }
}

#[cfg(test)]
mod tests {
    use fleetvault_test_utils::{HostBehavior, MockConnector, TestFleet};
    use fleetvault_vault::derive_key;
    use fleetvault_vault::kdf::FIXED_SALT;

    use super::*;

    #[tokio::test]
    async fn reports_every_host() {
        let fleet = TestFleet::with_hosts(&["h1", "h2", "h3", "h4", "h5"]).unwrap();
        let app = App::new(fleet.config.clone());
        let connector =
            MockConnector::with_behaviors([("h3".to_string(), HostBehavior::Unreachable)]);

        let report = run(
            &app,
            &fleet.key,
            Operation::Update,
            Arc::new(connector),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_succeeded());
    }

    #[tokio::test]
    async fn wrong_key_connects_nowhere() {
        let fleet = TestFleet::with_hosts(&["h1"]).unwrap();
        let app = App::new(fleet.config.clone());
        let connector = MockConnector::new();
        let wrong = derive_key(b"nope", FIXED_SALT, 1_000).unwrap();

        let result = run(
            &app,
            &wrong,
            Operation::Test,
            Arc::new(connector.clone()),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(FleetError::Decryption)));
        assert!(connector.journal().lock().await.connects.is_empty());
    }

    #[tokio::test]
    async fn empty_vault_is_not_a_failure() {
        let fleet = TestFleet::new().unwrap();
        let app = App::new(fleet.config.clone());

        let report = run(
            &app,
            &fleet.key,
            Operation::Update,
            Arc::new(MockConnector::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(report.all_succeeded());
    }
}
