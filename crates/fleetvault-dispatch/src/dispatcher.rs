// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of one operation across every host, with a bounded pool.
//!
//! Each host gets its own task that owns a private copy of its record. A
//! semaphore caps how many tasks hold a session at once. Every task ends in
//! an [`Outcome`], and its session is closed on every path.

use std::sync::Arc;
use std::time::Duration;

use fleetvault_audit::AuditLog;
use fleetvault_config::model::{DispatchConfig, MAX_CONCURRENCY};
use fleetvault_core::{
    CredentialRecord, ExitReport, FleetError, Operation, Outcome, OutcomeStatus, RemoteSession,
    SessionConnector,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use zeroize::Zeroizing;

use crate::redact::{output_tail, redact};

/// Upper bound on how long closing one session may take.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs an [`Operation`] on many hosts concurrently.
pub struct Dispatcher {
    connector: Arc<dyn SessionConnector>,
    config: DispatchConfig,
    audit: Arc<AuditLog>,
}

impl Dispatcher {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        config: DispatchConfig,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            connector,
            config,
            audit,
        }
    }

    /// Dispatch `operation` to every record and wait for all of them.
    ///
    /// Outcomes come back in record order. One host failing, timing out or
    /// panicking never affects the others.
    pub async fn run(
        &self,
        operation: Operation,
        records: Vec<CredentialRecord>,
        cancel: CancellationToken,
    ) -> Vec<Outcome> {
        let permits = self.config.max_concurrency.clamp(1, MAX_CONCURRENCY);
        let semaphore = Arc::new(Semaphore::new(permits));
        info!(
            operation = %operation,
            hosts = records.len(),
            max_concurrency = permits,
            "dispatch started"
        );

        let mut handles = Vec::with_capacity(records.len());
        for record in records {
            let host = record.host.clone();
            let span = info_span!("host_task", host = %host, operation = %operation);
            let task = HostTask {
                connector: Arc::clone(&self.connector),
                audit: Arc::clone(&self.audit),
                semaphore: Arc::clone(&semaphore),
                cancel: cancel.clone(),
                operation,
                task_timeout: self.config.task_timeout(),
                connect_timeout: self.config.connect_timeout(),
                tail_lines: self.config.output_tail_lines,
                record,
            };
            handles.push((host, tokio::spawn(task.run().instrument(span))));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (host, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(host = %host, operation = %operation, error = %e, "host task aborted");
                    let outcome = Outcome::new(
                        host,
                        operation,
                        OutcomeStatus::CommandFailed,
                        format!("task aborted: {e}"),
                    );
                    self.audit
                        .record_async(format!("Error running {operation} on {}, task aborted", outcome.host))
                        .await;
                    outcome
                }
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            operation = %operation,
            succeeded,
            failed = outcomes.len() - succeeded,
            "dispatch finished"
        );
        outcomes
    }
}

struct HostTask {
    connector: Arc<dyn SessionConnector>,
    audit: Arc<AuditLog>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    operation: Operation,
    task_timeout: Duration,
    connect_timeout: Duration,
    tail_lines: usize,
    record: CredentialRecord,
}

impl HostTask {
    async fn run(self) -> Outcome {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return self.finish(Err(FleetError::Interrupted), false).await;
            }
            permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return self.finish(Err(FleetError::Interrupted), false).await,
            },
        };

        self.audit.record_async(self.start_message()).await;

        let mut session: Option<Box<dyn RemoteSession>> = None;
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FleetError::Interrupted),
            timed = tokio::time::timeout(self.task_timeout, self.execute(&mut session)) => {
                timed.unwrap_or(Err(FleetError::Timeout { duration: self.task_timeout }))
            }
        };

        let connected = session.is_some();
        if let Some(mut session) = session.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
                Ok(Ok(())) => debug!("session closed"),
                Ok(Err(e)) => warn!(error = %e, "session close failed"),
                Err(_) => warn!("session close timed out"),
            }
        }

        self.finish(result, connected).await
    }

    /// Connect, start the command, feed sudo if needed, and wait.
    ///
    /// The session is parked in `slot` as soon as it exists so the caller
    /// can close it even if this future is dropped.
    async fn execute(
        &self,
        slot: &mut Option<Box<dyn RemoteSession>>,
    ) -> Result<ExitReport, FleetError> {
        let session = slot.insert(
            self.connector
                .connect(&self.record, self.connect_timeout)
                .await?,
        );
        debug!(port = self.record.port, "connected");

        let command = self.operation.command_for(self.record.package_manager);
        session.execute(command).await?;

        if !self.record.passwordless_sudo {
            let mut input = Zeroizing::new(self.record.password.clone().into_bytes());
            input.push(b'\n');
            session.write_stdin(&input).await?;
        }

        session.wait_exit_status().await
    }

    async fn finish(&self, result: Result<ExitReport, FleetError>, connected: bool) -> Outcome {
        let host = &self.record.host;
        let operation = self.operation;
        let manager = self.record.package_manager;

        let mut outcome = match result {
            Ok(report) => {
                let status = if report.exit_status == 0 {
                    OutcomeStatus::Success
                } else {
                    OutcomeStatus::CommandFailed
                };
                let message = match (status, operation) {
                    (OutcomeStatus::Success, Operation::Update) => {
                        format!("Update on {host} using {manager} completed.")
                    }
                    (OutcomeStatus::Success, Operation::Test) => {
                        format!("Test on {host} was successful")
                    }
                    _ => format!(
                        "Error running {operation} on {host}, exit status {}",
                        report.exit_status
                    ),
                };
                let mut outcome = Outcome::new(host.clone(), operation, status, message);
                outcome.exit_status = Some(report.exit_status);
                outcome.output = output_tail(&report.output, &self.record.password, self.tail_lines);
                outcome
            }
            Err(e) => {
                let status = match &e {
                    FleetError::Timeout { .. } => OutcomeStatus::TimedOut,
                    FleetError::Interrupted => OutcomeStatus::Cancelled,
                    _ if !connected => OutcomeStatus::ConnectFailed,
                    _ => OutcomeStatus::CommandFailed,
                };
                let detail = redact(&e.to_string(), &[&self.record.password]);
                Outcome::new(
                    host.clone(),
                    operation,
                    status,
                    format!("Error running {operation} on {host}, {detail}"),
                )
            }
        };

        if outcome.is_success() {
            info!(status = %outcome.status, "host finished");
        } else {
            warn!(status = %outcome.status, message = %outcome.message, "host failed");
            // Keep the reason visible even when only the message is shown.
            if outcome.status == OutcomeStatus::CommandFailed
                && let Some(last) = outcome.output.last()
            {
                outcome.message = format!("{}: {last}", outcome.message);
            }
        }
        self.audit.record_async(outcome.message.clone()).await;
        outcome
    }

    fn start_message(&self) -> String {
        match self.operation {
            Operation::Update => format!(
                "Update started on {}, this may take a while.",
                self.record.host
            ),
            Operation::Test => format!("Test started on {}", self.record.host),
        }
    }
}
