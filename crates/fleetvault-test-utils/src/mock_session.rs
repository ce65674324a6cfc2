// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted remote sessions for deterministic dispatch tests.
//!
//! `MockConnector` implements `SessionConnector` with a per-host
//! [`HostBehavior`] and records every connect, command, stdin write and
//! close so tests can assert on them afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fleetvault_core::{CredentialRecord, ExitReport, FleetError, RemoteSession, SessionConnector};
use tokio::sync::Mutex;

/// How a mocked host responds.
#[derive(Debug, Clone)]
pub enum HostBehavior {
    /// Connects, runs the command, and exits with the given status.
    Exit {
        status: i32,
        output: String,
        delay: Duration,
    },
    /// Connect fails as if the host were unreachable.
    Unreachable,
    /// Connect succeeds but the command never finishes.
    Hang,
    /// Connect never completes.
    HangOnConnect,
    /// Connect succeeds but starting the command fails.
    ExecuteError,
}

impl HostBehavior {
    /// Exit 0 immediately with `output`.
    pub fn ok(output: impl Into<String>) -> Self {
        HostBehavior::Exit {
            status: 0,
            output: output.into(),
            delay: Duration::ZERO,
        }
    }

    /// Exit 0 with `output` after `delay`.
    pub fn slow(output: impl Into<String>, delay: Duration) -> Self {
        HostBehavior::Exit {
            status: 0,
            output: output.into(),
            delay,
        }
    }

    /// Exit with a nonzero `status`.
    pub fn fails(status: i32, output: impl Into<String>) -> Self {
        HostBehavior::Exit {
            status,
            output: output.into(),
            delay: Duration::ZERO,
        }
    }
}

/// Everything the mock sessions observed, keyed by host.
#[derive(Debug, Default)]
pub struct SessionJournal {
    pub connects: Vec<String>,
    pub commands: HashMap<String, Vec<String>>,
    pub stdin: HashMap<String, Vec<Vec<u8>>>,
    pub closes: HashMap<String, usize>,
}

impl SessionJournal {
    pub fn closes_for(&self, host: &str) -> usize {
        self.closes.get(host).copied().unwrap_or(0)
    }

    pub fn stdin_for(&self, host: &str) -> &[Vec<u8>] {
        self.stdin.get(host).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn commands_for(&self, host: &str) -> &[String] {
        self.commands.get(host).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A mock connector that hands out scripted sessions.
///
/// Hosts without an explicit behavior succeed with empty output.
#[derive(Clone, Default)]
pub struct MockConnector {
    behaviors: Arc<HashMap<String, HostBehavior>>,
    journal: Arc<Mutex<SessionJournal>>,
    open_sessions: Arc<Gauge>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector with per-host behaviors.
    pub fn with_behaviors(behaviors: impl IntoIterator<Item = (String, HostBehavior)>) -> Self {
        Self {
            behaviors: Arc::new(behaviors.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Shared handle to the recorded session activity.
    pub fn journal(&self) -> Arc<Mutex<SessionJournal>> {
        Arc::clone(&self.journal)
    }

    /// Highest number of sessions that were open at the same time.
    pub fn peak_open_sessions(&self) -> usize {
        self.open_sessions.peak.load(Ordering::SeqCst)
    }

    /// Sessions currently open (connected but not yet closed).
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.current.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, host: &str) -> HostBehavior {
        self.behaviors
            .get(host)
            .cloned()
            .unwrap_or_else(|| HostBehavior::ok(""))
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(
        &self,
        record: &CredentialRecord,
        _connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>, FleetError> {
        self.journal.lock().await.connects.push(record.host.clone());

        let behavior = self.behavior_for(&record.host);
        match behavior {
            HostBehavior::Unreachable => {
                Err(FleetError::remote(&record.host, "connection refused"))
            }
            HostBehavior::HangOnConnect => {
                std::future::pending::<()>().await;
                Err(FleetError::remote(&record.host, "unreachable"))
            }
            behavior => {
                self.open_sessions.enter();
                Ok(Box::new(MockSession {
                    host: record.host.clone(),
                    behavior,
                    journal: Arc::clone(&self.journal),
                    gauge: Arc::clone(&self.open_sessions),
                    closed: false,
                }))
            }
        }
    }
}

/// One scripted session produced by [`MockConnector`].
pub struct MockSession {
    host: String,
    behavior: HostBehavior,
    journal: Arc<Mutex<SessionJournal>>,
    gauge: Arc<Gauge>,
    closed: bool,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn execute(&mut self, command: &str) -> Result<(), FleetError> {
        self.journal
            .lock()
            .await
            .commands
            .entry(self.host.clone())
            .or_default()
            .push(command.to_string());
        if matches!(self.behavior, HostBehavior::ExecuteError) {
            return Err(FleetError::remote(&self.host, "failed to open channel"));
        }
        Ok(())
    }

    async fn write_stdin(&mut self, data: &[u8]) -> Result<(), FleetError> {
        self.journal
            .lock()
            .await
            .stdin
            .entry(self.host.clone())
            .or_default()
            .push(data.to_vec());
        Ok(())
    }

    async fn wait_exit_status(&mut self) -> Result<ExitReport, FleetError> {
        match &self.behavior {
            HostBehavior::Exit {
                status,
                output,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(ExitReport {
                    exit_status: *status,
                    output: output.clone(),
                })
            }
            _ => {
                std::future::pending::<()>().await;
                Err(FleetError::remote(&self.host, "never finishes"))
            }
        }
    }

    async fn close(&mut self) -> Result<(), FleetError> {
        *self
            .journal
            .lock()
            .await
            .closes
            .entry(self.host.clone())
            .or_default() += 1;
        if !self.closed {
            self.closed = true;
            self.gauge.leave();
        }
        Ok(())
    }
}
