// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote shell session contract.
//!
//! The dispatcher opens exactly one session per host task and calls
//! [`RemoteSession::close`] on every exit path.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FleetError;
use crate::types::{CredentialRecord, ExitReport};

/// Opens authenticated sessions to remote hosts.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Connect to `record.host:record.port` and authenticate as `record.user`.
    ///
    /// Unknown host identities are accepted.
    async fn connect(
        &self,
        record: &CredentialRecord,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>, FleetError>;
}

/// One open shell session on a remote host.
#[async_trait]
pub trait RemoteSession: Send {
    /// Start `command` on a PTY.
    async fn execute(&mut self, command: &str) -> Result<(), FleetError>;

    /// Write raw bytes to the running command's input.
    async fn write_stdin(&mut self, data: &[u8]) -> Result<(), FleetError>;

    /// Wait until the command exits and return its status and output.
    async fn wait_exit_status(&mut self) -> Result<ExitReport, FleetError>;

    /// Release the session. Must be safe to call after any failure.
    async fn close(&mut self) -> Result<(), FleetError>;
}
