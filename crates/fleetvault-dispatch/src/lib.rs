// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent dispatch of maintenance operations over SSH.

pub mod dispatcher;
pub mod redact;
pub mod shutdown;
pub mod ssh;

pub use dispatcher::Dispatcher;
pub use shutdown::install_signal_handler;
pub use ssh::SshConnector;
