// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for fleetvault integration tests.
//!
//! # Components
//!
//! - [`MockConnector`] - Scripted SSH connector with per-host behaviors
//! - [`TestFleet`] - Temp-dir vault, audit log and config

pub mod harness;
pub mod mock_session;

pub use harness::{TestFleet, sample_record};
pub use mock_session::{HostBehavior, MockConnector, MockSession, SessionJournal};
