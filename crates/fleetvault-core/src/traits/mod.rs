// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the collaborators the dispatcher drives.
//!
//! Traits use `#[async_trait]` so implementations can be held as trait objects.

pub mod session;

pub use session::{RemoteSession, SessionConnector};
