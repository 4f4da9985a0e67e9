// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits for the remote contact-center platform.
//!
//! The engine only talks to the platform through these traits, which use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod notification;
pub mod snapshot;

pub use notification::{EventSocket, NotificationApi};
pub use snapshot::SnapshotApi;
