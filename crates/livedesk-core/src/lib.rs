// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Livedesk live-state engine.
//!
//! This crate provides the error type, the shared types, and the traits the
//! engine uses to talk to the remote contact-center platform. The platform
//! client and the test mocks both implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LivedeskError;
pub use types::{
    ChannelEndpoint, ConversationQuery, ConversationSnapshot, HealthStatus, OrgId, QueueCounts,
    SnapshotPurpose, Topic, UsersStatusSnapshot,
};

pub use traits::{EventSocket, NotificationApi, SnapshotApi};
