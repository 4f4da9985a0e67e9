// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact-center platform client for Livedesk.
//!
//! [`PlatformClient`] implements [`livedesk_core::NotificationApi`] and
//! [`livedesk_core::SnapshotApi`] over the platform's REST API, and opens
//! notification sockets as [`WsSocket`]s.

pub mod client;
pub mod socket;
pub mod types;

pub use client::PlatformClient;
pub use socket::WsSocket;
