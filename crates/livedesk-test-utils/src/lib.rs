// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Livedesk integration tests.
//!
//! Provides a scripted in-memory platform for fast, deterministic,
//! CI-runnable tests without network access.
//!
//! # Components
//!
//! - [`MockPlatform`] - Notification and snapshot APIs with call counters and failure scripting
//! - [`MockSocket`] - Notification socket with server-side frame injection and close

pub mod mock_platform;
pub mod mock_socket;

pub use mock_platform::MockPlatform;
pub use mock_socket::MockSocket;

use std::time::Duration;

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
///
/// Works with both real and paused tokio time.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
