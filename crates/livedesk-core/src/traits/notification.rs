// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push-notification channel and socket traits.

use async_trait::async_trait;

use crate::error::LivedeskError;
use crate::types::{ChannelEndpoint, Topic};

/// Platform operations needed to create and feed a notification channel.
#[async_trait]
pub trait NotificationApi: Send + Sync + 'static {
    /// Requests a new channel id and socket address.
    async fn create_channel(&self) -> Result<ChannelEndpoint, LivedeskError>;

    /// Replaces the channel's subscription list with `topics`.
    async fn subscribe(&self, channel_id: &str, topics: &[Topic]) -> Result<(), LivedeskError>;

    /// Opens a socket to a channel's connect address.
    async fn open_socket(&self, connect_uri: &str)
    -> Result<Box<dyn EventSocket>, LivedeskError>;
}

/// An open notification socket yielding inbound text frames.
#[async_trait]
pub trait EventSocket: Send {
    /// Waits for the next text frame.
    ///
    /// Returns `None` once the socket is closed by either side. Must be
    /// cancel-safe: a dropped call loses no frame.
    async fn next_frame(&mut self) -> Option<Result<String, LivedeskError>>;

    /// Closes the socket. Must be safe to call on an already-closed socket.
    async fn close(&mut self);
}
