// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock notification socket for deterministic testing.
//!
//! The server side ([`SocketLink`]) is kept by the [`MockPlatform`](crate::MockPlatform)
//! so tests can inject frames, inject read errors, or close the connection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use livedesk_core::{EventSocket, LivedeskError};

/// Shared state between a [`MockSocket`] and the test driving it.
#[derive(Debug)]
pub struct SocketLink {
    channel_id: String,
    inbound: Mutex<VecDeque<Result<String, String>>>,
    notify: Notify,
    server_closed: AtomicBool,
    client_closed: AtomicBool,
}

impl SocketLink {
    pub fn new(channel_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            channel_id: channel_id.into(),
            inbound: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            server_closed: AtomicBool::new(false),
            client_closed: AtomicBool::new(false),
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Queue a text frame for the client.
    pub fn push(&self, frame: impl Into<String>) {
        self.enqueue(Ok(frame.into()));
    }

    /// Queue a read error for the client.
    pub fn push_error(&self, message: impl Into<String>) {
        self.enqueue(Err(message.into()));
    }

    fn enqueue(&self, item: Result<String, String>) {
        if let Ok(mut queue) = self.inbound.lock() {
            queue.push_back(item);
        }
        self.notify.notify_one();
    }

    /// Close from the server side; the client sees end-of-stream once drained.
    pub fn close_from_server(&self) {
        self.server_closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Neither side has closed the socket.
    pub fn is_open(&self) -> bool {
        !self.server_closed.load(Ordering::SeqCst) && !self.client_closed.load(Ordering::SeqCst)
    }

    /// The client called `close()`.
    pub fn closed_by_client(&self) -> bool {
        self.client_closed.load(Ordering::SeqCst)
    }
}

/// Client half handed to the code under test.
pub struct MockSocket {
    link: Arc<SocketLink>,
}

impl MockSocket {
    pub fn new(link: Arc<SocketLink>) -> Self {
        Self { link }
    }
}

#[async_trait]
impl EventSocket for MockSocket {
    async fn next_frame(&mut self) -> Option<Result<String, LivedeskError>> {
        loop {
            if self.link.client_closed.load(Ordering::SeqCst) {
                return None;
            }
            let next = self.link.inbound.lock().ok().and_then(|mut q| q.pop_front());
            match next {
                Some(Ok(frame)) => return Some(Ok(frame)),
                Some(Err(message)) => return Some(Err(LivedeskError::transport(message))),
                None if self.link.server_closed.load(Ordering::SeqCst) => return None,
                None => self.link.notify.notified().await,
            }
        }
    }

    async fn close(&mut self) {
        self.link.client_closed.store(true, Ordering::SeqCst);
        self.link.notify.notify_one();
    }
}
