// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push-notification channel lifecycle.
//!
//! A [`NotificationChannel`] owns one supervisor task. The supervisor creates
//! and subscribes a platform channel, keeps a socket open on it, reopens the
//! same channel after a fixed backoff when the socket drops, replaces the
//! channel after too many failed reopens, and rotates to a fresh channel
//! before the server-side subscription expires (make-before-break).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use livedesk_config::model::ChannelConfig;
use livedesk_core::{ChannelEndpoint, EventSocket, LivedeskError, NotificationApi, Topic};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::FrameHandler;
use crate::health::PushHealth;
use crate::topic::{canonical_set, dedupe};

/// Timing knobs for one channel.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub reconnect_backoff: Duration,
    pub lifetime: Duration,
    pub rotation_ratio: f64,
    pub max_reopen_attempts: u32,
}

impl ChannelSettings {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            reconnect_backoff: config.reconnect_backoff(),
            lifetime: config.subscription_lifetime(),
            rotation_ratio: config.rotation_ratio,
            max_reopen_attempts: config.max_reopen_attempts.max(1),
        }
    }

    /// How long after creation a channel is replaced.
    ///
    /// A server-advertised expiry shortens the configured lifetime, never
    /// lengthens it.
    pub fn rotation_delay(&self, endpoint: &ChannelEndpoint, created: DateTime<Utc>) -> Duration {
        let configured = self.lifetime.mul_f64(self.rotation_ratio);
        let advertised = endpoint
            .expires
            .and_then(|expires| (expires - created).to_std().ok())
            .map(|remaining| remaining.mul_f64(self.rotation_ratio));
        match advertised {
            Some(advertised) => configured.min(advertised),
            None => configured,
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::from_config(&ChannelConfig::default())
    }
}

/// Result of [`NotificationChannel::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new supervisor was spawned for the topic set.
    Started,
    /// Already running with exactly this topic set.
    AlreadyRunning,
    /// The topic set was empty; the channel is stopped.
    Stopped,
}

#[derive(Debug, Default)]
struct ChannelStatus {
    connected: AtomicBool,
    channel_id: ArcSwapOption<String>,
    topics: ArcSwap<Vec<Topic>>,
}

struct Running {
    /// Canonical form, for idempotence checks.
    topics: Vec<Topic>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// One supervised push-notification channel.
pub struct NotificationChannel {
    name: String,
    api: Arc<dyn NotificationApi>,
    handler: Arc<dyn FrameHandler>,
    health: Arc<PushHealth>,
    settings: ChannelSettings,
    status: Arc<ChannelStatus>,
    running: Mutex<Option<Running>>,
}

impl NotificationChannel {
    pub fn new(
        name: impl Into<String>,
        api: Arc<dyn NotificationApi>,
        handler: Arc<dyn FrameHandler>,
        health: Arc<PushHealth>,
        settings: ChannelSettings,
    ) -> Self {
        Self {
            name: name.into(),
            api,
            handler,
            health,
            settings,
            status: Arc::new(ChannelStatus::default()),
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the channel for `topics`.
    ///
    /// Idempotent for the same set regardless of order and duplicates. Any
    /// other set replaces the running session; an empty set stops it.
    pub async fn start(&self, topics: &[Topic]) -> StartOutcome {
        let wanted = canonical_set(topics);
        let mut running = self.running.lock().await;

        if wanted.is_empty() {
            shutdown(running.take()).await;
            self.reset_status();
            return StartOutcome::Stopped;
        }

        if let Some(current) = running.as_ref() {
            if current.topics == wanted && !current.handle.is_finished() {
                return StartOutcome::AlreadyRunning;
            }
        }

        shutdown(running.take()).await;
        self.reset_status();

        let ordered = dedupe(topics);
        self.status.topics.store(Arc::new(ordered.clone()));
        let cancel = CancellationToken::new();
        let supervisor = Supervisor {
            name: self.name.clone(),
            api: self.api.clone(),
            handler: self.handler.clone(),
            health: self.health.clone(),
            settings: self.settings.clone(),
            status: self.status.clone(),
            topics: ordered,
            cancel: cancel.clone(),
        };
        info!(channel = %self.name, topics = wanted.len(), "starting push channel");
        let handle = tokio::spawn(supervisor.run());
        *running = Some(Running {
            topics: wanted,
            cancel,
            handle,
        });
        StartOutcome::Started
    }

    /// Stop the supervisor, close its socket and wait for it to exit.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            info!(channel = %self.name, "stopping push channel");
        }
        shutdown(running.take()).await;
        self.reset_status();
    }

    fn reset_status(&self) {
        self.status.connected.store(false, Ordering::SeqCst);
        self.status.channel_id.store(None);
        self.status.topics.store(Arc::new(Vec::new()));
    }

    pub fn is_connected(&self) -> bool {
        self.status.connected.load(Ordering::SeqCst)
    }

    /// Id of the platform channel currently in use.
    pub fn channel_id(&self) -> Option<String> {
        self.status.channel_id.load_full().map(|id| id.as_ref().clone())
    }

    /// Topics assigned to this channel, in subscription order.
    pub fn topics(&self) -> Vec<Topic> {
        self.status.topics.load().as_ref().clone()
    }
}

async fn shutdown(running: Option<Running>) {
    let Some(running) = running else {
        return;
    };
    running.cancel.cancel();
    if let Err(err) = running.handle.await {
        if err.is_panic() {
            error!(error = %err, "push channel supervisor panicked");
        }
    }
}

/// A subscribed platform channel and the instant it must be replaced.
struct Established {
    endpoint: ChannelEndpoint,
    rotate_at: Instant,
}

/// Why a read loop ended.
enum ReadEnd {
    Cancelled,
    RotationDue,
    Closed(String),
}

struct Supervisor {
    name: String,
    api: Arc<dyn NotificationApi>,
    handler: Arc<dyn FrameHandler>,
    health: Arc<PushHealth>,
    settings: ChannelSettings,
    status: Arc<ChannelStatus>,
    topics: Vec<Topic>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(self) {
        let mut channel: Option<Established> = None;
        let mut handoff: Option<Box<dyn EventSocket>> = None;
        let mut failed_opens: u32 = 0;

        loop {
            let active = match channel.take() {
                Some(active) => active,
                None => match self.cancellable(self.establish()).await {
                    None => break,
                    Some(Ok(active)) => {
                        failed_opens = 0;
                        active
                    }
                    Some(Err(err)) => {
                        self.health.record_transport_error("establish");
                        warn!(channel = %self.name, error = %err, "failed to create push channel");
                        if self.pause().await {
                            break;
                        }
                        continue;
                    }
                },
            };
            self.status
                .channel_id
                .store(Some(Arc::new(active.endpoint.id.clone())));

            let mut socket = match handoff.take() {
                Some(socket) => socket,
                None => match self
                    .cancellable(self.api.open_socket(&active.endpoint.connect_uri))
                    .await
                {
                    None => break,
                    Some(Ok(socket)) => socket,
                    Some(Err(err)) => {
                        failed_opens += 1;
                        self.health.record_transport_error("open");
                        warn!(
                            channel = %self.name,
                            channel_id = %active.endpoint.id,
                            attempt = failed_opens,
                            error = %err,
                            "failed to open notification socket"
                        );
                        if failed_opens < self.settings.max_reopen_attempts {
                            channel = Some(active);
                        } else {
                            warn!(
                                channel = %self.name,
                                channel_id = %active.endpoint.id,
                                "reopen attempts exhausted, replacing channel"
                            );
                            failed_opens = 0;
                        }
                        if self.pause().await {
                            break;
                        }
                        continue;
                    }
                },
            };
            failed_opens = 0;
            self.status.connected.store(true, Ordering::SeqCst);
            info!(channel = %self.name, channel_id = %active.endpoint.id, "push channel connected");

            match self.read_until_closed(socket.as_mut(), active.rotate_at).await {
                ReadEnd::Cancelled => {
                    socket.close().await;
                    break;
                }
                ReadEnd::Closed(reason) => {
                    socket.close().await;
                    self.status.connected.store(false, Ordering::SeqCst);
                    self.health.record_reconnect();
                    warn!(
                        channel = %self.name,
                        channel_id = %active.endpoint.id,
                        reason = %reason,
                        "notification socket closed, reopening after backoff"
                    );
                    channel = Some(active);
                    if self.pause().await {
                        break;
                    }
                }
                ReadEnd::RotationDue => match self.rotate(socket.as_mut()).await {
                    None => {
                        socket.close().await;
                        break;
                    }
                    Some(Ok((next, next_socket))) => {
                        socket.close().await;
                        self.health.record_rotation();
                        info!(
                            channel = %self.name,
                            old_channel_id = %active.endpoint.id,
                            new_channel_id = %next.endpoint.id,
                            "rotated push channel ahead of expiry"
                        );
                        channel = Some(next);
                        handoff = Some(next_socket);
                    }
                    Some(Err(err)) => {
                        socket.close().await;
                        self.status.connected.store(false, Ordering::SeqCst);
                        self.health.record_transport_error("rotate");
                        warn!(
                            channel = %self.name,
                            channel_id = %active.endpoint.id,
                            error = %err,
                            "channel rotation failed, recreating"
                        );
                    }
                },
            }
        }

        self.status.connected.store(false, Ordering::SeqCst);
        debug!(channel = %self.name, "push channel supervisor exited");
    }

    /// Create a platform channel and subscribe it to this channel's topics.
    async fn establish(&self) -> Result<Established, LivedeskError> {
        let endpoint = self.api.create_channel().await?;
        let created = Instant::now();
        let rotate_after = self.settings.rotation_delay(&endpoint, Utc::now());
        self.api.subscribe(&endpoint.id, &self.topics).await?;
        debug!(
            channel = %self.name,
            channel_id = %endpoint.id,
            topics = self.topics.len(),
            rotate_after_secs = rotate_after.as_secs(),
            "push channel subscribed"
        );
        Ok(Established {
            endpoint,
            rotate_at: created + rotate_after,
        })
    }

    async fn replacement(&self) -> Result<(Established, Box<dyn EventSocket>), LivedeskError> {
        let next = self.establish().await?;
        let socket = self.api.open_socket(&next.endpoint.connect_uri).await?;
        Ok((next, socket))
    }

    /// Bring up the replacement channel while still draining the old socket.
    ///
    /// Returns `None` when cancelled.
    async fn rotate(
        &self,
        old: &mut dyn EventSocket,
    ) -> Option<Result<(Established, Box<dyn EventSocket>), LivedeskError>> {
        let replacement = self.replacement();
        tokio::pin!(replacement);
        let mut old_open = true;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                result = &mut replacement => return Some(result),
                frame = old.next_frame(), if old_open => match frame {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(_)) | None => old_open = false,
                },
            }
        }
    }

    async fn read_until_closed(&self, socket: &mut dyn EventSocket, rotate_at: Instant) -> ReadEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ReadEnd::Cancelled,
                _ = tokio::time::sleep_until(rotate_at) => return ReadEnd::RotationDue,
                frame = socket.next_frame() => match frame {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(err)) => {
                        self.health.record_transport_error("read");
                        return ReadEnd::Closed(err.to_string());
                    }
                    None => return ReadEnd::Closed("closed by peer".into()),
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let now = Utc::now();
        self.health.record_frame(now);
        match self.handler.handle_frame(text, now) {
            Ok(handled) if handled.is_event() => {
                self.health.record_event(handled.kind(), now);
                debug!(channel = %self.name, kind = handled.kind(), "push event applied");
            }
            Ok(_) => {}
            Err(err) => {
                self.health.record_malformed();
                warn!(channel = %self.name, error = %err, "dropping malformed frame");
            }
        }
    }

    /// Sleep the reconnect backoff. Returns true if cancelled meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(self.settings.reconnect_backoff) => false,
        }
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }
}
