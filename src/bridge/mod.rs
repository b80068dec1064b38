// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The hub session.
//!
//! A [`Session`] owns the hub connection and walks through a fixed sequence
//! of states:
//!
//! ```text
//! Disconnected → Authorizing → Discovering → Subscribing → Active → Closing
//! ```
//!
//! Any failure before `Active` is fatal. Once active, the session serves two
//! flows from one task:
//!
//! - **downstream**: `statuses` events are applied to the registry and the
//!   affected devices are re-published;
//! - **upstream**: updates queued by the [`CommandRouter`] are sent to the hub
//!   as `status-set` requests, one at a time and in queue order.
//!
//! On exit, whatever the reason, the hub connection is closed and the
//! publisher released.

pub mod discovery;
pub mod queue;
pub mod router;

pub use discovery::Announcement;
pub use queue::CommandQueue;
pub use router::CommandRouter;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::classifier::{ClassifyOptions, classify};
use crate::device::{Device, Rendered};
use crate::error::{Error, ProtocolError};
use crate::protocol::message::{
    AuthorizeResponse, DevicesResponse, STATUSES_EVENT, StatusSetResponse, StatusesEvent,
    SubscribeResponse, request,
};
use crate::protocol::{HubConnection, HubMessage, HubRequest, Publisher};
use crate::registry::{DeviceRegistry, SharedRegistry};

/// Default bridge topic prefix.
pub const DEFAULT_TOPIC_PREFIX: &str = "larnitech";

/// Default Home Assistant discovery prefix.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not started.
    Disconnected,
    /// Waiting for the API key to be accepted.
    Authorizing,
    /// Fetching and registering devices.
    Discovering,
    /// Subscribing to status changes.
    Subscribing,
    /// Serving status events and commands.
    Active,
    /// Shutting down.
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Authorizing => "authorizing",
            Self::Discovering => "discovering",
            Self::Subscribing => "subscribing",
            Self::Active => "active",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Settings of a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Hub API key.
    pub key: String,
    /// Prefix of every state and command topic.
    pub topic_prefix: String,
    /// Home Assistant discovery prefix.
    pub discovery_prefix: String,
    /// Device filters and grouping options.
    pub classify: ClassifyOptions,
    /// Pause between announcing devices and publishing their initial state.
    pub initial_state_delay: Duration,
    /// How often the command queue is drained.
    pub poll_interval: Duration,
}

impl SessionOptions {
    /// Creates options with the given API key and default settings.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
            classify: ClassifyOptions::default(),
            initial_state_delay: Duration::from_secs(3),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// Sets the discovery prefix.
    #[must_use]
    pub fn discovery_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.discovery_prefix = prefix.into();
        self
    }

    /// Sets the topic prefix.
    #[must_use]
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Sets the device filters.
    #[must_use]
    pub fn classify(mut self, options: ClassifyOptions) -> Self {
        self.classify = options;
        self
    }

    /// Sets the initial-state delay.
    #[must_use]
    pub fn initial_state_delay(mut self, delay: Duration) -> Self {
        self.initial_state_delay = delay;
        self
    }

    /// Sets the queue poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// One bridge session over a hub connection `C` and a publisher `P`.
pub struct Session<C, P> {
    options: SessionOptions,
    conn: C,
    publisher: P,
    registry: SharedRegistry,
    queue: CommandQueue,
    announcements: HashMap<String, Announcement>,
    state: watch::Sender<SessionState>,
}

impl<C, P> fmt::Debug for Session<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &*self.state.borrow())
            .field("devices", &self.registry.read().len())
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl<C: HubConnection, P: Publisher> Session<C, P> {
    /// Creates a session; nothing is sent until [`run`](Self::run).
    #[must_use]
    pub fn new(options: SessionOptions, conn: C, publisher: P) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            options,
            conn,
            publisher,
            registry: DeviceRegistry::new().into_shared(),
            queue: CommandQueue::new(),
            announcements: HashMap::new(),
            state,
        }
    }

    /// Returns a router feeding this session's command queue.
    ///
    /// Install it as the publisher's inbound message handler.
    #[must_use]
    pub fn router(&self) -> CommandRouter {
        CommandRouter::new(
            self.options.topic_prefix.clone(),
            SharedRegistry::clone(&self.registry),
            self.queue.clone(),
        )
    }

    /// Returns the registry of this session.
    #[must_use]
    pub fn registry(&self) -> SharedRegistry {
        SharedRegistry::clone(&self.registry)
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!(state = %state, "Session state");
        self.state.send_replace(state);
    }

    /// Runs the session until it fails or `cancel` is triggered.
    ///
    /// The connection is closed and the publisher released before returning,
    /// including on error. Updates still queued at that point are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the handshake fails or the connection is
    /// lost, and [`Error::Validation`] if the device list is invalid.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), Error> {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Session cancelled");
                Ok(())
            }
            result = self.drive() => result,
        };

        if let Err(ref e) = result {
            tracing::error!(error = %e, "Session failed");
        }

        self.teardown().await;
        result
    }

    async fn drive(&mut self) -> Result<(), Error> {
        self.authorize().await?;
        self.discover().await?;
        self.subscribe().await?;
        self.serve().await
    }

    async fn teardown(&mut self) {
        self.set_state(SessionState::Closing);

        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::warn!(dropped, "Discarding unsent commands");
        }

        if let Err(e) = self.conn.close().await {
            tracing::warn!(error = %e, "Failed to close hub connection");
        }
        if let Err(e) = self.publisher.disconnect().await {
            tracing::warn!(error = %e, "Failed to disconnect publisher");
        }
    }

    /// Sends a request, logging the target device when there is one.
    async fn send(&mut self, request: &HubRequest) -> Result<(), ProtocolError> {
        {
            let registry = self.registry.read();
            match request.address().and_then(|addr| registry.resolve(addr)) {
                Some(device) => tracing::debug!(
                    request = %request.name(),
                    address = ?request.address(),
                    area = %device.area(),
                    name = %device.name(),
                    "Sending request"
                ),
                None => tracing::debug!(request = %request.name(), "Sending request"),
            }
        }

        self.conn.send(request).await
    }

    /// Sends a request and decodes the response correlated to it.
    async fn request<T>(&mut self, request: HubRequest) -> Result<T, ProtocolError>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.send(&request).await?;
        let reply = self.conn.recv().await?;
        reply.into_response(request.name())
    }

    async fn authorize(&mut self) -> Result<(), Error> {
        self.set_state(SessionState::Authorizing);

        let response: AuthorizeResponse = self
            .request(HubRequest::authorize(self.options.key.clone()))
            .await?;

        if !response.is_success() {
            return Err(ProtocolError::AuthorizationFailed(response.result).into());
        }

        tracing::info!("Authorized on hub");
        Ok(())
    }

    async fn discover(&mut self) -> Result<(), Error> {
        self.set_state(SessionState::Discovering);

        let response: DevicesResponse = self.request(HubRequest::get_devices()).await?;
        let found = response.found.unwrap_or(response.devices.len());

        let classification = classify(response.devices, &self.options.classify)?;

        for record in &classification.ignore {
            tracing::info!(
                address = ?record.get("addr"),
                kind = ?record.get("type"),
                area = ?record.get("area"),
                "Ignoring device"
            );
        }

        for device in classification.register {
            self.announce(device).await?;
        }

        if !self.options.initial_state_delay.is_zero() {
            tokio::time::sleep(self.options.initial_state_delay).await;
        }

        let initial: Vec<(String, Rendered)> = self
            .registry
            .read()
            .iter()
            .map(|device| (device.address().to_string(), device.render_external()))
            .collect();
        for (address, values) in initial {
            self.publish_state(&address, values).await?;
        }

        tracing::info!(
            found,
            ignored = classification.ignore.len(),
            registered = self.registry.read().len(),
            "Devices discovered"
        );

        Ok(())
    }

    /// Registers the device, then subscribes to its commands and publishes
    /// its discovery config.
    async fn announce(&mut self, device: Device) -> Result<(), Error> {
        let announcement = Announcement::new(
            &device,
            &self.options.topic_prefix,
            &self.options.discovery_prefix,
        );
        let address = device.address().to_string();
        let (area, name) = (device.area().to_string(), device.name().to_string());

        self.registry.write().add(device)?;
        tracing::info!(
            address = %address,
            area = %area,
            name = %name,
            config = %announcement.config_topic,
            "Device registered"
        );

        for topic in &announcement.command_topics {
            self.publisher.subscribe(topic).await?;
        }

        self.publisher
            .publish(&announcement.config_topic, announcement.payload_json(), true)
            .await?;

        self.announcements.insert(address, announcement);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), Error> {
        self.set_state(SessionState::Subscribing);

        let addresses = self.registry.read().constituent_addresses();
        let requested = addresses.len();

        let response: SubscribeResponse = self
            .request(HubRequest::status_subscribe(addresses))
            .await?;

        if response.found != requested || response.subscribed != requested {
            return Err(ProtocolError::SubscriptionMismatch {
                requested,
                found: response.found,
                subscribed: response.subscribed,
            }
            .into());
        }

        tracing::info!(count = requested, "Subscribed to status changes");
        Ok(())
    }

    async fn serve(&mut self) -> Result<(), Error> {
        self.set_state(SessionState::Active);

        let mut poll =
            tokio::time::interval(self.options.poll_interval.max(Duration::from_millis(1)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.conn.recv() => match message {
                    Ok(message) => self.handle_message(message).await?,
                    Err(ProtocolError::Json(e)) => {
                        tracing::warn!(error = %e, "Undecodable frame dropped");
                    }
                    Err(e) => return Err(e.into()),
                },
                _ = poll.tick() => self.drain_queue().await?,
            }
        }
    }

    async fn drain_queue(&mut self) -> Result<(), ProtocolError> {
        while let Some(update) = self.queue.pop() {
            self.send(&HubRequest::from(update)).await?;
        }
        Ok(())
    }

    async fn handle_message(&mut self, message: HubMessage) -> Result<(), ProtocolError> {
        match message {
            HubMessage::Event { name, body } if name == STATUSES_EVENT => {
                match StatusesEvent::from_body(body) {
                    Ok(event) => self.apply_statuses(event).await?,
                    Err(e) => tracing::warn!(error = %e, "Malformed statuses event"),
                }
            }
            HubMessage::Response { name, body } if name == request::STATUS_SET => {
                match serde_json::from_value::<StatusSetResponse>(body.into()) {
                    Ok(response) => self.log_status_set(&response),
                    Err(e) => tracing::warn!(error = %e, "Malformed status-set response"),
                }
            }
            other => tracing::warn!(message = %other.describe(), "Unexpected message"),
        }
        Ok(())
    }

    async fn apply_statuses(&mut self, event: StatusesEvent) -> Result<(), ProtocolError> {
        for entry in event.entries() {
            let entry = match entry {
                Ok(entry) => entry,
                Err((raw, e)) => {
                    tracing::warn!(entry = %raw, error = %e, "Malformed status entry dropped");
                    continue;
                }
            };

            let rendered = {
                let mut registry = self.registry.write();
                let Some(device) = registry.resolve_mut(&entry.addr) else {
                    tracing::debug!(address = %entry.addr, "Status for unknown device dropped");
                    continue;
                };

                if let Err(e) = device.set_status(entry.status, &entry.addr) {
                    tracing::warn!(address = %entry.addr, error = %e, "Status rejected");
                    continue;
                }

                (device.address().to_string(), device.render_external())
            };

            self.publish_state(&rendered.0, rendered.1).await?;
        }
        Ok(())
    }

    async fn publish_state(&self, address: &str, values: Rendered) -> Result<(), ProtocolError> {
        let Some(announcement) = self.announcements.get(address) else {
            return Ok(());
        };

        for (channel, value) in &values {
            let Some(topic) = announcement.state_topic(channel) else {
                tracing::warn!(address = %address, channel = %channel, "No topic for channel");
                continue;
            };
            self.publisher
                .publish(topic, discovery::encode_value(value), false)
                .await?;
        }
        Ok(())
    }

    fn log_status_set(&self, response: &StatusSetResponse) {
        let registry = self.registry.read();
        for result in &response.devices {
            let (area, name) = registry
                .resolve(&result.addr)
                .map_or(("?", "?"), |d| (d.area(), d.name()));

            if result.success {
                tracing::debug!(address = %result.addr, area = %area, name = %name, "Status changed");
            } else {
                tracing::error!(
                    address = %result.addr,
                    area = %area,
                    name = %name,
                    details = ?result.details,
                    "Failed to change status"
                );
            }
        }
    }
}
