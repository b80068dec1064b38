// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge daemon: one hub session until Ctrl-C or a fatal error.
//!
//! Reconnecting is left to the service manager; the process exits non-zero
//! when the session fails.

use std::process::ExitCode;

use larnitech_bridge::protocol::{MqttTransport, Publisher, WsConnection};
use larnitech_bridge::{BridgeConfig, Session};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match BridgeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("larnitech-bridge: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    match run(config).await {
        Ok(()) => {
            tracing::info!("Bye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Bridge stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: BridgeConfig) -> larnitech_bridge::Result<()> {
    let mut builder = MqttTransport::builder()
        .host(&config.mqtt.host)
        .port(config.mqtt.port)
        .client_id(&config.mqtt.client_id);
    if let (Some(username), Some(password)) = (&config.mqtt.username, &config.mqtt.password) {
        builder = builder.credentials(username, password);
    }
    let mqtt = builder.build().await?;

    let hub = match WsConnection::connect(&config.hub.url()).await {
        Ok(hub) => hub,
        Err(e) => {
            if let Err(err) = mqtt.disconnect().await {
                tracing::warn!(error = %err, "Failed to disconnect from MQTT broker");
            }
            return Err(e.into());
        }
    };

    let mut session = Session::new(config.session_options(), hub, mqtt.clone());
    let router = session.router();
    mqtt.set_message_handler(move |topic: &str, payload: &str| router.handle(topic, payload));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            on_signal.cancel();
        }
    });

    session.run(cancel).await
}
