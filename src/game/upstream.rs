//! Upstream connection task with linear backoff.
//!
//! Each pass connects, runs one session and asks the [`Reconnector`] what to
//! do next. Once it gives up the task idles until a manual reconnect (the
//! `/reconnect` command or a completed setup wizard) or shutdown.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::bridge::channels::UpstreamChannels;
use crate::bridge::Relay;
use crate::common::messages::{ActivityStatus, OutgoingChat, UpstreamCommand};
use crate::common::reconnect::{ReconnectConfig, Reconnector, RetryDecision};
use crate::config::types::ArchipelagoConfig;
use crate::protocol::Connector;

use super::client::{SessionOutcome, UpstreamClient};

pub struct Upstream<C: Connector> {
    connector: C,
    client: UpstreamClient,
    reconnector: Reconnector,
    outgoing_rx: mpsc::UnboundedReceiver<OutgoingChat>,
    command_rx: mpsc::UnboundedReceiver<UpstreamCommand>,
    target_rx: watch::Receiver<ArchipelagoConfig>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<C: Connector> Upstream<C> {
    pub fn new(
        connector: C,
        relay: Arc<Relay>,
        reconnect: ReconnectConfig,
        channels: UpstreamChannels,
    ) -> Self {
        let UpstreamChannels {
            event_tx,
            outgoing_rx,
            command_rx,
            status_tx,
            target_rx,
            shutdown_rx,
        } = channels;

        Self {
            connector,
            client: UpstreamClient::new(relay, event_tx, status_tx),
            reconnector: Reconnector::new(reconnect),
            outgoing_rx,
            command_rx,
            target_rx,
            shutdown_rx,
        }
    }

    /// Run until shutdown.
    pub async fn run(self) {
        let Self {
            connector,
            mut client,
            mut reconnector,
            mut outgoing_rx,
            mut command_rx,
            mut target_rx,
            mut shutdown_rx,
        } = self;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let target = target_rx.borrow_and_update().clone();
            reconnector.begin_attempt();
            client.publish(ActivityStatus::Connecting);
            info!("Connecting to {} as '{}'...", target.server, target.slot);

            let session = connect_and_run(
                &connector,
                &mut client,
                &mut reconnector,
                &target,
                &mut outgoing_rx,
            );
            let outcome = tokio::select! {
                outcome = session => Some(outcome),
                Some(UpstreamCommand::Reconnect) = command_rx.recv() => None,
                _ = shutdown_requested(&mut shutdown_rx) => break,
            };
            let Some(outcome) = outcome else {
                info!("Manual reconnect requested; restarting session");
                reconnector.cancel_retry();
                continue;
            };

            match &outcome.error {
                Some(e) => warn!("Upstream session ended: {}", e),
                None => info!("Upstream session ended"),
            }

            match reconnector.schedule_retry() {
                RetryDecision::Retry { attempt, delay } => {
                    info!(
                        "Reconnecting in {:.1} seconds (attempt {})...",
                        delay.as_secs_f64(),
                        attempt
                    );
                    client.publish(ActivityStatus::Retrying { attempt, delay });

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        Some(UpstreamCommand::Reconnect) = command_rx.recv() => {
                            info!("Manual reconnect requested during backoff");
                            reconnector.cancel_retry();
                        }
                        _ = shutdown_requested(&mut shutdown_rx) => break,
                    }
                }
                RetryDecision::GiveUp => {
                    error!(
                        "Giving up on {} after repeated failures; use /reconnect to try again",
                        target.server
                    );
                    client.publish(ActivityStatus::GivenUp);

                    tokio::select! {
                        Some(UpstreamCommand::Reconnect) = command_rx.recv() => {
                            info!("Manual reconnect requested");
                            reconnector.cancel_retry();
                        }
                        _ = shutdown_requested(&mut shutdown_rx) => break,
                    }
                }
            }
        }

        info!("Upstream task stopped");
    }
}

async fn connect_and_run<C: Connector>(
    connector: &C,
    client: &mut UpstreamClient,
    reconnector: &mut Reconnector,
    target: &ArchipelagoConfig,
    outgoing_rx: &mut mpsc::UnboundedReceiver<OutgoingChat>,
) -> SessionOutcome {
    match connector.connect(&target.server).await {
        Ok(mut transport) => {
            client
                .run(&mut transport, target, outgoing_rx, reconnector)
                .await
        }
        Err(e) => SessionOutcome {
            established: false,
            error: Some(e.into()),
        },
    }
}

/// Resolves once shutdown is signalled or the control side is gone.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}
