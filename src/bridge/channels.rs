//! Channel wiring between the upstream client and the Discord side.

use tokio::sync::{mpsc, watch};

use crate::common::messages::{ActivityStatus, ClassifiedEvent, OutgoingChat, UpstreamCommand};
use crate::config::types::ArchipelagoConfig;

/// Channels used by the upstream connection task.
pub struct UpstreamChannels {
    /// Classified events for Discord.
    pub event_tx: mpsc::UnboundedSender<ClassifiedEvent>,
    /// Chat typed in Discord, waiting to be sent as `Say`.
    pub outgoing_rx: mpsc::UnboundedReceiver<OutgoingChat>,
    /// Manual reconnect requests.
    pub command_rx: mpsc::UnboundedReceiver<UpstreamCommand>,
    /// Connection state published for `/status` and the bot activity.
    pub status_tx: watch::Sender<ActivityStatus>,
    /// Current connection target; replaced when the setup wizard completes.
    pub target_rx: watch::Receiver<ArchipelagoConfig>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels used by the Discord handler.
pub struct DiscordSideChannels {
    pub event_rx: mpsc::UnboundedReceiver<ClassifiedEvent>,
    pub outgoing_tx: mpsc::UnboundedSender<OutgoingChat>,
    pub command_tx: mpsc::UnboundedSender<UpstreamCommand>,
    pub status_rx: watch::Receiver<ActivityStatus>,
    pub target_tx: watch::Sender<ArchipelagoConfig>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    pub shutdown_tx: watch::Sender<bool>,
}

pub struct ChannelBundle {
    pub upstream: UpstreamChannels,
    pub discord: DiscordSideChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new(initial_target: ArchipelagoConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ActivityStatus::Connecting);
        let (target_tx, target_rx) = watch::channel(initial_target);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            upstream: UpstreamChannels {
                event_tx,
                outgoing_rx,
                command_rx,
                status_tx,
                target_rx,
                shutdown_rx,
            },
            discord: DiscordSideChannels {
                event_rx,
                outgoing_tx,
                command_tx,
                status_rx,
                target_tx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }
}
