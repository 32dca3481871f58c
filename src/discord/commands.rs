//! Slash commands (/link, /unlink, /links, /reconnect, /status, /setup).
//!
//! Parsing and execution are kept apart from the interaction plumbing so the
//! command logic can be driven without a gateway.

use std::sync::Arc;

use serenity::all::{
    CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption, Permissions,
    ResolvedValue,
};
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::bridge::ChannelMap;
use crate::common::messages::{ActivityStatus, ChannelCategory, UpstreamCommand};
use crate::storage::UserLinkStore;

/// Longest slot name the server accepts.
const MAX_SLOT_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    Link { slot: String },
    Unlink { slot: String },
    Links,
    Reconnect,
    Status,
    Setup,
}

impl SlashCommand {
    pub fn parse(name: &str, slot: Option<&str>) -> Option<SlashCommand> {
        let slot = || slot.map(|s| s.trim().to_string());
        match name {
            "link" => Some(SlashCommand::Link { slot: slot()? }),
            "unlink" => Some(SlashCommand::Unlink { slot: slot()? }),
            "links" => Some(SlashCommand::Links),
            "reconnect" => Some(SlashCommand::Reconnect),
            "status" => Some(SlashCommand::Status),
            "setup" => Some(SlashCommand::Setup),
            _ => None,
        }
    }

    pub fn from_interaction(command: &CommandInteraction) -> Option<SlashCommand> {
        let slot = command
            .data
            .options()
            .into_iter()
            .find(|opt| opt.name == "slot")
            .and_then(|opt| match opt.value {
                ResolvedValue::String(value) => Some(value),
                _ => None,
            });
        Self::parse(&command.data.name, slot)
    }
}

/// Command definitions registered with Discord.
pub fn definitions() -> Vec<CreateCommand> {
    let slot_option = |description: &str| {
        CreateCommandOption::new(CommandOptionType::String, "slot", description)
            .required(true)
            .max_length(MAX_SLOT_LEN as u16)
    };

    vec![
        CreateCommand::new("link")
            .description("Get pinged when your slot shows up in the multiworld")
            .add_option(slot_option("Your slot name")),
        CreateCommand::new("unlink")
            .description("Stop getting pinged for a slot")
            .add_option(slot_option("Slot name to unlink")),
        CreateCommand::new("links").description("List the slots linked to you"),
        CreateCommand::new("status").description("Show the Archipelago connection status"),
        CreateCommand::new("reconnect")
            .description("Reconnect to the Archipelago server now")
            .default_member_permissions(Permissions::MANAGE_GUILD),
        CreateCommand::new("setup")
            .description("Pick relay channels and the Archipelago server")
            .default_member_permissions(Permissions::MANAGE_GUILD),
    ]
}

/// What the interaction layer should do with a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Reply privately with this text.
    Reply(String),
    /// Open the setup wizard.
    StartSetup,
}

pub struct CommandHandler {
    links: Arc<dyn UserLinkStore>,
    channels: ChannelMap,
    command_tx: mpsc::UnboundedSender<UpstreamCommand>,
    status_rx: watch::Receiver<ActivityStatus>,
}

impl CommandHandler {
    pub fn new(
        links: Arc<dyn UserLinkStore>,
        channels: ChannelMap,
        command_tx: mpsc::UnboundedSender<UpstreamCommand>,
        status_rx: watch::Receiver<ActivityStatus>,
    ) -> Self {
        Self {
            links,
            channels,
            command_tx,
            status_rx,
        }
    }

    pub async fn execute(&self, user_id: u64, command: SlashCommand) -> anyhow::Result<CommandOutcome> {
        info!(user_id, "Slash command {:?}", command);

        let reply = match command {
            SlashCommand::Link { slot } => self.link(user_id, &slot).await?,
            SlashCommand::Unlink { slot } => {
                if self.links.unlink(user_id, &slot).await? {
                    format!("Unlinked **{}**.", slot)
                } else {
                    format!("**{}** is not linked to you.", slot)
                }
            }
            SlashCommand::Links => {
                let links = self.links.links_for_user(user_id).await?;
                if links.is_empty() {
                    "You have no linked slots. Use `/link` to add one.".to_string()
                } else {
                    let slots: Vec<String> =
                        links.iter().map(|l| format!("- {}", l.slot_name)).collect();
                    format!("Your linked slots:\n{}", slots.join("\n"))
                }
            }
            SlashCommand::Reconnect => {
                self.command_tx.send(UpstreamCommand::Reconnect)?;
                "Reconnecting to the Archipelago server.".to_string()
            }
            SlashCommand::Status => self.status(),
            SlashCommand::Setup => return Ok(CommandOutcome::StartSetup),
        };
        Ok(CommandOutcome::Reply(reply))
    }

    async fn link(&self, user_id: u64, slot: &str) -> anyhow::Result<String> {
        let len = slot.chars().count();
        if len == 0 || len > MAX_SLOT_LEN {
            return Ok(format!("Slot names are 1 to {} characters.", MAX_SLOT_LEN));
        }

        if let Some(existing) = self.links.find_by_slot(slot).await? {
            if existing.discord_id == user_id {
                return Ok(format!("**{}** is already linked to you.", existing.slot_name));
            }
            return Ok(format!(
                "**{}** is already linked to <@{}>.",
                existing.slot_name, existing.discord_id
            ));
        }

        self.links.link(user_id, slot).await?;
        Ok(format!("Linked **{}**. You'll be pinged when it shows up.", slot))
    }

    fn status(&self) -> String {
        let connection = describe_status(&self.status_rx.borrow());
        let channels = self.channels.snapshot();
        let mapping: Vec<String> = ChannelCategory::ALL
            .iter()
            .map(|c| match channels.get(*c) {
                Some(id) => format!("- {}: <#{}>", c, id),
                None => format!("- {}: not set", c),
            })
            .collect();
        format!("{}\n{}", connection, mapping.join("\n"))
    }
}

/// Human-readable connection state, shared by `/status` and the bot activity.
pub fn describe_status(status: &ActivityStatus) -> String {
    match status {
        ActivityStatus::Connecting => "Connecting to Archipelago".to_string(),
        ActivityStatus::Connected { slot, server } => format!("Connected as {} to {}", slot, server),
        ActivityStatus::Retrying { attempt, delay } => format!(
            "Retrying in {}s (attempt {})",
            delay.as_secs(),
            attempt
        ),
        ActivityStatus::GivenUp => "Disconnected; use /reconnect".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::types::ChannelsConfig;
    use crate::storage::Database;

    struct Fixture {
        handler: CommandHandler,
        db: Arc<Database>,
        command_rx: mpsc::UnboundedReceiver<UpstreamCommand>,
        status_tx: watch::Sender<ActivityStatus>,
    }

    async fn fixture(links: &[(&str, u64)]) -> Fixture {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        for (slot, id) in links {
            db.link(*id, slot).await.unwrap();
        }
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ActivityStatus::Connecting);
        let channels = ChannelMap::new(ChannelsConfig {
            chat: Some(11),
            ..Default::default()
        });
        let handler = CommandHandler::new(db.clone(), channels, command_tx, status_rx);
        Fixture {
            handler,
            db,
            command_rx,
            status_tx,
        }
    }

    async fn owner(db: &Database, slot: &str) -> Option<u64> {
        db.find_by_slot(slot).await.unwrap().map(|l| l.discord_id)
    }

    fn reply(outcome: CommandOutcome) -> String {
        match outcome {
            CommandOutcome::Reply(text) => text,
            other => panic!("expected a reply, got {:?}", other),
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            SlashCommand::parse("link", Some(" Steve ")),
            Some(SlashCommand::Link {
                slot: "Steve".to_string()
            })
        );
        assert_eq!(SlashCommand::parse("link", None), None);
        assert_eq!(SlashCommand::parse("status", None), Some(SlashCommand::Status));
        assert_eq!(SlashCommand::parse("nope", None), None);
    }

    #[test]
    fn test_definitions_cover_every_command() {
        assert_eq!(definitions().len(), 6);
    }

    #[tokio::test]
    async fn test_link_new_slot() {
        let f = fixture(&[]).await;
        let text = reply(
            f.handler
                .execute(1, SlashCommand::Link { slot: "Steve".to_string() })
                .await
                .unwrap(),
        );
        assert!(text.starts_with("Linked **Steve**"));
        assert_eq!(owner(&f.db, "steve").await, Some(1));
    }

    #[tokio::test]
    async fn test_link_owned_by_someone_else_refused() {
        let f = fixture(&[("Steve", 2)]).await;
        let text = reply(
            f.handler
                .execute(1, SlashCommand::Link { slot: "steve".to_string() })
                .await
                .unwrap(),
        );
        assert!(text.contains("<@2>"));
        assert_eq!(owner(&f.db, "Steve").await, Some(2));
    }

    #[tokio::test]
    async fn test_link_rejects_long_slot() {
        let f = fixture(&[]).await;
        let text = reply(
            f.handler
                .execute(
                    1,
                    SlashCommand::Link {
                        slot: "ThisSlotNameIsWayTooLong".to_string(),
                    },
                )
                .await
                .unwrap(),
        );
        assert!(text.contains("1 to 16"));
        assert!(f.db.links_for_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unlink_and_list() {
        let f = fixture(&[("Steve", 1), ("Alex", 1), ("Zed", 2)]).await;
        let text = reply(f.handler.execute(1, SlashCommand::Links).await.unwrap());
        assert_eq!(text, "Your linked slots:\n- Alex\n- Steve");

        let text = reply(
            f.handler
                .execute(1, SlashCommand::Unlink { slot: "Zed".to_string() })
                .await
                .unwrap(),
        );
        assert!(text.contains("not linked to you"));

        let text = reply(
            f.handler
                .execute(1, SlashCommand::Unlink { slot: "Steve".to_string() })
                .await
                .unwrap(),
        );
        assert_eq!(text, "Unlinked **Steve**.");
        assert_eq!(owner(&f.db, "Steve").await, None);
    }

    #[tokio::test]
    async fn test_reconnect_sends_command() {
        let mut f = fixture(&[]).await;
        f.handler.execute(1, SlashCommand::Reconnect).await.unwrap();
        assert_eq!(f.command_rx.try_recv().ok(), Some(UpstreamCommand::Reconnect));
    }

    #[tokio::test]
    async fn test_status_reflects_upstream() {
        let f = fixture(&[]).await;
        f.status_tx
            .send(ActivityStatus::Retrying {
                attempt: 2,
                delay: Duration::from_secs(10),
            })
            .unwrap();
        let text = reply(f.handler.execute(1, SlashCommand::Status).await.unwrap());
        assert!(text.starts_with("Retrying in 10s (attempt 2)"));
        assert!(text.contains("- chat: <#11>"));
        assert!(text.contains("- log: not set"));
    }

    #[tokio::test]
    async fn test_setup_opens_wizard() {
        let f = fixture(&[]).await;
        assert_eq!(
            f.handler.execute(1, SlashCommand::Setup).await.unwrap(),
            CommandOutcome::StartSetup
        );
    }
}
