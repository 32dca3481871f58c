//! The `/setup` wizard as a single state machine.
//!
//! Inputs arrive as component interactions (channel selects and buttons) or
//! free-text replies. Each input is checked against the session's current
//! step; anything stale or out of order ends the session with an expiry
//! notice.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::bridge::ChannelMap;
use crate::common::messages::UpstreamCommand;
use crate::config::types::ArchipelagoConfig;
use crate::storage::{RelaySettings, SettingsStore};

use super::session::{SessionStore, SetupChoices, SetupSession, SetupStep};

/// Custom id prefix shared by every wizard component.
pub const CUSTOM_ID_PREFIX: &str = "setup";

/// Longest slot name the server accepts.
const MAX_SLOT_LEN: usize = 16;

/// Custom id of the channel select for `step`.
pub fn select_id(step: SetupStep) -> String {
    format!("{}:{}:select", CUSTOM_ID_PREFIX, step.id())
}

/// Custom id of the skip button for `step`.
pub fn skip_id(step: SetupStep) -> String {
    format!("{}:{}:skip", CUSTOM_ID_PREFIX, step.id())
}

pub const CONFIRM_ID: &str = "setup:confirm:yes";
pub const CANCEL_ID: &str = "setup:cancel";

#[derive(Debug, Clone, PartialEq)]
pub enum WizardInput {
    SelectChannel { step: SetupStep, channel_id: u64 },
    Skip { step: SetupStep },
    Text { channel_id: u64, text: String },
    Confirm,
    Cancel,
}

impl WizardInput {
    /// Parse a component interaction. `None` if the id is not a wizard id.
    ///
    /// A select with an unparsable value maps to a select for an unknown
    /// step so the wizard treats it as stale.
    pub fn from_component(custom_id: &str, values: &[String]) -> Option<WizardInput> {
        let rest = custom_id.strip_prefix(CUSTOM_ID_PREFIX)?.strip_prefix(':')?;
        if rest == "cancel" {
            return Some(WizardInput::Cancel);
        }
        if rest == "confirm:yes" {
            return Some(WizardInput::Confirm);
        }

        let (step, action) = rest.split_once(':')?;
        let step = SetupStep::from_id(step)?;
        match action {
            "select" => {
                let channel_id = values.first().and_then(|v| v.parse().ok())?;
                Some(WizardInput::SelectChannel { step, channel_id })
            }
            "skip" => Some(WizardInput::Skip { step }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardReply {
    /// Ask for `step`; `choices` holds everything collected so far.
    Prompt {
        step: SetupStep,
        choices: SetupChoices,
    },
    /// Input was for the current step but not acceptable; the step is repeated.
    Invalid { step: SetupStep, reason: String },
    /// Settings saved and applied.
    Completed(RelaySettings),
    /// Saving failed; the session is kept so confirm can be retried.
    Failed { reason: String },
    Cancelled,
    /// No session, or the input does not match the current step.
    Expired,
    /// Not meant for the wizard (plain chat from a user without a text step pending).
    Ignored,
}

/// Applies completed settings to the running relay.
pub struct SettingsApplier {
    pub channels: ChannelMap,
    pub target_tx: watch::Sender<ArchipelagoConfig>,
    pub command_tx: mpsc::UnboundedSender<UpstreamCommand>,
}

impl SettingsApplier {
    fn apply(&self, settings: &RelaySettings) {
        self.channels.replace(settings.channels.clone());
        if self.target_tx.send(settings.archipelago.clone()).is_err() {
            warn!("Upstream task is gone; new connection target not applied");
        }
        if self.command_tx.send(UpstreamCommand::Reconnect).is_err() {
            warn!("Upstream task is gone; reconnect not triggered");
        }
    }
}

pub struct SetupWizard {
    sessions: SessionStore,
    settings: Arc<dyn SettingsStore>,
    applier: SettingsApplier,
    tags: Vec<String>,
}

impl SetupWizard {
    pub fn new(
        sessions: SessionStore,
        settings: Arc<dyn SettingsStore>,
        applier: SettingsApplier,
        tags: Vec<String>,
    ) -> Self {
        Self {
            sessions,
            settings,
            applier,
            tags,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Whether `user_id` has a session waiting for a text reply in `channel_id`.
    pub fn awaits_text(&self, user_id: u64, channel_id: u64) -> bool {
        self.sessions
            .get(user_id)
            .map(|s| s.channel_id == channel_id && s.step.expects_text())
            .unwrap_or(false)
    }

    /// Start (or restart) `user_id`'s session in `channel_id`.
    pub fn start(&self, user_id: u64, channel_id: u64) -> WizardReply {
        let session = SetupSession::new(channel_id);
        let reply = prompt(&session);
        self.sessions.set(user_id, session);
        info!(user_id, channel_id, "Setup wizard started");
        reply
    }

    /// Advance `user_id`'s session with `input`.
    pub async fn handle(&self, user_id: u64, input: WizardInput) -> WizardReply {
        let Some(mut session) = self.sessions.get(user_id) else {
            return match input {
                WizardInput::Text { .. } => WizardReply::Ignored,
                _ => WizardReply::Expired,
            };
        };

        match input {
            WizardInput::Cancel => {
                self.sessions.delete(user_id);
                info!(user_id, "Setup wizard cancelled");
                WizardReply::Cancelled
            }
            WizardInput::SelectChannel { step, channel_id } => {
                let Some(category) = step.category().filter(|_| step == session.step) else {
                    return self.expire(user_id);
                };
                session.choices.channels.set(category, Some(channel_id));
                self.advance(user_id, session)
            }
            WizardInput::Skip { step } => {
                let Some(category) = step
                    .category()
                    .filter(|_| step == session.step && step != SetupStep::ChatChannel)
                else {
                    return self.expire(user_id);
                };
                session.choices.channels.set(category, None);
                self.advance(user_id, session)
            }
            WizardInput::Text { channel_id, text } => {
                if channel_id != session.channel_id || !session.step.expects_text() {
                    return WizardReply::Ignored;
                }
                match accept_text(&mut session, text.trim()) {
                    Ok(()) => self.advance(user_id, session),
                    Err(reason) => {
                        let step = session.step;
                        self.sessions.set(user_id, session);
                        WizardReply::Invalid { step, reason }
                    }
                }
            }
            WizardInput::Confirm => {
                if session.step != SetupStep::Confirm {
                    return self.expire(user_id);
                }
                self.complete(user_id, session).await
            }
        }
    }

    fn expire(&self, user_id: u64) -> WizardReply {
        self.sessions.delete(user_id);
        WizardReply::Expired
    }

    fn advance(&self, user_id: u64, mut session: SetupSession) -> WizardReply {
        match session.step.next() {
            Some(next) => {
                session.step = next;
                let reply = prompt(&session);
                self.sessions.set(user_id, session);
                reply
            }
            None => self.expire(user_id),
        }
    }

    async fn complete(&self, user_id: u64, session: SetupSession) -> WizardReply {
        let choices = &session.choices;
        let (Some(server), Some(slot)) = (choices.server.clone(), choices.slot.clone()) else {
            return self.expire(user_id);
        };
        let settings = RelaySettings {
            channels: choices.channels.clone(),
            archipelago: ArchipelagoConfig {
                server,
                slot,
                password: choices.password.clone().unwrap_or_default(),
                tags: self.tags.clone(),
            },
        };

        if let Err(e) = self.settings.save_settings(&settings).await {
            warn!(user_id, "Failed to save relay settings: {}", e);
            self.sessions.set(user_id, session);
            return WizardReply::Failed {
                reason: e.to_string(),
            };
        }

        self.sessions.delete(user_id);
        self.applier.apply(&settings);
        info!(
            user_id,
            "Setup complete; relaying {} as '{}'",
            settings.archipelago.server,
            settings.archipelago.slot
        );
        WizardReply::Completed(settings)
    }
}

fn prompt(session: &SetupSession) -> WizardReply {
    WizardReply::Prompt {
        step: session.step,
        choices: session.choices.clone(),
    }
}

/// Validate and record a text reply for the session's current step.
fn accept_text(session: &mut SetupSession, text: &str) -> Result<(), String> {
    match session.step {
        SetupStep::ServerAddress => {
            if text.is_empty() || text.contains(char::is_whitespace) {
                return Err("The server address must be a single `host:port`.".to_string());
            }
            session.choices.server = Some(text.to_string());
        }
        SetupStep::SlotName => {
            let len = text.chars().count();
            if len == 0 || len > MAX_SLOT_LEN {
                return Err(format!(
                    "The slot name must be 1 to {} characters.",
                    MAX_SLOT_LEN
                ));
            }
            session.choices.slot = Some(text.to_string());
        }
        SetupStep::Password => {
            let password = if text == "-" { "" } else { text };
            session.choices.password = Some(password.to_string());
        }
        _ => return Err("This step does not take a text reply.".to_string()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::common::error::{StorageError, StorageResult};
    use crate::config::types::ChannelsConfig;
    use crate::storage::Database;

    const USER: u64 = 1;
    const CHANNEL: u64 = 500;

    struct Fixture {
        wizard: SetupWizard,
        channels: ChannelMap,
        target_rx: watch::Receiver<ArchipelagoConfig>,
        command_rx: mpsc::UnboundedReceiver<UpstreamCommand>,
    }

    fn initial_target() -> ArchipelagoConfig {
        ArchipelagoConfig {
            server: "old.host:1".to_string(),
            slot: "Old".to_string(),
            password: String::new(),
            tags: vec!["TextOnly".to_string()],
        }
    }

    fn fixture(settings: Arc<dyn SettingsStore>) -> Fixture {
        let channels = ChannelMap::new(ChannelsConfig::default());
        let (target_tx, target_rx) = watch::channel(initial_target());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let wizard = SetupWizard::new(
            SessionStore::new(Duration::from_secs(900)),
            settings,
            SettingsApplier {
                channels: channels.clone(),
                target_tx,
                command_tx,
            },
            vec!["TextOnly".to_string()],
        );
        Fixture {
            wizard,
            channels,
            target_rx,
            command_rx,
        }
    }

    fn text(value: &str) -> WizardInput {
        WizardInput::Text {
            channel_id: CHANNEL,
            text: value.to_string(),
        }
    }

    fn select(step: SetupStep, channel_id: u64) -> WizardInput {
        WizardInput::SelectChannel { step, channel_id }
    }

    fn step_of(reply: &WizardReply) -> Option<SetupStep> {
        match reply {
            WizardReply::Prompt { step, .. } => Some(*step),
            _ => None,
        }
    }

    async fn run_to_confirm(wizard: &SetupWizard) {
        let w = wizard;
        w.start(USER, CHANNEL);
        w.handle(USER, select(SetupStep::ChatChannel, 11)).await;
        w.handle(USER, select(SetupStep::TradeChannel, 12)).await;
        w.handle(USER, WizardInput::Skip { step: SetupStep::HintChannel })
            .await;
        w.handle(USER, select(SetupStep::LogChannel, 14)).await;
        w.handle(USER, text("archipelago.gg:38281")).await;
        w.handle(USER, text("Relay")).await;
        let reply = w.handle(USER, text("-")).await;
        assert_eq!(step_of(&reply), Some(SetupStep::Confirm));
    }

    #[tokio::test]
    async fn test_full_walkthrough_persists_and_applies() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let mut f = fixture(db.clone());

        run_to_confirm(&f.wizard).await;
        let reply = f.wizard.handle(USER, WizardInput::Confirm).await;

        let expected = RelaySettings {
            channels: ChannelsConfig {
                chat: Some(11),
                trade: Some(12),
                hint: None,
                log: Some(14),
            },
            archipelago: ArchipelagoConfig {
                server: "archipelago.gg:38281".to_string(),
                slot: "Relay".to_string(),
                password: String::new(),
                tags: vec!["TextOnly".to_string()],
            },
        };
        assert_eq!(reply, WizardReply::Completed(expected.clone()));
        assert_eq!(db.load_settings().await.unwrap(), Some(expected.clone()));
        assert_eq!(f.channels.snapshot(), expected.channels);
        assert_eq!(*f.target_rx.borrow_and_update(), expected.archipelago);
        assert_eq!(f.command_rx.try_recv().ok(), Some(UpstreamCommand::Reconnect));
        assert!(f.wizard.sessions().get(USER).is_none());
    }

    #[tokio::test]
    async fn test_missing_session_is_expired() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let f = fixture(db);
        assert_eq!(
            f.wizard.handle(USER, select(SetupStep::ChatChannel, 1)).await,
            WizardReply::Expired
        );
        assert_eq!(
            f.wizard.handle(USER, WizardInput::Confirm).await,
            WizardReply::Expired
        );
        assert_eq!(f.wizard.handle(USER, text("hello")).await, WizardReply::Ignored);
    }

    #[tokio::test]
    async fn test_step_mismatch_expires_and_deletes() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let f = fixture(db);
        f.wizard.start(USER, CHANNEL);
        f.wizard.handle(USER, select(SetupStep::ChatChannel, 11)).await;

        // A stale select for the step already answered
        assert_eq!(
            f.wizard.handle(USER, select(SetupStep::ChatChannel, 99)).await,
            WizardReply::Expired
        );
        assert!(f.wizard.sessions().get(USER).is_none());
    }

    #[tokio::test]
    async fn test_confirm_before_last_step_expires() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let f = fixture(db);
        f.wizard.start(USER, CHANNEL);
        assert_eq!(
            f.wizard.handle(USER, WizardInput::Confirm).await,
            WizardReply::Expired
        );
    }

    #[tokio::test]
    async fn test_chat_channel_cannot_be_skipped() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let f = fixture(db);
        f.wizard.start(USER, CHANNEL);
        assert_eq!(
            f.wizard
                .handle(USER, WizardInput::Skip { step: SetupStep::ChatChannel })
                .await,
            WizardReply::Expired
        );
    }

    #[tokio::test]
    async fn test_invalid_text_repeats_step() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let f = fixture(db);
        f.wizard.start(USER, CHANNEL);
        for step in [SetupStep::ChatChannel, SetupStep::TradeChannel] {
            f.wizard.handle(USER, select(step, 1)).await;
        }
        for step in [SetupStep::HintChannel, SetupStep::LogChannel] {
            f.wizard.handle(USER, WizardInput::Skip { step }).await;
        }
        f.wizard.handle(USER, text("host:1")).await;

        let reply = f.wizard.handle(USER, text("ThisSlotNameIsWayTooLong")).await;
        assert!(matches!(
            reply,
            WizardReply::Invalid {
                step: SetupStep::SlotName,
                ..
            }
        ));
        assert_eq!(
            f.wizard.sessions().get(USER).map(|s| s.step),
            Some(SetupStep::SlotName)
        );
    }

    #[tokio::test]
    async fn test_text_from_other_channel_ignored() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let f = fixture(db);
        f.wizard.start(USER, CHANNEL);
        for step in [SetupStep::ChatChannel, SetupStep::TradeChannel] {
            f.wizard.handle(USER, select(step, 1)).await;
        }
        for step in [SetupStep::HintChannel, SetupStep::LogChannel] {
            f.wizard.handle(USER, WizardInput::Skip { step }).await;
        }

        assert!(f.wizard.awaits_text(USER, CHANNEL));
        assert!(!f.wizard.awaits_text(USER, CHANNEL + 1));
        let reply = f
            .wizard
            .handle(
                USER,
                WizardInput::Text {
                    channel_id: CHANNEL + 1,
                    text: "host:1".to_string(),
                },
            )
            .await;
        assert_eq!(reply, WizardReply::Ignored);
        assert_eq!(
            f.wizard.sessions().get(USER).map(|s| s.step),
            Some(SetupStep::ServerAddress)
        );
    }

    #[tokio::test]
    async fn test_cancel_deletes_session() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let f = fixture(db);
        f.wizard.start(USER, CHANNEL);
        assert_eq!(
            f.wizard.handle(USER, WizardInput::Cancel).await,
            WizardReply::Cancelled
        );
        assert!(f.wizard.sessions().is_empty());
    }

    struct FailingSettings(Mutex<u32>);

    #[async_trait]
    impl SettingsStore for FailingSettings {
        async fn load_settings(&self) -> StorageResult<Option<RelaySettings>> {
            Ok(None)
        }

        async fn save_settings(&self, _settings: &RelaySettings) -> StorageResult<()> {
            *self.0.lock().unwrap() += 1;
            Err(StorageError::InvalidValue {
                key: "relay".to_string(),
                message: "disk full".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_save_failure_keeps_session() {
        let store = Arc::new(FailingSettings(Mutex::new(0)));
        let mut f = fixture(store.clone());
        run_to_confirm(&f.wizard).await;

        let reply = f.wizard.handle(USER, WizardInput::Confirm).await;
        assert!(matches!(reply, WizardReply::Failed { .. }));
        assert_eq!(
            f.wizard.sessions().get(USER).map(|s| s.step),
            Some(SetupStep::Confirm)
        );
        assert_eq!(f.channels.snapshot(), ChannelsConfig::default());
        assert!(f.command_rx.try_recv().is_err());

        let reply = f.wizard.handle(USER, WizardInput::Confirm).await;
        assert!(matches!(reply, WizardReply::Failed { .. }));
        assert_eq!(*store.0.lock().unwrap(), 2);
    }

    #[test]
    fn test_component_ids() {
        assert_eq!(select_id(SetupStep::HintChannel), "setup:hint:select");
        assert_eq!(
            WizardInput::from_component("setup:hint:select", &["42".to_string()]),
            Some(select(SetupStep::HintChannel, 42))
        );
        assert_eq!(
            WizardInput::from_component(&skip_id(SetupStep::LogChannel), &[]),
            Some(WizardInput::Skip {
                step: SetupStep::LogChannel
            })
        );
        assert_eq!(
            WizardInput::from_component(CONFIRM_ID, &[]),
            Some(WizardInput::Confirm)
        );
        assert_eq!(
            WizardInput::from_component(CANCEL_ID, &[]),
            Some(WizardInput::Cancel)
        );
        assert_eq!(WizardInput::from_component("setup:hint:select", &[]), None);
        assert_eq!(WizardInput::from_component("other:thing", &[]), None);
        assert_eq!(WizardInput::from_component("setup:nope:select", &[]), None);
    }
}
