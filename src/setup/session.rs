//! Per-user setup sessions with expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::common::messages::ChannelCategory;
use crate::config::types::ChannelsConfig;

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(900);

/// How often the background task sweeps expired sessions.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Wizard steps in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    ChatChannel,
    TradeChannel,
    HintChannel,
    LogChannel,
    ServerAddress,
    SlotName,
    Password,
    Confirm,
}

impl SetupStep {
    pub const FIRST: SetupStep = SetupStep::ChatChannel;

    pub fn next(self) -> Option<SetupStep> {
        match self {
            Self::ChatChannel => Some(Self::TradeChannel),
            Self::TradeChannel => Some(Self::HintChannel),
            Self::HintChannel => Some(Self::LogChannel),
            Self::LogChannel => Some(Self::ServerAddress),
            Self::ServerAddress => Some(Self::SlotName),
            Self::SlotName => Some(Self::Password),
            Self::Password => Some(Self::Confirm),
            Self::Confirm => None,
        }
    }

    /// Identifier used in component custom ids.
    pub fn id(self) -> &'static str {
        match self {
            Self::ChatChannel => "chat",
            Self::TradeChannel => "trade",
            Self::HintChannel => "hint",
            Self::LogChannel => "log",
            Self::ServerAddress => "server",
            Self::SlotName => "slot",
            Self::Password => "password",
            Self::Confirm => "confirm",
        }
    }

    pub fn from_id(id: &str) -> Option<SetupStep> {
        match id {
            "chat" => Some(Self::ChatChannel),
            "trade" => Some(Self::TradeChannel),
            "hint" => Some(Self::HintChannel),
            "log" => Some(Self::LogChannel),
            "server" => Some(Self::ServerAddress),
            "slot" => Some(Self::SlotName),
            "password" => Some(Self::Password),
            "confirm" => Some(Self::Confirm),
            _ => None,
        }
    }

    /// Channel category chosen at this step, for the channel steps.
    pub fn category(self) -> Option<ChannelCategory> {
        match self {
            Self::ChatChannel => Some(ChannelCategory::Chat),
            Self::TradeChannel => Some(ChannelCategory::Trade),
            Self::HintChannel => Some(ChannelCategory::Hint),
            Self::LogChannel => Some(ChannelCategory::Log),
            _ => None,
        }
    }

    /// Whether this step is answered with a free-text reply.
    pub fn expects_text(self) -> bool {
        matches!(self, Self::ServerAddress | Self::SlotName | Self::Password)
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::ChatChannel => "Pick the channel for chat, joins and goals.",
            Self::TradeChannel => "Pick the channel for item sends and trades, or skip.",
            Self::HintChannel => "Pick the channel for hints, or skip.",
            Self::LogChannel => "Pick the channel for the item and event log, or skip.",
            Self::ServerAddress => {
                "Reply in this channel with the server address, e.g. `archipelago.gg:38281`."
            }
            Self::SlotName => "Reply with the slot name the relay connects as.",
            Self::Password => "Reply with the room password, or `-` for none.",
            Self::Confirm => "Review the settings and confirm.",
        }
    }
}

/// Values collected so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetupChoices {
    pub channels: ChannelsConfig,
    pub server: Option<String>,
    pub slot: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupSession {
    /// Channel the wizard was started in; free-text replies must come from here.
    pub channel_id: u64,
    pub step: SetupStep,
    pub choices: SetupChoices,
}

impl SetupSession {
    pub fn new(channel_id: u64) -> Self {
        Self {
            channel_id,
            step: SetupStep::FIRST,
            choices: SetupChoices::default(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    session: SetupSession,
    touched: Instant,
}

/// One setup session per user. Entries idle longer than the TTL are gone.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<u64, Entry>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Entry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, user_id: u64) -> Option<SetupSession> {
        let mut sessions = self.lock();
        match sessions.get(&user_id) {
            Some(entry) if entry.touched.elapsed() < self.ttl => Some(entry.session.clone()),
            Some(_) => {
                sessions.remove(&user_id);
                debug!(user_id, "Setup session expired");
                None
            }
            None => None,
        }
    }

    /// Store `session`, replacing any previous one, and restart its TTL.
    pub fn set(&self, user_id: u64, session: SetupSession) {
        self.lock().insert(
            user_id,
            Entry {
                session,
                touched: Instant::now(),
            },
        );
    }

    pub fn delete(&self, user_id: u64) -> Option<SetupSession> {
        self.lock().remove(&user_id).map(|entry| entry.session)
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.touched.elapsed() < self.ttl);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
