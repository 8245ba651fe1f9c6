//! Opcode-specific payload bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Body of op 10 (Hello)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Body of op 2 (Identify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Raw access token
    pub token: String,

    pub properties: IdentifyProperties,

    /// Whether the client supports compressed payloads. Always false here.
    pub compress: bool,

    /// Member count above which a guild's offline members are not sent
    pub large_threshold: u16,

    /// `[shard_index, shard_count]`
    pub shard: [u32; 2],

    /// Presence to start the session with
    pub presence: StatusUpdate,
}

/// Connection properties sent with Identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    #[serde(rename = "$os")]
    pub os: String,

    #[serde(rename = "$browser")]
    pub browser: String,

    #[serde(rename = "$device")]
    pub device: String,
}

impl IdentifyProperties {
    /// Library name reported as browser and device
    pub const LIBRARY_NAME: &'static str = "chord";

    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: Self::LIBRARY_NAME.to_string(),
            device: Self::LIBRARY_NAME.to_string(),
        }
    }
}

/// Body of op 6 (Resume)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received
    pub seq: u64,
}

/// Online status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    /// Do not disturb
    Dnd,
    Idle,
    /// Shown as offline
    Invisible,
    Offline,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Dnd => "dnd",
            Self::Idle => "idle",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "dnd" => Some(Self::Dnd),
            "idle" => Some(Self::Idle),
            "invisible" => Some(Self::Invisible),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the "Playing ..." line says
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GameKind {
    /// "Playing {name}"
    Game = 0,
    /// "Streaming {name}", requires a URL
    Streaming = 1,
    /// "Listening to {name}"
    Listening = 2,
    /// "Watching {name}"
    Watching = 3,
}

impl GameKind {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Game),
            1 => Some(Self::Streaming),
            2 => Some(Self::Listening),
            3 => Some(Self::Watching),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Serialize for GameKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for GameKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid game type: {value}")))
    }
}

/// The game/stream/etc. shown under a user's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GameKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Game {
    #[must_use]
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: GameKind::Game,
            url: None,
        }
    }

    #[must_use]
    pub fn streaming(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: GameKind::Streaming,
            url: Some(url.into()),
        }
    }

    #[must_use]
    pub fn listening(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: GameKind::Listening,
            url: None,
        }
    }

    #[must_use]
    pub fn watching(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: GameKind::Watching,
            url: None,
        }
    }
}

/// Body of op 3 (Status Update); also the `presence` field of Identify
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Unix time in milliseconds the client went idle
    pub since: Option<i64>,
    pub game: Option<Game>,
    pub status: Status,
    pub afk: bool,
}

impl StatusUpdate {
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn online() -> Self {
        Self::new(Status::Online)
    }

    /// Idle since the given instant
    #[must_use]
    pub fn idle_since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since.timestamp_millis()),
            status: Status::Idle,
            afk: true,
            game: None,
        }
    }

    #[must_use]
    pub fn with_game(mut self, game: Game) -> Self {
        self.game = Some(game);
        self
    }

    #[must_use]
    pub fn with_afk(mut self, afk: bool) -> Self {
        self.afk = afk;
        self
    }
}
