//! Dispatch event payloads
//!
//! Each event type names the `t` value it is dispatched under.

use chord_rest::{Snowflake, User};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A dispatch event that handlers can subscribe to
///
/// `NAME` is the `t` field of the Dispatch payload carrying this event.
pub trait GatewayEvent: DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
}

/// READY - the session is established
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version
    pub v: u8,

    pub session_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    /// Guilds the account is in; they arrive later as GUILD_CREATE
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
}

impl GatewayEvent for Ready {
    const NAME: &'static str = "READY";
}

/// RESUMED - a Resume was accepted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resumed {
    #[serde(default, rename = "_trace")]
    pub trace: Vec<String>,
}

impl GatewayEvent for Resumed {
    const NAME: &'static str = "RESUMED";
}

/// A guild that has not been loaded yet, or went away
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// Guild fields common to every guild event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub large: bool,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

/// GUILD_CREATE - a guild became available or was joined
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildCreate {
    pub guild: Guild,
}

impl GatewayEvent for GuildCreate {
    const NAME: &'static str = "GUILD_CREATE";
}

/// GUILD_DELETE - a guild became unavailable or was left
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildDelete {
    pub guild: UnavailableGuild,
}

impl GatewayEvent for GuildDelete {
    const NAME: &'static str = "GUILD_DELETE";
}

/// A chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// MESSAGE_CREATE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCreate {
    pub message: Message,
}

impl GatewayEvent for MessageCreate {
    const NAME: &'static str = "MESSAGE_CREATE";
}
