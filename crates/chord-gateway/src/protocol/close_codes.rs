//! Close codes the gateway sends when it drops a connection

/// Gateway close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    /// We sent an opcode the gateway does not accept
    UnknownOpcode = 4001,
    /// We sent a payload the gateway could not decode
    DecodeError = 4002,
    /// We sent something before Identify
    NotAuthenticated = 4003,
    /// Bad token in Identify
    AuthenticationFailed = 4004,
    /// We sent Identify twice
    AlreadyAuthenticated = 4005,
    /// Resume with a bad sequence number
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimeout = 4009,
    /// Invalid `[index, count]` in Identify
    InvalidShard = 4010,
    /// The account has too many guilds for a single connection
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
}

impl CloseCode {
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            4000 => Self::UnknownError,
            4001 => Self::UnknownOpcode,
            4002 => Self::DecodeError,
            4003 => Self::NotAuthenticated,
            4004 => Self::AuthenticationFailed,
            4005 => Self::AlreadyAuthenticated,
            4007 => Self::InvalidSequence,
            4008 => Self::RateLimited,
            4009 => Self::SessionTimeout,
            4010 => Self::InvalidShard,
            4011 => Self::ShardingRequired,
            4012 => Self::InvalidApiVersion,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether a fresh connection with the same configuration can succeed.
    /// Credential, shard and version problems need operator intervention.
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
        )
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "unknown error",
            Self::UnknownOpcode => "unknown opcode",
            Self::DecodeError => "decode error",
            Self::NotAuthenticated => "not authenticated",
            Self::AuthenticationFailed => "authentication failed",
            Self::AlreadyAuthenticated => "already authenticated",
            Self::InvalidSequence => "invalid sequence",
            Self::RateLimited => "rate limited",
            Self::SessionTimeout => "session timed out",
            Self::InvalidShard => "invalid shard",
            Self::ShardingRequired => "sharding required",
            Self::InvalidApiVersion => "invalid API version",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_u16(), self.description())
    }
}
