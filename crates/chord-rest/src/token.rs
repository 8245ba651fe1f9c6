//! API credentials

use chord_common::{RestSettings, TokenType};
use std::fmt;

/// An access token together with the scheme it is presented under
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    kind: TokenType,
}

impl Token {
    /// Token for a bot account
    #[must_use]
    pub fn bot(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            kind: TokenType::Bot,
        }
    }

    /// Token for a regular user (OAuth2 bearer)
    #[must_use]
    pub fn user(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            kind: TokenType::Bearer,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &RestSettings) -> Self {
        Self {
            access_token: settings.token.clone(),
            kind: settings.token_type,
        }
    }

    /// The raw token, as sent in the gateway Identify payload
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn kind(&self) -> TokenType {
        self.kind
    }

    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.kind == TokenType::Bot
    }

    /// Value for the `Authorization` header
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("{} {}", self.kind.prefix(), self.access_token)
    }
}

// Keep the secret out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("access_token", &"<redacted>")
            .finish()
    }
}
