//! HTTP client for the REST API

use crate::error::{RestError, RestResult};
use crate::model::{GatewayInfo, User};
use crate::token::Token;
use async_trait::async_trait;
use chord_common::RestSettings;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with every request. Bots must use the `DiscordBot (url, version)` form.
pub const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/seung/chord, v",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Base URL for API calls
pub const BASE_URL: &str = "https://discordapp.com/api";

pub const ENDPOINT_GATEWAY: &str = "/gateway";
pub const ENDPOINT_GATEWAY_BOT: &str = "/gateway/bot";

#[must_use]
pub fn endpoint_user(id: &str) -> String {
    format!("/users/{id}")
}

/// The REST operations the gateway side depends on
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Look up the gateway URL (and, for bots, the suggested shard count)
    async fn gateway(&self) -> RestResult<GatewayInfo>;

    /// Fetch a user; `"@me"` returns the authenticated account
    async fn user(&self, id: &str) -> RestResult<User>;
}

/// Per-request header overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    content_type: Option<String>,
    user_agent: Option<String>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use something other than `application/json`
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Override the default user agent. Bots should keep the `DiscordBot (url, version)` prefix.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Later options win over earlier ones
    fn merge(&self, over: &Self) -> Self {
        Self {
            content_type: over.content_type.clone().or_else(|| self.content_type.clone()),
            user_agent: over.user_agent.clone().or_else(|| self.user_agent.clone()),
        }
    }
}

/// `reqwest`-backed implementation of [`RestClient`]
#[derive(Debug, Clone)]
pub struct HttpRestClient {
    http: reqwest::Client,
    token: Token,
    base_url: String,
    defaults: RequestOptions,
}

impl HttpRestClient {
    /// Default request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(token: Token) -> RestResult<Self> {
        Self::with_timeout(token, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(token: Token, timeout: Duration) -> RestResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            token,
            base_url: BASE_URL.to_string(),
            defaults: RequestOptions::default(),
        })
    }

    pub fn from_settings(settings: &RestSettings) -> RestResult<Self> {
        Ok(
            Self::with_timeout(Token::from_settings(settings), Duration::from_millis(settings.timeout_ms))?
                .with_base_url(settings.base_url.clone()),
        )
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Options applied to every request before per-call options
    #[must_use]
    pub fn with_default_options(mut self, options: RequestOptions) -> Self {
        self.defaults = options;
        self
    }

    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make an arbitrary request and return the raw response body
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        options: &RequestOptions,
    ) -> RestResult<Vec<u8>> {
        let options = self.defaults.merge(options);

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, self.token.authorization())
            .header(
                USER_AGENT_HEADER,
                options.user_agent.as_deref().unwrap_or(USER_AGENT),
            )
            .header(
                CONTENT_TYPE,
                options.content_type.as_deref().unwrap_or("application/json"),
            );
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        // Always read the body so the connection can be reused.
        let data = response.bytes().await?.to_vec();

        tracing::debug!(%method, url, status, bytes = data.len(), "REST request completed");

        if !(200..=399).contains(&status) {
            return Err(RestError::from_response(status, &data));
        }

        Ok(data)
    }

    /// Make a request and decode the JSON response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        options: &RequestOptions,
    ) -> RestResult<T> {
        let data = self.request(method, url, body, options).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn gateway(&self) -> RestResult<GatewayInfo> {
        let path = if self.token.is_bot() {
            ENDPOINT_GATEWAY_BOT
        } else {
            ENDPOINT_GATEWAY
        };
        self.request_json(Method::GET, &self.endpoint(path), None, &RequestOptions::default())
            .await
    }

    async fn user(&self, id: &str) -> RestResult<User> {
        self.request_json(
            Method::GET,
            &self.endpoint(&endpoint_user(id)),
            None,
            &RequestOptions::default(),
        )
        .await
    }
}
