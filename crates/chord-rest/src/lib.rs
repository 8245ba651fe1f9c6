//! # chord-rest
//!
//! The REST side of the API: token handling, a `reqwest`-backed client, and the
//! `/gateway` lookup the gateway client needs before it can connect.

mod client;
mod error;
mod model;
mod token;

pub use client::{
    endpoint_user, HttpRestClient, RequestOptions, RestClient, BASE_URL, ENDPOINT_GATEWAY,
    ENDPOINT_GATEWAY_BOT, USER_AGENT, VERSION,
};
pub use error::{ApiErrorBody, RestError, RestResult};
pub use model::{GatewayInfo, Snowflake, User};
pub use token::Token;

pub use chord_common::TokenType;
pub use reqwest::{Method, Url};
