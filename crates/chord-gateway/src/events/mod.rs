//! Gateway events
//!
//! Dispatch event payloads and the registry that routes them to handlers.

mod registry;
mod types;

pub use registry::{HandlerId, HandlerRegistration, HandlerRegistry, RegistrationGuard};
pub use types::{
    GatewayEvent, Guild, GuildCreate, GuildDelete, Message, MessageCreate, Ready, Resumed,
    UnavailableGuild,
};
