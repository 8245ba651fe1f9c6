//! Gateway protocol definitions
//!
//! Op codes, the payload envelope, opcode-specific bodies and close codes.

mod close_codes;
pub mod codec;
mod opcodes;
mod payload;
mod payloads;

pub use close_codes::CloseCode;
pub use opcodes::OpCode;
pub use payload::Payload;
pub use payloads::{
    Game, GameKind, HelloPayload, IdentifyPayload, IdentifyProperties, ResumePayload,
    Status, StatusUpdate,
};
