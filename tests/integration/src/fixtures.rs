//! Test fixtures and data generators
//!
//! Dispatch bodies shaped the way the gateway sends them.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Token every test client identifies with
pub const TEST_TOKEN: &str = "test-token";

/// Counter for unique snowflakes
static COUNTER: AtomicU64 = AtomicU64::new(175_928_847_299_117_063);

/// Get a unique snowflake as the gateway formats it
pub fn unique_id() -> String {
    COUNTER.fetch_add(1, Ordering::SeqCst).to_string()
}

/// READY body
pub fn ready(session_id: &str) -> Value {
    json!({
        "v": 6,
        "session_id": session_id,
        "user": {
            "id": unique_id(),
            "username": "chord-test",
            "discriminator": "0001",
            "bot": true
        },
        "guilds": [{"id": unique_id(), "unavailable": true}],
        "_trace": ["gateway-test"]
    })
}

/// GUILD_CREATE body
pub fn guild(name: &str) -> Value {
    json!({
        "id": unique_id(),
        "name": name,
        "owner_id": unique_id(),
        "member_count": 3,
        "large": false,
        "joined_at": "2017-05-01T12:00:00+00:00"
    })
}

/// MESSAGE_CREATE body
pub fn message(content: &str) -> Value {
    json!({
        "id": unique_id(),
        "channel_id": unique_id(),
        "guild_id": unique_id(),
        "author": {"id": unique_id(), "username": "someone", "discriminator": "1234"},
        "content": content,
        "timestamp": "2017-05-01T12:00:01+00:00"
    })
}
