//! The ephemeral tier: auth-states, refresh-token and session blocklists,
//! per-user session sets, and distributed locks -- everything whose
//! natural lifetime is a TTL rather than a durable row.

pub mod keys;
pub mod memory_store;
pub mod redis_store;
pub mod store;

pub use memory_store::MemoryEphemeralStore;
pub use redis_store::RedisEphemeralStore;
pub use store::EphemeralStore;
