//! Cache Module
//!
//! Redis backplane connections and the fan-out adapters built on them.
//!
//! ```text
//! +----------------------+      +----------------------+
//! | BackplaneConnection  | ---> | RedisAdapter         |  (publish + subscribe
//! |   "cache"            |      |   "realtime-pub"     |   duplicates)
//! +----------------------+      |   "realtime-sub"     |
//!                               +----------------------+
//! ```

mod connection;
mod memory_adapter;
mod redis_adapter;

pub use connection::{BackplaneConnection, BackplaneError, ConnectionState};
pub use memory_adapter::{MemoryAdapter, MemoryBackplane};
pub use redis_adapter::{RedisAdapter, CHANNEL};
