/// Core value types shared by the routing and protocol layers
pub mod intent;
pub mod key;
pub mod node;

pub use intent::Intent;
pub use key::ConnectionKey;
pub use node::{NodeRole, RedisNodeDescription};
