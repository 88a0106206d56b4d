/// Outbound wire protocol: RESP framing, command objects and the frame encoder
///
/// Response decoding lives with the caller; this layer only produces bytes.
pub mod command;
pub mod encoder;
pub mod resp;

pub use command::{Command, RedisCommand};
pub use encoder::{CommandEncoder, Outbound};
pub use resp::RespEncoder;
