/// Command objects as seen by the frame encoder
use crate::core::Intent;
use crate::protocol::resp::RespEncoder;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A command ready for the wire.
///
/// The encoder only relies on two properties: whether the command was
/// cancelled before it reached the wire, and how it writes itself.
pub trait RedisCommand: Send + Sync + fmt::Debug {
    fn is_cancelled(&self) -> bool;

    /// Append this command's wire representation to `buf`
    fn encode(&self, buf: &mut BytesMut);
}

/// Redis command representation: a name plus binary-safe arguments
pub struct Command {
    name: Bytes,
    args: Vec<Bytes>,
    cancelled: AtomicBool,
}

impl Command {
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Append an argument (builder style)
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Mark the command as cancelled; it will be skipped if not yet encoded
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Routing intent derived from the command name
    pub fn intent(&self) -> Intent {
        Intent::for_command(&String::from_utf8_lossy(&self.name))
    }
}

impl RedisCommand for Command {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn encode(&self, buf: &mut BytesMut) {
        RespEncoder::write_array_header(buf, self.args.len() + 1);
        RespEncoder::write_bulk_string(buf, &self.name);
        for arg in &self.args {
            RespEncoder::write_bulk_string(buf, arg);
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("args", &self.args.len())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
