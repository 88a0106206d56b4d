/// Command frame encoder
///
/// Serializes one command or an ordered batch into an output buffer. The
/// encoder keeps no per-call state, so one instance can serve any number of
/// concurrent encode calls as long as each call brings its own buffer.
use crate::protocol::command::RedisCommand;
use bytes::BytesMut;
use std::sync::Arc;
use tracing::{debug, enabled, trace, Level};

/// A single command or a pipelined batch, in submission order
#[derive(Debug, Clone)]
pub enum Outbound {
    Single(Arc<dyn RedisCommand>),
    Batch(Vec<Arc<dyn RedisCommand>>),
}

impl From<Arc<dyn RedisCommand>> for Outbound {
    fn from(command: Arc<dyn RedisCommand>) -> Self {
        Outbound::Single(command)
    }
}

impl From<Vec<Arc<dyn RedisCommand>>> for Outbound {
    fn from(commands: Vec<Arc<dyn RedisCommand>>) -> Self {
        Outbound::Batch(commands)
    }
}

/// Shareable RESP command encoder
#[derive(Debug, Clone, Default)]
pub struct CommandEncoder {
    /// Log prefix, usually the peer address
    label: Option<Arc<str>>,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<Arc<str>>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }

    /// Encode a single command or a batch. Returns the number of commands
    /// written; cancelled commands contribute no bytes.
    pub fn encode(&self, out: &mut BytesMut, msg: &Outbound) -> usize {
        match msg {
            Outbound::Single(command) => usize::from(self.encode_command(out, command.as_ref())),
            Outbound::Batch(commands) => self.encode_batch(out, commands),
        }
    }

    /// Encode commands in order, skipping cancelled ones
    pub fn encode_batch(&self, out: &mut BytesMut, commands: &[Arc<dyn RedisCommand>]) -> usize {
        let mut written = 0;
        for command in commands {
            if self.encode_command(out, command.as_ref()) {
                written += 1;
            }
        }
        written
    }

    /// Encode one command. Returns false if it was cancelled and dropped.
    pub fn encode_command(&self, out: &mut BytesMut, command: &dyn RedisCommand) -> bool {
        if command.is_cancelled() {
            trace!(prefix = self.prefix(), ?command, "dropping cancelled command");
            return false;
        }

        let start = out.len();
        command.encode(out);

        debug!(prefix = self.prefix(), ?command, "writing command");
        if enabled!(Level::TRACE) {
            let sent = String::from_utf8_lossy(&out[start..]);
            trace!(prefix = self.prefix(), sent = %sent.trim(), "sent");
        }
        true
    }

    fn prefix(&self) -> &str {
        self.label.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::Command;
    use std::thread;

    fn command(name: &'static str, key: &'static str) -> Arc<dyn RedisCommand> {
        Arc::new(Command::new(name).arg(key))
    }

    #[test]
    fn test_encode_single_command() {
        let encoder = CommandEncoder::new();
        let mut out = BytesMut::new();
        let written = encoder.encode(&mut out, &Outbound::Single(command("GET", "a")));
        assert_eq!(written, 1);
        assert_eq!(&out[..], b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n");
    }

    #[test]
    fn test_cancelled_single_command_writes_nothing() {
        let encoder = CommandEncoder::new();
        let cmd = Arc::new(Command::new("GET").arg("a"));
        cmd.cancel();

        let mut out = BytesMut::new();
        let written = encoder.encode(&mut out, &Outbound::Single(cmd));
        assert_eq!(written, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_batch_skips_cancelled_and_keeps_order() {
        let encoder = CommandEncoder::with_label("10.0.0.2:6379");
        let cmd1 = Arc::new(Command::new("SET").arg("k1").arg("v1"));
        cmd1.cancel();
        let cmd1: Arc<dyn RedisCommand> = cmd1;
        let batch: Vec<Arc<dyn RedisCommand>> = vec![cmd1, command("GET", "k2"), command("DEL", "k3")];

        let mut out = BytesMut::new();
        let written = encoder.encode(&mut out, &Outbound::from(batch));
        assert_eq!(written, 2);
        assert_eq!(
            &out[..],
            b"*2\r\n$3\r\nGET\r\n$2\r\nk2\r\n*2\r\n$3\r\nDEL\r\n$2\r\nk3\r\n".as_slice()
        );
    }

    #[test]
    fn test_encode_appends_to_existing_buffer() {
        let encoder = CommandEncoder::new();
        let mut out = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n"[..]);
        encoder.encode(&mut out, &Outbound::Single(command("GET", "a")));
        assert!(out.starts_with(b"*1\r\n$4\r\nPING\r\n*2\r\n"));
    }

    #[test]
    fn test_empty_batch() {
        let encoder = CommandEncoder::new();
        let mut out = BytesMut::new();
        assert_eq!(encoder.encode(&mut out, &Outbound::Batch(Vec::new())), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_shared_encoder_across_threads() {
        let encoder = Arc::new(CommandEncoder::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let encoder = Arc::clone(&encoder);
                thread::spawn(move || {
                    let key = format!("key-{}", i);
                    let cmd: Arc<dyn RedisCommand> = Arc::new(Command::new("GET").arg(key.clone()));
                    let mut out = BytesMut::new();
                    encoder.encode(&mut out, &Outbound::Single(cmd));
                    (key, out)
                })
            })
            .collect();

        for handle in handles {
            let (key, out) = handle.join().unwrap();
            let expected = format!("*2\r\n$3\r\nGET\r\n${}\r\n{}\r\n", key.len(), key);
            assert_eq!(&out[..], expected.as_bytes());
        }
    }
}
