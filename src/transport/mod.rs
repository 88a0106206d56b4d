/// Transport seam: connection handles and the factory that opens them
///
/// The routing layer never touches sockets directly. It asks a
/// [`ConnectionFactory`] for a handle and drives its lifecycle through
/// [`StatefulConnection`].
pub mod tcp;

use async_trait::async_trait;
use std::io;
use std::sync::Arc;

pub use tcp::{TcpConnection, TcpConnectionFactory};

/// A live connection to one node.
///
/// All operations are non-blocking; network effects are dispatched to the
/// connection's own I/O tasks.
pub trait StatefulConnection: Send + Sync + 'static {
    /// Whether the connection can currently carry commands
    fn is_open(&self) -> bool;

    /// Close the connection. Idempotent.
    fn close(&self);

    /// Discard queued commands that were not yet written
    fn reset(&self);

    /// Write out everything queued since the last flush
    fn flush_commands(&self);

    /// With auto-flush off, commands queue until `flush_commands`
    fn set_auto_flush_commands(&self, auto_flush: bool);
}

/// Opens transport connections; invoked by the provider on cache misses.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: StatefulConnection;

    async fn connect(&self, host: &str, port: u16) -> io::Result<Arc<Self::Connection>>;
}
