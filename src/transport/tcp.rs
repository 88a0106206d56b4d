/// TCP transport for RESP connections
///
/// Each connection owns a pending buffer and two tasks: a writer fed through
/// an ordered channel and a reader that watches for peer shutdown. Replies
/// are drained and discarded here; decoding belongs to the caller's stack.
use super::{ConnectionFactory, StatefulConnection};
use crate::config::TransportConfig;
use crate::error::{ReplikaError, ReplikaResult};
use crate::protocol::{CommandEncoder, Outbound, RedisCommand};
use crate::utils::format_duration;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

const BUFFER_SIZE: usize = 8192;

/// Single TCP connection with a reusable command buffer
pub struct TcpConnection {
    peer: String,
    encoder: CommandEncoder,
    pending: Mutex<BytesMut>,
    auto_flush: AtomicBool,
    open: Arc<AtomicBool>,
    writer: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    write_task: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl TcpConnection {
    /// Wrap a connected stream. Must be called from within a tokio runtime.
    pub fn from_stream(stream: TcpStream, peer: impl Into<String>) -> Arc<Self> {
        let peer = peer.into();
        let (read_half, write_half) = stream.into_split();
        let open = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::unbounded_channel();

        let write_task = tokio::spawn(write_loop(write_half, rx, Arc::clone(&open), peer.clone()));
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&open), peer.clone()));

        Arc::new(Self {
            encoder: CommandEncoder::with_label(peer.as_str()),
            peer,
            pending: Mutex::new(BytesMut::with_capacity(BUFFER_SIZE)),
            auto_flush: AtomicBool::new(true),
            open,
            writer: Mutex::new(Some(tx)),
            write_task: Mutex::new(Some(write_task)),
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_auto_flush(&self) -> bool {
        self.auto_flush.load(Ordering::Acquire)
    }

    /// Queue one command; written immediately when auto-flush is on.
    /// Returns the number of commands that reached the buffer.
    pub fn dispatch(&self, command: Arc<dyn RedisCommand>) -> ReplikaResult<usize> {
        self.enqueue(&Outbound::Single(command))
    }

    /// Queue a pipelined batch in order
    pub fn dispatch_batch(&self, commands: Vec<Arc<dyn RedisCommand>>) -> ReplikaResult<usize> {
        self.enqueue(&Outbound::Batch(commands))
    }

    /// Flush, close, and give the writer up to `drain_timeout` to hand
    /// everything flushed to the socket. Returns whether the drain finished;
    /// on timeout the writer is aborted and unwritten bytes are lost.
    pub async fn shutdown(&self, drain_timeout: Duration) -> bool {
        self.flush_commands();

        let Some(mut write_task) = self.detach() else {
            return true;
        };
        match timeout(drain_timeout, &mut write_task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(peer = %self.peer, error = %e, "writer task failed");
                false
            }
            Err(_) => {
                warn!(
                    peer = %self.peer,
                    timeout = %format_duration(drain_timeout),
                    "drain timed out, aborting writer"
                );
                write_task.abort();
                false
            }
        }
    }

    /// Bytes encoded but not yet handed to the writer
    pub fn pending_bytes(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Mark closed, drop the sender and stop the reader. Hands back the
    /// writer task the first time it is called.
    fn detach(&self) -> Option<JoinHandle<()>> {
        self.open.store(false, Ordering::Release);
        lock(&self.writer).take();
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
        lock(&self.write_task).take()
    }

    fn enqueue(&self, msg: &Outbound) -> ReplikaResult<usize> {
        if !self.is_open() {
            return Err(ReplikaError::connection_closed(self.peer.as_str()));
        }

        let written = {
            let mut pending = lock(&self.pending);
            self.encoder.encode(&mut pending, msg)
        };

        if self.is_auto_flush() {
            self.flush_commands();
        }
        Ok(written)
    }
}

impl StatefulConnection for TcpConnection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        if let Some(write_task) = self.detach() {
            write_task.abort();
            debug!(peer = %self.peer, "connection closed");
        }
    }

    fn reset(&self) {
        let mut pending = lock(&self.pending);
        if !pending.is_empty() {
            debug!(peer = %self.peer, bytes = pending.len(), "discarding unflushed commands");
        }
        pending.clear();
    }

    fn flush_commands(&self) {
        // The pending lock is held across the send so the channel sees
        // chunks in the same order the buffer received them.
        let mut pending = lock(&self.pending);
        if pending.is_empty() {
            return;
        }

        let chunk = pending.split().freeze();
        let sent = match lock(&self.writer).as_ref() {
            Some(tx) => tx.send(chunk).is_ok(),
            None => false,
        };
        if !sent {
            warn!(peer = %self.peer, "flush on closed connection, dropping commands");
            self.open.store(false, Ordering::Release);
        }
    }

    fn set_auto_flush_commands(&self, auto_flush: bool) {
        self.auto_flush.store(auto_flush, Ordering::Release);
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    open: Arc<AtomicBool>,
    peer: String,
) {
    while let Some(chunk) = rx.recv().await {
        if let Err(e) = writer.write_all(&chunk).await {
            warn!(peer = %peer, error = %e, "write failed, marking connection closed");
            open.store(false, Ordering::Release);
            return;
        }
        trace!(peer = %peer, bytes = chunk.len(), "flushed");
    }
    let _ = writer.shutdown().await;
}

async fn read_loop(mut reader: OwnedReadHalf, open: Arc<AtomicBool>, peer: String) {
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!(peer = %peer, "peer closed connection");
                break;
            }
            Ok(n) => trace!(peer = %peer, bytes = n, "discarding inbound bytes"),
            Err(e) => {
                warn!(peer = %peer, error = %e, "read failed");
                break;
            }
        }
    }
    open.store(false, Ordering::Release);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opens [`TcpConnection`]s with a connect timeout and socket tuning
#[derive(Debug, Clone)]
pub struct TcpConnectionFactory {
    connect_timeout: Duration,
    keepalive: Option<Duration>,
}

impl TcpConnectionFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            keepalive: None,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            keepalive: config.keepalive_sec.map(Duration::from_secs),
        }
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = Some(keepalive);
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn configure_stream(&self, stream: &TcpStream) -> io::Result<()> {
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        if let Some(time) = self.keepalive {
            let keepalive = socket2::TcpKeepalive::new().with_time(time);
            socket2::SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
        }
        Ok(())
    }
}

impl Default for TcpConnectionFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl ConnectionFactory for TcpConnectionFactory {
    type Connection = TcpConnection;

    async fn connect(&self, host: &str, port: u16) -> io::Result<Arc<TcpConnection>> {
        debug!(host, port, "connecting");

        let stream = match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(host, port, error = %e, "connect failed");
                return Err(e);
            }
            Err(_) => {
                debug!(host, port, "connect timed out");
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {}", format_duration(self.connect_timeout)),
                ));
            }
        };

        if let Err(e) = self.configure_stream(&stream) {
            warn!(host, port, error = %e, "failed to configure stream");
        }

        Ok(TcpConnection::from_stream(stream, format!("{}:{}", host, port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Command;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await.unwrap();
        buf
    }

    fn ping() -> Arc<dyn RedisCommand> {
        Arc::new(Command::new("PING"))
    }

    #[tokio::test]
    async fn test_dispatch_writes_resp_frame() {
        let (listener, port) = listener().await;
        let factory = TcpConnectionFactory::default();

        let connection = factory.connect("127.0.0.1", port).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        assert!(connection.is_open());
        assert_eq!(connection.peer(), format!("127.0.0.1:{}", port));
        assert_eq!(connection.dispatch(ping()).unwrap(), 1);

        let received = read_exactly(&mut server, 14).await;
        assert_eq!(&received[..], b"*1\r\n$4\r\nPING\r\n");
    }

    #[tokio::test]
    async fn test_manual_flush_preserves_order() {
        let (listener, port) = listener().await;
        let connection = TcpConnectionFactory::default().connect("127.0.0.1", port).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        connection.set_auto_flush_commands(false);
        let get: Arc<dyn RedisCommand> = Arc::new(Command::new("GET").arg("a"));
        let cancelled = Arc::new(Command::new("DEL").arg("a"));
        cancelled.cancel();
        let cancelled: Arc<dyn RedisCommand> = cancelled;
        let batch: Vec<Arc<dyn RedisCommand>> = vec![ping(), cancelled, get];
        assert_eq!(connection.dispatch_batch(batch).unwrap(), 2);
        assert_eq!(connection.pending_bytes(), 14 + 20);

        // Nothing reaches the peer before the flush
        let mut probe = [0u8; 1];
        let early = timeout(Duration::from_millis(50), server.read(&mut probe)).await;
        assert!(early.is_err());

        connection.flush_commands();
        assert_eq!(connection.pending_bytes(), 0);
        let received = read_exactly(&mut server, 34).await;
        assert_eq!(&received[..], b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\na\r\n".as_slice());
    }

    #[tokio::test]
    async fn test_reset_discards_unflushed() {
        let (listener, port) = listener().await;
        let connection = TcpConnectionFactory::default().connect("127.0.0.1", port).await.unwrap();
        let _server = listener.accept().await.unwrap();

        connection.set_auto_flush_commands(false);
        connection.dispatch(ping()).unwrap();
        assert!(connection.pending_bytes() > 0);

        connection.reset();
        assert_eq!(connection.pending_bytes(), 0);
    }

    #[tokio::test]
    async fn test_close_rejects_dispatch() {
        let (listener, port) = listener().await;
        let connection = TcpConnectionFactory::default().connect("127.0.0.1", port).await.unwrap();
        let _server = listener.accept().await.unwrap();

        connection.close();
        connection.close();
        assert!(!connection.is_open());

        let result = connection.dispatch(ping());
        assert!(matches!(result, Err(ReplikaError::ConnectionClosed { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_drains_flushed_commands() {
        let (listener, port) = listener().await;
        let connection = TcpConnectionFactory::default().connect("127.0.0.1", port).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        connection.set_auto_flush_commands(false);
        connection.dispatch(ping()).unwrap();
        assert!(connection.shutdown(Duration::from_secs(5)).await);
        assert!(!connection.is_open());

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(&received[..], b"*1\r\n$4\r\nPING\r\n");
    }

    /// A single command larger than loopback socket buffers can absorb
    fn oversized_set() -> (Arc<dyn RedisCommand>, usize) {
        let value = vec![b'x'; 32 * 1024 * 1024];
        let frame_len = value.len() + 64;
        (Arc::new(Command::new("SET").arg("k").arg(value)), frame_len)
    }

    #[tokio::test]
    async fn test_shutdown_is_bounded_when_peer_stops_reading() {
        let (listener, port) = listener().await;
        let connection = TcpConnectionFactory::default().connect("127.0.0.1", port).await.unwrap();
        let (_server, _) = listener.accept().await.unwrap();

        let (command, _) = oversized_set();
        connection.dispatch(command).unwrap();

        let drained = timeout(Duration::from_secs(5), connection.shutdown(Duration::from_millis(200)))
            .await
            .expect("shutdown must return once the drain timeout expires");
        assert!(!drained);
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_close_stops_blocked_writer() {
        let (listener, port) = listener().await;
        let connection = TcpConnectionFactory::default().connect("127.0.0.1", port).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        let (command, frame_len) = oversized_set();
        connection.dispatch(command).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        connection.close();

        // The peer sees the stream end well before the whole frame arrives
        let mut received = 0;
        let mut buf = vec![0u8; 64 * 1024];
        let drained = timeout(Duration::from_secs(5), async {
            loop {
                match server.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received += n,
                }
            }
        })
        .await;
        assert!(drained.is_ok());
        assert!(received < frame_len - 64);
    }

    #[tokio::test]
    async fn test_peer_shutdown_marks_closed() {
        let (listener, port) = listener().await;
        let connection = TcpConnectionFactory::default().connect("127.0.0.1", port).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        drop(server);

        for _ in 0..100 {
            if !connection.is_open() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, port) = listener().await;
        drop(listener);

        let result = TcpConnectionFactory::default().connect("127.0.0.1", port).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_factory_from_config() {
        let config = TransportConfig {
            connect_timeout_ms: 1500,
            keepalive_sec: Some(30),
            auto_flush: true,
        };
        let factory = TcpConnectionFactory::from_config(&config);
        assert_eq!(factory.connect_timeout(), Duration::from_millis(1500));
        assert_eq!(factory.keepalive, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_keepalive_configuration() {
        let (listener, port) = listener().await;
        let factory = TcpConnectionFactory::new(Duration::from_secs(1))
            .with_keepalive(Duration::from_secs(60));
        let connection = factory.connect("127.0.0.1", port).await.unwrap();
        let _server = listener.accept().await.unwrap();
        assert!(connection.is_open());
    }
}
