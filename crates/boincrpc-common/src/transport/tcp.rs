use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::LazyLock;
use std::time::Duration;

use regex::bytes::Regex;

use crate::protocol::error::{BoincRpcError, Result};

/// Port the BOINC core client listens on for GUI RPC.
pub const DEFAULT_PORT: u16 = 31416;

/// Byte that ends every message on the wire.
pub const TERMINATOR: u8 = 0x03;

/// Size of each socket read while waiting for a terminator.
const RECV_CHUNK_SIZE: usize = 8192;

/// TCP transport for GUI RPC (synchronous).
///
/// Owns at most one connection to the daemon and exchanges framed messages
/// over it. The socket is closed on [`disconnect`](Self::disconnect) and when
/// the transport is dropped.
///
/// # Wire Protocol
///
/// Messages carry no length prefix; each one is the XML text followed by a
/// single terminator byte:
///
/// ```text
/// [XML data] [0x03]
/// ```
///
/// # Example
///
/// ```no_run
/// use boincrpc_common::transport::TcpTransport;
///
/// let mut transport = TcpTransport::new("localhost", 31416, None);
/// transport.connect().unwrap();
///
/// let reply = transport
///     .call(b"<boinc_gui_rpc_request><exchange_versions/></boinc_gui_rpc_request>")
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Option<Duration>,
    stream: Option<TcpStream>,
    /// Bytes read past the last terminator, handed out by the next receive.
    pending: Vec<u8>,
}

impl TcpTransport {
    /// Creates a disconnected transport for `host:port`.
    ///
    /// `timeout` bounds connection establishment and every blocking read or
    /// write; `None` blocks indefinitely.
    pub fn new(host: impl Into<String>, port: u16, timeout: Option<Duration>) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            stream: None,
            pending: Vec::new(),
        }
    }

    /// Creates a transport and connects it.
    pub fn open(host: impl Into<String>, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let mut transport = Self::new(host, port, timeout);
        transport.connect()?;
        Ok(transport)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connects to the configured endpoint.
    ///
    /// The address may resolve to several socket addresses; each is tried in
    /// turn until one accepts.
    ///
    /// # Errors
    ///
    /// Returns [`BoincRpcError::Connection`] if:
    /// - The transport is already connected
    /// - The address cannot be resolved
    /// - Connection fails to all resolved addresses
    /// - Timeouts cannot be set on the stream
    pub fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Err(BoincRpcError::Connection(format!(
                "already connected to {}:{}",
                self.host, self.port
            )));
        }

        let addr = format!("{}:{}", self.host, self.port);
        let socket_addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| BoincRpcError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            let attempt = match self.timeout {
                Some(timeout) => TcpStream::connect_timeout(&socket_addr, timeout),
                None => TcpStream::connect(socket_addr),
            };

            match attempt {
                Ok(stream) => {
                    stream
                        .set_read_timeout(self.timeout)
                        .map_err(|e| BoincRpcError::Connection(format!("Failed to set read timeout: {}", e)))?;
                    stream
                        .set_write_timeout(self.timeout)
                        .map_err(|e| BoincRpcError::Connection(format!("Failed to set write timeout: {}", e)))?;

                    tracing::debug!("Connected to {} ({})", addr, socket_addr);
                    self.stream = Some(stream);
                    self.pending.clear();
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!("Connection attempt to {} failed: {}", socket_addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(BoincRpcError::Connection(format!(
            "Failed to connect to {}: {}",
            addr,
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }

    /// Closes the connection. Does nothing when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; the socket is released on drop either way.
            let _ = stream.shutdown(Shutdown::Both);
            tracing::debug!("Disconnected from {}:{}", self.host, self.port);
        }
        self.pending.clear();
    }

    /// Returns a second handle to the open socket.
    ///
    /// Shutting that handle down from another thread unblocks a pending
    /// `send` or `receive`, which then fails.
    pub fn try_clone_stream(&self) -> Result<TcpStream> {
        let stream = self.stream.as_ref().ok_or(BoincRpcError::NotConnected)?;
        stream.try_clone().map_err(|e| self.map_io_error(e, "cloning stream"))
    }

    /// Sanitizes `data`, appends the terminator and writes the whole frame.
    ///
    /// # Errors
    ///
    /// - [`BoincRpcError::NotConnected`] without an open connection
    /// - [`BoincRpcError::Transport`] / [`BoincRpcError::Timeout`] if the write
    ///   cannot complete
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut frame = sanitize(data);
        frame.push(TERMINATOR);

        let result = {
            let stream = self.stream.as_mut().ok_or(BoincRpcError::NotConnected)?;
            stream.write_all(&frame).and_then(|()| stream.flush())
        };
        result.map_err(|e| self.map_write_error(e))?;

        tracing::debug!("Sent {} bytes to {}:{}", frame.len(), self.host, self.port);
        Ok(())
    }

    /// Reads one message, without its terminator.
    ///
    /// Reads chunks until one contains the terminator. Anything that arrived
    /// after the terminator is kept for the next call.
    ///
    /// # Errors
    ///
    /// - [`BoincRpcError::NotConnected`] without an open connection
    /// - [`BoincRpcError::ConnectionBroken`] if the peer closes the socket
    ///   before a terminator arrives
    /// - [`BoincRpcError::Timeout`] if a read exceeds the timeout
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        if self.stream.is_none() {
            return Err(BoincRpcError::NotConnected);
        }

        let mut message = std::mem::take(&mut self.pending);
        let mut scanned = 0;
        let mut chunk = [0u8; RECV_CHUNK_SIZE];

        loop {
            if let Some(offset) = message[scanned..].iter().position(|&b| b == TERMINATOR) {
                let end = scanned + offset;
                self.pending = message.split_off(end + 1);
                message.truncate(end);
                tracing::debug!("Received {} bytes from {}:{}", message.len(), self.host, self.port);
                return Ok(message);
            }
            scanned = message.len();

            let read = {
                let stream = self.stream.as_mut().ok_or(BoincRpcError::NotConnected)?;
                stream.read(&mut chunk)
            };
            match read {
                Ok(0) => {
                    tracing::debug!(
                        "Peer {}:{} closed the connection after {} bytes",
                        self.host,
                        self.port,
                        message.len()
                    );
                    return Err(BoincRpcError::ConnectionBroken { partial: message });
                }
                Ok(n) => message.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Connection to {}:{} reset: {}", self.host, self.port, e);
                    return Err(BoincRpcError::ConnectionBroken { partial: message });
                }
                Err(e) => return Err(self.map_io_error(e, "reading reply")),
            }
        }
    }

    /// Sends a message and waits for the reply.
    pub fn call(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.send(data)?;
        self.receive()
    }

    fn map_write_error(&self, err: std::io::Error) -> BoincRpcError {
        match self.map_io_error(err, "writing request") {
            BoincRpcError::Io(e) => BoincRpcError::Transport(format!("writing request: {}", e)),
            other => other,
        }
    }

    /// Map IO errors to appropriate BoincRpcError variants
    ///
    /// - Timeouts/would block -> `Timeout`
    /// - Connection errors -> `Transport`
    /// - Other IO errors -> `Io`
    fn map_io_error(&self, err: std::io::Error, context: &str) -> BoincRpcError {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                BoincRpcError::Timeout(self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0))
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected => {
                BoincRpcError::Transport(format!("{}: Connection lost ({})", context, err))
            }
            _ => BoincRpcError::Io(err),
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Whitespace run directly in front of `/>`.
///
/// ASCII `\s` (space, tab, LF, VT, FF, CR), matched bytewise.
static SELF_CLOSE_WS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\s)+/>").expect("self-closing whitespace pattern is valid")
});

/// Removes whitespace directly in front of `/>`.
///
/// The daemon rejects `<tag />`, so every outgoing message goes through this
/// before framing: `<x \t\n/>` becomes `<x/>`.
pub fn sanitize(data: &[u8]) -> Vec<u8> {
    SELF_CLOSE_WS.replace_all(data, &b"/>"[..]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::TcpListener;
    use std::thread;

    #[rstest]
    #[case::canonical(b"<a><b/></a>", b"<a><b/></a>")]
    #[case::space(b"<a><b /></a>", b"<a><b/></a>")]
    #[case::space_tab(b"<a><b \t/></a>", b"<a><b/></a>")]
    #[case::newline_tab(b"<a><b \n\t/></a>", b"<a><b/></a>")]
    #[case::many_spaces(b"<ssddff   />", b"<ssddff/>")]
    #[case::crlf(b"<x\r\n/>", b"<x/>")]
    #[case::keeps_text_whitespace(b"<a>one two</a>", b"<a>one two</a>")]
    #[case::keeps_whitespace_before_slash_text(b"<a>x /y</a>", b"<a>x /y</a>")]
    #[case::trailing_whitespace(b"<a/>  ", b"<a/>  ")]
    #[case::vertical_tab(b"<a\x0b/>", b"<a/>")]
    fn test_sanitize(#[case] input: &[u8], #[case] expected: &[u8]) {
        assert_eq!(sanitize(input), expected);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize(b"<r><a  /><b>\t</b><c\n/></r>");
        assert_eq!(sanitize(&once), once);
        assert_eq!(once, b"<r><a/><b>\t</b><c/></r>");
    }

    #[test]
    fn test_new_transport_is_disconnected() {
        let transport = TcpTransport::new("localhost", DEFAULT_PORT, None);
        assert!(!transport.is_connected());
        assert_eq!(transport.host(), "localhost");
        assert_eq!(transport.port(), 31416);
        assert_eq!(transport.timeout(), None);
    }

    #[test]
    fn test_disconnect_when_closed_is_noop() {
        let mut transport = TcpTransport::new("localhost", DEFAULT_PORT, None);
        transport.disconnect();
        transport.disconnect();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_send_without_connection() {
        let mut transport = TcpTransport::new("localhost", DEFAULT_PORT, None);
        assert!(matches!(transport.send(b"<a/>"), Err(BoincRpcError::NotConnected)));
        assert!(matches!(transport.receive(), Err(BoincRpcError::NotConnected)));
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let result = TcpTransport::open("127.0.0.1", port, Some(Duration::from_secs(2)));
        assert!(matches!(result, Err(BoincRpcError::Connection(_))));
    }

    #[test]
    fn test_connect_twice_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut transport = TcpTransport::open("127.0.0.1", port, Some(Duration::from_secs(2))).unwrap();
        assert!(matches!(transport.connect(), Err(BoincRpcError::Connection(_))));
        assert!(transport.is_connected());
    }

    #[test]
    fn test_send_appends_terminator() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        {
            let mut transport = TcpTransport::open("127.0.0.1", port, Some(Duration::from_secs(2))).unwrap();
            transport.send(b"<ssddff   />").unwrap();
        }

        assert_eq!(peer.join().unwrap(), b"<ssddff/>\x03");
    }

    #[test]
    fn test_receive_keeps_bytes_after_terminator() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"first\x03second\x03").unwrap();
        });

        let mut transport = TcpTransport::open("127.0.0.1", port, Some(Duration::from_secs(2))).unwrap();
        assert_eq!(transport.receive().unwrap(), b"first");
        assert_eq!(transport.receive().unwrap(), b"second");
        peer.join().unwrap();
    }

    #[test]
    fn test_receive_broken_connection_keeps_partial() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"half a mess").unwrap();
        });

        let mut transport = TcpTransport::open("127.0.0.1", port, Some(Duration::from_secs(2))).unwrap();
        peer.join().unwrap();

        match transport.receive() {
            Err(BoincRpcError::ConnectionBroken { partial }) => assert_eq!(partial, b"half a mess"),
            other => panic!("expected ConnectionBroken, got {:?}", other),
        }
    }

    #[test]
    fn test_receive_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut transport = TcpTransport::open("127.0.0.1", port, Some(Duration::from_millis(100))).unwrap();
        let (_held, _) = listener.accept().unwrap();

        let err = transport.receive().unwrap_err();
        assert!(matches!(err, BoincRpcError::Timeout(100)), "got {:?}", err);
        assert!(err.is_fatal());
    }
}
