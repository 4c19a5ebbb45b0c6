use boincrpc_common::protocol::error::Result;
use boincrpc_common::protocol::{command_payload, open_reply, wrap_request, StructuredValue};
use boincrpc_common::transport::{TcpTransport, XmlCodec};

use crate::config::ClientConfig;

/// GUI RPC client for a single BOINC daemon
///
/// Holds one connection and runs one request/reply exchange at a time. The
/// client never reconnects on its own: after a fatal error call
/// [`disconnect`](Self::disconnect) and then [`connect`](Self::connect)
/// again. Dropping the client closes the connection.
pub struct BoincRpcClient {
    config: ClientConfig,
    transport: TcpTransport,
}

impl BoincRpcClient {
    /// Create a disconnected client
    pub fn new(config: ClientConfig) -> Self {
        let transport = TcpTransport::new(config.host.clone(), config.port, config.timeout);
        Self { config, transport }
    }

    /// Create a client and connect it
    pub fn open(config: ClientConfig) -> Result<Self> {
        let mut client = Self::new(config);
        client.connect()?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn connect(&mut self) -> Result<()> {
        self.config.validate()?;
        self.transport.connect()
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    /// Call an RPC operation
    ///
    /// Wraps `request` in the request envelope, sends it and returns the reply
    /// payload with the reply envelope removed.
    ///
    /// # Errors
    ///
    /// Besides transport and codec failures:
    /// - `BadReply` when the reply has no `boinc_gui_rpc_reply` envelope
    /// - `BadRequest` when the daemon answered with an `error` element
    pub fn call(&mut self, request: StructuredValue) -> Result<StructuredValue> {
        let operations = operation_names(&request);
        let encoded = XmlCodec::encode(&wrap_request(request))?;
        tracing::debug!("GUI RPC request [{}], {} bytes", operations, encoded.len());

        let reply = self.transport.call(encoded.as_bytes())?;
        let decoded = XmlCodec::decode(&reply)?;

        open_reply(decoded)
    }

    /// Call an operation that takes no arguments, e.g. `exchange_versions`
    pub fn command(&mut self, name: &str) -> Result<StructuredValue> {
        self.call(command_payload(name))
    }

    /// Send a pre-built document and return the raw reply bytes
    ///
    /// The document still goes through sanitizing and framing, but no envelope
    /// is added and the reply is not decoded.
    pub fn call_raw(&mut self, document: &[u8]) -> Result<Vec<u8>> {
        self.transport.call(document)
    }
}

/// Top-level keys of a request payload, for logging without argument values.
fn operation_names(request: &StructuredValue) -> String {
    match request.as_mapping() {
        Some(map) => map.keys().map(String::as_str).collect::<Vec<_>>().join(","),
        None => String::new(),
    }
}
