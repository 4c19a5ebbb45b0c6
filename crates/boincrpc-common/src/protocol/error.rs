use thiserror::Error;

use crate::protocol::value::StructuredValue;

#[derive(Error, Debug)]
pub enum BoincRpcError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Socket connection broken after {} bytes", partial.len())]
    ConnectionBroken {
        /// Bytes received before the peer closed the socket.
        partial: Vec<u8>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Socket operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Did not get a 'boinc_gui_rpc_reply': {0}")]
    BadReply(StructuredValue),

    #[error("Error in BOINC reply: {0}")]
    BadRequest(StructuredValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BoincRpcError {
    /// Whether the connection that produced this error can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BoincRpcError::ConnectionBroken { .. }
                | BoincRpcError::Transport(_)
                | BoincRpcError::Timeout(_)
                | BoincRpcError::Io(_)
        )
    }

    /// The daemon's error text for a rejected request, if this is one.
    pub fn remote_error(&self) -> Option<&str> {
        match self {
            BoincRpcError::BadRequest(reply) => reply.get("error").and_then(StructuredValue::as_str),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for BoincRpcError {
    fn from(err: quick_xml::Error) -> Self {
        BoincRpcError::Codec(err.to_string())
    }
}

impl From<std::str::Utf8Error> for BoincRpcError {
    fn from(err: std::str::Utf8Error) -> Self {
        BoincRpcError::Codec(format!("invalid UTF-8: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, BoincRpcError>;
