//! GUI RPC Transport Layer
//!
//! This module provides the TCP transport and XML codec for exchanging
//! messages with the daemon.
//!
//! # Architecture
//!
//! - **Transport**: one blocking TCP connection per [`TcpTransport`]
//! - **Codec**: XML text to and from [`StructuredValue`](crate::StructuredValue)
//! - **Wire Format**: `[XML data] + [0x03 terminator]`, no length prefix
//!
//! Outgoing messages are sanitized before framing: whitespace in front of
//! `/>` is removed because the daemon does not accept it.
//!
//! # Example
//!
//! ```no_run
//! use boincrpc_common::transport::{TcpTransport, XmlCodec};
//! use boincrpc_common::{command_payload, wrap_request};
//!
//! let mut transport = TcpTransport::open("localhost", 31416, None).unwrap();
//!
//! let request = XmlCodec::encode(&wrap_request(command_payload("get_host_info"))).unwrap();
//! let reply = transport.call(request.as_bytes()).unwrap();
//! let decoded = XmlCodec::decode(&reply).unwrap();
//! ```

pub mod codec;
pub mod tcp;

pub use codec::XmlCodec;
pub use tcp::{sanitize, TcpTransport, DEFAULT_PORT, TERMINATOR};

#[cfg(test)]
mod tests;
