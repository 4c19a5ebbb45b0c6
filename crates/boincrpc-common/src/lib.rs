//! BOINC GUI RPC Common Types and Transport
//!
//! This crate provides the protocol definitions, XML codec and TCP transport
//! for talking to a BOINC core client over its GUI RPC port.
//!
//! # Overview
//!
//! The daemon exchanges XML documents over a plain TCP socket. This crate
//! contains the pieces every client needs:
//!
//! - **Protocol Layer**: [`StructuredValue`], request/reply envelopes, errors
//! - **Transport Layer**: terminator-framed TCP transport and the XML codec
//!
//! # Architecture
//!
//! - **Transport**: blocking TCP, default port 31416
//! - **Serialization**: XML (elements, text, repeated siblings, empty elements)
//! - **Message Format**: `[XML data] + [0x03]`
//! - **Envelope**: `<boinc_gui_rpc_request>` out, `<boinc_gui_rpc_reply>` in
//!
//! # Components
//!
//! - [`protocol`] - Structured values, envelopes, errors
//! - [`transport`] - TCP transport and XML codec
//!
//! # Example
//!
//! ```
//! use boincrpc_common::{open_reply, StructuredValue};
//! use boincrpc_common::transport::XmlCodec;
//!
//! let decoded = XmlCodec::decode(
//!     b"<boinc_gui_rpc_reply><success/></boinc_gui_rpc_reply>",
//! ).unwrap();
//!
//! let reply = open_reply(decoded).unwrap();
//! assert_eq!(reply.get("success"), Some(&StructuredValue::Empty));
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
