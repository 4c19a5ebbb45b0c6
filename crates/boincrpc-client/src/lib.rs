//! Blocking client for the BOINC GUI RPC protocol.
//!
//! ```no_run
//! use boincrpc_client::{BoincRpcClient, ClientConfig};
//!
//! let mut client = BoincRpcClient::open(ClientConfig::default()).unwrap();
//! let versions = client.command("exchange_versions").unwrap();
//! println!("{}", versions);
//! ```

pub mod client;
pub mod config;

pub use client::BoincRpcClient;
pub use config::ClientConfig;
pub use boincrpc_common::{BoincRpcError, Result, StructuredValue};
