pub mod envelope;
pub mod error;
pub mod value;


pub use envelope::{command_payload, open_reply, wrap_request, ERROR_TAG, REPLY_TAG, REQUEST_TAG};
pub use error::{BoincRpcError, Result};
pub use value::{Mapping, StructuredValue};
