use crate::protocol::error::{BoincRpcError, Result};
use crate::protocol::value::StructuredValue;

/// Root element of every request sent to the daemon.
pub const REQUEST_TAG: &str = "boinc_gui_rpc_request";

/// Root element of every reply sent by the daemon.
pub const REPLY_TAG: &str = "boinc_gui_rpc_reply";

/// Key the daemon uses inside a reply to reject a request.
pub const ERROR_TAG: &str = "error";

/// Wraps a request payload as `{boinc_gui_rpc_request: payload}`.
pub fn wrap_request(payload: StructuredValue) -> StructuredValue {
    StructuredValue::single(REQUEST_TAG, payload)
}

/// Payload for an operation that takes no arguments: `{name: Empty}`.
pub fn command_payload(name: impl Into<String>) -> StructuredValue {
    StructuredValue::single(name, StructuredValue::Empty)
}

/// Validates a decoded reply and strips the envelope.
///
/// # Errors
///
/// - [`BoincRpcError::BadReply`] with the whole decoded document when the
///   reply envelope is missing
/// - [`BoincRpcError::BadRequest`] with the reply payload when the daemon
///   answered with an `error` element
pub fn open_reply(mut decoded: StructuredValue) -> Result<StructuredValue> {
    let Some(payload) = decoded.take(REPLY_TAG) else {
        tracing::warn!("reply is missing the {} envelope", REPLY_TAG);
        return Err(BoincRpcError::BadReply(decoded));
    };

    if payload.contains_key(ERROR_TAG) {
        tracing::warn!("daemon rejected request: {}", payload);
        return Err(BoincRpcError::BadRequest(payload));
    }

    Ok(payload)
}
