//! Header names and a request/response envelope shared by client and server.
//! Grounded in `eventstream_get_common_headers` (rpc.c): `:stream-id` and
//! `:message-type` are the only headers the transport itself interprets;
//! everything else (interface selection, method name, argument map) rides
//! in the JSON payload because core-bus has no separate header budget for
//! a variable-length method name per spec §4.C.

use edgebus_core::Value;
use serde::{Deserialize, Serialize};

pub const HDR_STREAM_ID: &str = ":stream-id";
pub const HDR_MESSAGE_TYPE: &str = ":message-type";
pub const HDR_MESSAGE_FLAGS: &str = ":message-flags";

pub const MSG_APPLICATION_MESSAGE: i32 = 0;
pub const MSG_APPLICATION_ERROR: i32 = 1;

pub const FLAG_TERMINATE_STREAM: i32 = 2;

/// The envelope for an outbound call/notify, and for each event pushed down
/// a subscription.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub args: Value,
}

/// The envelope for a successful response.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub result: Value,
}

/// The envelope for an error response, carried with `:message-type` =
/// `MSG_APPLICATION_ERROR`. `code` is an [`edgebus_core::ErrorKind`]'s
/// `as_str()` so it survives the bus crossing as the spec's `REMOTE` kind
/// plus inner code (spec §7 Propagation).
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
}
