//! Per-stream response handle (spec §4.E: "Replies on the same `:stream-id`
//! with either APPLICATION_MESSAGE... or APPLICATION_ERROR"). Shaped after
//! `edgebus_corebus::server::ResponseHandle`, but the payload on the wire is
//! the operation's own JSON result rather than core-bus's `{result: ...}`
//! envelope, and errors use the `{_errorCode, _message?}` IPC shape.

use crate::error::{error_payload, IpcErrorCode};
use edgebus_core::{json, CoreError, Value};
use edgebus_corebus::protocol::{HDR_MESSAGE_TYPE, HDR_STREAM_ID, MSG_APPLICATION_ERROR, MSG_APPLICATION_MESSAGE};
use edgebus_eventstream::EncodeHeader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::{Mutex as AsyncMutex, Notify};

#[derive(Clone)]
pub struct IpcResponseHandle {
    pub(crate) write_half: Arc<AsyncMutex<OwnedWriteHalf>>,
    pub(crate) closed: Arc<AtomicBool>,
    pub(crate) close_notify: Arc<Notify>,
    pub(crate) stream_id: i32,
}

impl IpcResponseHandle {
    /// Replies with a JSON result on the request's stream id.
    pub async fn respond(&self, result: &Value) -> Result<(), CoreError> {
        let payload = serde_json::to_vec(&json::to_json(result))
            .map_err(|e| CoreError::invalid(format!("serializing IPC response: {e}")))?;
        self.write_frame(MSG_APPLICATION_MESSAGE, &payload).await
    }

    /// Replies with the `{_errorCode, _message?}` envelope.
    pub async fn error(&self, code: IpcErrorCode, message: impl Into<String>) -> Result<(), CoreError> {
        let payload = error_payload(code, Some(message.into()));
        self.write_frame(MSG_APPLICATION_ERROR, &payload).await
    }

    /// Resolves once the connection this stream belongs to closes, so a
    /// subscription handler's event loop can exit promptly.
    pub async fn closed(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.close_notify.notified().await;
    }

    async fn write_frame(&self, message_type: i32, payload: &[u8]) -> Result<(), CoreError> {
        let headers = [
            EncodeHeader::int32(HDR_STREAM_ID, self.stream_id),
            EncodeHeader::int32(HDR_MESSAGE_TYPE, message_type),
        ];
        let mut guard = self.write_half.lock().await;
        edgebus_corebus::wire::write_frame(&mut *guard, &headers, payload).await
    }
}
