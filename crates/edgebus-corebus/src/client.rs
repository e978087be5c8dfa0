use crate::protocol::{
    ErrorEnvelope, Request, HDR_MESSAGE_TYPE, HDR_STREAM_ID, MSG_APPLICATION_ERROR,
    MSG_APPLICATION_MESSAGE,
};
use crate::wire::{read_frame, write_frame};
use edgebus_core::{CoreError, ErrorKind, Value};
use edgebus_eventstream::{common_headers, decode, EncodeHeader};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::net::{unix::OwnedWriteHalf, UnixStream};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

type PendingCalls = Arc<AsyncMutex<HashMap<i32, oneshot::Sender<Result<Value, CoreError>>>>>;
type PendingSubs = Arc<AsyncMutex<HashMap<i32, mpsc::UnboundedSender<Result<Value, CoreError>>>>>;

/// A core-bus client connection: `call`/`notify`/`subscribe` over one
/// persistent AF_UNIX stream, matching `ggl_call`/`ggl_notify`/
/// `ggl_subscribe` (spec §4.C). Responses are demultiplexed by `:stream-id`
/// onto a background reader task, so many calls can be outstanding at once
/// as long as each uses its own stream id (spec §5: "one outstanding call
/// per stream id").
pub struct Client {
    write_half: Arc<AsyncMutex<OwnedWriteHalf>>,
    next_stream_id: AtomicI32,
    pending_calls: PendingCalls,
    pending_subs: PendingSubs,
}

/// An open subscription: events arrive on `events` until the server or the
/// connection closes the stream.
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<Result<Value, CoreError>>,
}

impl Client {
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let stream = UnixStream::connect(socket_path.as_ref())
            .await
            .map_err(|e| CoreError::no_conn(format!("connecting to {}: {e}", socket_path.as_ref().display())).with_source(e))?;
        let (mut read_half, write_half) = stream.into_split();

        let pending_calls: PendingCalls = Arc::new(AsyncMutex::new(HashMap::new()));
        let pending_subs: PendingSubs = Arc::new(AsyncMutex::new(HashMap::new()));

        let calls_for_reader = pending_calls.clone();
        let subs_for_reader = pending_subs.clone();
        tokio::spawn(async move {
            loop {
                let frame = match read_frame(&mut read_half).await {
                    Ok(f) => f,
                    Err(_) => break,
                };
                let result = decode::decode(&frame)
                    .and_then(|msg| {
                        let common = common_headers(msg.headers)?;
                        let value = decode_body(common.message_type, msg.payload)?;
                        Ok((common.stream_id, value))
                    });

                let (stream_id, value) = match result {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                if let Some(tx) = calls_for_reader.lock().await.remove(&stream_id) {
                    let _ = tx.send(value);
                    continue;
                }
                if let Some(tx) = subs_for_reader.lock().await.get(&stream_id) {
                    let _ = tx.send(value);
                }
            }
            calls_for_reader.lock().await.clear();
            subs_for_reader.lock().await.clear();
        });

        Ok(Self {
            write_half: Arc::new(AsyncMutex::new(write_half)),
            next_stream_id: AtomicI32::new(1),
            pending_calls,
            pending_subs,
        })
    }

    /// Synchronous request/response (spec §4.C `call`).
    pub async fn call(&self, method: &str, args: Value) -> Result<Value, CoreError> {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending_calls.lock().await.insert(stream_id, tx);

        if let Err(e) = self.send_request(stream_id, method, args).await {
            self.pending_calls.lock().await.remove(&stream_id);
            return Err(e);
        }

        rx.await.unwrap_or_else(|_| Err(CoreError::no_conn("connection closed before response")))
    }

    /// Fire-and-forget (spec §4.C `notify`): writes the request and does not
    /// wait for (or register a slot for) a reply.
    pub async fn notify(&self, method: &str, args: Value) -> Result<(), CoreError> {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        self.send_request(stream_id, method, args).await
    }

    /// Opens a subscription (spec §4.C `subscribe`): the server may push
    /// zero or more events before eventually closing the stream.
    pub async fn subscribe(&self, method: &str, args: Value) -> Result<Subscription, CoreError> {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending_subs.lock().await.insert(stream_id, tx);

        if let Err(e) = self.send_request(stream_id, method, args).await {
            self.pending_subs.lock().await.remove(&stream_id);
            return Err(e);
        }
        Ok(Subscription { events: rx })
    }

    async fn send_request(&self, stream_id: i32, method: &str, args: Value) -> Result<(), CoreError> {
        let payload = serde_json::to_vec(&Request { method: method.to_string(), args })
            .map_err(|e| CoreError::invalid(format!("serializing request: {e}")))?;
        let headers = [
            EncodeHeader::int32(HDR_STREAM_ID, stream_id),
            EncodeHeader::int32(HDR_MESSAGE_TYPE, MSG_APPLICATION_MESSAGE),
        ];
        let mut guard = self.write_half.lock().await;
        write_frame(&mut *guard, &headers, &payload).await
    }
}

fn decode_body(message_type: i32, payload: &[u8]) -> Result<Value, CoreError> {
    if message_type == MSG_APPLICATION_ERROR {
        let envelope: ErrorEnvelope = serde_json::from_slice(payload)
            .map_err(|e| CoreError::parse(format!("decoding error envelope: {e}")))?;
        let kind = parse_kind(&envelope.code);
        return Err(CoreError::remote(kind, envelope.message));
    }
    let response: crate::protocol::Response = serde_json::from_slice(payload)
        .map_err(|e| CoreError::parse(format!("decoding response payload: {e}")))?;
    Ok(response.result)
}

fn parse_kind(code: &str) -> ErrorKind {
    match code {
        "INVALID" => ErrorKind::Invalid,
        "RANGE" => ErrorKind::Range,
        "PARSE" => ErrorKind::Parse,
        "NOMEM" => ErrorKind::NoMem,
        "NOENTRY" => ErrorKind::NoEntry,
        "NOCONN" => ErrorKind::NoConn,
        "CONFIG" => ErrorKind::Config,
        "UNSUPPORTED" => ErrorKind::Unsupported,
        "REMOTE" => ErrorKind::Remote,
        "FATAL" => ErrorKind::Fatal,
        _ => ErrorKind::Failure,
    }
}
