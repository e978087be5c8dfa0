use crate::handle_pool::{Handle, HandlePool};
use crate::protocol::{
    ErrorEnvelope, Request, Response, HDR_MESSAGE_TYPE, HDR_STREAM_ID, MSG_APPLICATION_ERROR,
    MSG_APPLICATION_MESSAGE,
};
use crate::wire::{read_frame, write_frame};
use edgebus_core::{CoreError, ErrorKind, Value};
use edgebus_eventstream::{common_headers, decode, EncodeHeader};
use std::collections::HashMap;
use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{debug, info, warn};

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type HandlerFn = Arc<dyn Fn(Value, ResponseHandle) -> HandlerFuture + Send + Sync>;

/// One entry in a server's dispatch table, the Rust analog of
/// `GglRpcMethodDesc { name, is_subscription, fn, ctx }` (bus_server.c).
#[derive(Clone)]
pub struct MethodDesc {
    pub name: &'static str,
    pub is_subscription: bool,
    pub handler: HandlerFn,
}

impl MethodDesc {
    pub fn new<F, Fut>(name: &'static str, is_subscription: bool, handler: F) -> Self
    where
        F: Fn(Value, ResponseHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self { name, is_subscription, handler: Arc::new(move |v, h| Box::pin(handler(v, h))) }
    }
}

struct ConnState {
    write_half: Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    closed: Arc<AtomicBool>,
    close_notify: Arc<Notify>,
}

/// A handle to a single call or subscription stream, handed to the method
/// handler so it can complete the call (`respond`/`return_err`) or, for a
/// subscription, keep pushing events until the stream closes.
#[derive(Clone)]
pub struct ResponseHandle {
    write_half: Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    closed: Arc<AtomicBool>,
    close_notify: Arc<Notify>,
    stream_id: i32,
}

impl ResponseHandle {
    /// Completes the call with a successful result.
    pub async fn respond(&self, result: Value) -> Result<(), CoreError> {
        let payload = serde_json::to_vec(&Response { result })
            .map_err(|e| CoreError::invalid(format!("serializing response: {e}")))?;
        self.write_frame(MSG_APPLICATION_MESSAGE, &payload).await
    }

    /// Completes the call with an error (spec §7: local errors return the
    /// `ErrorKind` code directly; the caller observes `REMOTE` plus it).
    pub async fn return_err(&self, kind: ErrorKind, message: impl Into<String>) -> Result<(), CoreError> {
        let payload = serde_json::to_vec(&ErrorEnvelope { code: kind.as_str().to_string(), message: message.into() })
            .map_err(|e| CoreError::invalid(format!("serializing error: {e}")))?;
        self.write_frame(MSG_APPLICATION_ERROR, &payload).await
    }

    /// Pushes one event down a subscription stream. Only meaningful for
    /// methods registered with `is_subscription = true`.
    pub async fn push_event(&self, event: Value) -> Result<(), CoreError> {
        self.respond(event).await
    }

    /// True once the underlying connection has been observed closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the underlying connection closes — the async analog of
    /// the original's `on_close` callback (spec §4.C).
    pub async fn closed(&self) {
        if self.is_closed() {
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
        write_frame(&mut *guard, &headers, payload).await
    }
}

/// A core-bus server: listens on a Unix domain socket and dispatches
/// incoming frames to the registered methods (spec §4.C `ggl_listen`).
pub struct Server {
    methods: Arc<HashMap<&'static str, MethodDesc>>,
    connections: Arc<HandlePool<ConnState>>,
}

impl Server {
    pub fn new(methods: Vec<MethodDesc>) -> Self {
        let mut table = HashMap::new();
        for m in methods {
            table.insert(m.name, m);
        }
        Self { methods: Arc::new(table), connections: Arc::new(HandlePool::new(1024)) }
    }

    /// Binds `socket_path`, sets its mode to 0660 (spec §4.C), and serves
    /// connections until an unrecoverable accept error occurs.
    pub async fn listen(&self, socket_path: impl AsRef<Path>) -> Result<(), CoreError> {
        let socket_path = socket_path.as_ref();
        if socket_path.exists() {
            let _ = std::fs::remove_file(socket_path);
        }
        let listener = UnixListener::bind(socket_path)
            .map_err(|e| CoreError::no_conn(format!("binding {}: {e}", socket_path.display())).with_source(e))?;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o660))
            .map_err(|e| CoreError::failure(format!("setting socket mode: {e}")).with_source(e))?;

        info!(path = %socket_path.display(), "core-bus server listening");

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| CoreError::no_conn(format!("accept failed: {e}")).with_source(e))?;
            let methods = self.methods.clone();
            let connections = self.connections.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, methods, connections).await {
                    debug!(error = %e, "core-bus connection ended");
                }
            });
        }
    }
}

async fn serve_connection(
    stream: UnixStream,
    methods: Arc<HashMap<&'static str, MethodDesc>>,
    connections: Arc<HandlePool<ConnState>>,
) -> Result<(), CoreError> {
    let (mut read_half, write_half) = stream.into_split();
    let write_half = Arc::new(AsyncMutex::new(write_half));
    let closed = Arc::new(AtomicBool::new(false));
    let close_notify = Arc::new(Notify::new());

    let handle = connections.register(ConnState {
        write_half: write_half.clone(),
        closed: closed.clone(),
        close_notify: close_notify.clone(),
    })?;

    let result = dispatch_loop(&mut read_half, &methods, &write_half, &closed, &close_notify).await;

    closed.store(true, Ordering::Release);
    close_notify.notify_waiters();
    let _ = connections.release(handle);
    result
}

async fn dispatch_loop(
    read_half: &mut tokio::net::unix::OwnedReadHalf,
    methods: &HashMap<&'static str, MethodDesc>,
    write_half: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    closed: &Arc<AtomicBool>,
    close_notify: &Arc<Notify>,
) -> Result<(), CoreError> {
    loop {
        let frame = match read_frame(read_half).await {
            Ok(f) => f,
            Err(_) => return Ok(()), // peer closed
        };
        let msg = decode::decode(&frame)?;
        let common = common_headers(msg.headers)?;
        let request: Request = serde_json::from_slice(msg.payload)
            .map_err(|e| CoreError::parse(format!("decoding request payload: {e}")))?;

        let Some(desc) = methods.get(request.method.as_str()) else {
            let handle = ResponseHandle {
                write_half: write_half.clone(),
                closed: closed.clone(),
                close_notify: close_notify.clone(),
                stream_id: common.stream_id,
            };
            handle.return_err(ErrorKind::NoEntry, format!("unknown method: {}", request.method)).await?;
            continue;
        };

        let handle = ResponseHandle {
            write_half: write_half.clone(),
            closed: closed.clone(),
            close_notify: close_notify.clone(),
            stream_id: common.stream_id,
        };
        warn_unsupported_subscription(desc, &handle);
        (desc.handler)(request.args, handle).await;
    }
}

fn warn_unsupported_subscription(_desc: &MethodDesc, _handle: &ResponseHandle) {
    // Handlers decide for themselves whether to keep `handle` alive for
    // further `push_event` calls; nothing to validate up front.
}
