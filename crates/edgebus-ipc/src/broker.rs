//! The top-level IPC broker (spec §4.E): binds the domain socket, runs the
//! CONNECT handshake on each new stream, then dispatches APPLICATION_MESSAGE
//! frames to the recognized operations. Shaped directly after
//! `edgebus_corebus::server::Server`'s listen/serve_connection/dispatch_loop
//! split, generalized for the IPC wire's `operation` header and JSON (not
//! core-bus `{method,args}`) request/response bodies.

use crate::arena::IpcArena;
use crate::cloud::CloudClient;
use crate::error::IpcErrorCode;
use crate::handshake;
use crate::local_bus::LocalBus;
use crate::operations::{self, OperationCtx};
use crate::registry::ComponentRegistry;
use crate::response::IpcResponseHandle;
use crate::svcuid::SvcuidRegistry;
use edgebus_authz::AuthzEngine;
use edgebus_config::ConfigClient;
use edgebus_core::{json, CoreError, Value};
use edgebus_corebus::handle_pool::{Handle, HandlePool};
use edgebus_corebus::wire::read_frame;
use edgebus_eventstream::{common_headers, decode, HeaderIter};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{debug, info};

struct ConnState {
    component_name: String,
}

/// Everything the broker needs at startup.
pub struct Broker {
    ctx: Arc<OperationCtx>,
    registry: Arc<dyn ComponentRegistry>,
    svcuids: SvcuidRegistry,
    arena: IpcArena,
    connections: HandlePool<ConnState>,
}

impl Broker {
    pub fn new(
        authz: Arc<AuthzEngine>,
        config: Arc<ConfigClient>,
        local_bus: Arc<LocalBus>,
        cloud: Arc<dyn CloudClient>,
        registry: Arc<dyn ComponentRegistry>,
    ) -> Self {
        Self {
            ctx: Arc::new(OperationCtx { authz, config, local_bus, cloud }),
            registry,
            svcuids: SvcuidRegistry::new(),
            arena: IpcArena::default(),
            connections: HandlePool::new(1024),
        }
    }

    /// Binds `socket_path` at mode 0660 and serves connections until an
    /// unrecoverable accept error occurs.
    pub async fn listen(self: &Arc<Self>, socket_path: impl AsRef<Path>) -> Result<(), CoreError> {
        let socket_path = socket_path.as_ref();
        if socket_path.exists() {
            let _ = std::fs::remove_file(socket_path);
        }
        let listener = UnixListener::bind(socket_path)
            .map_err(|e| CoreError::no_conn(format!("binding {}: {e}", socket_path.display())).with_source(e))?;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o660))
            .map_err(|e| CoreError::failure(format!("setting socket mode: {e}")).with_source(e))?;

        info!(path = %socket_path.display(), "IPC broker listening");

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| CoreError::no_conn(format!("accept failed: {e}")).with_source(e))?;
            let broker = self.clone();
            tokio::spawn(async move {
                if let Err(e) = broker.serve_connection(stream).await {
                    debug!(error = %e, "IPC connection ended");
                }
            });
        }
    }

    async fn serve_connection(self: &Arc<Self>, stream: UnixStream) -> Result<(), CoreError> {
        let (mut read_half, mut write_half) = stream.into_split();

        let component_name = match handshake::accept(&mut read_half, &mut write_half, self.registry.as_ref(), &self.svcuids).await {
            Ok(name) => name,
            Err(e) => return Err(e),
        };

        let write_half = Arc::new(AsyncMutex::new(write_half));
        let closed = Arc::new(AtomicBool::new(false));
        let close_notify = Arc::new(Notify::new());

        let handle = self.connections.register(ConnState { component_name: component_name.clone() })?;

        let result = self
            .dispatch_loop(&mut read_half, &component_name, &write_half, &closed, &close_notify)
            .await;

        closed.store(true, Ordering::Release);
        close_notify.notify_waiters();
        self.release_connection(handle);
        result
    }

    fn release_connection(&self, handle: Handle) {
        let _ = self.connections.release(handle);
    }

    async fn dispatch_loop(
        self: &Arc<Self>,
        read_half: &mut tokio::net::unix::OwnedReadHalf,
        component_name: &str,
        write_half: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
        closed: &Arc<AtomicBool>,
        close_notify: &Arc<Notify>,
    ) -> Result<(), CoreError> {
        loop {
            let frame = match read_frame(read_half).await {
                Ok(f) => f,
                Err(_) => return Ok(()), // peer closed
            };

            let guard = self.arena.acquire().await;
            if let Err(e) = self.arena.check_len(frame.len()) {
                drop(guard);
                debug!(error = %e, "rejecting oversized IPC frame");
                continue;
            }

            let msg = decode::decode(&frame)?;
            let common = common_headers(msg.headers)?;
            let operation = operation_header(msg.headers);

            let response_handle = IpcResponseHandle {
                write_half: write_half.clone(),
                closed: closed.clone(),
                close_notify: close_notify.clone(),
                stream_id: common.stream_id,
            };

            let Some(operation) = operation else {
                response_handle.error(IpcErrorCode::InvalidArgumentsError, "missing operation header").await?;
                drop(guard);
                continue;
            };

            let args: serde_json::Value = match serde_json::from_slice(msg.payload) {
                Ok(v) => v,
                Err(e) => {
                    response_handle
                        .error(IpcErrorCode::InvalidArgumentsError, format!("decoding payload: {e}"))
                        .await?;
                    drop(guard);
                    continue;
                }
            };
            let args = json::from_json(args);

            self.dispatch(&operation, component_name.to_string(), args, response_handle).await;
            drop(guard);
        }
    }

    async fn dispatch(&self, operation: &str, component_name: String, args: Value, handle: IpcResponseHandle) {
        let ctx = self.ctx.clone();
        match operation {
            "GetConfiguration" => operations::get_configuration(ctx, component_name, args, handle).await,
            "UpdateConfiguration" => operations::update_configuration(ctx, component_name, args, handle).await,
            "GetSystemConfig" => operations::get_system_config(ctx, args, handle).await,
            "PublishToIoTCore" => operations::publish_to_iot_core(ctx, component_name, args, handle).await,
            "SubscribeToIoTCore" => operations::subscribe_to_iot_core(ctx, component_name, args, handle).await,
            "PublishToTopic" => operations::publish_to_topic(ctx, component_name, args, handle).await,
            "SubscribeToTopic" => operations::subscribe_to_topic(ctx, component_name, args, handle).await,
            other => {
                let _ = handle
                    .error(IpcErrorCode::ServiceError, format!("unrecognized operation: {other}"))
                    .await;
            }
        }
    }
}

fn operation_header(mut headers: HeaderIter<'_>) -> Option<String> {
    while let Some(Ok(header)) = headers.next() {
        if header.name == "operation" {
            return header.value.as_str().map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::test_support::FakeCloudClient;
    use crate::registry::AllowAllRegistry;
    use edgebus_authz::AuthzEngine;
    use edgebus_config::{server as config_server, ConfigStore};
    use edgebus_corebus::protocol::{HDR_MESSAGE_TYPE, HDR_STREAM_ID, MSG_APPLICATION_MESSAGE};
    use edgebus_corebus::wire::{read_frame, write_frame};
    use edgebus_eventstream::{encode, EncodeHeader, MessageType};
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::net::UnixStream;

    async fn spawn_test_broker(socket_path: std::path::PathBuf) -> Arc<Broker> {
        let mut authz = AuthzEngine::new();
        authz.add_permission("gg_config", "*", "*", "*").unwrap();
        authz.add_permission("pubsub", "*", "*", "*").unwrap();
        authz.add_permission("aws_iot_mqtt", "*", "*", "*").unwrap();

        let config_dir = tempdir().unwrap();
        let config_socket = config_dir.path().join("config.sock");
        let store = ConfigStore::new();
        store.write(&["system", "thingName"], Value::str("MyThing"), 1).unwrap();

        let config_socket_for_server = config_socket.clone();
        tokio::spawn(async move {
            let _ = config_server::serve(store, &config_socket_for_server).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let config = Arc::new(ConfigClient::connect(&config_socket).await.unwrap());

        let broker = Arc::new(Broker::new(
            Arc::new(authz),
            config,
            Arc::new(LocalBus::new()),
            Arc::new(FakeCloudClient::new()),
            Arc::new(AllowAllRegistry),
        ));

        let broker_for_server = broker.clone();
        tokio::spawn(async move {
            let _ = broker_for_server.listen(&socket_path).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        broker
    }

    async fn connect_and_handshake(socket_path: &Path, component_name: &str) -> UnixStream {
        let mut stream = UnixStream::connect(socket_path).await.unwrap();
        let payload = serde_json::to_vec(&serde_json::json!({ "componentName": component_name })).unwrap();
        let headers = [EncodeHeader::int32(HDR_MESSAGE_TYPE, MessageType::Connect as i32)];
        write_frame(&mut stream, &headers, &payload).await.unwrap();

        let ack = read_frame(&mut stream).await.unwrap();
        let msg = decode::decode(&ack).unwrap();
        let common = common_headers(msg.headers).unwrap();
        assert_eq!(common.message_type, MessageType::ConnectAck as i32);
        stream
    }

    #[tokio::test]
    async fn get_system_config_round_trips_over_a_real_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("ipc.sock");
        let _broker = spawn_test_broker(socket_path.clone()).await;

        let mut stream = connect_and_handshake(&socket_path, "com.example.App").await;

        let payload = serde_json::to_vec(&serde_json::json!({ "keyPath": "thingName" })).unwrap();
        let headers = [
            EncodeHeader::int32(HDR_STREAM_ID, 1),
            EncodeHeader::int32(HDR_MESSAGE_TYPE, MessageType::ApplicationMessage as i32),
            EncodeHeader::string("operation", "GetSystemConfig"),
        ];
        write_frame(&mut stream, &headers, &payload).await.unwrap();

        let response = read_frame(&mut stream).await.unwrap();
        let msg = decode::decode(&response).unwrap();
        let common = common_headers(msg.headers).unwrap();
        assert_eq!(common.message_type, MSG_APPLICATION_MESSAGE);
        let body: serde_json::Value = serde_json::from_slice(msg.payload).unwrap();
        assert_eq!(body["value"], "MyThing");
    }

    #[test]
    fn operation_header_finds_the_named_header_among_others() {
        let headers = [
            EncodeHeader::int32(":stream-id", 1),
            EncodeHeader::string("operation", "GetConfiguration"),
        ];
        let mut buf = vec![0u8; 256];
        let written = encode(&mut buf, &headers, b"").unwrap();
        let msg = decode::decode(&buf[..written]).unwrap();
        assert_eq!(operation_header(msg.headers), Some("GetConfiguration".to_string()));
    }
}
