//! Recognized IPC operations and their semantics (spec §4.E table),
//! dispatched by [`crate::broker::Broker`].

use crate::cloud::CloudClient;
use crate::error::{error_payload, IpcErrorCode};
use crate::local_bus::{LocalBus, TopicMessage, TopicPayload};
use crate::response::IpcResponseHandle;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use edgebus_authz::{AuthzEngine, LookupPolicy};
use edgebus_config::ConfigClient;
use edgebus_core::{CoreError, ErrorKind, OrderedMap, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

pub const DEST_CONFIG: &str = "gg_config";
pub const DEST_MQTT: &str = "aws_iot_mqtt";
pub const DEST_PUBSUB: &str = "pubsub";

/// Everything an operation handler needs, shared across every connection.
pub struct OperationCtx {
    pub authz: Arc<AuthzEngine>,
    pub config: Arc<ConfigClient>,
    pub local_bus: Arc<LocalBus>,
    pub cloud: Arc<dyn CloudClient>,
}

fn map_arg<'a>(args: &'a Value, key: &str) -> Option<&'a Value> {
    args.as_map().and_then(|m| m.get(key))
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    map_arg(args, key).and_then(Value::as_str)
}

fn list_arg<'a>(args: &'a Value, key: &str) -> Option<&'a [Value]> {
    map_arg(args, key).and_then(Value::as_list)
}

fn key_path_strings(list: &[Value]) -> Result<Vec<String>, CoreError> {
    list.iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| CoreError::invalid("keyPath entries must be strings")))
        .collect()
}

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// `UpdateConfiguration`'s `timestamp` arrives as float seconds (spec §4.E);
/// the config store keys writes on millis.
fn seconds_to_millis(v: &Value) -> i64 {
    (v.as_f64().unwrap_or(0.0) * 1000.0) as i64
}

async fn deny_unless_authorized(
    ctx: &OperationCtx,
    destination: &str,
    principal: &str,
    operation: &str,
    resource: &str,
    lookup: LookupPolicy,
    handle: &IpcResponseHandle,
) -> bool {
    if ctx.authz.is_authorized(destination, principal, operation, resource, lookup) {
        return true;
    }
    warn!(principal, operation, resource, "operation denied by authorization engine");
    let _ = handle
        .error(IpcErrorCode::UnauthorizedError, format!("not authorized to {operation} on {resource}"))
        .await;
    false
}

pub async fn get_configuration(ctx: Arc<OperationCtx>, component_name: String, args: Value, handle: IpcResponseHandle) {
    let Some(key_path) = list_arg(&args, "keyPath") else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing keyPath").await;
        return;
    };
    let key_path = match key_path_strings(key_path) {
        Ok(k) => k,
        Err(e) => {
            let _ = handle.error(IpcErrorCode::InvalidArgumentsError, e.message).await;
            return;
        }
    };
    let target = str_arg(&args, "componentName").unwrap_or(&component_name).to_string();
    let resource = key_path.join("/");
    if !deny_unless_authorized(&ctx, DEST_CONFIG, &component_name, "GetConfiguration", &resource, LookupPolicy::Standard, &handle).await {
        return;
    }

    let mut full_path = vec!["services".to_string(), target];
    full_path.extend(key_path);

    match ctx.config.read(&full_path).await {
        Ok(value) => {
            let mut result = OrderedMap::new();
            result.insert("value", value);
            let _ = handle.respond(&Value::Map(result)).await;
        }
        Err(e) if e.kind == ErrorKind::NoEntry => {
            let _ = handle.error(IpcErrorCode::ResourceNotFoundError, e.message).await;
        }
        Err(e) => {
            let _ = handle.error(IpcErrorCode::from_kind(e.kind), e.message).await;
        }
    }
}

pub async fn update_configuration(ctx: Arc<OperationCtx>, component_name: String, args: Value, handle: IpcResponseHandle) {
    let Some(key_path) = list_arg(&args, "keyPath") else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing keyPath").await;
        return;
    };
    let key_path = match key_path_strings(key_path) {
        Ok(k) => k,
        Err(e) => {
            let _ = handle.error(IpcErrorCode::InvalidArgumentsError, e.message).await;
            return;
        }
    };
    let Some(value_to_merge) = map_arg(&args, "valueToMerge").cloned() else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing valueToMerge").await;
        return;
    };
    let timestamp = map_arg(&args, "timestamp").map(seconds_to_millis).unwrap_or_else(now_millis);
    let resource = key_path.join("/");
    if !deny_unless_authorized(&ctx, DEST_CONFIG, &component_name, "UpdateConfiguration", &resource, LookupPolicy::Standard, &handle).await {
        return;
    }

    let mut full_path = vec!["services".to_string(), component_name];
    full_path.extend(key_path);

    match ctx.config.write(&full_path, value_to_merge, timestamp).await {
        Ok(()) => {
            let _ = handle.respond(&Value::Null).await;
        }
        Err(e) => {
            let _ = handle.error(IpcErrorCode::from_kind(e.kind), e.message).await;
        }
    }
}

pub async fn get_system_config(ctx: Arc<OperationCtx>, args: Value, handle: IpcResponseHandle) {
    const ALLOWED: [&str; 3] = ["thingName", "rootCaPath", "rootPath"];
    let Some(key) = str_arg(&args, "keyPath") else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing keyPath").await;
        return;
    };
    if !ALLOWED.contains(&key) {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, format!("unknown system key: {key}")).await;
        return;
    }
    match ctx.config.read(&["system", key]).await {
        Ok(value) => {
            let mut result = OrderedMap::new();
            result.insert("value", value);
            let _ = handle.respond(&Value::Map(result)).await;
        }
        Err(e) => {
            let _ = handle.error(IpcErrorCode::from_kind(e.kind), e.message).await;
        }
    }
}

pub async fn publish_to_iot_core(ctx: Arc<OperationCtx>, component_name: String, args: Value, handle: IpcResponseHandle) {
    let Some(topic_name) = str_arg(&args, "topicName").map(str::to_string) else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing topicName").await;
        return;
    };
    if !deny_unless_authorized(&ctx, DEST_MQTT, &component_name, "PublishToIoTCore", &topic_name, LookupPolicy::MqttStyle, &handle).await {
        return;
    }
    let Some(payload_b64) = str_arg(&args, "payload") else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing payload").await;
        return;
    };
    let Ok(payload) = BASE64.decode(payload_b64) else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "payload is not valid base64").await;
        return;
    };
    let qos = map_arg(&args, "qos").and_then(Value::as_int).unwrap_or(0).clamp(0, 2) as u8;

    match ctx.cloud.publish(&topic_name, &payload, qos).await {
        Ok(()) => {
            let _ = handle.respond(&Value::Null).await;
        }
        Err(e) => {
            let _ = handle.error(IpcErrorCode::from_kind(e.kind), e.message).await;
        }
    }
}

pub async fn subscribe_to_iot_core(ctx: Arc<OperationCtx>, component_name: String, args: Value, handle: IpcResponseHandle) {
    let Some(topic_name) = str_arg(&args, "topicName").map(str::to_string) else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing topicName").await;
        return;
    };
    if !deny_unless_authorized(&ctx, DEST_MQTT, &component_name, "SubscribeToIoTCore", &topic_name, LookupPolicy::MqttStyle, &handle).await {
        return;
    }

    let mut events = ctx.cloud.subscribe(&topic_name);
    loop {
        tokio::select! {
            msg = events.recv() => {
                let Some(msg) = msg else { break };
                let mut envelope = OrderedMap::new();
                envelope.insert("topicName", Value::str(msg.topic_name));
                envelope.insert("payload", Value::str(BASE64.encode(msg.payload)));
                if handle.respond(&Value::Map(envelope)).await.is_err() {
                    break;
                }
            }
            _ = handle.closed() => break,
        }
    }
}

pub async fn publish_to_topic(ctx: Arc<OperationCtx>, component_name: String, args: Value, handle: IpcResponseHandle) {
    let Some(topic) = str_arg(&args, "topic").map(str::to_string) else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing topic").await;
        return;
    };
    if !deny_unless_authorized(&ctx, DEST_PUBSUB, &component_name, "PublishToTopic", &topic, LookupPolicy::Standard, &handle).await {
        return;
    }

    let payload = if let Some(binary) = map_arg(&args, "binaryMessage") {
        let Some(b64) = str_arg(binary, "message") else {
            let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "binaryMessage.message missing").await;
            return;
        };
        let Ok(bytes) = BASE64.decode(b64) else {
            let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "binaryMessage.message is not valid base64").await;
            return;
        };
        TopicPayload::Binary(bytes)
    } else if let Some(json) = map_arg(&args, "jsonMessage") {
        let message = map_arg(json, "message").cloned().unwrap_or(Value::Null);
        TopicPayload::Json(message)
    } else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "neither binaryMessage nor jsonMessage present").await;
        return;
    };

    ctx.local_bus.publish(TopicMessage { topic, payload });
    let _ = handle.respond(&Value::Null).await;
}

pub async fn subscribe_to_topic(ctx: Arc<OperationCtx>, component_name: String, args: Value, handle: IpcResponseHandle) {
    let Some(topic) = str_arg(&args, "topic").map(str::to_string) else {
        let _ = handle.error(IpcErrorCode::InvalidArgumentsError, "missing topic").await;
        return;
    };
    if !deny_unless_authorized(&ctx, DEST_PUBSUB, &component_name, "SubscribeToTopic", &topic, LookupPolicy::Standard, &handle).await {
        return;
    }

    let mut events = ctx.local_bus.subscribe(&topic);
    loop {
        tokio::select! {
            msg = events.recv() => {
                let msg = match msg {
                    Ok(m) => m,
                    Err(_) => break,
                };
                let mut envelope = OrderedMap::new();
                envelope.insert("topic", Value::str(msg.topic));
                match msg.payload {
                    TopicPayload::Binary(bytes) => {
                        let mut binary = OrderedMap::new();
                        binary.insert("message", Value::str(BASE64.encode(bytes)));
                        envelope.insert("binaryMessage", Value::Map(binary));
                    }
                    TopicPayload::Json(value) => {
                        let mut json = OrderedMap::new();
                        json.insert("message", value);
                        envelope.insert("jsonMessage", Value::Map(json));
                    }
                }
                if handle.respond(&Value::Map(envelope)).await.is_err() {
                    break;
                }
            }
            _ = handle.closed() => break,
        }
    }
}

/// Builds the unauthenticated error payload for an operation name the
/// broker does not recognize.
pub fn unknown_operation_payload(operation: &str) -> Vec<u8> {
    error_payload(IpcErrorCode::ServiceError, Some(format!("unrecognized operation: {operation}")))
}
