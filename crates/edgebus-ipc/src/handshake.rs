//! CONNECT / CONNECT_ACK handshake (spec §4.E): "First frame on any new
//! stream MUST be a CONNECT... mints or retrieves a per-component SVCUID...
//! replies with CONNECT_ACK."

use crate::registry::ComponentRegistry;
use crate::svcuid::SvcuidRegistry;
use edgebus_core::CoreError;
use edgebus_eventstream::{
    common_headers, decode, EncodeHeader, MessageType, FLAG_CONNECTION_ACCEPTED,
};
use edgebus_corebus::protocol::{HDR_MESSAGE_FLAGS, HDR_MESSAGE_TYPE};
use edgebus_corebus::wire::{read_frame, write_frame};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

const HDR_SVCUID: &str = "svcuid";

/// Reads the first frame off a freshly accepted stream, validates it as a
/// CONNECT, and on success replies with an accepted CONNECT_ACK carrying the
/// component's SVCUID. On rejection, writes a non-accepted CONNECT_ACK and
/// returns an error; the caller should then drop the connection.
pub async fn accept<R, W>(
    read_half: &mut R,
    write_half: &mut W,
    registry: &dyn ComponentRegistry,
    svcuids: &SvcuidRegistry,
) -> Result<String, CoreError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let frame = read_frame(read_half).await?;
    let msg = decode::decode(&frame)?;
    let common = common_headers(msg.headers)?;
    if common.message_type != MessageType::Connect as i32 {
        return Err(CoreError::invalid("first frame on a new stream was not CONNECT"));
    }

    let payload: serde_json::Value = serde_json::from_slice(msg.payload)
        .map_err(|e| CoreError::parse(format!("decoding CONNECT payload: {e}")))?;
    let component_name = payload
        .get("componentName")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CoreError::invalid("CONNECT payload missing componentName"))?
        .to_string();

    if !registry.is_registered(&component_name) {
        warn!(component_name, "rejecting CONNECT from unregistered component");
        send_connect_ack(write_half, None).await?;
        return Err(CoreError::no_conn(format!("component not registered: {component_name}")));
    }

    let svcuid = svcuids.get_or_mint(&component_name);
    send_connect_ack(write_half, Some(&svcuid)).await?;
    info!(component_name, "accepted IPC connection");
    Ok(component_name)
}

async fn send_connect_ack<W: AsyncWrite + Unpin>(write_half: &mut W, svcuid: Option<&str>) -> Result<(), CoreError> {
    let flags = if svcuid.is_some() { FLAG_CONNECTION_ACCEPTED } else { 0 };
    let mut headers = vec![
        EncodeHeader::int32(HDR_MESSAGE_TYPE, MessageType::ConnectAck as i32),
        EncodeHeader::int32(HDR_MESSAGE_FLAGS, flags),
    ];
    if let Some(svcuid) = svcuid {
        headers.push(EncodeHeader::string(HDR_SVCUID, svcuid));
    }
    write_frame(write_half, &headers, b"{}").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AllowAllRegistry;
    use edgebus_eventstream::encode;
    use std::io::Cursor;

    fn connect_frame(component_name: &str) -> Vec<u8> {
        let payload = serde_json::to_vec(&serde_json::json!({ "componentName": component_name })).unwrap();
        let headers = [EncodeHeader::int32(HDR_MESSAGE_TYPE, MessageType::Connect as i32)];
        let mut buf = vec![0u8; 256 + payload.len()];
        let written = encode(&mut buf, &headers, &payload).unwrap();
        buf.truncate(written);
        buf
    }

    #[tokio::test]
    async fn registered_component_is_accepted_with_a_svcuid() {
        let frame = connect_frame("com.example.App");
        let mut reader = Cursor::new(frame);
        let mut writer = Vec::new();
        let svcuids = SvcuidRegistry::new();

        let name = accept(&mut reader, &mut writer, &AllowAllRegistry, &svcuids).await.unwrap();
        assert_eq!(name, "com.example.App");

        let msg = decode::decode(&writer).unwrap();
        let common = common_headers(msg.headers).unwrap();
        assert_eq!(common.message_type, MessageType::ConnectAck as i32);
        assert_eq!(common.message_flags, FLAG_CONNECTION_ACCEPTED);
    }

    struct DenyAll;
    impl ComponentRegistry for DenyAll {
        fn is_registered(&self, _: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn unregistered_component_is_rejected_without_accepted_flag() {
        let frame = connect_frame("com.example.Ghost");
        let mut reader = Cursor::new(frame);
        let mut writer = Vec::new();
        let svcuids = SvcuidRegistry::new();

        let err = accept(&mut reader, &mut writer, &DenyAll, &svcuids).await.unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::NoConn);

        let msg = decode::decode(&writer).unwrap();
        let common = common_headers(msg.headers).unwrap();
        assert_eq!(common.message_flags, 0);
    }

    #[tokio::test]
    async fn non_connect_first_frame_is_rejected() {
        let headers = [EncodeHeader::int32(HDR_MESSAGE_TYPE, MessageType::ApplicationMessage as i32)];
        let mut buf = vec![0u8; 64];
        let written = encode(&mut buf, &headers, b"{}").unwrap();
        buf.truncate(written);
        let mut reader = Cursor::new(buf);
        let mut writer = Vec::new();
        let svcuids = SvcuidRegistry::new();

        let err = accept(&mut reader, &mut writer, &AllowAllRegistry, &svcuids).await.unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::Invalid);
    }
}
