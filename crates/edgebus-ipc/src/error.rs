//! The IPC-facing error envelope (spec §4.E: `{_errorCode, _message?}`),
//! distinct from core-bus's internal `ErrorEnvelope` (spec §7's `REMOTE`
//! wire format) since external components see Greengrass's published
//! service-model error names, not raw `ErrorKind`s.

use edgebus_core::ErrorKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcErrorCode {
    ResourceNotFoundError,
    UnauthorizedError,
    InvalidArgumentsError,
    ServiceError,
}

impl IpcErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IpcErrorCode::ResourceNotFoundError => "aws.greengrass#ResourceNotFoundError",
            IpcErrorCode::UnauthorizedError => "aws.greengrass#UnauthorizedError",
            IpcErrorCode::InvalidArgumentsError => "aws.greengrass#InvalidArgumentsError",
            IpcErrorCode::ServiceError => "aws.greengrass#ServiceError",
        }
    }

    /// Maps a core error taxonomy kind onto the nearest published IPC
    /// error name (spec §4.E only names `ResourceNotFoundError` and
    /// `UnauthorizedError` explicitly; everything else surfaces as the
    /// generic `ServiceError`).
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NoEntry => IpcErrorCode::ResourceNotFoundError,
            ErrorKind::Invalid | ErrorKind::Parse | ErrorKind::Range => {
                IpcErrorCode::InvalidArgumentsError
            }
            _ => IpcErrorCode::ServiceError,
        }
    }
}

#[derive(Debug, Serialize)]
struct IpcErrorPayload {
    #[serde(rename = "_errorCode")]
    error_code: &'static str,
    #[serde(rename = "_message", skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Serializes `{_errorCode, _message?}` for an APPLICATION_ERROR frame.
pub fn error_payload(code: IpcErrorCode, message: Option<String>) -> Vec<u8> {
    serde_json::to_vec(&IpcErrorPayload { error_code: code.as_str(), message })
        .expect("error payload always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_entry_maps_to_resource_not_found() {
        assert_eq!(IpcErrorCode::from_kind(ErrorKind::NoEntry), IpcErrorCode::ResourceNotFoundError);
    }

    #[test]
    fn payload_omits_message_when_absent() {
        let payload = error_payload(IpcErrorCode::ServiceError, None);
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert!(json.get("_message").is_none());
        assert_eq!(json["_errorCode"], "aws.greengrass#ServiceError");
    }
}
