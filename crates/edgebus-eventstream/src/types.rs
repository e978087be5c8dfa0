/// Supported EventStream header value type tags (spec §3, §4.B). Only the
/// subset used by the core-bus/IPC wire formats; any other tag on the wire
/// is malformed by definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderValueTag {
    Int32 = 4,
    String = 7,
}

impl HeaderValueTag {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            4 => Some(Self::Int32),
            7 => Some(Self::String),
            _ => None,
        }
    }
}

/// A decoded header value, borrowing from the frame that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderValue<'a> {
    Int32(i32),
    Str(&'a [u8]),
}

impl<'a> HeaderValue<'a> {
    pub fn tag(&self) -> HeaderValueTag {
        match self {
            HeaderValue::Int32(_) => HeaderValueTag::Int32,
            HeaderValue::Str(_) => HeaderValueTag::String,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self {
            HeaderValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            HeaderValue::Str(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }
}

/// A single decoded header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub name: &'a str,
    pub value: HeaderValue<'a>,
}

/// `:message-type` header values (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    ApplicationMessage = 0,
    ApplicationError = 1,
    Connect = 4,
    ConnectAck = 5,
}

impl MessageType {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::ApplicationMessage),
            1 => Some(Self::ApplicationError),
            4 => Some(Self::Connect),
            5 => Some(Self::ConnectAck),
            _ => None,
        }
    }
}

/// `:message-flags` bit values (spec §4.E).
pub const FLAG_CONNECTION_ACCEPTED: i32 = 1;
pub const FLAG_TERMINATE_STREAM: i32 = 2;

/// Headers common to every core-bus/IPC frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonHeaders {
    pub stream_id: i32,
    pub message_type: i32,
    pub message_flags: i32,
}

impl Default for CommonHeaders {
    /// Matches `eventstream_get_common_headers`'s defaults: no `:message-type`
    /// header is a distinct ("unset") state from an explicit Int32(0).
    fn default() -> Self {
        Self { stream_id: 0, message_type: -1, message_flags: 0 }
    }
}
