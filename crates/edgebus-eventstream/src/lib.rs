//! EventStream: the binary framing used by core-bus and IPC alike (spec §4.B).
//!
//! A frame is `prelude(12) | headers | payload | crc(4)`, with a CRC-32 over
//! the prelude itself folded into the running checksum for the rest of the
//! frame. See [`decode::decode`] and [`encode::encode`].

pub mod crc32;
pub mod decode;
pub mod encode;
pub mod types;

pub use decode::{common_headers, decode, decode_prelude, HeaderIter, Message, Prelude};
pub use encode::{encode, EncodeHeader};
pub use types::{
    CommonHeaders, Header, HeaderValue, HeaderValueTag, MessageType, FLAG_CONNECTION_ACCEPTED,
    FLAG_TERMINATE_STREAM,
};
