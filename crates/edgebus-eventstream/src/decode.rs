use crate::crc32::update_crc;
use crate::types::{CommonHeaders, Header, HeaderValue, HeaderValueTag};
use edgebus_core::CoreError;

const PRELUDE_LEN: usize = 12;
const TRAILING_CRC_LEN: usize = 4;
const MIN_MESSAGE_LEN: usize = PRELUDE_LEN + TRAILING_CRC_LEN;

fn read_be_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes(buf.try_into().expect("4-byte slice"))
}

/// The fixed-size prelude: total message length, header-section length, and
/// the running CRC state after the prelude has been folded in.
#[derive(Debug, Clone, Copy)]
pub struct Prelude {
    pub total_length: u32,
    pub headers_length: u32,
    running_crc: u32,
}

/// Validates and decodes the 12-byte prelude, per spec §4.B:
/// - total length MUST be >= 16
/// - headers length MUST be <= total_length - 16
/// - the prelude CRC (bytes 8..12) covers bytes 0..8.
pub fn decode_prelude(buf: &[u8]) -> Result<Prelude, CoreError> {
    if buf.len() < PRELUDE_LEN {
        return Err(CoreError::range("buffer shorter than the 12-byte prelude"));
    }

    let crc = update_crc(0, &buf[0..8]);
    let prelude_crc = read_be_u32(&buf[8..12]);
    if crc != prelude_crc {
        return Err(CoreError::parse("Prelude CRC mismatch"));
    }

    let total_length = read_be_u32(&buf[0..4]);
    let headers_length = read_be_u32(&buf[4..8]);

    if (total_length as usize) < MIN_MESSAGE_LEN {
        return Err(CoreError::parse("total length below valid range"));
    }
    if headers_length as usize > total_length as usize - MIN_MESSAGE_LEN {
        return Err(CoreError::parse("headers length does not fit in valid range"));
    }

    Ok(Prelude {
        total_length,
        headers_length,
        running_crc: update_crc(prelude_crc, &buf[8..12]),
    })
}

/// A decoded message: the header section (as an iterator sharing storage
/// with the input) and the payload view.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    pub headers: HeaderIter<'a>,
    pub payload: &'a [u8],
}

/// Decodes a complete frame. `buf` must contain at least `prelude.total_length`
/// bytes; any bytes beyond that are left untouched (caller's business, e.g.
/// the next frame on a stream).
pub fn decode(buf: &[u8]) -> Result<Message<'_>, CoreError> {
    let prelude = decode_prelude(buf)?;
    let total_length = prelude.total_length as usize;
    if buf.len() < total_length {
        return Err(CoreError::range("buffer shorter than the frame's total length"));
    }

    let data_section = &buf[PRELUDE_LEN..total_length];
    if data_section.len() < TRAILING_CRC_LEN {
        return Err(CoreError::parse("frame too short for trailing CRC"));
    }

    let body_len = data_section.len() - TRAILING_CRC_LEN;
    let crc = update_crc(prelude.running_crc, &data_section[..body_len]);
    let message_crc = read_be_u32(&data_section[body_len..]);
    if crc != message_crc {
        return Err(CoreError::parse("Message CRC mismatch"));
    }

    let headers_len = prelude.headers_length as usize;
    let headers_buf = &data_section[..headers_len];
    let payload = &data_section[headers_len..body_len];

    // Validate the header section eagerly so a malformed frame is rejected
    // up front rather than lazily during iteration.
    let mut probe = HeaderIter { remaining: headers_buf };
    while probe.next().transpose()?.is_some() {}

    Ok(Message { headers: HeaderIter { remaining: headers_buf }, payload })
}

/// Walks the header section of a decoded message in wire order. Cheap to
/// clone: cloning gives an independent cursor over the same bytes, so
/// decoding twice from the same position is just cloning before iterating.
#[derive(Debug, Clone, Copy)]
pub struct HeaderIter<'a> {
    remaining: &'a [u8],
}

impl<'a> HeaderIter<'a> {
    /// Parses and returns the next header, or `None` once the section is
    /// exhausted. Returns `Err` on a truncated or malformed header; once an
    /// error is returned the iterator's position is unspecified.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Result<Header<'a>, CoreError>> {
        if self.remaining.is_empty() {
            return None;
        }
        Some(self.take_header())
    }

    fn take_header(&mut self) -> Result<Header<'a>, CoreError> {
        let buf = self.remaining;
        let mut pos = 0usize;

        let name_len = *buf.get(pos).ok_or_else(out_of_bounds)? as usize;
        pos += 1;

        let name_bytes = buf.get(pos..pos + name_len).ok_or_else(out_of_bounds)?;
        pos += name_len;

        let tag_byte = *buf.get(pos).ok_or_else(out_of_bounds)?;
        pos += 1;
        let tag = HeaderValueTag::from_tag(tag_byte)
            .ok_or_else(|| CoreError::parse("unsupported header value type"))?;

        let value = match tag {
            HeaderValueTag::Int32 => {
                let bytes = buf.get(pos..pos + 4).ok_or_else(out_of_bounds)?;
                pos += 4;
                HeaderValue::Int32(i32::from_be_bytes(bytes.try_into().unwrap()))
            }
            HeaderValueTag::String => {
                let len_bytes = buf.get(pos..pos + 2).ok_or_else(out_of_bounds)?;
                let value_len = u16::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
                pos += 2;
                let str_bytes = buf.get(pos..pos + value_len).ok_or_else(out_of_bounds)?;
                pos += value_len;
                HeaderValue::Str(str_bytes)
            }
        };

        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| CoreError::parse("header name is not valid UTF-8"))?;

        self.remaining = &buf[pos..];
        Ok(Header { name, value })
    }
}

fn out_of_bounds() -> CoreError {
    CoreError::parse("header parsing out of bounds")
}

/// Pulls `:message-type`, `:message-flags` and `:stream-id` out of a header
/// iterator, rejecting any of the three carried with a non-Int32 value.
pub fn common_headers(mut headers: HeaderIter<'_>) -> Result<CommonHeaders, CoreError> {
    let mut out = CommonHeaders::default();
    while let Some(header) = headers.next().transpose()? {
        match header.name {
            ":message-type" => {
                out.message_type = header
                    .value
                    .as_int32()
                    .ok_or_else(|| CoreError::invalid(":message-type header not Int32"))?;
            }
            ":message-flags" => {
                out.message_flags = header
                    .value
                    .as_int32()
                    .ok_or_else(|| CoreError::invalid(":message-flags header not Int32"))?;
            }
            ":stream-id" => {
                out.stream_id = header
                    .value
                    .as_int32()
                    .ok_or_else(|| CoreError::invalid(":stream-id header not Int32"))?;
            }
            _ => {}
        }
    }
    Ok(out)
}
