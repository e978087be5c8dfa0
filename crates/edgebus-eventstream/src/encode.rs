use crate::crc32::update_crc;
use crate::types::HeaderValueTag;
use edgebus_core::CoreError;

const PRELUDE_LEN: usize = 12;
const TRAILING_CRC_LEN: usize = 4;
const MAX_NAME_LEN: usize = 255;
const MAX_STRING_VALUE_LEN: usize = 65535;

/// A header ready to be written, owning just enough to serialize.
#[derive(Debug, Clone)]
pub enum EncodeHeader<'a> {
    Int32 { name: &'a str, value: i32 },
    Str { name: &'a str, value: &'a str },
}

impl<'a> EncodeHeader<'a> {
    pub fn int32(name: &'a str, value: i32) -> Self {
        Self::Int32 { name, value }
    }

    pub fn string(name: &'a str, value: &'a str) -> Self {
        Self::Str { name, value }
    }

    fn name(&self) -> &'a str {
        match self {
            EncodeHeader::Int32 { name, .. } => name,
            EncodeHeader::Str { name, .. } => name,
        }
    }

    fn encoded_len(&self) -> Result<usize, CoreError> {
        if self.name().len() > MAX_NAME_LEN {
            return Err(CoreError::range("header name exceeds 255 bytes"));
        }
        let value_len = match self {
            EncodeHeader::Int32 { .. } => 4,
            EncodeHeader::Str { value, .. } => {
                if value.len() > MAX_STRING_VALUE_LEN {
                    return Err(CoreError::range("header string value exceeds 65535 bytes"));
                }
                2 + value.len()
            }
        };
        // name-len byte + name + type-tag byte + value
        Ok(1 + self.name().len() + 1 + value_len)
    }

    fn write(&self, out: &mut [u8]) -> usize {
        let mut pos = 0;
        out[pos] = self.name().len() as u8;
        pos += 1;
        out[pos..pos + self.name().len()].copy_from_slice(self.name().as_bytes());
        pos += self.name().len();

        match self {
            EncodeHeader::Int32 { value, .. } => {
                out[pos] = HeaderValueTag::Int32 as u8;
                pos += 1;
                out[pos..pos + 4].copy_from_slice(&value.to_be_bytes());
                pos += 4;
            }
            EncodeHeader::Str { value, .. } => {
                out[pos] = HeaderValueTag::String as u8;
                pos += 1;
                out[pos..pos + 2].copy_from_slice(&(value.len() as u16).to_be_bytes());
                pos += 2;
                out[pos..pos + value.len()].copy_from_slice(value.as_bytes());
                pos += value.len();
            }
        }
        pos
    }
}

/// Encodes a full frame (prelude + headers + payload + trailing CRC) into
/// `out`, returning the number of bytes written. Errors without partial
/// writes if `out` is too small or a header exceeds the wire limits.
pub fn encode(
    out: &mut [u8],
    headers: &[EncodeHeader<'_>],
    payload: &[u8],
) -> Result<usize, CoreError> {
    let mut headers_len = 0usize;
    for h in headers {
        headers_len += h.encoded_len()?;
    }

    let total_length = PRELUDE_LEN + headers_len + payload.len() + TRAILING_CRC_LEN;
    if out.len() < total_length {
        return Err(CoreError::no_mem("output buffer too small for encoded frame"));
    }

    out[0..4].copy_from_slice(&(total_length as u32).to_be_bytes());
    out[4..8].copy_from_slice(&(headers_len as u32).to_be_bytes());
    let prelude_crc = update_crc(0, &out[0..8]);
    out[8..12].copy_from_slice(&prelude_crc.to_be_bytes());

    let mut pos = PRELUDE_LEN;
    for h in headers {
        pos += h.write(&mut out[pos..]);
    }
    out[pos..pos + payload.len()].copy_from_slice(payload);
    pos += payload.len();

    let body_crc = update_crc(prelude_crc, &out[PRELUDE_LEN..pos]);
    out[pos..pos + 4].copy_from_slice(&body_crc.to_be_bytes());
    pos += 4;

    debug_assert_eq!(pos, total_length);
    Ok(total_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;

    #[test]
    fn name_over_255_bytes_is_rejected() {
        let long_name = "x".repeat(256);
        let headers = vec![EncodeHeader::int32(&long_name, 1)];
        let mut buf = vec![0u8; 1024];
        let err = encode(&mut buf, &headers, b"").unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::Range);
    }

    #[test]
    fn string_value_over_65535_bytes_is_rejected() {
        let long_value = "y".repeat(65536);
        let headers = vec![EncodeHeader::string("k", &long_value)];
        let mut buf = vec![0u8; 70_000];
        let err = encode(&mut buf, &headers, b"").unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::Range);
    }

    #[test]
    fn undersized_output_buffer_is_rejected() {
        let headers = vec![EncodeHeader::int32(":message-type", 0)];
        let mut buf = vec![0u8; 4];
        let err = encode(&mut buf, &headers, b"payload").unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::NoMem);
    }

    #[test]
    fn empty_headers_and_payload_round_trips() {
        let mut buf = vec![0u8; 16];
        let written = encode(&mut buf, &[], b"").unwrap();
        assert_eq!(written, 16);
        let msg = decode(&buf[..written]).unwrap();
        assert!(msg.payload.is_empty());
    }
}
