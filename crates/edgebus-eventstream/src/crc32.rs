//! CRC-32 (reflected polynomial 0xEDB88320, init 0, final XOR 0xFFFFFFFF),
//! computed byte-wise over the raw wire bytes (spec §4.B). Table adapted
//! from the RFC 1952 (gzip) reference algorithm, matching
//! `examples/original_source/eventstream/src/crc32.c` exactly.
//!
//! Note this is unrelated to spec §9's open question about OR-vs-AND when
//! *assembling big-endian integers* in the header decoder; the combining
//! step here is the standard reflected-CRC XOR.

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = build_table();

/// Continues a CRC-32 computation. Pass `0` as `crc` to start a fresh
/// computation; pass a previous call's return value to continue it over
/// the next chunk of the same logical byte stream.
pub fn update_crc(crc: u32, buf: &[u8]) -> u32 {
    let mut c = !crc;
    for &byte in buf {
        c = crc_step(c, byte);
    }
    !c
}

#[inline]
fn crc_step(c: u32, byte: u8) -> u32 {
    CRC_TABLE[((c ^ byte as u32) & 0xFF) as usize] ^ (c >> 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_crc32_of_empty_and_check_string() {
        assert_eq!(update_crc(0, b""), 0);
        // Standard CRC-32 check value for ASCII "123456789".
        assert_eq!(update_crc(0, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn chaining_equals_one_shot() {
        let whole = update_crc(0, b"hello world");
        let first = update_crc(0, b"hello ");
        let chained = update_crc(first, b"world");
        assert_eq!(whole, chained);
    }
}
