use edgebus_core::CoreError;
use edgebus_eventstream::{decode, encode, EncodeHeader};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const PRELUDE_LEN: usize = 12;

/// Reads one complete EventStream frame off `stream`: the 12-byte prelude,
/// then exactly `total_length - 12` more bytes. Returns the whole frame
/// (prelude included) so callers can hand it straight to
/// [`edgebus_eventstream::decode`].
pub async fn read_frame<R: tokio::io::AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<Vec<u8>, CoreError> {
    let mut prelude = [0u8; PRELUDE_LEN];
    stream
        .read_exact(&mut prelude)
        .await
        .map_err(|e| CoreError::no_conn(format!("reading frame prelude: {e}")).with_source(e))?;

    let info = decode::decode_prelude(&prelude)?;
    let mut rest = vec![0u8; info.total_length as usize - PRELUDE_LEN];
    stream
        .read_exact(&mut rest)
        .await
        .map_err(|e| CoreError::no_conn(format!("reading frame body: {e}")).with_source(e))?;

    let mut frame = Vec::with_capacity(info.total_length as usize);
    frame.extend_from_slice(&prelude);
    frame.extend_from_slice(&rest);
    Ok(frame)
}

/// Encodes `headers`/`payload` into a frame and writes it to `stream` as a
/// single `write_all` (spec §5: "EventStream frames on one socket are
/// written atomically"). Callers serialize writes on a connection by
/// holding whatever mutex guards `stream` for the duration of this call.
pub async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(
    stream: &mut W,
    headers: &[EncodeHeader<'_>],
    payload: &[u8],
) -> Result<(), CoreError> {
    let mut buf = vec![0u8; PRELUDE_LEN + payload.len() + 4 + headers_budget(headers)];
    let written = encode(&mut buf, headers, payload)?;
    stream
        .write_all(&buf[..written])
        .await
        .map_err(|e| CoreError::no_conn(format!("writing frame: {e}")).with_source(e))
}

fn headers_budget(headers: &[EncodeHeader<'_>]) -> usize {
    headers
        .iter()
        .map(|h| match h {
            EncodeHeader::Int32 { name, .. } => 1 + name.len() + 1 + 4,
            EncodeHeader::Str { name, value } => 1 + name.len() + 1 + 2 + value.len(),
        })
        .sum()
}
