//! Frame encoding/decoding for the two wire styles this crate drives:
//! LF-delimited JSON (one value per line, used by JSON-RPC and MCP) and
//! HTTP-style `Content-Length`-prefixed JSON (used by DAP).

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FramingError;

/// Which framing style a stream uses.
#[derive(Debug, Clone)]
pub enum FrameMode {
    /// One JSON value per line, terminated by `delimiter` (typically `b"\n"`).
    Lf { delimiter: Vec<u8> },
    /// `Content-Length: N\r\n\r\n<N bytes of JSON>`, as used by DAP.
    Http,
}

impl FrameMode {
    pub fn lf() -> Self {
        FrameMode::Lf {
            delimiter: vec![b'\n'],
        }
    }
}

impl Default for FrameMode {
    fn default() -> Self {
        FrameMode::lf()
    }
}

/// Reads one frame from `reader` according to `mode`.
///
/// Returns `Ok(None)` on a clean EOF between frames (the only expected way a
/// stream ends).
pub async fn read_frame<R>(reader: &mut R, mode: &FrameMode) -> Result<Option<Value>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    match mode {
        FrameMode::Lf { delimiter } => read_lf_frame(reader, delimiter).await,
        FrameMode::Http => read_http_frame(reader).await,
    }
}

/// Writes one frame to `writer` according to `mode` and flushes.
pub async fn write_frame<W>(
    writer: &mut W,
    mode: &FrameMode,
    value: &Value,
) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    match mode {
        FrameMode::Lf { delimiter } => write_lf_frame(writer, delimiter, value).await,
        FrameMode::Http => write_http_frame(writer, value).await,
    }
}

async fn read_lf_frame<R>(
    reader: &mut R,
    delimiter: &[u8],
) -> Result<Option<Value>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    // Only single-byte delimiters are supported; this matches every LF-style
    // peer this crate talks to.
    debug_assert_eq!(delimiter.len(), 1);
    let mut buf = Vec::new();
    let n = reader.read_until(delimiter[0], &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&delimiter[0]) {
        buf.pop();
    }
    if buf.trim_ascii().is_empty() {
        return Ok(None);
    }
    let text = String::from_utf8(buf)?;
    let value = serde_json::from_str(&text)?;
    Ok(Some(value))
}

async fn write_lf_frame<W>(
    writer: &mut W,
    delimiter: &[u8],
    value: &Value,
) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let text = serde_json::to_string(value)?;
    if text.as_bytes().contains(&delimiter[0]) {
        return Err(FramingError::EmbeddedDelimiter);
    }
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(delimiter).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_http_frame<R>(reader: &mut R) -> Result<Option<Value>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return if content_length.is_none() {
                Ok(None)
            } else {
                Err(FramingError::MissingContentLength)
            };
        }

        let line = String::from_utf8(line)?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FramingError::BadHeader(line.to_string()))?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = Some(
                value
                    .trim()
                    .parse()
                    .map_err(|_| FramingError::BadHeader(line.to_string()))?,
            );
        }
    }

    let len = content_length.ok_or(FramingError::MissingContentLength)?;
    let mut body = vec![0u8; len];
    tokio::io::AsyncReadExt::read_exact(reader, &mut body).await?;
    let text = String::from_utf8(body)?;
    let value = serde_json::from_str(&text)?;
    Ok(Some(value))
}

async fn write_http_frame<W>(writer: &mut W, value: &Value) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let text = serde_json::to_string(value)?;
    let header = format!("Content-Length: {}\r\n\r\n", text.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
