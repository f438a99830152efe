//! Framed transport codec.
//!
//! Messages travel as `Content-Length: N\r\n\r\n{json}` frames. This
//! module provides [`FrameReader`] and [`FrameWriter`] for async reading
//! and writing of framed [`Message`] envelopes.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use dth_types::Message;

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Reads framed messages from an async reader.
///
/// Parses `Content-Length` headers and reads exactly that many bytes,
/// then deserializes the body as a [`Message`].
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message frame.
    ///
    /// Returns `Ok(None)` on EOF (clean shutdown).
    /// Returns `Err` on malformed headers, oversized frames or bodies
    /// that do not decode as a message envelope.
    pub async fn read_message(&mut self) -> Result<Option<Message>> {
        let content_length = match self.read_headers().await? {
            Some(len) => len,
            None => return Ok(None), // EOF
        };

        if content_length > MAX_FRAME_BYTES {
            bail!("Content-Length {content_length} exceeds maximum {MAX_FRAME_BYTES}");
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;

        let message = serde_json::from_slice(&body).context("parsing message frame")?;
        Ok(Some(message))
    }

    /// Parse headers until the empty line separator.
    ///
    /// Returns the `Content-Length` value, or `None` on EOF.
    async fn read_headers(&mut self) -> Result<Option<usize>> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();
        let mut saw_any_header_bytes = false;

        loop {
            line.clear();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .await
                .context("reading header line")?;

            if bytes_read == 0 {
                // EOF is a clean shutdown only between frames, never in
                // the middle of a header block.
                if !saw_any_header_bytes {
                    return Ok(None);
                }
                bail!("unexpected EOF while reading headers");
            }
            saw_any_header_bytes = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                // Empty line = end of headers
                break;
            }

            if let Some(colon_pos) = trimmed.find(':') {
                let key = &trimmed[..colon_pos];
                if key.eq_ignore_ascii_case("Content-Length") {
                    let len: usize = trimmed[colon_pos + 1..]
                        .trim()
                        .parse()
                        .context("invalid Content-Length value")?;
                    content_length = Some(len);
                }
            }
            // Ignore other headers
        }

        match content_length {
            Some(len) => Ok(Some(len)),
            None => bail!("missing Content-Length header"),
        }
    }
}

/// Writes framed messages to an async writer.
///
/// Serializes the envelope and prepends the `Content-Length` header.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one message frame with its `Content-Length` header.
    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        let body = serde_json::to_string(message).context("serializing message frame")?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .context("writing frame header")?;
        self.writer
            .write_all(body.as_bytes())
            .await
            .context("writing frame body")?;
        self.writer.flush().await.context("flushing frame")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dth_types::message_types;

    #[tokio::test]
    async fn test_roundtrip() {
        let message = Message::from_payload(
            message_types::SOURCES,
            2,
            serde_json::json!({"Files": ["/work/app/main.cs"]}),
        );

        let mut buf = Vec::new();
        let mut writer = FrameWriter::new(&mut buf);
        writer.write_message(&message).await.unwrap();

        let mut reader = FrameReader::new(buf.as_slice());
        let result = reader.read_message().await.unwrap().unwrap();
        assert_eq!(result.message_type, "Sources");
        assert_eq!(result.context_id, 2);
        assert_eq!(result.payload.unwrap()["Files"][0], "/work/app/main.cs");
    }

    #[tokio::test]
    async fn test_multiple_frames() {
        let msg1 = Message::from_payload(message_types::INITIALIZE, 1, serde_json::json!({}));
        let msg2 = Message::from_payload(message_types::GET_DIAGNOSTICS, 1, serde_json::json!({}));

        let mut buf = Vec::new();
        let mut writer = FrameWriter::new(&mut buf);
        writer.write_message(&msg1).await.unwrap();
        writer.write_message(&msg2).await.unwrap();

        let mut reader = FrameReader::new(buf.as_slice());
        let first = reader.read_message().await.unwrap().unwrap();
        let second = reader.read_message().await.unwrap().unwrap();
        assert_eq!(first.message_type, "Initialize");
        assert_eq!(second.message_type, "GetDiagnostics");
    }

    #[tokio::test]
    async fn test_eof_returns_none() {
        let buf: &[u8] = b"";
        let mut reader = FrameReader::new(buf);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let buf: &[u8] = b"Content-Type: application/json\r\n\r\n{}";
        let mut reader = FrameReader::new(buf);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn test_eof_mid_headers_is_error() {
        // EOF after a header line must not look like a clean shutdown.
        let buf: &[u8] = b"Content-Length: 10\r\n";
        let mut reader = FrameReader::new(buf);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let header = format!("Content-Length: {}\r\n\r\n", MAX_FRAME_BYTES + 1);
        let buf = header.as_bytes();
        let mut reader = FrameReader::new(buf);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn test_case_insensitive_content_length() {
        let body = r#"{"MessageType":"Initialize"}"#;
        let frame = format!("content-length: {}\r\n\r\n{body}", body.len());

        let mut reader = FrameReader::new(frame.as_bytes());
        let result = reader.read_message().await.unwrap().unwrap();
        assert_eq!(result.message_type, "Initialize");
    }

    #[tokio::test]
    async fn test_eof_mid_body() {
        // Content-Length says 100, but only 5 bytes follow
        let buf: &[u8] = b"Content-Length: 100\r\n\r\nhello";
        let mut reader = FrameReader::new(buf);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let body = b"not valid json!!!";
        let frame = format!("Content-Length: {}\r\n\r\n", body.len());
        let mut buf = frame.into_bytes();
        buf.extend_from_slice(body);

        let mut reader = FrameReader::new(buf.as_slice());
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_content_length_value() {
        let buf: &[u8] = b"Content-Length: not_a_number\r\n\r\n";
        let mut reader = FrameReader::new(buf);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn test_write_content_length_is_byte_count() {
        // Content-Length counts bytes, not characters.
        let message =
            Message::from_payload(message_types::ERROR, -1, serde_json::json!({"Message": "é"}));
        let mut buf = Vec::new();
        let mut writer = FrameWriter::new(&mut buf);
        writer.write_message(&message).await.unwrap();

        let output = String::from_utf8(buf).unwrap();
        let body = serde_json::to_string(&message).unwrap();
        assert!(output.starts_with(&format!("Content-Length: {}\r\n\r\n", body.len())));
    }
}
