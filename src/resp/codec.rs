//! RESP2 wire codec.
//!
//! Both backing stores speak RESP2: commands go out as arrays of bulk
//! strings, replies come back as one of five type-tagged frames:
//! ```text
//! +OK\r\n            simple string
//! -ERR message\r\n   error
//! :42\r\n            integer
//! $5\r\nhello\r\n    bulk string ($-1 = null)
//! *2\r\n...          array (*-1 = null)
//! ```

use futures::future::BoxFuture;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::{AppError, Result};

/// Cap on a single bulk payload. Guards against protocol desync being
/// interpreted as a multi-gigabyte allocation.
const MAX_BULK_BYTES: i64 = 64 * 1024 * 1024;

/// Cap on array headers, same rationale as [`MAX_BULK_BYTES`].
const MAX_ARRAY_ELEMENTS: i64 = 1024 * 1024;

/// Decoded RESP2 value.
///
/// Bulk payloads are decoded lossily to UTF-8; every command this server
/// issues is text and every reply it consumes is rendered to JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(String),
    Null,
    Array(Vec<Value>),
}

impl Value {
    /// Render a reply as JSON for tool output. Error frames render as
    /// strings, but callers convert them to failures before this point.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Simple(s) | Value::Bulk(s) | Value::Error(s) => serde_json::Value::String(s),
            Value::Integer(n) => serde_json::Value::Number(n.into()),
            Value::Null => serde_json::Value::Null,
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Value::into_json).collect())
            }
        }
    }
}

/// Write one command as an array of bulk strings and flush.
pub async fn write_command<W: AsyncWrite + Unpin>(writer: &mut W, args: &[&str]) -> Result<()> {
    let mut frame = format!("*{}\r\n", args.len());
    for arg in args {
        frame.push('$');
        frame.push_str(&arg.len().to_string());
        frame.push_str("\r\n");
        frame.push_str(arg);
        frame.push_str("\r\n");
    }
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one RESP2 value from the stream.
///
/// Boxed because arrays recurse.
pub fn read_value<'a, R>(reader: &'a mut R) -> BoxFuture<'a, Result<Value>>
where
    R: AsyncBufRead + Unpin + Send,
{
    Box::pin(async move {
        let line = read_line(reader).await?;
        let Some(tag) = line.chars().next() else {
            return Err(protocol_error("empty frame"));
        };
        let rest = &line[tag.len_utf8()..];

        match tag {
            '+' => Ok(Value::Simple(rest.to_string())),
            '-' => Ok(Value::Error(rest.to_string())),
            ':' => rest
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| protocol_error(&format!("bad integer frame: {rest}"))),
            '$' => {
                let len = parse_length(rest)?;
                if len < 0 {
                    return Ok(Value::Null);
                }
                if len > MAX_BULK_BYTES {
                    return Err(protocol_error(&format!("bulk too large: {len} bytes")));
                }
                // Payload plus trailing \r\n.
                let mut buf = vec![0u8; len as usize + 2];
                reader.read_exact(&mut buf).await?;
                buf.truncate(len as usize);
                Ok(Value::Bulk(String::from_utf8_lossy(&buf).into_owned()))
            }
            '*' => {
                let len = parse_length(rest)?;
                if len < 0 {
                    return Ok(Value::Null);
                }
                if len > MAX_ARRAY_ELEMENTS {
                    return Err(protocol_error(&format!("array too long: {len} elements")));
                }
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(read_value(reader).await?);
                }
                Ok(Value::Array(items))
            }
            other => Err(protocol_error(&format!("unknown type tag: {other:?}"))),
        }
    })
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(AppError::connection_failed("connection closed by peer"));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn parse_length(s: &str) -> Result<i64> {
    s.parse::<i64>()
        .map_err(|_| protocol_error(&format!("bad length frame: {s}")))
}

fn protocol_error(msg: &str) -> AppError {
    AppError::untrusted(
        crate::types::ErrorKind::OperationFailed,
        format!("protocol error: {msg}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn decode(bytes: &[u8]) -> Result<Value> {
        let mut reader = BufReader::new(bytes);
        read_value(&mut reader).await
    }

    #[tokio::test]
    async fn encodes_command_as_bulk_array() {
        let mut out = Vec::new();
        write_command(&mut out, &["SET", "k", "v1"]).await.unwrap();
        assert_eq!(out, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$2\r\nv1\r\n");
    }

    #[tokio::test]
    async fn decodes_simple_string() {
        assert_eq!(
            decode(b"+PONG\r\n").await.unwrap(),
            Value::Simple("PONG".to_string())
        );
    }

    #[tokio::test]
    async fn decodes_error_frame() {
        assert_eq!(
            decode(b"-ERR unknown command\r\n").await.unwrap(),
            Value::Error("ERR unknown command".to_string())
        );
    }

    #[tokio::test]
    async fn decodes_integer() {
        assert_eq!(decode(b":42\r\n").await.unwrap(), Value::Integer(42));
    }

    #[tokio::test]
    async fn decodes_bulk_string() {
        assert_eq!(
            decode(b"$5\r\nhello\r\n").await.unwrap(),
            Value::Bulk("hello".to_string())
        );
    }

    #[tokio::test]
    async fn decodes_null_bulk() {
        assert_eq!(decode(b"$-1\r\n").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn decodes_nested_array() {
        let value = decode(b"*2\r\n$1\r\na\r\n*2\r\n:1\r\n:2\r\n").await.unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Bulk("a".to_string()),
                Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
            ])
        );
    }

    #[tokio::test]
    async fn decodes_null_array() {
        assert_eq!(decode(b"*-1\r\n").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn oversized_bulk_header_is_a_protocol_error() {
        let err = decode(b"$9223372036854775807\r\n").await.unwrap_err();
        assert!(err.message().contains("bulk too large"));
    }

    #[tokio::test]
    async fn oversized_array_header_is_a_protocol_error() {
        let err = decode(b"*9223372036854775807\r\n").await.unwrap_err();
        assert!(!err.is_operational());
        assert!(err.message().contains("array too long"));
    }

    #[tokio::test]
    async fn rejects_unknown_tag() {
        let err = decode(b"?what\r\n").await.unwrap_err();
        assert!(!err.is_operational());
        assert!(err.message().contains("unknown type tag"));
    }

    #[tokio::test]
    async fn eof_reports_closed_connection() {
        let err = decode(b"").await.unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::ConnectionFailed);
    }

    #[test]
    fn json_rendering_covers_all_variants() {
        let value = Value::Array(vec![
            Value::Simple("OK".to_string()),
            Value::Integer(7),
            Value::Null,
            Value::Bulk("data".to_string()),
        ]);
        assert_eq!(
            value.into_json(),
            serde_json::json!(["OK", 7, null, "data"])
        );
    }
}
