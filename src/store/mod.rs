//! Backing-store services.
//!
//! Each service owns one [`connection::ManagedConnection`] over a RESP
//! backend and exposes typed pass-through operations. Reply-shape
//! violations are reported as non-operational failures; they indicate a
//! server speaking something other than what we asked for.

pub mod connection;
pub mod graph;
pub mod kv;
pub mod parser;

pub use graph::GraphStore;
pub use kv::KvStore;

use crate::resp::Value;
use crate::types::{AppError, ErrorKind};

pub(crate) fn unexpected_reply(command: &str, value: &Value) -> AppError {
    AppError::untrusted(
        ErrorKind::OperationFailed,
        format!("unexpected {command} reply: {value:?}"),
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection and answer each incoming command with the
    /// next canned reply, in order. The first reply is normally the
    /// `+PONG` answering the connect-time probe.
    pub async fn fake_resp_server(replies: Vec<&'static str>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            for reply in replies {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.flush().await.unwrap();
            }
        });
        addr
    }
}
