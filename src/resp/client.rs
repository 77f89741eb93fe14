//! RESP TCP client.
//!
//! One buffered TCP stream per backing store. Commands are strictly
//! request/response; there is no pipelining and no reconnect logic here.
//! Recovery from connect failures belongs to the connection lifecycle
//! manager, not this layer.

use tokio::io::BufStream;
use tokio::net::TcpStream;

use crate::resp::codec::{read_value, write_command, Value};
use crate::store::parser::ConnectionOptions;
use crate::types::{AppError, Result};

/// Live RESP connection to a backing store.
#[derive(Debug)]
pub struct RespClient {
    stream: BufStream<TcpStream>,
    addr: String,
}

impl RespClient {
    /// Open a TCP connection and authenticate if a password is configured.
    pub async fn connect(options: &ConnectionOptions) -> Result<Self> {
        let addr = format!("{}:{}", options.host, options.port);
        let stream = TcpStream::connect(&addr).await.map_err(|err| {
            AppError::connection_failed(format!("connect to {addr} failed: {err}"))
        })?;
        tracing::debug!("connected to {addr}");

        let mut client = Self {
            stream: BufStream::new(stream),
            addr,
        };

        if let Some(password) = &options.password {
            let mut cmd = vec!["AUTH"];
            if let Some(username) = &options.username {
                cmd.push(username);
            }
            cmd.push(password);
            client.command(&cmd).await.map_err(|err| {
                AppError::connection_failed(format!(
                    "auth against {} failed: {err}",
                    client.addr
                ))
            })?;
        }

        Ok(client)
    }

    /// Issue one command and decode the reply. Server error frames come
    /// back as failures, not values.
    pub async fn command(&mut self, args: &[&str]) -> Result<Value> {
        write_command(&mut self.stream, args).await?;
        match read_value(&mut self.stream).await? {
            Value::Error(msg) => Err(AppError::operation_failed(format!("server error: {msg}"))),
            value => Ok(value),
        }
    }

    /// Lightweight round-trip probe used to validate a fresh connection.
    pub async fn ping(&mut self) -> Result<()> {
        match self.command(&["PING"]).await? {
            Value::Simple(reply) if reply == "PONG" => Ok(()),
            other => Err(AppError::connection_failed(format!(
                "unexpected ping reply from {}: {other:?}",
                self.addr
            ))),
        }
    }

    /// Polite teardown. Consumes the client; the TCP stream drops either
    /// way.
    pub async fn quit(mut self) -> Result<()> {
        self.command(&["QUIT"]).await?;
        Ok(())
    }
}
