//! Key-value store service.

use async_trait::async_trait;

use crate::logging::Logger;
use crate::resp::{RespClient, Value};
use crate::store::connection::{Backend, ManagedConnection};
use crate::store::parser::{parse_connection_string, ConnectionOptions};
use crate::store::unexpected_reply;
use crate::types::{ConnectionConfig, KvStoreConfig, Result};

/// RESP backend for the key-value store. Same URL-over-fields precedence
/// as the graph backend.
#[derive(Debug)]
pub struct KvBackend {
    options: ConnectionOptions,
}

impl KvBackend {
    fn new(config: &KvStoreConfig) -> Self {
        let options = match &config.url {
            Some(url) => parse_connection_string(url),
            None => ConnectionOptions {
                host: config.host.clone(),
                port: config.port,
                username: config.username.clone(),
                password: config.password.clone(),
            },
        };
        Self { options }
    }
}

#[async_trait]
impl Backend for KvBackend {
    type Client = RespClient;

    fn resource(&self) -> &str {
        "kv store"
    }

    async fn connect(&self) -> Result<RespClient> {
        RespClient::connect(&self.options).await
    }

    async fn ping(&self, client: &mut RespClient) -> Result<()> {
        client.ping().await
    }

    async fn close(&self, client: RespClient) -> Result<()> {
        client.quit().await
    }
}

/// Key-value operations behind a managed connection.
#[derive(Debug)]
pub struct KvStore {
    conn: ManagedConnection<KvBackend>,
}

impl KvStore {
    pub fn new(config: &KvStoreConfig, connection: &ConnectionConfig, logger: Logger) -> Self {
        Self {
            conn: ManagedConnection::new(KvBackend::new(config), logger, connection.retry_delay),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.conn.initialize().await
    }

    /// Best-effort teardown; failures are absorbed and logged by the
    /// connection manager.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.is_connected().await
    }

    /// Fetch a key. `None` when the key does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_owned();
        self.conn
            .with_client("get", move |client| {
                Box::pin(async move {
                    match client.command(&["GET", &key]).await? {
                        Value::Bulk(value) | Value::Simple(value) => Ok(Some(value)),
                        Value::Null => Ok(None),
                        other => Err(unexpected_reply("GET", &other)),
                    }
                })
            })
            .await
    }

    /// Store a value under a key, overwriting any previous value.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_owned();
        let value = value.to_owned();
        self.conn
            .with_client("set", move |client| {
                Box::pin(async move {
                    client.command(&["SET", &key, &value]).await?;
                    Ok(())
                })
            })
            .await
    }

    /// Delete a key. `true` when a key was actually removed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_owned();
        self.conn
            .with_client("delete", move |client| {
                Box::pin(async move {
                    match client.command(&["DEL", &key]).await? {
                        Value::Integer(n) => Ok(n > 0),
                        other => Err(unexpected_reply("DEL", &other)),
                    }
                })
            })
            .await
    }

    /// All keys on the server.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        self.conn
            .with_client("list_keys", |client| {
                Box::pin(async move {
                    match client.command(&["KEYS", "*"]).await? {
                        Value::Array(items) => Ok(items
                            .into_iter()
                            .filter_map(|item| match item {
                                Value::Bulk(key) | Value::Simple(key) => Some(key),
                                _ => None,
                            })
                            .collect()),
                        Value::Null => Ok(Vec::new()),
                        other => Err(unexpected_reply("KEYS", &other)),
                    }
                })
            })
            .await
    }
}
