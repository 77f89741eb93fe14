//! Resilient connection lifecycle management.
//!
//! One [`ManagedConnection`] per backing resource. Connect-time failures
//! recover automatically inside a fixed retry budget; operation-time
//! failures never retry and surface to the caller immediately. Teardown is
//! idempotent and best-effort.
//!
//! The re-entry guard is an atomic compare-and-set because the runtime
//! schedules tasks on real threads; connection state itself lives behind
//! an async mutex and is never touched from outside this type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::logging::Logger;
use crate::types::{AppError, Result};

/// Fixed retry budget beyond the first connect attempt. Total attempts on
/// permanent failure = 1 + MAX_RETRIES.
pub const MAX_RETRIES: u32 = 5;

/// Fixed delay between connect attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(5000);

/// A backing store the lifecycle manager can open, probe, and tear down.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Live connection handle. Exclusively owned by the manager.
    type Client: Send;

    /// Resource identifier used in log records and error messages.
    fn resource(&self) -> &str;

    /// Open a fresh connection.
    async fn connect(&self) -> Result<Self::Client>;

    /// Lightweight round-trip probe validating a fresh connection.
    async fn ping(&self, client: &mut Self::Client) -> Result<()>;

    /// Tear the connection down.
    async fn close(&self, client: Self::Client) -> Result<()>;
}

#[derive(Debug)]
struct ConnState<C> {
    client: Option<C>,
    retry_count: u32,
}

/// Lifecycle manager for exactly one backing-store connection.
pub struct ManagedConnection<B: Backend> {
    backend: B,
    logger: Logger,
    retry_delay: Duration,
    initializing: AtomicBool,
    state: Mutex<ConnState<B::Client>>,
}

impl<B: Backend> std::fmt::Debug for ManagedConnection<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedConnection")
            .field("resource", &self.backend.resource())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> ManagedConnection<B> {
    pub fn new(backend: B, logger: Logger, retry_delay: Duration) -> Self {
        Self {
            backend,
            logger,
            retry_delay,
            initializing: AtomicBool::new(false),
            state: Mutex::new(ConnState {
                client: None,
                retry_count: 0,
            }),
        }
    }

    /// Resource identifier of the underlying backend.
    pub fn resource(&self) -> &str {
        self.backend.resource()
    }

    /// Establish the connection, retrying failed attempts up to the fixed
    /// budget with the fixed delay in between.
    ///
    /// Re-entrant calls while a sequence is in flight are no-ops. On
    /// exhaustion the error embeds the upstream cause and the attempt
    /// count; the guard is always cleared on the way out.
    pub async fn initialize(&self) -> Result<()> {
        if self
            .initializing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Another initialize sequence is already in flight.
            return Ok(());
        }
        let result = self.connect_with_retry().await;
        self.initializing.store(false, Ordering::SeqCst);
        result
    }

    async fn connect_with_retry(&self) -> Result<()> {
        loop {
            match self.attempt().await {
                Ok(client) => {
                    {
                        let mut state = self.state.lock().await;
                        state.client = Some(client);
                        state.retry_count = 0;
                    }
                    self.logger
                        .info(
                            &format!("Connected to {}", self.backend.resource()),
                            None,
                        )
                        .await;
                    return Ok(());
                }
                Err(err) => {
                    let attempt = {
                        let mut state = self.state.lock().await;
                        if state.retry_count >= MAX_RETRIES {
                            let attempts = state.retry_count + 1;
                            return Err(AppError::connection_failed(format!(
                                "failed to connect to {} after {} attempts: {}",
                                self.backend.resource(),
                                attempts,
                                err.message()
                            )));
                        }
                        state.retry_count += 1;
                        state.retry_count
                    };
                    self.logger
                        .warn(
                            &format!(
                                "Failed to connect to {}, will retry",
                                self.backend.resource()
                            ),
                            Some(serde_json::json!({
                                "attempt": attempt,
                                "maxRetries": MAX_RETRIES,
                                "error": err.message(),
                            })),
                        )
                        .await;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn attempt(&self) -> Result<B::Client> {
        let mut client = self.backend.connect().await?;
        self.backend.ping(&mut client).await?;
        Ok(client)
    }

    /// Run one operation against the live client.
    ///
    /// Fails fast with `CONNECTION_FAILED` when no client is present; this
    /// path never triggers retries. Underlying failures wrap as
    /// `OPERATION_FAILED` embedding the resource identifier and original
    /// message.
    pub async fn with_client<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut B::Client) -> BoxFuture<'c, Result<T>> + Send,
    {
        let resource = self.backend.resource();
        let result = {
            let mut state = self.state.lock().await;
            let client = state.client.as_mut().ok_or_else(|| {
                AppError::connection_failed(format!(
                    "{resource} client not initialized: call initialize() first"
                ))
            })?;
            f(client).await
        };

        match result {
            Ok(value) => {
                // Fire-and-forget, outside the state lock: the task that
                // drains the notifier may be the one awaiting this
                // operation.
                self.logger
                    .debug_sync(&format!("{resource} {operation} succeeded"), None);
                Ok(value)
            }
            Err(err) => Err(AppError::operation_failed(format!(
                "{resource} {operation} failed: {}",
                err.message()
            ))),
        }
    }

    /// Idempotent teardown. A teardown failure is logged, not propagated;
    /// the client reference is cleared and the retry counter reset either
    /// way.
    pub async fn close(&self) {
        let client = {
            let mut state = self.state.lock().await;
            state.retry_count = 0;
            match state.client.take() {
                Some(client) => client,
                None => return,
            }
        };

        let resource = self.backend.resource();
        match self.backend.close(client).await {
            Ok(()) => {
                self.logger
                    .info(&format!("Closed connection to {resource}"), None)
                    .await;
            }
            Err(err) => {
                self.logger
                    .warn(
                        &format!("Teardown of {resource} connection failed"),
                        Some(serde_json::json!({ "error": err.message() })),
                    )
                    .await;
            }
        }
    }

    /// Whether a live client is currently held.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.client.is_some()
    }

    /// Current retry counter value.
    pub async fn retry_count(&self) -> u32 {
        self.state.lock().await.retry_count
    }

    /// Whether an initialize sequence is in flight.
    pub fn is_initializing(&self) -> bool {
        self.initializing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    use crate::types::ErrorKind;

    #[derive(Debug, Default)]
    struct FakeClient;

    /// Backend whose first `fail_first` connect attempts are refused.
    struct ScriptedBackend {
        name: &'static str,
        fail_first: usize,
        attempts: Arc<AtomicUsize>,
        close_calls: Arc<AtomicUsize>,
        close_fails: bool,
    }

    impl ScriptedBackend {
        fn new(name: &'static str, fail_first: usize) -> Self {
            Self {
                name,
                fail_first,
                attempts: Arc::new(AtomicUsize::new(0)),
                close_calls: Arc::new(AtomicUsize::new(0)),
                close_fails: false,
            }
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        type Client = FakeClient;

        fn resource(&self) -> &str {
            self.name
        }

        async fn connect(&self) -> Result<FakeClient> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_first {
                Err(AppError::connection_failed("connection refused"))
            } else {
                Ok(FakeClient)
            }
        }

        async fn ping(&self, _client: &mut FakeClient) -> Result<()> {
            Ok(())
        }

        async fn close(&self, _client: FakeClient) -> Result<()> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            if self.close_fails {
                Err(AppError::operation_failed("quit failed"))
            } else {
                Ok(())
            }
        }
    }

    fn manager(backend: ScriptedBackend) -> ManagedConnection<ScriptedBackend> {
        ManagedConnection::new(backend, Logger::default(), Duration::ZERO)
    }

    #[tokio::test]
    async fn permanent_failure_makes_exactly_six_attempts() {
        let backend = ScriptedBackend::new("graph store", usize::MAX);
        let attempts = backend.attempts.clone();
        let conn = manager(backend);

        let err = conn.initialize().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert!(err.is_operational());
        assert!(err.message().contains("6 attempts"));
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
        assert!(!conn.is_connected().await);
        assert!(!conn.is_initializing());
    }

    #[tokio::test]
    async fn success_on_third_attempt_resets_retry_count() {
        let backend = ScriptedBackend::new("graph store", 2);
        let attempts = backend.attempts.clone();
        let conn = manager(backend);

        conn.initialize().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(conn.retry_count().await, 0);
        assert!(conn.is_connected().await);
        assert!(!conn.is_initializing());
    }

    #[tokio::test]
    async fn first_attempt_success_connects_immediately() {
        let backend = ScriptedBackend::new("kv store", 0);
        let attempts = backend.attempts.clone();
        let conn = manager(backend);

        conn.initialize().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(conn.is_connected().await);
    }

    #[tokio::test]
    async fn operations_work_after_successful_initialize() {
        let conn = manager(ScriptedBackend::new("kv store", 0));
        conn.initialize().await.unwrap();

        let value = conn
            .with_client("echo", |_client| Box::pin(async { Ok(41 + 1) }))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn operation_without_client_fails_fast_with_zero_attempts() {
        let backend = ScriptedBackend::new("kv store", 0);
        let attempts = backend.attempts.clone();
        let conn = manager(backend);

        let err = conn
            .with_client("get", |_client| Box::pin(async { Ok(()) }))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert!(err.message().contains("call initialize() first"));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn operation_failures_wrap_with_resource_and_cause() {
        let conn = manager(ScriptedBackend::new("graph store", 0));
        conn.initialize().await.unwrap();

        let err = conn
            .with_client("query", |_client| {
                Box::pin(async {
                    Err::<(), _>(AppError::operation_failed("server error: syntax"))
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(err.message().contains("graph store"));
        assert!(err.message().contains("server error: syntax"));
    }

    #[tokio::test]
    async fn close_before_initialize_is_a_no_op() {
        let backend = ScriptedBackend::new("kv store", 0);
        let close_calls = backend.close_calls.clone();
        let conn = manager(backend);

        conn.close().await;
        conn.close().await;
        assert_eq!(close_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_clears_state_even_when_teardown_fails() {
        let mut backend = ScriptedBackend::new("kv store", 0);
        backend.close_fails = true;
        let close_calls = backend.close_calls.clone();
        let conn = manager(backend);

        conn.initialize().await.unwrap();
        conn.close().await;

        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
        assert!(!conn.is_connected().await);
        assert_eq!(conn.retry_count().await, 0);

        // Second close: client already gone, no further teardown.
        conn.close().await;
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn operation_completes_with_full_undrained_notifier() {
        use crate::logging::LogNotification;
        use crate::types::LoggingConfig;

        let logger = Logger::new(&LoggingConfig {
            development: true,
            ..LoggingConfig::default()
        });
        let conn = ManagedConnection::new(
            ScriptedBackend::new("kv store", 0),
            logger.clone(),
            Duration::ZERO,
        );
        conn.initialize().await.unwrap();

        // Attach a full channel nobody drains; the success record must not
        // park the operation's caller.
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        tx.try_send(LogNotification {
            level: "info".into(),
            data: "filler".into(),
            logger: "graphkv-mcp".into(),
        })
        .unwrap();
        logger.attach_notifier(tx);

        let value = tokio::time::timeout(
            Duration::from_secs(1),
            conn.with_client("get", |_client| Box::pin(async { Ok(7) })),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn exhausted_initialize_leaves_retry_count_at_budget() {
        let conn = manager(ScriptedBackend::new("graph store", usize::MAX));
        conn.initialize().await.unwrap_err();
        assert_eq!(conn.retry_count().await, MAX_RETRIES);
    }

    /// Backend whose connect blocks until released, to hold an initialize
    /// sequence in flight.
    struct GatedBackend {
        gate: Arc<Semaphore>,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Backend for GatedBackend {
        type Client = FakeClient;

        fn resource(&self) -> &str {
            "gated store"
        }

        async fn connect(&self) -> Result<FakeClient> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            // Permit is granted by the test when it wants connect to finish.
            let _permit = self.gate.acquire().await.map_err(|_| {
                AppError::connection_failed("gate closed")
            })?;
            Ok(FakeClient)
        }

        async fn ping(&self, _client: &mut FakeClient) -> Result<()> {
            Ok(())
        }

        async fn close(&self, _client: FakeClient) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn reentrant_initialize_is_a_guarded_no_op() {
        let gate = Arc::new(Semaphore::new(0));
        let attempts = Arc::new(AtomicUsize::new(0));
        let conn = Arc::new(ManagedConnection::new(
            GatedBackend {
                gate: gate.clone(),
                attempts: attempts.clone(),
            },
            Logger::default(),
            Duration::ZERO,
        ));

        let first = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.initialize().await })
        };

        // Let the first sequence reach the blocked connect.
        while attempts.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(conn.is_initializing());

        // Re-entry returns immediately without a second attempt.
        conn.initialize().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        gate.add_permits(1);
        first.await.unwrap().unwrap();
        assert!(conn.is_connected().await);
        assert!(!conn.is_initializing());
    }
}
