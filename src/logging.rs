//! Dual-sink structured logger.
//!
//! Every record goes to two independent, best-effort sinks:
//! 1. a durable file sink (one JSON object per line), and
//! 2. a live notification channel consumed by the MCP server loop and
//!    forwarded to the connected client as `notifications/message`.
//!
//! Neither sink may ever affect caller control flow: file-write failures
//! are swallowed, and notification-delivery failures are swallowed without
//! being logged (logging them would loop). The file sink is written first,
//! then the notification is attempted.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::types::{AppError, LoggingConfig};

/// Fixed source identifier carried in every client notification.
pub const LOGGER_NAME: &str = "graphkv-mcp";

/// Log file name inside the configured directory.
const LOG_FILE_NAME: &str = "graphkv-mcp.log";

/// Record severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Level tag as written to the file sink.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Lowercased form used in notification payloads.
    pub fn lowercase(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Payload delivered to the observer channel for each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogNotification {
    pub level: String,
    pub data: String,
    pub logger: String,
}

/// Cloneable handle to the logger. All clones share the same sinks.
#[derive(Debug, Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

#[derive(Debug)]
struct LoggerInner {
    /// `None` means the file sink is disabled: writes are skipped, not
    /// failed.
    log_file: Option<PathBuf>,
    development: bool,
    /// Absent until the server loop attaches its channel; records emitted
    /// before attachment skip the notification sink.
    notifier: OnceLock<mpsc::Sender<LogNotification>>,
}

impl Logger {
    /// Build a logger from config. If the log directory cannot be created
    /// the file sink is disabled rather than erroring.
    pub fn new(config: &LoggingConfig) -> Self {
        let log_file = if config.file_enabled || config.development {
            let dir = config
                .dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join(LOGGER_NAME));
            match std::fs::create_dir_all(&dir) {
                Ok(()) => Some(dir.join(LOG_FILE_NAME)),
                Err(err) => {
                    tracing::warn!("failed to create log directory, disabling file sink: {err}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            inner: Arc::new(LoggerInner {
                log_file,
                development: config.development,
                notifier: OnceLock::new(),
            }),
        }
    }

    /// Attach the observer channel. Called once after the server is
    /// constructed but before it starts; later calls are ignored.
    pub fn attach_notifier(&self, tx: mpsc::Sender<LogNotification>) {
        let _ = self.inner.notifier.set(tx);
    }

    /// Path of the file sink, if enabled.
    pub fn log_file(&self) -> Option<&std::path::Path> {
        self.inner.log_file.as_deref()
    }

    fn format_record(
        &self,
        level: LogLevel,
        message: &str,
        context: Option<&serde_json::Value>,
    ) -> String {
        let mut record = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level.as_str(),
            "message": message,
            "pid": std::process::id(),
        });
        if let (Some(ctx), Some(obj)) = (context, record.as_object_mut()) {
            obj.insert("context".to_string(), ctx.clone());
        }
        let mut line = record.to_string();
        line.push('\n');
        line
    }

    fn write_file(&self, level: LogLevel, message: &str, context: Option<&serde_json::Value>) {
        use std::io::Write;

        let Some(path) = &self.inner.log_file else {
            return;
        };
        let line = self.format_record(level, message, context);
        // Failures are swallowed: logging must never crash the process it
        // is instrumenting.
        let _ = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
    }

    fn notification(
        &self,
        level: LogLevel,
        message: &str,
        context: Option<&serde_json::Value>,
    ) -> LogNotification {
        let data = match context {
            Some(ctx) => format!("{message} | {ctx}"),
            None => message.to_string(),
        };
        LogNotification {
            level: level.lowercase().to_string(),
            data,
            logger: LOGGER_NAME.to_string(),
        }
    }

    async fn log(&self, level: LogLevel, message: &str, context: Option<serde_json::Value>) {
        if level == LogLevel::Debug && !self.inner.development {
            return;
        }
        self.write_file(level, message, context.as_ref());
        if let Some(tx) = self.inner.notifier.get() {
            // Delivery failure is deliberately not logged.
            let _ = tx.send(self.notification(level, message, context.as_ref())).await;
        }
    }

    fn log_sync(&self, level: LogLevel, message: &str, context: Option<serde_json::Value>) {
        if level == LogLevel::Debug && !self.inner.development {
            return;
        }
        self.write_file(level, message, context.as_ref());
        if let Some(tx) = self.inner.notifier.get() {
            let _ = tx.try_send(self.notification(level, message, context.as_ref()));
        }
    }

    /// Merge a source error's identity into a log context, the way the
    /// error policy expects to see it (name, message, operational flag).
    fn error_context(
        err: Option<&(dyn std::error::Error + Send + Sync + 'static)>,
        context: Option<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        let Some(err) = err else {
            return context;
        };
        let mut merged = serde_json::Map::new();
        match err.downcast_ref::<AppError>() {
            Some(app) => {
                merged.insert("name".to_string(), app.kind().as_str().into());
                merged.insert("message".to_string(), app.message().into());
                merged.insert("isOperational".to_string(), app.is_operational().into());
            }
            None => {
                merged.insert("name".to_string(), "Error".into());
                merged.insert("message".to_string(), err.to_string().into());
            }
        }
        if let Some(serde_json::Value::Object(extra)) = context {
            merged.extend(extra);
        }
        Some(serde_json::Value::Object(merged))
    }

    pub async fn debug(&self, message: &str, context: Option<serde_json::Value>) {
        self.log(LogLevel::Debug, message, context).await;
    }

    pub async fn info(&self, message: &str, context: Option<serde_json::Value>) {
        self.log(LogLevel::Info, message, context).await;
    }

    pub async fn warn(&self, message: &str, context: Option<serde_json::Value>) {
        self.log(LogLevel::Warn, message, context).await;
    }

    pub async fn error(
        &self,
        message: &str,
        err: Option<&(dyn std::error::Error + Send + Sync + 'static)>,
        context: Option<serde_json::Value>,
    ) {
        self.log(LogLevel::Error, message, Self::error_context(err, context))
            .await;
    }

    // Fire-and-forget variants for synchronous contexts (the crash path
    // cannot suspend).

    pub fn info_sync(&self, message: &str, context: Option<serde_json::Value>) {
        self.log_sync(LogLevel::Info, message, context);
    }

    pub fn warn_sync(&self, message: &str, context: Option<serde_json::Value>) {
        self.log_sync(LogLevel::Warn, message, context);
    }

    pub fn error_sync(
        &self,
        message: &str,
        err: Option<&(dyn std::error::Error + Send + Sync + 'static)>,
        context: Option<serde_json::Value>,
    ) {
        self.log_sync(LogLevel::Error, message, Self::error_context(err, context));
    }

    pub fn debug_sync(&self, message: &str, context: Option<serde_json::Value>) {
        self.log_sync(LogLevel::Debug, message, context);
    }
}

/// A logger with both sinks disabled, for tests and tools that need a
/// handle but no output.
impl Default for Logger {
    fn default() -> Self {
        Self::new(&LoggingConfig::default())
    }
}
