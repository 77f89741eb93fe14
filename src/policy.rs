//! Error classification and crash decision policy.
//!
//! Uniformly decides, for any failure value in the system, whether it is
//! safe to keep the process running. Operational [`AppError`]s are handled
//! gracefully; everything else (non-operational AppErrors and all foreign
//! errors) is a programmer error and a crash signal.
//!
//! Per error the flow is linear: log the error, classify it, then either
//! note graceful handling or log the crash record and terminate. The
//! handler never raises and `handle_error` never terminates by itself;
//! only `crash_if_untrusted` ends the process.

use crate::logging::Logger;
use crate::types::AppError;

/// Exit status used when terminating on an untrusted error.
const CRASH_EXIT_CODE: i32 = 1;

/// Centralized error handler. Constructed once at the composition root
/// and cloned wherever failures are routed.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    logger: Logger,
}

impl ErrorHandler {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Log the error and record its classification. Never terminates.
    pub async fn handle_error(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) {
        self.log_error(err).await;
        self.record_classification(err).await;
    }

    /// An error is trusted exactly when it is an [`AppError`] that marked
    /// itself operational. Anything else is unanticipated.
    pub fn is_trusted(&self, err: &(dyn std::error::Error + 'static)) -> bool {
        err.downcast_ref::<AppError>()
            .map(AppError::is_operational)
            .unwrap_or(false)
    }

    /// True exactly when the process should terminate over this error.
    pub fn crash_eligible(&self, err: &(dyn std::error::Error + 'static)) -> bool {
        !self.is_trusted(err)
    }

    /// Terminate with exit status 1 if the error is untrusted, after
    /// synchronously logging a final crash record. No-op for trusted
    /// errors.
    pub fn crash_if_untrusted(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) {
        if self.crash_eligible(err) {
            std::process::exit(self.record_crash(err));
        }
    }

    /// Log the final crash record and return the exit status. Split from
    /// the exit call so the crash path is observable without ending the
    /// calling process.
    fn record_crash(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) -> i32 {
        self.logger
            .error_sync("Crashing process due to untrusted error", Some(err), None);
        CRASH_EXIT_CODE
    }

    async fn log_error(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) {
        let error_type = if err.downcast_ref::<AppError>().is_some() {
            "AppError"
        } else {
            "Error"
        };
        self.logger
            .error(
                "Unhandled error occurred",
                Some(err),
                Some(serde_json::json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "errorType": error_type,
                })),
            )
            .await;
    }

    async fn record_classification(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) {
        if self.is_trusted(err) {
            let name = err
                .downcast_ref::<AppError>()
                .map(|app| app.kind().as_str())
                .unwrap_or("Error");
            self.logger
                .info(
                    "Operational error handled gracefully",
                    Some(serde_json::json!({
                        "errorName": name,
                        "errorMessage": err.to_string(),
                    })),
                )
                .await;
        } else {
            self.logger
                .error(
                    "Programmer error detected - may require process restart",
                    Some(err),
                    Some(serde_json::json!({
                        "recommendation": "Review code for bugs",
                        "severity": "critical",
                    })),
                )
                .await;
        }
    }
}
