//! Error reporter that writes to `tracing`.

use tracing::error;

use recall_core::traits::ErrorReporter;
use recall_core::types::ErrorContext;

/// Forwards failure reports to `tracing::error!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report_error(&self, message: &str, context: &ErrorContext<'_>) {
        match context.cause {
            Some(cause) => error!(
                source = context.source,
                kind = %context.kind,
                detail = context.detail,
                error = %cause,
                "{}",
                message
            ),
            None => error!(
                source = context.source,
                kind = %context.kind,
                detail = context.detail,
                "{}",
                message
            ),
        }
    }
}
