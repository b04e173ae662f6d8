/// Sink for operator-facing success/failure reports. The back office UI
/// plugs its toast/alert channel in here; the CLI uses the log-based sink.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, operation: &str, message: &str);
    fn notify_failure(&self, operation: &str, message: &str);
}

/// Notifier that reports through the tracing subscriber.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_success(&self, operation: &str, message: &str) {
        tracing::info!(operation, "{message}");
    }

    fn notify_failure(&self, operation: &str, message: &str) {
        tracing::error!(operation, "{message}");
    }
}
