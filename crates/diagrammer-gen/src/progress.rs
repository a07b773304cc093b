use tokio::sync::mpsc::UnboundedSender;

/// Fire-and-forget stage messages for a caller UI. Delivery failures are
/// ignored.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl ProgressSink for () {
    fn report(&self, _message: &str) {}
}

/// Reports progress through the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, message: &str) {
        log::info!("{message}");
    }
}

impl ProgressSink for UnboundedSender<String> {
    fn report(&self, message: &str) {
        let _ = self.send(message.to_string());
    }
}
