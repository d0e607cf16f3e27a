//! Progress reporting for installer tasks.

/// Sink for installer task progress.
///
/// `begin` announces a task and the total weight it will charge;
/// `advance` reports completed weight with a short status message.
/// Weights are abstract units, not percentages, so a task can split
/// its budget unevenly across phases.
pub trait ProgressReporter: Send + Sync {
    /// Announce the start of a task.
    ///
    /// `template` is a display pattern for per-item status lines, with
    /// `[1]` standing for the current item.
    fn begin(&self, total_weight: u32, name: &str, description: &str, template: &str);

    /// Report `weight` units of completed work.
    fn advance(&self, weight: u32, message: &str);
}

/// Reporter that writes progress to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn begin(&self, total_weight: u32, name: &str, description: &str, template: &str) {
        tracing::info!(total_weight, task = name, template, "{description}");
    }

    fn advance(&self, weight: u32, message: &str) {
        tracing::info!(weight, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_reporter_is_send_and_sync() {
        fn assert_reporter<T: ProgressReporter>(_reporter: &T) {}
        assert_reporter(&LogProgressReporter);
    }
}
