use std::time::Duration;

/// Simulated network delay in front of a mocked remote call.
///
/// A zero duration completes immediately, which is what tests use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedLatency {
    duration: Duration,
}

impl SimulatedLatency {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Suspend the caller for the configured duration
    pub async fn wait(&self) {
        if self.duration.is_zero() {
            return;
        }
        tokio::time::sleep(self.duration).await;
    }
}
