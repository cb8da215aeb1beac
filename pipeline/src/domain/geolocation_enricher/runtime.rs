//! Runtime helpers for the rate-limit pause between lookup groups.

use std::time::Duration;

use async_trait::async_trait;

/// Async sleeping abstraction used for the inter-group delay.
///
/// The pipeline awaits the pause before doing anything else, so the whole
/// batch waits for its duration. Tests inject a recording implementation.
#[async_trait]
pub trait EnrichmentSleeper: Send + Sync {
    /// Suspend execution for `duration`.
    ///
    /// ```rust,no_run
    /// use async_trait::async_trait;
    /// use std::sync::Mutex;
    /// use std::time::Duration;
    /// use user_migration::domain::EnrichmentSleeper;
    ///
    /// #[derive(Default)]
    /// struct CountingSleeper {
    ///     calls: Mutex<u32>,
    /// }
    ///
    /// #[async_trait]
    /// impl EnrichmentSleeper for CountingSleeper {
    ///     async fn sleep(&self, _duration: Duration) {
    ///         *self.calls.lock().expect("calls mutex") += 1;
    ///     }
    /// }
    /// # async fn demo() {
    /// let sleeper = CountingSleeper::default();
    /// sleeper.sleep(Duration::from_secs(4)).await;
    /// assert_eq!(*sleeper.calls.lock().expect("calls mutex"), 1);
    /// # }
    /// ```
    async fn sleep(&self, duration: Duration);
}

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl EnrichmentSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
