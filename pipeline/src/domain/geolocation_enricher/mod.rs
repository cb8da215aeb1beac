//! Rate-limited geolocation enrichment for a batch of IP addresses.
//!
//! Addresses are sorted, split into groups no larger than the service's bulk
//! limit, and looked up one group per call. The enricher pauses between
//! calls to stay under the service's rate limit. There are no retries: a
//! transport failure on any group fails the whole call and discards what
//! earlier groups returned.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::ports::{GEOLOCATION_BATCH_LIMIT, GeolocationOutcome, GeolocationSource};
use crate::domain::{BatchError, GeoEnrichment};

mod runtime;

pub use runtime::{EnrichmentSleeper, TokioSleeper};

/// Default pause between successive lookup calls.
pub const DEFAULT_GEOLOCATION_DELAY: Duration = Duration::from_secs(4);

/// Grouping and pacing for geolocation lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocationEnricherConfig {
    /// Addresses per call, clamped to `1..=GEOLOCATION_BATCH_LIMIT`.
    pub group_size: usize,
    /// Pause enforced between consecutive calls.
    pub delay: Duration,
}

impl Default for GeolocationEnricherConfig {
    fn default() -> Self {
        Self {
            group_size: GEOLOCATION_BATCH_LIMIT,
            delay: DEFAULT_GEOLOCATION_DELAY,
        }
    }
}

impl GeolocationEnricherConfig {
    fn effective_group_size(&self) -> usize {
        self.group_size.clamp(1, GEOLOCATION_BATCH_LIMIT)
    }
}

/// Domain service mapping IP addresses to enrichment attributes.
pub struct GeolocationEnricher {
    source: Arc<dyn GeolocationSource>,
    sleeper: Arc<dyn EnrichmentSleeper>,
    config: GeolocationEnricherConfig,
}

impl GeolocationEnricher {
    /// Build an enricher that pauses with [`TokioSleeper`].
    /// ```rust,ignore
    /// let enricher = GeolocationEnricher::new(source, GeolocationEnricherConfig::default());
    /// ```
    pub fn new(source: Arc<dyn GeolocationSource>, config: GeolocationEnricherConfig) -> Self {
        Self::with_sleeper(source, Arc::new(TokioSleeper), config)
    }

    /// Build an enricher with an injected sleeper.
    pub fn with_sleeper(
        source: Arc<dyn GeolocationSource>,
        sleeper: Arc<dyn EnrichmentSleeper>,
        config: GeolocationEnricherConfig,
    ) -> Self {
        Self {
            source,
            sleeper,
            config,
        }
    }

    /// Resolve every address in `ip_addresses`.
    ///
    /// Addresses the service reports as unresolvable are absent from the
    /// returned map rather than treated as errors.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::EnrichmentUnavailable`] when any lookup call
    /// fails.
    pub async fn enrich(
        &self,
        ip_addresses: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, GeoEnrichment>, BatchError> {
        let addresses = ip_addresses.iter().cloned().collect::<Vec<_>>();
        let mut enrichments = BTreeMap::new();

        for (index, group) in addresses
            .chunks(self.config.effective_group_size())
            .enumerate()
        {
            if index > 0 {
                self.sleeper.sleep(self.config.delay).await;
            }

            let results = self.source.lookup_batch(group).await.map_err(|error| {
                warn!(group = index + 1, %error, "geolocation lookup failed");
                BatchError::from(error)
            })?;

            let mut resolved = 0_usize;
            for result in results {
                match result.outcome {
                    GeolocationOutcome::Success(enrichment) => {
                        resolved += 1;
                        enrichments.insert(result.ip_address, enrichment);
                    }
                    GeolocationOutcome::Failed { message } => {
                        debug!(
                            ip_address = %result.ip_address,
                            reason = message.as_deref().unwrap_or("unspecified"),
                            "address not resolved"
                        );
                    }
                }
            }
            info!(
                group = index + 1,
                requested = group.len(),
                resolved,
                "geolocation group fetched"
            );
        }

        Ok(enrichments)
    }
}

#[cfg(test)]
mod tests;
