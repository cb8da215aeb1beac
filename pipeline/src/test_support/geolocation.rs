//! Shared doubles for geolocation enrichment tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{
    GeolocationOutcome, GeolocationResult, GeolocationSource, GeolocationSourceError,
};
use crate::domain::{EnrichmentSleeper, GeoEnrichment};

/// Geolocation source answering from a fixed table and recording each call.
///
/// Addresses without a scripted outcome come back as failed lookups.
#[derive(Default)]
pub struct ScriptedGeolocationSource {
    outcomes: BTreeMap<String, GeolocationOutcome>,
    failures: BTreeMap<usize, GeolocationSourceError>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedGeolocationSource {
    /// Resolve `ip_address` to `enrichment`.
    #[must_use]
    pub fn with_success(mut self, ip_address: &str, enrichment: GeoEnrichment) -> Self {
        self.outcomes.insert(
            ip_address.to_owned(),
            GeolocationOutcome::Success(enrichment),
        );
        self
    }

    /// Report `ip_address` as a failed lookup carrying `message`.
    #[must_use]
    pub fn with_failure(mut self, ip_address: &str, message: &str) -> Self {
        self.outcomes.insert(
            ip_address.to_owned(),
            GeolocationOutcome::Failed {
                message: Some(message.to_owned()),
            },
        );
        self
    }

    /// Fail the `call_number`th lookup (1-based) with `error`.
    #[must_use]
    pub fn failing_on_call(mut self, call_number: usize, error: GeolocationSourceError) -> Self {
        self.failures.insert(call_number, error);
        self
    }

    /// Address groups received so far, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.lock_calls().clone()
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<Vec<String>>> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("geolocation calls mutex"),
        }
    }
}

#[async_trait]
impl GeolocationSource for ScriptedGeolocationSource {
    async fn lookup_batch(
        &self,
        ip_addresses: &[String],
    ) -> Result<Vec<GeolocationResult>, GeolocationSourceError> {
        let call_number = {
            let mut calls = self.lock_calls();
            calls.push(ip_addresses.to_vec());
            calls.len()
        };
        if let Some(error) = self.failures.get(&call_number) {
            return Err(error.clone());
        }

        Ok(ip_addresses
            .iter()
            .map(|ip_address| GeolocationResult {
                ip_address: ip_address.clone(),
                outcome: self.outcomes.get(ip_address).cloned().unwrap_or(
                    GeolocationOutcome::Failed {
                        message: Some("reserved range".to_owned()),
                    },
                ),
            })
            .collect())
    }
}

/// Sleeper that returns at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl EnrichmentSleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sleeper that records each requested pause instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper(pub Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Pauses requested so far, in order.
    pub fn durations(&self) -> Vec<Duration> {
        match self.0.lock() {
            Ok(entries) => entries.clone(),
            Err(_) => panic!("sleeper mutex"),
        }
    }
}

#[async_trait]
impl EnrichmentSleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let mut entries = match self.0.lock() {
            Ok(entries) => entries,
            Err(_) => panic!("sleeper mutex"),
        };
        entries.push(duration);
    }
}
