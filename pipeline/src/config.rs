//! Runtime settings loaded via OrthoConfig.
//!
//! Every value is optional; accessors fall back to the documented defaults.
//! Environment variables use the `USER_MIGRATION_` prefix, for example
//! `USER_MIGRATION_GEOLOCATION_DELAY_MS=4000`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::{DEFAULT_GEOLOCATION_DELAY, GeolocationEnricherConfig};
use crate::domain::ports::GEOLOCATION_BATCH_LIMIT;
use crate::outbound::ip_api::DEFAULT_IP_API_ENDPOINT;

const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Settings controlling the migration run.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "USER_MIGRATION")]
pub struct MigrationSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// ip-api.com batch endpoint.
    pub geolocation_endpoint: Option<String>,
    /// Addresses per geolocation call.
    pub geolocation_group_size: Option<usize>,
    /// Pause between geolocation calls, in milliseconds.
    pub geolocation_delay_ms: Option<u64>,
    /// Per-request geolocation timeout, in seconds.
    pub geolocation_timeout_secs: Option<u64>,
    /// `json` or `text`.
    pub log_format: Option<String>,
}

impl MigrationSettings {
    /// Configured database URL, ignoring blank values.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Geolocation endpoint, defaulting to the public batch endpoint.
    ///
    /// # Errors
    ///
    /// Returns the parse error when the configured value is not a URL.
    pub fn geolocation_endpoint(&self) -> Result<Url, url::ParseError> {
        Url::parse(
            self.geolocation_endpoint
                .as_deref()
                .unwrap_or(DEFAULT_IP_API_ENDPOINT),
        )
    }

    /// Addresses per call, clamped to the service limit.
    pub fn geolocation_group_size(&self) -> usize {
        self.geolocation_group_size
            .unwrap_or(GEOLOCATION_BATCH_LIMIT)
            .clamp(1, GEOLOCATION_BATCH_LIMIT)
    }

    /// Pause between geolocation calls, defaulting to four seconds.
    pub fn geolocation_delay(&self) -> Duration {
        self.geolocation_delay_ms
            .map_or(DEFAULT_GEOLOCATION_DELAY, Duration::from_millis)
    }

    /// Per-request geolocation timeout, defaulting to thirty seconds.
    pub fn geolocation_timeout(&self) -> Duration {
        self.geolocation_timeout_secs
            .map_or(DEFAULT_GEOLOCATION_TIMEOUT, Duration::from_secs)
    }

    /// Log format; anything other than `json` selects text.
    pub fn log_format(&self) -> LogFormat {
        match self.log_format.as_deref().map(str::trim) {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    /// Enricher grouping and pacing derived from these settings.
    pub fn enricher_config(&self) -> GeolocationEnricherConfig {
        GeolocationEnricherConfig {
            group_size: self.geolocation_group_size(),
            delay: self.geolocation_delay(),
        }
    }
}
