//! Reqwest-backed ip-api.com source adapter.
//!
//! This adapter owns transport details only: request serialisation, timeout and
//! HTTP error mapping, and JSON decoding into domain results.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use super::dto::{IpApiEntryDto, into_domain_results};
use crate::domain::ports::{
    GEOLOCATION_BATCH_LIMIT, GeolocationResult, GeolocationSource, GeolocationSourceError,
};

/// Public batch endpoint.
pub const DEFAULT_IP_API_ENDPOINT: &str = "http://ip-api.com/batch";

const RESPONSE_FIELDS: &str = "query,status,message,lat,lon,country,regionName,city,timezone,isp";
const DEFAULT_USER_AGENT: &str = "user-migration/0.1";

/// Geolocation adapter that POSTs address batches to one endpoint.
pub struct IpApiHttpSource {
    client: Client,
    endpoint: Url,
}

impl IpApiHttpSource {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    /// ```rust,ignore
    /// let endpoint = Url::parse(DEFAULT_IP_API_ENDPOINT)?;
    /// let source = IpApiHttpSource::new(endpoint, Duration::from_secs(30))?;
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client, endpoint })
    }

    fn request_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("fields", RESPONSE_FIELDS);
        url
    }
}

#[async_trait]
impl GeolocationSource for IpApiHttpSource {
    async fn lookup_batch(
        &self,
        ip_addresses: &[String],
    ) -> Result<Vec<GeolocationResult>, GeolocationSourceError> {
        validate_batch(ip_addresses)?;
        if ip_addresses.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.request_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(ip_addresses)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        parse_results(body.as_ref())
    }
}

fn validate_batch(ip_addresses: &[String]) -> Result<(), GeolocationSourceError> {
    if ip_addresses.len() > GEOLOCATION_BATCH_LIMIT {
        return Err(GeolocationSourceError::invalid_request(format!(
            "batch of {} addresses exceeds the limit of {GEOLOCATION_BATCH_LIMIT}",
            ip_addresses.len()
        )));
    }
    if ip_addresses.iter().any(|address| address.trim().is_empty()) {
        return Err(GeolocationSourceError::invalid_request(
            "addresses must not be blank",
        ));
    }
    Ok(())
}

fn parse_results(body: &[u8]) -> Result<Vec<GeolocationResult>, GeolocationSourceError> {
    let decoded: Vec<IpApiEntryDto> = serde_json::from_slice(body).map_err(|error| {
        GeolocationSourceError::decode(format!("invalid ip-api JSON payload: {error}"))
    })?;
    into_domain_results(decoded).map_err(GeolocationSourceError::decode)
}

fn map_transport_error(error: reqwest::Error) -> GeolocationSourceError {
    if error.is_timeout() {
        GeolocationSourceError::timeout(error.to_string())
    } else {
        GeolocationSourceError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GeolocationSourceError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => GeolocationSourceError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            GeolocationSourceError::timeout(message)
        }
        _ if status.is_client_error() => GeolocationSourceError::invalid_request(message),
        _ => GeolocationSourceError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
