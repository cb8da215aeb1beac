//! ip-api.com outbound adapters.
//!
//! This module provides a thin HTTP implementation of the
//! `GeolocationSource` port over the service's batch endpoint.

mod dto;
mod http_source;

pub use http_source::{DEFAULT_IP_API_ENDPOINT, IpApiHttpSource};
