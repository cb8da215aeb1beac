//! DTOs for decoding ip-api.com batch responses.
//!
//! The adapter decodes into these transport DTOs first, then maps each entry
//! into a domain `GeolocationResult` in one pass.

use serde::Deserialize;

use crate::domain::GeoEnrichment;
use crate::domain::ports::GeolocationResult;

const STATUS_SUCCESS: &str = "success";
const STATUS_FAIL: &str = "fail";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IpApiEntryDto {
    pub(super) query: String,
    pub(super) status: String,
    pub(super) message: Option<String>,
    pub(super) lat: Option<f64>,
    pub(super) lon: Option<f64>,
    pub(super) country: Option<String>,
    pub(super) region_name: Option<String>,
    pub(super) city: Option<String>,
    pub(super) timezone: Option<String>,
    pub(super) isp: Option<String>,
}

pub(super) fn into_domain_results(
    entries: Vec<IpApiEntryDto>,
) -> Result<Vec<GeolocationResult>, String> {
    entries
        .into_iter()
        .map(IpApiEntryDto::into_domain_result)
        .collect()
}

impl IpApiEntryDto {
    fn into_domain_result(self) -> Result<GeolocationResult, String> {
        match self.status.as_str() {
            STATUS_SUCCESS => {
                let (Some(latitude), Some(longitude)) = (self.lat, self.lon) else {
                    return Err(format!(
                        "address {} reported success without coordinates",
                        self.query
                    ));
                };
                if !latitude.is_finite() || !longitude.is_finite() {
                    return Err(format!(
                        "address {} includes non-finite coordinates",
                        self.query
                    ));
                }
                Ok(GeolocationResult::success(
                    self.query,
                    GeoEnrichment {
                        latitude,
                        longitude,
                        country: non_blank(self.country),
                        region: non_blank(self.region_name),
                        city: non_blank(self.city),
                        timezone: non_blank(self.timezone),
                        isp_name: non_blank(self.isp),
                    },
                ))
            }
            STATUS_FAIL => Ok(GeolocationResult::failed(
                self.query,
                non_blank(self.message),
            )),
            other => {
                let message = non_blank(self.message)
                    .unwrap_or_else(|| format!("unexpected status '{other}'"));
                Ok(GeolocationResult::failed(self.query, Some(message)))
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
