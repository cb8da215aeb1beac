//! Internal Diesel row structs for the `users` table.
//!
//! These types are implementation details of the persistence layer and never
//! leave it. Conversions to and from the store port types live here.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::users;
use crate::domain::ports::{NewPersistedUser, PersistedUser, PersistedUserChanges};
use crate::domain::{Email, EmailValidationError, GeoEnrichment};

/// Row read from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub gender: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub password: Option<String>,
    pub status: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub isp_name: Option<String>,
    pub updated: bool,
    pub migrated_at: Option<DateTime<Utc>>,
}

impl UserRow {
    /// Convert into the port type, validating the stored email.
    pub(crate) fn into_persisted(self) -> Result<PersistedUser, EmailValidationError> {
        let email = Email::new(&self.email)?;
        let geolocation = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoEnrichment {
                latitude,
                longitude,
                country: self.country,
                region: self.region,
                city: self.city,
                timezone: self.timezone,
                isp_name: self.isp_name,
            }),
            _ => None,
        };
        Ok(PersistedUser {
            id: self.id,
            email,
            first_name: self.first_name,
            last_name: self.last_name,
            gender: self.gender,
            ip_address: self.ip_address,
            created_at: self.created_at,
            updated_at: self.updated_at,
            password: self.password,
            status: self.status,
            geolocation,
            updated: self.updated,
            migrated_at: self.migrated_at,
        })
    }
}

/// Geolocation columns as borrowed, nullable values.
#[derive(Debug, Clone, Copy, Default)]
struct GeoColumns<'a> {
    latitude: Option<f64>,
    longitude: Option<f64>,
    country: Option<&'a str>,
    region: Option<&'a str>,
    city: Option<&'a str>,
    timezone: Option<&'a str>,
    isp_name: Option<&'a str>,
}

impl<'a> From<Option<&'a GeoEnrichment>> for GeoColumns<'a> {
    fn from(geolocation: Option<&'a GeoEnrichment>) -> Self {
        geolocation.map_or_else(Self::default, |geo| Self {
            latitude: Some(geo.latitude),
            longitude: Some(geo.longitude),
            country: geo.country.as_deref(),
            region: geo.region.as_deref(),
            city: geo.city.as_deref(),
            timezone: geo.timezone.as_deref(),
            isp_name: geo.isp_name.as_deref(),
        })
    }
}

/// Insertable row for a new identity.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub email: &'a str,
    pub gender: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub password: Option<&'a str>,
    pub status: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country: Option<&'a str>,
    pub region: Option<&'a str>,
    pub city: Option<&'a str>,
    pub timezone: Option<&'a str>,
    pub isp_name: Option<&'a str>,
    pub updated: bool,
    pub migrated_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a NewPersistedUser> for NewUserRow<'a> {
    fn from(user: &'a NewPersistedUser) -> Self {
        let geo = GeoColumns::from(user.geolocation.as_ref());
        Self {
            first_name: user.first_name.as_deref(),
            last_name: user.last_name.as_deref(),
            email: user.email.as_ref(),
            gender: user.gender.as_deref(),
            ip_address: user.ip_address.as_deref(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            password: user.password.as_deref(),
            status: user.status,
            latitude: geo.latitude,
            longitude: geo.longitude,
            country: geo.country,
            region: geo.region,
            city: geo.city,
            timezone: geo.timezone,
            isp_name: geo.isp_name,
            updated: user.updated,
            migrated_at: user.migrated_at,
        }
    }
}

/// Changeset overwriting the mutable columns of an existing row.
///
/// `None` writes `NULL`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct UserChangeset<'a> {
    pub ip_address: Option<&'a str>,
    pub password: Option<&'a str>,
    pub status: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country: Option<&'a str>,
    pub region: Option<&'a str>,
    pub city: Option<&'a str>,
    pub timezone: Option<&'a str>,
    pub isp_name: Option<&'a str>,
    pub updated: bool,
    pub migrated_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a PersistedUserChanges> for UserChangeset<'a> {
    fn from(changes: &'a PersistedUserChanges) -> Self {
        let geo = GeoColumns::from(changes.geolocation.as_ref());
        Self {
            ip_address: changes.ip_address.as_deref(),
            password: changes.password.as_deref(),
            status: changes.status,
            latitude: geo.latitude,
            longitude: geo.longitude,
            country: geo.country,
            region: geo.region,
            city: geo.city,
            timezone: geo.timezone,
            isp_name: geo.isp_name,
            updated: true,
            migrated_at: changes.migrated_at,
        }
    }
}
