//! In-flight user records and the values they are built from.
//!
//! Purpose: carry one extracted CSV row through normalisation, deduplication,
//! classification, and enrichment. Raw rows stay stringly typed until
//! [`UserRecord::from_raw`] validates them; everything downstream works with
//! typed values.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Canonical field names shared by the column mapping and the reconciler.
pub mod field {
    /// Email identity column.
    pub const EMAIL: &str = "email";
    /// Given name column.
    pub const FIRST_NAME: &str = "first_name";
    /// Family name column.
    pub const LAST_NAME: &str = "last_name";
    /// Free-form gender column.
    pub const GENDER: &str = "gender";
    /// IPv4 or IPv6 address column.
    pub const IP_ADDRESS: &str = "ip_address";
    /// Source record creation date.
    pub const CREATED_AT: &str = "created_at";
    /// Source record modification date.
    pub const UPDATED_AT: &str = "updated_at";
    /// Password hash column.
    pub const PASSWORD: &str = "password";
    /// Active-status flag column.
    pub const STATUS: &str = "status";

    /// Every canonical field understood by the pipeline.
    pub const ALL: [&str; 9] = [
        EMAIL, FIRST_NAME, LAST_NAME, GENDER, IP_ADDRESS, CREATED_AT, UPDATED_AT, PASSWORD, STATUS,
    ];

    /// Return true when `name` is a canonical field.
    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Maximum accepted email length, matching the store column.
pub const EMAIL_MAX: usize = 320;

/// Validation errors returned by [`Email::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailValidationError {
    /// The value was empty once trimmed.
    #[error("email must not be empty")]
    Empty,
    /// The value exceeded [`EMAIL_MAX`] characters.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// The value was not shaped like `local@domain`.
    #[error("email must contain a single '@' between non-empty parts")]
    Malformed,
}

/// User identity: a trimmed email address.
///
/// Ordering is lexical on the trimmed value, which is what deduplication
/// sorts by.
///
/// # Examples
/// ```
/// use user_migration::domain::Email;
///
/// let email = Email::new("  ada@example.com ").expect("valid email");
/// assert_eq!(email.as_ref(), "ada@example.com");
/// assert!(Email::new("not-an-email").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Email(String);

impl Email {
    /// Validate and construct an [`Email`].
    pub fn new(raw: impl AsRef<str>) -> Result<Self, EmailValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(EmailValidationError::Empty);
        }
        if trimmed.chars().count() > EMAIL_MAX {
            return Err(EmailValidationError::TooLong { max: EMAIL_MAX });
        }
        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(EmailValidationError::Malformed);
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(EmailValidationError::Malformed);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geolocation and ISP attributes resolved for one IP address.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoEnrichment {
    /// Latitude in WGS84.
    pub latitude: f64,
    /// Longitude in WGS84.
    pub longitude: f64,
    /// Country name.
    pub country: Option<String>,
    /// Region or state name.
    pub region: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// IANA timezone identifier.
    pub timezone: Option<String>,
    /// Internet service provider name.
    pub isp_name: Option<String>,
}

/// One extracted row keyed by canonical field name.
///
/// Blank values are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawUserRow {
    position: u64,
    fields: BTreeMap<String, String>,
}

impl RawUserRow {
    /// Create an empty row at `position` within its source.
    pub fn new(position: u64) -> Self {
        Self {
            position,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a field value, replacing any previous one.
    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_owned(), value.into());
    }

    /// Return the trimmed value of `field`, or `None` when missing or blank.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Zero-based row position in the originating source.
    pub fn position(&self) -> u64 {
        self.position
    }
}

/// Reasons a raw row cannot become a [`UserRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordValidationError {
    /// A required field was missing or blank.
    #[error("required field '{field}' is missing")]
    MissingField {
        /// Canonical field name.
        field: &'static str,
    },
    /// The identity column did not hold a usable email.
    #[error("invalid email '{value}': {reason}")]
    InvalidEmail {
        /// Raw column value.
        value: String,
        /// Validation failure.
        reason: EmailValidationError,
    },
    /// A date-like field could not be parsed.
    #[error("field '{field}' holds an unrecognised timestamp '{value}'")]
    InvalidTimestamp {
        /// Canonical field name.
        field: &'static str,
        /// Raw column value.
        value: String,
    },
    /// The status flag was not a recognised boolean spelling.
    #[error("field 'status' holds an unrecognised flag '{value}'")]
    InvalidStatus {
        /// Raw column value.
        value: String,
    },
}

/// A normalised user record moving through one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    /// Identity.
    pub email: Email,
    /// Given name, written on insert only.
    pub first_name: Option<String>,
    /// Family name, written on insert only.
    pub last_name: Option<String>,
    /// Gender, written on insert only.
    pub gender: Option<String>,
    /// Source IP address used for enrichment.
    pub ip_address: Option<String>,
    /// Password hash.
    pub password: Option<String>,
    /// Active-status flag.
    pub status: Option<bool>,
    /// Source creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Source modification timestamp; drives deduplication.
    pub updated_at: DateTime<Utc>,
    /// Enrichment joined on `ip_address`, if any.
    pub geolocation: Option<GeoEnrichment>,
    /// Whether the identity already exists in the store.
    pub exists_in_store: bool,
    /// Pipeline run timestamp.
    pub migrated_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Normalise a raw row.
    ///
    /// `updated_at` falls back to `created_at` when the source has no
    /// modification column.
    ///
    /// # Examples
    /// ```
    /// use user_migration::domain::{RawUserRow, UserRecord};
    ///
    /// let row = RawUserRow::new(0)
    ///     .with("email", "ada@example.com")
    ///     .with("created_at", "2023-04-01")
    ///     .with("status", "true");
    /// let record = UserRecord::from_raw(&row).expect("valid row");
    /// assert_eq!(record.status, Some(true));
    /// assert_eq!(record.updated_at, record.created_at.expect("created_at"));
    /// ```
    pub fn from_raw(row: &RawUserRow) -> Result<Self, RecordValidationError> {
        let raw_email = row.get(field::EMAIL).ok_or(RecordValidationError::MissingField {
            field: field::EMAIL,
        })?;
        let email = Email::new(raw_email).map_err(|reason| RecordValidationError::InvalidEmail {
            value: raw_email.to_owned(),
            reason,
        })?;

        let created_at = optional_timestamp(row, field::CREATED_AT)?;
        let updated_at = optional_timestamp(row, field::UPDATED_AT)?
            .or(created_at)
            .ok_or(RecordValidationError::MissingField {
                field: field::UPDATED_AT,
            })?;

        let status = row
            .get(field::STATUS)
            .map(|value| {
                parse_status(value).ok_or_else(|| RecordValidationError::InvalidStatus {
                    value: value.to_owned(),
                })
            })
            .transpose()?;

        Ok(Self {
            email,
            first_name: owned(row, field::FIRST_NAME),
            last_name: owned(row, field::LAST_NAME),
            gender: owned(row, field::GENDER),
            ip_address: owned(row, field::IP_ADDRESS),
            password: owned(row, field::PASSWORD),
            status,
            created_at,
            updated_at,
            geolocation: None,
            exists_in_store: false,
            migrated_at: None,
        })
    }
}

fn owned(row: &RawUserRow, name: &str) -> Option<String> {
    row.get(name).map(str::to_owned)
}

fn optional_timestamp(
    row: &RawUserRow,
    name: &'static str,
) -> Result<Option<DateTime<Utc>>, RecordValidationError> {
    row.get(name)
        .map(|value| {
            parse_timestamp(value).ok_or_else(|| RecordValidationError::InvalidTimestamp {
                field: name,
                value: value.to_owned(),
            })
        })
        .transpose()
}

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a date-like value into a UTC timestamp.
///
/// Accepts RFC 3339, naive date-times, and plain dates (interpreted as
/// midnight UTC).
///
/// # Examples
/// ```
/// use user_migration::domain::parse_timestamp;
///
/// assert!(parse_timestamp("2024-02-29T10:15:00Z").is_some());
/// assert!(parse_timestamp("02/29/2024").is_some());
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Some(naive.and_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_status(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
