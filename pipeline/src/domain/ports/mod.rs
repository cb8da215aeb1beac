//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod geolocation_source;
mod user_record_source;
mod user_store;

#[cfg(test)]
pub use geolocation_source::MockGeolocationSource;
pub use geolocation_source::{
    GEOLOCATION_BATCH_LIMIT, GeolocationOutcome, GeolocationResult, GeolocationSource,
    GeolocationSourceError,
};
#[cfg(test)]
pub use user_record_source::MockUserRecordSource;
pub use user_record_source::{RecordChunk, UserRecordSource, UserRecordSourceError};
#[cfg(test)]
pub use user_store::MockUserStore;
pub use user_store::{
    NewPersistedUser, PersistedUser, PersistedUserChanges, UserStore, UserStoreError,
};
