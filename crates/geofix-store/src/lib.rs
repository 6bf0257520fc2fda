//! Persistence for GeoFix: the single auto location record, the weather
//! cache rows keyed to it, and the retry state that must survive restarts.

pub mod status;
pub mod store;

pub use status::{SourceKind, SourceStatus};
pub use store::{AutoLocationRecord, LocationStore, RetryState};
