//! Transit-data providers.
//!
//! The discovery engine talks to a provider through [`TransitProvider`],
//! which offers the four queries a HAFAS-style backend answers:
//!
//! - `locations`: free-text stop search
//! - `departures`: departure board of a stop
//! - `trip`: full stopover sequence of one vehicle run
//! - `journeys`: itineraries between two stops
//!
//! [`RestClient`] implements it over a hafas-rest-api HTTP endpoint and
//! [`FixtureProvider`] serves canned responses from a directory.

mod client;
mod convert;
mod error;
mod fixture;
mod profile;
mod types;

use std::future::Future;

use chrono::{DateTime, FixedOffset};

use crate::domain::{Departure, Journey, Stop, StopId, Trip};

pub use client::{RestClient, RestClientConfig};
pub use convert::ConversionError;
pub use error::ProviderError;
pub use fixture::FixtureProvider;
pub use profile::{Profile, ProfileError};

/// Options for a `locations` lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationsOptions {
    /// Maximum number of results.
    pub results: usize,
    /// Include addresses.
    pub addresses: bool,
    /// Include points of interest.
    pub poi: bool,
    /// Attach the lines serving each stop.
    pub lines_of_stops: bool,
}

impl Default for LocationsOptions {
    fn default() -> Self {
        Self {
            results: 3,
            addresses: false,
            poi: false,
            lines_of_stops: false,
        }
    }
}

/// Options for a `departures` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeparturesOptions {
    pub when: DateTime<FixedOffset>,
    /// Length of the departure window in minutes.
    pub duration_mins: u32,
    pub remarks: bool,
    /// Include departures at sub-stops of a station.
    pub sub_stops: bool,
    pub lines_of_stops: bool,
}

/// Options for a `trip` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripOptions {
    pub when: DateTime<FixedOffset>,
}

/// Options for a `journeys` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneysOptions {
    pub results: usize,
    pub departure: DateTime<FixedOffset>,
    pub stopovers: bool,
    pub start_with_walking: bool,
    pub remarks: bool,
    pub sub_stops: bool,
}

/// A source of transit data.
///
/// Implementations must be shareable across the tasks of a crawl; every
/// returned future must be `Send`.
pub trait TransitProvider: Send + Sync + 'static {
    /// Timezone and locale of the provider.
    fn profile(&self) -> &Profile;

    /// Search stops and stations by name.
    fn locations(
        &self,
        query: &str,
        options: &LocationsOptions,
    ) -> impl Future<Output = Result<Vec<Stop>, ProviderError>> + Send;

    /// List departures at a stop.
    fn departures(
        &self,
        stop: &StopId,
        options: &DeparturesOptions,
    ) -> impl Future<Output = Result<Vec<Departure>, ProviderError>> + Send;

    /// Fetch one trip with its stopovers.
    fn trip(
        &self,
        trip_id: &str,
        line_name: &str,
        options: &TripOptions,
    ) -> impl Future<Output = Result<Trip, ProviderError>> + Send;

    /// Compute journeys between two stops.
    fn journeys(
        &self,
        from: &StopId,
        to: &StopId,
        options: &JourneysOptions,
    ) -> impl Future<Output = Result<Vec<Journey>, ProviderError>> + Send;
}
