//! Caching layer for provider responses.
//!
//! During a crawl, the trip fallback looks up the direction label of every
//! flagged trip. Many trips share a direction, so `locations` results are
//! memoized. The other queries are unique per crawl by construction and
//! pass straight through.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::domain::{Departure, Journey, Stop, StopId, Trip};
use crate::provider::{
    DeparturesOptions, JourneysOptions, LocationsOptions, Profile, ProviderError,
    TransitProvider, TripOptions,
};

/// Cache key for location lookups: (query, results, lines of stops).
type LocationsKey = (String, usize, bool);

/// Cached location lookup.
type LocationsEntry = Arc<Vec<Stop>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            max_capacity: 10_000,
        }
    }
}

/// Provider wrapper that caches `locations` lookups.
pub struct CachedProvider<P> {
    inner: P,
    locations: MokaCache<LocationsKey, LocationsEntry>,
}

impl<P: TransitProvider> CachedProvider<P> {
    /// Wrap a provider.
    pub fn new(inner: P, config: &CacheConfig) -> Self {
        let locations = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { inner, locations }
    }

    /// Access the underlying provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of cached location lookups.
    pub fn cache_entry_count(&self) -> u64 {
        self.locations.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_cache(&self) {
        self.locations.invalidate_all();
    }
}

impl<P: TransitProvider> TransitProvider for CachedProvider<P> {
    fn profile(&self) -> &Profile {
        self.inner.profile()
    }

    async fn locations(
        &self,
        query: &str,
        options: &LocationsOptions,
    ) -> Result<Vec<Stop>, ProviderError> {
        let key = (query.to_string(), options.results, options.lines_of_stops);

        if let Some(cached) = self.locations.get(&key).await {
            return Ok(cached.as_ref().clone());
        }

        // Errors are not cached
        let stops = self.inner.locations(query, options).await?;
        self.locations.insert(key, Arc::new(stops.clone())).await;

        Ok(stops)
    }

    async fn departures(
        &self,
        stop: &StopId,
        options: &DeparturesOptions,
    ) -> Result<Vec<Departure>, ProviderError> {
        self.inner.departures(stop, options).await
    }

    async fn trip(
        &self,
        trip_id: &str,
        line_name: &str,
        options: &TripOptions,
    ) -> Result<Trip, ProviderError> {
        self.inner.trip(trip_id, line_name, options).await
    }

    async fn journeys(
        &self,
        from: &StopId,
        to: &StopId,
        options: &JourneysOptions,
    ) -> Result<Vec<Journey>, ProviderError> {
        self.inner.journeys(from, to, options).await
    }
}
