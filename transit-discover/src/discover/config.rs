//! Crawl configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use crate::domain::StopId;
use crate::provider::ProviderError;

use super::error::ConfigError;

/// Maps a raw provider id to the id used for deduplication.
pub type NormalizeId = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Decides whether a newly discovered stop at the given hop count gets its
/// own departures query.
pub type ShouldExpand = Arc<dyn Fn(&StopId, u32) -> bool + Send + Sync>;

/// Decides whether a flagged trip failure triggers the locations+journeys
/// fallback.
pub type FallbackOn = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

/// Configuration for one crawl.
#[derive(Clone)]
pub struct DiscoverConfig {
    /// Maximum number of provider queries in flight.
    pub concurrency: usize,

    /// Wall-clock budget of a single task, including its fallback call.
    pub timeout: Duration,

    /// Id normalization used by every identity comparison.
    pub normalize_id: NormalizeId,

    /// Reference departure time. `None` means 10:00 on Monday of next week
    /// in the provider's timezone.
    pub when: Option<DateTime<FixedOffset>>,

    /// Include sub-stops of a station in departure boards and journeys.
    pub sub_stops: bool,

    /// Attach line information to returned stops.
    pub lines_of_stops: bool,

    /// Depth/breadth gate for expanding new stops.
    pub should_expand: ShouldExpand,

    /// Which flagged trip failures fall back to locations+journeys.
    pub fallback_on: FallbackOn,

    /// Departure board window (minutes).
    pub departures_duration_mins: u32,

    /// Subtracted from a departure time before querying its trip.
    pub trip_lookback: chrono::Duration,

    /// Candidates requested from the locations fallback.
    pub locations_results: usize,

    /// Capacity of the event channel; a full channel pauses the crawl.
    pub channel_capacity: usize,
}

impl DiscoverConfig {
    /// Set the concurrency.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Set the per-task timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the id normalization function.
    pub fn with_normalize_id(
        mut self,
        normalize: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.normalize_id = Arc::new(normalize);
        self
    }

    /// Set the reference departure time.
    pub fn with_when(mut self, when: DateTime<FixedOffset>) -> Self {
        self.when = Some(when);
        self
    }

    /// Include or exclude sub-stops.
    pub fn with_sub_stops(mut self, sub_stops: bool) -> Self {
        self.sub_stops = sub_stops;
        self
    }

    /// Include or exclude lines of stops.
    pub fn with_lines_of_stops(mut self, lines: bool) -> Self {
        self.lines_of_stops = lines;
        self
    }

    /// Set the expansion gate.
    pub fn with_should_expand(
        mut self,
        gate: impl Fn(&StopId, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_expand = Arc::new(gate);
        self
    }

    /// Only expand stops up to `max_hops` away from the start.
    pub fn with_max_hops(self, max_hops: u32) -> Self {
        self.with_should_expand(move |_, hops| hops <= max_hops)
    }

    /// Set the fallback trigger.
    pub fn with_fallback_on(
        mut self,
        trigger: impl Fn(&ProviderError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fallback_on = Arc::new(trigger);
        self
    }

    /// Set the event channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Check the configuration once, before a crawl starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        if self.locations_results == 0 {
            return Err(ConfigError::ZeroLocationsResults);
        }
        if self.trip_lookback < chrono::Duration::zero() {
            return Err(ConfigError::NegativeLookback);
        }
        Ok(())
    }

    /// Canonical form of a stop id. Falls back to the raw id if the
    /// normalization yields an empty string.
    pub fn canonical(&self, id: &StopId) -> StopId {
        StopId::parse(&(self.normalize_id)(id.as_str())).unwrap_or_else(|_| id.clone())
    }
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            timeout: Duration::from_secs(10),
            normalize_id: Arc::new(|id: &str| id.to_string()),
            when: None,
            sub_stops: true,
            lines_of_stops: false,
            should_expand: Arc::new(|_: &StopId, _: u32| true),
            fallback_on: Arc::new(|_: &ProviderError| true),
            departures_duration_mins: 60,
            trip_lookback: chrono::Duration::minutes(2),
            locations_results: 3,
            channel_capacity: 256,
        }
    }
}

impl fmt::Debug for DiscoverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoverConfig")
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("when", &self.when)
            .field("sub_stops", &self.sub_stops)
            .field("lines_of_stops", &self.lines_of_stops)
            .field("departures_duration_mins", &self.departures_duration_mins)
            .field("trip_lookback", &self.trip_lookback)
            .field("locations_results", &self.locations_results)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StopId {
        StopId::parse(s).unwrap()
    }

    #[test]
    fn default_config() {
        let config = DiscoverConfig::default();

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.when.is_none());
        assert!(config.sub_stops);
        assert!(!config.lines_of_stops);
        assert_eq!(config.departures_duration_mins, 60);
        assert_eq!(config.trip_lookback, chrono::Duration::minutes(2));
        assert_eq!(config.locations_results, 3);
        assert!((config.should_expand)(&id("A"), 1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let config = DiscoverConfig::default()
            .with_concurrency(8)
            .with_timeout(Duration::from_secs(3))
            .with_max_hops(2)
            .with_channel_capacity(4);

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.channel_capacity, 4);
        assert!((config.should_expand)(&id("A"), 2));
        assert!(!(config.should_expand)(&id("A"), 3));
    }

    #[test]
    fn validate_rejects_zero_values() {
        let zero_concurrency = DiscoverConfig::default().with_concurrency(0);
        assert_eq!(
            zero_concurrency.validate(),
            Err(ConfigError::ZeroConcurrency)
        );

        let zero_timeout = DiscoverConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(zero_timeout.validate(), Err(ConfigError::ZeroTimeout));

        let zero_capacity = DiscoverConfig::default().with_channel_capacity(0);
        assert_eq!(
            zero_capacity.validate(),
            Err(ConfigError::ZeroChannelCapacity)
        );
    }

    #[test]
    fn canonical_uses_normalization() {
        let config = DiscoverConfig::default()
            .with_normalize_id(|raw| raw.trim_start_matches("de:").to_string());

        assert_eq!(config.canonical(&id("de:8011306")), id("8011306"));
        assert_eq!(config.canonical(&id("8011306")), id("8011306"));
    }

    #[test]
    fn canonical_falls_back_on_empty_result() {
        let config = DiscoverConfig::default().with_normalize_id(|_| String::new());
        assert_eq!(config.canonical(&id("A")), id("A"));
    }
}
