//! Network discovery.
//!
//! Starting from one stop, the crawl repeatedly asks the provider for
//! departures, follows every departing trip along its stopovers, and queues
//! departures for each stop it has not seen before. Every stop and every
//! edge between consecutive stopovers is reported once.
//!
//! When a trip lookup fails with a provider-flagged error, the trip's
//! direction label is resolved through `locations` and a single journey is
//! computed from the departure stop to each candidate. The stopovers of that
//! journey stand in for the missing trip.
//!
//! Queries run concurrently up to [`DiscoverConfig::concurrency`]; results
//! are processed one at a time by a single driver task.

mod config;
mod engine;
mod error;
mod queue;
mod stats;
mod strategy;
mod stream;
mod task;
mod visited;

pub use config::{DiscoverConfig, FallbackOn, NormalizeId, ShouldExpand};
pub use engine::{Crawl, Discoverer};
pub use error::{ConfigError, DiscoverError};
pub use stats::Stats;
pub use stream::{Controller, Discovery, DiscoveryEvent};
