//! Query strategies: how each task talks to the provider, and how responses
//! are broken down into edges and stops.
//!
//! Running a task only performs provider calls. Everything that touches
//! crawl state (dedup, scheduling, emission) happens in the engine once the
//! task's future has resolved.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::domain::{Departure, Edge, Journey, Line, Stop, Stopover, Trip};
use crate::provider::{
    DeparturesOptions, JourneysOptions, LocationsOptions, ProviderError, TransitProvider,
    TripOptions,
};

use super::config::DiscoverConfig;
use super::stats::RequestCounter;
use super::task::Task;

/// Line name sent to the trip endpoint when the departure carried none.
const PLACEHOLDER_LINE_NAME: &str = "-";

/// Configuration resolved for one crawl.
pub struct Plan {
    pub config: DiscoverConfig,
    /// Reference departure time.
    pub when: DateTime<FixedOffset>,
}

/// What the provider said.
#[derive(Debug)]
pub enum Response {
    Departures(Vec<Departure>),
    Trip(Trip),
    /// The trip lookup failed with a flagged error; these are the stops the
    /// direction label resolved to.
    TripFallback {
        cause: ProviderError,
        candidates: Vec<Stop>,
    },
    Journeys(Vec<Journey>),
}

/// Result of running one task.
#[derive(Debug)]
pub struct Outcome {
    pub task: Task,
    /// Wall-clock duration of each provider call made.
    pub requests: Vec<Duration>,
    pub result: Result<Response, ProviderError>,
}

/// Run one task against the provider. Each call is counted on `issued`
/// before it is sent.
pub async fn run<P: TransitProvider>(
    provider: Arc<P>,
    plan: Arc<Plan>,
    issued: RequestCounter,
    task: Task,
) -> Outcome {
    let mut requests = Vec::new();
    let result = match &task {
        Task::Departures { stop, .. } => {
            let options = DeparturesOptions {
                when: plan.when,
                duration_mins: plan.config.departures_duration_mins,
                remarks: false,
                sub_stops: plan.config.sub_stops,
                lines_of_stops: plan.config.lines_of_stops,
            };
            issued.issue();
            let started = Instant::now();
            let result = provider.departures(stop, &options).await;
            requests.push(started.elapsed());
            result.map(Response::Departures)
        }

        Task::Trip {
            trip_id,
            line_name,
            direction,
            when,
            ..
        } => {
            let line_name = if line_name.is_empty() {
                PLACEHOLDER_LINE_NAME
            } else {
                line_name.as_str()
            };
            issued.issue();
            let started = Instant::now();
            let result = provider
                .trip(trip_id, line_name, &TripOptions { when: *when })
                .await;
            requests.push(started.elapsed());

            match (result, direction) {
                (Ok(trip), _) => Ok(Response::Trip(trip)),
                (Err(cause), Some(direction))
                    if cause.is_flagged() && (plan.config.fallback_on)(&cause) =>
                {
                    debug!(
                        trip_id = %trip_id,
                        direction = %direction,
                        error = %cause,
                        "trip lookup flagged, falling back to locations + journeys"
                    );
                    let options = LocationsOptions {
                        results: plan.config.locations_results,
                        addresses: false,
                        poi: false,
                        lines_of_stops: plan.config.lines_of_stops,
                    };
                    issued.issue();
                    let started = Instant::now();
                    let candidates = provider.locations(direction, &options).await;
                    requests.push(started.elapsed());
                    candidates.map(|candidates| Response::TripFallback { cause, candidates })
                }
                (Err(err), _) => Err(err),
            }
        }

        Task::Journeys {
            origin,
            target,
            when,
            ..
        } => {
            let options = JourneysOptions {
                results: 1,
                departure: *when,
                stopovers: true,
                start_with_walking: false,
                remarks: false,
                sub_stops: plan.config.sub_stops,
            };
            issued.issue();
            let started = Instant::now();
            let result = provider.journeys(origin, target, &options).await;
            requests.push(started.elapsed());
            result.map(Response::Journeys)
        }
    };

    Outcome {
        task,
        requests,
        result,
    }
}

/// Edges between consecutive stopovers, and every stopover's stop.
///
/// The duration of an edge is the difference between the vehicle reaching
/// each stop (arrival, else departure), so a dwell at the first stop counts
/// towards the edge. Pairs missing either instant yield no edge. A missing
/// stopover sequence yields nothing.
pub fn extract(stopovers: Option<&[Stopover]>, line: Option<&Line>) -> (Vec<Edge>, Vec<Stop>) {
    let Some(stopovers) = stopovers else {
        return (Vec::new(), Vec::new());
    };
    let line = line.cloned().unwrap_or_default();

    let edges = stopovers
        .windows(2)
        .filter_map(|pair| {
            let start = pair[0].reaches_at()?;
            let end = pair[1].reaches_at()?;
            Some(Edge::new(
                pair[0].stop.clone(),
                pair[1].stop.clone(),
                end.signed_duration_since(start),
                line.clone(),
            ))
        })
        .collect();
    let stops = stopovers.iter().map(|s| s.stop.clone()).collect();

    (edges, stops)
}
