//! Units of scheduled work.

use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::domain::StopId;

/// One provider query waiting in, or running from, the work queue.
///
/// `hops` is the distance of the query's stop from the start of the crawl;
/// stops a task discovers are one hop further out.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// List departures at a stop.
    Departures { stop: StopId, hops: u32 },

    /// Fetch a trip seen on a departure board at `origin`.
    Trip {
        trip_id: String,
        line_name: String,
        direction: Option<String>,
        when: DateTime<FixedOffset>,
        origin: StopId,
        hops: u32,
    },

    /// Compute one journey from `origin` to `target`.
    Journeys {
        origin: StopId,
        target: StopId,
        when: DateTime<FixedOffset>,
        hops: u32,
    },
}

impl Task {
    pub fn hops(&self) -> u32 {
        match self {
            Task::Departures { hops, .. } | Task::Trip { hops, .. } | Task::Journeys { hops, .. } => {
                *hops
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Departures { .. } => "departures",
            Task::Trip { .. } => "trip",
            Task::Journeys { .. } => "journeys",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Departures { stop, .. } => write!(f, "departures({stop})"),
            Task::Trip {
                trip_id, line_name, ..
            } => write!(f, "trip({trip_id}, {line_name})"),
            Task::Journeys { origin, target, .. } => write!(f, "journeys({origin} -> {target})"),
        }
    }
}
