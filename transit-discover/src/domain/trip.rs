//! Trips, departures, and the stopovers they are made of.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::Stop;

/// A transit line (e.g. "S1", "ICE 707", "Bus 100").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Line {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl Line {
    /// Create a line known only by its name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The line name, or an empty string if the provider omitted it.
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// A vehicle calling at a stop.
///
/// Realtime times take precedence over planned ones; either may be absent
/// at the first and last stop of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stopover {
    pub stop: Stop,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure: Option<DateTime<FixedOffset>>,
}

impl Stopover {
    /// Create a stopover with the given times.
    pub fn new(
        stop: Stop,
        arrival: Option<DateTime<FixedOffset>>,
        departure: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            stop,
            arrival,
            departure,
        }
    }

    /// Instant the vehicle leaves this stop, falling back to its arrival.
    pub fn leaves_at(&self) -> Option<DateTime<FixedOffset>> {
        self.departure.or(self.arrival)
    }

    /// Instant the vehicle reaches this stop, falling back to its departure.
    pub fn reaches_at(&self) -> Option<DateTime<FixedOffset>> {
        self.arrival.or(self.departure)
    }
}

/// One scheduled run of a vehicle.
///
/// `stopovers` is `None` when the provider returned no stopover detail;
/// such trips contribute no edges or nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    #[serde(default)]
    pub line: Option<Line>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub stopovers: Option<Vec<Stopover>>,
}

/// A departure from a stop, as listed on a departure board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    pub trip_id: String,
    pub stop: Stop,
    #[serde(default)]
    pub line: Option<Line>,
    #[serde(default)]
    pub direction: Option<String>,
    /// Realtime departure, if known.
    #[serde(default)]
    pub when: Option<DateTime<FixedOffset>>,
    /// Scheduled departure.
    #[serde(default)]
    pub planned_when: Option<DateTime<FixedOffset>>,
}

impl Departure {
    /// Best known departure instant: realtime, then planned.
    pub fn departs_at(&self) -> Option<DateTime<FixedOffset>> {
        self.when.or(self.planned_when)
    }

    /// Line name, or an empty string.
    pub fn line_name(&self) -> &str {
        self.line.as_ref().map(Line::name_or_empty).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StopId;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn stop(id: &str) -> Stop {
        Stop::new(StopId::parse(id).unwrap(), id)
    }

    #[test]
    fn stopover_time_fallbacks() {
        let first = Stopover::new(stop("A"), None, Some(at("2024-03-18T10:00:00+01:00")));
        assert_eq!(first.leaves_at(), Some(at("2024-03-18T10:00:00+01:00")));
        assert_eq!(first.reaches_at(), Some(at("2024-03-18T10:00:00+01:00")));

        let middle = Stopover::new(
            stop("B"),
            Some(at("2024-03-18T10:05:00+01:00")),
            Some(at("2024-03-18T10:06:00+01:00")),
        );
        assert_eq!(middle.leaves_at(), Some(at("2024-03-18T10:06:00+01:00")));
        assert_eq!(middle.reaches_at(), Some(at("2024-03-18T10:05:00+01:00")));

        let unknown = Stopover::new(stop("C"), None, None);
        assert_eq!(unknown.leaves_at(), None);
        assert_eq!(unknown.reaches_at(), None);
    }

    #[test]
    fn departure_prefers_realtime() {
        let mut dep = Departure {
            trip_id: "t1".into(),
            stop: stop("A"),
            line: Some(Line::named("X1")),
            direction: Some("B-Town".into()),
            when: None,
            planned_when: Some(at("2024-03-18T10:00:00+01:00")),
        };
        assert_eq!(dep.departs_at(), Some(at("2024-03-18T10:00:00+01:00")));

        dep.when = Some(at("2024-03-18T10:02:00+01:00"));
        assert_eq!(dep.departs_at(), Some(at("2024-03-18T10:02:00+01:00")));
        assert_eq!(dep.line_name(), "X1");
    }

    #[test]
    fn missing_line_name_is_empty() {
        assert_eq!(Line::default().name_or_empty(), "");
    }
}
