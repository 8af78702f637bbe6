//! Travel-time edges between consecutive stops.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{Line, Stop};

/// Two consecutive stops on a run, the time it takes to travel between
/// them, and the line that connects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: Stop,
    pub target: Stop,
    /// Travel time in milliseconds.
    pub duration_ms: i64,
    pub line: Line,
}

impl Edge {
    /// Create an edge from a chrono duration.
    pub fn new(source: Stop, target: Stop, duration: Duration, line: Line) -> Self {
        Self {
            source,
            target,
            duration_ms: duration.num_milliseconds(),
            line,
        }
    }

    /// The travel time as a chrono duration.
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StopId;

    #[test]
    fn duration_roundtrip() {
        let a = Stop::new(StopId::parse("A").unwrap(), "Alpha");
        let b = Stop::new(StopId::parse("B").unwrap(), "Beta");
        let edge = Edge::new(a, b, Duration::minutes(5), Line::named("X1"));

        assert_eq!(edge.duration_ms, 300_000);
        assert_eq!(edge.duration(), Duration::minutes(5));
    }
}
