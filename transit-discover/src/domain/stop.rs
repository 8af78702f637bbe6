//! Stop and station types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Line;

/// Error returned when a stop identifier is empty or contains only whitespace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stop id: {reason}")]
pub struct InvalidStopId {
    reason: &'static str,
}

/// A provider-defined stop or station identifier.
///
/// Identifiers are opaque strings; the only rule enforced here is that they
/// are non-empty and carry no surrounding whitespace.
///
/// # Examples
///
/// ```
/// use transit_discover::domain::StopId;
///
/// let id = StopId::parse("8011306").unwrap();
/// assert_eq!(id.as_str(), "8011306");
///
/// assert!(StopId::parse("").is_err());
/// assert!(StopId::parse("  ").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StopId(String);

impl StopId {
    /// Parse a stop id, trimming surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, InvalidStopId> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InvalidStopId {
                reason: "must not be empty",
            });
        }
        Ok(StopId(trimmed.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StopId {
    type Error = InvalidStopId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StopId::parse(&value)
    }
}

impl From<StopId> for String {
    fn from(id: StopId) -> Self {
        id.0
    }
}

impl fmt::Debug for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StopId({})", self.0)
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a location is an individual stop or a station grouping stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKind {
    Stop,
    Station,
}

/// Geographic position of a stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A stop or station as reported by the provider.
///
/// A stop may reference the station it belongs to. Stations never carry a
/// parent themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub id: StopId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<Box<Stop>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<Line>>,
}

impl Stop {
    /// Create a bare stop with the given id and name.
    pub fn new(id: StopId, name: impl Into<String>) -> Self {
        Self {
            kind: StopKind::Stop,
            id,
            name: Some(name.into()),
            location: None,
            station: None,
            lines: None,
        }
    }

    /// Create a bare station with the given id and name.
    pub fn station(id: StopId, name: impl Into<String>) -> Self {
        Self {
            kind: StopKind::Station,
            ..Self::new(id, name)
        }
    }

    /// Attach a parent station.
    pub fn with_parent(mut self, parent: Stop) -> Self {
        self.station = Some(Box::new(parent));
        self
    }

    /// The parent station, if this stop belongs to one.
    pub fn parent(&self) -> Option<&Stop> {
        self.station.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StopId {
        StopId::parse(s).unwrap()
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(id(" 900000007102 ").as_str(), "900000007102");
    }

    #[test]
    fn reject_empty() {
        assert!(StopId::parse("").is_err());
        assert!(StopId::parse("\t\n").is_err());
    }

    #[test]
    fn display_and_debug() {
        let stop_id = id("8011306");
        assert_eq!(stop_id.to_string(), "8011306");
        assert_eq!(format!("{:?}", stop_id), "StopId(8011306)");
    }

    #[test]
    fn stop_serializes_with_type_tag() {
        let stop = Stop::new(id("A1"), "Platform 1").with_parent(Stop::station(id("A"), "Alpha"));
        let json = serde_json::to_value(&stop).unwrap();

        assert_eq!(json["type"], "stop");
        assert_eq!(json["id"], "A1");
        assert_eq!(json["station"]["type"], "station");
        assert!(json.get("location").is_none());
    }

    #[test]
    fn empty_id_rejected_on_deserialize() {
        let result: Result<Stop, _> = serde_json::from_str(r#"{"type":"stop","id":""}"#);
        assert!(result.is_err());
    }

    #[test]
    fn parent_accessor() {
        let child = Stop::new(id("A1"), "Platform 1");
        assert!(child.parent().is_none());

        let child = child.with_parent(Stop::station(id("A"), "Alpha"));
        assert_eq!(child.parent().map(|p| p.id.as_str()), Some("A"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any id with visible characters survives a parse/as_str roundtrip
        #[test]
        fn roundtrip(s in "[A-Za-z0-9:_-]{1,24}") {
            let parsed = StopId::parse(&s).unwrap();
            prop_assert_eq!(parsed.as_str(), s.as_str());
        }

        /// Whitespace-only strings are always rejected
        #[test]
        fn whitespace_rejected(s in "[ \t\n]{0,8}") {
            prop_assert!(StopId::parse(&s).is_err());
        }
    }
}
