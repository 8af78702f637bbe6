//! Fixture provider for running without network access.
//!
//! Loads canned responses from a directory and serves them as if they were
//! live API responses. Layout:
//!
//! ```text
//! <dir>/locations.json                  {"<query>": [location, ...], ...}
//! <dir>/departures/<stop id>.json       departures response
//! <dir>/trips/<trip id>.json            trip response
//! <dir>/journeys/<from>--<to>.json      journeys response
//! ```
//!
//! Characters outside `[A-Za-z0-9._-]` in ids are replaced by `_` in file
//! names. Any file whose body is an object with `"isHafasError": true` is
//! served as a flagged error. A stop, query or pair without a file has an
//! empty result; a trip without a file is not found.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{Departure, Journey, Stop, StopId, Trip};

use super::convert::{convert_departures, convert_journeys, convert_locations, convert_trip};
use super::error::ProviderError;
use super::profile::Profile;
use super::types::{DeparturesResponse, ErrorBody, JourneysResponse, LocationDto, TripResponse};
use super::{DeparturesOptions, JourneysOptions, LocationsOptions, TransitProvider, TripOptions};

/// Provider serving responses from JSON files.
#[derive(Debug, Clone)]
pub struct FixtureProvider {
    profile: Profile,
    locations: Arc<HashMap<String, Value>>,
    departures: Arc<HashMap<String, Value>>,
    trips: Arc<HashMap<String, Value>>,
    journeys: Arc<HashMap<String, Value>>,
}

impl FixtureProvider {
    /// Load all fixtures from `data_dir`.
    ///
    /// Missing subdirectories are treated as empty.
    pub fn new(data_dir: impl AsRef<Path>, profile: Profile) -> Result<Self, ProviderError> {
        let data_dir = data_dir.as_ref();

        let locations = match read_json(&data_dir.join("locations.json")) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            Ok(_) => {
                return Err(fixture_error(format!(
                    "{:?} must contain an object keyed by query",
                    data_dir.join("locations.json")
                )));
            }
            Err(_) if !data_dir.join("locations.json").exists() => HashMap::new(),
            Err(e) => return Err(e),
        };

        Ok(Self {
            profile,
            locations: Arc::new(locations),
            departures: Arc::new(read_dir(&data_dir.join("departures"))?),
            trips: Arc::new(read_dir(&data_dir.join("trips"))?),
            journeys: Arc::new(read_dir(&data_dir.join("journeys"))?),
        })
    }

    /// Number of departure boards loaded.
    pub fn departure_boards(&self) -> usize {
        self.departures.len()
    }
}

/// File stem used for an id.
pub fn file_key(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn fixture_error(message: String) -> ProviderError {
    ProviderError::Api { status: 0, message }
}

fn read_json(path: &Path) -> Result<Value, ProviderError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| fixture_error(format!("Failed to read {:?}: {}", path, e)))?;
    serde_json::from_str(&json).map_err(|e| ProviderError::Json {
        message: format!("Failed to parse {:?}: {}", path, e),
        body: None,
    })
}

fn read_dir(dir: &Path) -> Result<HashMap<String, Value>, ProviderError> {
    let mut fixtures = HashMap::new();
    if !dir.is_dir() {
        return Ok(fixtures);
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| fixture_error(format!("Failed to read fixture directory: {}", e)))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| fixture_error(format!("Failed to read directory entry: {}", e)))?;

        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| fixture_error(format!("Invalid filename: {:?}", path)))?;

        fixtures.insert(stem.to_string(), read_json(&path)?);
    }

    Ok(fixtures)
}

/// Decode a fixture, serving flagged error bodies as errors.
fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, ProviderError> {
    if let Ok(err) = serde_json::from_value::<ErrorBody>(value.clone()) {
        if err.is_hafas_error == Some(true) {
            return Err(ProviderError::Flagged {
                code: err
                    .hafas_code
                    .or(err.code)
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
                message: err.message.unwrap_or_default(),
            });
        }
    }

    serde_json::from_value(value.clone()).map_err(|e| ProviderError::Json {
        message: e.to_string(),
        body: Some(value.to_string().chars().take(500).collect()),
    })
}

fn lookup<'a>(
    fixtures: &'a HashMap<String, Value>,
    key: &str,
    what: &str,
) -> Result<&'a Value, ProviderError> {
    fixtures
        .get(key)
        .ok_or_else(|| ProviderError::NotFound(format!("no fixture for {what} {key}")))
}

impl TransitProvider for FixtureProvider {
    fn profile(&self) -> &Profile {
        &self.profile
    }

    async fn locations(
        &self,
        query: &str,
        options: &LocationsOptions,
    ) -> Result<Vec<Stop>, ProviderError> {
        let Some(value) = self.locations.get(query) else {
            return Ok(Vec::new());
        };
        let dtos: Vec<LocationDto> = decode(value)?;
        let mut stops = convert_locations(&dtos);
        stops.truncate(options.results);
        Ok(stops)
    }

    async fn departures(
        &self,
        stop: &StopId,
        _options: &DeparturesOptions,
    ) -> Result<Vec<Departure>, ProviderError> {
        let Some(value) = self.departures.get(&file_key(stop.as_str())) else {
            return Ok(Vec::new());
        };
        let response: DeparturesResponse = decode(value)?;
        Ok(convert_departures(&response.into_departures())?)
    }

    async fn trip(
        &self,
        trip_id: &str,
        _line_name: &str,
        _options: &TripOptions,
    ) -> Result<Trip, ProviderError> {
        let value = lookup(&self.trips, &file_key(trip_id), "trip")?;
        let response: TripResponse = decode(value)?;
        Ok(convert_trip(&response.into_trip(), trip_id)?)
    }

    async fn journeys(
        &self,
        from: &StopId,
        to: &StopId,
        options: &JourneysOptions,
    ) -> Result<Vec<Journey>, ProviderError> {
        let key = format!("{}--{}", file_key(from.as_str()), file_key(to.as_str()));
        let Some(value) = self.journeys.get(&key) else {
            return Ok(Vec::new());
        };
        let response: JourneysResponse = decode(value)?;
        let mut journeys = convert_journeys(&response.into_journeys())?;
        journeys.truncate(options.results);
        Ok(journeys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn profile() -> Profile {
        Profile::new("Europe/Berlin", "de-DE").unwrap()
    }

    fn when() -> chrono::DateTime<chrono::FixedOffset> {
        chrono::DateTime::parse_from_rfc3339("2024-03-18T10:00:00+01:00").unwrap()
    }

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "locations.json",
            r#"{"B-Town":[{"type":"station","id":"B","name":"B-Town"},{"type":"location","name":"street"}]}"#,
        );
        write(
            dir.path(),
            "departures/A.json",
            r#"{"departures":[{"tripId":"1|23","stop":{"type":"stop","id":"A"},"when":"2024-03-18T10:00:00+01:00","direction":"B-Town","line":{"name":"X1"}}]}"#,
        );
        write(
            dir.path(),
            "trips/1_23.json",
            r#"{"isHafasError":true,"code":"NOT_FOUND","hafasCode":"H9360","message":"no trip"}"#,
        );
        write(
            dir.path(),
            "journeys/A--B.json",
            r#"{"journeys":[{"legs":[{"walking":false,"stopovers":[]}]},{"legs":[]}]}"#,
        );
        dir
    }

    #[tokio::test]
    async fn serves_departures() {
        let dir = fixture_dir();
        let provider = FixtureProvider::new(dir.path(), profile()).unwrap();
        assert_eq!(provider.departure_boards(), 1);

        let options = DeparturesOptions {
            when: when(),
            duration_mins: 60,
            remarks: false,
            sub_stops: true,
            lines_of_stops: false,
        };
        let deps = provider
            .departures(&StopId::parse("A").unwrap(), &options)
            .await
            .unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].trip_id, "1|23");
    }

    #[tokio::test]
    async fn flagged_fixture_is_flagged_error() {
        let dir = fixture_dir();
        let provider = FixtureProvider::new(dir.path(), profile()).unwrap();

        let err = provider
            .trip("1|23", "X1", &TripOptions { when: when() })
            .await
            .unwrap_err();
        assert!(err.is_flagged());
        assert_eq!(err.code(), Some("H9360"));
    }

    #[tokio::test]
    async fn locations_filter_and_truncate() {
        let dir = fixture_dir();
        let provider = FixtureProvider::new(dir.path(), profile()).unwrap();

        let stops = provider
            .locations("B-Town", &LocationsOptions::default())
            .await
            .unwrap();
        assert_eq!(stops.len(), 1);

        let none = provider
            .locations("Nowhere", &LocationsOptions::default())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn journeys_respect_result_limit() {
        let dir = fixture_dir();
        let provider = FixtureProvider::new(dir.path(), profile()).unwrap();
        let options = JourneysOptions {
            results: 1,
            departure: when(),
            stopovers: true,
            start_with_walking: false,
            remarks: false,
            sub_stops: true,
        };

        let journeys = provider
            .journeys(
                &StopId::parse("A").unwrap(),
                &StopId::parse("B").unwrap(),
                &options,
            )
            .await
            .unwrap();
        assert_eq!(journeys.len(), 1);
    }

    #[tokio::test]
    async fn unknown_trip_returns_not_found() {
        let dir = fixture_dir();
        let provider = FixtureProvider::new(dir.path(), profile()).unwrap();

        let result = provider
            .trip("9|99", "X1", &TripOptions { when: when() })
            .await;
        assert!(matches!(result, Err(ProviderError::NotFound(_))));
    }

    #[tokio::test]
    async fn unknown_stop_has_empty_board() {
        let dir = fixture_dir();
        let provider = FixtureProvider::new(dir.path(), profile()).unwrap();
        let options = DeparturesOptions {
            when: when(),
            duration_mins: 60,
            remarks: false,
            sub_stops: true,
            lines_of_stops: false,
        };

        let result = provider
            .departures(&StopId::parse("XYZ").unwrap(), &options)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn empty_directory_loads() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FixtureProvider::new(dir.path(), profile()).unwrap();
        assert_eq!(provider.departure_boards(), 0);
    }

    #[test]
    fn file_keys_are_sanitized() {
        assert_eq!(file_key("1|2345|0#x"), "1_2345_0_x");
        assert_eq!(file_key("900000100003"), "900000100003");
    }
}
