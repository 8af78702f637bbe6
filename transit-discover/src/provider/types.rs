//! Wire DTOs for hafas-rest-api style endpoints.
//!
//! These map directly onto the JSON the REST endpoints return. Nearly
//! everything is optional: the API omits fields freely, and newer versions
//! wrap list responses in an object while older ones return bare arrays.

use serde::Deserialize;

/// A location returned by `/locations`, or embedded in other responses.
///
/// `type` is one of `stop`, `station`, `location` (address or POI).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDto {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub location: Option<CoordinatesDto>,
    /// Parent station of a stop.
    pub station: Option<Box<LocationDto>>,
    /// Present when `linesOfStops=true`.
    pub lines: Option<Vec<LineDto>>,
}

/// Coordinates nested in a location.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatesDto {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A line as embedded in departures, trips and legs.
#[derive(Debug, Clone, Deserialize)]
pub struct LineDto {
    pub id: Option<String>,
    pub name: Option<String>,
    pub product: Option<String>,
    pub mode: Option<String>,
}

/// One stopover of a trip or journey leg.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopoverDto {
    pub stop: Option<LocationDto>,
    /// Realtime arrival (ISO 8601 with offset).
    pub arrival: Option<String>,
    pub planned_arrival: Option<String>,
    /// Realtime departure (ISO 8601 with offset).
    pub departure: Option<String>,
    pub planned_departure: Option<String>,
}

/// An entry on a departure board.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureDto {
    pub trip_id: Option<String>,
    pub stop: Option<LocationDto>,
    pub when: Option<String>,
    pub planned_when: Option<String>,
    pub direction: Option<String>,
    pub line: Option<LineDto>,
}

/// Response from `/stops/:id/departures`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DeparturesResponse {
    Wrapped { departures: Vec<DepartureDto> },
    Bare(Vec<DepartureDto>),
}

impl DeparturesResponse {
    pub fn into_departures(self) -> Vec<DepartureDto> {
        match self {
            DeparturesResponse::Wrapped { departures } => departures,
            DeparturesResponse::Bare(departures) => departures,
        }
    }
}

/// A trip with its stopovers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDto {
    pub id: Option<String>,
    pub line: Option<LineDto>,
    pub direction: Option<String>,
    pub stopovers: Option<Vec<StopoverDto>>,
}

/// Response from `/trips/:id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TripResponse {
    Wrapped { trip: TripDto },
    Bare(TripDto),
}

impl TripResponse {
    pub fn into_trip(self) -> TripDto {
        match self {
            TripResponse::Wrapped { trip } => trip,
            TripResponse::Bare(trip) => trip,
        }
    }
}

/// One leg of a journey.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegDto {
    pub trip_id: Option<String>,
    pub line: Option<LineDto>,
    pub direction: Option<String>,
    pub walking: Option<bool>,
    pub stopovers: Option<Vec<StopoverDto>>,
}

/// A journey as returned by `/journeys`.
#[derive(Debug, Clone, Deserialize)]
pub struct JourneyDto {
    #[serde(default)]
    pub legs: Vec<LegDto>,
}

/// Response from `/journeys`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JourneysResponse {
    Wrapped { journeys: Vec<JourneyDto> },
    Bare(Vec<JourneyDto>),
}

impl JourneysResponse {
    pub fn into_journeys(self) -> Vec<JourneyDto> {
        match self {
            JourneysResponse::Wrapped { journeys } => journeys,
            JourneysResponse::Bare(journeys) => journeys,
        }
    }
}

/// Error body returned with non-2xx responses.
///
/// `isHafasError` marks failures that originate in the upstream HAFAS
/// backend rather than in the REST layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: Option<String>,
    pub is_hafas_error: Option<bool>,
    pub code: Option<String>,
    pub hafas_code: Option<String>,
}
