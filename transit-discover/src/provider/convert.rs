//! Conversion from wire DTOs to domain types.
//!
//! Entries that cannot be represented (addresses, POIs, departures without a
//! trip id) are skipped. A stopover sequence containing an unusable stop is
//! dropped as a whole, so consecutive pairs never skip a stop.

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::domain::{
    Coordinates, Departure, Journey, Leg, Line, Stop, StopId, StopKind, Stopover, Trip,
};

use super::types::{DepartureDto, JourneyDto, LegDto, LineDto, LocationDto, StopoverDto, TripDto};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    /// A timestamp was present but not ISO 8601
    #[error("invalid time: {0}")]
    InvalidTime(String),
}

/// Parse an optional ISO 8601 timestamp.
pub fn parse_instant(raw: Option<&str>) -> Result<Option<DateTime<FixedOffset>>, ConversionError> {
    match raw {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(Some)
            .map_err(|_| ConversionError::InvalidTime(s.to_string())),
    }
}

/// Convert a line.
pub fn convert_line(dto: &LineDto) -> Line {
    Line {
        id: dto.id.clone(),
        name: dto.name.clone(),
        product: dto.product.clone(),
        mode: dto.mode.clone(),
    }
}

/// Convert a location into a stop or station.
///
/// Returns `None` for addresses, points of interest, and entries without a
/// usable id.
pub fn convert_location(dto: &LocationDto) -> Option<Stop> {
    let kind = match dto.kind.as_deref() {
        Some("stop") => StopKind::Stop,
        Some("station") => StopKind::Station,
        _ => return None,
    };
    let id = StopId::parse(dto.id.as_deref()?).ok()?;

    let location = dto.location.as_ref().and_then(|c| {
        Some(Coordinates {
            latitude: c.latitude?,
            longitude: c.longitude?,
        })
    });

    let station = match kind {
        StopKind::Stop => dto
            .station
            .as_deref()
            .and_then(convert_location)
            .map(Box::new),
        StopKind::Station => None,
    };

    Some(Stop {
        kind,
        id,
        name: dto.name.clone(),
        location,
        station,
        lines: dto
            .lines
            .as_ref()
            .map(|lines| lines.iter().map(convert_line).collect()),
    })
}

/// Convert a `/locations` result, keeping stops and stations only.
pub fn convert_locations(dtos: &[LocationDto]) -> Vec<Stop> {
    dtos.iter().filter_map(convert_location).collect()
}

/// Convert a stopover sequence.
///
/// Returns `Ok(None)` if any stopover lacks a representable stop.
pub fn convert_stopovers(
    dtos: Option<&[StopoverDto]>,
) -> Result<Option<Vec<Stopover>>, ConversionError> {
    let Some(dtos) = dtos else {
        return Ok(None);
    };

    let mut stopovers = Vec::with_capacity(dtos.len());
    for dto in dtos {
        let Some(stop) = dto.stop.as_ref().and_then(convert_location) else {
            debug!("dropping stopover sequence with unusable stop");
            return Ok(None);
        };
        let arrival = match parse_instant(dto.arrival.as_deref())? {
            Some(t) => Some(t),
            None => parse_instant(dto.planned_arrival.as_deref())?,
        };
        let departure = match parse_instant(dto.departure.as_deref())? {
            Some(t) => Some(t),
            None => parse_instant(dto.planned_departure.as_deref())?,
        };
        stopovers.push(Stopover::new(stop, arrival, departure));
    }

    Ok(Some(stopovers))
}

/// Convert a departure board.
pub fn convert_departures(dtos: &[DepartureDto]) -> Result<Vec<Departure>, ConversionError> {
    let mut departures = Vec::with_capacity(dtos.len());

    for dto in dtos {
        let Some(trip_id) = dto.trip_id.clone().filter(|id| !id.is_empty()) else {
            debug!("skipping departure without trip id");
            continue;
        };
        let Some(stop) = dto.stop.as_ref().and_then(convert_location) else {
            debug!(trip_id = %trip_id, "skipping departure without usable stop");
            continue;
        };

        departures.push(Departure {
            trip_id,
            stop,
            line: dto.line.as_ref().map(convert_line),
            direction: dto.direction.clone(),
            when: parse_instant(dto.when.as_deref())?,
            planned_when: parse_instant(dto.planned_when.as_deref())?,
        });
    }

    Ok(departures)
}

/// Convert a trip; `requested_id` fills in a missing id.
pub fn convert_trip(dto: &TripDto, requested_id: &str) -> Result<Trip, ConversionError> {
    Ok(Trip {
        id: dto.id.clone().unwrap_or_else(|| requested_id.to_string()),
        line: dto.line.as_ref().map(convert_line),
        direction: dto.direction.clone(),
        stopovers: convert_stopovers(dto.stopovers.as_deref())?,
    })
}

fn convert_leg(dto: &LegDto) -> Result<Leg, ConversionError> {
    Ok(Leg {
        trip_id: dto.trip_id.clone(),
        line: dto.line.as_ref().map(convert_line),
        direction: dto.direction.clone(),
        walking: dto.walking.unwrap_or(false),
        stopovers: convert_stopovers(dto.stopovers.as_deref())?,
    })
}

/// Convert a list of journeys.
pub fn convert_journeys(dtos: &[JourneyDto]) -> Result<Vec<Journey>, ConversionError> {
    dtos.iter()
        .map(|journey| {
            let legs = journey
                .legs
                .iter()
                .map(convert_leg)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Journey { legs })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(json: &str) -> LocationDto {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn addresses_and_pois_are_dropped() {
        let dtos = vec![
            location(r#"{"type":"station","id":"900000100003","name":"S+U Alexanderplatz"}"#),
            location(r#"{"type":"location","address":"Alexanderplatz 1","latitude":52.5}"#),
            location(r#"{"type":"location","id":"poi1","poi":true,"name":"Fernsehturm"}"#),
        ];

        let stops = convert_locations(&dtos);
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].kind, StopKind::Station);
        assert_eq!(stops[0].id.as_str(), "900000100003");
    }

    #[test]
    fn stop_keeps_parent_and_coordinates() {
        let dto = location(
            r#"{"type":"stop","id":"A1","name":"A (Gleis 1)",
                "location":{"type":"location","latitude":52.52,"longitude":13.41},
                "station":{"type":"station","id":"A","name":"A"}}"#,
        );

        let stop = convert_location(&dto).unwrap();
        assert_eq!(stop.parent().map(|p| p.id.as_str()), Some("A"));
        assert_eq!(
            stop.location,
            Some(Coordinates {
                latitude: 52.52,
                longitude: 13.41
            })
        );
    }

    #[test]
    fn stopover_times_fall_back_to_planned() {
        let dtos: Vec<StopoverDto> = serde_json::from_str(
            r#"[
                {"stop":{"type":"stop","id":"A"},"departure":null,"plannedDeparture":"2024-03-18T10:00:00+01:00"},
                {"stop":{"type":"stop","id":"B"},"arrival":"2024-03-18T10:05:00+01:00"}
            ]"#,
        )
        .unwrap();

        let stopovers = convert_stopovers(Some(&dtos)).unwrap().unwrap();
        assert_eq!(stopovers.len(), 2);
        assert!(stopovers[0].departure.is_some());
        assert!(stopovers[1].arrival.is_some());
        assert!(stopovers[1].departure.is_none());
    }

    #[test]
    fn unusable_stop_drops_whole_sequence() {
        let dtos: Vec<StopoverDto> = serde_json::from_str(
            r#"[{"stop":{"type":"stop","id":"A"}},{"stop":null},{"stop":{"type":"stop","id":"C"}}]"#,
        )
        .unwrap();

        assert!(convert_stopovers(Some(&dtos)).unwrap().is_none());
        assert!(convert_stopovers(None).unwrap().is_none());
    }

    #[test]
    fn malformed_time_is_an_error() {
        let result = parse_instant(Some("10:00"));
        assert!(matches!(result, Err(ConversionError::InvalidTime(_))));
    }

    #[test]
    fn departures_without_trip_are_skipped() {
        let dtos: Vec<DepartureDto> = serde_json::from_str(
            r#"[
                {"tripId":"t1","stop":{"type":"stop","id":"A"},"line":{"name":"X1"},"direction":"B"},
                {"tripId":null,"stop":{"type":"stop","id":"A"}},
                {"tripId":"t3"}
            ]"#,
        )
        .unwrap();

        let departures = convert_departures(&dtos).unwrap();
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].trip_id, "t1");
        assert_eq!(departures[0].line_name(), "X1");
    }

    #[test]
    fn trip_id_defaults_to_requested() {
        let dto: TripDto = serde_json::from_str(r#"{"stopovers":[]}"#).unwrap();
        let trip = convert_trip(&dto, "requested").unwrap();
        assert_eq!(trip.id, "requested");
        assert_eq!(trip.stopovers, Some(vec![]));
    }
}
