//! Journeys computed by the provider between two stops.

use serde::{Deserialize, Serialize};

use super::{Line, Stopover};

/// One leg of a journey.
///
/// Walking legs and legs without stopover detail have `stopovers: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    pub line: Option<Line>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub walking: bool,
    #[serde(default)]
    pub stopovers: Option<Vec<Stopover>>,
}

/// An itinerary made of one or more legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub legs: Vec<Leg>,
}

impl Journey {
    /// Legs that ride a vehicle.
    pub fn vehicle_legs(&self) -> impl Iterator<Item = &Leg> {
        self.legs.iter().filter(|leg| !leg.walking)
    }
}
