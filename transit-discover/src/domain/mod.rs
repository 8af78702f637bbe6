//! Domain types for network discovery.
//!
//! These are the provider-independent shapes the discovery engine works
//! with. The provider layer converts wire responses into them, dropping
//! anything that cannot be represented (addresses, points of interest,
//! empty identifiers).

mod edge;
mod journey;
mod stop;
mod trip;

pub use edge::Edge;
pub use journey::{Journey, Leg};
pub use stop::{Coordinates, InvalidStopId, Stop, StopId, StopKind};
pub use trip::{Departure, Line, Stopover, Trip};
