pub mod page;
pub mod session;

use crate::geo::GeoPoint;
use chrono::NaiveDateTime;
use serde::Deserialize;

pub use session::{Credentials, PortalSession};

/// A location record as the portal embeds it. Only bus records carry heading,
/// speed and fix time; anything else the portal adds is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub time: Option<NaiveDateTime>,
}

impl Position {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Bus and stop positions read from one fetch of the tracker page.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub bus: Position,
    pub stop: Position,
}
