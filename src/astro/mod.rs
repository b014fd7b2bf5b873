//! Site ephemeris: sidereal time, horizontal coordinates, solar and lunar
//! positions, and twilight boundaries.
//!
//! Low-precision series are used throughout. Scheduling decisions tolerate
//! a few arcminutes of error in target altitude and a fraction of a degree
//! in the lunar position, far below the constraint margins they feed.

pub mod coords;
pub mod moon;
pub mod night;
pub mod sun;
pub mod time;

pub use coords::*;
pub use moon::*;
pub use night::*;
pub use sun::*;
pub use time::*;

use serde::{Deserialize, Serialize};

/// Geographic location of the observatory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverSite {
    pub latitude_deg: f64,
    /// East-positive longitude in degrees.
    pub longitude_deg: f64,
    pub elevation_m: f64,
}

impl ObserverSite {
    /// Palomar Mountain, the reference site.
    pub fn palomar() -> Self {
        Self {
            latitude_deg: 33.3563,
            longitude_deg: -116.8650,
            elevation_m: 1712.0,
        }
    }
}
