// Reference frames and the spherical Web Mercator conversion used to move
// between the working frame and the publishing frame.

use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude limit of the square Web Mercator world.
pub const WEB_MERC_MAX_LAT: f64 = 85.051_128_779_806_59;

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    pub const WGS84: Crs = Crs {
        epsg: crate::WGS_84_SRID,
    };
    pub const WEB_MERCATOR: Crs = Crs { epsg: 3857 };

    pub const fn from_epsg(epsg: u32) -> Self {
        Crs { epsg }
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Geographic frames carry degrees; everything else is treated as projected.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, 4326 | 4269 | 4258)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("EPSG:"))
            .map(|_| &trimmed[5..])
            .ok_or_else(|| PrepError::InvalidReferenceFrame(s.to_string()))?;

        code.parse::<u32>()
            .ok()
            .filter(|epsg| *epsg > 0)
            .map(Crs::from_epsg)
            .ok_or_else(|| PrepError::InvalidReferenceFrame(s.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = PrepError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// Convert lat/lng (EPSG:4326) to Web Mercator (EPSG:3857)
/// Input: (longitude, latitude) in degrees
/// Output: (x, y) in meters
pub fn lat_lng_to_web_merc(lon: f64, lat: f64) -> Result<(f64, f64), PrepError> {
    if !lon.is_finite() || !lat.is_finite() || lat.abs() > WEB_MERC_MAX_LAT {
        return Err(PrepError::InvalidReferenceFrame(format!(
            "coordinate ({lon}, {lat}) is outside the Web Mercator domain"
        )));
    }
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln();
    Ok((x, y))
}

/// Convert Web Mercator (EPSG:3857) to lat/lng (EPSG:4326)
/// Input: (x, y) in meters
/// Output: (longitude, latitude) in degrees
pub fn web_merc_to_lat_lng(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg() {
        assert_eq!("EPSG:3857".parse::<Crs>().unwrap(), Crs::WEB_MERCATOR);
        assert_eq!("epsg:4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!(" EPSG:2958 ".parse::<Crs>().unwrap().epsg(), 2958);
        assert!("4326".parse::<Crs>().is_err());
        assert!("EPSG:".parse::<Crs>().is_err());
        assert!("EPSG:abc".parse::<Crs>().is_err());
        assert!("EPSG:0".parse::<Crs>().is_err());
    }

    #[test]
    fn test_geographic_flag() {
        assert!(Crs::WGS84.is_geographic());
        assert!(!Crs::WEB_MERCATOR.is_geographic());
        assert_eq!(Crs::WEB_MERCATOR.to_string(), "EPSG:3857");
    }

    #[test]
    fn test_web_merc_roundtrip() {
        let (x, y) = lat_lng_to_web_merc(-117.8265, 33.6846).unwrap();
        let (lon, lat) = web_merc_to_lat_lng(x, y);
        assert!((lon + 117.8265).abs() < 1e-9);
        assert!((lat - 33.6846).abs() < 1e-9);
    }

    #[test]
    fn test_web_merc_rejects_poles() {
        assert!(lat_lng_to_web_merc(0.0, 89.0).is_err());
        assert!(lat_lng_to_web_merc(f64::NAN, 0.0).is_err());
    }
}
