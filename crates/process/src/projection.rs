use anyhow::{Result, bail};
use geo::{Coord, coord};

const EARTH_RADIUS: f64 = 6_378_137.0;

/// Reprojection from raw (lat, lon) into the output SRID. Pure; no failure
/// modes once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// EPSG:4326, coordinates pass through as degrees.
    LatLon,
    /// EPSG:3857 web mercator meters.
    SphericalMercator,
}

impl Projection {
    pub fn from_srid(srid: i32) -> Result<Self> {
        match srid {
            4326 => Ok(Projection::LatLon),
            3857 => Ok(Projection::SphericalMercator),
            other => bail!("unsupported output srid {other}"),
        }
    }

    pub fn srid(&self) -> i32 {
        match self {
            Projection::LatLon => 4326,
            Projection::SphericalMercator => 3857,
        }
    }

    pub fn project(&self, lat: f64, lon: f64) -> Coord {
        match self {
            Projection::LatLon => coord! { x: lon, y: lat },
            Projection::SphericalMercator => {
                let x = EARTH_RADIUS * lon.to_radians();
                let y = EARTH_RADIUS
                    * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
                        .tan()
                        .ln();
                coord! { x: x, y: y }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_srid_is_a_configuration_error() {
        assert!(Projection::from_srid(27700).is_err());
    }

    #[test]
    fn latlon_passes_through() {
        let projected = Projection::LatLon.project(51.5, -0.12);
        assert_eq!(projected, coord! { x: -0.12, y: 51.5 });
    }

    #[test]
    fn mercator_maps_the_origin_to_zero() {
        let projected = Projection::SphericalMercator.project(0.0, 0.0);
        assert!(projected.x.abs() < 1e-9);
        assert!(projected.y.abs() < 1e-9);
    }

    #[test]
    fn mercator_x_scales_with_longitude() {
        let projected = Projection::SphericalMercator.project(0.0, 180.0);
        // half the equatorial circumference
        assert!((projected.x - EARTH_RADIUS * std::f64::consts::PI).abs() < 1.0);
    }
}
