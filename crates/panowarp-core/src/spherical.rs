//! Equirectangular ↔ unit-sphere coordinate maps.
//!
//! The canvas convention: column 0 is longitude −π, column `width` is +π,
//! row 0 is latitude −π/2 (north at the top of the raster), row `height`
//! is +π/2. Directions use y for the latitude axis and z for longitude 0.

use nalgebra::Vector3;
use std::f64::consts::{FRAC_PI_2, PI};

/// Unit-sphere direction of an equirectangular pixel.
///
/// `pixel[0]` may lie outside `[0, width)`; longitude is periodic so the
/// returned direction wraps naturally.
pub fn from_equirectangular(pixel: [f64; 2], width: u32, height: u32) -> Vector3<f64> {
    let latitude = (pixel[1] / height as f64) * PI - FRAC_PI_2;
    let longitude = (pixel[0] / width as f64) * 2.0 * PI - PI;

    Vector3::new(
        latitude.cos() * longitude.sin(),
        latitude.sin(),
        latitude.cos() * longitude.cos(),
    )
}

/// Equirectangular pixel of a unit direction.
///
/// Longitude maps to `[0, width]`, latitude to `[0, height]`. No wrap is
/// applied beyond the canvas; callers handle horizontal periodicity.
pub fn to_equirectangular(dir: &Vector3<f64>, width: u32, height: u32) -> [f64; 2] {
    let vertical = dir.y.clamp(-1.0, 1.0).asin();
    let horizontal = dir.x.atan2(dir.z);

    [
        ((horizontal + PI) / (2.0 * PI)) * width as f64,
        ((vertical + FRAC_PI_2) / PI) * height as f64,
    ]
}

/// Longitude and latitude of a unit direction, in radians.
pub fn to_longitude_latitude(dir: &Vector3<f64>) -> [f64; 2] {
    [dir.x.atan2(dir.z), dir.y.clamp(-1.0, 1.0).asin()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const W: u32 = 4096;
    const H: u32 = 2048;

    #[test]
    fn canvas_center_looks_down_z() {
        let d = from_equirectangular([W as f64 / 2.0, H as f64 / 2.0], W, H);
        assert_relative_eq!(d.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(d.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(d.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn top_row_is_north_pole() {
        let d = from_equirectangular([123.0, 0.0], W, H);
        assert_relative_eq!(d.y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn directions_are_unit_length() {
        for (x, y) in [(0.0, 17.0), (1000.5, 300.25), (5000.0, 2000.0)] {
            let d = from_equirectangular([x, y], W, H);
            assert_relative_eq!(d.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn round_trip_inside_canvas() {
        for (x, y) in [
            (1.0, 1.0),
            (17.25, 333.5),
            (2048.0, 1024.0),
            (4000.75, 2000.125),
        ] {
            let d = from_equirectangular([x, y], W, H);
            let p = to_equirectangular(&d, W, H);
            assert_relative_eq!(p[0], x, epsilon = 1e-6);
            assert_relative_eq!(p[1], y, epsilon = 1e-6);
        }
    }

    #[test]
    fn longitude_is_periodic() {
        let a = from_equirectangular([100.0, 700.0], W, H);
        let b = from_equirectangular([100.0 + W as f64, 700.0], W, H);
        assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn to_longitude_latitude_matches_pixel_map() {
        let d = from_equirectangular([3000.0, 500.0], W, H);
        let [lon, lat] = to_longitude_latitude(&d);
        let p = to_equirectangular(&d, W, H);
        assert_relative_eq!((lon + PI) / (2.0 * PI) * W as f64, p[0], epsilon = 1e-9);
        assert_relative_eq!((lat + FRAC_PI_2) / PI * H as f64, p[1], epsilon = 1e-9);
    }
}
