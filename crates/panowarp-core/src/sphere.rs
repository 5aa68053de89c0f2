//! Great-circle helpers for the coarse bounding box.
//!
//! All inputs are points on (or near) the unit sphere. The chord between two
//! points stands in for the great-circle arc; for the short arcs produced by
//! the eight-point footprint polygon the two never disagree on which side of
//! a plane they fall.

use nalgebra::Vector3;

/// Point of the arc `a`→`b` with extremal |y| (latitude extremum), normalized
/// back onto the sphere.
///
/// Solves d|y(t)|/dt = 0 for the normalized chord point in closed form. When
/// the system degenerates (chord parallel to the extremal direction) the
/// chord midpoint is returned; the caller also samples both endpoints, so any
/// point of the arc is an acceptable answer there.
pub fn arc_extrema_y(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
    let d = b - a;
    let (dx, dy, dz) = (d.x, d.y, d.z);
    let (sx, sy, sz) = (a.x, a.y, a.z);

    let numer = dx * sx * sy - (dy * sx) * (dy * sx) - (dy * sz) * (dy * sz) + dz * sy * sz;
    let denom = dx * dx * sy - dx * dy * sx - dy * dz * sz + dz * dz * sy;

    let t = -numer / denom;
    if !t.is_finite() {
        return (a + 0.5 * d).normalize();
    }

    (a + t * d).normalize()
}

/// True iff the chord `a`→`b` crosses the longitude seam at ±π.
///
/// The seam is the half-plane x = 0, z < 0. The chord is parameterized over
/// t ∈ [0, 1]; a crossing outside that range belongs to another edge of the
/// polygon and is ignored.
pub fn crosses_horizontal_loop(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
    let d = b - a;

    // Chord parallel to the seam plane never crosses it.
    if d.x.abs() < 1e-12 {
        return false;
    }

    let t = -a.x / d.x;
    if !(0.0..=1.0).contains(&t) {
        return false;
    }

    let cross = a + d * t;
    cross.z < 0.0
}

/// True iff the vertical axis pierces the spherical triangle (p1, p2, p3).
///
/// Projects the triangle onto the y = 0 plane and solves the barycentric
/// system for the origin using only the (x, z) components; the axis is inside
/// iff all three coordinates land in [0, 1].
pub fn pole_in_spherical_triangle(
    p1: &Vector3<f64>,
    p2: &Vector3<f64>,
    p3: &Vector3<f64>,
) -> bool {
    let denom = p1.x * p2.z - p1.x * p3.z - p2.x * p1.z
        + p2.x * p3.z
        + p3.x * p1.z
        - p3.x * p2.z;

    // Degenerate projection (collinear in the x-z plane) covers no area.
    if !denom.is_finite() || denom.abs() < 1e-15 {
        return false;
    }

    let a = (p2.x * p3.z - p3.x * p2.z) / denom;
    let b = (-p1.x * p3.z + p3.x * p1.z) / denom;
    let c = 1.0 - a - b;

    (0.0..=1.0).contains(&a) && (0.0..=1.0).contains(&b) && (0.0..=1.0).contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit(x: f64, y: f64, z: f64) -> Vector3<f64> {
        Vector3::new(x, y, z).normalize()
    }

    #[test]
    fn extrema_beats_both_endpoints() {
        // Arc from 30° up-forward to 30° up-right peaks between them.
        let a = unit(0.0, 0.5, 1.0);
        let b = unit(1.0, 0.5, 0.0);
        let e = arc_extrema_y(&a, &b);
        assert!(e.y >= a.y - 1e-12);
        assert!(e.y >= b.y - 1e-12);
        assert_relative_eq!(e.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn extrema_of_horizontal_arc_stays_horizontal() {
        let a = unit(0.3, 0.0, 1.0);
        let b = unit(-0.3, 0.0, 1.0);
        let e = arc_extrema_y(&a, &b);
        assert_relative_eq!(e.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn seam_crossing_detected_behind_camera() {
        // Both points behind (z < 0), straddling x = 0.
        let a = unit(0.2, 0.0, -1.0);
        let b = unit(-0.2, 0.0, -1.0);
        assert!(crosses_horizontal_loop(&a, &b));
    }

    #[test]
    fn front_chord_does_not_cross_seam() {
        // Same x-straddle but in front of the camera (z > 0).
        let a = unit(0.2, 0.0, 1.0);
        let b = unit(-0.2, 0.0, 1.0);
        assert!(!crosses_horizontal_loop(&a, &b));
    }

    #[test]
    fn chord_parallel_to_seam_plane_never_crosses() {
        let a = unit(0.0, 0.1, -1.0);
        let b = unit(0.0, -0.1, -1.0);
        assert!(!crosses_horizontal_loop(&a, &b));
    }

    #[test]
    fn pole_inside_symmetric_triangle() {
        // Three directions ringing straight-up at 120° spacing.
        let p1 = unit(0.5, 1.0, 0.0);
        let p2 = unit(-0.25, 1.0, 0.433);
        let p3 = unit(-0.25, 1.0, -0.433);
        assert!(pole_in_spherical_triangle(&p1, &p2, &p3));
    }

    #[test]
    fn pole_outside_forward_triangle() {
        let p1 = unit(0.1, 0.1, 1.0);
        let p2 = unit(-0.1, 0.1, 1.0);
        let p3 = unit(0.0, -0.1, 1.0);
        assert!(!pole_in_spherical_triangle(&p1, &p2, &p3));
    }

    #[test]
    fn degenerate_triangle_contains_nothing() {
        // Collinear in the x-z projection.
        let p1 = unit(0.1, 0.3, 0.1);
        let p2 = unit(0.2, -0.3, 0.2);
        let p3 = unit(0.3, 0.5, 0.3);
        assert!(!pole_in_spherical_triangle(&p1, &p2, &p3));
    }
}
