//! Camera pose and the intrinsic capability interface.
//!
//! The warping engine never looks inside a camera model: everything it needs
//! is the narrow [`Intrinsics`] surface (dimensions, metric lift, forward
//! projection, visibility predicates, and a worst-case distortion radius).
//! Two concrete models are provided: [`Pinhole`] with optional radial
//! distortion, and [`FisheyeEquidistant`].

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// Rigid camera pose: rotation from panorama frame to camera frame, plus the
/// optical center. The panorama shares the optical center, so only the
/// rotation participates in warping geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    rotation: Matrix3<f64>,
    center: Vector3<f64>,
}

impl Pose {
    /// Largest tolerated Frobenius deviation of `R·Rᵀ` from identity.
    const ORTHONORMALITY_EPS: f64 = 1e-6;

    /// Validate and wrap a rotation + center pair.
    pub fn new(rotation: Matrix3<f64>, center: Vector3<f64>) -> Result<Self, GeometryError> {
        let deviation = (rotation * rotation.transpose() - Matrix3::identity()).norm();
        if !deviation.is_finite() || deviation > Self::ORTHONORMALITY_EPS {
            return Err(GeometryError::NonOrthonormalRotation { deviation });
        }
        Ok(Self { rotation, center })
    }

    /// Identity pose (camera aligned with the panorama frame).
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            center: Vector3::zeros(),
        }
    }

    /// Rotation from panorama frame to camera frame.
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// Optical center in the panorama frame.
    pub fn center(&self) -> &Vector3<f64> {
        &self.center
    }

    /// Transform a panorama-frame direction into the camera frame.
    pub fn to_camera(&self, dir: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * dir
    }

    /// Transform a camera-frame direction into the panorama frame.
    pub fn to_panorama(&self, dir: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * dir
    }
}

/// The capability surface the warping engine consumes.
///
/// Pixel coordinates are `[x, y]` with x along image columns; metric
/// coordinates live on the camera's z = 1 plane (pinhole) or angle plane
/// (fisheye). Models are plain data shared across the row-parallel sweep,
/// hence the `Sync` bound.
pub trait Intrinsics: Sync {
    /// Source image width in pixels.
    fn width(&self) -> u32;

    /// Source image height in pixels.
    fn height(&self) -> u32;

    /// Lift an image pixel to the metric camera plane (undistorted).
    fn image_to_camera(&self, pixel: [f64; 2]) -> [f64; 2];

    /// Project a panorama-frame ray through `pose` to image pixels,
    /// optionally applying lens distortion.
    fn project(&self, pose: &Pose, ray: &Vector3<f64>, with_distortion: bool) -> [f64; 2];

    /// Whether a camera-frame ray can reach the sensor at all.
    fn is_visible_ray(&self, ray: &Vector3<f64>) -> bool;

    /// Whether a projected pixel lands strictly inside the sampling domain
    /// (open interval, so bilinear fetches of the +1 neighbors stay in
    /// bounds).
    fn is_visible_pixel(&self, pixel: [f64; 2]) -> bool;

    /// Largest distorted metric radius reachable from undistorted radii in
    /// `[r_low, r_high]`. Identity for distortion-free models.
    fn maximal_distortion(&self, r_low: f64, r_high: f64) -> f64;
}

// ── Radial distortion ──────────────────────────────────────────────────────

/// Radial polynomial distortion (k1 r² + k2 r⁴ + k3 r⁶).
///
/// Tangential terms are deliberately absent: the bounding-box sweep relies on
/// a rotationally symmetric worst-case radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialDistortion {
    /// Radial coefficient k1.
    pub k1: f64,
    /// Radial coefficient k2.
    pub k2: f64,
    /// Radial coefficient k3.
    pub k3: f64,
}

impl Default for RadialDistortion {
    fn default() -> Self {
        Self {
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
        }
    }
}

impl RadialDistortion {
    /// Number of samples used to bracket the worst-case distorted radius.
    const RADIUS_SCAN_STEPS: usize = 256;

    /// Apply distortion to metric coordinates.
    pub fn distort(&self, metric: [f64; 2]) -> [f64; 2] {
        let [x, y] = metric;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        [x * radial, y * radial]
    }

    /// Distorted radius for an undistorted radius.
    pub fn distorted_radius(&self, r: f64) -> f64 {
        let r2 = r * r;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        r * (1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6)
    }

    /// Maximum distorted radius over undistorted radii in `[r_low, r_high]`.
    ///
    /// The polynomial is not monotonic for negative coefficients, so the
    /// interval is scanned rather than evaluated at its ends.
    pub fn max_distorted_radius(&self, r_low: f64, r_high: f64) -> f64 {
        let lo = r_low.min(r_high);
        let hi = r_low.max(r_high);
        let step = (hi - lo) / Self::RADIUS_SCAN_STEPS as f64;

        let mut max_r = 0.0f64;
        for i in 0..=Self::RADIUS_SCAN_STEPS {
            let r = lo + step * i as f64;
            max_r = max_r.max(self.distorted_radius(r).abs());
        }
        max_r
    }
}

// ── Pinhole ────────────────────────────────────────────────────────────────

/// Pinhole camera with optional radial distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pinhole {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
    /// Radial distortion; `None` for an ideal lens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distortion: Option<RadialDistortion>,
}

impl Pinhole {
    /// Ideal pinhole covering `width`×`height` with the given focal length
    /// and a centered principal point.
    pub fn ideal(width: u32, height: u32, focal: f64) -> Self {
        Self {
            width,
            height,
            fx: focal,
            fy: focal,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            distortion: None,
        }
    }
}

impl Intrinsics for Pinhole {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn image_to_camera(&self, pixel: [f64; 2]) -> [f64; 2] {
        [(pixel[0] - self.cx) / self.fx, (pixel[1] - self.cy) / self.fy]
    }

    fn project(&self, pose: &Pose, ray: &Vector3<f64>, with_distortion: bool) -> [f64; 2] {
        let x = pose.to_camera(ray);
        let mut metric = [x.x / x.z, x.y / x.z];

        if with_distortion {
            if let Some(d) = &self.distortion {
                metric = d.distort(metric);
            }
        }

        [self.fx * metric[0] + self.cx, self.fy * metric[1] + self.cy]
    }

    fn is_visible_ray(&self, ray: &Vector3<f64>) -> bool {
        ray.z > 0.0
    }

    fn is_visible_pixel(&self, pixel: [f64; 2]) -> bool {
        pixel[0] > 0.0
            && pixel[0] < (self.width - 1) as f64
            && pixel[1] > 0.0
            && pixel[1] < (self.height - 1) as f64
    }

    fn maximal_distortion(&self, r_low: f64, r_high: f64) -> f64 {
        match &self.distortion {
            Some(d) => d.max_distorted_radius(r_low, r_high),
            None => r_high,
        }
    }
}

// ── Fisheye ────────────────────────────────────────────────────────────────

/// Equidistant fisheye: metric radius equals the incidence angle in radians,
/// pixel radius is `focal · θ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FisheyeEquidistant {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Focal length in pixels per radian.
    pub focal: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
    /// Half field of view in radians (largest accepted incidence angle).
    pub max_angle: f64,
}

impl FisheyeEquidistant {
    /// Incidence angles are clamped below π/2 so the planar lift of the
    /// bounding-box polygon stays finite.
    const ANGLE_CLAMP: f64 = 1.55;

    /// Centered equidistant fisheye with the given half field of view.
    pub fn centered(width: u32, height: u32, focal: f64, max_angle: f64) -> Self {
        Self {
            width,
            height,
            focal,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            max_angle,
        }
    }

    fn incidence_angle(ray: &Vector3<f64>) -> f64 {
        ray.x.hypot(ray.y).atan2(ray.z)
    }
}

impl Intrinsics for FisheyeEquidistant {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn image_to_camera(&self, pixel: [f64; 2]) -> [f64; 2] {
        [
            (pixel[0] - self.cx) / self.focal,
            (pixel[1] - self.cy) / self.focal,
        ]
    }

    fn project(&self, pose: &Pose, ray: &Vector3<f64>, _with_distortion: bool) -> [f64; 2] {
        let x = pose.to_camera(ray);
        let rho = x.x.hypot(x.y);
        let theta = rho.atan2(x.z);

        // Direction in the image plane; degenerate only on the optical axis.
        let (ux, uy) = if rho > 1e-15 {
            (x.x / rho, x.y / rho)
        } else {
            (0.0, 0.0)
        };

        [
            self.focal * theta * ux + self.cx,
            self.focal * theta * uy + self.cy,
        ]
    }

    fn is_visible_ray(&self, ray: &Vector3<f64>) -> bool {
        Self::incidence_angle(ray) <= self.max_angle
    }

    fn is_visible_pixel(&self, pixel: [f64; 2]) -> bool {
        let inside_frame = pixel[0] > 0.0
            && pixel[0] < (self.width - 1) as f64
            && pixel[1] > 0.0
            && pixel[1] < (self.height - 1) as f64;
        if !inside_frame {
            return false;
        }

        let dx = pixel[0] - self.cx;
        let dy = pixel[1] - self.cy;
        (dx * dx + dy * dy).sqrt() <= self.focal * self.max_angle
    }

    fn maximal_distortion(&self, _r_low: f64, r_high: f64) -> f64 {
        // The bbox sweep lifts the returned radius with normalize((x, y, 1)),
        // which recovers an incidence angle of atan(r). Returning tan of the
        // reachable angle keeps the lifted polygon conservative.
        let theta = r_high.min(self.max_angle).min(Self::ANGLE_CLAMP);
        theta.tan()
    }
}
