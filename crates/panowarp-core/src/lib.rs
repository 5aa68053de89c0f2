//! panowarp-core — per-view geometric warping onto an equirectangular canvas.
//!
//! Warps a perspective camera image (known intrinsics and pose) onto a
//! 2:1 equirectangular panorama. The stages, leaf-first:
//!
//! 1. **Spherical** – equirectangular pixel ↔ unit-sphere direction maps.
//! 2. **Sphere** – great-circle latitude extrema, longitude-seam crossing
//!    test, pole-in-spherical-triangle test.
//! 3. **Camera** – the intrinsic capability interface ([`Intrinsics`]) with
//!    pinhole and equidistant-fisheye models.
//! 4. **Pyramid** – Gaussian-prefiltered half-resolution stack of the source.
//! 5. **Coordmap** – tight canvas bounding box (pole containment, seam
//!    wraparound) and the dense panorama→source coordinate map.
//! 6. **Warp** – mipmap-level-selecting bilinear resampler.
//! 7. **Alpha** – separable tent weights for feathered compositing.
//!
//! The [`distance`] module carries the masked distance transform consumed by
//! the downstream feathering stage.

pub mod alpha;
pub mod camera;
pub mod coordmap;
pub mod distance;
pub mod pyramid;
pub mod sphere;
pub mod spherical;
pub mod warp;

pub use camera::{FisheyeEquidistant, Intrinsics, Pinhole, Pose, RadialDistortion};
pub use coordmap::{BBox, CoordinateMap};
pub use pyramid::GaussianPyramid;
pub use warp::Warped;

// ── Shared types ───────────────────────────────────────────────────────────

/// Output canvas dimensions. Always a 2:1 equirectangular grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PanoramaSize {
    /// Canvas width in pixels (longitude axis).
    pub width: u32,
    /// Canvas height in pixels (latitude axis), always `width / 2`.
    pub height: u32,
}

impl PanoramaSize {
    /// Granularity the user-provided width is rounded up to.
    pub const WIDTH_MULTIPLE: u32 = 1024;

    /// Smallest accepted canvas width.
    pub const MIN_WIDTH: u32 = 512;

    /// Canvas for a user-provided width: rounded up to the next multiple of
    /// [`Self::WIDTH_MULTIPLE`], height fixed at half the width.
    pub fn from_width(width: u32) -> Self {
        let width = width
            .max(Self::MIN_WIDTH)
            .div_ceil(Self::WIDTH_MULTIPLE)
            .saturating_mul(Self::WIDTH_MULTIPLE);
        Self {
            width,
            height: width / 2,
        }
    }

    /// The 512×256 canvas used to probe per-view scales when no width was
    /// requested.
    pub fn estimation_seed() -> Self {
        Self {
            width: Self::MIN_WIDTH,
            height: Self::MIN_WIDTH / 2,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Geometric failures that make a single view unusable.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// The pose rotation is not orthonormal within tolerance.
    NonOrthonormalRotation {
        /// Frobenius norm of `R·Rᵀ − I`.
        deviation: f64,
    },
    /// No panorama pixel maps into the visible part of the view.
    EmptyFootprint,
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonOrthonormalRotation { deviation } => {
                write!(f, "pose rotation is not orthonormal (|RRt - I| = {deviation:.3e})")
            }
            Self::EmptyFootprint => write!(f, "view footprint does not touch the canvas"),
        }
    }
}

impl std::error::Error for GeometryError {}
