//! Resampling of the source image through a coordinate map.
//!
//! One entry point covers both strategies: pass a [`GaussianPyramid`] to get
//! the mipmap-level-selecting resampler (level chosen per pixel from the
//! local Jacobian of the map), or `None` for plain bilinear sampling of the
//! source. Samplers take `(image, x, y)` throughout.

use image::{Rgb, Rgb32FImage};

use crate::coordmap::CoordinateMap;
use crate::pyramid::GaussianPyramid;

/// A view warped into canvas space: cropped color raster, coverage mask and
/// the crop's canvas offset.
pub struct Warped {
    /// Canvas column of the raster's left edge.
    pub offset_x: u32,
    /// Canvas row of the raster's top edge.
    pub offset_y: u32,
    /// Warped color, defined where the mask is 1.
    pub color: Rgb32FImage,
    /// Coverage mask copied from the coordinate map (values 0/1).
    pub mask: image::GrayImage,
}

/// Bilinear sample at subpixel (x, y); out-of-range neighbor fetches clamp
/// to the image border.
pub fn sample_bilinear(img: &Rgb32FImage, x: f64, y: f64) -> Rgb<f32> {
    let (w, h) = img.dimensions();

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f32;
    let fy = (y - y0) as f32;

    let clamp = |v: f64, hi: u32| (v.max(0.0) as u32).min(hi - 1);
    let ix0 = clamp(x0, w);
    let iy0 = clamp(y0, h);
    let ix1 = clamp(x0 + 1.0, w);
    let iy1 = clamp(y0 + 1.0, h);

    let p00 = img.get_pixel(ix0, iy0).0;
    let p10 = img.get_pixel(ix1, iy0).0;
    let p01 = img.get_pixel(ix0, iy1).0;
    let p11 = img.get_pixel(ix1, iy1).0;

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let a = p00[c] + fx * (p10[c] - p00[c]);
        let b = p01[c] + fx * (p11[c] - p01[c]);
        out[c] = a + fy * (b - a);
    }
    Rgb(out)
}

/// Pyramid level for a local minification factor: `floor(log2(scale))`
/// clamped to the available levels.
fn select_level(scale: f64, max_level: usize) -> usize {
    let flevel = scale.log2().max(0.0);
    (flevel.floor() as usize).min(max_level)
}

/// Warp the source through the map.
///
/// With a pyramid, interior pixels measure the Jacobian of the map by
/// forward differences and sample the level matching the local minification;
/// pixels on the last row/column or missing a +1 neighbor fall back to
/// direct bilinear sampling, as does any scaled coordinate that leaves the
/// valid interior of its level.
pub fn warp(
    map: &CoordinateMap,
    source: &Rgb32FImage,
    pyramid: Option<&GaussianPyramid>,
) -> Warped {
    let w = map.width();
    let h = map.height();

    // Unmapped texels keep a loud fill color so coverage bugs are visible.
    let mut color = Rgb32FImage::from_pixel(w, h, Rgb([1.0, 0.0, 0.0]));

    for y in 0..h {
        for x in 0..w {
            if !map.is_covered(x, y) {
                continue;
            }

            let pixel = match pyramid {
                None => {
                    let [sx, sy] = map.coord(x, y);
                    sample_bilinear(source, sx, sy)
                }
                Some(pyr) => sample_mipmap(map, source, pyr, x, y),
            };
            color.put_pixel(x, y, pixel);
        }
    }

    Warped {
        offset_x: map.offset_x(),
        offset_y: map.offset_y(),
        color,
        mask: map.mask().clone(),
    }
}

fn sample_mipmap(
    map: &CoordinateMap,
    source: &Rgb32FImage,
    pyramid: &GaussianPyramid,
    x: u32,
    y: u32,
) -> Rgb<f32> {
    let [sx, sy] = map.coord(x, y);

    // Forward differences need both +1 neighbors covered.
    let boundary = x + 1 >= map.width()
        || y + 1 >= map.height()
        || !map.is_covered(x + 1, y)
        || !map.is_covered(x, y + 1);
    if boundary {
        return sample_bilinear(source, sx, sy);
    }

    let right = map.coord(x + 1, y);
    let down = map.coord(x, y + 1);

    let dxx = down[0] - sx;
    let dxy = right[0] - sx;
    let dyx = down[1] - sy;
    let dyy = right[1] - sy;
    let det = (dxx * dyy - dxy * dyx).abs();
    let scale = det.sqrt();

    let level = select_level(scale, pyramid.max_level());
    let inv = 1.0 / f64::powi(2.0, level as i32);
    let lx = sx * inv;
    let ly = sy * inv;

    let lvl_img = pyramid.level(level);
    // Outside the level's valid interior: fall back to the base level.
    if lx >= (lvl_img.width() - 1) as f64 || ly >= (lvl_img.height() - 1) as f64 {
        return sample_bilinear(pyramid.level(0), sx, sy);
    }

    sample_bilinear(lvl_img, lx, ly)
}
