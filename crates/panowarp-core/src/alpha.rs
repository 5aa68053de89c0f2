//! Tent weights for feathered compositing.
//!
//! Every covered canvas pixel gets the product of two hat functions in the
//! source image plane, maximal at the image center and falling to zero at
//! the borders. Downstream blending divides by the accumulated weight.

use image::{ImageBuffer, Luma};

use crate::camera::Intrinsics;
use crate::coordmap::CoordinateMap;

/// Float weight raster, same dimensions as the coordinate map it was built
/// from.
pub type WeightMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Separable tent weight over the map: `(1 − |x−cx|/cx)·(1 − |y−cy|/cy)`
/// with (cx, cy) the source image center, and exactly 0 wherever the mask
/// is 0.
pub fn build_weights(map: &CoordinateMap, intrinsics: &dyn Intrinsics) -> WeightMap {
    let cx = intrinsics.width() as f32 / 2.0;
    let cy = intrinsics.height() as f32 / 2.0;

    let mut weights = WeightMap::new(map.width(), map.height());

    for y in 0..map.height() {
        for x in 0..map.width() {
            if !map.is_covered(x, y) {
                continue;
            }

            let [sx, sy] = map.coord(x, y);
            let wx = 1.0 - ((sx as f32 - cx) / cx).abs();
            let wy = 1.0 - ((sy as f32 - cy) / cy).abs();
            weights.put_pixel(x, y, Luma([wx * wy]));
        }
    }

    weights
}
