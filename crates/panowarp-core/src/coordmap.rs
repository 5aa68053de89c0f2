//! Canvas bounding box and dense panorama → source coordinate map.
//!
//! Building a view's map runs in two stages. The coarse stage bounds the
//! view footprint on the canvas with an eight-point spherical polygon,
//! handling the two topological hazards of equirectangular projection:
//! a footprint containing a pole spans every column, and a footprint
//! crossing the longitude seam wraps around the canvas edge. The dense
//! stage then projects every candidate canvas pixel into the source image,
//! records the subpixel hit and a coverage bit, and shrinks the buffers to
//! the covered extent.

use image::GrayImage;
use rayon::prelude::*;

use crate::camera::{Intrinsics, Pose};
use crate::sphere;
use crate::spherical;
use crate::{GeometryError, PanoramaSize};

/// Integer rectangle on the canvas.
///
/// `left` may exceed the canvas width when the footprint wraps the longitude
/// seam; the canvas is horizontally periodic and consumers reduce offsets
/// modulo the width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Conservative canvas bounding box of a view footprint.
///
/// Eight boundary samples (corners and edge midpoints of the square of
/// half-side `maximal_distortion(0, r_max)` in the metric plane) are lifted
/// to the sphere and rotated into the panorama frame; the polygon they form
/// bounds the footprint. Vertical extent tracks every edge's latitude
/// extremum; a pole inside the polygon forces the full canvas width.
pub fn compute_coarse_bbox(
    panorama: PanoramaSize,
    pose: &Pose,
    intrinsics: &dyn Intrinsics,
) -> BBox {
    let pano_w = panorama.width as i32;
    let pano_h = panorama.height as i32;
    let (img_w, img_h) = (intrinsics.width() as f64, intrinsics.height() as f64);

    // Worst-case metric radius over the image corners, then over distortion.
    let corners = [[0.0, 0.0], [img_w, 0.0], [img_w, img_h], [0.0, img_h]];
    let max_radius = corners
        .iter()
        .map(|&c| {
            let m = intrinsics.image_to_camera(c);
            (m[0] * m[0] + m[1] * m[1]).sqrt()
        })
        .fold(0.0f64, f64::max);
    let r = intrinsics.maximal_distortion(0.0, max_radius);

    // Boundary square: corners and edge midpoints, consecutive along the rim.
    let rim = [
        [-r, -r],
        [0.0, -r],
        [r, -r],
        [r, 0.0],
        [r, r],
        [0.0, r],
        [-r, r],
        [-r, 0.0],
    ];
    let pts: Vec<nalgebra::Vector3<f64>> = rim
        .iter()
        .map(|&[x, y]| pose.to_panorama(&nalgebra::Vector3::new(x, y, 1.0).normalize()))
        .collect();

    // Vertical extent: endpoints and per-edge latitude extrema.
    let mut top = pano_h;
    let mut bottom = 0i32;
    for i in 0..8 {
        let j = (i + 1) % 8;

        let extrema = sphere::arc_extrema_y(&pts[i], &pts[j]);
        let e = spherical::to_equirectangular(&extrema, panorama.width, panorama.height);
        top = top.min(e[1].floor() as i32);
        bottom = bottom.max(e[1].ceil() as i32);

        let p = spherical::to_equirectangular(&pts[i], panorama.width, panorama.height);
        top = top.min(p[1].floor() as i32);
        bottom = bottom.max(p[1].ceil() as i32);
    }

    // Pole containment over a fixed fan of six triangles.
    let fan = [(0, 1, 7), (1, 2, 3), (3, 4, 5), (7, 5, 6), (1, 3, 5), (1, 5, 7)];
    let pole = fan
        .iter()
        .any(|&(a, b, c)| sphere::pole_in_spherical_triangle(&pts[a], &pts[b], &pts[c]));

    if pole {
        let normal = (pts[1] - pts[0]).cross(&(pts[3] - pts[0]));
        if normal.y > 0.0 {
            bottom = pano_h - 1;
        } else {
            top = 0;
        }
    }

    top = top.clamp(0, pano_h - 1);
    bottom = bottom.clamp(0, pano_h - 1);
    let height = bottom - top + 1;

    // Horizontal extent.
    let (left, width) = if pole {
        (0, pano_w)
    } else if let Some(first_cross) =
        (0..8).find(|&i| sphere::crosses_horizontal_loop(&pts[i], &pts[(i + 1) % 8]))
    {
        horizontal_extent_across_seam(panorama, &pts, first_cross)
    } else {
        let mut lo = pano_w;
        let mut hi = 0i32;
        for p in &pts {
            let e = spherical::to_equirectangular(p, panorama.width, panorama.height);
            lo = lo.min(e[0].floor() as i32);
            hi = hi.max(e[0].ceil() as i32);
        }
        (lo, hi - lo + 1)
    };

    // An inconclusive seam walk degrades to the full canvas width.
    let (left, width) = if width <= 0 || width > pano_w {
        (0, pano_w)
    } else {
        (left, width)
    };

    BBox {
        left,
        top,
        width,
        height,
    }
}

/// Horizontal extent when at least one polygon edge crosses the seam.
///
/// Walks the eight edges starting from the first crossing one. A crossing
/// edge contributes its larger-longitude endpoint to the left bound and the
/// smaller to the right bound; between crossings the polygon body extends
/// whichever side the last crossing selected. The wrapped width is
/// `right + (W − left)`.
fn horizontal_extent_across_seam(
    panorama: PanoramaSize,
    pts: &[nalgebra::Vector3<f64>],
    first_cross: usize,
) -> (i32, i32) {
    let pano_w = panorama.width as i32;

    let mut left = pano_w - 1;
    let mut right = 0i32;
    let mut on_right = true;

    for step in 0..8 {
        let i = (step + first_cross) % 8;
        let j = (i + 1) % 8;

        let a = spherical::to_equirectangular(&pts[i], panorama.width, panorama.height);
        let b = spherical::to_equirectangular(&pts[j], panorama.width, panorama.height);

        if sphere::crosses_horizontal_loop(&pts[i], &pts[j]) {
            if a[0] > b[0] {
                left = left.min(a[0] as i32);
                right = right.max(b[0] as i32);
                on_right = true;
            } else {
                left = left.min(b[0] as i32);
                right = right.max(a[0] as i32);
                on_right = false;
            }
        } else if on_right {
            right = right.max(a[0] as i32).max(b[0] as i32);
        } else {
            left = left.min(a[0] as i32).min(b[0] as i32);
        }
    }

    (left, right + (pano_w - left))
}

/// Per-row coverage extrema, merged across the parallel sweep.
#[derive(Debug, Clone, Copy)]
struct Extrema {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl Extrema {
    fn empty() -> Self {
        Self {
            min_x: usize::MAX,
            min_y: usize::MAX,
            max_x: 0,
            max_y: 0,
        }
    }

    fn include(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn merge(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn is_empty(&self) -> bool {
        self.min_x == usize::MAX
    }
}

/// Dense map from canvas pixels to source subpixel coordinates, cropped to
/// the covered extent.
///
/// Wherever the mask is 0 the stored coordinate is meaningless; wherever it
/// is 1 the coordinate lies strictly inside the source's visible domain.
#[derive(Debug)]
pub struct CoordinateMap {
    offset_x: u32,
    offset_y: u32,
    coords: Vec<[f64; 2]>,
    mask: GrayImage,
}

impl CoordinateMap {
    /// Project every canvas pixel of the coarse bounding box into the view.
    ///
    /// The sweep is parallel over canvas rows; each row owns its slice of
    /// the buffers and the four coverage extrema are reduced across rows.
    pub fn build(
        panorama: PanoramaSize,
        pose: &Pose,
        intrinsics: &dyn Intrinsics,
    ) -> Result<Self, GeometryError> {
        let coarse = compute_coarse_bbox(panorama, pose, intrinsics);
        tracing::debug!(
            "coarse bbox left={} top={} size={}x{}",
            coarse.left,
            coarse.top,
            coarse.width,
            coarse.height
        );
        let bw = coarse.width as usize;
        let bh = coarse.height as usize;

        let mut coords = vec![[0.0f64; 2]; bw * bh];
        let mut mask = vec![0u8; bw * bh];

        let extrema = coords
            .par_chunks_mut(bw)
            .zip(mask.par_chunks_mut(bw))
            .enumerate()
            .map(|(y, (coord_row, mask_row))| {
                let cy = (coarse.top + y as i32) as f64;
                let mut row = Extrema::empty();

                for x in 0..bw {
                    let cx = (coarse.left + x as i32) as f64;
                    let ray =
                        spherical::from_equirectangular([cx, cy], panorama.width, panorama.height);

                    if !intrinsics.is_visible_ray(&pose.to_camera(&ray)) {
                        continue;
                    }

                    let pixel = intrinsics.project(pose, &ray, true);
                    if !intrinsics.is_visible_pixel(pixel) {
                        continue;
                    }

                    coord_row[x] = pixel;
                    mask_row[x] = 1;
                    row.include(x, y);
                }

                row
            })
            .reduce(Extrema::empty, Extrema::merge);

        if extrema.is_empty() {
            return Err(GeometryError::EmptyFootprint);
        }

        // Shrink to the covered extent; the coarse box may cross the seam
        // while the covered pixels all sit past it.
        let mut offset_x = coarse.left + extrema.min_x as i32;
        if offset_x > panorama.width as i32 {
            offset_x -= panorama.width as i32;
        }
        let offset_y = coarse.top + extrema.min_y as i32;

        let real_w = extrema.max_x - extrema.min_x + 1;
        let real_h = extrema.max_y - extrema.min_y + 1;

        let mut out_coords = Vec::with_capacity(real_w * real_h);
        let mut out_mask = GrayImage::new(real_w as u32, real_h as u32);
        for y in 0..real_h {
            let src_off = (extrema.min_y + y) * bw + extrema.min_x;
            out_coords.extend_from_slice(&coords[src_off..src_off + real_w]);
            for x in 0..real_w {
                out_mask.put_pixel(x as u32, y as u32, image::Luma([mask[src_off + x]]));
            }
        }

        Ok(Self {
            offset_x: offset_x as u32,
            offset_y: offset_y as u32,
            coords: out_coords,
            mask: out_mask,
        })
    }

    /// Canvas column of the map's left edge.
    pub fn offset_x(&self) -> u32 {
        self.offset_x
    }

    /// Canvas row of the map's top edge.
    pub fn offset_y(&self) -> u32 {
        self.offset_y
    }

    /// Cropped map width.
    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    /// Cropped map height.
    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    /// Coverage mask (1 = covered), same dimensions as the coordinates.
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Whether the canvas pixel at local (x, y) is covered by the view.
    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y).0[0] != 0
    }

    /// Source subpixel coordinate at local (x, y); meaningless when the
    /// mask is 0 there.
    pub fn coord(&self, x: u32, y: u32) -> [f64; 2] {
        self.coords[y as usize * self.mask.width() as usize + x as usize]
    }

    /// Median local minification factor, from the Jacobian of the map over
    /// every interior covered 2×2 cell. `None` when fewer than two cells
    /// are covered.
    pub fn median_scale(&self) -> Option<f64> {
        let w = self.width();
        let h = self.height();

        let mut scales = Vec::new();
        for y in 0..h.saturating_sub(1) {
            for x in 0..w.saturating_sub(1) {
                if !self.is_covered(x, y)
                    || !self.is_covered(x + 1, y)
                    || !self.is_covered(x, y + 1)
                {
                    continue;
                }

                let c = self.coord(x, y);
                let cx = self.coord(x + 1, y);
                let cy = self.coord(x, y + 1);

                let dxx = cx[0] - c[0];
                let dxy = cy[0] - c[0];
                let dyx = cx[1] - c[1];
                let dyy = cy[1] - c[1];

                let det = (dxx * dyy - dxy * dyx).abs();
                scales.push(det.sqrt());
            }
        }

        if scales.len() <= 1 {
            return None;
        }

        let mid = scales.len() / 2;
        let (_, median, _) = scales.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        Some(*median)
    }

    #[cfg(test)]
    pub(crate) fn from_raw(
        offset_x: u32,
        offset_y: u32,
        width: u32,
        height: u32,
        coords: Vec<[f64; 2]>,
        mask: Vec<u8>,
    ) -> Self {
        assert_eq!(coords.len(), (width * height) as usize);
        Self {
            offset_x,
            offset_y,
            coords,
            mask: GrayImage::from_raw(width, height, mask).expect("mask buffer size"),
        }
    }
}
