//! Gaussian-prefiltered image pyramid for anti-aliased minification.
//!
//! Level 0 is the source; every further level is the previous one convolved
//! with a 5-tap integrated-Gaussian kernel and decimated by plain 2×
//! subsampling. The level count follows the source size so the smallest
//! level never drops below 32 px on its short side.

use image::Rgb32FImage;
use rayon::prelude::*;
use std::f64::consts::SQRT_2;

/// Prefilter tap count.
const KERNEL_LENGTH: usize = 5;

/// Half-width of the integration domain in standard deviations.
const KERNEL_SIGMA: f64 = 2.0;

/// Smallest allowed short side of the coarsest level.
const MIN_LEVEL_SIZE: u32 = 32;

/// 1D Gaussian kernel built by integrating a unit normal over `length`
/// equal cells spanning `[-sigma, sigma]`: the cumulative normal is sampled
/// at the cell edges, differenced, and normalized to sum 1.
pub fn gaussian_kernel(length: usize, sigma: f64) -> Vec<f32> {
    let edges: Vec<f64> = (0..=length)
        .map(|i| -sigma + 2.0 * sigma * i as f64 / length as f64)
        .map(|x| 0.5 * (1.0 + libm::erf(x / SQRT_2)))
        .collect();

    let cells: Vec<f64> = edges.windows(2).map(|w| w[1] - w[0]).collect();
    let sum: f64 = cells.iter().sum();

    cells.iter().map(|c| (c / sum) as f32).collect()
}

/// Number of pyramid levels for a `width`×`height` source:
/// `min(limit, floor(log2(min(width, height) / 32)))`, floored at 1 so the
/// source level always exists.
pub fn level_count_for(width: u32, height: u32, limit: usize) -> usize {
    let min_dim = width.min(height);
    if min_dim < 2 * MIN_LEVEL_SIZE {
        return 1;
    }
    let scales = (min_dim as f64 / MIN_LEVEL_SIZE as f64).log2().floor() as usize;
    scales.clamp(1, limit)
}

/// Gaussian half-resolution stack of a linear-RGB source image.
pub struct GaussianPyramid {
    levels: Vec<Rgb32FImage>,
}

impl GaussianPyramid {
    /// Default cap on the number of levels.
    pub const DEFAULT_LEVEL_LIMIT: usize = 64;

    /// Build the pyramid with the default level cap.
    pub fn build(source: &Rgb32FImage) -> Self {
        Self::build_with_limit(source, Self::DEFAULT_LEVEL_LIMIT)
    }

    /// Build the pyramid with an explicit level cap.
    pub fn build_with_limit(source: &Rgb32FImage, limit: usize) -> Self {
        let scales = level_count_for(source.width(), source.height(), limit);
        let kernel = gaussian_kernel(KERNEL_LENGTH, KERNEL_SIGMA);

        let mut levels = Vec::with_capacity(scales);
        levels.push(source.clone());

        for lvl in 0..scales.saturating_sub(1) {
            let filtered = convolve_separable(&levels[lvl], &kernel);
            levels.push(decimate_2x(&filtered));
        }

        Self { levels }
    }

    /// Number of levels (≥ 1).
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Index of the coarsest level.
    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// A single level; level 0 is the unfiltered source.
    pub fn level(&self, idx: usize) -> &Rgb32FImage {
        &self.levels[idx]
    }

    /// All levels, finest first.
    pub fn levels(&self) -> &[Rgb32FImage] {
        &self.levels
    }
}

/// Separable 2D convolution with out-of-bounds taps skipped and the kernel
/// renormalized by the in-bounds weight sum, so borders keep full energy.
fn convolve_separable(src: &Rgb32FImage, kernel: &[f32]) -> Rgb32FImage {
    let (w, h) = src.dimensions();
    let radius = (kernel.len() / 2) as i64;
    let stride = w as usize * 3;

    let src_buf = src.as_raw();

    // Horizontal pass.
    let mut mid = vec![0.0f32; src_buf.len()];
    mid.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, mid_row)| {
            let src_row = &src_buf[y * stride..(y + 1) * stride];
            for x in 0..w as i64 {
                let mut acc = [0.0f32; 3];
                let mut wsum = 0.0f32;
                for (k, &kw) in kernel.iter().enumerate() {
                    let sx = x + k as i64 - radius;
                    if sx < 0 || sx >= w as i64 {
                        continue;
                    }
                    let o = sx as usize * 3;
                    acc[0] += kw * src_row[o];
                    acc[1] += kw * src_row[o + 1];
                    acc[2] += kw * src_row[o + 2];
                    wsum += kw;
                }
                let o = x as usize * 3;
                mid_row[o] = acc[0] / wsum;
                mid_row[o + 1] = acc[1] / wsum;
                mid_row[o + 2] = acc[2] / wsum;
            }
        });

    // Vertical pass.
    let mut out = vec![0.0f32; src_buf.len()];
    out.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, out_row)| {
            for x in 0..w as usize {
                let mut acc = [0.0f32; 3];
                let mut wsum = 0.0f32;
                for (k, &kw) in kernel.iter().enumerate() {
                    let sy = y as i64 + k as i64 - radius;
                    if sy < 0 || sy >= h as i64 {
                        continue;
                    }
                    let o = sy as usize * stride + x * 3;
                    acc[0] += kw * mid[o];
                    acc[1] += kw * mid[o + 1];
                    acc[2] += kw * mid[o + 2];
                    wsum += kw;
                }
                let o = x * 3;
                out_row[o] = acc[0] / wsum;
                out_row[o + 1] = acc[1] / wsum;
                out_row[o + 2] = acc[2] / wsum;
            }
        });

    Rgb32FImage::from_raw(w, h, out).expect("buffer sized from source dimensions")
}

/// Plain 2× decimation: every second sample of the prefiltered image.
fn decimate_2x(src: &Rgb32FImage) -> Rgb32FImage {
    let (w, h) = src.dimensions();
    let (dw, dh) = (w / 2, h / 2);

    let src_buf = src.as_raw();
    let src_stride = w as usize * 3;

    let mut out = vec![0.0f32; dw as usize * dh as usize * 3];
    for y in 0..dh as usize {
        let src_row = &src_buf[(y * 2) * src_stride..];
        let out_row = &mut out[y * dw as usize * 3..(y + 1) * dw as usize * 3];
        for x in 0..dw as usize {
            let so = x * 2 * 3;
            let oo = x * 3;
            out_row[oo] = src_row[so];
            out_row[oo + 1] = src_row[so + 1];
            out_row[oo + 2] = src_row[so + 2];
        }
    }

    Rgb32FImage::from_raw(dw, dh, out).expect("buffer sized from halved dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgb;

    fn constant_image(w: u32, h: u32, v: f32) -> Rgb32FImage {
        Rgb32FImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    #[test]
    fn kernel_sums_to_one_and_is_symmetric() {
        let k = gaussian_kernel(5, 2.0);
        let sum: f32 = k.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        assert_relative_eq!(k[0], k[4], epsilon = 1e-7);
        assert_relative_eq!(k[1], k[3], epsilon = 1e-7);
        assert!(k[2] > k[1] && k[1] > k[0]);
    }

    #[test]
    fn level_count_matches_size_rule() {
        // floor(log2(1024 / 32)) = 5
        assert_eq!(level_count_for(1024, 1024, 64), 5);
        // limited by the shorter side: floor(log2(512 / 32)) = 4
        assert_eq!(level_count_for(2048, 512, 64), 4);
        // explicit cap wins
        assert_eq!(level_count_for(1024, 1024, 3), 3);
        // too small to downscale
        assert_eq!(level_count_for(48, 48, 64), 1);
    }

    #[test]
    fn pyramid_level_sizes_halve() {
        let src = constant_image(256, 128, 0.5);
        let pyr = GaussianPyramid::build(&src);
        assert_eq!(pyr.level_count(), 2);
        assert_eq!(pyr.level(0).dimensions(), (256, 128));
        assert_eq!(pyr.level(1).dimensions(), (128, 64));
    }

    #[test]
    fn constant_image_survives_filtering() {
        let src = constant_image(256, 256, 0.25);
        let pyr = GaussianPyramid::build(&src);
        for lvl in pyr.levels() {
            for p in lvl.pixels() {
                assert_relative_eq!(p.0[0], 0.25, epsilon = 1e-5);
                assert_relative_eq!(p.0[2], 0.25, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn filtering_smooths_an_impulse() {
        let mut src = constant_image(128, 128, 0.0);
        src.put_pixel(32, 32, Rgb([1.0, 1.0, 1.0]));
        let pyr = GaussianPyramid::build_with_limit(&src, 2);
        // The impulse lands on an even coordinate, so its decimated
        // neighborhood keeps some energy but far less than the peak.
        let coarse = pyr.level(1);
        let center = coarse.get_pixel(16, 16).0[0];
        assert!(center > 0.0 && center < 0.5);
    }
}
