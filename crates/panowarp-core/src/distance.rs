//! Masked distance transform for the downstream feathering stage.
//!
//! Computes, for every pixel, the exact squared Euclidean distance to the
//! nearest zero-mask pixel (zero on the uncovered pixels themselves). Two
//! passes: a per-column sweep producing vertical run lengths, then the
//! classic per-row lower-envelope scan. The envelope bookkeeping uses two
//! integer arrays of scanline length.

use image::{GrayImage, ImageBuffer, Luma};

/// Squared distance raster of `mask`'s dimensions.
pub fn masked_squared_distance(mask: &GrayImage) -> ImageBuffer<Luma<u32>, Vec<u32>> {
    let (w, h) = mask.dimensions();
    let n = w as usize;
    let m = h as usize;
    if n == 0 || m == 0 {
        return ImageBuffer::new(w, h);
    }

    let covered = |x: usize, y: usize| mask.get_pixel(x as u32, y as u32).0[0] != 0;
    let inf = (n + m) as i64;

    // Column pass: vertical distance to the nearest zero, capped at inf for
    // columns without one.
    let mut g = vec![0i64; n * m];
    for x in 0..n {
        g[x] = if covered(x, 0) { inf } else { 0 };
        for y in 1..m {
            g[y * n + x] = if covered(x, y) {
                (1 + g[(y - 1) * n + x]).min(inf)
            } else {
                0
            };
        }
        for y in (0..m - 1).rev() {
            if g[(y + 1) * n + x] < g[y * n + x] {
                g[y * n + x] = 1 + g[(y + 1) * n + x];
            }
        }
    }

    // Row pass: lower envelope of the parabolas (x − i)² + g(i)², tracked
    // with minimizer positions `s` and segment starts `t`.
    let mut out = vec![0u32; n * m];
    let mut s = vec![0i64; n];
    let mut t = vec![0i64; n];

    for y in 0..m {
        let row = &g[y * n..(y + 1) * n];
        let f = |x: i64, i: i64| {
            let gi = row[i as usize];
            (x - i) * (x - i) + gi * gi
        };
        let sep = |i: i64, u: i64| {
            let gu = row[u as usize];
            let gi = row[i as usize];
            (u * u - i * i + gu * gu - gi * gi) / (2 * (u - i))
        };

        let mut q: i64 = 0;
        s[0] = 0;
        t[0] = 0;

        for u in 1..n as i64 {
            while q >= 0 && f(t[q as usize], s[q as usize]) > f(t[q as usize], u) {
                q -= 1;
            }
            if q < 0 {
                q = 0;
                s[0] = u;
            } else {
                let start = 1 + sep(s[q as usize], u);
                if start < n as i64 {
                    q += 1;
                    s[q as usize] = u;
                    t[q as usize] = start;
                }
            }
        }

        for u in (0..n as i64).rev() {
            out[y * n + u as usize] = f(u, s[q as usize]) as u32;
            if u == t[q as usize] {
                q -= 1;
            }
        }
    }

    ImageBuffer::from_raw(w, h, out).expect("buffer sized from mask dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_from(rows: &[&[u8]]) -> GrayImage {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        let mut img = GrayImage::new(w, h);
        for (y, row) in rows.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                img.put_pixel(x as u32, y as u32, Luma([v]));
            }
        }
        img
    }

    /// O(n²) reference used to validate the envelope scan.
    fn brute_force(mask: &GrayImage) -> Vec<u32> {
        let (w, h) = mask.dimensions();
        let zeros: Vec<(i64, i64)> = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .filter(|&(x, y)| mask.get_pixel(x, y).0[0] == 0)
            .map(|(x, y)| (x as i64, y as i64))
            .collect();

        let mut out = Vec::new();
        for y in 0..h as i64 {
            for x in 0..w as i64 {
                let d = zeros
                    .iter()
                    .map(|&(zx, zy)| (x - zx) * (x - zx) + (y - zy) * (y - zy))
                    .min()
                    .unwrap_or(((w + h) * (w + h)) as i64);
                out.push(d as u32);
            }
        }
        out
    }

    #[test]
    fn zero_pixels_have_zero_distance() {
        let mask = mask_from(&[&[1, 1, 0], &[1, 1, 1], &[0, 1, 1]]);
        let d = masked_squared_distance(&mask);
        assert_eq!(d.get_pixel(2, 0).0[0], 0);
        assert_eq!(d.get_pixel(0, 2).0[0], 0);
    }

    #[test]
    fn single_hole_gives_euclidean_squares() {
        // One zero at (2, 1) in an otherwise covered 5×4 mask.
        let mut rows = vec![vec![1u8; 5]; 4];
        rows[1][2] = 0;
        let refs: Vec<&[u8]> = rows.iter().map(|r| r.as_slice()).collect();
        let mask = mask_from(&refs);

        let d = masked_squared_distance(&mask);
        assert_eq!(d.get_pixel(2, 1).0[0], 0);
        assert_eq!(d.get_pixel(3, 1).0[0], 1);
        assert_eq!(d.get_pixel(2, 3).0[0], 4);
        assert_eq!(d.get_pixel(4, 3).0[0], 8);
    }

    #[test]
    fn matches_brute_force_on_irregular_mask() {
        let mask = mask_from(&[
            &[0, 1, 1, 1, 1, 1, 1],
            &[1, 1, 1, 0, 1, 1, 1],
            &[1, 1, 1, 1, 1, 1, 1],
            &[1, 0, 1, 1, 1, 1, 0],
            &[1, 1, 1, 1, 1, 1, 1],
        ]);
        let fast = masked_squared_distance(&mask);
        let slow = brute_force(&mask);
        assert_eq!(fast.as_raw(), &slow);
    }

    #[test]
    fn fully_uncovered_mask_is_all_zero() {
        let mask = GrayImage::new(6, 3);
        let d = masked_squared_distance(&mask);
        assert!(d.as_raw().iter().all(|&v| v == 0));
    }
}
