//! Image reading and raster output.
//!
//! Sources are decoded into linear-RGB float rasters: EXR (and any other
//! float input) is taken as already linear, 8-bit inputs go through the sRGB
//! transfer inversion. Outputs are float EXR for color and weights (the
//! weight map as a single-channel layer) and 8-bit PNG for coverage masks.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Rgb32FImage};

use panowarp_core::alpha::WeightMap;

// ── Error type ─────────────────────────────────────────────────────────────

/// Failures at the raster I/O boundary.
#[derive(Debug)]
pub enum ImageIoError {
    /// A source image could not be opened or decoded.
    Read {
        path: PathBuf,
        source: image::ImageError,
    },
    /// A PNG raster could not be written.
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
    /// An EXR raster could not be written.
    Exr {
        path: PathBuf,
        source: exr::error::Error,
    },
}

impl std::fmt::Display for ImageIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "cannot read image {}: {}", path.display(), source)
            }
            Self::Write { path, source } => {
                write!(f, "cannot write image {}: {}", path.display(), source)
            }
            Self::Exr { path, source } => {
                write!(f, "cannot write EXR {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ImageIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            Self::Exr { source, .. } => Some(source),
        }
    }
}

// ── Reading ────────────────────────────────────────────────────────────────

/// Invert the sRGB transfer function (breakpoint at 0.04045).
pub fn srgb_to_linear(v: u8) -> f32 {
    let cs = v as f32 / 255.0;
    if cs <= 0.04045 {
        cs / 12.92
    } else {
        ((cs + 0.055) / 1.055).powf(2.4)
    }
}

/// Decode a source image into a linear-RGB float raster.
pub fn read_image_linear(path: &Path) -> Result<Rgb32FImage, ImageIoError> {
    let decoded = image::open(path).map_err(|source| ImageIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(match decoded {
        // Float inputs are linear by convention.
        DynamicImage::ImageRgb32F(img) => img,
        img @ DynamicImage::ImageRgba32F(_) => img.to_rgb32f(),
        // Everything else is assumed sRGB-encoded.
        other => {
            let rgb = other.to_rgb8();
            let mut out = Rgb32FImage::new(rgb.width(), rgb.height());
            for (src, dst) in rgb.pixels().zip(out.pixels_mut()) {
                dst.0 = [
                    srgb_to_linear(src.0[0]),
                    srgb_to_linear(src.0[1]),
                    srgb_to_linear(src.0[2]),
                ];
            }
            out
        }
    })
}

// ── Writing ────────────────────────────────────────────────────────────────

/// Write a linear-RGB float raster as a three-channel EXR.
pub fn write_color_exr(path: &Path, color: &Rgb32FImage) -> Result<(), ImageIoError> {
    let (w, h) = color.dimensions();
    exr::prelude::write_rgb_file(path, w as usize, h as usize, |x, y| {
        let p = color.get_pixel(x as u32, y as u32).0;
        (p[0], p[1], p[2])
    })
    .map_err(|source| ImageIoError::Exr {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a weight raster as a single-channel float EXR layer.
pub fn write_weights_exr(path: &Path, weights: &WeightMap) -> Result<(), ImageIoError> {
    use exr::prelude::*;

    let (w, h) = weights.dimensions();
    let samples = weights.as_raw().clone();

    let layer = Layer::new(
        (w as usize, h as usize),
        LayerAttributes::named("weights"),
        Encoding::FAST_LOSSLESS,
        AnyChannels {
            list: SmallVec::from_vec(vec![AnyChannel::new("Y", FlatSamples::F32(samples))]),
        },
    );

    Image::from_layer(layer)
        .write()
        .to_file(path)
        .map_err(|source| ImageIoError::Exr {
            path: path.to_path_buf(),
            source,
        })
}

/// Write a 0/1 coverage mask as an 8-bit PNG (0/255).
pub fn write_mask_png(path: &Path, mask: &GrayImage) -> Result<(), ImageIoError> {
    let mut out = GrayImage::new(mask.width(), mask.height());
    for (src, dst) in mask.pixels().zip(out.pixels_mut()) {
        dst.0[0] = if src.0[0] != 0 { 255 } else { 0 };
    }
    out.save(path).map_err(|source| ImageIoError::Write {
        path: path.to_path_buf(),
        source,
    })
}
