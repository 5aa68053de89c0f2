//! The per-view driver.
//!
//! Resolves the output canvas size (requested or estimated), then walks the
//! reconstructable views in image-path order: build the coordinate map, load
//! the source, build its pyramid, warp, build weights, write the three
//! rasters and append a manifest entry. A failing view is logged and
//! skipped; only scene-level problems abort the run.

use std::path::{Path, PathBuf};

use panowarp_core::alpha;
use panowarp_core::warp;
use panowarp_core::{CoordinateMap, GaussianPyramid, PanoramaSize};

use crate::io;
use crate::manifest::{Manifest, ViewEntry};
use crate::scene::Scene;

// ── Error type ─────────────────────────────────────────────────────────────

/// Scene-level pipeline failures (per-view failures only skip the view).
#[derive(Debug)]
pub enum PipelineError {
    /// The output directory could not be created.
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The manifest could not be serialized or written.
    WriteManifest {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateOutputDir { path, source } => {
                write!(f, "cannot create output dir {}: {}", path.display(), source)
            }
            Self::WriteManifest { path, source } => {
                write!(f, "cannot write manifest {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

// ── Panorama size resolution ───────────────────────────────────────────────

/// Canvas size for an estimated median scale: the 512×256 seed grown by the
/// largest power of two under the median, floored at the minimum width.
pub fn optimal_size_from_median_scale(median: f64) -> PanoramaSize {
    let seed = PanoramaSize::estimation_seed();
    let multiplier = f64::powi(2.0, median.log2().floor() as i32);

    let width = ((seed.width as f64 * multiplier) as u32).max(PanoramaSize::MIN_WIDTH);
    PanoramaSize {
        width,
        height: width / 2,
    }
}

/// Estimate the canvas size from the views: build every view's coordinate
/// map against the seed canvas, take the median of the per-view median
/// scales. Fewer than two usable views keep the seed.
pub fn estimate_panorama_size(scene: &Scene) -> PanoramaSize {
    let seed = PanoramaSize::estimation_seed();

    let mut scales = Vec::new();
    for view in scene.reconstructable_views() {
        let Some(model) = view.intrinsic.as_deref().and_then(|id| scene.intrinsic(id)) else {
            continue;
        };
        let Some(desc) = &view.pose else { continue };

        let pose = match desc.to_pose() {
            Ok(pose) => pose,
            Err(err) => {
                tracing::warn!("skipping {} in size estimate: {}", view.image.display(), err);
                continue;
            }
        };

        let Ok(map) = CoordinateMap::build(seed, &pose, model.as_intrinsics()) else {
            continue;
        };
        if let Some(scale) = map.median_scale() {
            scales.push(scale);
        }
    }

    if scales.len() <= 1 {
        return seed;
    }

    let mid = scales.len() / 2;
    let (_, median, _) = scales.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    optimal_size_from_median_scale(*median)
}

/// Resolve the canvas: a positive requested width is rounded up, anything
/// else is estimated from the scene.
pub fn resolve_panorama_size(scene: &Scene, requested_width: Option<u32>) -> PanoramaSize {
    match requested_width {
        Some(w) if w > 0 => PanoramaSize::from_width(w),
        _ => estimate_panorama_size(scene),
    }
}

// ── Driver ─────────────────────────────────────────────────────────────────

/// Warp every reconstructable view of the scene into `output_dir` and write
/// the manifest. Returns the manifest on success.
pub fn warp_scene(
    scene: &Scene,
    output_dir: &Path,
    requested_width: Option<u32>,
) -> Result<Manifest, PipelineError> {
    std::fs::create_dir_all(output_dir).map_err(|source| PipelineError::CreateOutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let size = resolve_panorama_size(scene, requested_width);
    tracing::info!("chosen panorama size: {}x{}", size.width, size.height);

    let mut manifest = Manifest::new(size);
    let mut pos = 0usize;

    for view in &scene.views {
        if !view.is_reconstructable() {
            tracing::info!(
                "skipping view {}: missing pose or intrinsics",
                view.image.display()
            );
        }
    }

    for view in scene.reconstructable_views() {
        tracing::info!("processing view {}", view.image.display());

        let Some(model) = view.intrinsic.as_deref().and_then(|id| scene.intrinsic(id)) else {
            tracing::warn!(
                "skipping view {}: unresolved intrinsic reference",
                view.image.display()
            );
            continue;
        };
        let Some(pose_desc) = &view.pose else { continue };
        let pose = match pose_desc.to_pose() {
            Ok(pose) => pose,
            Err(err) => {
                tracing::warn!("skipping view {}: {}", view.image.display(), err);
                continue;
            }
        };

        let map = match CoordinateMap::build(size, &pose, model.as_intrinsics()) {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!("skipping view {}: {}", view.image.display(), err);
                continue;
            }
        };

        tracing::info!("loading image {}", view.image.display());
        let source = match io::read_image_linear(&view.image) {
            Ok(img) => img,
            Err(err) => {
                tracing::warn!("skipping view {}: {}", view.image.display(), err);
                continue;
            }
        };

        let pyramid = GaussianPyramid::build(&source);
        let warped = warp::warp(&map, &source, Some(&pyramid));
        let weights = alpha::build_weights(&map, model.as_intrinsics());

        let view_path = output_dir.join(format!("view_{pos}.exr"));
        let mask_path = output_dir.join(format!("mask_{pos}.png"));
        let weights_path = output_dir.join(format!("weightmap_{pos}.exr"));

        let written = io::write_color_exr(&view_path, &warped.color)
            .and_then(|()| io::write_mask_png(&mask_path, &warped.mask))
            .and_then(|()| io::write_weights_exr(&weights_path, &weights));
        if let Err(err) = written {
            tracing::warn!("skipping view {}: {}", view.image.display(), err);
            continue;
        }
        tracing::info!("stored view {} at {}", pos, view_path.display());

        manifest.views.push(ViewEntry {
            filename_view: view_path.display().to_string(),
            filename_mask: mask_path.display().to_string(),
            filename_weights: weights_path.display().to_string(),
            offsetx: warped.offset_x,
            offsety: warped.offset_y,
        });
        pos += 1;
        // Source, pyramid and warp buffers drop here, before the next view.
    }

    let manifest_path = output_dir.join("config_views.json");
    tracing::info!("saving manifest {}", manifest_path.display());
    let json = manifest
        .to_json_pretty()
        .map_err(|source| PipelineError::WriteManifest {
            path: manifest_path.clone(),
            source: Box::new(source),
        })?;
    std::fs::write(&manifest_path, json).map_err(|source| PipelineError::WriteManifest {
        path: manifest_path.clone(),
        source: Box::new(source),
    })?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn median_scale_of_3_7_doubles_the_seed() {
        let size = optimal_size_from_median_scale(3.7);
        assert_eq!((size.width, size.height), (1024, 512));
    }

    #[test]
    fn unit_scale_keeps_the_seed() {
        let size = optimal_size_from_median_scale(1.0);
        assert_eq!((size.width, size.height), (512, 256));
    }

    #[test]
    fn large_scale_grows_by_powers_of_two() {
        let size = optimal_size_from_median_scale(9.0);
        assert_eq!((size.width, size.height), (4096, 2048));
        assert_relative_eq!(size.width as f64 / 512.0, 8.0);
    }

    #[test]
    fn sub_unit_scale_respects_minimum_width() {
        let size = optimal_size_from_median_scale(0.3);
        assert!(size.width >= PanoramaSize::MIN_WIDTH);
    }

    #[test]
    fn requested_width_wins_over_estimation() {
        let scene = Scene::default();
        let size = resolve_panorama_size(&scene, Some(3000));
        assert_eq!((size.width, size.height), (3072, 1536));
    }

    #[test]
    fn empty_scene_estimates_the_seed() {
        let scene = Scene::default();
        let size = resolve_panorama_size(&scene, None);
        assert_eq!((size.width, size.height), (512, 256));
        // Zero and negative-like requests estimate as well.
        let size = resolve_panorama_size(&scene, Some(0));
        assert_eq!(size.width, 512);
    }
}
