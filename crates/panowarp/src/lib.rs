//! panowarp — first stage of a panoramic stitching pipeline.
//!
//! Takes a scene descriptor (views with poses and intrinsics), warps every
//! view onto an equirectangular canvas and writes, per view, a cropped color
//! raster, a binary coverage mask, a feathering weight raster and a manifest
//! entry recording the crop's canvas offset. Downstream seam selection and
//! blending consume those outputs.
//!
//! - [`scene`] – the JSON scene descriptor.
//! - [`io`] – linear-color image reading and EXR/PNG writing.
//! - [`manifest`] – the `config_views.json` document.
//! - [`process`] – the per-view driver and panorama size estimation.
//!
//! The geometry itself (bounding boxes, coordinate maps, pyramids, the
//! resampler) lives in [`panowarp_core`].

pub mod io;
pub mod manifest;
pub mod process;
pub mod scene;

pub use manifest::{Manifest, ViewEntry};
pub use process::{warp_scene, PipelineError};
pub use scene::{IntrinsicModel, PoseDescriptor, Scene, SceneError, ViewDescriptor};

pub use panowarp_core::{GeometryError, PanoramaSize};
