//! The `config_views.json` document handed to downstream compositing.

use serde::{Deserialize, Serialize};

use panowarp_core::PanoramaSize;

/// Per-view record: output raster paths and the crop's canvas offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewEntry {
    /// Warped color raster (EXR).
    pub filename_view: String,
    /// Binary coverage mask (PNG).
    pub filename_mask: String,
    /// Feathering weights (EXR).
    pub filename_weights: String,
    /// Canvas column of the crop's left edge.
    pub offsetx: u32,
    /// Canvas row of the crop's top edge.
    pub offsety: u32,
}

/// The whole manifest: canvas dimensions plus one entry per emitted view,
/// in processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "panoramaWidth")]
    pub panorama_width: u32,
    #[serde(rename = "panoramaHeight")]
    pub panorama_height: u32,
    pub views: Vec<ViewEntry>,
}

impl Manifest {
    /// Empty manifest for a canvas.
    pub fn new(size: PanoramaSize) -> Self {
        Self {
            panorama_width: size.width,
            panorama_height: size.height,
            views: Vec::new(),
        }
    }

    /// Pretty-printed JSON document.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
