//! Runtime scene descriptor.
//!
//! A scene is a JSON document enumerating views (image path, intrinsic id,
//! optional pose) next to a table of named intrinsic models. Views missing
//! either the pose or the intrinsic reference are kept in the document but
//! reported as not reconstructable; the orchestrator skips them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use panowarp_core::{FisheyeEquidistant, GeometryError, Intrinsics, Pinhole, Pose};

// ── Error type ─────────────────────────────────────────────────────────────

/// Failures while loading or validating a scene document.
#[derive(Debug)]
pub enum SceneError {
    /// The scene file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The scene file is not valid JSON for the descriptor schema.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A view references an intrinsic id missing from the table.
    UnknownIntrinsic { image: PathBuf, id: String },
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read scene {}: {}", path.display(), source)
            }
            Self::Json { path, source } => {
                write!(f, "cannot parse scene {}: {}", path.display(), source)
            }
            Self::UnknownIntrinsic { image, id } => {
                write!(
                    f,
                    "view {} references unknown intrinsic \"{}\"",
                    image.display(),
                    id
                )
            }
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::UnknownIntrinsic { .. } => None,
        }
    }
}

// ── Descriptor types ───────────────────────────────────────────────────────

/// Camera pose as stored in the descriptor: row-major rotation from the
/// panorama frame to the camera frame, plus the optical center.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseDescriptor {
    /// Row-major 3×3 rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Optical center; unused by warping geometry but carried through.
    #[serde(default)]
    pub center: [f64; 3],
}

impl PoseDescriptor {
    /// Convert to a validated [`Pose`].
    pub fn to_pose(&self) -> Result<Pose, GeometryError> {
        let r = self.rotation;
        let rotation = Matrix3::new(
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            r[2][0], r[2][1], r[2][2],
        );
        let center = Vector3::new(self.center[0], self.center[1], self.center[2]);
        Pose::new(rotation, center)
    }
}

/// An intrinsic model from the scene table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntrinsicModel {
    /// Pinhole projection, optionally with radial distortion.
    Pinhole(Pinhole),
    /// Equidistant fisheye.
    Fisheye(FisheyeEquidistant),
}

impl IntrinsicModel {
    /// The capability surface the warping engine consumes.
    pub fn as_intrinsics(&self) -> &dyn Intrinsics {
        match self {
            Self::Pinhole(p) => p,
            Self::Fisheye(f) => f,
        }
    }
}

/// One captured view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDescriptor {
    /// Path to the source image, absolute or relative to the working
    /// directory.
    pub image: PathBuf,
    /// Id into the scene's intrinsics table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intrinsic: Option<String>,
    /// Camera pose; views without one are skipped by the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<PoseDescriptor>,
}

impl ViewDescriptor {
    /// Whether both pose and intrinsic reference are present.
    pub fn is_reconstructable(&self) -> bool {
        self.intrinsic.is_some() && self.pose.is_some()
    }
}

/// The full scene document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Captured views, in document order.
    #[serde(default)]
    pub views: Vec<ViewDescriptor>,
    /// Named intrinsic models referenced by the views.
    #[serde(default)]
    pub intrinsics: HashMap<String, IntrinsicModel>,
}

impl Scene {
    /// Load and validate a scene from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, SceneError> {
        let data = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scene: Self = serde_json::from_str(&data).map_err(|source| SceneError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        scene.validate()?;
        Ok(scene)
    }

    /// Check that every intrinsic reference resolves.
    pub fn validate(&self) -> Result<(), SceneError> {
        for view in &self.views {
            if let Some(id) = &view.intrinsic {
                if !self.intrinsics.contains_key(id) {
                    return Err(SceneError::UnknownIntrinsic {
                        image: view.image.clone(),
                        id: id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Look up an intrinsic model by id.
    pub fn intrinsic(&self, id: &str) -> Option<&IntrinsicModel> {
        self.intrinsics.get(id)
    }

    /// Views holding both a pose and an intrinsic reference, sorted by
    /// image path. This is the processing and numbering order.
    pub fn reconstructable_views(&self) -> Vec<&ViewDescriptor> {
        let mut views: Vec<&ViewDescriptor> = self
            .views
            .iter()
            .filter(|v| v.is_reconstructable())
            .collect();
        views.sort_by(|a, b| a.image.cmp(&b.image));
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "views": [
                { "image": "b.jpg", "intrinsic": "cam0",
                  "pose": { "rotation": [[1,0,0],[0,1,0],[0,0,1]], "center": [0,0,0] } },
                { "image": "a.jpg", "intrinsic": "cam0",
                  "pose": { "rotation": [[1,0,0],[0,1,0],[0,0,1]] } },
                { "image": "c.jpg", "intrinsic": "cam0" }
            ],
            "intrinsics": {
                "cam0": { "type": "pinhole", "width": 640, "height": 480,
                          "fx": 500.0, "fy": 500.0, "cx": 320.0, "cy": 240.0 }
            }
        }"#
    }

    #[test]
    fn parses_views_and_intrinsics() {
        let scene: Scene = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(scene.views.len(), 3);
        assert!(scene.intrinsic("cam0").is_some());

        let cam = scene.intrinsic("cam0").unwrap().as_intrinsics();
        assert_eq!((cam.width(), cam.height()), (640, 480));
    }

    #[test]
    fn view_without_pose_is_not_reconstructable() {
        let scene: Scene = serde_json::from_str(sample_json()).unwrap();
        assert!(!scene.views[2].is_reconstructable());
        assert!(scene.views[0].is_reconstructable());
    }

    #[test]
    fn reconstructable_views_sort_by_image_path() {
        let scene: Scene = serde_json::from_str(sample_json()).unwrap();
        let ordered = scene.reconstructable_views();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].image, PathBuf::from("a.jpg"));
        assert_eq!(ordered[1].image, PathBuf::from("b.jpg"));
    }

    #[test]
    fn unknown_intrinsic_fails_validation() {
        let mut scene: Scene = serde_json::from_str(sample_json()).unwrap();
        scene.views[0].intrinsic = Some("nope".into());
        assert!(matches!(
            scene.validate(),
            Err(SceneError::UnknownIntrinsic { .. })
        ));
    }

    #[test]
    fn fisheye_variant_round_trips() {
        let json = r#"{ "type": "fisheye", "width": 1000, "height": 1000,
                        "focal": 320.0, "cx": 500.0, "cy": 500.0, "max_angle": 1.6 }"#;
        let model: IntrinsicModel = serde_json::from_str(json).unwrap();
        assert!(matches!(model, IntrinsicModel::Fisheye(_)));
        let back = serde_json::to_string(&model).unwrap();
        assert!(back.contains("\"type\":\"fisheye\""));
    }

    #[test]
    fn pose_descriptor_rejects_garbage_rotation() {
        let desc = PoseDescriptor {
            rotation: [[1.0, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            center: [0.0; 3],
        };
        assert!(desc.to_pose().is_err());
    }

    #[test]
    fn default_center_is_origin() {
        let json = r#"{ "rotation": [[1,0,0],[0,1,0],[0,0,1]] }"#;
        let desc: PoseDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.center, [0.0; 3]);
        assert!(desc.to_pose().is_ok());
    }
}
