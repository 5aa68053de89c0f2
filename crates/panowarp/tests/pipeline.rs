//! End-to-end pipeline tests on a synthetic scene.

use std::path::{Path, PathBuf};

use image::Rgb;

use panowarp::{warp_scene, Manifest, Scene};

fn unique_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("panowarp-e2e-{}-{}", std::process::id(), tag));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_gradient_png(path: &Path, size: u32) {
    let mut img = image::RgbImage::new(size, size);
    for (x, y, p) in img.enumerate_pixels_mut() {
        *p = Rgb([
            (x * 255 / size) as u8,
            (y * 255 / size) as u8,
            128,
        ]);
    }
    img.save(path).unwrap();
}

/// Three views sharing one 90°-FOV pinhole: one forward, one rotated 180°
/// about the vertical axis, one with no pose at all.
fn write_scene(dir: &Path) -> PathBuf {
    for name in ["a.png", "b.png", "c.png"] {
        write_gradient_png(&dir.join(name), 64);
    }

    let scene_json = format!(
        r#"{{
            "views": [
                {{ "image": "{a}", "intrinsic": "cam0",
                   "pose": {{ "rotation": [[1,0,0],[0,1,0],[0,0,1]] }} }},
                {{ "image": "{b}", "intrinsic": "cam0",
                   "pose": {{ "rotation": [[-1,0,0],[0,1,0],[0,0,-1]] }} }},
                {{ "image": "{c}", "intrinsic": "cam0" }}
            ],
            "intrinsics": {{
                "cam0": {{ "type": "pinhole", "width": 64, "height": 64,
                           "fx": 32.0, "fy": 32.0, "cx": 32.0, "cy": 32.0 }}
            }}
        }}"#,
        a = dir.join("a.png").display(),
        b = dir.join("b.png").display(),
        c = dir.join("c.png").display(),
    );

    let path = dir.join("scene.json");
    std::fs::write(&path, scene_json).unwrap();
    path
}

#[test]
fn warps_scene_and_writes_manifest() {
    let dir = unique_dir("full");
    let scene_path = write_scene(&dir);
    let out_dir = dir.join("out");

    let scene = Scene::from_json_file(&scene_path).unwrap();
    let manifest = warp_scene(&scene, &out_dir, Some(1024)).unwrap();

    // The poseless view is skipped: two entries, numbered from 0.
    assert_eq!(manifest.panorama_width, 1024);
    assert_eq!(manifest.panorama_height, 512);
    assert_eq!(manifest.views.len(), 2);

    for n in 0..2 {
        assert!(out_dir.join(format!("view_{n}.exr")).exists());
        assert!(out_dir.join(format!("mask_{n}.png")).exists());
        assert!(out_dir.join(format!("weightmap_{n}.exr")).exists());
    }
    assert!(!out_dir.join("view_2.exr").exists());

    // Forward view (a.png) sits centered on the canvas.
    let forward = &manifest.views[0];
    let color = image::open(&forward.filename_view).unwrap().to_rgb32f();
    let mask = image::open(&forward.filename_mask).unwrap().to_luma8();
    assert_eq!(color.dimensions(), mask.dimensions());

    let center = forward.offsetx + color.width() / 2;
    assert!(
        (center as i64 - 512).abs() <= 2,
        "forward view centered at {center}"
    );
    // 90° of a 1024-wide canvas is 256 columns.
    assert!((240..=262).contains(&color.width()), "width {}", color.width());

    // Mask center is covered and stored as full-range white.
    let (mw, mh) = mask.dimensions();
    assert_eq!(mask.get_pixel(mw / 2, mh / 2).0[0], 255);

    // Rear view (b.png) straddles the longitude seam.
    let rear = &manifest.views[1];
    let rear_color = image::open(&rear.filename_view).unwrap().to_rgb32f();
    assert!(rear.offsetx >= 512, "rear offset {}", rear.offsetx);
    assert!(rear.offsetx + rear_color.width() > 1024);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn manifest_file_round_trips() {
    let dir = unique_dir("manifest");
    let scene_path = write_scene(&dir);
    let out_dir = dir.join("out");

    let scene = Scene::from_json_file(&scene_path).unwrap();
    let manifest = warp_scene(&scene, &out_dir, Some(1024)).unwrap();

    let written = std::fs::read_to_string(out_dir.join("config_views.json")).unwrap();
    let parsed: Manifest = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed, manifest);
    assert!(written.contains("\"panoramaWidth\""));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unreadable_image_skips_only_that_view() {
    let dir = unique_dir("missing");
    let scene_path = write_scene(&dir);
    // Break one source image after the scene was written.
    std::fs::remove_file(dir.join("b.png")).unwrap();
    let out_dir = dir.join("out");

    let scene = Scene::from_json_file(&scene_path).unwrap();
    let manifest = warp_scene(&scene, &out_dir, Some(1024)).unwrap();

    assert_eq!(manifest.views.len(), 1);
    assert!(out_dir.join("view_0.exr").exists());
    assert!(!out_dir.join("view_1.exr").exists());

    std::fs::remove_dir_all(&dir).ok();
}
