//! Warp a single synthetic view onto a small canvas and print the result
//! layout. Run with `cargo run --example warp_view`.

use image::Rgb;

use panowarp::PanoramaSize;
use panowarp_core::alpha;
use panowarp_core::warp;
use panowarp_core::{CoordinateMap, GaussianPyramid, Pinhole, Pose};

fn main() {
    // A 90° synthetic view: color wheel gradient over 256×256.
    let mut source = image::Rgb32FImage::new(256, 256);
    for (x, y, p) in source.enumerate_pixels_mut() {
        *p = Rgb([x as f32 / 256.0, y as f32 / 256.0, 0.5]);
    }

    let camera = Pinhole::ideal(256, 256, 128.0);
    let panorama = PanoramaSize::from_width(1024);

    let map = CoordinateMap::build(panorama, &Pose::identity(), &camera)
        .expect("synthetic view covers the canvas");

    let pyramid = GaussianPyramid::build(&source);
    let warped = warp::warp(&map, &source, Some(&pyramid));
    let weights = alpha::build_weights(&map, &camera);

    println!(
        "canvas {}x{}: view crop {}x{} at ({}, {}), {} pyramid levels",
        panorama.width,
        panorama.height,
        warped.color.width(),
        warped.color.height(),
        warped.offset_x,
        warped.offset_y,
        pyramid.level_count(),
    );

    let peak = weights
        .pixels()
        .map(|p| p.0[0])
        .fold(0.0f32, f32::max);
    println!("peak feathering weight: {peak:.3}");
}
