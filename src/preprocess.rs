use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{self, ThresholdType};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{rotate, Interpolation};
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use nalgebra as na;
use tracing::{debug, warn};

use crate::config::{ProcessingConfig, UpscaleConfig, UpscaleFilter};
use crate::math;

const MAX_UPSCALED_PIXELS: u64 = 1 << 28;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const MIN_PLATE_ASPECT: f32 = 2.0;
const MAX_PLATE_ASPECT: f32 = 6.0;

impl From<UpscaleFilter> for FilterType {
    fn from(filter: UpscaleFilter) -> Self {
        match filter {
            UpscaleFilter::Bicubic => FilterType::CatmullRom,
            UpscaleFilter::Bilinear => FilterType::Triangle,
            UpscaleFilter::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// Enlarged crop and the factor it was enlarged by.
pub fn upscale(image: &RgbImage, config: &UpscaleConfig) -> (RgbImage, f32) {
    let factor = config.factor.max(1);
    if factor == 1 {
        return (image.clone(), 1.0);
    }

    let (w, h) = image.dimensions();
    let (Some(uw), Some(uh)) = (w.checked_mul(factor), h.checked_mul(factor)) else {
        warn!(w, h, factor, "upscaled size overflows, keeping crop as is");
        return (image.clone(), 1.0);
    };

    if uw as u64 * uh as u64 > MAX_UPSCALED_PIXELS {
        warn!(w, h, factor, "upscaled crop too large, keeping crop as is");
        return (image.clone(), 1.0);
    }

    (imageops::resize(image, uw, uh, config.filter.into()), factor as f32)
}

/// Grayscale, denoise, equalize, threshold, deskew; each step only when
/// configured. Grayscale results are expanded back to three channels.
pub fn process(image: &RgbImage, config: &ProcessingConfig) -> RgbImage {
    let out = if config.grayscale {
        let mut gray = imageops::grayscale(image);

        if let Some(sigma) = config.denoise_sigma.filter(|s| *s > 0.0) {
            gray = gaussian_blur_f32(&gray, sigma);
        }

        if config.equalize {
            gray = contrast::equalize_histogram(&gray);
        }

        if let Some(level) = config.threshold {
            gray = contrast::threshold(&gray, level, ThresholdType::Binary);
        }

        DynamicImage::ImageLuma8(gray).to_rgb8()
    } else {
        match config.denoise_sigma {
            Some(sigma) if sigma > 0.0 => gaussian_blur_f32(image, sigma),
            _ => image.clone(),
        }
    };

    if config.rotation {
        deskew(&out, config.max_rotation_angle)
    } else {
        out
    }
}

/// Tilt of the largest plate shaped outline in degrees, clockwise positive,
/// with the center of its minimum area rectangle.
pub fn skew(gray: &GrayImage) -> Option<(f32, (f32, f32))> {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);

    let (_, outline) = find_contours::<i32>(&edges)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter(|c| c.points.len() >= 3 && plate_shaped(&c.points))
        .map(|c| (outline_area(&c.points), c.points))
        .max_by(|a, b| a.0.total_cmp(&b.0))?;

    let rect = min_area_rect(&outline);
    let edge = |a: Point<i32>, b: Point<i32>| ((b.x - a.x) as f32, (b.y - a.y) as f32);
    let (e1, e2) = (edge(rect[0], rect[1]), edge(rect[1], rect[2]));
    let (dx, dy) = if e1.0.hypot(e1.1) >= e2.0.hypot(e2.1) { e1 } else { e2 };

    let mut angle = dy.atan2(dx).to_degrees();
    if angle > 90.0 {
        angle -= 180.0;
    } else if angle <= -90.0 {
        angle += 180.0;
    }

    let cx = rect.iter().map(|p| p.x as f32).sum::<f32>() / 4.0;
    let cy = rect.iter().map(|p| p.y as f32).sum::<f32>() / 4.0;

    Some((angle, (cx, cy)))
}

/// Levels the plate outline when its tilt is within `max_angle` degrees.
/// Anything else comes back unchanged.
pub fn deskew(image: &RgbImage, max_angle: f32) -> RgbImage {
    match skew(&imageops::grayscale(image)) {
        Some((angle, center)) if angle != 0.0 && angle.abs() <= max_angle => {
            debug!(angle, "deskewing plate");
            rotate(
                image,
                center,
                -angle.to_radians(),
                Interpolation::Bilinear,
                Rgb([0, 0, 0]),
            )
        }
        _ => image.clone(),
    }
}

fn plate_shaped(points: &[Point<i32>]) -> bool {
    let (mut x0, mut y0, mut x1, mut y1) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }

    let aspect = (x1 - x0 + 1) as f32 / (y1 - y0 + 1) as f32;
    aspect > MIN_PLATE_ASPECT && aspect < MAX_PLATE_ASPECT
}

fn outline_area(points: &[Point<i32>]) -> f32 {
    let pts: Vec<na::Point2<f32>> = points
        .iter()
        .map(|p| na::Point2::new(p.x as f32, p.y as f32))
        .collect();

    math::polygon_area(&pts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_polygon_mut;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(16, 8, |x, _| {
            let v = (x * 16) as u8;
            Rgb([v, v / 2, 255 - v])
        })
    }

    #[test]
    fn upscale_multiplies_dimensions() {
        let config = UpscaleConfig {
            filter: UpscaleFilter::Lanczos,
            factor: 3,
        };
        let (out, scale) = upscale(&gradient(), &config);

        assert_eq!(out.dimensions(), (48, 24));
        assert_eq!(scale, 3.0);
    }

    #[test]
    fn zero_factor_keeps_size() {
        let config = UpscaleConfig {
            factor: 0,
            ..Default::default()
        };
        let (out, scale) = upscale(&gradient(), &config);

        assert_eq!(out.dimensions(), (16, 8));
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn overflowing_factor_keeps_size() {
        let config = UpscaleConfig {
            factor: u32::MAX,
            ..Default::default()
        };
        let (out, scale) = upscale(&gradient(), &config);

        assert_eq!(out.dimensions(), (16, 8));
        assert_eq!(scale, 1.0);

        // fits in u32 but not in memory
        let config = UpscaleConfig {
            factor: 1 << 20,
            ..Default::default()
        };
        assert_eq!(upscale(&gradient(), &config).1, 1.0);
    }

    #[test]
    fn default_processing_is_identity() {
        let image = gradient();
        assert_eq!(process(&image, &ProcessingConfig::default()), image);
    }

    #[test]
    fn grayscale_output_has_equal_channels() {
        let config = ProcessingConfig {
            grayscale: true,
            ..Default::default()
        };
        let out = process(&gradient(), &config);

        assert_eq!(out.dimensions(), (16, 8));
        assert!(out.pixels().all(|p| p[0] == p[1] && p[1] == p[2]));
    }

    #[test]
    fn threshold_is_binary() {
        let config = ProcessingConfig {
            grayscale: true,
            denoise_sigma: Some(1.0),
            equalize: true,
            threshold: Some(127),
            ..Default::default()
        };
        let out = process(&gradient(), &config);

        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    // white 100x24 bar centered in a 160x100 black frame, tilted clockwise
    fn tilted_plate(degrees: f32) -> RgbImage {
        let (s, c) = degrees.to_radians().sin_cos();
        let corners: Vec<Point<i32>> = [(-50.0, -12.0), (50.0, -12.0), (50.0, 12.0), (-50.0, 12.0)]
            .iter()
            .map(|&(x, y): &(f32, f32)| {
                Point::new(
                    (80.0 + x * c - y * s).round() as i32,
                    (50.0 + x * s + y * c).round() as i32,
                )
            })
            .collect();

        let mut image = RgbImage::new(160, 100);
        draw_polygon_mut(&mut image, &corners, Rgb([255, 255, 255]));
        image
    }

    fn tilt(image: &RgbImage) -> f32 {
        skew(&imageops::grayscale(image)).unwrap().0
    }

    #[test]
    fn skew_measures_plate_tilt() {
        assert!((tilt(&tilted_plate(6.0)) - 6.0).abs() < 2.0);
        assert!((tilt(&tilted_plate(-6.0)) + 6.0).abs() < 2.0);
        assert!(skew(&GrayImage::new(160, 100)).is_none());
    }

    #[test]
    fn deskew_levels_a_tilted_plate() {
        let out = deskew(&tilted_plate(6.0), 15.0);

        assert_eq!(out.dimensions(), (160, 100));
        assert!(tilt(&out).abs() < 2.0);
    }

    #[test]
    fn steep_tilt_is_left_alone() {
        let image = tilted_plate(6.0);
        assert_eq!(deskew(&image, 3.0), image);
    }

    #[test]
    fn thresholded_plate_is_deskewed() {
        let config = ProcessingConfig {
            grayscale: true,
            threshold: Some(127),
            rotation: true,
            ..Default::default()
        };
        let out = process(&tilted_plate(6.0), &config);

        assert_eq!(out.dimensions(), (160, 100));
        assert!(tilt(&out).abs() < 2.0);
    }
}
