use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use nalgebra as na;

use crate::bbox::{BBox, Ltrb};
use crate::config::CornerOrder;
use crate::detection::Region;
use crate::error::Error;
use crate::math;

const MIN_CORNER_DISTANCE: f32 = 1e-3;
const MIN_AREA: f32 = 1e-3;

// Upper bound on rectified pixels relative to the source image.
const MAX_AREA_RATIO: u64 = 4;

/// Sort by polar angle around the centroid. With image coordinates (y down)
/// ascending angle walks top-left, top-right, bottom-right, bottom-left.
pub fn order_by_angle(pts: &[na::Point2<f32>; 4]) -> [na::Point2<f32>; 4] {
    let c = math::centroid(pts);
    let mut ordered = *pts;

    ordered.sort_by(|a, b| {
        let ta = (a.y - c.y).atan2(a.x - c.x);
        let tb = (b.y - c.y).atan2(b.x - c.x);
        ta.partial_cmp(&tb).unwrap_or(std::cmp::Ordering::Equal)
    });

    ordered
}

/// Top-left has the smallest `x + y`, bottom-right the largest;
/// top-right has the smallest `y - x`, bottom-left the largest.
pub fn order_by_sum_diff(pts: &[na::Point2<f32>; 4]) -> [na::Point2<f32>; 4] {
    let pick = |key: fn(&na::Point2<f32>) -> f32, max: bool| {
        let mut best = pts[0];
        for p in &pts[1..] {
            let better = if max { key(p) > key(&best) } else { key(p) < key(&best) };
            if better {
                best = *p;
            }
        }
        best
    };

    let sum = |p: &na::Point2<f32>| p.x + p.y;
    let diff = |p: &na::Point2<f32>| p.y - p.x;

    [
        pick(sum, false),
        pick(diff, false),
        pick(sum, true),
        pick(diff, true),
    ]
}

/// Longest edge of each opposing pair, rounded down.
pub fn output_size(ordered: &[na::Point2<f32>; 4]) -> (u32, u32) {
    let [tl, tr, br, bl] = ordered;

    let width = math::distance(tl, tr).max(math::distance(bl, br));
    let height = math::distance(tl, bl).max(math::distance(tr, br));

    (width.floor() as u32, height.floor() as u32)
}

/// Axis-aligned crop of `bbox` clipped to the image, with the crop origin
/// in image coordinates. `None` if nothing remains.
pub fn crop(image: &RgbImage, bbox: &BBox<Ltrb>) -> Option<(RgbImage, (u32, u32))> {
    let (x, y, w, h) = bbox.clip_to(image.width(), image.height())?;

    Some((image::imageops::crop_imm(image, x, y, w, h).to_image(), (x, y)))
}

#[derive(Debug, Clone, Copy)]
pub struct Rectifier {
    order: CornerOrder,
}

impl Rectifier {
    pub fn new(order: CornerOrder) -> Self {
        Self { order }
    }

    #[inline]
    pub fn order_corners(&self, pts: &[na::Point2<f32>; 4]) -> [na::Point2<f32>; 4] {
        match self.order {
            CornerOrder::Angular => order_by_angle(pts),
            CornerOrder::SumDiff => order_by_sum_diff(pts),
        }
    }

    /// Ordered corners in the coordinates of an image upscaled by `scale`.
    pub fn corners(
        &self,
        region: &Region,
        scale: Option<f32>,
    ) -> Result<[na::Point2<f32>; 4], Error> {
        let s = scale.unwrap_or(1.0);
        let ordered = self.order_corners(&region.corners()).map(|p| p * s);

        for i in 0..4 {
            for j in i + 1..4 {
                if math::distance(&ordered[i], &ordered[j]) < MIN_CORNER_DISTANCE {
                    return Err(Error::Geometry(format!(
                        "coincident corners at ({}, {})",
                        ordered[i].x, ordered[i].y
                    )));
                }
            }
        }

        if math::polygon_area(&ordered) < MIN_AREA {
            return Err(Error::Geometry("zero area region".into()));
        }

        Ok(ordered)
    }

    /// Upright image of `region`. When `image` was upscaled by `scale` after
    /// the region was located, the region coordinates are scaled to match.
    pub fn rectify(
        &self,
        image: &RgbImage,
        region: &Region,
        scale: Option<f32>,
    ) -> Result<RgbImage, Error> {
        let src = self.corners(region, scale)?;
        let (w, h) = output_size(&src);

        if w < 2 || h < 2 {
            return Err(Error::Geometry(format!("region too small: {}x{}", w, h)));
        }

        let limit = (image.width() as u64 * image.height() as u64)
            .saturating_mul(MAX_AREA_RATIO)
            .max(4);
        match (w as u64).checked_mul(h as u64) {
            Some(area) if area <= limit => {}
            _ => {
                return Err(Error::Geometry(format!(
                    "rectified size {}x{} exceeds source {}x{}",
                    w,
                    h,
                    image.width(),
                    image.height()
                )))
            }
        }

        let (r, b) = ((w - 1) as f32, (h - 1) as f32);
        let dst = [(0.0, 0.0), (r, 0.0), (r, b), (0.0, b)];

        let projection = Projection::from_control_points(src.map(|p| (p.x, p.y)), dst)
            .ok_or_else(|| Error::Geometry("corners admit no perspective mapping".into()))?;

        let mut out = RgbImage::new(w, h);
        warp_into(
            image,
            &projection,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
            &mut out,
        );

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([200, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 200]);

    fn pts(raw: [(f32, f32); 4]) -> [na::Point2<f32>; 4] {
        raw.map(|(x, y)| na::Point2::new(x, y))
    }

    // interpolation may land a unit below the source value
    fn is_red(p: &Rgb<u8>) -> bool {
        p[0] >= RED[0] - 1 && p[1] == 0 && p[2] <= 1
    }

    // top 100, bottom ~102.02, left 50, right ~48.04
    fn skewed() -> [na::Point2<f32>; 4] {
        pts([(102.0, 48.0), (0.0, 0.0), (0.0, 50.0), (100.0, 0.0)])
    }

    fn canvas() -> RgbImage {
        RgbImage::from_fn(200, 120, |x, y| {
            if (5..115).contains(&x) && (5..65).contains(&y) {
                RED
            } else {
                BLUE
            }
        })
    }

    #[test]
    fn both_orderings_agree_on_a_plate() {
        let expected = pts([(0.0, 0.0), (100.0, 0.0), (102.0, 48.0), (0.0, 50.0)]);

        assert_eq!(order_by_sum_diff(&skewed()), expected);
        assert_eq!(order_by_angle(&skewed()), expected);
    }

    #[test]
    fn output_takes_longest_edges() {
        let ordered = order_by_sum_diff(&skewed());
        assert_eq!(output_size(&ordered), (102, 50));
    }

    #[test]
    fn rectified_quad_has_expected_size() {
        let shifted = skewed().map(|p| p + na::Vector2::new(8.0, 8.0));

        for order in [CornerOrder::SumDiff, CornerOrder::Angular] {
            let out = Rectifier::new(order)
                .rectify(&canvas(), &Region::Quad(shifted), None)
                .unwrap();
            assert_eq!(out.dimensions(), (102, 50));
        }
    }

    #[test]
    fn rectified_rect_stays_inside_region() {
        let region = Region::Rect(BBox::ltrb(10.0, 10.0, 50.0, 30.0));
        let out = Rectifier::new(CornerOrder::SumDiff)
            .rectify(&canvas(), &region, None)
            .unwrap();

        assert_eq!(out.dimensions(), (40, 20));
        assert!(out.pixels().all(is_red));
    }

    #[test]
    fn scale_keeps_region_registered_with_upscaled_image() {
        let upscaled = image::imageops::resize(
            &canvas(),
            400,
            240,
            image::imageops::FilterType::Nearest,
        );
        let region = Region::Rect(BBox::ltrb(10.0, 10.0, 50.0, 30.0));
        let out = Rectifier::new(CornerOrder::SumDiff)
            .rectify(&upscaled, &region, Some(2.0))
            .unwrap();

        assert_eq!(out.dimensions(), (80, 40));
        assert!(out.pixels().all(is_red));
    }

    #[test]
    fn coincident_corners_are_a_geometry_error() {
        let region = Region::Quad(pts([(10.0, 10.0), (10.0, 10.0), (50.0, 30.0), (10.0, 30.0)]));
        let err = Rectifier::new(CornerOrder::Angular)
            .rectify(&canvas(), &region, None)
            .unwrap_err();

        assert!(matches!(err, Error::Geometry(_)));
    }

    #[test]
    fn flat_region_is_a_geometry_error() {
        let region = Region::Rect(BBox::ltrb(10.0, 10.0, 50.0, 10.0));
        let err = Rectifier::new(CornerOrder::SumDiff)
            .rectify(&canvas(), &region, None)
            .unwrap_err();

        assert!(matches!(err, Error::Geometry(_)));
    }

    #[test]
    fn oversized_region_is_a_geometry_error() {
        let region = Region::Quad(pts([
            (10.0, 10.0),
            (3e9, 10.0),
            (3e9, 3e9),
            (10.0, 3e9),
        ]));
        let err = Rectifier::new(CornerOrder::SumDiff)
            .rectify(&canvas(), &region, None)
            .unwrap_err();

        assert!(matches!(err, Error::Geometry(_)));

        // a quad slightly larger than the image still warps
        let region = Region::Quad(pts([
            (-10.0, -10.0),
            (210.0, -10.0),
            (210.0, 130.0),
            (-10.0, 130.0),
        ]));
        let out = Rectifier::new(CornerOrder::SumDiff)
            .rectify(&canvas(), &region, None)
            .unwrap();
        assert_eq!(out.dimensions(), (220, 140));
    }

    #[test]
    fn crop_clips_to_image() {
        let image = canvas();
        let (out, origin) = crop(&image, &BBox::ltrb(190.0, 100.0, 260.0, 160.0)).unwrap();
        assert_eq!(out.dimensions(), (10, 20));
        assert_eq!(origin, (190, 100));
        assert!(crop(&image, &BBox::ltrb(300.0, 0.0, 310.0, 10.0)).is_none());
    }
}
