use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb, Xywh};

/// Contains (x,y) of the center and (width,height) of bbox.
/// This is the form the tracker consumes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: &BBox<Ltrb>, confidence: f32) -> Self {
        let c = bbox.as_xywh();

        Self {
            x: c.cx(),
            y: c.cy(),
            w: c.width(),
            h: c.height(),
            confidence,
        }
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Xywh> {
        BBox::xywh(self.x, self.y, self.w, self.h)
    }

    #[inline(always)]
    pub fn xmax(&self) -> f32 {
        self.x + self.w / 2.
    }

    #[inline(always)]
    pub fn ymax(&self) -> f32 {
        self.y + self.h / 2.
    }

    #[inline(always)]
    pub fn xmin(&self) -> f32 {
        self.x - self.w / 2.
    }

    #[inline(always)]
    pub fn ymin(&self) -> f32 {
        self.y - self.h / 2.
    }
}

/// Plate region reported by a detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    /// Axis-aligned rectangle.
    Rect(BBox<Ltrb>),
    /// Four free-form corners in any order.
    Quad([na::Point2<f32>; 4]),
}

impl Region {
    pub fn bounding_box(&self) -> BBox<Ltrb> {
        match self {
            Region::Rect(bbox) => *bbox,
            Region::Quad(pts) => {
                let (mut l, mut t) = (f32::INFINITY, f32::INFINITY);
                let (mut r, mut b) = (f32::NEG_INFINITY, f32::NEG_INFINITY);

                for p in pts {
                    l = l.min(p.x);
                    t = t.min(p.y);
                    r = r.max(p.x);
                    b = b.max(p.y);
                }

                BBox::ltrb(l, t, r, b)
            }
        }
    }

    /// Corners as given; a rectangle yields top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [na::Point2<f32>; 4] {
        match self {
            Region::Rect(b) => [
                na::Point2::new(b.left(), b.top()),
                na::Point2::new(b.right(), b.top()),
                na::Point2::new(b.right(), b.bottom()),
                na::Point2::new(b.left(), b.bottom()),
            ],
            Region::Quad(pts) => *pts,
        }
    }

    /// Same region in a coordinate frame whose origin sits at `(dx, dy)`.
    pub fn translated(&self, dx: f32, dy: f32) -> Region {
        match self {
            Region::Rect(b) => {
                Region::Rect(BBox::ltrb(b.left() - dx, b.top() - dy, b.right() - dx, b.bottom() - dy))
            }
            Region::Quad(pts) => {
                let offset = na::Vector2::new(dx, dy);
                Region::Quad(pts.map(|p| p - offset))
            }
        }
    }
}

/// One detector output for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionBox {
    pub region: Region,
    pub confidence: f32,
}

impl DetectionBox {
    pub fn rect(left: f32, top: f32, right: f32, bottom: f32, confidence: f32) -> Self {
        Self {
            region: Region::Rect(BBox::ltrb(left, top, right, bottom)),
            confidence,
        }
    }

    pub fn quad(corners: [(f32, f32); 4], confidence: f32) -> Self {
        Self {
            region: Region::Quad(corners.map(|(x, y)| na::Point2::new(x, y))),
            confidence,
        }
    }

    #[inline]
    pub fn bbox(&self) -> BBox<Ltrb> {
        self.region.bounding_box()
    }

    /// Center form handed to the tracker.
    #[inline]
    pub fn to_detection(&self, confidence: f32) -> Detection {
        Detection::new(&self.bbox(), confidence)
    }
}
