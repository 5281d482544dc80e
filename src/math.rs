use nalgebra as na;

#[inline]
pub fn distance(a: &na::Point2<f32>, b: &na::Point2<f32>) -> f32 {
    na::distance(a, b)
}

pub fn centroid(pts: &[na::Point2<f32>]) -> na::Point2<f32> {
    let sum = pts
        .iter()
        .fold(na::Vector2::zeros(), |acc, p| acc + p.coords);

    (sum / pts.len().max(1) as f32).into()
}

/// Shoelace area of a simple polygon given in traversal order.
pub fn polygon_area(pts: &[na::Point2<f32>]) -> f32 {
    let n = pts.len();
    let twice: f32 = (0..n)
        .map(|i| {
            let (p, q) = (pts[i], pts[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum();

    twice.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: [(f32, f32); 4]) -> [na::Point2<f32>; 4] {
        raw.map(|(x, y)| na::Point2::new(x, y))
    }

    #[test]
    fn area_of_rectangle() {
        let rect = pts([(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)]);
        assert!((polygon_area(&rect) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn centroid_of_rectangle() {
        let rect = pts([(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)]);
        assert_eq!(centroid(&rect), na::Point2::new(5.0, 2.5));
    }
}
