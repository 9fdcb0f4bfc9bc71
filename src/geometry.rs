//! Secondary (precise) intersection primitives used by shape queries once
//! the broad-phase AABB pass has produced a short candidate list. Kept as
//! free functions over `nalgebra` points/vectors rather than methods on a
//! query object, following the shape of `fyrox-math`'s own
//! utility module.

use nalgebra::{Point2, Vector2};

/// True if two circles (centre + radius) overlap or touch.
pub fn circle_circle_intersects(c1: Point2<f32>, r1: f32, c2: Point2<f32>, r2: f32) -> bool {
    let d2 = (c1 - c2).norm_squared();
    let r = r1 + r2;
    d2 <= r * r
}

/// True if `point` lies strictly inside (or on the boundary of) the
/// convex or concave polygon described by `vertices`, using the standard
/// ray-casting / even-odd rule. `vertices` must describe a closed ring
/// (the last vertex connects back to the first); no explicit duplicate of
/// the first vertex is required.
pub fn point_in_polygon(point: Point2<f32>, vertices: &[Point2<f32>]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let vi = vertices[i];
        let vj = vertices[j];

        if (vi.y > point.y) != (vj.y > point.y) {
            let x_at_y = vj.x + (point.y - vj.y) / (vi.y - vj.y) * (vi.x - vj.x);
            if point.x < x_at_y {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// True if the circle at `centre`/`radius` is entirely contained within
/// `vertices`. Used by the rectangle-area query to admit a circle fixture
/// whose whole extent lies inside the query rectangle.
pub fn circle_inside_polygon(centre: Point2<f32>, radius: f32, vertices: &[Point2<f32>]) -> bool {
    if !point_in_polygon(centre, vertices) {
        return false;
    }
    distance_to_polygon_boundary(centre, vertices) >= radius
}

/// True if the circle at `centre`/`radius` intersects the boundary of, or
/// lies inside, the polygon `vertices`.
pub fn circle_intersects_polygon(
    centre: Point2<f32>,
    radius: f32,
    vertices: &[Point2<f32>],
) -> bool {
    if point_in_polygon(centre, vertices) {
        return true;
    }
    distance_to_polygon_boundary(centre, vertices) <= radius
}

/// Shortest distance from `point` to the polygon's boundary (its edges,
/// not its interior).
fn distance_to_polygon_boundary(point: Point2<f32>, vertices: &[Point2<f32>]) -> f32 {
    let mut min_dist = f32::MAX;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let dist = distance_to_segment(point, vertices[j], vertices[i]);
        if dist < min_dist {
            min_dist = dist;
        }
        j = i;
    }
    min_dist
}

/// Shortest distance from `point` to the segment `a`-`b`.
pub fn distance_to_segment(point: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f32::EPSILON {
        return (point - a).norm();
    }
    let t = ((point - a).dot(&ab) / len2).clamp(0.0, 1.0);
    let closest = a + ab * t;
    (point - closest).norm()
}

/// Centroid (arithmetic mean of the vertices) and the maximum distance
/// from that centroid to any vertex — the minimal enclosing circle is not
/// computed exactly, this is the cheap bounding circle `queryPolygonArea`
/// uses to build its broad-phase AABB.
pub fn bounding_circle(vertices: &[Point2<f32>]) -> (Point2<f32>, f32) {
    assert!(!vertices.is_empty(), "bounding_circle requires vertices");

    let sum = vertices
        .iter()
        .fold(Vector2::zeros(), |acc, v| acc + v.coords);
    let centroid = Point2::from(sum / vertices.len() as f32);

    let radius = vertices
        .iter()
        .map(|v| (v - centroid).norm())
        .fold(0.0_f32, f32::max);

    (centroid, radius)
}

/// Euclidean length of the segment `a`-`b`.
pub fn segment_length(a: Point2<f32>, b: Point2<f32>) -> f32 {
    (b - a).norm()
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn square(half: f32) -> Vec<Point2<f32>> {
        vec![
            Point2::new(-half, -half),
            Point2::new(half, -half),
            Point2::new(half, half),
            Point2::new(-half, half),
        ]
    }

    #[test]
    fn circle_circle_overlap() {
        assert!(circle_circle_intersects(
            Point2::new(0.0, 0.0),
            1.0,
            Point2::new(1.5, 0.0),
            1.0
        ));
        assert!(!circle_circle_intersects(
            Point2::new(0.0, 0.0),
            1.0,
            Point2::new(3.0, 0.0),
            1.0
        ));
    }

    #[test]
    fn point_in_polygon_square() {
        let verts = square(1.0);
        assert!(point_in_polygon(Point2::new(0.0, 0.0), &verts));
        assert!(!point_in_polygon(Point2::new(5.0, 0.0), &verts));
    }

    #[test]
    fn circle_inside_vs_intersects() {
        let verts = square(10.0);
        assert!(circle_inside_polygon(Point2::new(0.0, 0.0), 2.0, &verts));
        assert!(!circle_inside_polygon(Point2::new(9.5, 0.0), 2.0, &verts));
        assert!(circle_intersects_polygon(Point2::new(9.5, 0.0), 2.0, &verts));
        assert!(!circle_intersects_polygon(Point2::new(50.0, 0.0), 2.0, &verts));
    }

    #[test]
    fn bounding_circle_of_square() {
        let verts = square(1.0);
        let (centre, radius) = bounding_circle(&verts);
        assert_relative_eq!(centre.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(centre.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(radius, 2.0_f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn segment_length_basic() {
        assert_relative_eq!(
            segment_length(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0)),
            5.0,
            epsilon = 1e-6
        );
    }
}
