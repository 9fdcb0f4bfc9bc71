//! Collider shape kinds (spec §9 "Dynamic dispatch on shape kind"):
//! replaces the source's dynamic per-kind dispatch with a tagged
//! variant. Construction and query code matches on the tag rather than
//! going through a shape-kind virtual call, mirroring how
//! `fyrox-impl`'s own `dim2::collider::ColliderShape` is a plain enum
//! converted into a `rapier2d::geometry::SharedShape` at sync time
//! (`collider_shape_into_native_shape` in `scene/dim2/physics.rs`).

use nalgebra::Point2;
use rapier2d::geometry::SharedShape;

/// One collider's geometry, in body-local space.
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    /// A circle of the given radius, centred on the body origin.
    Circle { radius: f32 },
    /// An axis-aligned rectangle, centred on the body origin.
    Rectangle { width: f32, height: f32 },
    /// A rectangle with its four corners clipped by `cut` units,
    /// producing an octagon. Box2D-style "BSG" rectangle from spec §4.4.
    BsgRectangle { width: f32, height: f32, cut: f32 },
    /// An arbitrary (assumed convex) polygon.
    Polygon { vertices: Vec<Point2<f32>> },
    /// A single line segment; always a sensor-compatible thin shape.
    Line { start: Point2<f32>, end: Point2<f32> },
    /// A connected sequence of segments, optionally closed into a loop.
    Chain { vertices: Vec<Point2<f32>>, looped: bool },
}

impl ColliderShape {
    /// Builds the octagon vertices for a [`ColliderShape::BsgRectangle`]:
    /// a `width`x`height` rectangle with each corner cut by `cut` units
    /// along both edges meeting at it, in counter-clockwise order
    /// starting from the bottom edge.
    pub fn bsg_octagon(width: f32, height: f32, cut: f32) -> Vec<Point2<f32>> {
        let hw = width / 2.0;
        let hh = height / 2.0;
        let cut = cut.min(hw).min(hh);
        vec![
            Point2::new(-hw + cut, -hh),
            Point2::new(hw - cut, -hh),
            Point2::new(hw, -hh + cut),
            Point2::new(hw, hh - cut),
            Point2::new(hw - cut, hh),
            Point2::new(-hw + cut, hh),
            Point2::new(-hw, hh - cut),
            Point2::new(-hw, -hh + cut),
        ]
    }

    /// Converts this shape into the concrete rapier2d shape used for the
    /// solid and sensor fixtures. Polygon-like shapes that turn out to be
    /// degenerate (collinear/zero-area vertices, user-supplied input, not
    /// a system invariant) fall back to a negligible ball rather than
    /// panicking — there is no `InvalidPolygon` error kind in spec.md §7.
    pub(crate) fn to_shared_shape(&self) -> SharedShape {
        match self {
            ColliderShape::Circle { radius } => SharedShape::ball(*radius),
            ColliderShape::Rectangle { width, height } => SharedShape::cuboid(width / 2.0, height / 2.0),
            ColliderShape::BsgRectangle { width, height, cut } => {
                let verts = Self::bsg_octagon(*width, *height, *cut);
                convex_or_fallback(&verts)
            }
            ColliderShape::Polygon { vertices } => convex_or_fallback(vertices),
            ColliderShape::Line { start, end } => SharedShape::segment(*start, *end),
            ColliderShape::Chain { vertices, looped } => {
                let indices = if *looped && vertices.len() > 2 {
                    let mut idx: Vec<[u32; 2]> = (0..vertices.len() as u32 - 1)
                        .map(|i| [i, i + 1])
                        .collect();
                    idx.push([vertices.len() as u32 - 1, 0]);
                    Some(idx)
                } else {
                    None
                };
                SharedShape::polyline(vertices.clone(), indices)
            }
        }
    }

}

fn convex_or_fallback(vertices: &[Point2<f32>]) -> SharedShape {
    SharedShape::convex_hull(vertices).unwrap_or_else(|| SharedShape::ball(0.01))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bsg_octagon_has_eight_points() {
        let verts = ColliderShape::bsg_octagon(4.0, 2.0, 0.5);
        assert_eq!(verts.len(), 8);
    }

}
