//! Debug draw (spec §4.7): the rendering collaborator (spec §6) is an
//! injected trait rather than a direct draw call, mirroring how
//! `fyrox-impl`'s `PhysicsWorld::draw` takes a `&mut SceneDrawingContext`
//! collaborator instead of drawing through a global renderer.

use nalgebra::Point2;

/// Colour as the renderer collaborator expects it — plain components,
/// no dependency on any particular color crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };
}

/// The rendering collaborator (spec §6). Implementors back this with
/// whatever 2D renderer the game uses; the crate never draws directly.
/// `color`/`line_width` let `World::draw` save and restore the caller's
/// state around its own drawing (spec §4.7).
pub trait DebugDraw {
    fn set_color(&mut self, color: Color);
    fn color(&self) -> Color;
    fn set_line_width(&mut self, width: f32);
    fn line_width(&self) -> f32;
    fn polygon(&mut self, mode: DrawMode, vertices: &[Point2<f32>]);
    fn line(&mut self, a: Point2<f32>, b: Point2<f32>);
    fn circle(&mut self, mode: DrawMode, centre: Point2<f32>, radius: f32);
    fn rectangle(&mut self, mode: DrawMode, centre: Point2<f32>, width: f32, height: f32);
    /// Triangulates a (possibly concave) polygon for filled drawing of
    /// query shapes.
    fn triangulate(&mut self, vertices: &[Point2<f32>]) -> Vec<[Point2<f32>; 3]>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Line,
    Fill,
}

/// One shape drawn by a debug query, kept on screen for a fixed number
/// of frames after the query that produced it (spec §4.7).
#[derive(Debug, Clone)]
pub(crate) enum RecordedShape {
    Circle { centre: Point2<f32>, radius: f32 },
    Rectangle { centre: Point2<f32>, width: f32, height: f32 },
    Polygon { vertices: Vec<Point2<f32>> },
    Line { a: Point2<f32>, b: Point2<f32> },
}

/// A query shape still owed frames of on-screen visibility.
pub(crate) struct RecordedQuery {
    pub(crate) shape: RecordedShape,
    pub(crate) frames_left: u32,
}

/// Default number of frames a recorded query shape stays visible
/// (spec §4.7).
pub const DEFAULT_QUERY_DEBUG_FRAMES: u32 = 10;
