//! A declarative collision-class layer on top of a 2D rigid-body physics
//! world (rapier2d). Collision classes replace per-fixture filter bit
//! twiddling with named classes and an ignore graph; every fixture gets a
//! paired solid/sensor fixture so physical response and the `enter`/
//! `exit`/`stay`/`preSolve`/`postSolve` event API stay independent of each
//! other, matching the Box2D-derived "collision classes" libraries this
//! crate's API is modeled on.
//!
//! [`World`] is the entry point: register classes with
//! [`World::add_collision_class`], create colliders with
//! [`World::new_circle_collider`] and friends, then call [`World::update`]
//! once per frame. Each collider's per-frame event state is read back
//! through [`World::collider`]/[`World::collider_mut`] and the
//! [`Collider`] polling methods.

mod class;
mod collider;
mod contact;
mod debug;
mod error;
mod geometry;
mod ids;
mod joint;
mod query;
mod routing;
mod shape;
mod world;

pub use class::{ClassRegistry, CollisionClass, CollisionClassSpec, IgnoreSpec, MAX_CATEGORIES};
pub use collider::{Collider, CollisionRecord, PostSolveContext, PreSolveContext};
pub use contact::{ContactHandle, ContactSnapshot};
pub use debug::{Color, DebugDraw, DrawMode, DEFAULT_QUERY_DEBUG_FRAMES};
pub use error::ClassError;
pub use geometry::{
    bounding_circle, circle_circle_intersects, circle_inside_polygon, circle_intersects_polygon,
    distance_to_segment, point_in_polygon, segment_length,
};
pub use ids::ColliderId;
pub use joint::{JointId, JointParams};
pub use query::ClassFilter;
pub use shape::ColliderShape;
pub use world::{BodyKind, World, WorldConfig, WorldConfigBuilder};
