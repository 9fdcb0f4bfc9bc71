//! Collider façade (spec §4.5): one body, a named map of paired
//! solid/sensor fixtures, per-peer-class event queues, and the
//! `enter`/`exit`/`stay` polling API.

use std::any::Any;

use fxhash::FxHashMap;
use nalgebra::Vector2;
use rapier2d::geometry::ColliderHandle;
use uuid::Uuid;

use crate::contact::ContactHandle;
use crate::ids::ColliderId;
use crate::shape::ColliderShape;

/// One named shape's paired fixtures: a solid fixture with the class's
/// real category/mask applied, and a sensor fixture with an
/// unrestricted mask, always present alongside it (spec §4.5).
pub(crate) struct ShapeFixtures {
    pub(crate) shape: ColliderShape,
    pub(crate) solid: ColliderHandle,
    pub(crate) sensor: ColliderHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueuedKind {
    Enter,
    Exit,
}

pub(crate) struct QueuedEvent {
    pub(crate) kind: QueuedKind,
    pub(crate) peer: ColliderId,
    pub(crate) contact: ContactHandle,
}

/// One `{collider, contact}` entry as returned by the `getXCollisionData`
/// family (spec §4.5).
#[derive(Clone)]
pub struct CollisionRecord {
    pub collider: ColliderId,
    pub contact: ContactHandle,
}

/// Argument passed to a `preSolve` callback (spec §4.5): the engine is
/// locked for the duration of the call, so this only exposes read
/// access to the contact geometry plus the one allowed mutation —
/// disabling the contact for this step.
pub struct PreSolveContext<'a> {
    peer: ColliderId,
    normal: Vector2<f32>,
    disable: &'a mut bool,
}

impl PreSolveContext<'_> {
    /// The other collider in this contact.
    pub fn peer(&self) -> ColliderId {
        self.peer
    }

    /// World-space contact normal, pointing from the callback's first
    /// fixture to its second.
    pub fn normal(&self) -> Vector2<f32> {
        self.normal
    }

    /// Suppresses this step's collision response for the contact,
    /// mirroring `contact:setEnabled(false)` (spec §8 scenario S6).
    pub fn set_enabled(&mut self, enabled: bool) {
        *self.disable = !enabled;
    }
}

impl<'a> PreSolveContext<'a> {
    pub(crate) fn new(peer: ColliderId, normal: Vector2<f32>, disable: &'a mut bool) -> Self {
        Self {
            peer,
            normal,
            disable,
        }
    }
}

/// Argument passed to a `postSolve` callback (spec §4.5): read-only,
/// carrying up to the two contact points' final normal/tangent
/// impulses the way Box2D's `b2ContactListener::PostSolve` does.
#[derive(Debug, Clone, Copy)]
pub struct PostSolveContext {
    pub peer: ColliderId,
    pub normal: Vector2<f32>,
    pub normal_impulse1: f32,
    pub tangent_impulse1: f32,
    pub normal_impulse2: Option<f32>,
    pub tangent_impulse2: Option<f32>,
}

type PreSolveFn = Box<dyn FnMut(ColliderId, &mut PreSolveContext) + 'static>;
type PostSolveFn = Box<dyn FnMut(ColliderId, &PostSolveContext) + 'static>;

/// A game object's physical presence: a body plus one or more named
/// shapes, a collision class, and the per-frame event-polling state
/// described by spec §3/§4.5.
pub struct Collider {
    pub(crate) id: ColliderId,
    uuid: Uuid,
    pub(crate) class_index: usize,
    pub(crate) shapes: FxHashMap<String, ShapeFixtures>,
    pub(crate) events: FxHashMap<String, Vec<QueuedEvent>>,
    collision_stay: FxHashMap<String, Vec<CollisionRecord>>,
    enter_data: FxHashMap<String, Vec<CollisionRecord>>,
    exit_data: FxHashMap<String, Vec<CollisionRecord>>,
    pub(crate) pre_solve: Option<PreSolveFn>,
    pub(crate) post_solve: Option<PostSolveFn>,
    object: Option<Box<dyn Any>>,
}

impl Collider {
    pub(crate) fn new(id: ColliderId, class_index: usize) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            class_index,
            shapes: FxHashMap::default(),
            events: FxHashMap::default(),
            collision_stay: FxHashMap::default(),
            enter_data: FxHashMap::default(),
            exit_data: FxHashMap::default(),
            pre_solve: None,
            post_solve: None,
            object: None,
        }
    }

    /// This collider's stable identifier.
    pub fn id(&self) -> ColliderId {
        self.id
    }

    /// A per-collider UUID that survives `setCollisionClass` and shape
    /// changes, stable for the collider's whole lifetime (spec §3).
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub(crate) fn clear_frame_state(&mut self) {
        self.events.clear();
    }

    pub(crate) fn push_event(&mut self, peer_class: &str, event: QueuedEvent) {
        self.events
            .entry(peer_class.to_string())
            .or_default()
            .push(event);
    }

    /// True iff an `enter` event against a collider of class
    /// `peer_class` exists in this frame's queue. Appends every touched
    /// peer to `collision_stay` and caches the full list of this
    /// frame's enter data (spec §4.5): the return value only reports
    /// whether *any* enter event fired, not how many.
    pub fn enter(&mut self, peer_class: &str) -> bool {
        let Some(queued) = self.events.get(peer_class) else {
            return false;
        };
        let hits: Vec<CollisionRecord> = queued
            .iter()
            .filter(|e| e.kind == QueuedKind::Enter)
            .map(|e| CollisionRecord {
                collider: e.peer,
                contact: e.contact.clone(),
            })
            .collect();
        if hits.is_empty() {
            return false;
        }
        let stay = self.collision_stay.entry(peer_class.to_string()).or_default();
        stay.extend(hits.iter().cloned());
        self.enter_data.insert(peer_class.to_string(), hits);
        true
    }

    /// True iff an `exit` event against a collider of class
    /// `peer_class` exists in this frame's queue. Removes the matching
    /// entries from `collision_stay` and caches the full list of this
    /// frame's exit data.
    pub fn exit(&mut self, peer_class: &str) -> bool {
        let Some(queued) = self.events.get(peer_class) else {
            return false;
        };
        let hits: Vec<CollisionRecord> = queued
            .iter()
            .filter(|e| e.kind == QueuedKind::Exit)
            .map(|e| CollisionRecord {
                collider: e.peer,
                contact: e.contact.clone(),
            })
            .collect();
        if hits.is_empty() {
            return false;
        }
        if let Some(stay) = self.collision_stay.get_mut(peer_class) {
            stay.retain(|rec| !hits.iter().any(|h| h.collider == rec.collider));
        }
        self.exit_data.insert(peer_class.to_string(), hits);
        true
    }

    /// True iff `collision_stay[peer_class]` is non-empty.
    pub fn stay(&self, peer_class: &str) -> bool {
        self.collision_stay
            .get(peer_class)
            .is_some_and(|v| !v.is_empty())
    }

    /// The full list of this frame's `enter` hits against `peer_class`,
    /// most recent last.
    pub fn get_enter_collision_data(&self, peer_class: &str) -> &[CollisionRecord] {
        self.enter_data.get(peer_class).map_or(&[], |v| v.as_slice())
    }

    /// The full list of this frame's `exit` hits against `peer_class`.
    pub fn get_exit_collision_data(&self, peer_class: &str) -> &[CollisionRecord] {
        self.exit_data.get(peer_class).map_or(&[], |v| v.as_slice())
    }

    /// Every collider of class `peer_class` currently touching this one.
    pub fn get_stay_collision_data(&self, peer_class: &str) -> &[CollisionRecord] {
        self.collision_stay
            .get(peer_class)
            .map_or(&[], |v| v.as_slice())
    }

    /// Registers a synchronous pre-solve hook, run inside the locked
    /// physics step for every contact this collider is party to that
    /// the routing table admits (spec §4.5). Must not mutate the world.
    pub fn set_pre_solve(&mut self, f: impl FnMut(ColliderId, &mut PreSolveContext) + 'static) {
        self.pre_solve = Some(Box::new(f));
    }

    /// Clears a previously-registered pre-solve hook.
    pub fn clear_pre_solve(&mut self) {
        self.pre_solve = None;
    }

    /// Registers a synchronous post-solve hook (spec §4.5).
    pub fn set_post_solve(&mut self, f: impl FnMut(ColliderId, &PostSolveContext) + 'static) {
        self.post_solve = Some(Box::new(f));
    }

    /// Clears a previously-registered post-solve hook.
    pub fn clear_post_solve(&mut self) {
        self.post_solve = None;
    }

    /// Attaches an arbitrary user object to this collider.
    pub fn set_object<T: Any>(&mut self, object: T) {
        self.object = Some(Box::new(object));
    }

    /// Detaches whatever user object was attached, if any.
    pub fn clear_object(&mut self) {
        self.object = None;
    }

    /// Borrows the attached user object, downcast to `T`.
    pub fn get_object<T: Any>(&self) -> Option<&T> {
        self.object.as_deref().and_then(|o| o.downcast_ref())
    }

    /// Mutably borrows the attached user object, downcast to `T`.
    pub fn get_object_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.object.as_deref_mut().and_then(|o| o.downcast_mut())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::contact::{ContactPool, ContactSnapshot};
    use nalgebra::Vector2;

    fn dummy_contact(pool: &mut ContactPool, a: ColliderId, b: ColliderId) -> ContactHandle {
        pool.capture(ContactSnapshot {
            collider1: a,
            collider2: b,
            normal: Vector2::new(0.0, 1.0),
            positions: Vec::new(),
            friction: 0.5,
            restitution: 0.0,
            enabled: true,
            touching: true,
        })
    }

    #[test]
    fn enter_reports_once_and_joins_stay() {
        let mut pool = ContactPool::new();
        let me = ColliderId::dummy(0);
        let peer = ColliderId::dummy(1);
        let mut collider = Collider::new(me, 0);

        collider.push_event(
            "Enemy",
            QueuedEvent {
                kind: QueuedKind::Enter,
                peer,
                contact: dummy_contact(&mut pool, me, peer),
            },
        );

        assert!(collider.enter("Enemy"));
        assert!(collider.stay("Enemy"));
        assert_eq!(collider.get_enter_collision_data("Enemy").len(), 1);
        assert!(collider.get_exit_collision_data("Enemy").is_empty());
    }

    #[test]
    fn enter_is_false_for_untouched_class() {
        let collider = Collider::new(ColliderId::dummy(0), 0);
        assert!(!collider.stay("Enemy"));
    }

    #[test]
    fn exit_removes_the_peer_from_stay() {
        let mut pool = ContactPool::new();
        let me = ColliderId::dummy(0);
        let peer = ColliderId::dummy(1);
        let mut collider = Collider::new(me, 0);

        collider.push_event(
            "Enemy",
            QueuedEvent {
                kind: QueuedKind::Enter,
                peer,
                contact: dummy_contact(&mut pool, me, peer),
            },
        );
        collider.enter("Enemy");
        collider.clear_frame_state();

        collider.push_event(
            "Enemy",
            QueuedEvent {
                kind: QueuedKind::Exit,
                peer,
                contact: dummy_contact(&mut pool, me, peer),
            },
        );
        assert!(collider.exit("Enemy"));
        assert!(!collider.stay("Enemy"));
    }

    #[test]
    fn set_pre_solve_then_clear_drops_the_callback() {
        let mut collider = Collider::new(ColliderId::dummy(0), 0);
        collider.set_pre_solve(|_, _| {});
        assert!(collider.pre_solve.is_some());
        collider.clear_pre_solve();
        assert!(collider.pre_solve.is_none());
    }
}
