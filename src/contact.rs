//! Contact snapshot & pool (spec §4.1).
//!
//! rapier2d's own `ContactPair`/`ContactManifold` may be invalidated the
//! instant a body sleeps or a collider is removed, so every contact a
//! collider needs to read from later is copied into a [`ContactSnapshot`]
//! held behind a shared, poolable cell. [`ContactPool::capture`] reuses
//! the cell at the current cursor position when one exists, matching the
//! "pool cursor quirk" from spec §9: the cursor only advances on reuse,
//! and is suspended (captures keep appending) for the rest of the step
//! once a fresh allocation happens.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use nalgebra::{Point2, Vector2};
use rapier2d::geometry::ColliderSet;

use crate::ids::ColliderId;

/// An immutable copy of one contact point/pair, valid for the remainder
/// of the step it was captured in (longer, if reused-but-unwritten, or
/// indefinitely if [`ContactHandle::detach`] was called).
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSnapshot {
    /// First collider in the pair.
    pub collider1: ColliderId,
    /// Second collider in the pair.
    pub collider2: ColliderId,
    /// World-space contact normal, pointing from collider1 to collider2.
    pub normal: Vector2<f32>,
    /// World-space contact point positions.
    pub positions: Vec<Point2<f32>>,
    /// Combined friction coefficient for this pair.
    pub friction: f32,
    /// Combined restitution coefficient for this pair.
    pub restitution: f32,
    /// False if a `preSolve` hook disabled this contact for the step.
    pub enabled: bool,
    /// Whether the narrow phase considers this pair to be actively
    /// touching.
    pub touching: bool,
}

/// Mirrors rapier2d's own friction/restitution combination rule, which
/// isn't exposed as a method on `CoefficientCombineRule` itself.
fn combine(rule: rapier2d::dynamics::CoefficientCombineRule, a: f32, b: f32) -> f32 {
    use rapier2d::dynamics::CoefficientCombineRule::*;
    match rule {
        Average => (a + b) / 2.0,
        Min => a.min(b),
        Multiply => a * b,
        Max => a.max(b),
    }
}

impl ContactSnapshot {
    pub(crate) fn capture(
        pair: &rapier2d::geometry::ContactPair,
        colliders: &ColliderSet,
        disabled: bool,
    ) -> Option<Self> {
        let c1 = colliders.get(pair.collider1)?;
        let c2 = colliders.get(pair.collider2)?;
        let collider1 = ColliderId::from_body(c1.parent()?);
        let collider2 = ColliderId::from_body(c2.parent()?);

        let manifold = pair.manifolds.first();
        let normal = manifold.map(|m| m.data.normal).unwrap_or_else(Vector2::zeros);
        let positions: Vec<Point2<f32>> = manifold
            .map(|m| {
                m.points
                    .iter()
                    .map(|p| c1.position() * p.local_p1)
                    .collect()
            })
            .unwrap_or_default();

        let friction = combine(c1.friction_combine_rule(), c1.friction(), c2.friction());
        let restitution = combine(
            c1.restitution_combine_rule(),
            c1.restitution(),
            c2.restitution(),
        );

        Some(Self {
            collider1,
            collider2,
            normal,
            positions,
            friction,
            restitution,
            enabled: !disabled,
            touching: pair.has_any_active_contact,
        })
    }
}

/// A shared, poolable reference to a [`ContactSnapshot`]. Reading it after
/// the world's next `update()` may observe data the pool has since reused
/// for an unrelated contact — callers who need the data to outlive that
/// boundary must call [`ContactHandle::detach`].
#[derive(Debug, Clone)]
pub struct ContactHandle(Rc<RefCell<ContactSnapshot>>);

impl ContactHandle {
    /// Borrows the current contents of the cell.
    pub fn borrow(&self) -> Ref<'_, ContactSnapshot> {
        self.0.borrow()
    }

    /// Clones the current contents into a standalone snapshot with no
    /// pool membership — the spec's `clone(snapshot)` operation.
    pub fn detach(&self) -> ContactSnapshot {
        self.0.borrow().clone()
    }
}

/// Slots preallocated before the pool logs its first growth warning.
const PREALLOCATED_CAPACITY: usize = 64;

/// A vector of snapshot cells with a cursor `next`, per spec §4.1/§9.
#[derive(Debug, Default)]
pub(crate) struct ContactPool {
    slots: Vec<Rc<RefCell<ContactSnapshot>>>,
    cursor: Option<usize>,
    grew_past_capacity: bool,
}

impl ContactPool {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::with_capacity(PREALLOCATED_CAPACITY),
            cursor: Some(0),
            grew_past_capacity: false,
        }
    }

    /// Resets the reuse cursor to the start of the pool. Called at the
    /// top of every `World::update`.
    pub(crate) fn reset(&mut self) {
        self.cursor = Some(0);
    }

    /// Captures one snapshot into the pool, reusing the slot at the
    /// cursor if one exists, else appending and suspending the cursor.
    pub(crate) fn capture(&mut self, snapshot: ContactSnapshot) -> ContactHandle {
        match self.cursor {
            Some(next) if next < self.slots.len() => {
                *self.slots[next].borrow_mut() = snapshot;
                self.cursor = Some(next + 1);
                ContactHandle(self.slots[next].clone())
            }
            _ => {
                let cell = Rc::new(RefCell::new(snapshot));
                self.slots.push(cell.clone());
                self.cursor = None;
                if self.slots.len() > PREALLOCATED_CAPACITY && !self.grew_past_capacity {
                    self.grew_past_capacity = true;
                    log::debug!(
                        "contact pool grew past its preallocated capacity ({PREALLOCATED_CAPACITY} slots)"
                    );
                }
                ContactHandle(cell)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dummy_snapshot(tag: f32) -> ContactSnapshot {
        ContactSnapshot {
            collider1: ColliderId::dummy(0),
            collider2: ColliderId::dummy(1),
            normal: Vector2::new(tag, 0.0),
            positions: Vec::new(),
            friction: 0.5,
            restitution: 0.0,
            enabled: true,
            touching: true,
        }
    }

    #[test]
    fn cursor_suspends_on_fresh_allocation_within_a_step() {
        let mut pool = ContactPool::new();
        pool.reset();

        let first = pool.capture(dummy_snapshot(1.0));
        let second = pool.capture(dummy_snapshot(2.0));
        // Both allocated fresh (pool started empty); cursor stays
        // suspended, so these are two distinct cells.
        assert_ne!(first.borrow().normal.x, second.borrow().normal.x);
        assert_eq!(pool.slots.len(), 2);
    }

    #[test]
    fn warm_pool_reuses_from_slot_zero_each_step() {
        let mut pool = ContactPool::new();
        pool.reset();
        let handle_a = pool.capture(dummy_snapshot(1.0));

        // Next step: reset, then re-capture — should reuse the same cell.
        pool.reset();
        let handle_a_again = pool.capture(dummy_snapshot(9.0));

        assert_eq!(handle_a.borrow().normal.x, 9.0);
        assert_eq!(handle_a_again.borrow().normal.x, 9.0);
        assert_eq!(pool.slots.len(), 1);
    }

    #[test]
    fn detach_survives_reuse() {
        let mut pool = ContactPool::new();
        pool.reset();
        let handle = pool.capture(dummy_snapshot(1.0));
        let detached = handle.detach();

        pool.reset();
        pool.capture(dummy_snapshot(42.0));

        assert_eq!(detached.normal.x, 1.0);
        assert_eq!(handle.borrow().normal.x, 42.0);
    }
}
