//! Public identifiers handed back to callers.

use rapier2d::dynamics::RigidBodyHandle;

/// Identifies one [`crate::Collider`] for the lifetime of the [`crate::World`]
/// that owns it. A thin newtype over rapier2d's own rigid-body handle,
/// since one collider façade owns exactly one body and the handle already
/// carries the generation bookkeeping needed to detect stale references
/// after `destroy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderId(pub(crate) RigidBodyHandle);

impl ColliderId {
    pub(crate) fn from_body(handle: RigidBodyHandle) -> Self {
        Self(handle)
    }

    pub(crate) fn body_handle(self) -> RigidBodyHandle {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn dummy(index: u32) -> Self {
        Self(RigidBodyHandle::from_raw_parts(index, 0))
    }
}

/// Packs a rigid-body handle into a fixture's `user_data`, so a raw
/// engine callback handed a `ColliderHandle` can recover the owning
/// [`ColliderId`] without a side table — the same trick `fyrox-impl`
/// plays with its own `Handle<Node>::encode_to_u128`/`decode_from_u128`
/// in `scene/dim2/physics.rs`.
pub(crate) fn encode_owner(handle: RigidBodyHandle) -> u128 {
    let (index, generation) = handle.into_raw_parts();
    ((index as u128) << 32) | generation as u128
}

/// Inverse of [`encode_owner`].
pub(crate) fn decode_owner(data: u128) -> ColliderId {
    let index = (data >> 32) as u32;
    let generation = data as u32;
    ColliderId(RigidBodyHandle::from_raw_parts(index, generation))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_then_decode_roundtrips_index_and_generation() {
        let handle = RigidBodyHandle::from_raw_parts(7, 3);
        let id = decode_owner(encode_owner(handle));
        assert_eq!(id.body_handle(), handle);
    }
}
