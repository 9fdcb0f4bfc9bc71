//! Error types returned by the fatal-condition operations listed in the
//! crate's error handling design (duplicate/unknown class or shape names,
//! category exhaustion, and calling `set_explicit_collision_events` too
//! late). Every other invalid-but-survivable condition (querying a peer
//! class that was never registered, polling `enter` with nothing queued,
//! destroying an already-destroyed collider) returns a falsy or empty
//! value instead of an error.

use std::fmt::{self, Display, Formatter};

/// Failure conditions surfaced by the class registry and collider API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassError {
    /// `add_collision_class` was called with a name that already exists.
    DuplicateClass {
        /// The name that was already registered.
        name: String,
    },
    /// `set_collision_class` was called with a name that was never
    /// registered via `add_collision_class`/`add_collision_class_table`.
    UnknownClass {
        /// The name that could not be resolved.
        name: String,
    },
    /// `add_shape` was called with a name already used on the collider.
    DuplicateShape {
        /// The shape name that collided.
        name: String,
    },
    /// The ignore graph requires more than 16 distinct categories, which
    /// is the hard limit the underlying engine imposes on fixture
    /// filtering groups.
    CategoryOverflow {
        /// Class names belonging to the group that would have needed the
        /// 17th (or later) category id.
        offending: Vec<String>,
    },
    /// `set_explicit_collision_events` was called after at least one
    /// collision class already exists.
    RegistryFrozen,
}

impl Display for ClassError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClassError::DuplicateClass { name } => {
                write!(f, "a collision class named '{name}' is already registered")
            }
            ClassError::UnknownClass { name } => {
                write!(f, "no collision class named '{name}' has been registered")
            }
            ClassError::DuplicateShape { name } => {
                write!(f, "a shape named '{name}' already exists on this collider")
            }
            ClassError::CategoryOverflow { offending } => {
                write!(
                    f,
                    "ignore graph requires more than 16 categories (offending classes: {})",
                    offending.join(", ")
                )
            }
            ClassError::RegistryFrozen => write!(
                f,
                "set_explicit_collision_events must be called before the first collision class is added"
            ),
        }
    }
}

impl std::error::Error for ClassError {}
