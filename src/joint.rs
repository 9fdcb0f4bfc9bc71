//! Joint construction (spec §4.4 `addJoint`/`removeJoint`, §9(b)): a
//! thin passthrough to rapier2d's own joint builders. The wrapper only
//! unwraps [`crate::ids::ColliderId`] arguments down to the body
//! handles the builder needs; it does not validate each joint kind's
//! own constraints, matching spec §9(b)'s "up to the caller" stance.

use nalgebra::{Point2, UnitVector2};
use rapier2d::dynamics::{
    FixedJointBuilder, ImpulseJointHandle, PrismaticJointBuilder, RevoluteJointBuilder,
};

/// One joint's construction parameters. Box2D's finer joint taxonomy
/// (spec §6 lists `DistanceJoint`, `FrictionJoint`, `GearJoint`,
/// `MouseJoint`, `PrismaticJoint`, `PulleyJoint`, `RevoluteJoint`,
/// `RopeJoint`, `WeldJoint`, `WheelJoint`) is realized concretely on
/// top of rapier2d's three native 2D joint types — see DESIGN.md for
/// the mapping (e.g. `WeldJoint` ≈ `Fixed`, `WheelJoint` ≈ `Prismatic`
/// with a motor).
#[derive(Debug, Clone, Copy)]
pub enum JointParams {
    /// Welds two bodies together with no relative motion allowed.
    Fixed {
        local_anchor1: Point2<f32>,
        local_anchor2: Point2<f32>,
    },
    /// A hinge allowing rotation about a shared anchor point.
    Revolute {
        local_anchor1: Point2<f32>,
        local_anchor2: Point2<f32>,
        motor_target_vel: Option<f32>,
        limits: Option<[f32; 2]>,
    },
    /// A slider allowing translation along a shared axis.
    Prismatic {
        local_anchor1: Point2<f32>,
        local_anchor2: Point2<f32>,
        local_axis1: UnitVector2<f32>,
        motor_target_vel: Option<f32>,
        limits: Option<[f32; 2]>,
    },
}

pub(crate) fn build(params: JointParams) -> rapier2d::dynamics::GenericJoint {
    match params {
        JointParams::Fixed {
            local_anchor1,
            local_anchor2,
        } => FixedJointBuilder::new()
            .local_anchor1(local_anchor1)
            .local_anchor2(local_anchor2)
            .build()
            .into(),
        JointParams::Revolute {
            local_anchor1,
            local_anchor2,
            motor_target_vel,
            limits,
        } => {
            let mut builder = RevoluteJointBuilder::new()
                .local_anchor1(local_anchor1)
                .local_anchor2(local_anchor2);
            if let Some(vel) = motor_target_vel {
                builder = builder.motor_velocity(vel, 0.0);
            }
            if let Some([lo, hi]) = limits {
                builder = builder.limits([lo, hi]);
            }
            builder.build().into()
        }
        JointParams::Prismatic {
            local_anchor1,
            local_anchor2,
            local_axis1,
            motor_target_vel,
            limits,
        } => {
            let mut builder = PrismaticJointBuilder::new(local_axis1)
                .local_anchor1(local_anchor1)
                .local_anchor2(local_anchor2);
            if let Some(vel) = motor_target_vel {
                builder = builder.motor_velocity(vel, 0.0);
            }
            if let Some([lo, hi]) = limits {
                builder = builder.limits([lo, hi]);
            }
            builder.build().into()
        }
    }
}

/// A registered joint handle, returned by [`crate::World::add_joint`].
pub type JointId = ImpulseJointHandle;
