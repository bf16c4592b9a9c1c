//! Canonical collider definitions for static world geometry and platforms.
//!
//! Gameplay and tests describe level colliders with these schema-agnostic
//! definitions; [`collider_from_def`] turns one into a backend collider.
//!
//! Conventions
//! - Units are meters.
//! - Rotation is a unit quaternion.
//! - For planes, we use a pose-derived normal: `normal = rotation * +Y`,
//!   and compute `dist = dot(normal, translation) + offset_along_normal`.

use rapier3d::prelude::*;

use crate::types::{Quat, Vec3};

/// Definition of a world collider (static geometry or a moving platform).
#[derive(Clone, Debug)]
pub struct ColliderDef {
    /// World-space translation.
    pub translation: Vec3,
    /// World-space rotation (unit quaternion).
    pub rotation: Quat,
    /// Collider shape parameters.
    pub shape: ShapeDef,
    /// Sensor colliders report no blocking hits; movement casts skip them.
    pub sensor: bool,
}

impl ColliderDef {
    pub fn new(translation: Vec3, rotation: Quat, shape: ShapeDef) -> Self {
        Self {
            translation,
            rotation,
            shape,
            sensor: false,
        }
    }

    #[inline]
    pub fn pose(&self) -> Isometry<f32> {
        Isometry::from_parts(
            nalgebra::Translation3::new(self.translation.x, self.translation.y, self.translation.z),
            self.rotation,
        )
    }
}

/// Supported collider shapes.
///
/// Keep this intentionally small and deterministic. Extend as needed.
#[derive(Clone, Debug)]
pub enum ShapeDef {
    /// Infinite plane (half-space), normal derived from the pose as
    /// `rotation * +Y`, offset along that normal.
    Plane { offset_along_normal: f32 },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vec3 },

    /// Sphere/ball (meters).
    Sphere { radius: f32 },

    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },
}

impl ShapeDef {
    /// Build the bare shape in its local frame. Planes have no finite local
    /// shape and return `None`; use [`collider_from_def`] for those.
    pub fn shared_shape(&self) -> Option<SharedShape> {
        match self {
            ShapeDef::Plane { .. } => None,
            ShapeDef::Cuboid { half_extents } => Some(SharedShape::cuboid(
                half_extents.x,
                half_extents.y,
                half_extents.z,
            )),
            ShapeDef::Sphere { radius } => Some(SharedShape::ball(*radius)),
            ShapeDef::CapsuleY {
                radius,
                half_height,
            } => Some(SharedShape::capsule_y(*half_height, *radius)),
            ShapeDef::CylinderY {
                radius,
                half_height,
            } => Some(SharedShape::cylinder(*half_height, *radius)),
        }
    }
}

/// Build a backend collider from a [`ColliderDef`], with the def's full world
/// pose baked into the collider.
///
/// Intended for static geometry attached to a fixed body at the identity
/// pose. Moving platforms keep the pose on their kinematic body instead and
/// build their collider from [`ShapeDef::shared_shape`] with an identity
/// local transform.
pub fn collider_from_def(def: &ColliderDef, groups: InteractionGroups) -> Collider {
    let builder = match &def.shape {
        ShapeDef::Plane {
            offset_along_normal,
        } => {
            // Derive the world-space plane normal from the pose rotation,
            // then place the half-space at `normal * dist`.
            let n = def.rotation * Vector::y();
            let dist = n.dot(&def.translation) + *offset_along_normal;
            let unit_n = UnitVector::new_normalize(n);

            let halfspace = HalfSpace::new(unit_n);
            ColliderBuilder::new(SharedShape::new(halfspace))
                .translation(unit_n.into_inner() * dist)
        }

        // Finite shapes carry the def pose directly.
        _ => {
            let shape = self_shape(def);
            ColliderBuilder::new(shape).position(def.pose())
        }
    };

    builder.sensor(def.sensor).collision_groups(groups).build()
}

fn self_shape(def: &ColliderDef) -> SharedShape {
    def.shape
        .shared_shape()
        .expect("finite shape defs always have a local shape")
}
