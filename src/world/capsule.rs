//! Capsule bodies: one per character.
//!
//! Capsules are kinematic "character" controllers: the backend never computes
//! collision response for them. The movement solver resolves their positions
//! with explicit shape casts, and the backend only receives the resulting
//! pose and velocity so its contact reporting stays consistent.

use rapier3d::prelude::RigidBodyHandle;

use crate::interp::SlotIndex;
use crate::owner::Owner;
use crate::types::Vec3;

/// Creation parameters for a character capsule.
#[derive(Clone, Copy, Debug)]
pub struct CapsuleDesc {
    /// Entity this capsule belongs to.
    pub owner: Owner,
    /// Initial world position of the capsule center.
    pub position: Vec3,
    /// Capsule radius (meters). Must be positive.
    pub radius: f32,
    /// Total capsule height including both hemispherical caps (meters).
    /// Must be positive and at least `2 * radius`.
    pub height: f32,
    /// Enable continuous collision detection on the backend body.
    pub enable_ccd: bool,
    /// Forward backend contact events to this capsule's owner (characters
    /// that ride moving platforms want this).
    pub forward_contacts: bool,
}

/// One character's physical presence.
#[derive(Debug)]
pub struct CapsuleBody {
    pub owner: Owner,
    pub radius: f32,
    pub height: f32,
    /// Current center-of-mass position (capsule center, world space).
    pub position: Vec3,
    /// Position at the start of the current tick, for delta/velocity
    /// derivation and interpolation.
    pub prev_position: Vec3,
    /// Index into the simulation-transform interpolation pool.
    pub sim_transform_slot: SlotIndex,
    /// Set when the solver moved this capsule during the current tick.
    pub position_changed: bool,
    /// Backend contact events are forwarded to this capsule's owner.
    pub forward_contacts: bool,
    /// Backend body handle.
    pub body: RigidBodyHandle,
    /// Velocity handed to the backend for the current tick.
    pub(crate) velocity: Vec3,
}

impl CapsuleBody {
    /// Distance from the capsule center down to its base (lowest point).
    #[inline]
    pub fn base_offset(&self) -> f32 {
        self.height * 0.5
    }

    /// World position of the capsule's lowest point.
    #[inline]
    pub fn base_position(&self) -> Vec3 {
        self.position - Vec3::new(0.0, self.base_offset(), 0.0)
    }

    /// Half-length of the cylindrical section of the capsule.
    #[inline]
    pub fn cylinder_half_height(&self) -> f32 {
        ((self.height - 2.0 * self.radius) * 0.5).max(0.0)
    }

    /// Velocity handed to the backend for the current tick.
    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }
}
