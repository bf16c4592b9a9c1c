//! Data types exchanged between the movement solver and its callers.

use crate::types::Vec3;

/// A single contact returned by a shape cast during sweep-and-slide.
#[derive(Clone, Copy, Debug)]
pub struct MoveHit {
    /// World-space contact normal on the moving shape, opposing the motion.
    pub normal: Vec3,
    /// Fraction (0..1) of the tested translation where the hit occurred.
    pub fraction: f32,
    /// World-space contact point on the hit shape.
    pub contact: Vec3,
}

/// Ephemeral per-tick input to the movement solver for one character.
///
/// Rebuilt by the owning entity every tick; nothing here persists.
#[derive(Clone, Copy, Debug)]
pub struct MovementInput {
    /// Desired horizontal velocity in world space (meters per second). The Y
    /// component is ignored.
    pub input_velocity: Vec3,
    /// Signed vertical velocity (meters per second, positive = up).
    pub vertical_velocity: f32,
    /// Cosine of the maximum walkable ground slope angle.
    pub cos_max_ground_slope: f32,
    /// Cosine of the maximum "flat enough" ceiling slope angle, tested
    /// against the negated up-dot of the contact normal.
    pub cos_max_ceiling_slope: f32,
    /// Maximum downward probe distance for sticking to ground (meters).
    pub stick_to_ground_max_delta: f32,
    /// Normalized gravity direction (points down).
    pub gravity_direction: Vec3,
    /// Gravity magnitude (meters per second squared, positive).
    pub gravity_magnitude: f32,
}

/// Solver outputs consumed by the owning entity on the next tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct MovementOutput {
    /// The character ended the tick supported by walkable ground.
    pub is_grounded: bool,
    /// The character's head hit a flat-enough ceiling this tick. Mutually
    /// exclusive with `is_grounded`.
    pub hit_ceiling: bool,
    /// Realized velocity for the tick, `(final - start) / dt`. Callers keep
    /// the horizontal component and re-derive the vertical one from gravity.
    pub realized_velocity: Vec3,
}

/// Outcome of one vertical solver phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalOutcome {
    /// Stopped on walkable ground.
    Grounded,
    /// Stopped against a flat-enough ceiling.
    HitCeiling,
    /// Consumed the delta (possibly sliding along steep walls) without
    /// resolving against ground or ceiling.
    Airborne,
}
