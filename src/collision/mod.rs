//! Collide-and-slide movement solving for capsule characters.
//!
//! Submodules:
//! - [`types`]: hits and per-tick solver input/output state.
//! - [`settings`]: tolerances and tie-break constants.
//! - [`kinematic`]: the iterative cast-and-slide phases.

pub mod kinematic;
pub mod settings;
pub mod types;

pub use kinematic::{
    SolveContext, move_from_xz_input, move_from_y_input, move_to_try_stick_to_ground,
};
pub use types::{MoveHit, MovementInput, MovementOutput, VerticalOutcome};
