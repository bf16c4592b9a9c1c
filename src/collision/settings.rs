/*!
Movement-solver tolerances and tie-break constants.

These constants centralize the parameters used by the collide-and-slide
solver and ground sticking. Keeping them together makes tuning easier and
helps ensure deterministic behavior across platforms.

Notes
- Distances are in meters, time in seconds, angles as cosines.
- Favor practical world-space tolerances over machine epsilon for robust
  behavior.
- Per-character customization happens through `CharacterConfig`; these are
  the defaults it starts from.
*/

/// Maximum number of cast-and-slide iterations per solver phase.
/// Higher values help with tight corners at the cost of more shape casts.
pub const NUM_ITERATIONS: usize = 5;

/// Collision margin subtracted from cast shapes and kept as separation from
/// surfaces (meters). Too large creates visible gaps; too small risks jitter
/// on contact.
///
/// A cast whose snap distance comes out at or below this margin must be
/// treated as "already touching" and skip its position write; omitting that
/// check causes visible jitter and sticking against surfaces.
pub const SKIN_WIDTH: f32 = 0.015;

/// Maximum riser height climbable in a single tick by the stair probe
/// (meters).
pub const STAIR_CLIMB_HEIGHT_MAX: f32 = 0.6;

/// Minimum squared movement threshold to consider a step meaningful (m^2).
/// Movements below this are treated as zero to avoid tiny oscillations.
pub const MIN_MOVE_SQ: f32 = 1.0e-8;

/// Practical small distance for comparisons (meters).
pub const DIST_EPS: f32 = 1.0e-6;

/// Default cosine of the maximum walkable ground slope (46 degrees).
pub const DEFAULT_COS_MAX_GROUND_SLOPE: f32 = 0.694_658_4;

/// Default cosine of the maximum "flat enough" ceiling slope, applied to the
/// negated up-dot of the contact normal (46 degrees).
pub const DEFAULT_COS_MAX_CEILING_SLOPE: f32 = 0.694_658_4;

/// Default maximum downward probe distance for sticking to ground (meters).
pub const DEFAULT_STICK_TO_GROUND_MAX_DELTA: f32 = 0.5;

/// Downward speed a character keeps while grounded so the vertical phase
/// presses it against the floor each tick (meters per second, negative = down).
pub const GROUND_STICK_SPEED: f32 = -2.0;
