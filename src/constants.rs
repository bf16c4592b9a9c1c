use std::time::Duration;

/// Fixed simulation tick length in seconds (40 Hz).
///
/// All gameplay simulation, input sampling and physics queries run at this
/// exact rate regardless of the render framerate. The global timescale
/// stretches the *real* time waited between ticks, never this value, so the
/// fixed-step math stays stable under slow-motion effects.
pub const SIM_TICK_DELTA: f32 = 0.025;

/// [`SIM_TICK_DELTA`] as a `Duration`, for loop pacing.
pub const SIM_TICK_PERIOD: Duration = Duration::from_millis(25);

/// Hard capacity of the capsule, voxel-field and platform pools.
///
/// These pools are a deliberate content budget: exhausting one is a design
/// error, not a recoverable runtime condition, and creation panics loudly.
pub const PHYSICS_OBJECTS_MAX_CAPACITY: usize = 10_000;

/// Hard capacity of the simulation-transform interpolation pool.
pub const SIM_TRANSFORM_POOL_CAPACITY: usize = 131_072;

/// Contact prediction distance handed to the backend collision step (meters).
///
/// Must stay comfortably above the solver skin width so characters resting a
/// skin's distance above ground keep a persistent contact manifold.
pub const CONTACT_PREDICTION_DISTANCE: f32 = 0.05;

/// Default world gravity (meters per second squared, -Y is down).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -37.5, 0.0];
