/*!
Character-physics and simulation-timing core for a real-time game engine.

Two threads meet here: a **simulation thread** ticking at a fixed 40 Hz
([`sim`]) and a **render thread** that reads smoothly interpolated
transforms at its own rate ([`interp`]). Between them sit the physics
backend adapter ([`world`]), the collide-and-slide movement solver
([`collision`]), the moving-platform attachment logic ([`platform`]) and the
character mover that drives it all from the per-tick entity callback
([`character`]).

The backend (rapier) is used strictly for broadphase/narrowphase queries and
body bookkeeping: every body is fixed or kinematic, and collision response
for characters is resolved by the solver, not by a dynamics step.
*/

pub mod character;
pub mod collision;
pub mod constants;
pub mod debug_vis;
pub mod interp;
pub mod owner;
pub mod platform;
pub mod sim;
pub mod types;
pub mod world;

pub use character::{Character, CharacterConfig, CharacterInput};
pub use collision::{
    MoveHit, MovementInput, MovementOutput, SolveContext, VerticalOutcome, move_from_xz_input,
    move_from_y_input, move_to_try_stick_to_ground,
};
pub use constants::{PHYSICS_OBJECTS_MAX_CAPACITY, SIM_TICK_DELTA, SIM_TICK_PERIOD};
pub use debug_vis::{DebugVisBuffer, DebugVisLine, DebugVisLineKind};
pub use interp::{SlotIndex, TransformRing};
pub use owner::{
    Owner, OwnerId, OwnerKind, pack_owner, try_unpack_owner_kind, unpack_owner_id,
    unpack_owner_kind, validate_owner,
};
pub use platform::{AttachmentStage, MovingPlatformAttachment, PlatformContact};
pub use sim::{SimLoop, SimShared, Simulate, TickContext, run_tick};
pub use types::{Iso, Quat, Transform, Vec3};
pub use world::{
    CapsuleBody, CapsuleDesc, CapsuleHandle, ColliderDef, PhysicsWorld, PlatformBody,
    PlatformHandle, ShapeDef, VoxelFieldBody, VoxelFieldDesc, VoxelFieldHandle, WorldError,
    queries::RayHit, snapshot::SnapshotError,
};
