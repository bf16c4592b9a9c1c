//! The collide-and-slide movement solver.
//!
//! Converts a desired world-space displacement for a capsule into a
//! collision-safe final position, handling slopes, walls, stairs and
//! ceilings without any generic rigid-body dynamics.
//!
//! Each phase shape-casts a cylinder matching the capsule envelope (minus
//! skin width) along the remaining delta, advances to just before the
//! contact, and redirects the leftover motion along the contact surface,
//! iterating up to a fixed cap. The skin width keeps the capsule a hair off
//! every surface; a cast whose snap distance lands at or below the skin is
//! treated as "already touching" and contributes no position change, which
//! prevents degenerate zero-length re-casts and jitter against surfaces.

use rapier3d::prelude::RigidBodyHandle;

use crate::debug_vis::{DebugVisBuffer, DebugVisLineKind};
use crate::types::Vec3;
use crate::world::PhysicsWorld;

use super::settings::{MIN_MOVE_SQ, NUM_ITERATIONS, SKIN_WIDTH, STAIR_CLIMB_HEIGHT_MAX};
use super::types::{MoveHit, VerticalOutcome};

/// Everything a solver phase needs to cast against the world.
pub struct SolveContext<'a> {
    pub world: &'a PhysicsWorld,
    pub vis: Option<&'a DebugVisBuffer>,
    /// The character's own backend body, ignored by all casts.
    pub ignore_body: RigidBodyHandle,
    pub capsule_radius: f32,
    pub capsule_height: f32,
}

impl SolveContext<'_> {
    /// Cast the capsule's envelope (minus skin) from `origin`.
    fn cast(&self, origin: Vec3, dir_and_mag: Vec3) -> Option<MoveHit> {
        self.world.cylinder_cast(
            origin,
            self.capsule_radius - SKIN_WIDTH,
            self.capsule_height,
            self.ignore_body,
            dir_and_mag,
        )
    }

    fn vis_hit(&self, at: Vec3, hit: &MoveHit, kind: DebugVisLineKind) {
        if let Some(vis) = self.vis {
            vis.push(at, at + hit.normal, kind);
        }
    }
}

/// `glm`-style rescale: set `v`'s magnitude to `len` (zero vectors pass
/// through unchanged).
#[inline]
fn scale_to(v: Vec3, len: f32) -> Vec3 {
    let n = v.norm();
    if n <= f32::EPSILON { v } else { v * (len / n) }
}

#[inline]
fn normalize_or_zero(v: Vec3) -> Vec3 {
    let n = v.norm();
    if n <= f32::EPSILON { Vec3::zeros() } else { v / n }
}

/// Project `delta` onto the plane with `plane_normal`, then rescale the
/// result back to `delta`'s original magnitude.
fn project_and_scale(delta: Vec3, plane_normal: Vec3) -> Vec3 {
    let mag = delta.norm();
    let sqr = plane_normal.norm_squared();
    if sqr < f32::EPSILON {
        return delta;
    }
    let projected = delta - plane_normal * (delta.dot(&plane_normal) / sqr);
    scale_to(projected, mag)
}

/// Horizontal movement phase.
///
/// Iteratively casts along the remaining delta. Walkable contacts redirect
/// the remaining motion straight up/down the slope (line-plane projection
/// preserving the horizontal travel); steep contacts slide tangentially,
/// scaled down so the slide never exceeds the magnitude lost to the wall and
/// zeroed entirely when it would point back against the original input.
/// Whenever a horizontal run remains at a contact, a three-cast stair probe
/// (up, forward, down) may consume it by climbing a riser up to
/// [`STAIR_CLIMB_HEIGHT_MAX`] in a single call.
pub fn move_from_xz_input(
    ctx: &SolveContext<'_>,
    position: &mut Vec3,
    delta: Vec3,
    cos_max_ground_slope: f32,
) {
    let mut delta = delta;
    let init_reverse_flat = normalize_or_zero(Vec3::new(-delta.x, 0.0, -delta.z));

    for _ in 0..NUM_ITERATIONS {
        if delta.norm_squared() <= MIN_MOVE_SQ {
            break;
        }

        let cast_dist = delta.norm() + SKIN_WIDTH;
        let dir = delta / delta.norm();

        let Some(hit) = ctx.cast(*position, dir * cast_dist) else {
            // Free to continue.
            *position += delta;
            break;
        };

        let snap_dist = cast_dist * hit.fraction - SKIN_WIDTH;
        let mut snap_delta = dir * snap_dist;
        ctx.vis_hit(*position + snap_delta, &hit, DebugVisLineKind::CastHit);

        // Subtract the raw snap from the remaining motion, but never commit
        // a sub-skin advance.
        delta -= snap_delta;
        if snap_dist <= SKIN_WIDTH {
            snap_delta = Vec3::zeros();
        }

        // A leftover horizontal run at a contact may be a stair riser.
        let flat_remaining = Vec3::new(delta.x, 0.0, delta.z);
        if flat_remaining.norm_squared() > MIN_MOVE_SQ
            && let Some(step) =
                try_climb_step(ctx, *position + snap_delta, flat_remaining, cos_max_ground_slope)
        {
            *position = step.end_position;
            let flat_len = flat_remaining.norm();
            let leftover = ((flat_len - step.forward_travel) / flat_len).max(0.0);
            delta *= leftover;
            continue;
        }

        if Vec3::y().dot(&hit.normal) > cos_max_ground_slope {
            // Walkable slope: adjust the remaining delta so the character
            // climbs straight up/down it, keeping the horizontal component
            // of travel intact (line-plane intersection).
            let scale = delta.norm();
            let mut redirected = delta;
            redirected.y = -hit.normal.dot(&Vec3::new(delta.x, 0.0, delta.z)) / hit.normal.y;
            delta = scale_to(redirected, scale);
        } else {
            // Steep wall: slide along it, never farther than the magnitude
            // the wall absorbed, and not backward against the input.
            let flat_normal = normalize_or_zero(Vec3::new(hit.normal.x, 0.0, hit.normal.z));
            let scale = 1.0 - flat_normal.dot(&init_reverse_flat);

            delta = project_and_scale(Vec3::new(delta.x, 0.0, delta.z), flat_normal);
            if delta.norm_squared() > scale * scale {
                delta = scale_to(delta, scale);
            }
        }

        // Move as far as possible.
        *position += snap_delta;
    }
}

/// Vertical movement phase, along the (possibly tilted) gravity-aligned
/// delta.
///
/// Classifies contacts as flat ground (stop, grounded), flat ceiling (stop,
/// ceiling hit, separate cosine threshold on the negated up-dot), or steep
/// wall (slide and keep iterating). At most one of grounded/ceiling results
/// per call.
pub fn move_from_y_input(
    ctx: &SolveContext<'_>,
    position: &mut Vec3,
    delta: Vec3,
    cos_max_ground_slope: f32,
    cos_max_ceiling_slope: f32,
) -> VerticalOutcome {
    let mut delta = delta;

    for _ in 0..NUM_ITERATIONS {
        if delta.norm_squared() <= MIN_MOVE_SQ {
            break;
        }

        let cast_dist = delta.norm() + SKIN_WIDTH;
        let dir = delta / delta.norm();

        let Some(hit) = ctx.cast(*position, dir * cast_dist) else {
            // Free to continue.
            *position += delta;
            break;
        };

        let snap_dist = cast_dist * hit.fraction - SKIN_WIDTH;
        let mut snap_delta = dir * snap_dist;
        ctx.vis_hit(*position + snap_delta, &hit, DebugVisLineKind::GroundProbe);

        delta -= snap_delta;
        if snap_dist <= SKIN_WIDTH {
            snap_delta = Vec3::zeros();
        }

        let up_dot = Vec3::y().dot(&hit.normal);
        if up_dot > cos_max_ground_slope {
            // Flat ground.
            *position += snap_delta;
            return VerticalOutcome::Grounded;
        } else if -up_dot > cos_max_ceiling_slope {
            // Flat-enough ceiling.
            *position += snap_delta;
            return VerticalOutcome::HitCeiling;
        } else {
            // Steep wall.
            *position += snap_delta;
            delta = project_and_scale(delta, hit.normal);
        }
    }

    VerticalOutcome::Airborne
}

/// Ground-stick probe.
///
/// Same iterative wall-sliding loop as the vertical phase, but run on a
/// tentative position: the *only* success condition is reaching flat ground,
/// and the probed position is committed only then. Keeps characters from
/// visibly hopping when walking down slight slopes or over floor seams.
pub fn move_to_try_stick_to_ground(
    ctx: &SolveContext<'_>,
    position: &mut Vec3,
    delta: Vec3,
    cos_max_ground_slope: f32,
) -> bool {
    let mut delta = delta;
    let mut probed = *position;

    for _ in 0..NUM_ITERATIONS {
        if delta.norm_squared() <= MIN_MOVE_SQ {
            break;
        }

        let cast_dist = delta.norm() + SKIN_WIDTH;
        let dir = delta / delta.norm();

        let Some(hit) = ctx.cast(probed, dir * cast_dist) else {
            // No collision: confirmed there is no ground to stick to.
            return false;
        };

        let snap_dist = cast_dist * hit.fraction - SKIN_WIDTH;
        let mut snap_delta = dir * snap_dist;
        ctx.vis_hit(probed + snap_delta, &hit, DebugVisLineKind::GroundProbe);

        delta -= snap_delta;
        if snap_dist <= SKIN_WIDTH {
            snap_delta = Vec3::zeros();
        }

        if Vec3::y().dot(&hit.normal) > cos_max_ground_slope {
            // Flat ground: commit the probe.
            probed += snap_delta;
            *position = probed;
            return true;
        }

        // Steep wall; there may still be ground further down, continue.
        probed += snap_delta;
        delta = project_and_scale(delta, hit.normal);
    }

    false
}

struct StepResult {
    end_position: Vec3,
    forward_travel: f32,
}

/// Three-cast staircase probe: up (headroom), forward (over the riser), then
/// down (settle). Succeeds only on a walkable landing that is genuinely
/// above the starting level.
fn try_climb_step(
    ctx: &SolveContext<'_>,
    start: Vec3,
    flat_remaining: Vec3,
    cos_max_ground_slope: f32,
) -> Option<StepResult> {
    let up = Vec3::y();

    // Headroom: how far up we can go, bounded by the climb budget.
    let up_budget = STAIR_CLIMB_HEIGHT_MAX + SKIN_WIDTH;
    let up_dist = match ctx.cast(start, up * up_budget) {
        Some(hit) => up_budget * hit.fraction - SKIN_WIDTH,
        None => STAIR_CLIMB_HEIGHT_MAX,
    };
    if up_dist <= SKIN_WIDTH {
        return None;
    }
    let raised = start + up * up_dist;

    // Forward: the raised cast must clear the riser to make any progress.
    let flat_len = flat_remaining.norm();
    let fwd_dir = flat_remaining / flat_len;
    let fwd_budget = flat_len + SKIN_WIDTH;
    let forward_travel = match ctx.cast(raised, fwd_dir * fwd_budget) {
        Some(hit) => fwd_budget * hit.fraction - SKIN_WIDTH,
        None => flat_len,
    };
    if forward_travel <= SKIN_WIDTH {
        return None;
    }
    let advanced = raised + fwd_dir * forward_travel;

    // Settle: a walkable landing within the climbed height.
    let down_budget = up_dist + SKIN_WIDTH * 2.0;
    let hit = ctx.cast(advanced, -up * down_budget)?;
    if up.dot(&hit.normal) <= cos_max_ground_slope {
        return None;
    }
    let down_dist = (down_budget * hit.fraction - SKIN_WIDTH).max(0.0);

    let rise = up_dist - down_dist;
    if rise <= SKIN_WIDTH {
        // Landed back at the starting level: not a step.
        return None;
    }

    let end_position = advanced - up * down_dist;
    if let Some(vis) = ctx.vis {
        vis.push(start, raised, DebugVisLineKind::StairProbe);
        vis.push(raised, advanced, DebugVisLineKind::StairProbe);
        vis.push(advanced, end_position, DebugVisLineKind::StairProbe);
    }

    Some(StepResult {
        end_position,
        forward_travel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::collision::settings::DEFAULT_COS_MAX_GROUND_SLOPE;
    use crate::interp::TransformRing;
    use crate::owner::{OwnerKind, pack_owner};
    use crate::types::Quat;
    use crate::world::{CapsuleDesc, ColliderDef, PhysicsWorld, ShapeDef};

    const RADIUS: f32 = 0.25;
    const HEIGHT: f32 = 1.4;

    struct Fixture {
        world: PhysicsWorld,
        body: RigidBodyHandle,
    }

    impl Fixture {
        /// World with a big flat floor whose top face is at y = 0, plus one
        /// capsule body used as the cast-ignore target.
        fn with_floor() -> Self {
            let ring = Arc::new(TransformRing::with_capacity(64));
            let mut world = PhysicsWorld::new(ring);
            world.create_static(
                None,
                &ColliderDef::new(
                    Vec3::new(0.0, -1.0, 0.0),
                    Quat::identity(),
                    ShapeDef::Cuboid {
                        half_extents: Vec3::new(50.0, 1.0, 50.0),
                    },
                ),
            );
            let capsule = world
                .create_capsule(CapsuleDesc {
                    owner: pack_owner(1, OwnerKind::Character),
                    position: Vec3::new(0.0, 5.0, 0.0),
                    radius: RADIUS,
                    height: HEIGHT,
                    enable_ccd: false,
                    forward_contacts: false,
                })
                .unwrap();
            let body = world.capsule(capsule).unwrap().body;
            world.step();
            Self { world, body }
        }

        fn add_box(&mut self, center: Vec3, half_extents: Vec3) {
            self.world.create_static(
                None,
                &ColliderDef::new(center, Quat::identity(), ShapeDef::Cuboid { half_extents }),
            );
            self.world.step();
        }

        fn ctx(&self) -> SolveContext<'_> {
            SolveContext {
                world: &self.world,
                vis: None,
                ignore_body: self.body,
                capsule_radius: RADIUS,
                capsule_height: HEIGHT,
            }
        }
    }

    fn base_y(center: Vec3) -> f32 {
        center.y - HEIGHT * 0.5
    }

    #[test]
    fn vertical_drop_lands_on_floor_within_skin() {
        let f = Fixture::with_floor();
        let mut pos = Vec3::new(0.0, 5.0, 0.0);

        let outcome = move_from_y_input(
            &f.ctx(),
            &mut pos,
            Vec3::new(0.0, -10.0, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );

        assert_eq!(outcome, VerticalOutcome::Grounded);
        assert!(
            base_y(pos).abs() <= 2.0 * SKIN_WIDTH,
            "resting base height {} outside skin tolerance",
            base_y(pos)
        );
    }

    #[test]
    fn vertical_drop_never_tunnels_through_the_floor() {
        let f = Fixture::with_floor();
        let mut pos = Vec3::new(0.0, 5.0, 0.0);
        move_from_y_input(
            &f.ctx(),
            &mut pos,
            Vec3::new(0.0, -500.0, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );
        assert!(base_y(pos) >= -SKIN_WIDTH);
    }

    #[test]
    fn jump_into_ceiling_reports_ceiling_hit() {
        let mut f = Fixture::with_floor();
        // Ceiling slab with its underside at y = 3.
        f.add_box(Vec3::new(0.0, 3.5, 0.0), Vec3::new(10.0, 0.5, 10.0));

        let mut pos = Vec3::new(0.0, 1.0, 0.0);
        let outcome = move_from_y_input(
            &f.ctx(),
            &mut pos,
            Vec3::new(0.0, 10.0, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );

        assert_eq!(outcome, VerticalOutcome::HitCeiling);
        // Capsule top must stop at (or within skin of) the ceiling.
        let top = pos.y + HEIGHT * 0.5;
        assert!((3.0 - top).abs() <= 2.0 * SKIN_WIDTH, "top at {top}");
    }

    #[test]
    fn head_on_wall_blocks_without_penetration() {
        let mut f = Fixture::with_floor();
        // Wall face toward -X at x = 1.
        f.add_box(Vec3::new(1.5, 2.0, 0.0), Vec3::new(0.5, 2.0, 10.0));

        let start = Vec3::new(0.0, 0.715, 0.0);
        let mut pos = start;
        move_from_xz_input(
            &f.ctx(),
            &mut pos,
            Vec3::new(2.0, 0.0, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );

        // Surface of the capsule may advance to the wall minus skin.
        assert!(pos.x <= 1.0 - RADIUS + SKIN_WIDTH);
        // Head-on input must not slide sideways or backward.
        assert!(pos.z.abs() < 1.0e-4);
        assert!(pos.x >= -1.0e-4);
    }

    #[test]
    fn angled_wall_contact_preserves_tangential_motion() {
        let mut f = Fixture::with_floor();
        f.add_box(Vec3::new(1.5, 2.0, 0.0), Vec3::new(0.5, 2.0, 10.0));

        let start = Vec3::new(0.5, 0.715, 0.0);
        let mut pos = start;
        // 45 degrees into the wall.
        move_from_xz_input(
            &f.ctx(),
            &mut pos,
            Vec3::new(1.0, 0.0, 1.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );

        let displacement = pos - start;
        // No penetration along the wall normal...
        assert!(pos.x <= 1.0 - RADIUS + SKIN_WIDTH);
        // ...but tangential travel survives.
        assert!(displacement.z > 0.1, "tangential travel {}", displacement.z);
    }

    #[test]
    fn climbable_step_is_climbed_in_one_call() {
        let mut f = Fixture::with_floor();
        let step_height = STAIR_CLIMB_HEIGHT_MAX - 0.05;
        f.add_box(
            Vec3::new(2.0, step_height * 0.5, 0.0),
            Vec3::new(1.0, step_height * 0.5, 10.0),
        );

        let mut pos = Vec3::new(0.0, HEIGHT * 0.5 + SKIN_WIDTH, 0.0);
        move_from_xz_input(
            &f.ctx(),
            &mut pos,
            Vec3::new(1.5, 0.0, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );

        assert!(
            base_y(pos) >= step_height - 2.0 * SKIN_WIDTH,
            "base {} did not reach the tread at {}",
            base_y(pos),
            step_height
        );
        assert!(pos.x > 0.8, "forward travel {} lost at the riser", pos.x);
    }

    #[test]
    fn overtall_step_blocks_like_a_wall() {
        let mut f = Fixture::with_floor();
        let step_height = STAIR_CLIMB_HEIGHT_MAX + 0.05;
        f.add_box(
            Vec3::new(2.0, step_height * 0.5, 0.0),
            Vec3::new(1.0, step_height * 0.5, 10.0),
        );

        let mut pos = Vec3::new(0.0, HEIGHT * 0.5 + SKIN_WIDTH, 0.0);
        move_from_xz_input(
            &f.ctx(),
            &mut pos,
            Vec3::new(1.5, 0.0, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );

        // Stopped at the riser, still at floor level.
        assert!(base_y(pos) < 0.1, "base {} climbed an overtall riser", base_y(pos));
        assert!(pos.x <= 1.0 - RADIUS + SKIN_WIDTH);
    }

    #[test]
    fn stick_probe_commits_only_on_flat_ground() {
        let f = Fixture::with_floor();

        // Just above the floor: the probe finds ground and commits.
        let mut pos = Vec3::new(0.0, HEIGHT * 0.5 + 0.2, 0.0);
        let stuck = move_to_try_stick_to_ground(
            &f.ctx(),
            &mut pos,
            Vec3::new(0.0, -0.5, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );
        assert!(stuck);
        assert!(base_y(pos).abs() <= 2.0 * SKIN_WIDTH);

        // Far above the floor: no ground within the probe, position holds.
        let start = Vec3::new(0.0, 5.0, 0.0);
        let mut pos = start;
        let stuck = move_to_try_stick_to_ground(
            &f.ctx(),
            &mut pos,
            Vec3::new(0.0, -0.5, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );
        assert!(!stuck);
        assert_eq!(pos, start);
    }

    #[test]
    fn walkable_slope_redirect_preserves_horizontal_travel() {
        let ring = Arc::new(TransformRing::with_capacity(64));
        let mut world = PhysicsWorld::new(ring);
        // A 30-degree ramp: walkable under the 46-degree default.
        let ramp_rot = Quat::from_axis_angle(&Vec3::z_axis(), 30f32.to_radians());
        world.create_static(
            None,
            &ColliderDef::new(
                Vec3::new(0.0, -0.5, 0.0),
                ramp_rot,
                ShapeDef::Cuboid {
                    half_extents: Vec3::new(50.0, 0.5, 50.0),
                },
            ),
        );
        let capsule = world
            .create_capsule(CapsuleDesc {
                owner: pack_owner(1, OwnerKind::Character),
                position: Vec3::new(0.0, 5.0, 0.0),
                radius: RADIUS,
                height: HEIGHT,
                enable_ccd: false,
                forward_contacts: false,
            })
            .unwrap();
        let body = world.capsule(capsule).unwrap().body;
        world.step();

        let ctx = SolveContext {
            world: &world,
            vis: None,
            ignore_body: body,
            capsule_radius: RADIUS,
            capsule_height: HEIGHT,
        };

        // Settle onto the ramp first.
        let mut pos = Vec3::new(0.0, 5.0, 0.0);
        let outcome = move_from_y_input(
            &ctx,
            &mut pos,
            Vec3::new(0.0, -10.0, 0.0),
            DEFAULT_COS_MAX_GROUND_SLOPE,
            DEFAULT_COS_MAX_GROUND_SLOPE,
        );
        assert_eq!(outcome, VerticalOutcome::Grounded);

        // Walk uphill. The normal leans toward -X, so the surface rises
        // toward +X.
        let before = pos;
        move_from_xz_input(&ctx, &mut pos, Vec3::new(0.5, 0.0, 0.0), DEFAULT_COS_MAX_GROUND_SLOPE);

        let moved = pos - before;
        assert!(moved.x > 0.05, "no uphill travel: {moved:?}");
        assert!(moved.y > 0.0, "climbing must gain height: {moved:?}");
    }
}
