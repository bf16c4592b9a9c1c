/*!
Character movement: the per-tick integration around the collide-and-slide
solver.

Owns a character's tunables and persistent movement state, and implements
the [`Simulate`] callback the simulation loop invokes each tick. Per tick:

1. consume backend contact events into the moving-platform attachment,
2. fold the platform's delta motion and facing spin into the character,
3. shape the horizontal velocity toward the input direction with the
   configured acceleration/deceleration rates,
4. integrate gravity into the vertical velocity (reset to a small downward
   "press" while supported, jump impulse while grounded),
5. run the solver phases in XZ -> Y -> ground-stick order,
6. commit the final position and realized velocity to the backend.
*/

use crate::collision::settings::{
    DEFAULT_COS_MAX_CEILING_SLOPE, DEFAULT_COS_MAX_GROUND_SLOPE,
    DEFAULT_STICK_TO_GROUND_MAX_DELTA, GROUND_STICK_SPEED, MIN_MOVE_SQ,
};
use crate::collision::types::{MovementInput, MovementOutput, VerticalOutcome};
use crate::collision::{
    SolveContext, move_from_xz_input, move_from_y_input, move_to_try_stick_to_ground,
};
use crate::debug_vis::DebugVisLineKind;
use crate::platform::MovingPlatformAttachment;
use crate::sim::{Simulate, TickContext};
use crate::types::{Quat, Vec3};
use crate::world::CapsuleHandle;

/// Per-character movement tunables, set by the owning entity at
/// construction. There is no config file; these are plain numeric fields.
#[derive(Clone, Copy, Debug)]
pub struct CharacterConfig {
    pub radius: f32,
    pub height: f32,
    /// Top horizontal speed (meters per second).
    pub max_speed: f32,
    /// Horizontal speed gain per second toward the input direction.
    pub acceleration: f32,
    /// Horizontal speed loss per second without input (or against it).
    pub deceleration: f32,
    pub cos_max_ground_slope: f32,
    pub cos_max_ceiling_slope: f32,
    /// Apex height of a jump (meters); the impulse is derived from this and
    /// the world gravity.
    pub jump_height: f32,
    pub stick_to_ground_max_delta: f32,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            radius: 0.25,
            height: 1.4,
            max_speed: 5.0,
            acceleration: 40.0,
            deceleration: 50.0,
            cos_max_ground_slope: DEFAULT_COS_MAX_GROUND_SLOPE,
            cos_max_ceiling_slope: DEFAULT_COS_MAX_CEILING_SLOPE,
            jump_height: 1.0,
            stick_to_ground_max_delta: DEFAULT_STICK_TO_GROUND_MAX_DELTA,
        }
    }
}

/// Input for one tick, written by the owning gameplay code before the tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharacterInput {
    /// Desired world-space movement direction on the XZ plane; magnitudes
    /// above 1 are normalized.
    pub move_dir: Vec3,
    /// Jump trigger; only honored while grounded.
    pub jump: bool,
}

/// A simulated character: capsule handle, tunables, and movement state.
pub struct Character {
    pub capsule: CapsuleHandle,
    pub config: CharacterConfig,
    pub input: CharacterInput,
    /// Facing yaw in radians about +Y.
    pub facing: f32,
    pub attachment: MovingPlatformAttachment,
    /// Solver outputs from the last tick (grounded/ceiling flags and the
    /// realized velocity), for animation and combat state upstream.
    pub last_output: MovementOutput,

    horizontal_velocity: Vec3,
    vertical_velocity: f32,
    attempt_stick: bool,
}

impl Character {
    pub fn new(capsule: CapsuleHandle, config: CharacterConfig) -> Self {
        Self {
            capsule,
            config,
            input: CharacterInput::default(),
            facing: 0.0,
            attachment: MovingPlatformAttachment::new(),
            last_output: MovementOutput::default(),
            horizontal_velocity: Vec3::zeros(),
            vertical_velocity: 0.0,
            attempt_stick: false,
        }
    }

    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.last_output.is_grounded
    }

    #[inline]
    pub fn hit_ceiling(&self) -> bool {
        self.last_output.hit_ceiling
    }

    /// Build the solver input state for this tick.
    fn movement_input(&self, gravity: Vec3) -> MovementInput {
        let magnitude = gravity.norm();
        let direction = if magnitude > f32::EPSILON {
            gravity / magnitude
        } else {
            -Vec3::y()
        };
        MovementInput {
            input_velocity: self.horizontal_velocity,
            vertical_velocity: self.vertical_velocity,
            cos_max_ground_slope: self.config.cos_max_ground_slope,
            cos_max_ceiling_slope: self.config.cos_max_ceiling_slope,
            stick_to_ground_max_delta: self.config.stick_to_ground_max_delta,
            gravity_direction: direction,
            gravity_magnitude: magnitude,
        }
    }

    /// Accelerate the horizontal velocity toward the input direction,
    /// clamping the change to the configured rates.
    fn shape_horizontal_velocity(&mut self, dt: f32) {
        let mut dir = Vec3::new(self.input.move_dir.x, 0.0, self.input.move_dir.z);
        if dir.norm_squared() > 1.0 {
            dir = dir.normalize();
        }
        let desired = dir * self.config.max_speed;

        let rate = if desired.norm_squared() > self.horizontal_velocity.norm_squared() {
            self.config.acceleration
        } else {
            self.config.deceleration
        };

        let to_desired = desired - self.horizontal_velocity;
        let max_change = rate * dt;
        let change = if to_desired.norm() > max_change {
            to_desired * (max_change / to_desired.norm())
        } else {
            to_desired
        };
        self.horizontal_velocity += change;

        if dir.norm_squared() > MIN_MOVE_SQ {
            self.facing = dir.x.atan2(dir.z);
        }
    }
}

impl Simulate for Character {
    fn simulate(&mut self, ctx: &mut TickContext<'_>) {
        let dt = ctx.dt;

        // Contact events collected by the previous backend step feed the
        // platform attachment; a tick without any resets it below.
        let contacts = ctx.world.take_contacts(self.capsule);
        for contact in &contacts {
            self.attachment.observe_contact(
                contact,
                self.config.radius,
                self.config.cos_max_ground_slope,
            );
        }

        let platform_delta = self.attachment.consume_tick_delta().unwrap_or_else(Vec3::zeros);
        if self.attachment.carries_rider() {
            // Riding a turning platform turns the character with it.
            self.facing += self.attachment.y_axis_angular_velocity * dt;
        }

        let Some(cap) = ctx.world.capsule(self.capsule) else {
            log::warn!("character refers to a destroyed capsule {:?}", self.capsule);
            return;
        };
        let start = cap.position;
        let body = cap.body;
        let slot = cap.sim_transform_slot;

        self.shape_horizontal_velocity(dt);

        // Vertical velocity: press down while supported, jump while
        // grounded, otherwise accumulate gravity.
        let gravity_magnitude = ctx.world.world_gravity().norm();
        if self.last_output.is_grounded || self.last_output.hit_ceiling {
            self.vertical_velocity = GROUND_STICK_SPEED;
        }
        if self.input.jump && self.last_output.is_grounded {
            self.vertical_velocity = (2.0 * self.config.jump_height * gravity_magnitude).sqrt();
        }
        self.vertical_velocity -= gravity_magnitude * dt;

        let input = self.movement_input(ctx.world.world_gravity());
        let up = -input.gravity_direction;

        let solve = SolveContext {
            world: ctx.world,
            vis: ctx.vis,
            ignore_body: body,
            capsule_radius: self.config.radius,
            capsule_height: self.config.height,
        };

        // The platform's motion carries the character before its own.
        let mut position = start + platform_delta;

        let xz_delta = Vec3::new(
            input.input_velocity.x * dt,
            0.0,
            input.input_velocity.z * dt,
        );
        if xz_delta.norm_squared() > MIN_MOVE_SQ {
            move_from_xz_input(&solve, &mut position, xz_delta, input.cos_max_ground_slope);
        }

        let vertical_delta = up * (input.vertical_velocity * dt);
        let outcome = move_from_y_input(
            &solve,
            &mut position,
            vertical_delta,
            input.cos_max_ground_slope,
            input.cos_max_ceiling_slope,
        );
        let mut grounded = outcome == VerticalOutcome::Grounded;
        let hit_ceiling = outcome == VerticalOutcome::HitCeiling;

        // Stick to ground: only when not already grounded, not moving
        // upward, and only with the probe budget gravity hasn't spent.
        let downward_travel = (-input.vertical_velocity * dt).max(0.0);
        if !grounded
            && input.vertical_velocity <= 0.0
            && self.attempt_stick
            && input.stick_to_ground_max_delta > downward_travel
        {
            let probe =
                input.gravity_direction * (input.stick_to_ground_max_delta - downward_travel);
            grounded = move_to_try_stick_to_ground(
                &solve,
                &mut position,
                probe,
                input.cos_max_ground_slope,
            );
        }

        // Hand the realized velocity to the backend mover so its contact
        // reporting stays consistent with the resolved position.
        let realized = (position - start) / dt;
        ctx.world.move_character(self.capsule, position, realized);
        if let Some(vis) = ctx.vis {
            vis.push(start, position, DebugVisLineKind::Velocity);
        }

        // Keep the horizontal component of the character's own motion (the
        // platform's carry excluded) as next tick's velocity baseline; the
        // vertical component is re-derived from gravity next tick.
        let own_motion = (position - start - platform_delta) / dt;
        self.horizontal_velocity = Vec3::new(own_motion.x, 0.0, own_motion.z);

        self.last_output = MovementOutput {
            is_grounded: grounded,
            hit_ceiling,
            realized_velocity: realized,
        };
        self.attempt_stick = grounded;

        // Facing is cosmetic: it goes straight to the interpolation ring.
        ctx.ring
            .update_rotation(slot, Quat::from_axis_angle(&Vec3::y_axis(), self.facing));
    }
}
