/*!
Physics backend adapter.

Hides the rigid-body engine behind the operations the movement solver and
gameplay code need: body creation/destruction for capsule characters, voxel
fields and moving platforms, shape/ray casts, gravity, and contact
forwarding.

Every body here is fixed or kinematic: collision *response* is computed by
the movement solver, never by a dynamics step. The backend only runs
collision detection (broadphase + narrowphase) so that queries and contact
manifolds stay available, via `CollisionPipeline`.

This module is the only place full backend contact information crosses into
gameplay code: after each step, contacts involving capsules flagged as
contact listeners are translated into [`PlatformContact`] events and queued
for their owners.
*/

pub mod capsule;
pub mod pool;
pub mod queries;
pub mod shapes;
pub mod snapshot;
pub mod voxel_field;

// Re-export the backend so downstream code can use its handle types without
// depending on rapier3d directly.
pub use rapier3d;

use std::collections::HashMap;
use std::sync::Arc;

use rapier3d::na::Translation3;
use rapier3d::prelude::*;
use thiserror::Error;

use crate::constants::{CONTACT_PREDICTION_DISTANCE, DEFAULT_GRAVITY, PHYSICS_OBJECTS_MAX_CAPACITY};
use crate::interp::{SlotIndex, TransformRing};
use crate::owner::Owner;
use crate::platform::PlatformContact;
use crate::types::{Iso, Quat, Transform, Vec3};

pub use capsule::{CapsuleBody, CapsuleDesc};
pub use pool::{Handle, Pool};
pub use shapes::{ColliderDef, ShapeDef, collider_from_def};
pub use voxel_field::{VoxelFieldBody, VoxelFieldDesc};

pub type CapsuleHandle = Handle<CapsuleBody>;
pub type VoxelFieldHandle = Handle<VoxelFieldBody>;
pub type PlatformHandle = Handle<PlatformBody>;

/// Collision layer for immovable level geometry.
pub const GROUP_STATIC: Group = Group::GROUP_1;
/// Collision layer for moving bodies: characters, platforms, kinematic voxel
/// fields. Ray casts are restricted to this layer.
pub const GROUP_MOVING: Group = Group::GROUP_2;

#[inline]
pub(crate) fn static_groups() -> InteractionGroups {
    InteractionGroups::new(GROUP_STATIC, Group::ALL, InteractionTestMode::And)
}

#[inline]
pub(crate) fn moving_groups() -> InteractionGroups {
    InteractionGroups::new(GROUP_MOVING, Group::ALL, InteractionTestMode::And)
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("voxel grid of {size_x}x{size_y}x{size_z} needs {expected} voxels, got {actual}")]
    VoxelGridMismatch {
        size_x: usize,
        size_y: usize,
        size_z: usize,
        expected: usize,
        actual: usize,
    },
    #[error("capsule radius and height must be positive (radius {radius}, height {height})")]
    BadCapsuleDimensions { radius: f32, height: f32 },
    #[error("platform colliders must be finite shapes, not planes")]
    PlatformNeedsFiniteShape,
}

/// A kinematic body characters can ride on.
#[derive(Debug)]
pub struct PlatformBody {
    pub owner: Owner,
    pub transform: Transform,
    pub prev_transform: Transform,
    pub sim_transform_slot: SlotIndex,
    pub body: RigidBodyHandle,
}

/// The backend world: rapier sets plus the object pools layered on top.
pub struct PhysicsWorld {
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    pub(crate) broad_phase: BroadPhaseBvh,
    pub(crate) narrow_phase: NarrowPhase,
    collision_pipeline: CollisionPipeline,
    islands: IslandManager,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,

    gravity: Vec3,

    capsules: Pool<CapsuleBody>,
    voxel_fields: Pool<VoxelFieldBody>,
    platforms: Pool<PlatformBody>,

    /// Backend body handle -> owning entity, for raycast hits and contacts.
    owners: HashMap<RigidBodyHandle, Owner>,
    /// Contact events queued per listening capsule, drained by the owners.
    contact_events: HashMap<CapsuleHandle, Vec<PlatformContact>>,

    ring: Arc<TransformRing>,
}

impl PhysicsWorld {
    pub fn new(ring: Arc<TransformRing>) -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            collision_pipeline: CollisionPipeline::new(),
            islands: IslandManager::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            gravity: Vec3::new(DEFAULT_GRAVITY[0], DEFAULT_GRAVITY[1], DEFAULT_GRAVITY[2]),
            capsules: Pool::new(PHYSICS_OBJECTS_MAX_CAPACITY),
            voxel_fields: Pool::new(PHYSICS_OBJECTS_MAX_CAPACITY),
            platforms: Pool::new(PHYSICS_OBJECTS_MAX_CAPACITY),
            owners: HashMap::new(),
            contact_events: HashMap::new(),
            ring,
        }
    }

    /// The single source of truth the solver treats as "down".
    #[inline]
    pub fn world_gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_world_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    #[inline]
    pub fn transform_ring(&self) -> &Arc<TransformRing> {
        &self.ring
    }

    // --- capsules -------------------------------------------------------

    /// Create a character capsule.
    ///
    /// # Panics
    /// Panics when the capsule pool or the transform pool is exhausted.
    /// The fixed capacities are a content budget; overflowing one is a
    /// design error, not a recoverable runtime condition.
    pub fn create_capsule(&mut self, desc: CapsuleDesc) -> Result<CapsuleHandle, WorldError> {
        if desc.radius <= 0.0 || desc.height <= 0.0 {
            return Err(WorldError::BadCapsuleDimensions {
                radius: desc.radius,
                height: desc.height,
            });
        }

        let pose = Iso::from_parts(Translation3::from(desc.position), Quat::identity());
        let body = RigidBodyBuilder::kinematic_position_based()
            .pose(pose)
            .ccd_enabled(desc.enable_ccd)
            .build();
        let body_handle = self.bodies.insert(body);

        // The character's own collision response is resolved by the movement
        // solver; the backend body exists for queries and contact reporting.
        let half_cyl = ((desc.height - 2.0 * desc.radius) * 0.5).max(0.0);
        let collider = ColliderBuilder::capsule_y(half_cyl, desc.radius)
            .friction(0.0)
            .collision_groups(moving_groups())
            .build();
        self.colliders
            .insert_with_parent(collider, body_handle, &mut self.bodies);

        let slot = self
            .ring
            .register_slot()
            .expect("simulation transform pool exhausted");
        self.ring.seed_slot(slot, desc.position, Quat::identity());

        self.owners.insert(body_handle, desc.owner);

        let handle = self.capsules.insert(CapsuleBody {
            owner: desc.owner,
            radius: desc.radius,
            height: desc.height,
            position: desc.position,
            prev_position: desc.position,
            sim_transform_slot: slot,
            position_changed: false,
            forward_contacts: desc.forward_contacts,
            body: body_handle,
            velocity: Vec3::zeros(),
        });
        if desc.forward_contacts {
            self.contact_events.insert(handle, Vec::new());
        }
        Ok(handle)
    }

    /// Destroy a capsule. Returns false (after logging) for stale handles.
    pub fn destroy_capsule(&mut self, handle: CapsuleHandle) -> bool {
        let Some(cap) = self.capsules.remove(handle) else {
            log::warn!("destroy_capsule: unknown capsule {handle:?}");
            return false;
        };
        self.owners.remove(&cap.body);
        self.contact_events.remove(&handle);
        self.ring.unregister_slot(cap.sim_transform_slot);
        self.bodies.remove(
            cap.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        true
    }

    #[inline]
    pub fn capsule(&self, handle: CapsuleHandle) -> Option<&CapsuleBody> {
        self.capsules.get(handle)
    }

    #[inline]
    pub fn capsule_count(&self) -> usize {
        self.capsules.len()
    }

    /// Commit a solver-resolved position and the realized per-tick velocity.
    ///
    /// The backend's contact/event machinery keeps firing with a consistent
    /// velocity even though the position was resolved by the solver.
    pub fn move_character(&mut self, handle: CapsuleHandle, position: Vec3, velocity: Vec3) {
        let Some(cap) = self.capsules.get_mut(handle) else {
            log::warn!("move_character: unknown capsule {handle:?}");
            return;
        };
        cap.position = position;
        cap.velocity = velocity;
        cap.position_changed = true;
        if let Some(body) = self.bodies.get_mut(cap.body) {
            body.set_position(
                Iso::from_parts(Translation3::from(position), Quat::identity()),
                true,
            );
            body.set_linvel(velocity, true);
        }
    }

    /// Drain the contact events collected for a capsule during the last step.
    pub fn take_contacts(&mut self, handle: CapsuleHandle) -> Vec<PlatformContact> {
        self.contact_events
            .get_mut(&handle)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    // --- static geometry ------------------------------------------------

    /// Insert immovable level geometry. The body sits at the identity pose;
    /// the def's pose is baked into the collider.
    pub fn create_static(&mut self, owner: Option<Owner>, def: &ColliderDef) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed().build();
        let body_handle = self.bodies.insert(body);
        let collider = collider_from_def(def, static_groups());
        self.colliders
            .insert_with_parent(collider, body_handle, &mut self.bodies);
        if let Some(owner) = owner {
            self.owners.insert(body_handle, owner);
        }
        body_handle
    }

    // --- platforms ------------------------------------------------------

    /// Create a kinematic platform characters can stand on and ride.
    pub fn create_platform(
        &mut self,
        owner: Owner,
        def: &ColliderDef,
    ) -> Result<PlatformHandle, WorldError> {
        let Some(shape) = def.shape.shared_shape() else {
            return Err(WorldError::PlatformNeedsFiniteShape);
        };

        let transform = Transform::new(def.translation, def.rotation);
        let body = RigidBodyBuilder::kinematic_position_based()
            .pose(transform.iso())
            .build();
        let body_handle = self.bodies.insert(body);
        let collider = ColliderBuilder::new(shape)
            .sensor(def.sensor)
            .collision_groups(moving_groups())
            .build();
        self.colliders
            .insert_with_parent(collider, body_handle, &mut self.bodies);

        let slot = self
            .ring
            .register_slot()
            .expect("simulation transform pool exhausted");
        self.ring
            .seed_slot(slot, transform.translation, transform.rotation);

        self.owners.insert(body_handle, owner);
        Ok(self.platforms.insert(PlatformBody {
            owner,
            transform,
            prev_transform: transform,
            sim_transform_slot: slot,
            body: body_handle,
        }))
    }

    /// Reposition a platform for this tick and record its velocities so
    /// riders can read them from contact events.
    pub fn move_platform(
        &mut self,
        handle: PlatformHandle,
        transform: Transform,
        linvel: Vec3,
        angvel: Vec3,
    ) {
        let Some(platform) = self.platforms.get_mut(handle) else {
            log::warn!("move_platform: unknown platform {handle:?}");
            return;
        };
        platform.transform = transform;
        if let Some(body) = self.bodies.get_mut(platform.body) {
            body.set_position(transform.iso(), true);
            body.set_linvel(linvel, true);
            body.set_angvel(angvel, true);
        }
    }

    #[inline]
    pub fn platform(&self, handle: PlatformHandle) -> Option<&PlatformBody> {
        self.platforms.get(handle)
    }

    // --- voxel fields ---------------------------------------------------

    pub fn create_voxel_field(
        &mut self,
        desc: VoxelFieldDesc,
    ) -> Result<VoxelFieldHandle, WorldError> {
        let expected = desc.size_x * desc.size_y * desc.size_z;
        if desc.voxels.len() != expected {
            return Err(WorldError::VoxelGridMismatch {
                size_x: desc.size_x,
                size_y: desc.size_y,
                size_z: desc.size_z,
                expected,
                actual: desc.voxels.len(),
            });
        }

        let builder = if desc.kinematic {
            RigidBodyBuilder::kinematic_position_based()
        } else {
            RigidBodyBuilder::fixed()
        };
        let body_handle = self.bodies.insert(builder.pose(desc.transform.iso()).build());

        let slot = self
            .ring
            .register_slot()
            .expect("simulation transform pool exhausted");
        self.ring
            .seed_slot(slot, desc.transform.translation, desc.transform.rotation);

        self.owners.insert(body_handle, desc.owner);
        let handle = self.voxel_fields.insert(VoxelFieldBody {
            owner: desc.owner,
            size_x: desc.size_x,
            size_y: desc.size_y,
            size_z: desc.size_z,
            voxels: desc.voxels,
            transform: desc.transform,
            prev_transform: desc.transform,
            sim_transform_slot: slot,
            body: body_handle,
            collider: None,
        });
        self.recook_voxel_field(handle);
        Ok(handle)
    }

    pub fn destroy_voxel_field(&mut self, handle: VoxelFieldHandle) -> bool {
        let Some(field) = self.voxel_fields.remove(handle) else {
            log::warn!("destroy_voxel_field: unknown voxel field {handle:?}");
            return false;
        };
        self.owners.remove(&field.body);
        self.ring.unregister_slot(field.sim_transform_slot);
        self.bodies.remove(
            field.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        true
    }

    #[inline]
    pub fn voxel_field(&self, handle: VoxelFieldHandle) -> Option<&VoxelFieldBody> {
        self.voxel_fields.get(handle)
    }

    /// Edit one voxel and re-cook the field's compound shape.
    pub fn set_voxel(&mut self, handle: VoxelFieldHandle, x: i32, y: i32, z: i32, value: u8) -> bool {
        let Some(field) = self.voxel_fields.get_mut(handle) else {
            log::warn!("set_voxel: unknown voxel field {handle:?}");
            return false;
        };
        if !field.set_voxel(x, y, z, value) {
            return false;
        }
        self.recook_voxel_field(handle);
        true
    }

    /// Apply a batch of grid edits under one re-cook.
    pub fn edit_voxel_field(
        &mut self,
        handle: VoxelFieldHandle,
        edit: impl FnOnce(&mut VoxelFieldBody),
    ) -> bool {
        let Some(field) = self.voxel_fields.get_mut(handle) else {
            log::warn!("edit_voxel_field: unknown voxel field {handle:?}");
            return false;
        };
        edit(field);
        let pose = field.transform.iso();
        let body = field.body;
        if let Some(b) = self.bodies.get_mut(body) {
            // Bounds edits may have shifted the grid origin.
            b.set_position(pose, true);
        }
        self.recook_voxel_field(handle);
        true
    }

    /// Reposition a kinematic voxel field for this tick.
    pub fn move_voxel_field(
        &mut self,
        handle: VoxelFieldHandle,
        transform: Transform,
        linvel: Vec3,
        angvel: Vec3,
    ) {
        let Some(field) = self.voxel_fields.get_mut(handle) else {
            log::warn!("move_voxel_field: unknown voxel field {handle:?}");
            return;
        };
        field.transform = transform;
        if let Some(body) = self.bodies.get_mut(field.body) {
            body.set_position(transform.iso(), true);
            body.set_linvel(linvel, true);
            body.set_angvel(angvel, true);
        }
    }

    /// Rebuild the compound collider from the current grid contents.
    fn recook_voxel_field(&mut self, handle: VoxelFieldHandle) {
        let (body, old_collider, parts, is_fixed) = {
            let Some(field) = self.voxel_fields.get(handle) else {
                return;
            };
            let is_fixed = self
                .bodies
                .get(field.body)
                .map(|b| b.is_fixed())
                .unwrap_or(true);
            (field.body, field.collider, field.cook_shapes(), is_fixed)
        };

        if let Some(old) = old_collider {
            self.colliders
                .remove(old, &mut self.islands, &mut self.bodies, true);
        }

        let new_collider = if parts.is_empty() {
            None
        } else {
            let groups = if is_fixed {
                static_groups()
            } else {
                moving_groups()
            };
            let collider = ColliderBuilder::new(SharedShape::compound(parts))
                .collision_groups(groups)
                .build();
            Some(
                self.colliders
                    .insert_with_parent(collider, body, &mut self.bodies),
            )
        };

        if let Some(field) = self.voxel_fields.get_mut(handle) {
            field.collider = new_collider;
        }
    }

    // --- tick plumbing --------------------------------------------------

    /// Record previous transforms for delta/velocity derivation and
    /// interpolation. Called at the start of every simulation tick, before
    /// entity callbacks run.
    pub fn begin_tick(&mut self) {
        for (_, cap) in self.capsules.iter_mut() {
            cap.prev_position = cap.position;
            cap.position_changed = false;
        }
        for (_, field) in self.voxel_fields.iter_mut() {
            field.prev_transform = field.transform;
        }
        for (_, platform) in self.platforms.iter_mut() {
            platform.prev_transform = platform.transform;
        }
    }

    /// Run backend collision detection and collect contact events.
    pub fn step(&mut self) {
        for events in self.contact_events.values_mut() {
            events.clear();
        }

        self.collision_pipeline.step(
            CONTACT_PREDICTION_DISTANCE,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &(),
            &(),
        );

        self.collect_contacts();
    }

    /// Translate narrow-phase contact pairs into [`PlatformContact`] events
    /// for every listening capsule.
    fn collect_contacts(&mut self) {
        let mut events: Vec<(CapsuleHandle, PlatformContact)> = Vec::new();

        for (handle, cap) in self.capsules.iter() {
            if !cap.forward_contacts {
                continue;
            }
            let Some(body) = self.bodies.get(cap.body) else {
                continue;
            };
            let Some(&my_collider) = body.colliders().first() else {
                continue;
            };

            for pair in self.narrow_phase.contact_pairs_with(my_collider) {
                let mine_is_first = pair.collider1 == my_collider;
                let other_collider = if mine_is_first {
                    pair.collider2
                } else {
                    pair.collider1
                };
                let Some(other_co) = self.colliders.get(other_collider) else {
                    continue;
                };
                let Some(other_body_handle) = other_co.parent() else {
                    continue;
                };
                let Some(other_body) = self.bodies.get(other_body_handle) else {
                    continue;
                };

                for manifold in &pair.manifolds {
                    let Some(point) = manifold
                        .points
                        .iter()
                        .find(|p| p.dist <= CONTACT_PREDICTION_DISTANCE)
                    else {
                        continue;
                    };

                    // Manifold normals point from the first collider to the
                    // second; we hand out the one facing the character.
                    let normal_toward_character = if mine_is_first {
                        -manifold.data.normal
                    } else {
                        manifold.data.normal
                    };
                    let local_on_other = if mine_is_first {
                        point.local_p2
                    } else {
                        point.local_p1
                    };
                    let contact_point = (other_co.position() * local_on_other).coords;

                    events.push((
                        handle,
                        PlatformContact {
                            other_body: other_body_handle,
                            other_is_static: other_body.is_fixed(),
                            other_pose: *other_body.position(),
                            other_angvel_y: other_body.angvel().y,
                            normal_toward_character,
                            contact_point,
                        },
                    ));
                }
            }
        }

        for (handle, event) in events {
            self.contact_events.entry(handle).or_default().push(event);
        }
    }

    /// Copy this tick's resulting transforms into the ring's "next" pools.
    /// Called once per tick after stepping, from the simulation thread.
    ///
    /// Every live slot is written every tick: the ring rotates through three
    /// generation pools, so a skipped write would leave a three-tick-old pose
    /// in the slot.
    pub fn publish_transforms(&self) {
        for (_, cap) in self.capsules.iter() {
            self.ring.update_position(cap.sim_transform_slot, cap.position);
        }
        for (_, field) in self.voxel_fields.iter() {
            self.ring
                .update_position(field.sim_transform_slot, field.transform.translation);
            self.ring
                .update_rotation(field.sim_transform_slot, field.transform.rotation);
        }
        for (_, platform) in self.platforms.iter() {
            self.ring
                .update_position(platform.sim_transform_slot, platform.transform.translation);
            self.ring
                .update_rotation(platform.sim_transform_slot, platform.transform.rotation);
        }
    }

    // --- lookups --------------------------------------------------------

    /// Resolve a backend body to its owning entity.
    pub fn owner_of_body(&self, body: RigidBodyHandle) -> Option<Owner> {
        self.owners.get(&body).copied()
    }

    pub(crate) fn owner_of_collider(&self, collider: ColliderHandle) -> Option<Owner> {
        let co = self.colliders.get(collider)?;
        let body = co.parent()?;
        let owner = self.owners.get(&body).copied();
        if owner.is_none() {
            log::warn!("collider {collider:?} hit but its body has no registered owner");
        }
        owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::owner::{OwnerKind, pack_owner};

    fn test_world() -> PhysicsWorld {
        PhysicsWorld::new(Arc::new(TransformRing::with_capacity(64)))
    }

    use crate::interp::TransformRing;

    fn capsule_desc(id: u64, position: Vec3) -> CapsuleDesc {
        CapsuleDesc {
            owner: pack_owner(id, OwnerKind::Character),
            position,
            radius: 0.25,
            height: 1.4,
            enable_ccd: false,
            forward_contacts: false,
        }
    }

    #[test]
    fn raycast_resolves_the_owner_of_a_hit_capsule() {
        let mut world = test_world();
        let owner = pack_owner(42, OwnerKind::Character);
        let handle = world
            .create_capsule(CapsuleDesc {
                owner,
                ..capsule_desc(42, Vec3::new(0.0, 0.7, 0.0))
            })
            .unwrap();
        world.step();

        let hit = world
            .raycast(Vec3::new(-2.0, 0.7, 0.0), Vec3::new(4.0, 0.0, 0.0))
            .expect("ray should hit the capsule");
        assert_eq!(hit.owner, Some(owner));
        assert!(hit.fraction > 0.0 && hit.fraction < 1.0);

        // After destruction the mapping is gone and nothing is hit.
        assert!(world.destroy_capsule(handle));
        world.step();
        assert!(
            world
                .raycast(Vec3::new(-2.0, 0.7, 0.0), Vec3::new(4.0, 0.0, 0.0))
                .is_none()
        );
    }

    #[test]
    fn raycast_skips_the_static_layer() {
        let mut world = test_world();
        world.create_static(
            None,
            &ColliderDef::new(
                Vec3::new(0.0, 0.0, 0.0),
                Quat::identity(),
                ShapeDef::Cuboid {
                    half_extents: Vec3::new(1.0, 1.0, 1.0),
                },
            ),
        );
        world.step();

        assert!(
            world
                .raycast(Vec3::new(-3.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0))
                .is_none()
        );
    }

    #[test]
    fn destroying_a_capsule_twice_reports_failure_once() {
        let mut world = test_world();
        let handle = world
            .create_capsule(capsule_desc(1, Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        assert!(world.destroy_capsule(handle));
        assert!(!world.destroy_capsule(handle));
    }

    #[test]
    fn capsule_creation_rejects_bad_dimensions() {
        let mut world = test_world();
        let result = world.create_capsule(CapsuleDesc {
            radius: -1.0,
            ..capsule_desc(1, Vec3::zeros())
        });
        assert!(matches!(
            result,
            Err(WorldError::BadCapsuleDimensions { .. })
        ));
    }

    #[test]
    fn segment_cast_collects_every_crossed_capsule() {
        let mut world = test_world();
        let a = pack_owner(1, OwnerKind::Character);
        let b = pack_owner(2, OwnerKind::Character);
        world
            .create_capsule(CapsuleDesc {
                owner: a,
                ..capsule_desc(1, Vec3::new(0.0, 0.7, 0.0))
            })
            .unwrap();
        world
            .create_capsule(CapsuleDesc {
                owner: b,
                ..capsule_desc(2, Vec3::new(2.0, 0.7, 0.0))
            })
            .unwrap();
        world.step();

        let all = world.segment_cast(Vec3::new(-2.0, 0.7, 0.0), Vec3::new(4.0, 0.7, 0.0), true);
        assert_eq!(all.len(), 2);
        assert!(all.contains(&a) && all.contains(&b));

        let first = world.segment_cast(Vec3::new(-2.0, 0.7, 0.0), Vec3::new(4.0, 0.7, 0.0), false);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn capsule_overlap_ignores_the_querying_body() {
        let mut world = test_world();
        let me = world
            .create_capsule(capsule_desc(1, Vec3::new(0.0, 0.7, 0.0)))
            .unwrap();
        let other_owner = pack_owner(2, OwnerKind::Character);
        world
            .create_capsule(CapsuleDesc {
                owner: other_owner,
                ..capsule_desc(2, Vec3::new(0.3, 0.7, 0.0))
            })
            .unwrap();
        world.step();

        let my_body = world.capsule(me).unwrap().body;
        let overlaps =
            world.capsule_overlaps(Vec3::new(0.0, 0.7, 0.0), 0.25, 1.4, my_body);
        assert_eq!(overlaps, vec![other_owner]);
    }

    #[test]
    fn voxel_grid_dimension_mismatch_is_rejected() {
        let mut world = test_world();
        let result = world.create_voxel_field(VoxelFieldDesc {
            owner: pack_owner(1, OwnerKind::VoxelField),
            size_x: 2,
            size_y: 2,
            size_z: 2,
            voxels: vec![0; 7],
            transform: Transform::identity(),
            kinematic: false,
        });
        assert!(matches!(result, Err(WorldError::VoxelGridMismatch { .. })));
    }

    #[test]
    fn snapshot_export_writes_a_file() {
        let mut world = test_world();
        world
            .create_capsule(capsule_desc(1, Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();

        let path = std::env::temp_dir().join("simphys_snapshot_test.bin");
        world.export_snapshot(&path).expect("snapshot export");
        let len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        std::fs::remove_file(&path).ok();
        assert!(len > 0);
    }
}
