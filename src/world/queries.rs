//! Scene queries: the shape casts and ray casts the movement solver and
//! gameplay code run against the backend world.

use nalgebra::Point3;
use rapier3d::na::Translation3;
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::parry::shape as pshape;
use rapier3d::prelude::*;

use crate::collision::settings::DIST_EPS;
use crate::collision::types::MoveHit;
use crate::owner::Owner;
use crate::types::{Iso, Quat, Vec3};

use super::{GROUP_MOVING, PhysicsWorld};

/// Result of a ray cast restricted to the moving layer.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// Owning entity of the hit body, if the body has a registered owner.
    pub owner: Option<Owner>,
    /// Fraction (0..1) along the cast direction-and-magnitude.
    pub fraction: f32,
    /// World-space surface normal at the hit.
    pub normal: Vec3,
}

impl PhysicsWorld {
    #[inline]
    pub(crate) fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    /// Cast a cylinder matching a capsule's collision envelope along
    /// `dir_and_mag`, returning the closest blocking hit.
    ///
    /// The caller subtracts its skin width from `radius` so the cast shape
    /// is the envelope minus the margin. The character's own body and all
    /// sensor colliders are ignored.
    pub fn cylinder_cast(
        &self,
        origin: Vec3,
        radius: f32,
        height: f32,
        ignore_body: RigidBodyHandle,
        dir_and_mag: Vec3,
    ) -> Option<MoveHit> {
        let len = dir_and_mag.norm();
        if len <= DIST_EPS || radius <= 0.0 || height <= 0.0 {
            return None;
        }

        let shape = pshape::Cylinder::new(height * 0.5, radius);
        let pose = Iso::from_parts(Translation3::from(origin), Quat::identity());

        let filter = QueryFilter::from(QueryFilterFlags::EXCLUDE_SENSORS)
            .exclude_rigid_body(ignore_body);
        let pipeline = self.query_pipeline(filter);

        let mut options = ShapeCastOptions::with_max_time_of_impact(1.0);
        options.stop_at_penetration = true;

        let (_, hit) = pipeline.cast_shape(&pose, &dir_and_mag, &shape, options)?;

        // `normal1` is the outward normal on the cast shape, whose frame has
        // identity rotation (local equals world). Negating it yields the
        // obstacle's surface normal, which is what slope classification
        // needs: up for floors, down for ceilings, sideways for walls.
        let normal: Vec3 = -hit.normal1.into_inner();

        // The witness point is local to the cast shape, whose frame has
        // identity rotation; translate it to the impact configuration.
        let contact = origin + dir_and_mag * hit.time_of_impact + hit.witness1.coords;

        Some(MoveHit {
            normal,
            fraction: hit.time_of_impact,
            contact,
        })
    }

    /// Thin ray cast restricted to the moving collision layer, resolving the
    /// hit body to its owner. A hit body without a registered owner logs a
    /// warning and reports `owner: None`.
    pub fn raycast(&self, origin: Vec3, dir_and_mag: Vec3) -> Option<RayHit> {
        if dir_and_mag.norm_squared() <= DIST_EPS * DIST_EPS {
            return None;
        }

        let filter = QueryFilter::from(QueryFilterFlags::EXCLUDE_SENSORS)
            .groups(InteractionGroups::new(Group::ALL, GROUP_MOVING, InteractionTestMode::And));
        let pipeline = self.query_pipeline(filter);

        let ray = Ray::new(Point3::from(origin), dir_and_mag);
        let (collider, intersection) = pipeline.cast_ray_and_get_normal(&ray, 1.0, true)?;

        Some(RayHit {
            owner: self.owner_of_collider(collider),
            fraction: intersection.time_of_impact,
            normal: intersection.normal,
        })
    }

    /// Collect the owners of every moving-layer body a segment passes
    /// through. With `all = false`, stops at the first owner found.
    pub fn segment_cast(&self, p1: Vec3, p2: Vec3, all: bool) -> Vec<Owner> {
        let segment = pshape::Segment::new(Point3::from(p1), Point3::from(p2));

        let filter = QueryFilter::from(QueryFilterFlags::EXCLUDE_SENSORS)
            .groups(InteractionGroups::new(Group::ALL, GROUP_MOVING, InteractionTestMode::And));
        let pipeline = self.query_pipeline(filter);

        let mut owners = Vec::new();
        for (collider, _) in pipeline.intersect_shape(Iso::identity(), &segment) {
            if let Some(owner) = self.owner_of_collider(collider) {
                owners.push(owner);
                if !all {
                    break;
                }
            }
        }
        owners
    }

    /// Collect the owners of every moving-layer body overlapping a capsule
    /// volume. The `ignore_body` (typically the querying character) is
    /// skipped.
    pub fn capsule_overlaps(
        &self,
        position: Vec3,
        radius: f32,
        height: f32,
        ignore_body: RigidBodyHandle,
    ) -> Vec<Owner> {
        let half_cyl = ((height - 2.0 * radius) * 0.5).max(0.0);
        let capsule = pshape::Capsule::new_y(half_cyl, radius);
        let pose = Iso::from_parts(Translation3::from(position), Quat::identity());

        let filter = QueryFilter::from(QueryFilterFlags::EXCLUDE_SENSORS)
            .exclude_rigid_body(ignore_body)
            .groups(InteractionGroups::new(Group::ALL, GROUP_MOVING, InteractionTestMode::And));
        let pipeline = self.query_pipeline(filter);

        let mut owners = Vec::new();
        for (collider, _) in pipeline.intersect_shape(pose, &capsule) {
            if let Some(owner) = self.owner_of_collider(collider) {
                owners.push(owner);
            }
        }
        owners
    }
}
