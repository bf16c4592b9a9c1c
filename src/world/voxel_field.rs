//! Voxel fields: static/kinematic collision volumes authored as a dense 3D
//! grid of typed voxels.
//!
//! Voxel types: 0 = empty, 1 = solid unit box, 2..=5 = wedge ramps rising
//! toward +X / -X / +Z / -Z respectively. The grid is cooked into a backend
//! compound shape: contiguous solid voxels are greedily merged into cuboids
//! (runs along X, widened over Z, then stacked over Y) and each wedge voxel
//! contributes one convex prism.
//!
//! Grid layout matches `index = x * size_y * size_z + y * size_z + z`; voxel
//! `(x, y, z)` occupies the local-space unit cube `[x, x+1) x [y, y+1) x
//! [z, z+1)`.

use nalgebra::Point3;
use rapier3d::prelude::{ColliderHandle, Isometry, RigidBodyHandle, SharedShape};

use crate::interp::SlotIndex;
use crate::owner::Owner;
use crate::types::{Transform, Vec3};

/// Voxel type for a solid unit cube.
pub const VOXEL_SOLID: u8 = 1;
/// First wedge voxel type; see module docs for the orientation table.
pub const VOXEL_WEDGE_FIRST: u8 = 2;
/// Last wedge voxel type.
pub const VOXEL_WEDGE_LAST: u8 = 5;

/// Creation parameters for a voxel field.
#[derive(Clone, Debug)]
pub struct VoxelFieldDesc {
    pub owner: Owner,
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    /// Flattened voxel-type array; length must equal
    /// `size_x * size_y * size_z`.
    pub voxels: Vec<u8>,
    /// Initial world transform of the grid origin.
    pub transform: Transform,
    /// Kinematic fields can move and carry riders; fixed fields cannot.
    pub kinematic: bool,
}

/// A voxel collision volume and its backend body.
#[derive(Debug)]
pub struct VoxelFieldBody {
    pub owner: Owner,
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub(crate) voxels: Vec<u8>,
    /// Current world transform of the grid origin.
    pub transform: Transform,
    /// Transform at the start of the current tick.
    pub prev_transform: Transform,
    pub sim_transform_slot: SlotIndex,
    pub body: RigidBodyHandle,
    pub(crate) collider: Option<ColliderHandle>,
}

impl VoxelFieldBody {
    #[inline]
    fn flat_index(&self, x: usize, y: usize, z: usize) -> usize {
        x * self.size_y * self.size_z + y * self.size_z + z
    }

    /// Voxel type at a grid position; out-of-bounds reads are empty.
    pub fn voxel_at(&self, x: i32, y: i32, z: i32) -> u8 {
        if x < 0
            || y < 0
            || z < 0
            || x as usize >= self.size_x
            || y as usize >= self.size_y
            || z as usize >= self.size_z
        {
            return 0;
        }
        self.voxels[self.flat_index(x as usize, y as usize, z as usize)]
    }

    /// Write a voxel type; returns false (and does nothing) out of bounds.
    /// The caller is responsible for re-cooking the backend shape.
    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, value: u8) -> bool {
        if x < 0
            || y < 0
            || z < 0
            || x as usize >= self.size_x
            || y as usize >= self.size_y
            || z as usize >= self.size_z
        {
            return false;
        }
        let idx = self.flat_index(x as usize, y as usize, z as usize);
        self.voxels[idx] = value;
        true
    }

    /// Grow the grid so `bounds_min..=bounds_max` (grid coordinates, possibly
    /// negative) fit, shifting existing content and offsetting the world
    /// transform so occupied voxels keep their world positions.
    ///
    /// Returns the grid-space offset applied to existing voxel coordinates.
    pub fn expand_bounds(&mut self, bounds_min: [i32; 3], bounds_max: [i32; 3]) -> [i32; 3] {
        let offset = [
            (-bounds_min[0]).max(0),
            (-bounds_min[1]).max(0),
            (-bounds_min[2]).max(0),
        ];
        let new_size = [
            (self.size_x as i32).max(bounds_max[0] + 1) + offset[0],
            (self.size_y as i32).max(bounds_max[1] + 1) + offset[1],
            (self.size_z as i32).max(bounds_max[2] + 1) + offset[2],
        ];
        self.regrid(new_size, offset);
        offset
    }

    /// Trim the grid to the bounding box of its occupied voxels, offsetting
    /// the world transform to compensate. Empties become a 0-sized grid.
    ///
    /// Returns the grid-space offset applied to existing voxel coordinates.
    pub fn shrink_to_fit(&mut self) -> [i32; 3] {
        let mut min = [self.size_x as i32, self.size_y as i32, self.size_z as i32];
        let mut max = [-1, -1, -1];
        for x in 0..self.size_x as i32 {
            for y in 0..self.size_y as i32 {
                for z in 0..self.size_z as i32 {
                    if self.voxel_at(x, y, z) != 0 {
                        min = [min[0].min(x), min[1].min(y), min[2].min(z)];
                        max = [max[0].max(x), max[1].max(y), max[2].max(z)];
                    }
                }
            }
        }
        if max[0] < min[0] {
            // Nothing occupied.
            self.regrid([0, 0, 0], [0, 0, 0]);
            return [0, 0, 0];
        }
        let offset = [-min[0], -min[1], -min[2]];
        let new_size = [
            max[0] - min[0] + 1,
            max[1] - min[1] + 1,
            max[2] - min[2] + 1,
        ];
        self.regrid(new_size, offset);
        offset
    }

    fn regrid(&mut self, new_size: [i32; 3], offset: [i32; 3]) {
        let (nx, ny, nz) = (
            new_size[0].max(0) as usize,
            new_size[1].max(0) as usize,
            new_size[2].max(0) as usize,
        );
        let mut new_voxels = vec![0u8; nx * ny * nz];

        for x in 0..self.size_x as i32 {
            for y in 0..self.size_y as i32 {
                for z in 0..self.size_z as i32 {
                    let v = self.voxel_at(x, y, z);
                    if v == 0 {
                        continue;
                    }
                    let (tx, ty, tz) = (x + offset[0], y + offset[1], z + offset[2]);
                    if tx < 0
                        || ty < 0
                        || tz < 0
                        || tx as usize >= nx
                        || ty as usize >= ny
                        || tz as usize >= nz
                    {
                        continue;
                    }
                    new_voxels[tx as usize * ny * nz + ty as usize * nz + tz as usize] = v;
                }
            }
        }

        self.voxels = new_voxels;
        self.size_x = nx;
        self.size_y = ny;
        self.size_z = nz;

        // Shift the grid origin the other way so world positions hold.
        let world_shift = self.transform.rotation
            * Vec3::new(-offset[0] as f32, -offset[1] as f32, -offset[2] as f32);
        self.transform.translation += world_shift;
    }

    /// Cook the grid into compound-shape parts (local grid space).
    pub fn cook_shapes(&self) -> Vec<(Isometry<f32>, SharedShape)> {
        let (sx, sy, sz) = (self.size_x, self.size_y, self.size_z);
        let mut parts = Vec::new();
        if sx == 0 || sy == 0 || sz == 0 {
            return parts;
        }

        let mut merged = vec![false; self.voxels.len()];

        for y in 0..sy {
            for z in 0..sz {
                for x in 0..sx {
                    let idx = self.flat_index(x, y, z);
                    if merged[idx] {
                        continue;
                    }
                    match self.voxels[idx] {
                        0 => {}
                        VOXEL_SOLID => {
                            let run = self.merge_solid_run(x, y, z, &mut merged);
                            parts.push(cuboid_part(
                                [x, y, z],
                                [run.0, run.1, run.2],
                            ));
                        }
                        v @ VOXEL_WEDGE_FIRST..=VOXEL_WEDGE_LAST => {
                            merged[idx] = true;
                            if let Some(part) = wedge_part([x, y, z], v) {
                                parts.push(part);
                            } else {
                                log::warn!("wedge voxel ({x}, {y}, {z}) failed to cook");
                            }
                        }
                        v => {
                            merged[idx] = true;
                            log::warn!("unknown voxel type {v} at ({x}, {y}, {z}); skipped");
                        }
                    }
                }
            }
        }

        parts
    }

    /// Greedily grow a solid box from `(x, y, z)`: run along X, widen over Z,
    /// stack over Y. Marks consumed voxels and returns the box extent.
    fn merge_solid_run(
        &self,
        x: usize,
        y: usize,
        z: usize,
        merged: &mut [bool],
    ) -> (usize, usize, usize) {
        let solid_unmerged = |s: &Self, x: usize, y: usize, z: usize, merged: &[bool]| {
            s.voxels[s.flat_index(x, y, z)] == VOXEL_SOLID && !merged[s.flat_index(x, y, z)]
        };

        let mut len_x = 1;
        while x + len_x < self.size_x && solid_unmerged(self, x + len_x, y, z, merged) {
            len_x += 1;
        }

        let mut len_z = 1;
        'widen: while z + len_z < self.size_z {
            for dx in 0..len_x {
                if !solid_unmerged(self, x + dx, y, z + len_z, merged) {
                    break 'widen;
                }
            }
            len_z += 1;
        }

        let mut len_y = 1;
        'stack: while y + len_y < self.size_y {
            for dx in 0..len_x {
                for dz in 0..len_z {
                    if !solid_unmerged(self, x + dx, y + len_y, z + dz, merged) {
                        break 'stack;
                    }
                }
            }
            len_y += 1;
        }

        for dy in 0..len_y {
            for dz in 0..len_z {
                for dx in 0..len_x {
                    merged[self.flat_index(x + dx, y + dy, z + dz)] = true;
                }
            }
        }

        (len_x, len_y, len_z)
    }
}

fn cuboid_part(origin: [usize; 3], extent: [usize; 3]) -> (Isometry<f32>, SharedShape) {
    let half = Vec3::new(
        extent[0] as f32 * 0.5,
        extent[1] as f32 * 0.5,
        extent[2] as f32 * 0.5,
    );
    let center = Vec3::new(origin[0] as f32, origin[1] as f32, origin[2] as f32) + half;
    (
        Isometry::translation(center.x, center.y, center.z),
        SharedShape::cuboid(half.x, half.y, half.z),
    )
}

/// Convex prism for a wedge voxel, in grid-local space.
fn wedge_part(origin: [usize; 3], voxel_type: u8) -> Option<(Isometry<f32>, SharedShape)> {
    let (ox, oy, oz) = (origin[0] as f32, origin[1] as f32, origin[2] as f32);

    // Unit-cube corner heights: the ramp's high edge depends on orientation.
    // Points are (x, y, z) within [0, 1].
    let corners: [[f32; 3]; 6] = match voxel_type {
        // Rising toward +X: full height at x = 1.
        2 => [
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [1.0, 1.0, 1.0],
        ],
        // Rising toward -X: full height at x = 0.
        3 => [
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
        ],
        // Rising toward +Z: full height at z = 1.
        4 => [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ],
        // Rising toward -Z: full height at z = 0.
        5 => [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ],
        _ => return None,
    };

    let points: Vec<Point3<f32>> = corners
        .iter()
        .map(|c| Point3::new(ox + c[0], oy + c[1], oz + c[2]))
        .collect();

    SharedShape::convex_hull(&points).map(|shape| (Isometry::identity(), shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::{OwnerKind, pack_owner};

    fn field(size: [usize; 3], voxels: Vec<u8>) -> VoxelFieldBody {
        VoxelFieldBody {
            owner: pack_owner(1, OwnerKind::VoxelField),
            size_x: size[0],
            size_y: size[1],
            size_z: size[2],
            voxels,
            transform: Transform::identity(),
            prev_transform: Transform::identity(),
            sim_transform_slot: 0,
            body: RigidBodyHandle::invalid(),
            collider: None,
        }
    }

    #[test]
    fn fully_solid_slab_cooks_into_one_cuboid() {
        let f = field([4, 1, 4], vec![VOXEL_SOLID; 16]);
        let parts = f.cook_shapes();
        assert_eq!(parts.len(), 1);

        // The merged box must cover the whole slab.
        let (iso, shape) = &parts[0];
        let cuboid = shape.as_cuboid().expect("merged part is a cuboid");
        assert_eq!(cuboid.half_extents, Vec3::new(2.0, 0.5, 2.0));
        assert_eq!(iso.translation.vector, Vec3::new(2.0, 0.5, 2.0));
    }

    #[test]
    fn disjoint_voxels_cook_separately() {
        let mut voxels = vec![0u8; 27];
        voxels[0] = VOXEL_SOLID; // (0,0,0)
        voxels[2 * 9 + 2 * 3 + 2] = VOXEL_SOLID; // (2,2,2)
        let f = field([3, 3, 3], voxels);
        assert_eq!(f.cook_shapes().len(), 2);
    }

    #[test]
    fn wedge_voxels_cook_into_convex_parts() {
        let f = field([1, 1, 1], vec![2]);
        let parts = f.cook_shapes();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].1.as_convex_polyhedron().is_some());
    }

    #[test]
    fn greedy_merge_beats_per_voxel_colliders() {
        // An 8x2x8 solid block: 128 voxels, but only one merged cuboid.
        let f = field([8, 2, 8], vec![VOXEL_SOLID; 128]);
        assert_eq!(f.cook_shapes().len(), 1);
    }

    #[test]
    fn voxel_accessors_are_bounds_checked() {
        let mut f = field([2, 2, 2], vec![0; 8]);
        assert!(f.set_voxel(1, 1, 1, VOXEL_SOLID));
        assert!(!f.set_voxel(2, 0, 0, VOXEL_SOLID));
        assert_eq!(f.voxel_at(1, 1, 1), VOXEL_SOLID);
        assert_eq!(f.voxel_at(-1, 0, 0), 0);
        assert_eq!(f.voxel_at(0, 5, 0), 0);
    }

    #[test]
    fn shrink_preserves_world_positions_of_occupied_voxels() {
        // Single solid voxel at (2, 1, 3) in a padded 5x4x6 grid.
        let mut f = field([5, 4, 6], vec![0; 120]);
        f.set_voxel(2, 1, 3, VOXEL_SOLID);

        // World position of that voxel's min corner before shrinking.
        let world_before = f.transform.translation + Vec3::new(2.0, 1.0, 3.0);

        let offset = f.shrink_to_fit();
        assert_eq!(offset, [-2, -1, -3]);
        assert_eq!((f.size_x, f.size_y, f.size_z), (1, 1, 1));
        assert_eq!(f.voxel_at(0, 0, 0), VOXEL_SOLID);

        let world_after = f.transform.translation + Vec3::new(0.0, 0.0, 0.0);
        assert!((world_after - world_before).norm() < 1.0e-6);
    }

    #[test]
    fn expand_shifts_existing_content() {
        let mut f = field([1, 1, 1], vec![VOXEL_SOLID]);
        let offset = f.expand_bounds([-1, 0, -2], [1, 0, 0]);
        assert_eq!(offset, [1, 0, 2]);
        assert_eq!((f.size_x, f.size_y, f.size_z), (3, 1, 3));
        assert_eq!(f.voxel_at(1, 0, 2), VOXEL_SOLID);
        // Grid origin moved so the voxel stays put in world space.
        assert_eq!(f.transform.translation, Vec3::new(-1.0, 0.0, -2.0));
    }
}
