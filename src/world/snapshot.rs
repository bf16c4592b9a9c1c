//! Offline debugging snapshot of the backend physics world.
//!
//! Serializes the body and collider sets to a binary file so a stuck
//! simulation state can be inspected out of process. This hook is not part
//! of the runtime contract; nothing in the engine reads snapshots back.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use super::PhysicsWorld;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode world snapshot: {0}")]
    Encode(#[from] bincode::Error),
    #[error("failed to write world snapshot: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct WorldSnapshot<'a> {
    gravity: [f32; 3],
    bodies: &'a rapier3d::prelude::RigidBodySet,
    colliders: &'a rapier3d::prelude::ColliderSet,
}

impl PhysicsWorld {
    /// Serialize the current backend state to `path`.
    pub fn export_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let gravity = self.world_gravity();
        let snapshot = WorldSnapshot {
            gravity: [gravity.x, gravity.y, gravity.z],
            bodies: &self.bodies,
            colliders: &self.colliders,
        };
        let bytes = bincode::serialize(&snapshot)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
