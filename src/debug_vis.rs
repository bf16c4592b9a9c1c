//! Debug visualization line buffer.
//!
//! Solver internals append world-space line segments (cast results, realized
//! velocities, ground probes) while the render side drains a copy for
//! drawing. Both sides may touch the buffer from different threads, so it is
//! guarded by a plain mutex; this is a debug-only facility and deliberately
//! not on the performance-critical path.

use parking_lot::Mutex;

use crate::types::Vec3;

/// Category of a debug line, used for color-coding by the drawing side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugVisLineKind {
    /// A shape-cast contact (hit point plus surface normal).
    CastHit,
    /// A realized per-tick velocity.
    Velocity,
    /// A downward ground/stick probe.
    GroundProbe,
    /// The up/forward/down stair probe.
    StairProbe,
}

#[derive(Clone, Copy, Debug)]
pub struct DebugVisLine {
    pub p1: Vec3,
    pub p2: Vec3,
    pub kind: DebugVisLineKind,
}

/// Mutex-guarded line list, cleared once per simulation tick.
#[derive(Default)]
pub struct DebugVisBuffer {
    lines: Mutex<Vec<DebugVisLine>>,
}

impl DebugVisBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, p1: Vec3, p2: Vec3, kind: DebugVisLineKind) {
        self.lines.lock().push(DebugVisLine { p1, p2, kind });
    }

    /// Drop all lines. Called at the start of each simulation tick.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    /// Copy the current lines so the caller's locking time is minimal.
    pub fn snapshot(&self) -> Vec<DebugVisLine> {
        self.lines.lock().clone()
    }
}
