/*!
Triple-buffered simulation-transform storage.

The simulation thread writes new poses at a fixed tick rate while the render
thread reads smoothly interpolated poses at its own rate, without a lock on
the hot path.

# Ring discipline

Three pools of position/rotation pairs form a ring addressed by a single
monotonically incrementing atomic counter. With `offset` the counter value:

- `offset % 3` is the "previous" pool (stable, readable),
- `(offset + 1) % 3` is the "current" pool (stable, readable),
- `(offset + 2) % 3` is the "next" pool (written exclusively by the
  simulation thread).

[`TransformRing::advance`] increments the counter once per simulation tick,
*before* that tick writes any new data. Readers therefore always see a fully
formed previous/current pair from two consecutive tick generations; the pool
being written never overlaps with a pool being read. This counter is the only
cross-thread synchronization on the hot path. A fourth pool holds the render
thread's interpolated result.

Slot registration goes through a mutex-guarded sorted index list. The
simulation thread owns registration in the steady state; external (e.g.
editor) threads may register/unregister concurrently because the registry
mutex serializes them.
*/

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::constants::SIM_TRANSFORM_POOL_CAPACITY;
use crate::types::{Quat, Vec3};

/// A position + rotation pair as stored in the interpolation pools.
#[derive(Clone, Copy, Debug)]
pub struct SimTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl SimTransform {
    #[inline]
    fn identity() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

/// Index of a registered transform slot.
pub type SlotIndex = u32;

/// One fixed-capacity pool of transforms with interior mutability.
struct TransformPool(Box<[UnsafeCell<SimTransform>]>);

// SAFETY: cells are written only through the pool currently in the ring's
// "next" phase (simulation thread) or for a slot that is not registered yet
// (registration, under the registry mutex). All other access is read-only and
// goes through the "previous"/"current" phase pools. Phase membership is
// decided by the atomic ring offset, so a cell is never written and read
// concurrently while the ring discipline in the module docs holds.
unsafe impl Sync for TransformPool {}

impl TransformPool {
    fn new(capacity: usize) -> Self {
        let cells = (0..capacity)
            .map(|_| UnsafeCell::new(SimTransform::identity()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self(cells)
    }

    /// SAFETY: caller must hold the write phase for this pool (or own the
    /// unregistered slot) per the ring discipline.
    #[inline]
    unsafe fn write(&self, index: SlotIndex, value: SimTransform) {
        unsafe { *self.0[index as usize].get() = value }
    }

    /// SAFETY: caller must hold a read phase for this pool per the ring
    /// discipline.
    #[inline]
    unsafe fn read(&self, index: SlotIndex) -> SimTransform {
        unsafe { *self.0[index as usize].get() }
    }
}

/// Triple-buffered transform ring plus the interpolated-result pool.
pub struct TransformRing {
    /// The ring phase counter. Incremented only by [`TransformRing::advance`].
    offset: AtomicU64,
    /// The three write-generation pools.
    generations: [TransformPool; 3],
    /// Interpolated results, written and read by the render thread only.
    interpolated: TransformPool,
    /// Sorted list of in-use slot indices.
    registered: Mutex<Vec<SlotIndex>>,
}

impl TransformRing {
    pub fn new() -> Self {
        Self::with_capacity(SIM_TRANSFORM_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            offset: AtomicU64::new(0),
            generations: [
                TransformPool::new(capacity),
                TransformPool::new(capacity),
                TransformPool::new(capacity),
            ],
            interpolated: TransformPool::new(capacity),
            registered: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.generations[0].0.len()
    }

    #[inline]
    fn pool_index(&self, phase: u64) -> usize {
        ((self.offset.load(Ordering::Acquire) + phase) % 3) as usize
    }

    /// Claim the lowest free slot, zero-initializing it in all pools.
    ///
    /// Returns `None` (after logging an error) if the pool is full.
    pub fn register_slot(&self) -> Option<SlotIndex> {
        let mut registered = self.registered.lock();

        // The list is sorted, so the first index that doesn't match its
        // position in the list is free.
        let mut free = registered.len() as SlotIndex;
        let mut insert_at = registered.len();
        for (i, &idx) in registered.iter().enumerate() {
            if idx != i as SlotIndex {
                free = i as SlotIndex;
                insert_at = i;
                break;
            }
        }

        if free as usize >= self.capacity() {
            log::error!(
                "simulation transform pool is full ({} slots)",
                self.capacity()
            );
            return None;
        }

        // SAFETY: the slot is not registered, so no reader interpolates it
        // and no writer targets it; the registry mutex serializes
        // registration itself.
        unsafe {
            for pool in &self.generations {
                pool.write(free, SimTransform::identity());
            }
            self.interpolated.write(free, SimTransform::identity());
        }

        registered.insert(insert_at, free);
        Some(free)
    }

    /// Overwrite a slot in every pool with the given transform.
    ///
    /// Intended for seeding a freshly registered slot with its body's spawn
    /// pose so the first interpolations don't blend from the origin. Must be
    /// called before the slot is ever read, i.e. immediately after
    /// [`TransformRing::register_slot`].
    pub fn seed_slot(&self, index: SlotIndex, position: Vec3, rotation: Quat) {
        let value = SimTransform { position, rotation };
        // SAFETY: by contract the slot has not been published to any reader
        // yet, so no concurrent access exists; same situation as the
        // zero-initialization inside `register_slot`.
        unsafe {
            for pool in &self.generations {
                pool.write(index, value);
            }
            self.interpolated.write(index, value);
        }
    }

    /// Release a slot. Unknown indices log a warning and are ignored.
    pub fn unregister_slot(&self, index: SlotIndex) {
        let mut registered = self.registered.lock();
        match registered.binary_search(&index) {
            Ok(pos) => {
                registered.remove(pos);
            }
            Err(_) => {
                log::warn!("unregistering transform slot {index} that is not registered");
            }
        }
    }

    /// Number of currently registered slots.
    pub fn registered_count(&self) -> usize {
        self.registered.lock().len()
    }

    /// Write a position into the "next" pool slot.
    ///
    /// Must only be called from the simulation thread, between two
    /// [`TransformRing::advance`] calls.
    #[inline]
    pub fn update_position(&self, index: SlotIndex, position: Vec3) {
        let next = self.pool_index(2);
        // SAFETY: "next" is written exclusively by the simulation thread and
        // never read until the ring advances past it.
        unsafe {
            let mut t = self.generations[next].read(index);
            t.position = position;
            self.generations[next].write(index, t);
        }
    }

    /// Write a rotation into the "next" pool slot. Same contract as
    /// [`TransformRing::update_position`].
    #[inline]
    pub fn update_rotation(&self, index: SlotIndex, rotation: Quat) {
        let next = self.pool_index(2);
        // SAFETY: see `update_position`.
        unsafe {
            let mut t = self.generations[next].read(index);
            t.rotation = rotation;
            self.generations[next].write(index, t);
        }
    }

    /// Rotate the ring by one generation.
    ///
    /// Called exactly once per simulation tick, before that tick writes new
    /// data. This is the only mutation that changes which pool is
    /// "current"/"next".
    #[inline]
    pub fn advance(&self) {
        self.offset.fetch_add(1, Ordering::AcqRel);
    }

    /// Recompute the interpolated pool from the previous/current pair.
    ///
    /// `alpha` is the tick-phase blend factor; values outside `[0, 1]` are
    /// clamped (wall-clock drift past a tick boundary saturates at the
    /// "current" pose rather than reading the in-flight "next" pool).
    ///
    /// Called from the render thread.
    pub fn recalc_interpolated(&self, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        // One offset load for both phases, so previous/current always come
        // from two consecutive generations even if the ring advances while
        // this runs.
        let offset = self.offset.load(Ordering::Acquire);
        let prev = (offset % 3) as usize;
        let curr = ((offset + 1) % 3) as usize;

        let registered = self.registered.lock();
        for &index in registered.iter() {
            // SAFETY: "previous" and "current" are read-only phases for this
            // thread; the interpolated pool is owned by the render thread.
            unsafe {
                let a = self.generations[prev].read(index);
                let b = self.generations[curr].read(index);
                let blended = SimTransform {
                    position: a.position.lerp(&b.position, alpha),
                    rotation: a.rotation.nlerp(&b.rotation, alpha),
                };
                self.interpolated.write(index, blended);
            }
        }
    }

    /// Interpolated position for render-thread consumption.
    #[inline]
    pub fn interpolated_position(&self, index: SlotIndex) -> Vec3 {
        // SAFETY: the interpolated pool is only touched by the render thread.
        unsafe { self.interpolated.read(index).position }
    }

    /// Interpolated rotation for render-thread consumption.
    #[inline]
    pub fn interpolated_rotation(&self, index: SlotIndex) -> Quat {
        // SAFETY: see `interpolated_position`.
        unsafe { self.interpolated.read(index).rotation }
    }

    /// Latest fully-written position (the "current" pool).
    ///
    /// For simulation-thread-synchronous reads; the render thread should use
    /// the interpolated accessors instead.
    #[inline]
    pub fn current_position(&self, index: SlotIndex) -> Vec3 {
        let curr = self.pool_index(1);
        // SAFETY: "current" is a stable read phase.
        unsafe { self.generations[curr].read(index).position }
    }

    /// Latest fully-written rotation (the "current" pool).
    #[inline]
    pub fn current_rotation(&self, index: SlotIndex) -> Quat {
        let curr = self.pool_index(1);
        // SAFETY: "current" is a stable read phase.
        unsafe { self.generations[curr].read(index).rotation }
    }
}

impl Default for TransformRing {
    fn default() -> Self {
        Self::new()
    }
}
