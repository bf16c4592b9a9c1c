/*!
The fixed-timestep simulation loop.

A dedicated thread ticks at a constant 40 Hz, wall-clock paced and
independent of the render framerate. Each tick advances the transform ring,
samples input, runs every registered entity's simulation callback with the
fixed delta, steps the physics backend, and publishes resulting transforms
for interpolation.

A global timescale stretches the *real* time waited between ticks (never
the simulated delta), so slow-motion and hit-stop effects cannot destabilize
the fixed-step math. If a tick overruns its scaled budget the loop logs a
warning and starts the next tick immediately; there is no catch-up or
frame skipping, ticks simply run late.

[`SimShared`] carries the cross-cutting mutable state (timescale, pause
flag, tick stamp, ring and debug-vis handles) that the render thread and
gameplay code reach from outside the loop.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::constants::{SIM_TICK_DELTA, SIM_TICK_PERIOD};
use crate::debug_vis::DebugVisBuffer;
use crate::interp::TransformRing;
use crate::world::PhysicsWorld;

/// Lowest allowed timescale; keeps the scaled tick budget finite.
const MIN_TIMESCALE: f32 = 0.01;

/// A simulated entity's per-tick callback.
///
/// Invoked once per simulation tick with the fixed delta, on the simulation
/// thread. Characters populate their movement input and run the
/// collide-and-slide solver from here.
pub trait Simulate: Send {
    fn simulate(&mut self, ctx: &mut TickContext<'_>);
}

/// Everything an entity callback may touch during one tick.
///
/// Only constructible inside the tick sequence, which makes simulation-thread
/// affinity explicit: operations requiring the simulation thread take
/// `&mut TickContext` instead of being callable from anywhere.
pub struct TickContext<'a> {
    pub world: &'a mut PhysicsWorld,
    pub ring: &'a TransformRing,
    pub vis: Option<&'a DebugVisBuffer>,
    /// The fixed tick delta in seconds.
    pub dt: f32,
}

/// Run one complete simulation tick.
///
/// Sequence: advance the ring, sample input, entity callbacks, backend step,
/// transform publish. While `paused`, entity callbacks and the backend step
/// are skipped so physical motion freezes, but input sampling and the
/// interpolation plumbing keep running so the rest of the app stays
/// responsive.
pub fn run_tick<'h>(
    world: &mut PhysicsWorld,
    ring: &TransformRing,
    vis: Option<&DebugVisBuffer>,
    entities: &mut [Box<dyn Simulate>],
    input_hook: Option<&mut (dyn FnMut() + Send + 'h)>,
    dt: f32,
    paused: bool,
) {
    if let Some(vis) = vis {
        vis.clear();
    }

    ring.advance();

    if let Some(hook) = input_hook {
        hook();
    }

    world.begin_tick();

    if !paused {
        for entity in entities.iter_mut() {
            let mut ctx = TickContext {
                world: &mut *world,
                ring,
                vis,
                dt,
            };
            entity.simulate(&mut ctx);
        }
        world.step();
    }

    // Published even while paused: the ring keeps rotating, so every live
    // slot must be rewritten each tick or readers would see poses from three
    // generations back.
    world.publish_transforms();
}

/// State shared between the simulation thread, the render thread and
/// gameplay code.
pub struct SimShared {
    running: AtomicBool,
    paused: AtomicBool,
    timescale_bits: AtomicU32,
    ticks: AtomicU64,
    epoch: Instant,
    last_tick_us: AtomicU64,
    ring: Arc<TransformRing>,
    vis: Arc<DebugVisBuffer>,
}

impl SimShared {
    fn new(ring: Arc<TransformRing>, vis: Arc<DebugVisBuffer>) -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            timescale_bits: AtomicU32::new(1.0f32.to_bits()),
            ticks: AtomicU64::new(0),
            epoch: Instant::now(),
            last_tick_us: AtomicU64::new(0),
            ring,
            vis,
        }
    }

    #[inline]
    pub fn ring(&self) -> &Arc<TransformRing> {
        &self.ring
    }

    #[inline]
    pub fn vis(&self) -> &Arc<DebugVisBuffer> {
        &self.vis
    }

    pub fn timescale(&self) -> f32 {
        f32::from_bits(self.timescale_bits.load(Ordering::Acquire))
    }

    /// Set the global timescale (clamped to a small positive minimum).
    pub fn set_timescale(&self, timescale: f32) {
        let clamped = timescale.max(MIN_TIMESCALE);
        self.timescale_bits
            .store(clamped.to_bits(), Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Suspend physical motion while keeping input and interpolation alive.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Total ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Tick-phase blend factor for the render thread: elapsed wall time since
    /// the last tick start over the tick period, adjusted for timescale.
    pub fn physics_alpha(&self) -> f32 {
        let now_us = self.epoch.elapsed().as_micros() as u64;
        let last_us = self.last_tick_us.load(Ordering::Acquire);
        let elapsed_us = now_us.saturating_sub(last_us) as f32;
        elapsed_us / SIM_TICK_PERIOD.as_micros() as f32 * self.timescale()
    }

    /// Refresh the interpolated transform pool at the current alpha.
    /// Called from the render thread once per rendered frame.
    pub fn recalc_interpolated(&self) {
        self.ring.recalc_interpolated(self.physics_alpha());
    }

    fn stamp_tick(&self) {
        let now_us = self.epoch.elapsed().as_micros() as u64;
        self.last_tick_us.store(now_us, Ordering::Release);
        self.ticks.fetch_add(1, Ordering::AcqRel);
    }
}

/// Owns the simulation thread.
pub struct SimLoop {
    shared: Arc<SimShared>,
    handle: Option<JoinHandle<()>>,
}

impl SimLoop {
    /// Start the simulation thread and block until its initialization
    /// completes.
    ///
    /// The loop takes ownership of the world and the entity list; everything
    /// else reaches the simulation through entity callbacks or [`SimShared`].
    pub fn spawn(
        mut world: PhysicsWorld,
        mut entities: Vec<Box<dyn Simulate>>,
        mut input_hook: Option<Box<dyn FnMut() + Send>>,
    ) -> Self {
        let ring = world.transform_ring().clone();
        let vis = Arc::new(DebugVisBuffer::new());
        let shared = Arc::new(SimShared::new(ring, vis));

        let started = Arc::new((Mutex::new(false), Condvar::new()));

        let thread_shared = Arc::clone(&shared);
        let thread_started = Arc::clone(&started);
        let handle = thread::Builder::new()
            .name("simulation".into())
            .spawn(move || {
                {
                    let (lock, cvar) = &*thread_started;
                    *lock.lock() = true;
                    cvar.notify_one();
                }

                while thread_shared.running.load(Ordering::Acquire) {
                    let tick_start = Instant::now();
                    thread_shared.stamp_tick();

                    run_tick(
                        &mut world,
                        &thread_shared.ring,
                        Some(&*thread_shared.vis),
                        &mut entities,
                        input_hook.as_deref_mut(),
                        SIM_TICK_DELTA,
                        thread_shared.is_paused(),
                    );

                    // Pace to the scaled tick budget; overruns are logged and
                    // the next tick starts immediately.
                    let budget =
                        Duration::from_secs_f32(SIM_TICK_DELTA / thread_shared.timescale());
                    let elapsed = tick_start.elapsed();
                    if elapsed > budget {
                        log::warn!(
                            "simulation tick overran its budget by {:?}",
                            elapsed - budget
                        );
                    } else {
                        thread::sleep(budget - elapsed);
                    }
                }
            })
            .expect("failed to spawn simulation thread");

        // Wait for the thread to come up instead of spinning on a flag.
        {
            let (lock, cvar) = &*started;
            let mut ready = lock.lock();
            while !*ready {
                cvar.wait(&mut ready);
            }
        }

        Self {
            shared,
            handle: Some(handle),
        }
    }

    #[inline]
    pub fn shared(&self) -> &Arc<SimShared> {
        &self.shared
    }

    /// Stop the loop and join the thread. The in-flight tick is allowed to
    /// complete.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("simulation thread panicked during shutdown");
        }
    }
}

impl Drop for SimLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::interp::TransformRing;

    struct CountingEntity(Arc<AtomicU64>);

    impl Simulate for CountingEntity {
        fn simulate(&mut self, _ctx: &mut TickContext<'_>) {
            self.0.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn empty_world() -> PhysicsWorld {
        PhysicsWorld::new(Arc::new(TransformRing::with_capacity(16)))
    }

    #[test]
    fn run_tick_invokes_entities_and_input_hook() {
        let mut world = empty_world();
        let ring = world.transform_ring().clone();
        let calls = Arc::new(AtomicU64::new(0));
        let mut entities: Vec<Box<dyn Simulate>> =
            vec![Box::new(CountingEntity(Arc::clone(&calls)))];

        let mut sampled = 0u32;
        let mut input = || sampled += 1;

        run_tick(
            &mut world,
            &ring,
            None,
            &mut entities,
            Some(&mut input),
            SIM_TICK_DELTA,
            false,
        );

        assert_eq!(calls.load(Ordering::Acquire), 1);
        assert_eq!(sampled, 1);
    }

    #[test]
    fn paused_tick_skips_entities_but_still_samples_input() {
        let mut world = empty_world();
        let ring = world.transform_ring().clone();
        let calls = Arc::new(AtomicU64::new(0));
        let mut entities: Vec<Box<dyn Simulate>> =
            vec![Box::new(CountingEntity(Arc::clone(&calls)))];

        let mut sampled = 0u32;
        let mut input = || sampled += 1;

        run_tick(
            &mut world,
            &ring,
            None,
            &mut entities,
            Some(&mut input),
            SIM_TICK_DELTA,
            true,
        );

        assert_eq!(calls.load(Ordering::Acquire), 0);
        assert_eq!(sampled, 1);
    }

    #[test]
    fn loop_ticks_and_stops_cleanly() {
        let world = empty_world();
        let sim = SimLoop::spawn(world, Vec::new(), None);
        let shared = Arc::clone(sim.shared());

        std::thread::sleep(Duration::from_millis(80));
        assert!(shared.tick_count() >= 2, "loop did not tick");

        sim.stop();
        let after_stop = shared.tick_count();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(shared.tick_count(), after_stop);
    }

    #[test]
    fn timescale_is_clamped_positive() {
        let ring = Arc::new(TransformRing::with_capacity(4));
        let shared = SimShared::new(ring, Arc::new(DebugVisBuffer::new()));
        shared.set_timescale(0.0);
        assert!(shared.timescale() > 0.0);
        shared.set_timescale(2.0);
        assert_eq!(shared.timescale(), 2.0);
    }
}
