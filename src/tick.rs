//! The single tick worker thread: advances the wheel on a fixed cadence,
//! relies on [`crate::wheel::WheelSet`] for cascade, and hands expired
//! tasks to the callback pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::callback_pool::{self, CallbackPool};
use crate::registry::Registry;
use crate::wheel::WheelSet;

/// Shared wake primitive used to let `stop()` interrupt the tick worker's
/// sleep immediately instead of waiting up to one `slot_interval`.
pub type Wake = Arc<(Mutex<()>, Condvar)>;

pub fn new_wake() -> Wake {
    Arc::new((Mutex::new(()), Condvar::new()))
}

struct TickWorker {
    wheel: Arc<WheelSet>,
    registry: Arc<Registry>,
    callback_pool: Arc<CallbackPool>,
    slot_interval: Duration,
    running: Arc<AtomicBool>,
    wake: Wake,
}

/// Spawn the tick worker thread. Returns once the thread has been handed
/// off; the thread itself exits as soon as `running` observes `false`.
pub fn spawn(
    wheel: Arc<WheelSet>,
    registry: Arc<Registry>,
    callback_pool: Arc<CallbackPool>,
    slot_interval: Duration,
    running: Arc<AtomicBool>,
    wake: Wake,
) -> JoinHandle<()> {
    let worker = TickWorker {
        wheel,
        registry,
        callback_pool,
        slot_interval,
        running,
        wake,
    };

    thread::Builder::new()
        .name("timewheel-tick".to_string())
        .spawn(move || worker.run())
        .expect("failed to spawn tick worker thread")
}

impl TickWorker {
    fn run(&self) {
        let mut next_tick = Instant::now() + self.slot_interval;

        loop {
            if !self.wait_until(next_tick) {
                return;
            }
            if !self.running.load(Ordering::Acquire) {
                return;
            }

            let now = Instant::now();
            self.do_tick(now);
            next_tick += self.slot_interval;
        }
    }

    /// Block until `deadline` or until shutdown is signalled. Returns
    /// `false` if the caller should exit without ticking.
    fn wait_until(&self, deadline: Instant) -> bool {
        let (lock, condvar) = &*self.wake;
        let mut guard = lock.lock().expect("tick wake mutex poisoned");

        loop {
            if !self.running.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (next_guard, result) = condvar
                .wait_timeout(guard, deadline - now)
                .expect("tick wake condvar poisoned");
            guard = next_guard;
            if result.timed_out() {
                return true;
            }
            // Spurious wakeup or an explicit notify from `stop()`: loop
            // back around and re-check the running flag and deadline.
        }
    }

    fn do_tick(&self, now: Instant) {
        trace!("tick");
        let result = self.wheel.advance(now);

        for task in result.cascade_failures {
            self.fire_fallback(&task);
        }

        for task in result.bottom_drain {
            if task.is_cancelled() {
                trace!(task_id = %task.task_id, "dropping cancelled task at drain");
                continue;
            }

            if now >= task.expire_time {
                self.registry.remove(&task.task_id);
                debug!(task_id = %task.task_id, node_id = %task.node_id, "task expired, enqueueing for callback dispatch");
                self.callback_pool.submit(task);
            } else if self
                .wheel
                .insert_task(Arc::clone(&task), now)
                .is_err()
            {
                self.fire_fallback(&task);
            }
        }
    }

    /// Safety-valve path: a task's replacement placement failed after
    /// cascade or drain. Fire it immediately, inline on the tick thread,
    /// then remove it from the registry. This should not occur in normal
    /// operation (see `WheelSet::insert_task`).
    fn fire_fallback(&self, task: &Arc<crate::task::Task>) {
        warn!(
            task_id = %task.task_id,
            "replacement placement failed; firing inline on the tick thread as a fallback"
        );
        self.registry.remove(&task.task_id);
        callback_pool::dispatch(task);
    }
}
