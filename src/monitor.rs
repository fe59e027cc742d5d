//! The public facade: [`TimeoutMonitor`] ties the registry, wheel set,
//! tick worker, and callback pool into a single handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::callback_pool::CallbackPool;
use crate::config::WheelConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::registry::Registry;
use crate::task::{Callback, Task};
use crate::tick::{self, Wake};
use crate::wheel::WheelSet;

/// A running (or stopped) hierarchical timing wheel task-timeout monitor.
///
/// Cheap to clone-share via `Arc` if callers need one handle across
/// threads; internally every field is already `Arc`-wrapped or
/// synchronized, so `TimeoutMonitor` itself does not need to be wrapped
/// in a `Mutex` by callers.
pub struct TimeoutMonitor {
    config: WheelConfig,
    wheel: Arc<WheelSet>,
    registry: Arc<Registry>,
    callback_pool: Arc<CallbackPool>,
    running: Arc<AtomicBool>,
    wake: Wake,
    tick_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimeoutMonitor {
    /// Build a monitor with [`WheelConfig::default`] sizing. Cannot fail:
    /// the defaults are always valid.
    pub fn new() -> Self {
        Self::with_config(WheelConfig::default())
            .expect("WheelConfig::default() must always be a valid configuration")
    }

    /// Build a monitor with explicit sizing. Does not start any threads;
    /// call [`TimeoutMonitor::start`] to begin ticking.
    ///
    /// Fails if `wheel_size == 0` or `num_wheels == 0`.
    pub fn with_config(config: WheelConfig) -> MonitorResult<Self> {
        if config.wheel_size == 0 {
            return Err(MonitorError::InvalidConfiguration(
                "wheel_size must be non-zero".to_string(),
            ));
        }
        if config.num_wheels == 0 {
            return Err(MonitorError::InvalidConfiguration(
                "num_wheels must be non-zero".to_string(),
            ));
        }

        let wheel = Arc::new(WheelSet::new(
            config.wheel_size,
            config.slot_interval(),
            config.num_wheels,
        ));
        Ok(Self {
            config,
            wheel,
            registry: Arc::new(Registry::new()),
            callback_pool: Arc::new(CallbackPool::new()),
            running: Arc::new(AtomicBool::new(false)),
            wake: tick::new_wake(),
            tick_handle: Mutex::new(None),
        })
    }

    /// Start the tick worker and callback pool. Idempotent: calling
    /// `start` on an already-running monitor is a no-op.
    pub fn start(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.wheel.reset_pointers();
        self.callback_pool.start(self.config.callback_pool_size);

        let handle = tick::spawn(
            Arc::clone(&self.wheel),
            Arc::clone(&self.registry),
            Arc::clone(&self.callback_pool),
            self.config.slot_interval(),
            Arc::clone(&self.running),
            Arc::clone(&self.wake),
        );
        *self.tick_handle.lock().expect("tick handle mutex poisoned") = Some(handle);

        info!(
            wheel_size = self.config.wheel_size,
            num_wheels = self.config.num_wheels,
            slot_interval_ms = self.config.slot_interval_ms,
            callback_pool_size = self.config.callback_pool_size,
            "timeout monitor started"
        );
    }

    /// Stop the tick worker, join the callback pool, and clear all pending
    /// state. Idempotent: calling `stop` on an already-stopped monitor is
    /// a no-op. Pending tasks are dropped without firing.
    pub fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        {
            let (_lock, condvar) = &*self.wake;
            condvar.notify_all();
        }

        if let Some(handle) = self
            .tick_handle
            .lock()
            .expect("tick handle mutex poisoned")
            .take()
        {
            let _ = handle.join();
        }

        self.callback_pool.stop();
        self.wheel.clear_all_slots();
        self.registry.clear();

        info!("timeout monitor stopped");
    }

    /// Register a task that fires `timeout` from now, invoking
    /// `callback(task_id)` (or, if the task is cascaded out uncancelled
    /// and its replacement placement fails, firing it inline as a
    /// fallback).
    ///
    /// Rejects a non-positive `timeout`, a `timeout` exceeding this
    /// monitor's configured maximum range, and a `task_id` already
    /// registered. Internally, `expire_time = now() + timeout`.
    pub fn add(
        &self,
        task_id: impl Into<Box<str>>,
        node_id: impl Into<Box<str>>,
        timeout: Duration,
        callback: Callback,
    ) -> MonitorResult<()> {
        if !self.running.load(Ordering::Acquire) {
            return Err(MonitorError::NotRunning);
        }
        if timeout.is_zero() {
            return Err(MonitorError::InvalidTimeout);
        }
        if timeout.as_millis() > self.config.max_range_ms() {
            return Err(MonitorError::RangeExceeded);
        }

        let now = Instant::now();
        let expire_time = now + timeout;
        let task = Arc::new(Task::new(task_id, node_id, expire_time, callback));
        self.registry
            .insert_if_absent(Arc::clone(&task))
            .map_err(|_| MonitorError::DuplicateTask)?;

        if self.wheel.insert_task(Arc::clone(&task), now).is_err() {
            warn!("initial placement failed; this indicates a range-validation bug");
            self.registry.remove(&task.task_id);
            return Err(MonitorError::PlacementFailed);
        }

        debug!(task_id = %task.task_id, timeout_ms = timeout.as_millis() as u64, "task registered");
        Ok(())
    }

    /// Cancel a pending task by id. Lazy: the task record is marked
    /// cancelled but stays in its slot until the tick worker passes over
    /// it, at which point it is dropped instead of fired.
    pub fn remove(&self, task_id: &str) -> bool {
        match self.registry.remove(task_id) {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of tasks currently registered (not yet fired or cancelled).
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Best-effort live-task count per wheel, for introspection and
    /// diagnostics. Includes tasks whose cancellation has not yet been
    /// observed by the tick worker.
    pub fn count_by_wheel(&self) -> Vec<usize> {
        self.wheel.count_by_wheel()
    }
}

impl Default for TimeoutMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimeoutMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
