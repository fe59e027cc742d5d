//! The task record: the unit of work tracked by the wheel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A user callback, invoked with the fired task's identifier.
///
/// `Arc<dyn Fn>` rather than a generic parameter keeps [`crate::monitor::TimeoutMonitor`]
/// non-generic: one monitor instance stores callbacks from arbitrarily many,
/// differently-typed call sites in a single homogeneous registry.
pub type Callback = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// An in-flight task tracked by the monitor.
///
/// A `Task` is shared (via `Arc`) between the registry, the one slot it
/// currently resides in, and — transiently — the callback queue. The last
/// holder to drop its reference frees the record.
pub struct Task {
    pub task_id: Box<str>,
    pub node_id: Box<str>,
    pub expire_time: Instant,
    pub callback: Callback,
    cancelled: AtomicBool,
}

impl Task {
    pub fn new(
        task_id: impl Into<Box<str>>,
        node_id: impl Into<Box<str>>,
        expire_time: Instant,
        callback: Callback,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            node_id: node_id.into(),
            expire_time,
            callback,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Mark this task cancelled. Monotonic: once set, never clears.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("task_id", &self.task_id)
            .field("node_id", &self.node_id)
            .field("expire_time", &self.expire_time)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_monotonic() {
        let task = Task::new("t1", "n1", Instant::now(), Arc::new(|_: &str| {}));
        assert!(!task.is_cancelled());
        task.cancel();
        assert!(task.is_cancelled());
        task.cancel();
        assert!(task.is_cancelled());
    }
}
