//! Fixed-size pool of worker threads dispatching fired tasks to user
//! callbacks.
//!
//! No inter-task ordering guarantee is made: tasks fired within one tick
//! may be delivered in any order and concurrently across workers.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{error, trace};

use crate::task::Task;

/// Invoke `task`'s callback, catching any panic so a misbehaving callback
/// cannot take down a worker thread (or, via the tick-thread fallback path,
/// the tick worker itself).
pub(crate) fn dispatch(task: &Task) {
    if task.is_cancelled() {
        trace!(task_id = %task.task_id, "dropping cancelled task instead of firing");
        return;
    }

    let callback = Arc::clone(&task.callback);
    let task_id: &str = &task.task_id;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        (callback)(task_id);
    }));

    if let Err(payload) = result {
        error!(
            task_id = %task.task_id,
            node_id = %task.node_id,
            "callback panicked: {}",
            panic_message(&payload)
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

struct Shared {
    queue: Mutex<VecDeque<Arc<Task>>>,
    condvar: Condvar,
    shutdown: std::sync::atomic::AtomicBool,
}

/// The callback dispatch pool. `C` worker threads share one FIFO queue.
pub struct CallbackPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CallbackPool {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                condvar: Condvar::new(),
                shutdown: std::sync::atomic::AtomicBool::new(false),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `count` worker threads. No-op if already started.
    pub fn start(&self, count: usize) {
        let mut workers = self.workers.lock().expect("callback pool mutex poisoned");
        if !workers.is_empty() {
            return;
        }
        self.shared
            .shutdown
            .store(false, std::sync::atomic::Ordering::Release);

        for idx in 0..count {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("timewheel-callback-{idx}"))
                .spawn(move || worker_loop(shared))
                .expect("failed to spawn callback worker thread");
            workers.push(handle);
        }
    }

    /// Enqueue a fired task for dispatch by a worker thread.
    pub fn submit(&self, task: Arc<Task>) {
        let mut queue = self.shared.queue.lock().expect("callback queue mutex poisoned");
        queue.push_back(task);
        self.shared.condvar.notify_one();
    }

    /// Signal shutdown, join every worker, then drop whatever remains in
    /// the queue without dispatching it.
    pub fn stop(&self) {
        self.shared
            .shutdown
            .store(true, std::sync::atomic::Ordering::Release);
        self.shared.condvar.notify_all();

        let mut workers = self.workers.lock().expect("callback pool mutex poisoned");
        for handle in workers.drain(..) {
            let _ = handle.join();
        }

        self.shared
            .queue
            .lock()
            .expect("callback queue mutex poisoned")
            .clear();
    }
}

impl Default for CallbackPool {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().expect("callback queue mutex poisoned");
            loop {
                if let Some(task) = queue.pop_front() {
                    break Some(task);
                }
                if shared.shutdown.load(std::sync::atomic::Ordering::Acquire) {
                    break None;
                }
                queue = shared
                    .condvar
                    .wait(queue)
                    .expect("callback queue condvar poisoned");
            }
        };

        match task {
            Some(task) => dispatch(&task),
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn task_with(counter: Arc<AtomicUsize>) -> Arc<Task> {
        Arc::new(Task::new(
            "t",
            "n",
            Instant::now(),
            Arc::new(move |_id: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ))
    }

    #[test]
    fn dispatches_submitted_tasks() {
        let pool = CallbackPool::new();
        pool.start(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            pool.submit(task_with(Arc::clone(&counter)));
        }
        // Give workers a moment to drain; stop() itself joins them so this
        // also validates that stop() waits for in-flight dispatch to finish.
        std::thread::sleep(Duration::from_millis(50));
        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn cancelled_task_is_not_dispatched() {
        let pool = CallbackPool::new();
        pool.start(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let task = task_with(Arc::clone(&counter));
        task.cancel();
        pool.submit(task);
        std::thread::sleep(Duration::from_millis(20));
        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_callback_does_not_kill_worker() {
        let pool = CallbackPool::new();
        pool.start(1);
        let task = Arc::new(Task::new("p", "n", Instant::now(), Arc::new(|_: &str| {
            panic!("boom");
        })));
        pool.submit(task);

        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(task_with(Arc::clone(&counter)));
        std::thread::sleep(Duration::from_millis(50));
        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 1, "worker must survive a panicking callback");
    }
}
