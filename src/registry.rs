//! Task-identifier to task-record index, used for duplicate rejection and
//! cancellation lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::task::Task;

/// A single short-critical-section hash map guarded by one mutex.
///
/// A task record exists here iff its callback has not yet been delivered
/// and it has not been removed (spec invariant).
pub struct Registry {
    inner: Mutex<HashMap<Box<str>, Arc<Task>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Insert `task` unless its `task_id` is already present. On conflict,
    /// the task is handed back to the caller untouched.
    pub fn insert_if_absent(&self, task: Arc<Task>) -> Result<(), Arc<Task>> {
        let mut map = self.inner.lock().expect("registry mutex poisoned");
        if map.contains_key(&*task.task_id) {
            return Err(task);
        }
        map.insert(task.task_id.clone(), task);
        Ok(())
    }

    pub fn remove(&self, task_id: &str) -> Option<Arc<Task>> {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .remove(task_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().expect("registry mutex poisoned").clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
