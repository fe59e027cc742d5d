//! Hierarchical timing wheel task-timeout monitor.
//!
//! Register a task with a relative timeout and a callback; the monitor
//! fires the callback once, on a background thread pool, at or shortly
//! after the resulting monotonic deadline. Cancellation is lazy — a
//! cancelled task is dropped the next time the tick worker passes over
//! its slot rather than searched for and removed immediately.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use timewheel_monitor::TimeoutMonitor;
//!
//! let monitor = TimeoutMonitor::new();
//! monitor.start();
//! monitor
//!     .add(
//!         "task-1",
//!         "node-a",
//!         Duration::from_secs(5),
//!         Arc::new(|task_id: &str| println!("{task_id} timed out")),
//!     )
//!     .unwrap();
//! ```

// Mutex-poisoning `.expect()` calls are the one accepted exception to this
// rule in non-test code (see registry.rs, wheel.rs, callback_pool.rs,
// monitor.rs) — a poisoned lock means a prior panic already corrupted
// shared state. Test modules are exempt; see each module's `mod tests`.
#![warn(clippy::unwrap_used)]

pub mod callback_pool;
pub mod config;
pub mod error;
pub mod monitor;
pub mod placement;
pub mod registry;
pub mod task;
pub mod tick;
pub mod wheel;

pub use config::WheelConfig;
pub use error::{ConfigError, MonitorError, MonitorResult};
pub use monitor::TimeoutMonitor;
pub use task::Callback;
