// Example: Manually driving a TimeoutMonitor
//
// Demonstrates registering tasks with varying deadlines, cancelling one
// before it fires, and observing the wheel distribution while the
// monitor runs.
//
// Run with: cargo run --example manual_run --features tracing-init

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use timewheel_monitor::{TimeoutMonitor, WheelConfig};

fn main() {
    #[cfg(feature = "tracing-init")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Manual Run: Hierarchical Timing Wheel ===\n");

    // Step 1: Build a monitor sized for this demo (fast ticks so the
    // example finishes in well under a second).
    println!("Step 1: Creating monitor with a 50ms slot interval");
    let config = WheelConfig {
        wheel_size: 8,
        slot_interval_ms: 50,
        num_wheels: 2,
        callback_pool_size: 2,
    };
    let monitor = TimeoutMonitor::with_config(config).expect("demo config is always valid");
    monitor.start();
    println!("✓ monitor started\n");

    // Step 2: Register a handful of tasks with staggered deadlines.
    println!("Step 2: Registering tasks");
    let fired = Arc::new(AtomicUsize::new(0));
    for (task_id, node_id, delay_ms) in [
        ("order-1", "node-a", 80u64),
        ("order-2", "node-a", 160),
        ("order-3", "node-b", 240),
    ] {
        let fired = Arc::clone(&fired);
        monitor
            .add(
                task_id,
                node_id,
                Duration::from_millis(delay_ms),
                Arc::new(move |id: &str| {
                    println!("  -> {id} timed out");
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .expect("registration should succeed within the configured range");
    }
    println!("✓ 3 tasks registered, {} pending\n", monitor.count());

    // Step 3: Cancel one task before it fires.
    println!("Step 3: Cancelling order-2 before its deadline");
    let cancelled = monitor.remove("order-2");
    println!("✓ cancelled = {cancelled}\n");

    // Step 4: Let the wheel tick through every deadline.
    println!("Step 4: Waiting for remaining tasks to fire");
    std::thread::sleep(Duration::from_millis(500));
    println!(
        "✓ {} callback(s) fired, {} task(s) still pending\n",
        fired.load(Ordering::SeqCst),
        monitor.count()
    );

    // Step 5: Shut down cleanly.
    println!("Step 5: Stopping monitor");
    monitor.stop();
    println!("✓ monitor stopped");
}
