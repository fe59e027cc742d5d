//! The hierarchical bucket structure: `L` wheels of `W` slots each, slot
//! insertion, and the cascade that redistributes tasks on wheel overflow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::placement;
use crate::task::Task;

struct Slot {
    tasks: Mutex<Vec<Arc<Task>>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<Arc<Task>> {
        std::mem::take(&mut *self.tasks.lock().expect("slot mutex poisoned"))
    }

    fn push(&self, task: Arc<Task>) {
        self.tasks.lock().expect("slot mutex poisoned").push(task);
    }

    fn len(&self) -> usize {
        self.tasks.lock().expect("slot mutex poisoned").len()
    }

    fn clear(&self) {
        self.tasks.lock().expect("slot mutex poisoned").clear();
    }
}

struct Wheel {
    slots: Vec<Slot>,
    /// Mutated only by the tick worker; read by the placement calculator
    /// without synchronization (see module docs on the concurrency model).
    current: AtomicUsize,
}

impl Wheel {
    fn new(wheel_size: usize) -> Self {
        Self {
            slots: (0..wheel_size).map(|_| Slot::new()).collect(),
            current: AtomicUsize::new(0),
        }
    }
}

/// Tasks that fell out of a cascade or a bottom-wheel reinsertion whose
/// recomputed placement was out of range. Structurally this should never
/// happen (the placement calculator is total over the range `add` already
/// validated); the tick worker treats each as a safety-valve immediate fire.
pub struct AdvanceResult {
    pub bottom_drain: Vec<Arc<Task>>,
    pub cascade_failures: Vec<Arc<Task>>,
}

/// The `L`-wheel, `W`-slot-per-wheel bucket structure.
pub struct WheelSet {
    wheels: Vec<Wheel>,
    wheel_size: usize,
    slot_interval: Duration,
    num_wheels: usize,
}

impl WheelSet {
    pub fn new(wheel_size: usize, slot_interval: Duration, num_wheels: usize) -> Self {
        debug_assert!(wheel_size > 0 && num_wheels > 0);
        Self {
            wheels: (0..num_wheels).map(|_| Wheel::new(wheel_size)).collect(),
            wheel_size,
            slot_interval,
            num_wheels,
        }
    }

    /// Reset all current-slot pointers to 0. Called once by `start`.
    pub fn reset_pointers(&self) {
        for wheel in &self.wheels {
            wheel.current.store(0, Ordering::Release);
        }
    }

    /// Drop every task reference from every slot. Called by `stop`.
    pub fn clear_all_slots(&self) {
        for wheel in &self.wheels {
            for slot in &wheel.slots {
                slot.clear();
            }
        }
    }

    fn current_slots(&self) -> Vec<usize> {
        self.wheels
            .iter()
            .map(|w| w.current.load(Ordering::Acquire))
            .collect()
    }

    /// Place `task` into the slot its `expire_time` maps to as of `now`.
    ///
    /// Total in practice: the placement calculator always returns a
    /// position within range for a task whose timeout `add` already
    /// validated against the maximum range. The `Err` arm exists only to
    /// give the tick worker a defensive fallback (spec: "implementers
    /// should assert the invariant rather than rely on it silently").
    pub fn insert_task(&self, task: Arc<Task>, now: Instant) -> Result<(), ()> {
        let current = self.current_slots();
        let (wheel_idx, slot_idx) = placement::compute_placement(
            now,
            task.expire_time,
            &current,
            self.wheel_size,
            self.slot_interval,
        );

        if wheel_idx >= self.num_wheels || slot_idx >= self.wheel_size {
            debug_assert!(false, "placement calculator returned an out-of-range index");
            return Err(());
        }

        self.wheels[wheel_idx].slots[slot_idx].push(task);
        Ok(())
    }

    /// Best-effort live-task count per wheel, for introspection only.
    pub fn count_by_wheel(&self) -> Vec<usize> {
        self.wheels
            .iter()
            .map(|w| w.slots.iter().map(Slot::len).sum())
            .collect()
    }

    /// Advance the bottom wheel by one tick, cascading any higher wheels
    /// that wrap as a result, and return the bottom wheel's now-current
    /// slot contents for the caller to fire or re-insert.
    ///
    /// Cascade runs inner-wheel-first: wheel `k`'s newly-pointed-to slot is
    /// drained and re-inserted before wheel `k+1` is even advanced, so a
    /// task cascaded down from wheel `k+1` into wheel `k` this same tick
    /// simply waits for a future tick rather than being processed twice.
    pub fn advance(&self, now: Instant) -> AdvanceResult {
        let mut cascade_failures = Vec::new();
        let mut k = 0usize;

        loop {
            let wheel = &self.wheels[k];
            let prev = wheel.current.load(Ordering::Acquire);
            let next = (prev + 1) % self.wheel_size;
            wheel.current.store(next, Ordering::Release);

            if k > 0 {
                let drained = wheel.slots[next].take();
                for task in drained {
                    if task.is_cancelled() {
                        continue;
                    }
                    if self.insert_task(Arc::clone(&task), now).is_err() {
                        cascade_failures.push(task);
                    }
                }
            }

            if next != 0 || k + 1 >= self.num_wheels {
                break;
            }
            k += 1;
        }

        let bottom_current = self.wheels[0].current.load(Ordering::Acquire);
        let bottom_drain = self.wheels[0].slots[bottom_current].take();

        AdvanceResult {
            bottom_drain,
            cascade_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, expire_time: Instant) -> Arc<Task> {
        Arc::new(Task::new(id, "n", expire_time, Arc::new(|_: &str| {})))
    }

    #[test]
    fn insert_places_task_in_bottom_wheel_for_near_deadlines() {
        let wheel = WheelSet::new(4, Duration::from_millis(100), 2);
        let now = Instant::now();
        let task = task("a", now + Duration::from_millis(250));
        wheel.insert_task(Arc::clone(&task), now).unwrap();
        let counts = wheel.count_by_wheel();
        assert_eq!(counts, vec![1, 0]);
    }

    #[test]
    fn insert_places_task_in_outer_wheel_for_far_deadlines() {
        let wheel = WheelSet::new(4, Duration::from_millis(100), 2);
        let now = Instant::now();
        let task = task("c", now + Duration::from_millis(1200));
        wheel.insert_task(Arc::clone(&task), now).unwrap();
        let counts = wheel.count_by_wheel();
        assert_eq!(counts, vec![0, 1]);
    }

    #[test]
    fn cascade_moves_task_from_outer_to_inner_wheel_on_wrap() {
        let wheel = WheelSet::new(4, Duration::from_millis(100), 2);
        let now = Instant::now();
        let task = task("c", now + Duration::from_millis(1200));
        wheel.insert_task(Arc::clone(&task), now).unwrap();
        assert_eq!(wheel.count_by_wheel(), vec![0, 1]);

        // Advance the bottom wheel through a full revolution (4 ticks) so
        // wheel 1 advances once and cascades its newly-current slot.
        let mut t = now;
        for _ in 0..4 {
            t += Duration::from_millis(100);
            let result = wheel.advance(t);
            assert!(result.cascade_failures.is_empty());
        }

        // The task must have left wheel 1 (cascaded down); it has not fired
        // yet since only 400ms have elapsed of its 1200ms timeout.
        let counts = wheel.count_by_wheel();
        assert_eq!(counts[1], 0, "task must have cascaded out of the outer wheel");
        assert_eq!(counts[0], 1, "cascaded task must now live in the inner wheel");
    }

    #[test]
    fn cancelled_task_is_dropped_during_cascade_not_reinserted() {
        let wheel = WheelSet::new(4, Duration::from_millis(100), 2);
        let now = Instant::now();
        let task = task("c", now + Duration::from_millis(1200));
        wheel.insert_task(Arc::clone(&task), now).unwrap();
        task.cancel();

        let mut t = now;
        for _ in 0..4 {
            t += Duration::from_millis(100);
            wheel.advance(t);
        }

        let total: usize = wheel.count_by_wheel().iter().sum();
        assert_eq!(total, 0, "cancelled task must not be carried by cascade");
    }

    #[test]
    fn reset_pointers_zeroes_all_wheels() {
        let wheel = WheelSet::new(4, Duration::from_millis(100), 2);
        wheel.advance(Instant::now());
        wheel.reset_pointers();
        for w in &wheel.wheels {
            assert_eq!(w.current.load(Ordering::Acquire), 0);
        }
    }
}
