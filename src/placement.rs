//! Deadline-to-slot placement arithmetic.
//!
//! Pure functions only: no locks, no shared state, so the wheel/cascade
//! logic can be tested against this module in isolation from threading.

use std::time::{Duration, Instant};

/// Compute the `(wheel_index, slot_index)` a task with the given
/// `expire_time` should be placed into, given a snapshot of each wheel's
/// current-slot pointer.
///
/// `current_slot[k]` is read without synchronization relative to the tick
/// worker's increments (see the crate's concurrency notes); placement
/// tolerates a pointer that advances by one slot concurrently with this
/// call, since increments are paced at `slot_interval` — far slower than a
/// single read.
pub fn compute_placement(
    now: Instant,
    expire_time: Instant,
    current_slot: &[usize],
    wheel_size: usize,
    slot_interval: Duration,
) -> (usize, usize) {
    debug_assert!(wheel_size > 0);
    debug_assert!(!current_slot.is_empty());

    if expire_time <= now {
        return (0, (current_slot[0] + 1) % wheel_size);
    }

    let remaining_ms = expire_time.duration_since(now).as_millis();
    if remaining_ms < 1 {
        return (0, (current_slot[0] + 1) % wheel_size);
    }

    let slot_ms = (slot_interval.as_millis().max(1)) as u128;
    let remaining_slots = (remaining_ms + slot_ms - 1) / slot_ms;

    let num_wheels = current_slot.len();
    let wheel_size_u128 = wheel_size as u128;
    let mut range_k = wheel_size_u128;

    for k in 0..num_wheels {
        if remaining_slots <= range_k {
            let divisor = wheel_size_u128.pow(k as u32);
            let offset = (remaining_slots / divisor) as usize;
            let slot_idx = (current_slot[k] + offset) % wheel_size;
            return (k, slot_idx);
        }
        range_k = range_k.saturating_mul(wheel_size_u128);
    }

    // Defensive only: `add` pre-rejects timeouts exceeding the maximum
    // range, so every legitimate call lands in the loop above.
    (num_wheels - 1, wheel_size - 1)
}

/// Maximum representable timeout: `slot_interval * wheel_size^num_wheels`.
pub fn max_range_ms(wheel_size: usize, slot_interval: Duration, num_wheels: usize) -> u128 {
    let mut range = 1u128;
    for _ in 0..num_wheels {
        range = range.saturating_mul(wheel_size as u128);
    }
    range.saturating_mul(slot_interval.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn already_expired_lands_in_next_bottom_slot() {
        let now = Instant::now();
        let current = vec![5, 0, 0];
        let (w, s) = compute_placement(now, now, &current, 60, ms(1000));
        assert_eq!((w, s), (0, 6));
    }

    #[test]
    fn already_expired_wraps_with_modulo() {
        let now = Instant::now();
        let current = vec![59, 0, 0];
        let (w, s) = compute_placement(now, now, &current, 60, ms(1000));
        assert_eq!((w, s), (0, 0), "modulo must wrap, not overflow past W-1");
    }

    #[test]
    fn sub_millisecond_remaining_treated_as_immediate() {
        let now = Instant::now();
        let expire = now + Duration::from_micros(500);
        let current = vec![10, 0, 0];
        let (w, s) = compute_placement(now, expire, &current, 60, ms(1000));
        assert_eq!((w, s), (0, 11));
    }

    #[test]
    fn fits_in_bottom_wheel() {
        let now = Instant::now();
        let expire = now + ms(250);
        let current = vec![0, 0];
        let (w, s) = compute_placement(now, expire, &current, 4, ms(100));
        // ceil(250/100) = 3 slots ahead on wheel 0.
        assert_eq!((w, s), (0, 3));
    }

    #[test]
    fn cascades_to_outer_wheel_when_it_overflows_inner() {
        let now = Instant::now();
        let expire = now + ms(1200);
        let current = vec![0, 0];
        // W=4, Δ=100ms, L=2: range_0 = 4, remaining_slots = ceil(1200/100) = 12 > 4.
        let (w, s) = compute_placement(now, expire, &current, 4, ms(100));
        assert_eq!(w, 1);
        // range_1 = 16 >= 12, offset = 12 / 4^1 = 3.
        assert_eq!(s, 3);
    }

    #[test]
    fn boundary_timeout_equal_to_max_range_is_placed_in_outermost_wheel() {
        let now = Instant::now();
        let max = max_range_ms(4, ms(100), 2);
        assert_eq!(max, 1600);
        let expire = now + ms(max as u64);
        let current = vec![0, 0];
        let (w, _s) = compute_placement(now, expire, &current, 4, ms(100));
        assert_eq!(w, 1);
    }

    #[test]
    fn max_range_matches_delta_times_w_pow_l() {
        assert_eq!(max_range_ms(60, ms(1000), 3), 1000u128 * 60u128.pow(3));
    }
}
