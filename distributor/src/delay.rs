//! Optional artificial delay (§4.3.4): pads every request, success or
//! failure, to a minimum total elapsed time so tail latency is smoothed
//! instead of being visibly faster for cheap requests.

use std::thread;
use std::time::{Duration, Instant};

/// Runs `f`, then sleeps out the remainder of `min_elapsed` if `f` returned
/// sooner than that. A zero duration is a no-op regardless of how long `f`
/// takes.
pub fn pad_to<T>(min_elapsed: Duration, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    if let Some(remaining) = min_elapsed.checked_sub(elapsed) {
        thread::sleep(remaining);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_a_fast_call_up_to_the_minimum() {
        let start = Instant::now();
        let value = pad_to(Duration::from_millis(20), || 42);
        assert_eq!(value, 42);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn never_shortens_a_slow_call() {
        let start = Instant::now();
        pad_to(Duration::from_millis(1), || thread::sleep(Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn zero_duration_is_a_no_op() {
        let result = pad_to(Duration::ZERO, || "ok");
        assert_eq!(result, "ok");
    }

    #[test]
    fn runs_on_failure_paths_too() {
        let start = Instant::now();
        let outcome: Result<(), &str> = pad_to(Duration::from_millis(15), || Err("boom"));
        assert_eq!(outcome, Err("boom"));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
