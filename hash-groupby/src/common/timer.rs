//! Wall time of the groupby stages

use std::time::Duration;

use quanta::Instant;

/// Running timer of a single stage. Dropping it adds the elapsed time into the
/// [`Duration`] it was started with, such that a stage aborted by `?` is still counted
#[derive(Debug)]
pub struct StageTimer<'a> {
    start: Instant,
    elapsed: &'a mut Duration,
}

impl<'a> StageTimer<'a> {
    /// Start timing a stage, the time is added into `elapsed`
    #[inline]
    pub fn start(elapsed: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            elapsed,
        }
    }
}

impl Drop for StageTimer<'_> {
    #[inline]
    fn drop(&mut self) {
        *self.elapsed += self.start.elapsed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_timers_are_independent() {
        let mut build_time = Duration::ZERO;
        let mut sort_time = Duration::ZERO;
        {
            let _build = StageTimer::start(&mut build_time);
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(build_time >= Duration::from_millis(5));
        assert_eq!(sort_time, Duration::ZERO);

        let before = build_time;
        let _sort = StageTimer::start(&mut sort_time);
        assert_eq!(build_time, before);
    }

    #[test]
    fn test_stage_timer_counts_aborted_stage() {
        fn stage(elapsed: &mut Duration, input: Option<u32>) -> Option<u32> {
            let _timer = StageTimer::start(elapsed);
            std::thread::sleep(Duration::from_millis(2));
            let input = input?;
            Some(input + 1)
        }

        let mut elapsed = Duration::ZERO;
        assert_eq!(stage(&mut elapsed, None), None);
        assert!(elapsed >= Duration::from_millis(2));
    }
}
