use web_time::{Duration, Instant};

/// Clamps measured frame times into a step the solver can digest.
///
/// A frozen window, a resize drag or a debugger pause can report a frame time
/// of several seconds. Feeding that into the solver in one go explodes the
/// simulation, so anything outside `(0, max_step]` is replaced by the nominal
/// `fixed_step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepClamp {
    pub fixed_step: f32,
    pub max_step: f32,
}

impl StepClamp {
    pub const fn new(fixed_step: f32, max_step: f32) -> Self {
        Self {
            fixed_step,
            max_step,
        }
    }

    pub fn resolve(&self, elapsed: f32, paused: bool) -> f32 {
        if paused || !elapsed.is_finite() || elapsed <= 0.0 || elapsed > self.max_step {
            return self.fixed_step;
        }

        elapsed
    }

}

/// Measures wall time between frames.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_frame_time: Instant,
    delta_time: Duration,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            last_frame_time: Instant::now(),
            delta_time: Duration::ZERO,
        }
    }
}

impl FrameClock {
    pub fn tick(&mut self) -> Duration {
        self.delta_time = self.last_frame_time.elapsed();
        self.last_frame_time = Instant::now();
        self.delta_time
    }

    pub fn delta_time(&self) -> Duration {
        self.delta_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLAMP: StepClamp = StepClamp::new(1.0 / 60.0, 0.25);

    #[test]
    fn stall_is_replaced_by_fixed_step() {
        assert_eq!(CLAMP.resolve(10.0, false), 1.0 / 60.0);
    }

    #[test]
    fn bad_values_are_replaced() {
        assert_eq!(CLAMP.resolve(0.0, false), CLAMP.fixed_step);
        assert_eq!(CLAMP.resolve(-0.5, false), CLAMP.fixed_step);
        assert_eq!(CLAMP.resolve(f32::NAN, false), CLAMP.fixed_step);
        assert_eq!(CLAMP.resolve(f32::INFINITY, false), CLAMP.fixed_step);
    }

    #[test]
    fn pause_forces_fixed_step() {
        assert_eq!(CLAMP.resolve(0.01, true), CLAMP.fixed_step);
    }

    #[test]
    fn sane_values_pass_through() {
        assert_eq!(CLAMP.resolve(0.01, false), 0.01);
        assert_eq!(CLAMP.resolve(0.25, false), 0.25);
    }

    #[test]
    fn clock_measures_time_between_ticks() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.delta_time(), Duration::ZERO);

        std::thread::sleep(Duration::from_millis(5));
        let first = clock.tick();
        assert!(first >= Duration::from_millis(5));
        assert_eq!(clock.delta_time(), first);

        // measured from the previous tick, not from creation
        let second = clock.tick();
        assert!(second < first);
        assert_eq!(clock.delta_time(), second);
    }
}
