use std::time::Duration;

/// Simulation clock driven by frame timestamps.
///
/// Every frame reports its timestamp; the delta since the previous frame is
/// added to `sim_time` only while running. Paused frames still consume the
/// timestamp so resuming does not jump forward.
#[derive(Clone, Debug)]
pub struct AnimationClock {
    sim_time: f64,
    running: bool,
    last: Option<Duration>,
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationClock {
    pub fn new() -> Self {
        Self {
            sim_time: 0.0,
            running: true,
            last: None,
        }
    }

    /// Clock frozen at a given simulation time (used for single-frame export).
    pub fn at(sim_time: f64) -> Self {
        Self {
            sim_time: sim_time.max(0.0),
            running: false,
            last: None,
        }
    }

    /// Sets the reference timestamp, like taking `now` when the loop starts.
    pub fn reset_reference(&mut self, now: Duration) {
        self.last = Some(now);
    }

    pub fn advance(&mut self, now: Duration) -> f64 {
        let dt = match self.last {
            Some(last) => now.saturating_sub(last).as_secs_f64(),
            None => 0.0,
        };
        self.last = Some(now);
        if self.running {
            self.sim_time += dt;
        }
        self.sim_time
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Time argument handed to the wave field (fixed 2x frequency multiplier).
    pub fn wave_time(&self) -> f64 {
        self.sim_time * 2.0
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn toggle(&mut self) -> bool {
        self.running = !self.running;
        self.running
    }
}
