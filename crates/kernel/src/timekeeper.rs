/// Step size used when nothing else is configured, in seconds.
pub const DEFAULT_STEP_SIZE: f64 = 0.005;

/// Simulation clock. Advances by exactly one fixed step per world update.
#[derive(Debug, Clone, PartialEq)]
pub struct Timekeeper {
    time: f64,
    max_step_size: f64,
}

impl Timekeeper {
    pub fn new(step_size: f64) -> Self {
        Self {
            time: 0.0,
            max_step_size: step_size,
        }
    }

    pub fn step_size(&self) -> f64 {
        self.max_step_size
    }

    pub fn set_max_step_size(&mut self, step_size: f64) {
        self.max_step_size = step_size;
    }

    /// Elapsed simulation time in seconds.
    pub fn sim_time(&self) -> f64 {
        self.time
    }

    pub fn step_time(&mut self) {
        self.time += self.max_step_size;
    }
}

impl Default for Timekeeper {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let tk = Timekeeper::default();
        assert_eq!(tk.sim_time(), 0.0);
        assert_eq!(tk.step_size(), DEFAULT_STEP_SIZE);
    }

    #[test]
    fn step_advances_by_step_size() {
        let mut tk = Timekeeper::new(0.25);
        tk.step_time();
        tk.step_time();
        assert_eq!(tk.sim_time(), 0.5);
        tk.set_max_step_size(0.5);
        tk.step_time();
        assert_eq!(tk.sim_time(), 1.0);
    }
}
