use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::WorldError;
use crate::plugin::PluginRegistry;
use crate::timekeeper::{DEFAULT_STEP_SIZE, Timekeeper};
use crate::world::{TeardownReport, World};

/// Run-time settings for a [`Simulation`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Simulated seconds per update.
    pub step_size: f64,
    /// Updates performed by [`Simulation::run`].
    pub max_steps: u64,
    /// Pace updates to wall time at this multiple of real time. `None` runs
    /// as fast as possible.
    pub realtime_factor: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_size: DEFAULT_STEP_SIZE,
            max_steps: 1000,
            realtime_factor: None,
        }
    }
}

/// Outcome of [`Simulation::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub steps: u64,
    pub sim_time: f64,
    pub wall_time: Duration,
}

/// A world together with its clock.
pub struct Simulation {
    world: World,
    timekeeper: Timekeeper,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(
        world_path: impl AsRef<Path>,
        config: SimulationConfig,
        registry: PluginRegistry,
    ) -> Result<Self, WorldError> {
        let world = World::make_world(world_path, registry)?;
        Ok(Self {
            world,
            timekeeper: Timekeeper::new(config.step_size),
            config,
        })
    }

    /// Advance by one update.
    pub fn step(&mut self) {
        self.world.update(&mut self.timekeeper);
    }

    /// Perform `max_steps` updates.
    pub fn run(&mut self) -> RunStats {
        let start = Instant::now();
        let _span = tracing::info_span!("run", steps = self.config.max_steps).entered();

        for i in 0..self.config.max_steps {
            self.step();
            if let Some(factor) = self.config.realtime_factor.filter(|f| *f > 0.0) {
                let target = Duration::from_secs_f64((i + 1) as f64 * self.config.step_size / factor);
                if let Some(wait) = target.checked_sub(start.elapsed()) {
                    std::thread::sleep(wait);
                }
            }
        }

        let stats = RunStats {
            steps: self.config.max_steps,
            sim_time: self.timekeeper.sim_time(),
            wall_time: start.elapsed(),
        };
        tracing::info!(
            steps = stats.steps,
            sim_time = stats.sim_time,
            wall_ms = stats.wall_time.as_millis() as u64,
            "run finished"
        );
        stats
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn timekeeper(&self) -> &Timekeeper {
        &self.timekeeper
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn shutdown(self) -> TeardownReport {
        self.world.close()
    }
}
