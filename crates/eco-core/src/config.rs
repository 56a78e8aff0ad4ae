//! Configuration types for the simulation.

use crate::{Error, Species};
use serde::{Deserialize, Serialize};

/// Founder counts spawned when a world is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialPopulation {
    pub plant: usize,
    pub herbivore: usize,
    pub carnivore: usize,
    pub humanoid: usize,
}

impl InitialPopulation {
    pub fn count(&self, species: Species) -> usize {
        match species {
            Species::Plant => self.plant,
            Species::Herbivore => self.herbivore,
            Species::Carnivore => self.carnivore,
            Species::Humanoid => self.humanoid,
        }
    }

    /// A population with no founders, for scripted setups
    pub fn empty() -> Self {
        Self {
            plant: 0,
            herbivore: 0,
            carnivore: 0,
            humanoid: 0,
        }
    }
}

impl Default for InitialPopulation {
    fn default() -> Self {
        Self {
            plant: 120,
            herbivore: 40,
            carnivore: 10,
            humanoid: 12,
        }
    }
}

/// World geometry and population bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Radius of the sphere every agent lives on
    pub radius: f32,
    /// Edge length of a spatial index cell
    pub cell_size: f32,
    /// Founders spawned at world creation
    pub initial_population: InitialPopulation,
    /// Reproduction stops once the master collection reaches this size
    pub max_population: Option<usize>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            radius: 100.0,
            cell_size: 20.0,
            initial_population: InitialPopulation::default(),
            max_population: Some(3000),
        }
    }
}

/// Energy budget. Rates are per time-unit of tick delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Starting energy for spawned agents
    pub initial_energy: f32,
    /// Starting health for spawned agents and offspring
    pub initial_health: f32,
    /// Starting energy for offspring
    pub offspring_energy: f32,
    /// Basal metabolic cost paid by every living agent
    pub basal_cost: f32,
    /// Energy spent per unit of distance moved
    pub move_cost_per_unit: f32,
    /// Passive gain for plants
    pub photosynthesis_rate: f32,
    /// Energy gained by a predator per meal
    pub eat_bonus: f32,
    /// Energy the parent pays to reproduce
    pub reproduce_cost: f32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial_energy: 80.0,
            initial_health: 100.0,
            offspring_energy: 50.0,
            basal_cost: 0.15,
            move_cost_per_unit: 0.05,
            photosynthesis_rate: 0.3,
            eat_bonus: 65.0,
            reproduce_cost: 30.0,
        }
    }
}

/// Ageing, death, and reproduction thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Agents older than this die
    pub max_age: f32,
    /// Time a corpse stays in the world before removal
    pub decay_duration: f32,
    /// Time that must pass between reproductions
    pub reproduce_cooldown: f32,
    pub reproduce_min_energy: f32,
    pub reproduce_min_health: f32,
    /// Maximum distance between a parent and its newborn
    pub offspring_offset: f32,
}

impl LifecycleConfig {
    pub fn validate(&self) -> crate::Result<()> {
        let offset = self.offspring_offset;
        if !(offset.is_finite() && offset >= 0.0) {
            return Err(Error::Validation(format!(
                "offspring offset must be a non-negative number, got {}",
                offset
            )));
        }
        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_age: 800.0,
            decay_duration: 60.0,
            reproduce_cooldown: 40.0,
            reproduce_min_energy: 70.0,
            reproduce_min_health: 50.0,
            offspring_offset: 4.0,
        }
    }
}

/// Perception and interaction distances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensingConfig {
    /// Targets beyond this distance contribute nothing to the sensing vector
    pub sensing_radius: f32,
    /// Prey-like agents flee predators closer than this
    pub panic_distance: f32,
    /// Below this energy agents go looking for food
    pub hunger_threshold: f32,
    /// Predators eat targets closer than this
    pub collision_distance: f32,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            sensing_radius: 40.0,
            panic_distance: 15.0,
            hunger_threshold: 50.0,
            collision_distance: 3.0,
        }
    }
}

/// Brain mutation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Probability that any single weight or bias is perturbed
    pub rate: f32,
    /// Perturbations are drawn uniformly from `[-magnitude, magnitude]`
    pub magnitude: f32,
}

impl MutationConfig {
    /// Rate must be a probability and magnitude a finite non-negative spread
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.rate) {
            return Err(Error::Validation(format!(
                "mutation rate must be within [0, 1], got {}",
                self.rate
            )));
        }
        if !(self.magnitude.is_finite() && self.magnitude >= 0.0) {
            return Err(Error::Validation(format!(
                "mutation magnitude must be a non-negative number, got {}",
                self.magnitude
            )));
        }
        Ok(())
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            rate: 0.1,
            magnitude: 0.25,
        }
    }
}

/// Full simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of ticks for batch runs
    pub num_ticks: u64,
    /// Delta time per tick for batch runs
    pub tick_delta: f32,
    /// Ticks between population metric events
    pub metrics_interval: u64,
    pub world: WorldConfig,
    pub energy: EnergyConfig,
    pub lifecycle: LifecycleConfig,
    pub sensing: SensingConfig,
    pub mutation: MutationConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_ticks: 5_000,
            tick_delta: 1.0,
            metrics_interval: 100,
            world: WorldConfig::default(),
            energy: EnergyConfig::default(),
            lifecycle: LifecycleConfig::default(),
            sensing: SensingConfig::default(),
            mutation: MutationConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse a configuration from JSON. Missing sections are not filled in.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject values the engine cannot run with. Cell size is checked by the
    /// spatial index itself.
    pub fn validate(&self) -> crate::Result<()> {
        let radius = self.world.radius;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::Validation(format!(
                "world radius must be positive, got {}",
                radius
            )));
        }
        self.lifecycle.validate()?;
        self.mutation.validate()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Wall-clock period of one tick
    pub frame_millis: u64,
    /// Multiplier applied to the frame delta
    pub time_scale: f32,
    pub start_paused: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            frame_millis: 50,
            time_scale: 1.0,
            start_paused: false,
        }
    }
}
