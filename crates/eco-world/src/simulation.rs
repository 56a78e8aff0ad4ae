//! Simulation engine: owns every agent and advances the world one tick at a time.

use crate::agent::Agent;
use crate::snapshot::{AgentExport, AgentSnapshot, WorldExport};
use crate::spatial::SpatialIndex;
use crate::sphere::random_surface_point;
use eco_brain::Mutator;
use eco_core::{
    AgentId, DeathCause, Error, LifeState, PopulationStats, Position, Result, SimulationConfig,
    Species,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, event, info, instrument, trace, Level};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub struct Simulation {
    pub(crate) config: SimulationConfig,
    /// Master collection. Iteration is in id order, which keeps every pass
    /// deterministic for a given seed.
    pub(crate) agents: BTreeMap<AgentId, Agent>,
    index: SpatialIndex,
    pub(crate) mutator: Mutator,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) next_id: u64,
    tick: u64,
    elapsed: f32,
    // Lifetime counters for run summaries
    total_births: u64,
    total_deaths: u64,
    total_meals: u64,
}

/// An agent that stopped living during a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Death {
    pub id: AgentId,
    pub species: Species,
    pub cause: DeathCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predation {
    pub predator: AgentId,
    pub prey: AgentId,
}

/// Everything that happened during one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub births: Vec<AgentId>,
    pub deaths: Vec<Death>,
    pub predations: Vec<Predation>,
    /// Final state of agents dropped by the cleanup pass
    pub removed: Vec<AgentSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub total_births: u64,
    pub total_deaths: u64,
    pub total_meals: u64,
    pub final_stats: PopulationStats,
}

impl Simulation {
    /// Create a world seeded from `config.seed` and spawn the founders
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }

    /// Create a world driven by an explicit random source
    pub fn with_rng(config: SimulationConfig, rng: ChaCha8Rng) -> Result<Self> {
        let mut sim = Self::empty(config, rng)?;

        for species in Species::ALL {
            for _ in 0..sim.config.world.initial_population.count(species) {
                sim.spawn_random(species)?;
            }
        }

        info!(
            event = "world_created",
            seed = sim.config.seed,
            radius = sim.config.world.radius,
            population = sim.agents.len(),
            "World created"
        );

        Ok(sim)
    }

    fn empty(config: SimulationConfig, rng: ChaCha8Rng) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            index: SpatialIndex::new(config.world.cell_size)?,
            mutator: Mutator::new(config.mutation.clone()),
            config,
            agents: BTreeMap::new(),
            rng,
            next_id: 1,
            tick: 0,
            elapsed: 0.0,
            total_births: 0,
            total_deaths: 0,
            total_meals: 0,
        })
    }

    /// Rebuild a world from an export. Decaying agents restart their decay.
    pub fn restore(config: SimulationConfig, export: WorldExport) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut sim = Self::empty(config, rng)?;

        for record in export.agents {
            let agent = Agent::from_export(record, &sim.config)?;
            let id = agent.id();
            if sim.agents.insert(id, agent).is_some() {
                return Err(Error::Validation(format!("duplicate agent id {}", id)));
            }
        }

        sim.next_id = sim.agents.keys().next_back().map_or(1, |id| id.0 + 1);
        sim.tick = export.tick;
        sim.elapsed = export.elapsed;

        info!(
            event = "world_restored",
            tick = sim.tick,
            population = sim.agents.len(),
            "World restored from export"
        );

        Ok(sim)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of completed ticks
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulated time elapsed
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// All agents still in the world, in id order
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Place a new founder at `position`, projected onto the world surface
    pub fn spawn(&mut self, species: Species, position: Position) -> Result<AgentId> {
        let id = AgentId(self.next_id);
        let agent = Agent::spawn(id, species, position, &self.config, &mut self.rng)?;
        self.next_id += 1;
        self.agents.insert(id, agent);

        trace!(agent_id = %id, species = %species, tick = self.tick, "Agent spawned");
        Ok(id)
    }

    /// Spawn at a uniformly random point of the surface
    pub fn spawn_random(&mut self, species: Species) -> Result<AgentId> {
        let position = random_surface_point(&mut self.rng, self.config.world.radius);
        self.spawn(species, position)
    }

    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.agents.values().map(AgentSnapshot::from).collect()
    }

    pub fn agent_snapshot(&self, id: AgentId) -> Result<AgentSnapshot> {
        self.agents
            .get(&id)
            .map(AgentSnapshot::from)
            .ok_or(Error::NotFound(id))
    }

    pub fn stats(&self) -> PopulationStats {
        let mut stats = PopulationStats::new(self.tick, self.elapsed);
        for agent in self.agents.values() {
            stats.record(
                agent.species(),
                agent.life_state(),
                agent.energy(),
                agent.health(),
                agent.generation(),
            );
        }
        stats
    }

    pub fn export(&self) -> WorldExport {
        WorldExport {
            exported_at: chrono::Utc::now(),
            tick: self.tick,
            elapsed: self.elapsed,
            agents: self.agents.values().map(AgentExport::from).collect(),
        }
    }

    /// Run `config.num_ticks` ticks of `config.tick_delta` each
    #[instrument(skip(self), fields(num_ticks = self.config.num_ticks))]
    pub fn run(&mut self) -> Result<RunSummary> {
        let delta = self.config.tick_delta;
        if !(delta.is_finite() && delta >= 0.0) {
            return Err(Error::Validation(format!(
                "tick delta must be a non-negative number, got {}",
                delta
            )));
        }

        info!("Starting simulation for {} ticks", self.config.num_ticks);

        for tick in 0..self.config.num_ticks {
            self.tick(delta);

            if tick % 1000 == 0 {
                info!(
                    "Tick {}/{}: {} agents in world",
                    tick,
                    self.config.num_ticks,
                    self.agents.len()
                );
            }
        }

        let summary = RunSummary {
            ticks: self.tick,
            total_births: self.total_births,
            total_deaths: self.total_deaths,
            total_meals: self.total_meals,
            final_stats: self.stats(),
        };
        self.emit_run_summary(&summary);

        Ok(summary)
    }

    /// Advance the world by `delta` time-units.
    ///
    /// A zero delta is a paused frame and leaves the world untouched. Negative
    /// or non-finite deltas are treated as zero.
    pub fn tick(&mut self, delta: f32) -> TickReport {
        if !(delta.is_finite() && delta > 0.0) {
            return TickReport {
                tick: self.tick,
                ..Default::default()
            };
        }

        let mut report = TickReport::default();

        // 1. Rebuild the index from living agents only
        self.rebuild_index();

        // 2. Update pass against the shared snapshot
        report.deaths = self.update_pass(delta);

        // 3. Reproduction, children join once the pass is over
        report.births = self.reproduction_pass();

        // 4. Predation
        self.interaction_pass(&mut report);

        // 5. Cleanup of expired corpses
        report.removed = self.cleanup_pass();

        self.tick += 1;
        self.elapsed += delta;
        self.total_births += report.births.len() as u64;
        self.total_deaths += report.deaths.len() as u64;
        self.total_meals += report.predations.len() as u64;
        report.tick = self.tick;

        let interval = self.config.metrics_interval;
        if interval > 0 && self.tick % interval == 0 {
            self.emit_population_metrics();
        }

        report
    }

    fn rebuild_index(&mut self) {
        self.index.rebuild(
            self.agents
                .values()
                .filter(|agent| agent.is_alive())
                .map(Agent::index_entry),
        );
    }

    fn update_pass(&mut self, delta: f32) -> Vec<Death> {
        #[cfg(feature = "parallel")]
        let deaths = self.update_pass_parallel(delta);
        #[cfg(not(feature = "parallel"))]
        let deaths = self.update_pass_serial(delta);
        deaths
    }

    #[cfg_attr(feature = "parallel", allow(dead_code))]
    fn update_pass_serial(&mut self, delta: f32) -> Vec<Death> {
        let index = &self.index;
        let config = &self.config;
        let tick = self.tick;

        self.agents
            .values_mut()
            .filter_map(|agent| update_agent(agent, delta, index, config, tick))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn update_pass_parallel(&mut self, delta: f32) -> Vec<Death> {
        let index = &self.index;
        let config = &self.config;
        let tick = self.tick;

        // Collecting into a Vec keeps results in id order
        self.agents
            .values_mut()
            .collect::<Vec<_>>()
            .into_par_iter()
            .filter_map(|agent| update_agent(agent, delta, index, config, tick))
            .collect()
    }

    fn reproduction_pass(&mut self) -> Vec<AgentId> {
        let parents: Vec<AgentId> = self
            .agents
            .values()
            .filter(|agent| agent.can_reproduce(&self.config.lifecycle))
            .map(Agent::id)
            .collect();

        let mut pending: Vec<Agent> = Vec::new();

        for parent_id in parents {
            if let Some(cap) = self.config.world.max_population {
                if self.agents.len() + pending.len() >= cap {
                    debug!(tick = self.tick, cap, "Population cap reached, skipping reproduction");
                    break;
                }
            }

            let child_id = AgentId(self.next_id);
            let Some(parent) = self.agents.get_mut(&parent_id) else {
                continue;
            };

            match parent.reproduce(child_id, &self.config, &self.mutator, &mut self.rng) {
                Ok(child) => {
                    self.next_id += 1;
                    trace!(
                        event = "agent_birth",
                        agent_id = %child_id,
                        parent_id = %parent_id,
                        species = %child.species(),
                        generation = child.generation(),
                        tick = self.tick,
                        "Agent born"
                    );
                    pending.push(child);
                }
                Err(e) => debug!(agent_id = %parent_id, error = %e, "Reproduction skipped"),
            }
        }

        let births = pending.iter().map(Agent::id).collect();
        for child in pending {
            self.agents.insert(child.id(), child);
        }
        births
    }

    /// Each living animal eats the nearest valid target in collision range,
    /// at most once per pass. Ties go to the target found first by the index
    /// query. Newborns are not indexed yet, so they can eat but cannot be
    /// eaten this tick.
    fn interaction_pass(&mut self, report: &mut TickReport) {
        let collision = self.config.sensing.collision_distance;
        let bonus = self.config.energy.eat_bonus;

        let predators: Vec<AgentId> = self
            .agents
            .values()
            .filter(|agent| agent.is_alive() && agent.species() != Species::Plant)
            .map(Agent::id)
            .collect();

        for predator_id in predators {
            let Some(predator) = self.agents.get(&predator_id) else {
                continue;
            };
            // Eaten earlier in this pass
            if !predator.is_alive() {
                continue;
            }

            let species = predator.species();
            let position = predator.position();

            let target = self
                .index
                .query(position)
                .into_iter()
                .filter(|entry| entry.id != predator_id && species.can_eat(entry.species))
                .filter_map(|entry| {
                    let prey = self.agents.get(&entry.id)?;
                    let distance = position.distance(prey.position());
                    (prey.is_alive() && distance <= collision).then_some((entry.id, distance))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let Some((prey_id, _)) = target else {
                continue;
            };
            let Some(mut prey) = self.agents.remove(&prey_id) else {
                continue;
            };

            if let Some(predator) = self.agents.get_mut(&predator_id) {
                predator.eat(&mut prey, bonus);
            }

            trace!(
                event = "predation",
                predator_id = %predator_id,
                prey_id = %prey_id,
                predator_species = %species,
                prey_species = %prey.species(),
                tick = self.tick,
                "Agent eaten"
            );

            report.predations.push(Predation {
                predator: predator_id,
                prey: prey_id,
            });
            report.deaths.push(Death {
                id: prey_id,
                species: prey.species(),
                cause: DeathCause::Eaten,
            });
            self.agents.insert(prey_id, prey);
        }
    }

    fn cleanup_pass(&mut self) -> Vec<AgentSnapshot> {
        let decay_duration = self.config.lifecycle.decay_duration;
        let expired: Vec<AgentId> = self
            .agents
            .values()
            .filter(|agent| agent.decay_timer().is_some_and(|timer| timer > decay_duration))
            .map(Agent::id)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(mut agent) = self.agents.remove(&id) {
                agent.life_state = LifeState::Removed;
                debug!(
                    event = "agent_removed",
                    agent_id = %id,
                    species = %agent.species(),
                    age = agent.age(),
                    generation = agent.generation(),
                    tick = self.tick,
                    "Corpse removed"
                );
                removed.push(AgentSnapshot::from(&agent));
            }
        }
        removed
    }

    fn emit_population_metrics(&self) {
        let stats = self.stats();

        info!(
            event = "population_metrics",
            tick = self.tick,
            elapsed = self.elapsed,
            total_alive = stats.total_alive(),
            plants = stats.alive_count(Species::Plant),
            herbivores = stats.alive_count(Species::Herbivore),
            carnivores = stats.alive_count(Species::Carnivore),
            humanoids = stats.alive_count(Species::Humanoid),
            decaying = stats.decaying,
            mean_energy = stats.mean_energy,
            mean_health = stats.mean_health,
            max_generation = stats.max_generation,
            "Population metrics snapshot"
        );

        for species in Species::ALL {
            event!(
                Level::INFO,
                gauge_name = "population_alive",
                gauge_value = stats.alive_count(species),
                species = %species,
                tick = self.tick,
                "Population gauge"
            );
        }

        event!(
            Level::INFO,
            gauge_name = "mean_energy",
            gauge_value = stats.mean_energy,
            tick = self.tick,
            "Average energy"
        );
    }

    fn emit_run_summary(&self, summary: &RunSummary) {
        let stats = &summary.final_stats;

        info!(
            event = "run_summary",
            ticks = summary.ticks,
            elapsed = self.elapsed,
            total_births = summary.total_births,
            total_deaths = summary.total_deaths,
            total_meals = summary.total_meals,
            survivors = stats.total_alive(),
            max_generation = stats.max_generation,
            "Run complete"
        );

        event!(
            Level::INFO,
            gauge_name = "final_population",
            gauge_value = stats.total_alive(),
            "Final population gauge"
        );
    }
}

fn update_agent(
    agent: &mut Agent,
    delta: f32,
    index: &SpatialIndex,
    config: &SimulationConfig,
    tick: u64,
) -> Option<Death> {
    let cause = agent.update(delta, index, config)?;
    debug!(
        event = "agent_death",
        agent_id = %agent.id(),
        species = %agent.species(),
        cause = ?cause,
        age = agent.age(),
        generation = agent.generation(),
        tick,
        "Agent died"
    );
    Some(Death {
        id: agent.id(),
        species: agent.species(),
        cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eco_core::InitialPopulation;

    fn empty_config() -> SimulationConfig {
        let mut config = SimulationConfig {
            seed: 42,
            ..Default::default()
        };
        config.world.initial_population = InitialPopulation::empty();
        config
    }

    #[test]
    fn test_simulation_creation() {
        let config = SimulationConfig {
            seed: 42,
            ..Default::default()
        };
        let sim = Simulation::new(config).unwrap();

        let stats = sim.stats();
        assert_eq!(sim.len(), 182);
        assert_eq!(stats.alive_count(Species::Plant), 120);
        assert_eq!(stats.alive_count(Species::Carnivore), 10);
        assert!(sim
            .agents()
            .all(|agent| (agent.position().length() - 100.0).abs() < 1e-2));
    }

    #[test]
    fn test_invalid_world_rejected() {
        let mut config = empty_config();
        config.world.radius = 0.0;
        assert!(matches!(Simulation::new(config), Err(Error::Validation(_))));

        let mut config = empty_config();
        config.world.cell_size = -1.0;
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn test_unsamplable_ranges_rejected() {
        let mut config = empty_config();
        config.lifecycle.offspring_offset = -1.0;
        assert!(matches!(Simulation::new(config), Err(Error::Validation(_))));

        let mut config = empty_config();
        config.lifecycle.offspring_offset = f32::NAN;
        assert!(matches!(Simulation::new(config), Err(Error::Validation(_))));

        let mut config = empty_config();
        config.mutation.magnitude = -0.25;
        assert!(matches!(Simulation::new(config), Err(Error::Validation(_))));

        let mut config = empty_config();
        config.mutation.rate = 2.0;
        assert!(matches!(Simulation::new(config), Err(Error::Validation(_))));

        let mut config = empty_config();
        config.mutation.magnitude = f32::NAN;
        let export = Simulation::new(empty_config()).unwrap().export();
        assert!(matches!(
            Simulation::restore(config, export),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_zero_offspring_offset_is_allowed() {
        let mut config = empty_config();
        config.lifecycle.offspring_offset = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        let id = sim.spawn(Species::Plant, Position::new(0.0, 100.0, 0.0)).unwrap();
        sim.heal(id, 100.0).unwrap();

        let report = sim.tick(41.0);

        assert_eq!(report.births.len(), 1);
        let child = sim.agent(report.births[0]).unwrap();
        assert!((child.position() - Position::new(0.0, 100.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_spawn_assigns_fresh_ids() {
        let mut sim = Simulation::new(empty_config()).unwrap();
        let a = sim.spawn(Species::Plant, Position::new(0.0, 100.0, 0.0)).unwrap();
        let b = sim.spawn(Species::Herbivore, Position::new(0.0, 0.0, 5.0)).unwrap();

        assert_ne!(a, b);
        assert_eq!(sim.len(), 2);
        assert!((sim.agent(b).unwrap().position().z - 100.0).abs() < 1e-3);
        assert!(sim.spawn(Species::Plant, Position::ZERO).is_err());
        assert_eq!(sim.len(), 2);
    }

    #[test]
    fn test_zero_delta_is_paused() {
        let config = SimulationConfig {
            seed: 1,
            ..Default::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        let before = sim.snapshot();

        let report = sim.tick(0.0);

        assert_eq!(report.tick, 0);
        assert!(report.births.is_empty() && report.deaths.is_empty());
        assert_eq!(sim.tick_count(), 0);
        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn test_tick_advances_time() {
        let mut sim = Simulation::new(empty_config()).unwrap();
        sim.spawn(Species::Plant, Position::new(0.0, 100.0, 0.0)).unwrap();

        sim.tick(0.5);
        sim.tick(0.5);

        assert_eq!(sim.tick_count(), 2);
        assert!((sim.elapsed() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_population_cap_blocks_births() {
        let mut config = empty_config();
        config.world.max_population = Some(1);
        let mut sim = Simulation::new(config).unwrap();
        let id = sim.spawn(Species::Plant, Position::new(0.0, 100.0, 0.0)).unwrap();
        sim.heal(id, 100.0).unwrap();

        let report = sim.tick(41.0);

        assert!(report.births.is_empty());
        assert_eq!(sim.len(), 1);
    }

    #[test]
    fn test_plants_reproduce_without_brains() {
        let mut sim = Simulation::new(empty_config()).unwrap();
        let id = sim.spawn(Species::Plant, Position::new(0.0, 100.0, 0.0)).unwrap();
        sim.heal(id, 100.0).unwrap();

        let report = sim.tick(41.0);

        assert_eq!(report.births.len(), 1);
        let child = sim.agent(report.births[0]).unwrap();
        assert_eq!(child.generation(), 2);
        assert!(child.brain().is_none());
    }

    #[test]
    fn test_run_rejects_negative_delta() {
        let mut config = empty_config();
        config.tick_delta = -1.0;
        let mut sim = Simulation::new(config).unwrap();
        assert!(sim.run().is_err());
    }

    #[test]
    fn test_run_summary() {
        let mut config = SimulationConfig {
            seed: 9,
            num_ticks: 20,
            ..Default::default()
        };
        config.world.initial_population = InitialPopulation {
            plant: 30,
            herbivore: 10,
            carnivore: 2,
            humanoid: 2,
        };
        let mut sim = Simulation::new(config).unwrap();

        let summary = sim.run().unwrap();

        assert_eq!(summary.ticks, 20);
        assert_eq!(summary.final_stats.tick, 20);
        assert!(summary.final_stats.total_alive() <= sim.len());
    }

    #[test]
    fn test_restore_rejects_duplicate_ids() {
        let mut sim = Simulation::new(empty_config()).unwrap();
        sim.spawn(Species::Plant, Position::new(0.0, 100.0, 0.0)).unwrap();

        let mut export = sim.export();
        export.agents.push(export.agents[0].clone());

        assert!(matches!(
            Simulation::restore(empty_config(), export),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_restore_continues_id_sequence() {
        let mut sim = Simulation::new(empty_config()).unwrap();
        sim.spawn(Species::Plant, Position::new(0.0, 100.0, 0.0)).unwrap();
        let last = sim.spawn(Species::Plant, Position::new(100.0, 0.0, 0.0)).unwrap();

        let mut restored = Simulation::restore(empty_config(), sim.export()).unwrap();
        let next = restored
            .spawn(Species::Plant, Position::new(0.0, 0.0, 100.0))
            .unwrap();

        assert!(next > last);
        assert_eq!(restored.len(), 3);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_update_matches_serial() {
        let mut config = SimulationConfig {
            seed: 13,
            ..Default::default()
        };
        config.world.initial_population = InitialPopulation {
            plant: 60,
            herbivore: 20,
            carnivore: 5,
            humanoid: 6,
        };
        let mut parallel = Simulation::new(config.clone()).unwrap();
        let mut serial = Simulation::new(config).unwrap();

        for _ in 0..200 {
            parallel.rebuild_index();
            serial.rebuild_index();

            let parallel_deaths = parallel.update_pass_parallel(1.0);
            let serial_deaths = serial.update_pass_serial(1.0);

            assert_eq!(parallel_deaths, serial_deaths);
            assert_eq!(parallel.snapshot(), serial.snapshot());
        }

        // Whole ticks on the active path stay deterministic
        for _ in 0..50 {
            let a = parallel.tick(1.0);
            let b = serial.tick(1.0);
            assert_eq!(a.births, b.births);
            assert_eq!(a.predations, b.predations);
        }
        assert_eq!(parallel.snapshot(), serial.snapshot());
    }
}
