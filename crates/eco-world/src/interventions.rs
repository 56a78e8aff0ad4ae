//! Direct interventions on the world ("god powers").
//!
//! Every operation goes through the agent's own state-machine methods so the
//! vital clamps and life-state rules hold no matter who calls. Unknown or
//! removed ids fail with `Error::NotFound`. Interventions are meant to run
//! between ticks.

use crate::simulation::Simulation;
use eco_core::{AgentId, DeathCause, Error, Result, Species};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Upper bound on mutation rounds applied by one call
pub const MAX_MUTATION_ROUNDS: u32 = 1_000;

/// Agents touched by a rebalance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub spawned: Vec<AgentId>,
    pub killed: Vec<AgentId>,
}

fn logged<T>(action: &'static str, id: AgentId, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => info!(event = "intervention", action, agent_id = %id, "Intervention applied"),
        Err(e) => warn!(
            event = "intervention_failed",
            action,
            agent_id = %id,
            error = %e,
            "Intervention rejected"
        ),
    }
    result
}

impl Simulation {
    /// Add `amount` to both energy and health
    pub fn heal(&mut self, id: AgentId, amount: f32) -> Result<()> {
        let result = match self.agents.get_mut(&id) {
            Some(agent) => agent.heal(amount),
            None => Err(Error::NotFound(id)),
        };
        logged("heal", id, result)
    }

    /// Remove `amount` of energy and health. Returns the cause if the agent
    /// died.
    pub fn damage(&mut self, id: AgentId, amount: f32) -> Result<Option<DeathCause>> {
        let result = match self.agents.get_mut(&id) {
            Some(agent) => agent.damage(amount),
            None => Err(Error::NotFound(id)),
        };
        logged("damage", id, result)
    }

    pub fn kill(&mut self, id: AgentId) -> Result<()> {
        let result = match self.agents.get_mut(&id) {
            Some(agent) => agent.kill(),
            None => Err(Error::NotFound(id)),
        };
        logged("kill", id, result)
    }

    /// Return a decaying agent to life with full vitals
    pub fn resurrect(&mut self, id: AgentId) -> Result<()> {
        let result = match self.agents.get_mut(&id) {
            Some(agent) => agent.resurrect(),
            None => Err(Error::NotFound(id)),
        };
        logged("resurrect", id, result)
    }

    /// Apply `times` rounds of mutation to an agent's brain. Returns the
    /// number of parameters perturbed.
    pub fn mutate_brain(&mut self, id: AgentId, times: u32) -> Result<usize> {
        let result = match self.agents.get_mut(&id) {
            Some(_) if times > MAX_MUTATION_ROUNDS => Err(Error::Validation(format!(
                "at most {} mutation rounds per call, got {}",
                MAX_MUTATION_ROUNDS, times
            ))),
            Some(agent) => agent.mutate_brain(times, &self.mutator, &mut self.rng),
            None => Err(Error::NotFound(id)),
        };
        logged("mutate", id, result)
    }

    /// Copy a living agent, brain included, next to the original. The copy
    /// keeps the original's generation.
    pub fn clone_agent(&mut self, id: AgentId) -> Result<AgentId> {
        let new_id = AgentId(self.next_id);
        let result = match self.agents.get(&id) {
            Some(agent) => agent.duplicate(new_id, &self.config, &mut self.rng),
            None => Err(Error::NotFound(id)),
        };

        let copy = logged("clone", id, result)?;
        self.next_id += 1;
        self.agents.insert(new_id, copy);
        Ok(new_id)
    }

    /// Spawn or kill agents until each listed species has the target number
    /// of living members. Surplus agents are killed oldest first; new agents
    /// appear at random surface points. Unlisted species are left alone.
    ///
    /// Fails without touching the world if the spawns would push the
    /// population past `max_population`.
    pub fn rebalance(&mut self, targets: &BTreeMap<Species, usize>) -> Result<RebalanceReport> {
        if let Some(cap) = self.config.world.max_population {
            let spawns: usize = targets
                .iter()
                .map(|(&species, &target)| {
                    let living = self
                        .agents
                        .values()
                        .filter(|agent| agent.is_alive() && agent.species() == species)
                        .count();
                    target.saturating_sub(living)
                })
                .fold(0, usize::saturating_add);
            let projected = self.agents.len().saturating_add(spawns);
            if projected > cap {
                warn!(event = "rebalance_rejected", projected, cap, "Rebalance over population cap");
                return Err(Error::Validation(format!(
                    "rebalance would grow the population to {}, above the cap of {}",
                    projected, cap
                )));
            }
        }

        let mut report = RebalanceReport::default();

        for (&species, &target) in targets {
            let mut living: Vec<(f32, AgentId)> = self
                .agents
                .values()
                .filter(|agent| agent.is_alive() && agent.species() == species)
                .map(|agent| (agent.age(), agent.id()))
                .collect();

            if living.len() > target {
                // Oldest first, lowest id breaks ties
                living.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
                for &(_, id) in &living[..living.len() - target] {
                    self.kill(id)?;
                    report.killed.push(id);
                }
            } else {
                for _ in living.len()..target {
                    report.spawned.push(self.spawn_random(species)?);
                }
            }
        }

        info!(
            event = "rebalance",
            spawned = report.spawned.len(),
            killed = report.killed.len(),
            tick = self.tick_count(),
            "Population rebalanced"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eco_core::{InitialPopulation, LifeState, Position, SimulationConfig};

    fn world() -> Simulation {
        let mut config = SimulationConfig {
            seed: 42,
            ..Default::default()
        };
        config.world.initial_population = InitialPopulation::empty();
        Simulation::new(config).unwrap()
    }

    fn north() -> Position {
        Position::new(0.0, 100.0, 0.0)
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut sim = world();
        let ghost = AgentId(999);

        assert!(matches!(sim.heal(ghost, 5.0), Err(Error::NotFound(_))));
        assert!(matches!(sim.damage(ghost, 5.0), Err(Error::NotFound(_))));
        assert!(matches!(sim.kill(ghost), Err(Error::NotFound(_))));
        assert!(matches!(sim.resurrect(ghost), Err(Error::NotFound(_))));
        assert!(matches!(sim.mutate_brain(ghost, 1), Err(Error::NotFound(_))));
        assert!(matches!(sim.clone_agent(ghost), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_kill_then_resurrect() {
        let mut sim = world();
        let id = sim.spawn(Species::Herbivore, north()).unwrap();

        sim.kill(id).unwrap();
        assert!(sim.agent(id).unwrap().life_state().is_decaying());
        assert!(matches!(sim.kill(id), Err(Error::InvalidState(_))));
        assert!(matches!(sim.heal(id, 10.0), Err(Error::InvalidState(_))));

        sim.resurrect(id).unwrap();
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.life_state(), LifeState::Alive);
        assert_eq!(agent.energy(), 100.0);
        assert_eq!(agent.health(), 100.0);
        assert_eq!(agent.age(), 0.0);
        assert!(matches!(sim.resurrect(id), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_removed_agents_are_gone() {
        let mut sim = world();
        let id = sim.spawn(Species::Plant, north()).unwrap();
        sim.kill(id).unwrap();
        sim.tick(61.0);

        assert!(sim.agent(id).is_none());
        assert!(matches!(sim.resurrect(id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_damage_clamps_and_kills() {
        let mut sim = world();
        let id = sim.spawn(Species::Carnivore, north()).unwrap();

        assert_eq!(sim.damage(id, 30.0).unwrap(), None);
        assert!((sim.agent(id).unwrap().health() - 70.0).abs() < 1e-4);
        assert!((sim.agent(id).unwrap().energy() - 50.0).abs() < 1e-4);

        let starving = sim.spawn(Species::Herbivore, north()).unwrap();
        assert_eq!(sim.damage(starving, 90.0).unwrap(), Some(DeathCause::Starvation));
        assert!(sim.agent(starving).unwrap().health() > 0.0);

        assert_eq!(sim.damage(id, 500.0).unwrap(), Some(DeathCause::Injury));
        assert_eq!(sim.agent(id).unwrap().health(), 0.0);
        assert!(!sim.agent(id).unwrap().is_alive());

        assert!(matches!(sim.heal(id, f32::NAN), Err(Error::Validation(_))));
    }

    #[test]
    fn test_mutate_brain_needs_brain() {
        let mut sim = world();
        let plant = sim.spawn(Species::Plant, north()).unwrap();
        let humanoid = sim.spawn(Species::Humanoid, north()).unwrap();

        assert!(matches!(sim.mutate_brain(plant, 3), Err(Error::InvalidState(_))));

        let before = sim.agent(humanoid).unwrap().brain().cloned();
        sim.mutate_brain(humanoid, 5).unwrap();
        assert_ne!(sim.agent(humanoid).unwrap().brain().cloned(), before);
    }

    #[test]
    fn test_clone_agent_copies_brain() {
        let mut sim = world();
        let id = sim.spawn(Species::Herbivore, north()).unwrap();

        let copy_id = sim.clone_agent(id).unwrap();

        let original = sim.agent(id).unwrap();
        let copy = sim.agent(copy_id).unwrap();
        assert_ne!(copy_id, id);
        assert_eq!(copy.brain(), original.brain());
        assert_eq!(copy.generation(), original.generation());
        assert!((copy.position().length() - 100.0).abs() < 1e-2);

        sim.kill(id).unwrap();
        assert!(matches!(sim.clone_agent(id), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_rebalance_reaches_targets() {
        let mut sim = world();
        for _ in 0..5 {
            sim.spawn_random(Species::Herbivore).unwrap();
        }

        let targets = BTreeMap::from([(Species::Herbivore, 2), (Species::Plant, 4)]);
        let report = sim.rebalance(&targets).unwrap();

        assert_eq!(report.killed.len(), 3);
        assert_eq!(report.spawned.len(), 4);

        let stats = sim.stats();
        assert_eq!(stats.alive_count(Species::Herbivore), 2);
        assert_eq!(stats.alive_count(Species::Plant), 4);
        assert_eq!(stats.decaying, 3);

        let again = sim.rebalance(&targets).unwrap();
        assert_eq!(again, RebalanceReport::default());
    }

    #[test]
    fn test_rebalance_respects_population_cap() {
        let mut sim = world();
        sim.config.world.max_population = Some(10);
        for _ in 0..4 {
            sim.spawn_random(Species::Plant).unwrap();
        }

        let too_many = BTreeMap::from([(Species::Plant, 8), (Species::Herbivore, 3)]);
        assert!(matches!(sim.rebalance(&too_many), Err(Error::Validation(_))));
        assert_eq!(sim.len(), 4);

        let huge = BTreeMap::from([(Species::Plant, usize::MAX), (Species::Humanoid, usize::MAX)]);
        assert!(sim.rebalance(&huge).is_err());

        let fits = BTreeMap::from([(Species::Plant, 8), (Species::Herbivore, 2)]);
        assert_eq!(sim.rebalance(&fits).unwrap().spawned.len(), 6);
        assert_eq!(sim.len(), 10);
    }

    #[test]
    fn test_mutation_rounds_are_bounded() {
        let mut sim = world();
        let id = sim.spawn(Species::Humanoid, north()).unwrap();
        let before = sim.agent(id).unwrap().brain().cloned();

        let result = sim.mutate_brain(id, MAX_MUTATION_ROUNDS + 1);

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(sim.agent(id).unwrap().brain().cloned(), before);
        assert!(sim.mutate_brain(id, MAX_MUTATION_ROUNDS).is_ok());
    }
}
