//! Agent state, sensing, decision making, and lifecycle.

use crate::spatial::{SpatialEntry, SpatialIndex};
use crate::sphere::{project_to_surface, random_unit, tangent_component};
use eco_brain::{DecisionNetwork, Mutator};
use eco_core::{
    AgentId, DeathCause, Error, LifeState, LifecycleConfig, Position, Result, SensingConfig,
    SimulationConfig, Species,
};
use rand::Rng;

/// Upper bound for energy and health
pub const MAX_VITAL: f32 = 100.0;

/// An organism in the simulation.
///
/// Fields are only mutated through methods that re-establish the invariants:
/// energy and health stay in `[0, MAX_VITAL]` and the position stays on the
/// world sphere.
#[derive(Debug, Clone)]
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) species: Species,
    pub(crate) position: Position,
    pub(crate) velocity: Position,
    pub(crate) age: f32,
    pub(crate) energy: f32,
    pub(crate) health: f32,
    pub(crate) generation: u32,
    pub(crate) life_state: LifeState,
    pub(crate) reproduce_cooldown: f32,
    pub(crate) brain: Option<DecisionNetwork>,
}

/// Nearest agent of some role, as seen by the sensing scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub id: AgentId,
    pub position: Position,
    pub distance: f32,
}

/// Result of scanning the neighborhood
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Senses {
    /// Nearest agent this agent can eat
    pub food: Option<Target>,
    /// Nearest agent that can eat this agent
    pub predator: Option<Target>,
    /// Nearest edible animal
    pub prey: Option<Target>,
}

impl Senses {
    /// Build the network input: own vitals followed by proximity signals that
    /// rise from 0 at the sensing radius to 1 at contact.
    pub fn to_input(&self, energy: f32, health: f32, sensing_radius: f32) -> [f32; 5] {
        let proximity = |target: Option<Target>| match target {
            Some(t) => 1.0 - (t.distance / sensing_radius).min(1.0),
            None => 0.0,
        };

        [
            energy / MAX_VITAL,
            health / MAX_VITAL,
            proximity(self.food),
            proximity(self.predator),
            proximity(self.prey),
        ]
    }
}

fn keep_nearest(slot: &mut Option<Target>, candidate: Target) {
    match slot {
        Some(current) if current.distance <= candidate.distance => {}
        _ => *slot = Some(candidate),
    }
}

impl Agent {
    /// Create a founder with full starting vitals. Animals receive a freshly
    /// initialised brain sized for their species.
    pub fn spawn<R: Rng + ?Sized>(
        id: AgentId,
        species: Species,
        position: Position,
        config: &SimulationConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let position = project_to_surface(position, config.world.radius).ok_or_else(|| {
            Error::Validation(format!("cannot place agent at {:?}", position))
        })?;

        let brain = species
            .traits()
            .hidden_size
            .map(|hidden| DecisionNetwork::for_hidden_size(hidden, rng));

        Ok(Self {
            id,
            species,
            position,
            velocity: Position::ZERO,
            age: 0.0,
            energy: clamp_vital(config.energy.initial_energy),
            health: clamp_vital(config.energy.initial_health),
            generation: 1,
            life_state: LifeState::Alive,
            reproduce_cooldown: 0.0,
            brain,
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn velocity(&self) -> Position {
        self.velocity
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn life_state(&self) -> LifeState {
        self.life_state
    }

    pub fn reproduce_cooldown(&self) -> f32 {
        self.reproduce_cooldown
    }

    pub fn brain(&self) -> Option<&DecisionNetwork> {
        self.brain.as_ref()
    }

    pub fn is_alive(&self) -> bool {
        self.life_state.is_alive()
    }

    /// Time since death, if decaying
    pub fn decay_timer(&self) -> Option<f32> {
        match self.life_state {
            LifeState::Decaying { timer } => Some(timer),
            _ => None,
        }
    }

    pub fn index_entry(&self) -> SpatialEntry {
        SpatialEntry {
            id: self.id,
            species: self.species,
            position: self.position,
        }
    }

    pub(crate) fn add_energy(&mut self, amount: f32) {
        self.energy = clamp_vital(self.energy + amount);
    }

    pub(crate) fn add_health(&mut self, amount: f32) {
        self.health = clamp_vital(self.health + amount);
    }

    fn move_to(&mut self, target: Position, radius: f32) {
        if let Some(position) = project_to_surface(target, radius) {
            self.position = position;
        }
    }

    /// Scan neighbors for the nearest food, predator, and prey. Ties keep the
    /// first agent found.
    pub fn sense(&self, neighbors: &[SpatialEntry]) -> Senses {
        let mut senses = Senses::default();

        for neighbor in neighbors.iter().filter(|n| n.id != self.id) {
            let target = Target {
                id: neighbor.id,
                position: neighbor.position,
                distance: self.position.distance(neighbor.position),
            };

            if self.species.can_eat(neighbor.species) {
                keep_nearest(&mut senses.food, target);
                if neighbor.species.has_brain() {
                    keep_nearest(&mut senses.prey, target);
                }
            }
            if neighbor.species.can_eat(self.species) {
                keep_nearest(&mut senses.predator, target);
            }
        }

        senses
    }

    /// Decide a velocity for this tick. Survival rules pick the direction when
    /// they apply; otherwise the brain's raw output is followed. The brain
    /// always sets the pace.
    pub fn think(&self, neighbors: &[SpatialEntry], config: &SensingConfig) -> Position {
        let Some(brain) = &self.brain else {
            return Position::ZERO;
        };

        let senses = self.sense(neighbors);
        let input = senses.to_input(self.energy, self.health, config.sensing_radius);
        let output = brain.predict(&input);
        let intent = Position::new(
            output.first().copied().unwrap_or(0.0),
            output.get(1).copied().unwrap_or(0.0),
            output.get(2).copied().unwrap_or(0.0),
        );

        let direction = self.steer(&senses, intent, config);
        let heading = tangent_component(direction, self.position).normalize_or_zero();
        let confidence = (intent.x + intent.y + intent.z).abs() / 3.0;

        heading * confidence * self.species.traits().base_speed
    }

    fn steer(&self, senses: &Senses, intent: Position, config: &SensingConfig) -> Position {
        let traits = self.species.traits();
        let hungry = self.energy < config.hunger_threshold;

        if traits.prey_like {
            if let Some(predator) = senses.predator {
                if predator.distance <= config.panic_distance {
                    return self.position - predator.position;
                }
            }
            if hungry {
                if let Some(food) = senses.food {
                    return food.position - self.position;
                }
            }
        } else if hungry {
            if let Some(prey) = senses.prey {
                return prey.position - self.position;
            }
        }

        intent
    }

    /// Advance this agent by `delta` time-units. Returns the cause of death
    /// if the agent died during this update.
    pub fn update(
        &mut self,
        delta: f32,
        index: &SpatialIndex,
        config: &SimulationConfig,
    ) -> Option<DeathCause> {
        match &mut self.life_state {
            LifeState::Alive => {}
            LifeState::Decaying { timer } => {
                *timer += delta;
                return None;
            }
            LifeState::Removed => return None,
        }

        self.age += delta;
        self.reproduce_cooldown += delta;

        if self.species.has_brain() {
            let neighbors = index.query(self.position);
            self.velocity = self.think(&neighbors, &config.sensing);

            let step = self.velocity * delta;
            self.move_to(self.position + step, config.world.radius);
            self.add_energy(-step.length() * config.energy.move_cost_per_unit);
        } else {
            self.velocity = Position::ZERO;
            self.add_energy(config.energy.photosynthesis_rate * delta);
        }

        self.add_energy(-config.energy.basal_cost * delta);

        let cause = self.death_cause(&config.lifecycle)?;
        self.die();
        Some(cause)
    }

    fn death_cause(&self, lifecycle: &LifecycleConfig) -> Option<DeathCause> {
        if self.energy <= 0.0 {
            Some(DeathCause::Starvation)
        } else if self.health <= 0.0 {
            Some(DeathCause::Injury)
        } else if self.age > lifecycle.max_age {
            Some(DeathCause::OldAge)
        } else {
            None
        }
    }

    fn die(&mut self) {
        self.life_state = LifeState::Decaying { timer: 0.0 };
        self.velocity = Position::ZERO;
    }

    /// Consume `target`. The caller is responsible for predation validity.
    pub fn eat(&mut self, target: &mut Agent, bonus: f32) {
        debug_assert!(self.species.can_eat(target.species));
        self.add_energy(bonus);
        target.die();
    }

    pub fn can_reproduce(&self, lifecycle: &LifecycleConfig) -> bool {
        self.is_alive()
            && self.energy > lifecycle.reproduce_min_energy
            && self.health > lifecycle.reproduce_min_health
            && self.reproduce_cooldown > lifecycle.reproduce_cooldown
    }

    /// Produce a single offspring carrying a mutated copy of this agent's
    /// brain. Fails without side effects if the agent is not eligible.
    pub fn reproduce<R: Rng + ?Sized>(
        &mut self,
        child_id: AgentId,
        config: &SimulationConfig,
        mutator: &Mutator,
        rng: &mut R,
    ) -> Result<Agent> {
        if !self.can_reproduce(&config.lifecycle) {
            return Err(Error::InvalidState(format!(
                "agent {} is not eligible to reproduce",
                self.id
            )));
        }

        self.add_energy(-config.energy.reproduce_cost);
        self.reproduce_cooldown = 0.0;

        let brain = self.brain.as_ref().map(|brain| mutator.offspring(brain, rng));
        let position = self.nearby_position(config, rng);

        Ok(Agent {
            id: child_id,
            species: self.species,
            position,
            velocity: Position::ZERO,
            age: 0.0,
            energy: clamp_vital(config.energy.offspring_energy),
            health: clamp_vital(config.energy.initial_health),
            generation: self.generation + 1,
            life_state: LifeState::Alive,
            reproduce_cooldown: 0.0,
            brain,
        })
    }

    /// Random point within `offspring_offset` of this agent, on the surface
    fn nearby_position<R: Rng + ?Sized>(&self, config: &SimulationConfig, rng: &mut R) -> Position {
        let offset = random_unit(rng) * rng.gen_range(0.0..=config.lifecycle.offspring_offset);
        project_to_surface(self.position + offset, config.world.radius).unwrap_or(self.position)
    }

    fn require_alive(&self, action: &str) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {} agent {}: not alive",
                action, self.id
            )))
        }
    }

    /// Restore energy and health by `amount`
    pub fn heal(&mut self, amount: f32) -> Result<()> {
        check_amount(amount)?;
        self.require_alive("heal")?;
        self.add_energy(amount);
        self.add_health(amount);
        Ok(())
    }

    /// Drain energy and health by `amount`. Running out of health takes
    /// precedence over running out of energy when both hit zero.
    pub fn damage(&mut self, amount: f32) -> Result<Option<DeathCause>> {
        check_amount(amount)?;
        self.require_alive("damage")?;
        self.add_energy(-amount);
        self.add_health(-amount);

        let cause = if self.health <= 0.0 {
            DeathCause::Injury
        } else if self.energy <= 0.0 {
            DeathCause::Starvation
        } else {
            return Ok(None);
        };
        self.die();
        Ok(Some(cause))
    }

    pub fn kill(&mut self) -> Result<()> {
        self.require_alive("kill")?;
        self.die();
        Ok(())
    }

    /// Bring a decaying agent back with full vitals and a fresh lifespan
    pub fn resurrect(&mut self) -> Result<()> {
        if !self.life_state.is_decaying() {
            return Err(Error::InvalidState(format!(
                "cannot resurrect agent {}: not decaying",
                self.id
            )));
        }

        self.life_state = LifeState::Alive;
        self.energy = MAX_VITAL;
        self.health = MAX_VITAL;
        self.age = 0.0;
        self.reproduce_cooldown = 0.0;
        Ok(())
    }

    pub fn mutate_brain<R: Rng + ?Sized>(
        &mut self,
        times: u32,
        mutator: &Mutator,
        rng: &mut R,
    ) -> Result<usize> {
        let id = self.id;
        let brain = self.brain.as_mut().ok_or_else(|| {
            Error::InvalidState(format!("agent {} has no brain to mutate", id))
        })?;
        Ok(mutator.mutate_times(brain, times, rng))
    }

    /// Exact copy under a new id, placed next to the original
    pub fn duplicate<R: Rng + ?Sized>(
        &self,
        new_id: AgentId,
        config: &SimulationConfig,
        rng: &mut R,
    ) -> Result<Agent> {
        self.require_alive("clone")?;
        let mut copy = self.clone();
        copy.id = new_id;
        copy.velocity = Position::ZERO;
        copy.position = self.nearby_position(config, rng);
        Ok(copy)
    }
}

fn clamp_vital(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_VITAL)
    }
}

fn check_amount(amount: f32) -> Result<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "amount must be a non-negative number, got {}",
            amount
        )))
    }
}
