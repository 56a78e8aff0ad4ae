//! Core type definitions for the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Points and directions in world space. Agents live on the surface of a
/// sphere centred on the origin.
pub type Position = glam::Vec3;

/// Unique identifier for an agent instance. Ids are handed out in creation
/// order and never reused within one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-species constants. Every species-dependent behaviour reads one of
/// these tables instead of branching on the species directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesTraits {
    /// Distance covered per time-unit at full network confidence
    pub base_speed: f32,
    /// Body radius, used by presentation layers
    pub size: f32,
    /// Hidden layer width of the decision network; `None` for brainless species
    pub hidden_size: Option<usize>,
    /// Whether the species flees predators and forages when hungry
    pub prey_like: bool,
    /// Species this one can eat
    pub diet: &'static [Species],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Plant,
    Herbivore,
    Carnivore,
    Humanoid,
}

const PLANT: SpeciesTraits = SpeciesTraits {
    base_speed: 0.0,
    size: 0.8,
    hidden_size: None,
    prey_like: false,
    diet: &[],
};

const HERBIVORE: SpeciesTraits = SpeciesTraits {
    base_speed: 0.6,
    size: 1.0,
    hidden_size: Some(8),
    prey_like: true,
    diet: &[Species::Plant],
};

const CARNIVORE: SpeciesTraits = SpeciesTraits {
    base_speed: 0.75,
    size: 1.3,
    hidden_size: Some(8),
    prey_like: false,
    diet: &[Species::Herbivore, Species::Humanoid],
};

const HUMANOID: SpeciesTraits = SpeciesTraits {
    base_speed: 0.55,
    size: 1.1,
    hidden_size: Some(12),
    prey_like: true,
    diet: &[Species::Plant, Species::Herbivore],
};

impl Species {
    pub const ALL: [Species; 4] = [
        Species::Plant,
        Species::Herbivore,
        Species::Carnivore,
        Species::Humanoid,
    ];

    pub fn traits(self) -> &'static SpeciesTraits {
        match self {
            Species::Plant => &PLANT,
            Species::Herbivore => &HERBIVORE,
            Species::Carnivore => &CARNIVORE,
            Species::Humanoid => &HUMANOID,
        }
    }

    pub fn has_brain(self) -> bool {
        self.traits().hidden_size.is_some()
    }

    /// Predation matrix lookup
    pub fn can_eat(self, other: Species) -> bool {
        self.traits().diet.contains(&other)
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::Plant => "plant",
            Species::Herbivore => "herbivore",
            Species::Carnivore => "carnivore",
            Species::Humanoid => "humanoid",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Species {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Species::ALL
            .into_iter()
            .find(|species| species.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::Validation(format!("unknown species '{}'", s)))
    }
}

/// Lifecycle of an agent: `Alive -> Decaying -> Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LifeState {
    Alive,
    /// Dead but still present in the world; `timer` counts time since death
    Decaying { timer: f32 },
    /// Dropped from the world during cleanup
    Removed,
}

impl LifeState {
    pub fn is_alive(&self) -> bool {
        matches!(self, LifeState::Alive)
    }

    pub fn is_decaying(&self) -> bool {
        matches!(self, LifeState::Decaying { .. })
    }
}

/// Why an agent left the `Alive` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Starvation,
    Injury,
    OldAge,
    Eaten,
    Killed,
}
