//! Population statistics for charts, stats panels, and run summaries.

use crate::{LifeState, Species};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate view of the world at one instant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationStats {
    pub tick: u64,
    /// Simulated time since the world was created
    pub elapsed: f32,
    /// Living agents per species
    pub alive: BTreeMap<Species, usize>,
    /// Corpses still awaiting removal
    pub decaying: usize,
    /// Mean energy over living agents
    pub mean_energy: f32,
    /// Mean health over living agents
    pub mean_health: f32,
    /// Deepest lineage among living agents
    pub max_generation: u32,
}

impl PopulationStats {
    pub fn new(tick: u64, elapsed: f32) -> Self {
        let alive = Species::ALL.into_iter().map(|species| (species, 0)).collect();
        Self {
            tick,
            elapsed,
            alive,
            ..Default::default()
        }
    }

    /// Fold one agent into the statistics
    pub fn record(
        &mut self,
        species: Species,
        life_state: LifeState,
        energy: f32,
        health: f32,
        generation: u32,
    ) {
        match life_state {
            LifeState::Alive => {}
            LifeState::Decaying { .. } => {
                self.decaying += 1;
                return;
            }
            LifeState::Removed => return,
        }

        let n = self.total_alive() as f32;
        let new_n = n + 1.0;

        // Incremental means
        self.mean_energy = (self.mean_energy * n + energy) / new_n;
        self.mean_health = (self.mean_health * n + health) / new_n;
        self.max_generation = self.max_generation.max(generation);

        *self.alive.entry(species).or_insert(0) += 1;
    }

    pub fn alive_count(&self, species: Species) -> usize {
        self.alive.get(&species).copied().unwrap_or(0)
    }

    pub fn total_alive(&self) -> usize {
        self.alive.values().sum()
    }
}
