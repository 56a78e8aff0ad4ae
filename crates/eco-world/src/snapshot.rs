//! Read-only snapshots and the portable export format.

use crate::agent::{Agent, MAX_VITAL};
use crate::sphere::project_to_surface;
use crate::terrain::TerrainHeight;
use chrono::{DateTime, Utc};
use eco_brain::{BrainExport, DecisionNetwork, INPUT_SIZE, OUTPUT_SIZE};
use eco_core::{AgentId, Error, LifeState, Position, Result, SimulationConfig, Species};
use serde::{Deserialize, Serialize};

/// Everything presentation and stats consumers may read about an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub species: Species,
    pub position: Position,
    pub energy: f32,
    pub health: f32,
    pub age: f32,
    pub generation: u32,
    pub life_state: LifeState,
}

impl From<&Agent> for AgentSnapshot {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            species: agent.species,
            position: agent.position,
            energy: agent.energy,
            health: agent.health,
            age: agent.age,
            generation: agent.generation,
            life_state: agent.life_state,
        }
    }
}

impl AgentSnapshot {
    /// Position lifted onto the terrain, for renderers
    pub fn surface_position(&self, terrain: &dyn TerrainHeight, radius: f32) -> Position {
        let up = self.position.normalize_or_zero();
        up * (radius + terrain.height(self.position))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Position> for ExportPosition {
    fn from(position: Position) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
        }
    }
}

impl From<ExportPosition> for Position {
    fn from(position: ExportPosition) -> Self {
        Position::new(position.x, position.y, position.z)
    }
}

/// Serializable agent record used by export tooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentExport {
    pub id: AgentId,
    pub species: Species,
    pub position: ExportPosition,
    pub energy: f32,
    pub health: f32,
    pub age: f32,
    pub generation: u32,
    pub dead: bool,
    pub brain: Option<BrainExport>,
}

impl From<&Agent> for AgentExport {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            species: agent.species,
            position: agent.position.into(),
            energy: agent.energy,
            health: agent.health,
            age: agent.age,
            generation: agent.generation,
            dead: !agent.is_alive(),
            brain: agent.brain.as_ref().map(BrainExport::from),
        }
    }
}

/// A whole world as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldExport {
    pub exported_at: DateTime<Utc>,
    pub tick: u64,
    pub elapsed: f32,
    pub agents: Vec<AgentExport>,
}

impl WorldExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn check_vital(name: &str, value: f32) -> Result<f32> {
    if value.is_finite() && (0.0..=MAX_VITAL).contains(&value) {
        Ok(value)
    } else {
        Err(Error::Validation(format!("{} out of range: {}", name, value)))
    }
}

impl Agent {
    /// Rebuild an agent from an export record. Dead agents come back as
    /// freshly decaying corpses.
    pub fn from_export(export: AgentExport, config: &SimulationConfig) -> Result<Self> {
        let id = export.id;
        let position = project_to_surface(export.position.into(), config.world.radius)
            .ok_or_else(|| Error::Validation(format!("agent {} has no valid position", id)))?;

        if !(export.age.is_finite() && export.age >= 0.0) {
            return Err(Error::Validation(format!("agent {} has invalid age", id)));
        }
        if export.generation == 0 {
            return Err(Error::Validation(format!("agent {} has generation 0", id)));
        }

        let brain = match (export.species.has_brain(), export.brain) {
            (true, Some(brain)) => {
                let network = DecisionNetwork::try_from(brain)?;
                if network.input_size() != INPUT_SIZE || network.output_size() != OUTPUT_SIZE {
                    return Err(Error::Validation(format!(
                        "agent {} brain must map {} inputs to {} outputs",
                        id, INPUT_SIZE, OUTPUT_SIZE
                    )));
                }
                Some(network)
            }
            (false, None) => None,
            (true, None) => {
                return Err(Error::Validation(format!(
                    "{} agent {} is missing its brain",
                    export.species, id
                )))
            }
            (false, Some(_)) => {
                return Err(Error::Validation(format!(
                    "{} agent {} cannot carry a brain",
                    export.species, id
                )))
            }
        };

        Ok(Self {
            id,
            species: export.species,
            position,
            velocity: Position::ZERO,
            age: export.age,
            energy: check_vital("energy", export.energy)?,
            health: check_vital("health", export.health)?,
            generation: export.generation,
            life_state: if export.dead {
                LifeState::Decaying { timer: 0.0 }
            } else {
                LifeState::Alive
            },
            reproduce_cooldown: 0.0,
            brain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::FlatTerrain;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn herbivore(rng: &mut ChaCha8Rng) -> Agent {
        Agent::spawn(
            AgentId(7),
            Species::Herbivore,
            Position::new(0.0, 0.0, 100.0),
            &SimulationConfig::default(),
            rng,
        )
        .unwrap()
    }

    #[test]
    fn test_export_json_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let agent = herbivore(&mut rng);
        let value = serde_json::to_value(AgentExport::from(&agent)).unwrap();

        assert_eq!(value["id"], 7);
        assert_eq!(value["species"], "herbivore");
        assert_eq!(value["position"]["z"], 100.0);
        assert_eq!(value["dead"], false);
        assert_eq!(value["generation"], 1);
        assert_eq!(value["brain"]["architecture"]["hidden"], 8);
    }

    #[test]
    fn test_export_round_trip_preserves_brain() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let config = SimulationConfig::default();
        let agent = herbivore(&mut rng);

        let json = serde_json::to_string(&AgentExport::from(&agent)).unwrap();
        let restored = Agent::from_export(serde_json::from_str(&json).unwrap(), &config).unwrap();

        let input = [0.8, 1.0, 0.1, 0.6, 0.0];
        assert_eq!(
            agent.brain().unwrap().predict(&input),
            restored.brain().unwrap().predict(&input)
        );
        assert_eq!(restored.id(), agent.id());
        assert_eq!(restored.species(), Species::Herbivore);
        assert!(restored.is_alive());
    }

    #[test]
    fn test_import_rejects_inconsistent_records() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let config = SimulationConfig::default();
        let agent = herbivore(&mut rng);

        let mut missing_brain = AgentExport::from(&agent);
        missing_brain.brain = None;
        assert!(Agent::from_export(missing_brain, &config).is_err());

        let mut plant_with_brain = AgentExport::from(&agent);
        plant_with_brain.species = Species::Plant;
        assert!(Agent::from_export(plant_with_brain, &config).is_err());

        let mut overfed = AgentExport::from(&agent);
        overfed.energy = 250.0;
        assert!(Agent::from_export(overfed, &config).is_err());

        let mut nowhere = AgentExport::from(&agent);
        nowhere.position = ExportPosition { x: 0.0, y: 0.0, z: 0.0 };
        assert!(Agent::from_export(nowhere, &config).is_err());
    }

    #[test]
    fn test_dead_import_decays() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut export = AgentExport::from(&herbivore(&mut rng));
        export.dead = true;

        let agent = Agent::from_export(export, &SimulationConfig::default()).unwrap();
        assert_eq!(agent.decay_timer(), Some(0.0));
    }

    #[test]
    fn test_surface_position_uses_terrain() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let snapshot = AgentSnapshot::from(&herbivore(&mut rng));

        let flat = snapshot.surface_position(&FlatTerrain, 100.0);
        assert!((flat.z - 100.0).abs() < 1e-3);

        let hills = |p: Position| if p.z > 0.0 { 5.0 } else { 0.0 };
        let lifted = snapshot.surface_position(&hills, 100.0);
        assert!((lifted.z - 105.0).abs() < 1e-3);
    }
}
