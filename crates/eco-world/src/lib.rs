//! Ecosystem simulation engine.
//!
//! Agents live on the surface of a sphere, sense their neighbours through a
//! uniform-grid index, move, eat, reproduce, and die. `Simulation` owns every
//! agent and advances the world one tick at a time.

pub mod sphere;
pub mod spatial;
pub mod agent;
pub mod simulation;
pub mod interventions;
pub mod snapshot;
pub mod terrain;

pub use agent::{Agent, Senses, Target, MAX_VITAL};
pub use spatial::{SpatialEntry, SpatialIndex};
pub use simulation::{Death, Predation, RunSummary, Simulation, TickReport};
pub use interventions::{RebalanceReport, MAX_MUTATION_ROUNDS};
pub use snapshot::{AgentExport, AgentSnapshot, ExportPosition, WorldExport};
pub use terrain::{FlatTerrain, TerrainHeight};
