//! Terrain height oracle used when lifting agents for presentation.
//!
//! The simulation itself only ever works on the bare sphere; terrain is a
//! read-only concern of whoever renders the world.

use eco_core::Position;

pub trait TerrainHeight {
    /// Height of the ground above the base sphere at `position`
    fn height(&self, position: Position) -> f32;
}

/// Featureless world: the ground is the sphere itself
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain;

impl TerrainHeight for FlatTerrain {
    fn height(&self, _position: Position) -> f32 {
        0.0
    }
}

impl<F> TerrainHeight for F
where
    F: Fn(Position) -> f32,
{
    fn height(&self, position: Position) -> f32 {
        self(position)
    }
}
