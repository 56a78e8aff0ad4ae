//! Uniform-grid spatial index for approximate neighbor queries.
//!
//! Agents are bucketed by the cube of edge `cell_size` that contains them. A
//! query returns everything in the 3x3x3 block of cells around the query
//! point: every agent within one cell width along each axis is guaranteed to
//! be present, but agents further out may be missed and agents beyond the
//! caller's radius may be included. Callers that need an exact radius must
//! filter the result by distance.

use eco_core::{AgentId, Error, Position, Result, Species};
use std::collections::HashMap;

pub type CellKey = (i32, i32, i32);

/// Copy of the agent state that neighbor queries need. The index never
/// borrows agents, so it stays valid while agents are mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub id: AgentId,
    pub species: Species,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<SpatialEntry>>,
    len: usize,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::Validation(format!(
                "cell size must be positive, got {}",
                cell_size
            )));
        }

        Ok(Self {
            cell_size,
            cells: HashMap::new(),
            len: 0,
        })
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert world coordinates to cell coordinates
    #[inline]
    pub fn cell_key(&self, position: Position) -> CellKey {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
            (position.z / self.cell_size).floor() as i32,
        )
    }

    /// Empty every bucket. Buckets keep their allocations for the next rebuild.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.len = 0;
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        let key = self.cell_key(entry.position);
        self.cells.entry(key).or_default().push(entry);
        self.len += 1;
    }

    /// Clear and refill from `entries`
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = SpatialEntry>) {
        self.clear();
        for entry in entries {
            self.insert(entry);
        }
    }

    /// All entries in the 27 cells around `position`, in a fixed cell order
    /// and insertion order within each cell.
    pub fn query(&self, position: Position) -> Vec<SpatialEntry> {
        let (cx, cy, cz) = self.cell_key(position);
        let mut results = Vec::new();

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        results.extend_from_slice(bucket);
                    }
                }
            }
        }

        results
    }

    /// Number of entries currently indexed
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
