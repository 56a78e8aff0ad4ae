//! Decision networks for organism brains.
//!
//! Each animal carries a small fixed-topology feed-forward network that turns
//! a sensing vector into a movement intent. Networks are:
//! - Pure: output depends only on parameters and input
//! - Evolvable: offspring receive a mutated deep copy of the parent's network
//! - Portable: exportable to JSON and compact bytes, validated on import

pub mod network;
pub mod mutation;
pub mod validation;
pub mod export;

pub use network::{DecisionNetwork, INPUT_SIZE, OUTPUT_SIZE};
pub use mutation::Mutator;
pub use validation::validate_network;
pub use export::{Architecture, BrainExport};
pub use eco_core::MutationConfig;
