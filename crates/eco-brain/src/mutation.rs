//! Mutation operators for decision networks.
//!
//! Mutation is the only source of behavioural change: offspring inherit a
//! perturbed copy of their parent's brain and nothing is ever trained.

use crate::network::DecisionNetwork;
use eco_core::MutationConfig;
use rand::Rng;

#[derive(Debug, Clone, Default)]
pub struct Mutator {
    config: MutationConfig,
}

impl Mutator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MutationConfig {
        &self.config
    }

    /// Mutate a network in place, returning how many parameters changed
    pub fn mutate<R: Rng + ?Sized>(&self, network: &mut DecisionNetwork, rng: &mut R) -> usize {
        network.perturb(self.config.rate, self.config.magnitude, rng)
    }

    /// Apply `times` independent mutation rounds
    pub fn mutate_times<R: Rng + ?Sized>(
        &self,
        network: &mut DecisionNetwork,
        times: u32,
        rng: &mut R,
    ) -> usize {
        (0..times).map(|_| self.mutate(network, rng)).sum()
    }

    /// Deep copy of `parent` with one round of mutation applied
    pub fn offspring<R: Rng + ?Sized>(&self, parent: &DecisionNetwork, rng: &mut R) -> DecisionNetwork {
        let mut child = parent.clone();
        self.mutate(&mut child, rng);
        child
    }
}
