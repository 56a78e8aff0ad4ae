//! Fixed-topology feed-forward decision network.

use crate::validation::validate_network;
use eco_core::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of the sensing vector fed to every brain
pub const INPUT_SIZE: usize = 5;
/// Length of the movement-intent vector produced by every brain
pub const OUTPUT_SIZE: usize = 3;

/// Biases start uniformly inside `[-BIAS_INIT_RANGE, BIAS_INIT_RANGE]`
const BIAS_INIT_RANGE: f32 = 0.1;

/// One hidden layer, tanh activations on both layers.
///
/// `weights_input_hidden[i][j]` connects input `i` to hidden unit `j`;
/// `weights_hidden_output[j][k]` connects hidden unit `j` to output `k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionNetwork {
    pub(crate) input_size: usize,
    pub(crate) hidden_size: usize,
    pub(crate) output_size: usize,
    pub(crate) weights_input_hidden: Vec<Vec<f32>>,
    pub(crate) weights_hidden_output: Vec<Vec<f32>>,
    pub(crate) bias_hidden: Vec<f32>,
    pub(crate) bias_output: Vec<f32>,
}

impl DecisionNetwork {
    /// Create a randomly initialised network. Each weight matrix is drawn
    /// from its own Xavier-uniform bound.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            input_size,
            hidden_size,
            output_size,
            weights_input_hidden: xavier_matrix(input_size, hidden_size, rng),
            weights_hidden_output: xavier_matrix(hidden_size, output_size, rng),
            bias_hidden: small_biases(hidden_size, rng),
            bias_output: small_biases(output_size, rng),
        }
    }

    /// Brain with the standard sensing/intent shape and the given hidden width
    pub fn for_hidden_size<R: Rng + ?Sized>(hidden_size: usize, rng: &mut R) -> Self {
        Self::new(INPUT_SIZE, hidden_size, OUTPUT_SIZE, rng)
    }

    /// Assemble a network from raw parameters, rejecting malformed shapes or
    /// non-finite values.
    pub fn from_parts(
        weights_input_hidden: Vec<Vec<f32>>,
        weights_hidden_output: Vec<Vec<f32>>,
        bias_hidden: Vec<f32>,
        bias_output: Vec<f32>,
    ) -> Result<Self> {
        let network = Self {
            input_size: weights_input_hidden.len(),
            hidden_size: bias_hidden.len(),
            output_size: bias_output.len(),
            weights_input_hidden,
            weights_hidden_output,
            bias_hidden,
            bias_output,
        };
        validate_network(&network)?;
        Ok(network)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Total number of weights and biases
    pub fn parameter_count(&self) -> usize {
        self.input_size * self.hidden_size
            + self.hidden_size * self.output_size
            + self.hidden_size
            + self.output_size
    }

    /// Forward pass. Missing trailing inputs read as zero.
    pub fn predict(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.input_size);

        let hidden: Vec<f32> = (0..self.hidden_size)
            .map(|j| {
                let sum: f32 = input
                    .iter()
                    .zip(&self.weights_input_hidden)
                    .map(|(x, row)| x * row[j])
                    .sum();
                (self.bias_hidden[j] + sum).tanh()
            })
            .collect();

        (0..self.output_size)
            .map(|k| {
                let sum: f32 = hidden
                    .iter()
                    .zip(&self.weights_hidden_output)
                    .map(|(h, row)| h * row[k])
                    .sum();
                (self.bias_output[k] + sum).tanh()
            })
            .collect()
    }

    /// Perturb each parameter with probability `rate` by the default
    /// magnitude. Returns the number of parameters touched.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f32, rng: &mut R) -> usize {
        self.perturb(rate, eco_core::MutationConfig::default().magnitude, rng)
    }

    /// Perturb each parameter with probability `rate` by a value drawn
    /// uniformly from `[-magnitude, magnitude]`.
    pub fn perturb<R: Rng + ?Sized>(&mut self, rate: f32, magnitude: f32, rng: &mut R) -> usize {
        let mut touched = 0;
        let rows = self
            .weights_input_hidden
            .iter_mut()
            .chain(self.weights_hidden_output.iter_mut())
            .flat_map(|row| row.iter_mut());
        let params = rows
            .chain(self.bias_hidden.iter_mut())
            .chain(self.bias_output.iter_mut());

        for param in params {
            if rng.gen::<f32>() < rate {
                *param += rng.gen_range(-magnitude..=magnitude);
                touched += 1;
            }
        }

        touched
    }

    /// Serialize the network to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize and validate a network from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let network: Self = bincode::deserialize(bytes)?;
        validate_network(&network)?;
        Ok(network)
    }
}

fn xavier_matrix<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Vec<Vec<f32>> {
    let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    (0..fan_in)
        .map(|_| (0..fan_out).map(|_| rng.gen_range(-limit..=limit)).collect())
        .collect()
}

fn small_biases<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<f32> {
    (0..len)
        .map(|_| rng.gen_range(-BIAS_INIT_RANGE..=BIAS_INIT_RANGE))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn flat_params(network: &DecisionNetwork) -> Vec<f32> {
        network
            .weights_input_hidden
            .iter()
            .chain(&network.weights_hidden_output)
            .flatten()
            .chain(&network.bias_hidden)
            .chain(&network.bias_output)
            .copied()
            .collect()
    }

    #[test]
    fn test_construction_shapes() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let network = DecisionNetwork::for_hidden_size(8, &mut rng);

        assert_eq!(network.input_size(), INPUT_SIZE);
        assert_eq!(network.hidden_size(), 8);
        assert_eq!(network.output_size(), OUTPUT_SIZE);
        assert_eq!(network.weights_input_hidden.len(), 5);
        assert!(network.weights_input_hidden.iter().all(|row| row.len() == 8));
        assert_eq!(network.weights_hidden_output.len(), 8);
        assert!(network.weights_hidden_output.iter().all(|row| row.len() == 3));
        assert_eq!(network.parameter_count(), 5 * 8 + 8 * 3 + 8 + 3);
    }

    #[test]
    fn test_xavier_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let network = DecisionNetwork::for_hidden_size(12, &mut rng);

        let ih_limit = (6.0f32 / (5.0 + 12.0)).sqrt();
        let ho_limit = (6.0f32 / (12.0 + 3.0)).sqrt();
        assert!(network
            .weights_input_hidden
            .iter()
            .flatten()
            .all(|w| w.abs() <= ih_limit));
        assert!(network
            .weights_hidden_output
            .iter()
            .flatten()
            .all(|w| w.abs() <= ho_limit));
        assert!(network
            .bias_hidden
            .iter()
            .chain(&network.bias_output)
            .all(|b| b.abs() <= BIAS_INIT_RANGE));
    }

    #[test]
    fn test_predict_matches_manual_forward_pass() {
        let network = DecisionNetwork::from_parts(
            vec![vec![0.5, -0.5], vec![1.0, 0.0]],
            vec![vec![1.0], vec![-1.0]],
            vec![0.1, 0.0],
            vec![0.2],
        )
        .unwrap();

        let input = [0.4, 0.2];
        let h0 = (0.1f32 + 0.4 * 0.5 + 0.2 * 1.0).tanh();
        let h1 = (0.0f32 + 0.4 * -0.5 + 0.2 * 0.0).tanh();
        let expected = (0.2 + h0 - h1).tanh();

        let output = network.predict(&input);
        assert_eq!(output.len(), 1);
        assert!((output[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_predict_is_pure_and_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let network = DecisionNetwork::for_hidden_size(8, &mut rng);
        let input = [0.9, 0.1, 0.0, 1.0, 0.5];

        let first = network.predict(&input);
        let second = network.predict(&input);
        assert_eq!(first, second);
        assert!(first.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_mutate_zero_rate_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let original = DecisionNetwork::for_hidden_size(8, &mut rng);
        let mut mutated = original.clone();

        let touched = mutated.mutate(0.0, &mut rng);

        assert_eq!(touched, 0);
        let before: Vec<u32> = flat_params(&original).iter().map(|v| v.to_bits()).collect();
        let after: Vec<u32> = flat_params(&mutated).iter().map(|v| v.to_bits()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_mutate_full_rate_changes_most_parameters() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let original = DecisionNetwork::for_hidden_size(8, &mut rng);
        let mut mutated = original.clone();

        let touched = mutated.mutate(1.0, &mut rng);
        assert_eq!(touched, original.parameter_count());

        let changed = flat_params(&original)
            .iter()
            .zip(flat_params(&mutated))
            .filter(|(a, b)| a.to_bits() != b.to_bits())
            .count();
        assert!(changed > original.parameter_count() * 9 / 10);

        let max_delta = flat_params(&original)
            .iter()
            .zip(flat_params(&mutated))
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_delta <= 0.25 + 1e-6);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let parent = DecisionNetwork::for_hidden_size(8, &mut rng);
        let snapshot = parent.clone();
        let mut child = parent.clone();

        child.mutate(1.0, &mut rng);

        assert_eq!(parent, snapshot);
        assert_ne!(parent, child);
    }

    #[test]
    fn test_bytes_round_trip_preserves_predictions() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let network = DecisionNetwork::for_hidden_size(12, &mut rng);
        let bytes = network.to_bytes().unwrap();
        let restored = DecisionNetwork::from_bytes(&bytes).unwrap();

        let input = [0.3, 0.7, 0.0, 0.25, 1.0];
        assert_eq!(network.predict(&input), restored.predict(&input));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(DecisionNetwork::from_bytes(&[1, 2, 3]).is_err());
    }

    proptest! {
        #[test]
        fn predictions_stay_bounded_after_mutation(
            seed in any::<u64>(),
            rounds in 0u32..20,
            input in prop::array::uniform5(-10.0f32..10.0),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut network = DecisionNetwork::for_hidden_size(8, &mut rng);
            for _ in 0..rounds {
                network.perturb(0.5, 0.25, &mut rng);
            }

            let output = network.predict(&input);
            prop_assert_eq!(output.len(), OUTPUT_SIZE);
            prop_assert!(output.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
            prop_assert!(validate_network(&network).is_ok());
        }
    }
}
