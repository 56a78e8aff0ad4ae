//! Validation for decision networks loaded from outside the process.

use crate::network::DecisionNetwork;
use eco_core::{Error, Result};

/// Validate that a network is well-formed: non-empty layers, consistent
/// matrix shapes, and only finite parameters.
pub fn validate_network(network: &DecisionNetwork) -> Result<()> {
    if network.input_size == 0 || network.hidden_size == 0 || network.output_size == 0 {
        return Err(Error::Validation(format!(
            "network layers must be non-empty (got {}x{}x{})",
            network.input_size, network.hidden_size, network.output_size
        )));
    }

    validate_matrix(
        "weightsInputHidden",
        &network.weights_input_hidden,
        network.input_size,
        network.hidden_size,
    )?;
    validate_matrix(
        "weightsHiddenOutput",
        &network.weights_hidden_output,
        network.hidden_size,
        network.output_size,
    )?;
    validate_vector("biasHidden", &network.bias_hidden, network.hidden_size)?;
    validate_vector("biasOutput", &network.bias_output, network.output_size)?;

    Ok(())
}

fn validate_matrix(name: &str, matrix: &[Vec<f32>], rows: usize, cols: usize) -> Result<()> {
    if matrix.len() != rows {
        return Err(Error::Validation(format!(
            "{} has {} rows, expected {}",
            name,
            matrix.len(),
            rows
        )));
    }

    for (idx, row) in matrix.iter().enumerate() {
        validate_vector(&format!("{}[{}]", name, idx), row, cols)?;
    }

    Ok(())
}

fn validate_vector(name: &str, values: &[f32], len: usize) -> Result<()> {
    if values.len() != len {
        return Err(Error::Validation(format!(
            "{} has {} entries, expected {}",
            name,
            values.len(),
            len
        )));
    }

    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(Error::Validation(format!(
            "{} entry {} is not finite",
            name, pos
        )));
    }

    Ok(())
}
