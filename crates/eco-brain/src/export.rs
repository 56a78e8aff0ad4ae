//! Portable brain export format.

use crate::network::DecisionNetwork;
use eco_core::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub inputs: usize,
    pub hidden: usize,
    pub outputs: usize,
}

/// JSON shape used by export tooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainExport {
    pub architecture: Architecture,
    pub weights_input_hidden: Vec<Vec<f32>>,
    pub weights_hidden_output: Vec<Vec<f32>>,
    pub bias_hidden: Vec<f32>,
    pub bias_output: Vec<f32>,
}

impl From<&DecisionNetwork> for BrainExport {
    fn from(network: &DecisionNetwork) -> Self {
        Self {
            architecture: Architecture {
                inputs: network.input_size,
                hidden: network.hidden_size,
                outputs: network.output_size,
            },
            weights_input_hidden: network.weights_input_hidden.clone(),
            weights_hidden_output: network.weights_hidden_output.clone(),
            bias_hidden: network.bias_hidden.clone(),
            bias_output: network.bias_output.clone(),
        }
    }
}

impl TryFrom<BrainExport> for DecisionNetwork {
    type Error = Error;

    fn try_from(export: BrainExport) -> Result<Self> {
        let network = DecisionNetwork::from_parts(
            export.weights_input_hidden,
            export.weights_hidden_output,
            export.bias_hidden,
            export.bias_output,
        )?;

        let declared = export.architecture;
        if declared.inputs != network.input_size()
            || declared.hidden != network.hidden_size()
            || declared.outputs != network.output_size()
        {
            return Err(Error::Validation(format!(
                "declared architecture {}x{}x{} does not match parameters {}x{}x{}",
                declared.inputs,
                declared.hidden,
                declared.outputs,
                network.input_size(),
                network.hidden_size(),
                network.output_size()
            )));
        }

        Ok(network)
    }
}

impl BrainExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
