use log::debug;
use rand::Rng;

use crate::config::StateDict;
use crate::core::error::{FfnError, TensorError};
use crate::core::types::Tensor;
use crate::layers::activation::{Activation, get_activation_fn};
use crate::layers::linear::Linear;
use crate::ops::glu::glu;

/// Gated Linear Unit feed-forward block (SwiGLU with the default activation)
///
/// The content and gate projections are fused into one [in, 2 * intermediate]
/// matrix. Its output is split along the last dimension, content first and gate second:
///
/// ```text
/// x → up_gate_proj → [content | gate] → content * act(gate) → down_proj
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Glu {
    in_features: usize,
    intermediate_features: usize,
    act_fn: Activation,
    up_gate_proj: Linear,
    down_proj: Linear,
}

impl Glu {
    pub const DEFAULT_ACTIVATION: &'static str = "silu";
    pub const DEFAULT_BIAS: bool = false;

    /// Build a GLU with freshly initialized projections
    ///
    /// # Errors
    /// - `FfnError::Activation` if `activation_fn` isn't a registered name
    /// - `FfnError::Tensor` if a width is zero or the fused width overflows
    pub fn new<R: Rng>(
        in_features: usize,
        intermediate_features: usize,
        activation_fn: &str,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self, FfnError> {
        let act_fn = get_activation_fn(activation_fn)?;
        let fused_features = intermediate_features
            .checked_mul(2)
            .ok_or(TensorError::WidthOverflow { what: "2 * intermediate_features" })?;
        let up_gate_proj = Linear::new(in_features, fused_features, bias, rng)?;
        let down_proj = Linear::new(intermediate_features, in_features, bias, rng)?;

        debug!(
            "Built GLU {} -> 2x{} -> {} ({}, bias: {})",
            in_features, intermediate_features, in_features, act_fn, bias
        );

        Ok(Self {
            in_features,
            intermediate_features,
            act_fn,
            up_gate_proj,
            down_proj,
        })
    }

    /// Build a GLU from an existing fused projection and down projection
    ///
    /// # Errors
    /// `TensorError::OddSplit` if the fused output width is odd,
    /// `TensorError::ShapeMismatch` if down_proj doesn't map intermediate → in
    pub fn from_projections(act_fn: Activation, up_gate_proj: Linear, down_proj: Linear) -> Result<Self, FfnError> {
        let in_features = up_gate_proj.in_features();
        let fused = up_gate_proj.out_features();
        if fused % 2 != 0 {
            return Err(TensorError::OddSplit {
                dim: fused,
                width: fused / 2,
            }
            .into());
        }
        let intermediate_features = fused / 2;
        if down_proj.in_features() != intermediate_features {
            return Err(TensorError::ShapeMismatch {
                expected: intermediate_features,
                actual: down_proj.in_features(),
            }
            .into());
        }
        if down_proj.out_features() != in_features {
            return Err(TensorError::ShapeMismatch {
                expected: in_features,
                actual: down_proj.out_features(),
            }
            .into());
        }
        Ok(Self {
            in_features,
            intermediate_features,
            act_fn,
            up_gate_proj,
            down_proj,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn intermediate_features(&self) -> usize {
        self.intermediate_features
    }

    pub fn activation(&self) -> Activation {
        self.act_fn
    }

    pub fn up_gate_proj(&self) -> &Linear {
        &self.up_gate_proj
    }

    pub fn down_proj(&self) -> &Linear {
        &self.down_proj
    }

    pub fn num_parameters(&self) -> usize {
        self.up_gate_proj.num_parameters() + self.down_proj.num_parameters()
    }

    pub fn named_parameters(&self) -> Vec<String> {
        let mut names = self.up_gate_proj.parameter_names("up_gate_proj");
        names.extend(self.down_proj.parameter_names("down_proj"));
        names
    }

    /// Replace all parameter values, leaving the layer untouched on failure
    pub fn load_state_dict(&mut self, dict: &StateDict) -> Result<(), FfnError> {
        let mut up_gate_proj = self.up_gate_proj.clone();
        let mut down_proj = self.down_proj.clone();
        up_gate_proj.load_state_dict("up_gate_proj", dict)?;
        down_proj.load_state_dict("down_proj", dict)?;
        self.up_gate_proj = up_gate_proj;
        self.down_proj = down_proj;
        Ok(())
    }

    pub fn state_dict(&self) -> StateDict {
        let mut dict = StateDict::new();
        self.up_gate_proj.export_state_dict("up_gate_proj", &mut dict);
        self.down_proj.export_state_dict("down_proj", &mut dict);
        dict
    }

    pub fn to_f16(&mut self) {
        self.up_gate_proj.to_f16();
        self.down_proj.to_f16();
    }

    /// down_proj(content * act(gate)), with [content | gate] = up_gate_proj(x)
    ///
    /// # Errors
    /// `TensorError::ShapeMismatch` if the trailing dimension of `x` isn't in_features
    pub fn forward(&self, x: &Tensor) -> Result<Tensor, TensorError> {
        let fused = self.up_gate_proj.forward(x)?;

        let mut gated = vec![0.0; fused.rows() * self.intermediate_features];
        glu(
            fused.expect_f32()?,
            self.intermediate_features,
            self.act_fn.scalar_fn(),
            &mut gated,
        )?;

        let mut dims = fused.dimensions().to_vec();
        let last = dims.len() - 1;
        dims[last] = self.intermediate_features;
        let hidden = Tensor::from_f32(x.name(), dims, gated)?;
        self.down_proj.forward(&hidden)
    }
}
