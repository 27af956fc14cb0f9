use log::debug;
use rand::Rng;

use crate::config::StateDict;
use crate::core::error::{FfnError, TensorError};
use crate::core::types::Tensor;
use crate::layers::activation::{Activation, get_activation_fn};
use crate::layers::linear::Linear;

/// Standard feed-forward block with a single hidden layer
///
/// ```text
/// x [.., in] → up_proj → act → [.., intermediate] → down_proj → [.., in]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    in_features: usize,
    intermediate_features: usize,
    act_fn: Activation,
    up_proj: Linear,
    down_proj: Linear,
}

impl Mlp {
    pub const DEFAULT_ACTIVATION: &'static str = "relu";
    pub const DEFAULT_BIAS: bool = true;

    /// Build an MLP with freshly initialized projections
    ///
    /// # Errors
    /// - `FfnError::Activation` if `activation_fn` isn't a registered name
    /// - `FfnError::Tensor` if a width is zero
    pub fn new<R: Rng>(
        in_features: usize,
        intermediate_features: usize,
        activation_fn: &str,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self, FfnError> {
        // resolve the name before allocating any parameters
        let act_fn = get_activation_fn(activation_fn)?;
        let up_proj = Linear::new(in_features, intermediate_features, bias, rng)?;
        let down_proj = Linear::new(intermediate_features, in_features, bias, rng)?;

        debug!(
            "Built MLP {} -> {} -> {} ({}, bias: {})",
            in_features, intermediate_features, in_features, act_fn, bias
        );

        Ok(Self {
            in_features,
            intermediate_features,
            act_fn,
            up_proj,
            down_proj,
        })
    }

    /// Build an MLP from existing projections
    ///
    /// # Errors
    /// `TensorError::ShapeMismatch` unless up_proj is in → intermediate and
    /// down_proj is intermediate → in
    pub fn from_projections(act_fn: Activation, up_proj: Linear, down_proj: Linear) -> Result<Self, FfnError> {
        let in_features = up_proj.in_features();
        let intermediate_features = up_proj.out_features();
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
            up_proj,
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

    pub fn up_proj(&self) -> &Linear {
        &self.up_proj
    }

    pub fn down_proj(&self) -> &Linear {
        &self.down_proj
    }

    pub fn num_parameters(&self) -> usize {
        self.up_proj.num_parameters() + self.down_proj.num_parameters()
    }

    pub fn named_parameters(&self) -> Vec<String> {
        let mut names = self.up_proj.parameter_names("up_proj");
        names.extend(self.down_proj.parameter_names("down_proj"));
        names
    }

    /// Replace all parameter values, leaving the layer untouched on failure
    pub fn load_state_dict(&mut self, dict: &StateDict) -> Result<(), FfnError> {
        let mut up_proj = self.up_proj.clone();
        let mut down_proj = self.down_proj.clone();
        up_proj.load_state_dict("up_proj", dict)?;
        down_proj.load_state_dict("down_proj", dict)?;
        self.up_proj = up_proj;
        self.down_proj = down_proj;
        Ok(())
    }

    pub fn state_dict(&self) -> StateDict {
        let mut dict = StateDict::new();
        self.up_proj.export_state_dict("up_proj", &mut dict);
        self.down_proj.export_state_dict("down_proj", &mut dict);
        dict
    }

    pub fn to_f16(&mut self) {
        self.up_proj.to_f16();
        self.down_proj.to_f16();
    }

    /// down_proj(act(up_proj(x)))
    ///
    /// # Errors
    /// `TensorError::ShapeMismatch` if the trailing dimension of `x` isn't in_features
    pub fn forward(&self, x: &Tensor) -> Result<Tensor, TensorError> {
        let hidden = self.up_proj.forward(x)?;
        let dims = hidden.dimensions().to_vec();
        let mut values = hidden.expect_f32()?.to_vec();
        self.act_fn.apply_inplace(&mut values);
        let hidden = Tensor::from_f32(x.name(), dims, values)?;
        self.down_proj.forward(&hidden)
    }
}
