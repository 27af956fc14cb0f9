use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::error::ActivationError;
use crate::ops::activation as act;

/// Closed set of element-wise activation functions
/// Names are resolved once, at layer construction, never per call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    ReluSquared,
    Gelu,
    GeluAccurate,
    Tanh,
    Sigmoid,
    Silu,
    Linear,
}

/// Look up an activation function by name
///
/// Accepts the canonical names plus the aliases `swish` (silu)
/// and `gelu_fast` (deprecated, resolves to gelu_accurate)
///
/// # Errors
/// Returns `ActivationError::Unknown` for any other name
pub fn get_activation_fn(name: &str) -> Result<Activation, ActivationError> {
    match name {
        "relu" => Ok(Activation::Relu),
        "relu_squared" => Ok(Activation::ReluSquared),
        "gelu" => Ok(Activation::Gelu),
        "gelu_fast" => {
            warn!("--activation-fn=gelu_fast has been renamed to gelu_accurate");
            Ok(Activation::GeluAccurate)
        }
        "gelu_accurate" => Ok(Activation::GeluAccurate),
        "tanh" => Ok(Activation::Tanh),
        "sigmoid" => Ok(Activation::Sigmoid),
        "silu" | "swish" => Ok(Activation::Silu),
        "linear" => Ok(Activation::Linear),
        _ => Err(ActivationError::Unknown(name.to_string())),
    }
}

impl Activation {
    /// Every registered function, in canonical-name form
    pub const ALL: [Activation; 8] = [
        Activation::Relu,
        Activation::ReluSquared,
        Activation::Gelu,
        Activation::GeluAccurate,
        Activation::Tanh,
        Activation::Sigmoid,
        Activation::Silu,
        Activation::Linear,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::ReluSquared => "relu_squared",
            Activation::Gelu => "gelu",
            Activation::GeluAccurate => "gelu_accurate",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Silu => "silu",
            Activation::Linear => "linear",
        }
    }

    /// The scalar kernel behind this variant
    pub fn scalar_fn(&self) -> fn(f32) -> f32 {
        match self {
            Activation::Relu => act::relu,
            Activation::ReluSquared => act::relu_squared,
            Activation::Gelu => act::gelu,
            Activation::GeluAccurate => act::gelu_accurate,
            Activation::Tanh => act::tanh,
            Activation::Sigmoid => act::sigmoid,
            Activation::Silu => act::silu,
            Activation::Linear => act::linear,
        }
    }

    pub fn apply_inplace(&self, values: &mut [f32]) {
        if *self == Activation::Linear {
            return;
        }
        let f = self.scalar_fn();
        for v in values.iter_mut() {
            *v = f(*v);
        }
    }
}

impl FromStr for Activation {
    type Err = ActivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        get_activation_fn(s)
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Activation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Activation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        get_activation_fn(&name).map_err(serde::de::Error::custom)
    }
}
