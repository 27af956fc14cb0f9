use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::core::error::{FfnError, TensorError};
use crate::core::types::Tensor;

/// Which feed-forward sublayer to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FfnKind {
    /// up-projection, activation, down-projection
    Mlp,
    /// fused up/gate projection with gating
    Glu,
}

impl FfnKind {
    pub fn default_activation(&self) -> &'static str {
        match self {
            FfnKind::Mlp => "relu",
            FfnKind::Glu => "silu",
        }
    }

    /// Gated variants usually drop the bias
    pub fn default_bias(&self) -> bool {
        match self {
            FfnKind::Mlp => true,
            FfnKind::Glu => false,
        }
    }
}

/// Storage type for projection weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightType {
    #[default]
    F32,
    F16,
}

/// Feed-forward layer configuration, usually read from JSON
///
/// ```json
/// { "kind": "glu", "in_features": 512, "intermediate_features": 1376 }
/// ```
/// Unset `activation_fn` and `bias` fall back to the per-kind defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfnConfig {
    pub kind: FfnKind,
    pub in_features: usize,
    pub intermediate_features: usize,
    #[serde(default)]
    pub activation_fn: Option<String>,
    #[serde(default)]
    pub bias: Option<bool>,
    #[serde(default)]
    pub weight_type: WeightType,
    /// Seed for parameter initialization
    #[serde(default)]
    pub seed: u64,
}

impl FfnConfig {
    pub fn new(kind: FfnKind, in_features: usize, intermediate_features: usize) -> Self {
        Self {
            kind,
            in_features,
            intermediate_features,
            activation_fn: None,
            bias: None,
            weight_type: WeightType::default(),
            seed: 0,
        }
    }

    pub fn activation_name(&self) -> &str {
        self.activation_fn
            .as_deref()
            .unwrap_or_else(|| self.kind.default_activation())
    }

    pub fn use_bias(&self) -> bool {
        self.bias.unwrap_or_else(|| self.kind.default_bias())
    }

    pub fn from_json_str(json: &str) -> Result<Self, FfnError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, FfnError> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!("Loaded {:?} config from {}", config.kind, path.display());
        Ok(config)
    }
}

/// One serialized parameter: row-major values plus shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Named parameters, keyed like "up_proj.weight" or "down_proj.bias"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDict {
    params: BTreeMap<String, ParamEntry>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a tensor under `name` (F16 weights are widened to f32)
    pub fn insert_tensor(&mut self, name: impl Into<String>, tensor: &Tensor) {
        let widened = tensor.to_f32();
        let data = widened.f32_data().map(<[f32]>::to_vec).unwrap_or_default();
        self.params.insert(
            name.into(),
            ParamEntry {
                shape: tensor.dimensions().to_vec(),
                data,
            },
        );
    }

    pub fn insert_vec(&mut self, name: impl Into<String>, data: Vec<f32>) {
        let shape = vec![data.len()];
        self.params.insert(name.into(), ParamEntry { shape, data });
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Fetch a parameter as a tensor
    ///
    /// # Errors
    /// `FfnError::MissingParameter` if absent, `FfnError::Tensor` if data and shape disagree
    pub fn tensor(&self, name: &str) -> Result<Tensor, FfnError> {
        let entry = self
            .params
            .get(name)
            .ok_or_else(|| FfnError::MissingParameter(name.to_string()))?;
        Ok(Tensor::from_f32(name, entry.shape.clone(), entry.data.clone())?)
    }

    /// Fetch a 1D parameter as a flat vector (e.g. a bias)
    ///
    /// # Errors
    /// `FfnError::MissingParameter` if absent, `FfnError::Tensor` unless the shape is [data.len()]
    pub fn vector(&self, name: &str) -> Result<Vec<f32>, FfnError> {
        let entry = self
            .params
            .get(name)
            .ok_or_else(|| FfnError::MissingParameter(name.to_string()))?;
        if entry.shape != [entry.data.len()] {
            return Err(TensorError::DataLength {
                name: name.to_string(),
                dimensions: entry.shape.clone(),
                len: entry.data.len(),
            }
            .into());
        }
        Ok(entry.data.clone())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, FfnError> {
        let path = path.as_ref();
        let dict: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        info!("Loaded {} parameters from {}", dict.len(), path.display());
        Ok(dict)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FfnError> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_kind() {
        let mlp = FfnConfig::from_json_str(r#"{"kind": "mlp", "in_features": 4, "intermediate_features": 16}"#).unwrap();
        assert_eq!(mlp.activation_name(), "relu");
        assert!(mlp.use_bias());
        assert_eq!(mlp.weight_type, WeightType::F32);

        let glu = FfnConfig::new(FfnKind::Glu, 4, 8);
        assert_eq!(glu.activation_name(), "silu");
        assert!(!glu.use_bias());
    }

    #[test]
    fn test_overrides() {
        let json = r#"{
            "kind": "glu",
            "in_features": 8,
            "intermediate_features": 8,
            "activation_fn": "gelu",
            "bias": true,
            "weight_type": "f16",
            "seed": 7
        }"#;
        let config = FfnConfig::from_json_str(json).unwrap();
        assert_eq!(config.activation_name(), "gelu");
        assert!(config.use_bias());
        assert_eq!(config.weight_type, WeightType::F16);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn test_bad_config() {
        assert!(matches!(
            FfnConfig::from_json_str(r#"{"kind": "moe", "in_features": 1, "intermediate_features": 1}"#),
            Err(FfnError::Json(_))
        ));
    }

    #[test]
    fn test_state_dict_lookup() {
        let mut dict = StateDict::new();
        dict.insert_tensor("up_proj.weight", &Tensor::identity("w", 2).unwrap());
        dict.insert_vec("up_proj.bias", vec![1.0, 2.0]);

        assert_eq!(dict.len(), 2);
        assert_eq!(dict.tensor("up_proj.weight").unwrap().dimensions(), &[2, 2]);
        assert_eq!(dict.vector("up_proj.bias").unwrap(), vec![1.0, 2.0]);
        assert!(matches!(
            dict.tensor("down_proj.weight"),
            Err(FfnError::MissingParameter(name)) if name == "down_proj.weight"
        ));

        let json = serde_json::to_string(&dict).unwrap();
        assert!(json.starts_with("{\"up_proj.bias\""));
    }

    #[test]
    fn test_vector_requires_flat_shape() {
        let dict: StateDict = serde_json::from_str(
            r#"{
                "a.bias": {"shape": [7, 9], "data": [0.5, 0.5]},
                "b.bias": {"shape": [1], "data": [0.5, 0.5]},
                "c.bias": {"shape": [2], "data": [0.5, 0.5]}
            }"#,
        )
        .unwrap();

        assert!(matches!(
            dict.vector("a.bias"),
            Err(FfnError::Tensor(TensorError::DataLength { ref dimensions, len: 2, .. })) if dimensions == &[7, 9]
        ));
        assert!(matches!(
            dict.vector("b.bias"),
            Err(FfnError::Tensor(TensorError::DataLength { len: 2, .. }))
        ));
        assert_eq!(dict.vector("c.bias").unwrap(), vec![0.5, 0.5]);
    }
}
