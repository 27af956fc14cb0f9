use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{FfnConfig, FfnKind, StateDict, WeightType};
use crate::core::error::{FfnError, TensorError};
use crate::core::types::Tensor;
use crate::layers::glu::Glu;
use crate::layers::mlp::Mlp;

/// Feed-forward sublayer selected by configuration
#[derive(Debug, Clone, PartialEq)]
pub enum FeedForward {
    Mlp(Mlp),
    Glu(Glu),
}

impl FeedForward {
    /// Build the configured layer, seeding parameter init from `config.seed`
    pub fn from_config(config: &FfnConfig) -> Result<Self, FfnError> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let activation = config.activation_name();
        let bias = config.use_bias();

        let mut layer = match config.kind {
            FfnKind::Mlp => FeedForward::Mlp(Mlp::new(
                config.in_features,
                config.intermediate_features,
                activation,
                bias,
                &mut rng,
            )?),
            FfnKind::Glu => FeedForward::Glu(Glu::new(
                config.in_features,
                config.intermediate_features,
                activation,
                bias,
                &mut rng,
            )?),
        };
        if config.weight_type == WeightType::F16 {
            layer.to_f16();
        }

        info!(
            "Feed-forward {:?}: {} -> {} ({}, bias: {}, weights: {:?}, {} parameters)",
            config.kind,
            config.in_features,
            config.intermediate_features,
            activation,
            bias,
            config.weight_type,
            layer.num_parameters()
        );
        Ok(layer)
    }

    pub fn kind(&self) -> FfnKind {
        match self {
            FeedForward::Mlp(_) => FfnKind::Mlp,
            FeedForward::Glu(_) => FfnKind::Glu,
        }
    }

    pub fn in_features(&self) -> usize {
        match self {
            FeedForward::Mlp(m) => m.in_features(),
            FeedForward::Glu(g) => g.in_features(),
        }
    }

    pub fn num_parameters(&self) -> usize {
        match self {
            FeedForward::Mlp(m) => m.num_parameters(),
            FeedForward::Glu(g) => g.num_parameters(),
        }
    }

    pub fn named_parameters(&self) -> Vec<String> {
        match self {
            FeedForward::Mlp(m) => m.named_parameters(),
            FeedForward::Glu(g) => g.named_parameters(),
        }
    }

    pub fn load_state_dict(&mut self, dict: &StateDict) -> Result<(), FfnError> {
        match self {
            FeedForward::Mlp(m) => m.load_state_dict(dict),
            FeedForward::Glu(g) => g.load_state_dict(dict),
        }
    }

    pub fn state_dict(&self) -> StateDict {
        match self {
            FeedForward::Mlp(m) => m.state_dict(),
            FeedForward::Glu(g) => g.state_dict(),
        }
    }

    pub fn to_f16(&mut self) {
        match self {
            FeedForward::Mlp(m) => m.to_f16(),
            FeedForward::Glu(g) => g.to_f16(),
        }
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor, TensorError> {
        match self {
            FeedForward::Mlp(m) => m.forward(x),
            FeedForward::Glu(g) => g.forward(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TensorType;

    #[test]
    fn test_from_config_uses_kind_defaults() {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .is_test(true)
            .try_init();

        let mlp = FeedForward::from_config(&FfnConfig::new(FfnKind::Mlp, 4, 8)).unwrap();
        match &mlp {
            FeedForward::Mlp(m) => {
                assert_eq!(m.activation().name(), "relu");
                assert!(m.up_proj().bias().is_some());
            }
            FeedForward::Glu(_) => panic!("expected MLP"),
        }

        let glu = FeedForward::from_config(&FfnConfig::new(FfnKind::Glu, 4, 8)).unwrap();
        match &glu {
            FeedForward::Glu(g) => {
                assert_eq!(g.activation().name(), "silu");
                assert!(g.up_gate_proj().bias().is_none());
            }
            FeedForward::Mlp(_) => panic!("expected GLU"),
        }
    }

    #[test]
    fn test_same_seed_same_parameters() {
        let config = FfnConfig::new(FfnKind::Glu, 6, 10);
        let a = FeedForward::from_config(&config).unwrap();
        let b = FeedForward::from_config(&config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_activation_in_config() {
        let mut config = FfnConfig::new(FfnKind::Mlp, 4, 8);
        config.activation_fn = Some("elu".to_string());
        assert!(matches!(
            FeedForward::from_config(&config),
            Err(FfnError::Activation(_))
        ));
    }

    #[test]
    fn test_f16_weights_track_f32_output() {
        let mut config = FfnConfig::new(FfnKind::Glu, 4, 8);
        let full = FeedForward::from_config(&config).unwrap();
        config.weight_type = WeightType::F16;
        let half = FeedForward::from_config(&config).unwrap();
        match &half {
            FeedForward::Glu(g) => assert_eq!(g.down_proj().weight().tensor_type, TensorType::F16),
            FeedForward::Mlp(_) => panic!("expected GLU"),
        }

        let x = Tensor::from_f32("x", vec![1, 4], vec![0.3, -0.7, 1.1, 0.05]).unwrap();
        let a = full.forward(&x).unwrap();
        let b = half.forward(&x).unwrap();
        for (p, q) in a.f32_data().unwrap().iter().zip(b.f32_data().unwrap()) {
            assert!((p - q).abs() < 1e-2);
        }
    }

    #[test]
    fn test_f16_layer_stays_f16_after_load() {
        let source = FeedForward::from_config(&FfnConfig {
            seed: 1,
            ..FfnConfig::new(FfnKind::Mlp, 3, 5)
        })
        .unwrap();
        let mut target = FeedForward::from_config(&FfnConfig {
            weight_type: WeightType::F16,
            ..FfnConfig::new(FfnKind::Mlp, 3, 5)
        })
        .unwrap();
        target.load_state_dict(&source.state_dict()).unwrap();

        match &target {
            FeedForward::Mlp(m) => {
                assert_eq!(m.up_proj().weight().tensor_type, TensorType::F16);
                assert_eq!(m.down_proj().weight().tensor_type, TensorType::F16);
            }
            FeedForward::Glu(_) => panic!("expected MLP"),
        }

        let x = Tensor::from_f32("x", vec![2, 3], vec![0.3, -0.7, 1.1, 0.05, 0.9, -0.2]).unwrap();
        let a = source.forward(&x).unwrap();
        let b = target.forward(&x).unwrap();
        for (p, q) in a.f32_data().unwrap().iter().zip(b.f32_data().unwrap()) {
            assert!((p - q).abs() < 1e-2);
        }
    }

    #[test]
    fn test_state_dict_transfers_between_layers() {
        let source = FeedForward::from_config(&FfnConfig {
            seed: 1,
            ..FfnConfig::new(FfnKind::Mlp, 3, 5)
        })
        .unwrap();
        let mut target = FeedForward::from_config(&FfnConfig::new(FfnKind::Mlp, 3, 5)).unwrap();
        target.load_state_dict(&source.state_dict()).unwrap();
        assert_eq!(target, source);

        // a GLU dict has no up_proj entries
        let glu = FeedForward::from_config(&FfnConfig::new(FfnKind::Glu, 3, 5)).unwrap();
        assert!(matches!(
            target.load_state_dict(&glu.state_dict()),
            Err(FfnError::MissingParameter(_))
        ));
    }
}
