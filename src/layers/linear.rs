use log::debug;
use rand::Rng;

use crate::config::StateDict;
use crate::core::error::{FfnError, TensorError};
use crate::core::types::{Tensor, TensorType};
use crate::ops::matmul::{add_bias, matmul};

/// Affine projection: y = x × W + b
///
/// # Architecture Notes
/// - Weight is stored as [in_features, out_features] (row-major), so a projection
///   is a single pass over contiguous weight rows
/// - Weight may be F32 or F16, activations are always F32
/// - Shapes are fixed at construction; values may be replaced with `set_weight`/`set_bias`
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    in_features: usize,
    out_features: usize,
    weight: Tensor,
    bias: Option<Vec<f32>>,
}

impl Linear {
    /// Create a projection with uniform init in [-1/sqrt(in), 1/sqrt(in)]
    ///
    /// # Errors
    /// Returns `TensorError::ZeroWidth` if either width is zero,
    /// `TensorError::WidthOverflow` if the weight element count overflows
    pub fn new<R: Rng>(
        in_features: usize,
        out_features: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self, TensorError> {
        if in_features == 0 {
            return Err(TensorError::ZeroWidth { what: "in_features" });
        }
        if out_features == 0 {
            return Err(TensorError::ZeroWidth { what: "out_features" });
        }

        let num_weights = in_features
            .checked_mul(out_features)
            .ok_or(TensorError::WidthOverflow { what: "in_features * out_features" })?;

        let bound = 1.0 / (in_features as f32).sqrt();
        let weight_data: Vec<f32> = (0..num_weights)
            .map(|_| rng.gen_range(-bound..=bound))
            .collect();
        let weight = Tensor::from_f32("weight", vec![in_features, out_features], weight_data)?;
        let bias: Option<Vec<f32>> = bias.then(|| {
            (0..out_features)
                .map(|_| rng.gen_range(-bound..=bound))
                .collect()
        });

        debug!(
            "Initialized linear {} -> {} (bias: {})",
            in_features,
            out_features,
            bias.is_some()
        );

        Ok(Self {
            in_features,
            out_features,
            weight,
            bias,
        })
    }

    /// Build a projection from existing parameters
    ///
    /// # Errors
    /// Returns an error if the weight isn't 2D, has a zero width,
    /// or the bias length doesn't match out_features
    pub fn from_weights(weight: Tensor, bias: Option<Vec<f32>>) -> Result<Self, TensorError> {
        let dims = weight.dimensions();
        if dims.len() != 2 {
            return Err(TensorError::NotMatrix {
                name: weight.name().to_string(),
                rank: dims.len(),
            });
        }
        let (in_features, out_features) = (dims[0], dims[1]);
        if in_features == 0 || out_features == 0 {
            return Err(TensorError::ZeroWidth { what: "weight" });
        }
        if let Some(b) = &bias {
            if b.len() != out_features {
                return Err(TensorError::BiasLength {
                    expected: out_features,
                    actual: b.len(),
                });
            }
        }
        Ok(Self {
            in_features,
            out_features,
            weight,
            bias,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> Option<&[f32]> {
        self.bias.as_deref()
    }

    /// Replace the weight values, the shape must stay [in_features, out_features]
    pub fn set_weight(&mut self, weight: Tensor) -> Result<(), TensorError> {
        let dims = weight.dimensions();
        if dims.len() != 2 {
            return Err(TensorError::NotMatrix {
                name: weight.name().to_string(),
                rank: dims.len(),
            });
        }
        if dims[0] != self.in_features {
            return Err(TensorError::ShapeMismatch {
                expected: self.in_features,
                actual: dims[0],
            });
        }
        if dims[1] != self.out_features {
            return Err(TensorError::ShapeMismatch {
                expected: self.out_features,
                actual: dims[1],
            });
        }
        self.weight = weight;
        Ok(())
    }

    /// Replace the bias values
    /// A projection built without bias can't gain one, and vice versa
    pub fn set_bias(&mut self, bias: Vec<f32>) -> Result<(), TensorError> {
        match &mut self.bias {
            Some(b) if b.len() == bias.len() => {
                *b = bias;
                Ok(())
            }
            Some(b) => Err(TensorError::BiasLength {
                expected: b.len(),
                actual: bias.len(),
            }),
            None => Err(TensorError::BiasLength {
                expected: 0,
                actual: bias.len(),
            }),
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.num_elements() + self.bias.as_ref().map_or(0, Vec::len)
    }

    /// Store the weight as F16, halving its memory footprint
    pub fn to_f16(&mut self) {
        self.weight = self.weight.to_f16();
    }

    /// Parameter names under `prefix`, e.g. ["up_proj.weight", "up_proj.bias"]
    pub fn parameter_names(&self, prefix: &str) -> Vec<String> {
        let mut names = vec![format!("{prefix}.weight")];
        if self.bias.is_some() {
            names.push(format!("{prefix}.bias"));
        }
        names
    }

    /// Overwrite weight (and bias, if present) from `dict`
    /// Nothing is modified unless every parameter loads
    pub fn load_state_dict(&mut self, prefix: &str, dict: &StateDict) -> Result<(), FfnError> {
        let mut staged = self.clone();
        let loaded = dict.tensor(&format!("{prefix}.weight"))?.renamed("weight");
        // keep the storage type the layer was configured with
        let loaded = match self.weight.tensor_type {
            TensorType::F32 => loaded,
            TensorType::F16 => loaded.to_f16(),
        };
        staged.set_weight(loaded)?;
        if staged.bias.is_some() {
            staged.set_bias(dict.vector(&format!("{prefix}.bias"))?)?;
        }
        *self = staged;
        Ok(())
    }

    pub fn export_state_dict(&self, prefix: &str, dict: &mut StateDict) {
        dict.insert_tensor(format!("{prefix}.weight"), &self.weight);
        if let Some(bias) = &self.bias {
            dict.insert_vec(format!("{prefix}.bias"), bias.clone());
        }
    }

    /// Apply the projection to the trailing dimension of `input`
    ///
    /// # Errors
    /// `TensorError::ShapeMismatch` if the trailing dimension isn't in_features
    pub fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        if input.last_dim() != self.in_features {
            return Err(TensorError::ShapeMismatch {
                expected: self.in_features,
                actual: input.last_dim(),
            });
        }
        let input_data = input.expect_f32()?;

        let mut output = vec![0.0; input.rows() * self.out_features];
        matmul(input_data, &self.weight, &mut output)?;
        if let Some(bias) = &self.bias {
            add_bias(&mut output, bias)?;
        }

        let mut dims = input.dimensions().to_vec();
        let last = dims.len() - 1;
        dims[last] = self.out_features;
        Tensor::from_f32(input.name(), dims, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_new_respects_init_bound() {
        let mut rng = StdRng::seed_from_u64(0);
        let l = Linear::new(16, 8, true, &mut rng).unwrap();
        let bound = 0.25;
        assert!(l.weight().f32_data().unwrap().iter().all(|w| w.abs() <= bound));
        assert!(l.bias().unwrap().iter().all(|b| b.abs() <= bound));
        assert_eq!(l.num_parameters(), 16 * 8 + 8);

        let l = Linear::new(16, 8, false, &mut rng).unwrap();
        assert!(l.bias().is_none());
        assert_eq!(l.num_parameters(), 128);
    }

    #[test]
    fn test_zero_width_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            Linear::new(0, 4, true, &mut rng),
            Err(TensorError::ZeroWidth { .. })
        ));
    }

    #[test]
    fn test_overflowing_width_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            Linear::new(usize::MAX, 2, false, &mut rng).unwrap_err(),
            TensorError::WidthOverflow { what: "in_features * out_features" }
        );
    }

    #[test]
    fn test_forward_keeps_leading_dims() {
        let mut rng = StdRng::seed_from_u64(1);
        let l = Linear::new(4, 6, true, &mut rng).unwrap();
        let x = Tensor::zeros("x", vec![2, 3, 4]).unwrap();
        let y = l.forward(&x).unwrap();
        assert_eq!(y.dimensions(), &[2, 3, 6]);
        // zero input leaves only the bias
        let bias = l.bias().unwrap();
        for row in y.f32_data().unwrap().chunks_exact(6) {
            assert_eq!(row, bias);
        }
    }

    #[test]
    fn test_forward_rejects_wrong_trailing_dim() {
        let l = Linear::from_weights(Tensor::identity("w", 3).unwrap(), None).unwrap();
        let x = Tensor::zeros("x", vec![2, 4]).unwrap();
        assert_eq!(
            l.forward(&x).unwrap_err(),
            TensorError::ShapeMismatch { expected: 3, actual: 4 }
        );
    }

    #[test]
    fn test_from_weights_validation() {
        let w = Tensor::zeros("w", vec![2, 3]).unwrap();
        assert!(matches!(
            Linear::from_weights(w.clone(), Some(vec![0.0; 2])),
            Err(TensorError::BiasLength { expected: 3, actual: 2 })
        ));
        let flat = Tensor::zeros("w", vec![6]).unwrap();
        assert!(Linear::from_weights(flat, None).is_err());
        assert!(Linear::from_weights(w, Some(vec![0.0; 3])).is_ok());
    }

    #[test]
    fn test_set_weight_and_bias() {
        let mut l = Linear::from_weights(Tensor::zeros("w", vec![2, 2]).unwrap(), Some(vec![0.0; 2])).unwrap();
        l.set_weight(Tensor::identity("w", 2).unwrap()).unwrap();
        l.set_bias(vec![1.0, -1.0]).unwrap();
        let y = l.forward(&Tensor::from_f32("x", vec![2], vec![3.0, 4.0]).unwrap()).unwrap();
        assert_eq!(y.f32_data().unwrap(), &[4.0, 3.0]);

        assert!(l.set_weight(Tensor::zeros("w", vec![2, 3]).unwrap()).is_err());
        assert!(l.set_bias(vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_state_dict_load_is_all_or_nothing() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut l = Linear::new(2, 2, true, &mut rng).unwrap();
        let before = l.clone();

        let mut dict = StateDict::new();
        dict.insert_tensor("proj.weight", &Tensor::identity("w", 2).unwrap());
        // bias missing: weight must not be touched either
        assert!(matches!(
            l.load_state_dict("proj", &dict),
            Err(FfnError::MissingParameter(_))
        ));
        assert_eq!(l, before);

        dict.insert_vec("proj.bias", vec![0.0, 0.0]);
        l.load_state_dict("proj", &dict).unwrap();
        assert_eq!(l.weight().f32_data().unwrap(), &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(l.parameter_names("proj"), vec!["proj.weight", "proj.bias"]);

        let mut exported = StateDict::new();
        l.export_state_dict("proj", &mut exported);
        assert_eq!(exported, dict);
    }

    #[test]
    fn test_f16_weights_forward() {
        let mut l = Linear::from_weights(Tensor::identity("w", 2).unwrap(), None).unwrap();
        l.to_f16();
        let y = l.forward(&Tensor::from_f32("x", vec![1, 2], vec![0.5, -2.0]).unwrap()).unwrap();
        assert_eq!(y.f32_data().unwrap(), &[0.5, -2.0]);
    }

    #[test]
    fn test_state_dict_load_keeps_f16_storage() {
        let mut l = Linear::from_weights(Tensor::zeros("w", vec![2, 2]).unwrap(), None).unwrap();
        l.to_f16();

        let mut dict = StateDict::new();
        dict.insert_tensor("proj.weight", &Tensor::identity("w", 2).unwrap());
        l.load_state_dict("proj", &dict).unwrap();

        assert_eq!(l.weight().tensor_type, TensorType::F16);
        assert!(l.weight().f32_data().is_none());
        let y = l.forward(&Tensor::from_f32("x", vec![1, 2], vec![0.5, -2.0]).unwrap()).unwrap();
        assert_eq!(y.f32_data().unwrap(), &[0.5, -2.0]);
    }
}
