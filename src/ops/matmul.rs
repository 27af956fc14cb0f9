/// Matrix multiplication kernels for the projection layers
///
/// Architecture:
/// - Kernel dispatch layer selects the implementation based on the weight storage type
/// - Scalar implementation for F32 weights
/// - Scalar implementation with on-the-fly widening for F16 weights
///
/// Matrix Layout:
/// - All tensors stored in row-major order
/// - Input is viewed as [rows, in_features], weight is [in_features, out_features]
/// - We compute: output[r, o] = sum_i(input[r, i] * weight[i, o])
/// - The accumulation order is fixed, so repeated calls are bit-identical

use crate::core::error::TensorError;
use crate::core::types::{Tensor, TensorType};

/// Batched matrix multiplication: output = input × weight
///
/// # Arguments
/// * `input` - Row-major activations, length must be a multiple of in_features
/// * `weight` - Weight matrix [in_features, out_features] (F32 or F16)
/// * `output` - Output buffer, must hold rows * out_features values
///
/// # Errors
/// Returns a `TensorError` if the weight isn't 2D or any length doesn't line up
pub fn matmul(input: &[f32], weight: &Tensor, output: &mut [f32]) -> Result<(), TensorError> {
    let weight_dims = weight.dimensions();
    if weight_dims.len() != 2 {
        return Err(TensorError::NotMatrix {
            name: weight.name().to_string(),
            rank: weight_dims.len(),
        });
    }

    let in_features = weight_dims[0];
    let out_features = weight_dims[1];

    if in_features == 0 || input.len() % in_features != 0 {
        return Err(TensorError::ShapeMismatch {
            expected: in_features,
            actual: input.len(),
        });
    }
    let rows = input.len() / in_features;

    if output.len() != rows * out_features {
        return Err(TensorError::ShapeMismatch {
            expected: rows * out_features,
            actual: output.len(),
        });
    }

    match weight.tensor_type {
        TensorType::F32 => {
            let weight_data = weight.expect_f32()?;
            matmul_kernel(input, in_features, out_features, output, |idx| weight_data[idx]);
        }
        TensorType::F16 => {
            let weight_data = weight.f16_data().ok_or_else(|| TensorError::UnsupportedType {
                name: weight.name().to_string(),
                expected: TensorType::F16,
                actual: weight.tensor_type,
            })?;
            matmul_kernel(input, in_features, out_features, output, |idx| {
                weight_data[idx].to_f32()
            });
        }
    }

    Ok(())
}

/// Scalar kernel shared by every storage type
/// `load` returns weight[in_idx * out_features + out_idx] as f32
#[inline]
fn matmul_kernel<F>(
    input: &[f32],
    in_features: usize,
    out_features: usize,
    output: &mut [f32],
    load: F,
) where
    F: Fn(usize) -> f32,
{
    output.fill(0.0);

    for (in_row, out_row) in input
        .chunks_exact(in_features)
        .zip(output.chunks_exact_mut(out_features))
    {
        // Walk the weight row by row so reads stay contiguous in row-major layout
        for (in_idx, &x) in in_row.iter().enumerate() {
            let row_start = in_idx * out_features;
            for (out_idx, acc) in out_row.iter_mut().enumerate() {
                *acc += x * load(row_start + out_idx);
            }
        }
    }
}

/// Add a bias vector to every row of `output`
pub fn add_bias(output: &mut [f32], bias: &[f32]) -> Result<(), TensorError> {
    if bias.is_empty() || output.len() % bias.len() != 0 {
        return Err(TensorError::BiasLength {
            expected: bias.len(),
            actual: output.len(),
        });
    }
    for row in output.chunks_exact_mut(bias.len()) {
        for (o, b) in row.iter_mut().zip(bias) {
            *o += b;
        }
    }
    Ok(())
}
