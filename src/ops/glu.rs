use crate::core::error::TensorError;

/// Gated product over the output of a fused up/gate projection
///
/// Each row of `fused` holds `2 * width` values: content first, gate second.
/// output[r, i] = fused[r, i] * gate_fn(fused[r, width + i])
pub fn glu<F>(fused: &[f32], width: usize, gate_fn: F, output: &mut [f32]) -> Result<(), TensorError>
where
    F: Fn(f32) -> f32,
{
    let fused_width = width
        .checked_mul(2)
        .ok_or(TensorError::WidthOverflow { what: "2 * width" })?;
    if width == 0 || fused.len() % fused_width != 0 {
        return Err(TensorError::OddSplit {
            dim: fused.len(),
            width,
        });
    }

    let rows = fused.len() / fused_width;
    if output.len() != rows * width {
        return Err(TensorError::ShapeMismatch {
            expected: rows * width,
            actual: output.len(),
        });
    }

    for (row, out_row) in fused
        .chunks_exact(fused_width)
        .zip(output.chunks_exact_mut(width))
    {
        let (content, gate) = row.split_at(width);
        for (o, (&c, &g)) in out_row.iter_mut().zip(content.iter().zip(gate)) {
            *o = c * gate_fn(g);
        }
    }

    Ok(())
}
