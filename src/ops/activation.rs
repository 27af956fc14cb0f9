// Scalar nonlinearities, applied element-wise by the activation registry and the gating op

use std::f32::consts::PI;

pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

pub fn relu_squared(x: f32) -> f32 {
    let r = relu(x);
    r * r
}

/// Numerically stable logistic function
/// Never evaluates exp() of a large positive argument
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// SiLU / Swish: x * sigmoid(x)
pub fn silu(x: f32) -> f32 {
    x * sigmoid(x)
}

/// Exact GELU: x * Φ(x), using erf
pub fn gelu(x: f32) -> f32 {
    0.5 * x * (1.0 + libm::erff(x / std::f32::consts::SQRT_2))
}

/// Tanh approximation of GELU
pub fn gelu_accurate(x: f32) -> f32 {
    let c = (2.0 / PI).sqrt();
    0.5 * x * (1.0 + (c * (x + 0.044715 * x * x * x)).tanh())
}

pub fn tanh(x: f32) -> f32 {
    x.tanh()
}

pub fn linear(x: f32) -> f32 {
    x
}
