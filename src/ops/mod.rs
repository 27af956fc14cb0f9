// Core compute kernels (performance-critical, may need SIMD)
pub mod matmul;

// Element-wise transforms
pub mod activation;
pub mod glu;
