use half::f16;

use super::error::TensorError;

/// Tensor storage type - public for zero-overhead kernel dispatch
/// Activations are always F32, weights may be stored as F16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    /// Unquantized float32 values
    F32,
    /// Half precision weights, widened to f32 inside the kernels
    F16,
}

/// Dense row-major tensor
/// Shape is fixed at construction, values can be replaced through the owning layer
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Public field for zero-overhead type checking in kernels
    pub tensor_type: TensorType,

    /// Tensor name (e.g., "up_proj.weight")
    name: String,

    /// Tensor dimensions (e.g., [seq_len, hidden_dim])
    dimensions: Vec<usize>,

    /// Total number of elements (product of dimensions)
    num_elements: usize,

    /// For F32: raw values, None otherwise
    f32_data: Option<Vec<f32>>,

    /// For F16: raw values, None otherwise
    f16_data: Option<Vec<f16>>,
}

fn element_count(dimensions: &[usize]) -> Result<usize, TensorError> {
    dimensions
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(TensorError::WidthOverflow { what: "tensor dimensions" })
}

impl Tensor {
    fn check_shape(name: &str, dimensions: &[usize], len: usize) -> Result<usize, TensorError> {
        if dimensions.is_empty() {
            return Err(TensorError::Scalar {
                name: name.to_string(),
            });
        }
        let num_elements = element_count(dimensions)?;
        if num_elements != len {
            return Err(TensorError::DataLength {
                name: name.to_string(),
                dimensions: dimensions.to_vec(),
                len,
            });
        }
        Ok(num_elements)
    }

    /// Create an F32 tensor, validating that the data fills the shape exactly
    pub fn from_f32(
        name: impl Into<String>,
        dimensions: Vec<usize>,
        data: Vec<f32>,
    ) -> Result<Self, TensorError> {
        let name = name.into();
        let num_elements = Self::check_shape(&name, &dimensions, data.len())?;
        Ok(Self {
            tensor_type: TensorType::F32,
            name,
            dimensions,
            num_elements,
            f32_data: Some(data),
            f16_data: None,
        })
    }

    /// Create an F16 tensor
    pub fn from_f16(
        name: impl Into<String>,
        dimensions: Vec<usize>,
        data: Vec<f16>,
    ) -> Result<Self, TensorError> {
        let name = name.into();
        let num_elements = Self::check_shape(&name, &dimensions, data.len())?;
        Ok(Self {
            tensor_type: TensorType::F16,
            name,
            dimensions,
            num_elements,
            f32_data: None,
            f16_data: Some(data),
        })
    }

    pub fn zeros(name: impl Into<String>, dimensions: Vec<usize>) -> Result<Self, TensorError> {
        let len = element_count(&dimensions)?;
        Self::from_f32(name, dimensions, vec![0.0; len])
    }

    /// Square identity matrix [n, n]
    pub fn identity(name: impl Into<String>, n: usize) -> Result<Self, TensorError> {
        let mut data = vec![0.0; element_count(&[n, n])?];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self::from_f32(name, vec![n, n], data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get tensor dimensions
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// Size of the trailing (feature) dimension
    pub fn last_dim(&self) -> usize {
        // dimensions is never empty, see check_shape
        self.dimensions[self.dimensions.len() - 1]
    }

    /// Number of rows when viewed as [rows, last_dim]
    pub fn rows(&self) -> usize {
        match self.last_dim() {
            0 => 0,
            d => self.num_elements / d,
        }
    }

    /// Get total number of elements
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Get F32 data
    /// Returns None if the tensor is stored as F16
    pub fn f32_data(&self) -> Option<&[f32]> {
        self.f32_data.as_deref()
    }

    /// Get F16 data
    /// Returns None if the tensor is stored as F32
    pub fn f16_data(&self) -> Option<&[f16]> {
        self.f16_data.as_deref()
    }

    /// F32 view, failing for any other storage type
    pub fn expect_f32(&self) -> Result<&[f32], TensorError> {
        self.f32_data().ok_or_else(|| TensorError::UnsupportedType {
            name: self.name.clone(),
            expected: TensorType::F32,
            actual: self.tensor_type,
        })
    }

    pub fn to_f16(&self) -> Self {
        match self.tensor_type {
            TensorType::F16 => self.clone(),
            TensorType::F32 => {
                let data = self
                    .f32_data
                    .iter()
                    .flatten()
                    .map(|&v| f16::from_f32(v))
                    .collect();
                Self {
                    tensor_type: TensorType::F16,
                    name: self.name.clone(),
                    dimensions: self.dimensions.clone(),
                    num_elements: self.num_elements,
                    f32_data: None,
                    f16_data: Some(data),
                }
            }
        }
    }

    pub fn to_f32(&self) -> Self {
        match self.tensor_type {
            TensorType::F32 => self.clone(),
            TensorType::F16 => {
                let data = self
                    .f16_data
                    .iter()
                    .flatten()
                    .map(|v| v.to_f32())
                    .collect();
                Self {
                    tensor_type: TensorType::F32,
                    name: self.name.clone(),
                    dimensions: self.dimensions.clone(),
                    num_elements: self.num_elements,
                    f32_data: Some(data),
                    f16_data: None,
                }
            }
        }
    }

    /// Same data under a new name
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
