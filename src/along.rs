//! Sub-tensor and vector selection along dimensions.

use crate::array::NdArray;
use crate::element::Element;
use crate::shape::{normalize_dims, unravel, Dims, Strides};
use crate::{NdError, Result};

impl<T: Element> NdArray<T> {
    /// The `index`-th sub-tensor spanning `dims`.
    ///
    /// Dimensions not listed are held fixed; their coordinates are the
    /// row-major unravelling of `index` over their sizes. The view has the
    /// listed dimensions in ascending order and shares the buffer.
    ///
    /// # Errors
    /// - `DimensionOutOfRange` / `DuplicateDimension` for bad `dims`
    /// - `IndexOutOfRange` if `index >= tensors_along_dimension(dims)`
    pub fn tensor_along_dimension(&self, index: usize, dims: &[usize]) -> Result<Self> {
        let rank = self.rank();
        let kept = normalize_dims(dims, rank)?;
        let (fixed, fixed_shape) = self.held_fixed(&kept);
        let bound: usize = fixed_shape.iter().product();
        if index >= bound {
            return Err(NdError::IndexOutOfRange { index, bound });
        }
        if self.is_linear() {
            // A rank-1 view spanning its only axis is itself.
            return Ok(self.clone());
        }

        let coord = unravel(index, &fixed_shape);
        let mut offset = self.offset() as isize;
        for (&c, &d) in coord.iter().zip(fixed.iter()) {
            offset += c as isize * self.strides()[d];
        }
        let shape: Dims = kept.iter().map(|&d| self.shape()[d]).collect();
        let strides: Strides = kept.iter().map(|&d| self.strides()[d]).collect();
        Ok(self.view_with(shape, strides, offset as usize, false))
    }

    /// The `index`-th rank-1 vector along `dim`.
    pub fn vector_along_dimension(&self, index: usize, dim: usize) -> Result<Self> {
        self.tensor_along_dimension(index, &[dim])
    }

    /// Number of sub-tensors spanning `dims`: the product of the sizes of
    /// every other dimension.
    pub fn tensors_along_dimension(&self, dims: &[usize]) -> Result<usize> {
        let kept = normalize_dims(dims, self.rank())?;
        let (_, fixed_shape) = self.held_fixed(&kept);
        Ok(fixed_shape.iter().product())
    }

    pub fn vectors_along_dimension(&self, dim: usize) -> Result<usize> {
        self.tensors_along_dimension(&[dim])
    }

    /// Dimensions not in `kept` (ascending) and their sizes.
    fn held_fixed(&self, kept: &[usize]) -> (Dims, Dims) {
        let fixed: Dims = (0..self.rank()).filter(|d| !kept.contains(d)).collect();
        let sizes = fixed.iter().map(|&d| self.shape()[d]).collect();
        (fixed, sizes)
    }
}
