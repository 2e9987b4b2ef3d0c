//! Explicit factory for fresh arrays.
//!
//! A [`Context`] carries the default ordering and the buffer allocator, so
//! callers choose both once instead of relying on process-wide state.
//!
//! Factories lay their result out in the context's order. The copying
//! operations (`dup` aside) keep the order the free functions and methods
//! would pick, and differ from them only in where the storage comes from.
//! Copying arithmetic is `ctx.dup(a)` followed by the in-place operator.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::array::NdArray;
use crate::backend::{BufferAllocator, ElementwiseTransform, HeapAllocator, MatmulBackend, RandomFill};
use crate::concat::{self, PadMode};
use crate::element::Element;
use crate::order::Order;
use crate::reduce::Reduction;
use crate::sort::{self, SortedWithIndices};
use crate::Result;

/// Settings a [`Context`] is built from. Missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Ordering of every array the context allocates.
    pub default_order: Order,
}

/// Allocates arrays in the configured ordering through `A`.
#[derive(Debug, Clone, Default)]
pub struct Context<A: BufferAllocator = HeapAllocator> {
    config: ContextConfig,
    allocator: A,
}

impl Context<HeapAllocator> {
    pub fn new(config: ContextConfig) -> Self {
        Self::with_allocator(config, HeapAllocator)
    }
}

impl<A: BufferAllocator> Context<A> {
    pub fn with_allocator(config: ContextConfig, allocator: A) -> Self {
        debug!(order = ?config.default_order, "creating array context");
        Self { config, allocator }
    }

    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.config.default_order
    }

    /// Zero-filled array of `shape` in the context's order.
    ///
    /// # Errors
    /// `IndexOutOfRange` if the allocator returns a short buffer,
    /// `ShapeMismatch` if the element count overflows.
    pub fn zeros<T: Element>(&self, shape: &[usize]) -> Result<NdArray<T>> {
        NdArray::zeros_with(&self.allocator, shape, self.order())
    }

    pub fn ones<T: Element>(&self, shape: &[usize]) -> Result<NdArray<T>> {
        self.value_array_of(shape, T::one())
    }

    /// Array of `shape` with every element set to `value`.
    pub fn value_array_of<T: Element>(&self, shape: &[usize], value: T) -> Result<NdArray<T>> {
        let out = self.zeros(shape)?;
        out.assign_scalar(value)?;
        Ok(out)
    }

    /// Rank-0 array holding `value`.
    pub fn scalar<T: Element>(&self, value: T) -> Result<NdArray<T>> {
        self.value_array_of(&[], value)
    }

    pub fn linspace<T: Element>(&self, start: T, stop: T, n: usize) -> Result<NdArray<T>> {
        self.adopt(NdArray::linspace(start, stop, n, self.order()))
    }

    pub fn arange<T: Element>(&self, start: T, end: T) -> Result<NdArray<T>> {
        self.adopt(NdArray::arange(start, end, self.order()))
    }

    pub fn eye<T: Element>(&self, n: usize) -> Result<NdArray<T>> {
        self.adopt(NdArray::eye(n, self.order()))
    }

    /// Wrap `data`, given in the context order's storage order.
    pub fn from_vec<T: Element>(&self, data: Vec<T>, shape: &[usize]) -> Result<NdArray<T>> {
        NdArray::from_vec_with(&self.allocator, data, shape, self.order())
    }

    pub fn from_rows<T: Element>(&self, rows: &[Vec<T>]) -> Result<NdArray<T>> {
        self.adopt(NdArray::from_rows(rows, self.order())?)
    }

    /// Array of `shape` whose elements `filler` produces, in row-major
    /// logical order.
    pub fn rand_with<T: Element, R: RandomFill<T>>(&self, shape: &[usize], filler: &R) -> Result<NdArray<T>> {
        let out = self.zeros(shape)?;
        let mut values = vec![T::zero(); out.len()];
        filler.fill(&mut values);
        out.write_logical(values);
        Ok(out)
    }

    /// Copy `array` into a buffer from this context's allocator.
    fn adopt<T: Element>(&self, array: NdArray<T>) -> Result<NdArray<T>> {
        array.dup_with(&self.allocator, self.order())
    }

    // ========================================================================
    // Copying operations
    // ========================================================================

    /// Independent contiguous copy of `array` in the context's order.
    pub fn dup<T: Element>(&self, array: &NdArray<T>) -> Result<NdArray<T>> {
        array.dup_with(&self.allocator, self.order())
    }

    /// [`NdArray::reshape`]; a non-contiguous source is copied through the
    /// allocator.
    pub fn reshape<T: Element>(&self, array: &NdArray<T>, shape: &[usize]) -> Result<NdArray<T>> {
        array.reshape_with(&self.allocator, shape)
    }

    pub fn ravel<T: Element>(&self, array: &NdArray<T>) -> Result<NdArray<T>> {
        array.ravel_with(&self.allocator)
    }

    pub fn get_rows<T: Element>(&self, array: &NdArray<T>, indices: &[usize]) -> Result<NdArray<T>> {
        array.get_rows_with(&self.allocator, indices)
    }

    pub fn get_columns<T: Element>(&self, array: &NdArray<T>, indices: &[usize]) -> Result<NdArray<T>> {
        array.get_columns_with(&self.allocator, indices)
    }

    pub fn repmat<T: Element>(&self, array: &NdArray<T>, target: &[usize]) -> Result<NdArray<T>> {
        array.repmat_with(&self.allocator, target)
    }

    pub fn sum<T: Element>(&self, array: &NdArray<T>, dims: &[usize]) -> Result<NdArray<T>> {
        array.reduce_with(&self.allocator, dims, Reduction::Sum)
    }

    pub fn prod<T: Element>(&self, array: &NdArray<T>, dims: &[usize]) -> Result<NdArray<T>> {
        array.reduce_with(&self.allocator, dims, Reduction::Prod)
    }

    pub fn mean<T: Element>(&self, array: &NdArray<T>, dims: &[usize]) -> Result<NdArray<T>> {
        array.mean_with(&self.allocator, dims)
    }

    pub fn max<T: Element>(&self, array: &NdArray<T>, dims: &[usize]) -> Result<NdArray<T>> {
        array.reduce_with(&self.allocator, dims, Reduction::Max)
    }

    pub fn min<T: Element>(&self, array: &NdArray<T>, dims: &[usize]) -> Result<NdArray<T>> {
        array.reduce_with(&self.allocator, dims, Reduction::Min)
    }

    pub fn concat<T: Element>(&self, axis: usize, arrays: &[&NdArray<T>]) -> Result<NdArray<T>> {
        concat::concat_with(&self.allocator, axis, arrays)
    }

    pub fn append<T: Element>(
        &self,
        array: &NdArray<T>,
        pad_amount: usize,
        value: T,
        axis: usize,
    ) -> Result<NdArray<T>> {
        concat::append_with(&self.allocator, array, pad_amount, value, axis)
    }

    pub fn prepend<T: Element>(
        &self,
        array: &NdArray<T>,
        pad_amount: usize,
        value: T,
        axis: usize,
    ) -> Result<NdArray<T>> {
        concat::prepend_with(&self.allocator, array, pad_amount, value, axis)
    }

    pub fn pad<T: Element>(&self, array: &NdArray<T>, padding: &[usize], mode: PadMode<T>) -> Result<NdArray<T>> {
        concat::pad_with(&self.allocator, array, padding, mode)
    }

    pub fn vstack<T: Element>(&self, arrays: &[&NdArray<T>]) -> Result<NdArray<T>> {
        concat::stack_with(&self.allocator, 0, arrays)
    }

    pub fn hstack<T: Element>(&self, arrays: &[&NdArray<T>]) -> Result<NdArray<T>> {
        concat::stack_with(&self.allocator, 1, arrays)
    }

    pub fn to_flattened<T: Element>(&self, arrays: &[&NdArray<T>]) -> Result<NdArray<T>> {
        concat::to_flattened_with(&self.allocator, arrays)
    }

    pub fn sort_with_indices<T: Element>(
        &self,
        array: &NdArray<T>,
        dim: usize,
        ascending: bool,
    ) -> Result<SortedWithIndices<T>> {
        sort::sort_with_indices_with(&self.allocator, array, dim, ascending)
    }

    pub fn sort<T: Element>(&self, array: &NdArray<T>, dim: usize, ascending: bool) -> Result<NdArray<T>> {
        self.sort_with_indices(array, dim, ascending).map(|s| s.values)
    }

    pub fn mmul<T: Element, B: MatmulBackend<T>>(
        &self,
        lhs: &NdArray<T>,
        rhs: &NdArray<T>,
        backend: &B,
    ) -> Result<NdArray<T>> {
        lhs.mmul_with(&self.allocator, rhs, backend)
    }

    pub fn tensor_mmul<T: Element, B: MatmulBackend<T>>(
        &self,
        lhs: &NdArray<T>,
        rhs: &NdArray<T>,
        axes: [&[usize]; 2],
        backend: &B,
    ) -> Result<NdArray<T>> {
        lhs.tensor_mmul_with(&self.allocator, rhs, axes, backend)
    }

    pub fn transform<T: Element, F: ElementwiseTransform<T>>(
        &self,
        array: &NdArray<T>,
        transform: &F,
    ) -> Result<NdArray<T>> {
        array.transform_with(&self.allocator, transform)
    }
}
