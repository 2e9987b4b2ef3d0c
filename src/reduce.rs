//! Reductions along one or more dimensions.
//!
//! Each named axis is reduced in ascending order into a fresh intermediate
//! that keeps the axis with size 1; the next axis is reduced from that
//! intermediate. The final result then collapses the reduced axes, keeping
//! the rank at `min(2, source rank)`.
//!
//! `max` and `min` skip NaN: each fold starts at `∓inf` and keeps the
//! accumulator whenever the next element is NaN, so a vector holding only
//! NaN reduces to the same `∓inf` as an empty one.

use tracing::trace;

use crate::array::NdArray;
use crate::backend::{BufferAllocator, HeapAllocator};
use crate::element::Element;
use crate::shape::{normalize_dims, Dims};
use crate::Result;

/// Fold applied to every vector along a reduced axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reduction {
    Sum,
    Prod,
    Max,
    Min,
}

impl Reduction {
    #[inline]
    fn init<T: Element>(self) -> T {
        match self {
            Reduction::Sum => T::zero(),
            Reduction::Prod => T::one(),
            Reduction::Max => T::neg_infinity(),
            Reduction::Min => T::infinity(),
        }
    }

    #[inline]
    fn combine<T: Element>(self, acc: T, x: T) -> T {
        match self {
            Reduction::Sum => acc + x,
            Reduction::Prod => acc * x,
            Reduction::Max => acc.max(x),
            Reduction::Min => acc.min(x),
        }
    }

    fn fold<T: Element>(self, values: impl Iterator<Item = T>) -> T {
        values.fold(self.init(), |acc, x| self.combine(acc, x))
    }
}

/// Shape after collapsing the reduced `dims` of a size-1-per-reduced-axis
/// `shape`: drop them, then re-insert size-1 axes at the earliest reduced
/// positions until the rank reaches `min(2, shape.len())`.
fn collapsed_shape(shape: &[usize], dims: &[usize]) -> Dims {
    let mut out: Dims = shape
        .iter()
        .enumerate()
        .filter(|(d, _)| !dims.contains(d))
        .map(|(_, &s)| s)
        .collect();
    let min_rank = shape.len().min(2);
    let mut reinsert = dims.iter();
    while out.len() < min_rank {
        let at = reinsert.next().map_or(out.len(), |&d| d.min(out.len()));
        out.insert(at, 1);
    }
    out
}

impl<T: Element> NdArray<T> {
    /// Reduce a single axis into a fresh array with that axis kept as size 1.
    fn reduce_axis<A: BufferAllocator>(&self, alloc: &A, axis: usize, op: Reduction) -> Result<Self> {
        let count = self.vectors_along_dimension(axis)?;
        trace!(axis, vectors = count, ?op, "reducing axis");
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let v = self.vector_along_dimension(i, axis)?;
            values.push(op.fold(v.iter()));
        }
        let mut shape = Dims::from_slice(self.shape());
        shape[axis] = 1;
        Self::from_logical_with(alloc, values, &shape, self.order())
    }

    pub(crate) fn reduce_with<A: BufferAllocator>(
        &self,
        alloc: &A,
        dims: &[usize],
        op: Reduction,
    ) -> Result<Self> {
        let dims = normalize_dims(dims, self.rank())?;
        if dims.is_empty() {
            return self.dup_with(alloc, self.order());
        }
        let mut current = self.reduce_axis(alloc, dims[0], op)?;
        for &axis in &dims[1..] {
            current = current.reduce_axis(alloc, axis, op)?;
        }
        current.reshape_with(alloc, &collapsed_shape(current.shape(), &dims))
    }

    pub(crate) fn mean_with<A: BufferAllocator>(&self, alloc: &A, dims: &[usize]) -> Result<Self> {
        let sum = self.reduce_with(alloc, dims, Reduction::Sum)?;
        let dims = normalize_dims(dims, self.rank())?;
        let count: usize = dims.iter().map(|&d| self.shape()[d]).product();
        sum.divi_scalar(T::from_usize(count))?;
        Ok(sum)
    }

    /// Sum over `dims`.
    ///
    /// # Errors
    /// `DimensionOutOfRange` or `DuplicateDimension` for bad `dims`.
    ///
    /// # Example
    /// ```rust
    /// use strided_nd::{NdArray, Order};
    ///
    /// let a = NdArray::<f64>::arange(1.0, 13.0, Order::ColumnMajor)
    ///     .reshape(&[2, 2, 3])
    ///     .unwrap();
    /// let s = a.sum(&[0, 1]).unwrap();
    /// assert_eq!(s.shape(), &[1, 3]);
    /// assert_eq!(s.to_vec(), vec![10.0, 26.0, 42.0]);
    /// ```
    pub fn sum(&self, dims: &[usize]) -> Result<Self> {
        self.reduce_with(&HeapAllocator, dims, Reduction::Sum)
    }

    pub fn prod(&self, dims: &[usize]) -> Result<Self> {
        self.reduce_with(&HeapAllocator, dims, Reduction::Prod)
    }

    /// Arithmetic mean over `dims`.
    pub fn mean(&self, dims: &[usize]) -> Result<Self> {
        self.mean_with(&HeapAllocator, dims)
    }

    /// Largest element of each vector over `dims`, skipping NaN.
    pub fn max(&self, dims: &[usize]) -> Result<Self> {
        self.reduce_with(&HeapAllocator, dims, Reduction::Max)
    }

    /// Smallest element of each vector over `dims`, skipping NaN.
    pub fn min(&self, dims: &[usize]) -> Result<Self> {
        self.reduce_with(&HeapAllocator, dims, Reduction::Min)
    }

    /// Sum of every element.
    pub fn sum_all(&self) -> T {
        Reduction::Sum.fold(self.iter())
    }

    pub fn prod_all(&self) -> T {
        Reduction::Prod.fold(self.iter())
    }

    pub fn mean_all(&self) -> T {
        self.sum_all() / T::from_usize(self.len())
    }

    /// Largest non-NaN element; `-inf` when there is none.
    pub fn max_all(&self) -> T {
        Reduction::Max.fold(self.iter())
    }

    /// Smallest non-NaN element; `+inf` when there is none.
    pub fn min_all(&self) -> T {
        Reduction::Min.fold(self.iter())
    }
}
