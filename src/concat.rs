//! Assembling new arrays from several inputs: concatenation, constant
//! padding, stacking and flattening.

use std::ops::Range;

use tracing::debug;

use crate::array::NdArray;
use crate::backend::{BufferAllocator, HeapAllocator};
use crate::element::Element;
use crate::order::Order;
use crate::shape::Dims;
use crate::{NdError, Result};

/// How the border added by [`pad`] is filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadMode<T> {
    /// Every padded element is the given value.
    Constant(T),
}

/// Join `arrays` along `axis` into one new contiguous array laid out in the
/// first input's order.
///
/// # Errors
/// - `UnsupportedViewOperation` for an empty input list
/// - `ShapeMismatch` if ranks differ or any non-`axis` size differs
/// - `DimensionOutOfRange` if `axis >= rank`
///
/// # Example
/// ```rust
/// use strided_nd::{concat, NdArray, Order};
///
/// let a = NdArray::<f64>::linspace(1.0, 4.0, 4, Order::ColumnMajor)
///     .reshape(&[2, 2])
///     .unwrap();
/// let b = a.dup();
/// let c = concat(1, &[&a, &b]).unwrap();
/// assert_eq!(c.to_vec(), vec![1.0, 3.0, 1.0, 3.0, 2.0, 4.0, 2.0, 4.0]);
/// ```
pub fn concat<T: Element>(axis: usize, arrays: &[&NdArray<T>]) -> Result<NdArray<T>> {
    concat_with(&HeapAllocator, axis, arrays)
}

pub(crate) fn concat_with<T: Element, A: BufferAllocator>(
    alloc: &A,
    axis: usize,
    arrays: &[&NdArray<T>],
) -> Result<NdArray<T>> {
    let first = arrays
        .first()
        .ok_or(NdError::UnsupportedViewOperation("concat of zero arrays"))?;
    let rank = first.rank();
    if axis >= rank {
        return Err(NdError::DimensionOutOfRange { dim: axis, rank });
    }
    let mut extent = 0usize;
    for a in arrays {
        let compatible = a.rank() == rank
            && (0..rank).all(|d| d == axis || a.shape()[d] == first.shape()[d]);
        if !compatible {
            return Err(NdError::ShapeMismatch(
                first.shape().to_vec(),
                a.shape().to_vec(),
            ));
        }
        extent += a.shape()[axis];
    }

    let mut shape = Dims::from_slice(first.shape());
    shape[axis] = extent;
    debug!(?shape, axis, inputs = arrays.len(), "concatenating into a new array");
    let out = NdArray::zeros_with(alloc, &shape, first.order())?;

    let mut start = 0usize;
    for a in arrays {
        let len = a.shape()[axis];
        let ranges: Vec<Range<usize>> = (0..rank)
            .map(|d| if d == axis { start..start + len } else { 0..shape[d] })
            .collect();
        out.sub_array(&ranges)?.write_logical(a.iter());
        start += len;
    }
    Ok(out)
}

/// `array` followed by `pad_amount` copies of `value` along `axis`.
pub fn append<T: Element>(
    array: &NdArray<T>,
    pad_amount: usize,
    value: T,
    axis: usize,
) -> Result<NdArray<T>> {
    append_with(&HeapAllocator, array, pad_amount, value, axis)
}

pub(crate) fn append_with<T: Element, A: BufferAllocator>(
    alloc: &A,
    array: &NdArray<T>,
    pad_amount: usize,
    value: T,
    axis: usize,
) -> Result<NdArray<T>> {
    let block = constant_block(array, pad_amount, value, axis)?;
    concat_with(alloc, axis, &[array, &block])
}

/// `pad_amount` copies of `value` along `axis`, followed by `array`.
pub fn prepend<T: Element>(
    array: &NdArray<T>,
    pad_amount: usize,
    value: T,
    axis: usize,
) -> Result<NdArray<T>> {
    prepend_with(&HeapAllocator, array, pad_amount, value, axis)
}

pub(crate) fn prepend_with<T: Element, A: BufferAllocator>(
    alloc: &A,
    array: &NdArray<T>,
    pad_amount: usize,
    value: T,
    axis: usize,
) -> Result<NdArray<T>> {
    let block = constant_block(array, pad_amount, value, axis)?;
    concat_with(alloc, axis, &[&block, array])
}

fn constant_block<T: Element>(
    array: &NdArray<T>,
    pad_amount: usize,
    value: T,
    axis: usize,
) -> Result<NdArray<T>> {
    let rank = array.rank();
    if axis >= rank {
        return Err(NdError::DimensionOutOfRange { dim: axis, rank });
    }
    let mut shape = Dims::from_slice(array.shape());
    shape[axis] = pad_amount;
    NdArray::scalar(value).broadcast(&shape)
}

/// Surround `array` with `padding[d]` elements on both sides of every axis.
///
/// # Errors
/// `ShapeMismatch` if `padding.len()` differs from the rank.
pub fn pad<T: Element>(array: &NdArray<T>, padding: &[usize], mode: PadMode<T>) -> Result<NdArray<T>> {
    pad_with(&HeapAllocator, array, padding, mode)
}

pub(crate) fn pad_with<T: Element, A: BufferAllocator>(
    alloc: &A,
    array: &NdArray<T>,
    padding: &[usize],
    mode: PadMode<T>,
) -> Result<NdArray<T>> {
    if padding.len() != array.rank() {
        return Err(NdError::ShapeMismatch(
            padding.to_vec(),
            array.shape().to_vec(),
        ));
    }
    let shape: Dims = array
        .shape()
        .iter()
        .zip(padding)
        .map(|(&s, &p)| s + 2 * p)
        .collect();
    let PadMode::Constant(value) = mode;
    let out = NdArray::zeros_with(alloc, &shape, array.order())?;
    out.assign_scalar(value)?;
    let interior: Vec<Range<usize>> = array
        .shape()
        .iter()
        .zip(padding)
        .map(|(&s, &p)| p..p + s)
        .collect();
    out.sub_array(&interior)?.write_logical(array.iter());
    Ok(out)
}

/// Rank-1 inputs become `[1, n]` rows; others pass through.
fn promote_rows<T: Element>(arrays: &[&NdArray<T>]) -> Result<Vec<NdArray<T>>> {
    arrays
        .iter()
        .map(|a| if a.rank() == 1 { a.expand_dims(0) } else { Ok((*a).clone()) })
        .collect()
}

/// Stack along axis 0, treating rank-1 inputs as rows.
pub fn vstack<T: Element>(arrays: &[&NdArray<T>]) -> Result<NdArray<T>> {
    stack_with(&HeapAllocator, 0, arrays)
}

/// Stack along axis 1, treating rank-1 inputs as rows.
pub fn hstack<T: Element>(arrays: &[&NdArray<T>]) -> Result<NdArray<T>> {
    stack_with(&HeapAllocator, 1, arrays)
}

pub(crate) fn stack_with<T: Element, A: BufferAllocator>(
    alloc: &A,
    axis: usize,
    arrays: &[&NdArray<T>],
) -> Result<NdArray<T>> {
    let promoted = promote_rows(arrays)?;
    let refs: Vec<&NdArray<T>> = promoted.iter().collect();
    concat_with(alloc, axis, &refs)
}

/// Every element of every input, in row-major logical order, as one
/// rank-1 array.
pub fn to_flattened<T: Element>(arrays: &[&NdArray<T>]) -> NdArray<T> {
    let values: Vec<T> = arrays.iter().flat_map(|a| a.iter()).collect();
    let order = arrays.first().map_or(Order::default(), |a| a.order());
    let len = values.len();
    NdArray::from_logical(values, &[len], order)
}

pub(crate) fn to_flattened_with<T: Element, A: BufferAllocator>(
    alloc: &A,
    arrays: &[&NdArray<T>],
) -> Result<NdArray<T>> {
    let len = arrays.iter().map(|a| a.len()).sum::<usize>();
    let order = arrays.first().map_or(Order::default(), |a| a.order());
    NdArray::from_logical_with(alloc, arrays.iter().flat_map(|a| a.iter()), &[len], order)
}
