//! Stable per-vector sorting with permutation indices.

use std::fmt;

use tracing::debug;

use crate::array::NdArray;
use crate::backend::{BufferAllocator, HeapAllocator};
use crate::element::Element;
use crate::{NdError, Result};

/// Result of [`sort_with_indices`]: both arrays have the source shape.
#[derive(Clone)]
pub struct SortedWithIndices<T> {
    pub values: NdArray<T>,
    /// Source position (along the sorted dimension) of each sorted value,
    /// stored in the element type.
    pub indices: NdArray<T>,
}

impl<T: Element> fmt::Debug for SortedWithIndices<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortedWithIndices")
            .field("values", &self.values)
            .field("indices", &self.indices)
            .finish()
    }
}

/// Sort every vector along `dim` into new arrays.
///
/// The sort is stable under a total order (NaN sorts after every number).
/// `ascending = false` reverses the comparator only, so equal elements keep
/// their source order in both directions.
///
/// # Errors
/// `DimensionOutOfRange` if `dim >= rank`.
///
/// # Example
/// ```rust
/// use strided_nd::{sort_with_indices, NdArray, Order};
///
/// let a = NdArray::from_vec(vec![3.0, 1.0, 4.0, 2.0], &[4], Order::RowMajor).unwrap();
/// let sorted = sort_with_indices(&a, 0, true).unwrap();
/// assert_eq!(sorted.values.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
/// assert_eq!(sorted.indices.to_vec(), vec![1.0, 3.0, 0.0, 2.0]);
/// ```
pub fn sort_with_indices<T: Element>(
    array: &NdArray<T>,
    dim: usize,
    ascending: bool,
) -> Result<SortedWithIndices<T>> {
    sort_with_indices_with(&HeapAllocator, array, dim, ascending)
}

pub(crate) fn sort_with_indices_with<T: Element, A: BufferAllocator>(
    alloc: &A,
    array: &NdArray<T>,
    dim: usize,
    ascending: bool,
) -> Result<SortedWithIndices<T>> {
    let rank = array.rank();
    if dim >= rank {
        return Err(NdError::DimensionOutOfRange { dim, rank });
    }
    let values = NdArray::zeros_with(alloc, array.shape(), array.order())?;
    let indices = NdArray::zeros_with(alloc, array.shape(), array.order())?;
    let count = array.vectors_along_dimension(dim)?;
    debug!(dim, vectors = count, ascending, "sorting vectors");

    let mut perm: Vec<usize> = Vec::with_capacity(array.shape()[dim]);
    for i in 0..count {
        let src = array.vector_along_dimension(i, dim)?.to_vec();
        perm.clear();
        perm.extend(0..src.len());
        if ascending {
            perm.sort_by(|&a, &b| src[a].total_order(&src[b]));
        } else {
            perm.sort_by(|&a, &b| src[b].total_order(&src[a]));
        }
        values
            .vector_along_dimension(i, dim)?
            .write_logical(perm.iter().map(|&p| src[p]));
        indices
            .vector_along_dimension(i, dim)?
            .write_logical(perm.iter().map(|&p| T::from_usize(p)));
    }
    Ok(SortedWithIndices { values, indices })
}

/// Sorted values along `dim`, without the indices.
pub fn sort<T: Element>(array: &NdArray<T>, dim: usize, ascending: bool) -> Result<NdArray<T>> {
    sort_with_indices(array, dim, ascending).map(|s| s.values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Order;

    #[test]
    fn test_sort_vector_both_directions() {
        let a = NdArray::from_vec(vec![3.0, 1.0, 4.0, 2.0], &[4], Order::RowMajor).unwrap();
        let up = sort_with_indices(&a, 0, true).unwrap();
        assert_eq!(up.indices.to_vec(), vec![1.0, 3.0, 0.0, 2.0]);
        let down = sort_with_indices(&a, 0, false).unwrap();
        assert_eq!(down.values.to_vec(), vec![4.0, 3.0, 2.0, 1.0]);
        assert_eq!(down.indices.to_vec(), vec![2.0, 0.0, 3.0, 1.0]);
        // Source untouched.
        assert_eq!(a.to_vec(), vec![3.0, 1.0, 4.0, 2.0]);
    }

    #[test]
    fn test_sort_is_stable() {
        let a = NdArray::from_vec(vec![2.0, 1.0, 2.0, 1.0], &[4], Order::RowMajor).unwrap();
        let up = sort_with_indices(&a, 0, true).unwrap();
        assert_eq!(up.indices.to_vec(), vec![1.0, 3.0, 0.0, 2.0]);
        let down = sort_with_indices(&a, 0, false).unwrap();
        assert_eq!(down.indices.to_vec(), vec![0.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_sort_matrix_along_each_dim() {
        let a = NdArray::from_rows(&[vec![3.0, 1.0, 2.0], vec![0.0, 5.0, 4.0]], Order::ColumnMajor)
            .unwrap();
        let rows = sort(&a, 1, true).unwrap();
        assert_eq!(rows.to_vec(), vec![1.0, 2.0, 3.0, 0.0, 4.0, 5.0]);
        assert_eq!(rows.order(), Order::ColumnMajor);
        let cols = sort_with_indices(&a, 0, true).unwrap();
        assert_eq!(cols.values.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 5.0, 4.0]);
        assert_eq!(cols.indices.to_vec(), vec![1.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_sort_nan_last() {
        let a = NdArray::from_vec(vec![f64::NAN, 1.0, -1.0], &[3], Order::RowMajor).unwrap();
        let s = sort(&a, 0, true).unwrap().to_vec();
        assert_eq!(&s[..2], &[-1.0, 1.0]);
        assert!(s[2].is_nan());
    }

    #[test]
    fn test_sorted_debug() {
        let a = NdArray::from_vec(vec![2.0, 1.0], &[2], Order::RowMajor).unwrap();
        let shown = format!("{:?}", sort_with_indices(&a, 0, true).unwrap());
        assert!(shown.starts_with("SortedWithIndices"));
        assert!(shown.contains("indices"));
    }

    #[test]
    fn test_sort_bad_dim() {
        let a = NdArray::<f64>::zeros(&[2, 2], Order::RowMajor);
        assert!(matches!(
            sort(&a, 2, true),
            Err(NdError::DimensionOutOfRange { dim: 2, rank: 2 })
        ));
    }
}
