//! Zero-copy view derivation: slicing, permutation, reshape, broadcast and
//! linearization.
//!
//! Every operation here builds a new [`ShapeDescriptor`] over the receiver's
//! buffer. The only exceptions are `reshape` of a non-contiguous source,
//! which first takes a contiguous copy, and the explicit copies `ravel`,
//! `get_rows` and `get_columns`.

use std::ops::Range;

use smallvec::smallvec;
use tracing::debug;

use crate::array::NdArray;
use crate::backend::{BufferAllocator, HeapAllocator};
use crate::element::Element;
use crate::shape::{checked_len, has_broadcast_axis, unravel, Dims, ShapeDescriptor, Strides, ViewKind};
use crate::{NdError, Result};

/// Kind of a view derived from a `base` view.
fn derived_kind(base: &ViewKind, shape: &[usize], strides: &[isize], permuted: bool) -> ViewKind {
    if has_broadcast_axis(shape, strides) {
        ViewKind::Broadcast
    } else if permuted || matches!(base, ViewKind::Permuted) {
        ViewKind::Permuted
    } else {
        ViewKind::Direct
    }
}

/// Check that `perm` is a permutation of `0..rank`.
fn validate_permutation(perm: &[usize], shape: &[usize]) -> Result<()> {
    let rank = shape.len();
    if perm.len() != rank {
        return Err(NdError::ShapeMismatch(perm.to_vec(), shape.to_vec()));
    }
    let mut seen: Dims = smallvec![0; rank];
    for &p in perm {
        if p >= rank {
            return Err(NdError::DimensionOutOfRange { dim: p, rank });
        }
        if seen[p] != 0 {
            return Err(NdError::DuplicateDimension(p));
        }
        seen[p] = 1;
    }
    Ok(())
}

impl<T: Element> NdArray<T> {
    pub(crate) fn is_linear(&self) -> bool {
        matches!(self.descriptor().kind(), ViewKind::Linear { .. })
    }

    pub(crate) fn view_with(&self, shape: Dims, strides: Strides, offset: usize, permuted: bool) -> Self {
        let kind = derived_kind(self.descriptor().kind(), &shape, &strides, permuted);
        self.with_descriptor(ShapeDescriptor::from_raw(
            shape,
            strides,
            offset,
            self.order(),
            kind,
        ))
    }

    // ========================================================================
    // Slicing
    // ========================================================================

    /// Fix coordinate `index` on `dim`.
    ///
    /// The result keeps the buffer. Its shape follows the retention rule:
    /// rank ≥ 3 drops `dim`; rank 2 keeps it with size 1 (`[m, n]` → `[1, n]`
    /// or `[m, 1]`); rank 1 yields `[1]`.
    ///
    /// # Errors
    /// `DimensionOutOfRange` if `dim >= rank` (always for rank 0);
    /// `IndexOutOfRange` if `index >= shape[dim]`.
    pub fn slice(&self, index: usize, dim: usize) -> Result<Self> {
        let rank = self.rank();
        if dim >= rank {
            return Err(NdError::DimensionOutOfRange { dim, rank });
        }
        let bound = self.shape()[dim];
        if index >= bound {
            return Err(NdError::IndexOutOfRange { index, bound });
        }
        if self.is_linear() {
            let pos = self.descriptor().offset_of_linear(index);
            return Ok(self.view_with(smallvec![1], smallvec![1], pos, false));
        }

        let offset = (self.offset() as isize + index as isize * self.strides()[dim]) as usize;
        let mut shape = Dims::from_slice(self.shape());
        let mut strides = Strides::from_slice(self.strides());
        match rank {
            1 => {
                shape[0] = 1;
                strides[0] = 1;
            }
            2 => shape[dim] = 1,
            _ => {
                shape.remove(dim);
                strides.remove(dim);
            }
        }
        Ok(self.view_with(shape, strides, offset, false))
    }

    /// Row `i` of a matrix as a `[1, n]` view.
    pub fn get_row(&self, i: usize) -> Result<Self> {
        if self.rank() != 2 {
            return Err(NdError::UnsupportedViewOperation("get_row requires rank 2"));
        }
        self.slice(i, 0)
    }

    /// Column `i` of a matrix as an `[m, 1]` view.
    pub fn get_column(&self, i: usize) -> Result<Self> {
        if self.rank() != 2 {
            return Err(NdError::UnsupportedViewOperation("get_column requires rank 2"));
        }
        self.slice(i, 1)
    }

    /// Rectangular sub-block: one half-open range per dimension.
    ///
    /// # Errors
    /// `DimensionOutOfRange` if `ranges.len()` differs from the rank;
    /// `IndexOutOfRange` if a range reaches past its dimension.
    pub fn sub_array(&self, ranges: &[Range<usize>]) -> Result<Self> {
        let rank = self.rank();
        if ranges.len() != rank {
            return Err(NdError::DimensionOutOfRange {
                dim: ranges.len(),
                rank,
            });
        }
        if self.is_linear() {
            return Err(NdError::UnsupportedViewOperation("sub_array of a linear view"));
        }
        let mut shape = Dims::with_capacity(rank);
        let mut offset = self.offset() as isize;
        for (range, (&bound, &stride)) in ranges.iter().zip(self.shape().iter().zip(self.strides())) {
            if range.end > bound || range.start > range.end {
                return Err(NdError::IndexOutOfRange {
                    index: range.end.max(range.start),
                    bound,
                });
            }
            shape.push(range.end - range.start);
            offset += range.start as isize * stride;
        }
        let strides = Strides::from_slice(self.strides());
        Ok(self.view_with(shape, strides, offset as usize, false))
    }

    /// New matrix holding copies of the selected rows, in order.
    pub fn get_rows(&self, indices: &[usize]) -> Result<Self> {
        self.get_rows_with(&HeapAllocator, indices)
    }

    pub(crate) fn get_rows_with<A: BufferAllocator>(&self, alloc: &A, indices: &[usize]) -> Result<Self> {
        if self.rank() != 2 {
            return Err(NdError::UnsupportedViewOperation("get_rows requires rank 2"));
        }
        let out = Self::zeros_with(alloc, &[indices.len(), self.shape()[1]], self.order())?;
        debug!(rows = indices.len(), "assembling rows into a new array");
        for (r, &i) in indices.iter().enumerate() {
            out.get_row(r)?.assign_exact(&self.get_row(i)?)?;
        }
        Ok(out)
    }

    /// New matrix holding copies of the selected columns, in order.
    pub fn get_columns(&self, indices: &[usize]) -> Result<Self> {
        self.get_columns_with(&HeapAllocator, indices)
    }

    pub(crate) fn get_columns_with<A: BufferAllocator>(&self, alloc: &A, indices: &[usize]) -> Result<Self> {
        if self.rank() != 2 {
            return Err(NdError::UnsupportedViewOperation("get_columns requires rank 2"));
        }
        let out = Self::zeros_with(alloc, &[self.shape()[0], indices.len()], self.order())?;
        debug!(columns = indices.len(), "assembling columns into a new array");
        for (c, &j) in indices.iter().enumerate() {
            out.get_column(c)?.assign_exact(&self.get_column(j)?)?;
        }
        Ok(out)
    }

    // ========================================================================
    // Put variants
    // ========================================================================

    /// Overwrite row `i` with the elements of `src`.
    ///
    /// # Errors
    /// `ShapeMismatch` unless `src` has exactly as many elements as the row.
    pub fn put_row(&self, i: usize, src: &NdArray<T>) -> Result<()> {
        self.get_row(i)?.assign_exact(src)
    }

    /// Overwrite column `i` with the elements of `src`.
    pub fn put_column(&self, i: usize, src: &NdArray<T>) -> Result<()> {
        self.get_column(i)?.assign_exact(src)
    }

    /// Overwrite slice `i` along dimension 0 with the elements of `src`.
    pub fn put_slice(&self, i: usize, src: &NdArray<T>) -> Result<()> {
        self.slice(i, 0)?.assign_exact(src)
    }

    /// Element-wise copy requiring equal lengths. Source values are read
    /// before any write.
    fn assign_exact(&self, src: &NdArray<T>) -> Result<()> {
        self.ensure_writable()?;
        if src.len() != self.len() {
            return Err(NdError::ShapeMismatch(
                self.shape().to_vec(),
                src.shape().to_vec(),
            ));
        }
        self.write_logical(src.to_vec());
        Ok(())
    }

    // ========================================================================
    // Axis permutation
    // ========================================================================

    /// Reverse all axes. O(1); the offset is unchanged.
    pub fn transpose(&self) -> Self {
        if self.rank() <= 1 {
            return self.clone();
        }
        let shape: Dims = self.shape().iter().rev().copied().collect();
        let strides: Strides = self.strides().iter().rev().copied().collect();
        self.view_with(shape, strides, self.offset(), true)
    }

    /// Reorder axes: axis `i` of the result is axis `perm[i]` of the source.
    ///
    /// # Errors
    /// `ShapeMismatch` for a wrong-length permutation, `DimensionOutOfRange`
    /// for an entry ≥ rank, `DuplicateDimension` for a repeated entry.
    pub fn permute(&self, perm: &[usize]) -> Result<Self> {
        validate_permutation(perm, self.shape())?;
        if self.rank() <= 1 {
            return Ok(self.clone());
        }
        let shape: Dims = perm.iter().map(|&p| self.shape()[p]).collect();
        let strides: Strides = perm.iter().map(|&p| self.strides()[p]).collect();
        Ok(self.view_with(shape, strides, self.offset(), true))
    }

    /// In-place [`NdArray::transpose`] of this view's own descriptor.
    pub fn transposei(&mut self) {
        let transposed = self.transpose();
        *self.descriptor_mut() = transposed.descriptor().clone();
    }

    /// In-place [`NdArray::permute`] of this view's own descriptor.
    pub fn permutei(&mut self, perm: &[usize]) -> Result<()> {
        let permuted = self.permute(perm)?;
        *self.descriptor_mut() = permuted.descriptor().clone();
        Ok(())
    }

    /// Exchange axes `a` and `b`.
    pub fn swap_axes(&self, a: usize, b: usize) -> Result<Self> {
        let rank = self.rank();
        for dim in [a, b] {
            if dim >= rank {
                return Err(NdError::DimensionOutOfRange { dim, rank });
            }
        }
        let mut perm: Dims = (0..rank).collect();
        perm.swap(a, b);
        self.permute(&perm)
    }

    /// Move `axis` so that it sits at position `start`, keeping the relative
    /// order of the other axes.
    pub fn roll_axis(&self, axis: usize, start: usize) -> Result<Self> {
        let rank = self.rank();
        if axis >= rank {
            return Err(NdError::DimensionOutOfRange { dim: axis, rank });
        }
        if start > rank {
            return Err(NdError::DimensionOutOfRange { dim: start, rank });
        }
        let mut perm: Dims = (0..rank).filter(|&d| d != axis).collect();
        let target = if start > axis { start - 1 } else { start };
        perm.insert(target, axis);
        self.permute(&perm)
    }

    /// Insert a size-1 axis before position `axis` (`axis == rank` appends).
    pub fn expand_dims(&self, axis: usize) -> Result<Self> {
        let rank = self.rank();
        if axis > rank {
            return Err(NdError::DimensionOutOfRange { dim: axis, rank });
        }
        if self.is_linear() {
            return Err(NdError::UnsupportedViewOperation("expand_dims of a linear view"));
        }
        let stride = if axis < rank {
            self.strides()[axis] * self.shape()[axis] as isize
        } else {
            1
        };
        let mut shape = Dims::from_slice(self.shape());
        let mut strides = Strides::from_slice(self.strides());
        shape.insert(axis, 1);
        strides.insert(axis, stride);
        Ok(self.view_with(shape, strides, self.offset(), false))
    }

    // ========================================================================
    // Reshape
    // ========================================================================

    /// View the same elements under `shape`, reinterpreting storage in this
    /// array's order.
    ///
    /// Contiguous sources give an O(1) view at the source offset. Other
    /// sources are first copied into a contiguous buffer in their order.
    ///
    /// # Errors
    /// `ShapeMismatch` if the element counts differ.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        self.reshape_with(&HeapAllocator, shape)
    }

    pub(crate) fn reshape_with<A: BufferAllocator>(&self, alloc: &A, shape: &[usize]) -> Result<Self> {
        if checked_len(shape) != Some(self.len()) {
            return Err(NdError::ShapeMismatch(
                self.shape().to_vec(),
                shape.to_vec(),
            ));
        }
        let source = if self.descriptor().is_contiguous() {
            self.clone()
        } else {
            debug!(
                from = ?self.shape(),
                to = ?shape,
                "reshape of a non-contiguous view; copying"
            );
            self.dup_with(alloc, self.order())?
        };
        let order = source.order();
        Ok(source.with_descriptor(ShapeDescriptor::from_raw(
            Dims::from_slice(shape),
            order.strides_for(shape),
            source.offset(),
            order,
            ViewKind::Direct,
        )))
    }

    /// [`NdArray::reshape`] where a single `-1` entry is inferred from the
    /// element count.
    pub fn reshape_with_wildcard(&self, shape: &[isize]) -> Result<Self> {
        let mut wildcard = None;
        let mut known = 1usize;
        for (d, &s) in shape.iter().enumerate() {
            match s {
                -1 if wildcard.is_none() => wildcard = Some(d),
                -1 => {
                    return Err(NdError::UnsupportedViewOperation(
                        "reshape allows at most one inferred dimension",
                    ))
                }
                s if s < 0 => {
                    return Err(NdError::UnsupportedViewOperation("negative reshape dimension"))
                }
                s => known *= s as usize,
            }
        }
        let mut resolved: Dims = shape.iter().map(|&s| s.max(0) as usize).collect();
        if let Some(d) = wildcard {
            if known == 0 || self.len() % known != 0 {
                return Err(NdError::ShapeMismatch(
                    self.shape().to_vec(),
                    resolved.to_vec(),
                ));
            }
            resolved[d] = self.len() / known;
        }
        self.reshape(&resolved)
    }

    // ========================================================================
    // Broadcast and linearization
    // ========================================================================

    /// Stretch this view to `target` without copying.
    ///
    /// Missing leading axes are added with size 1; size-1 axes that grow get
    /// stride 0. The result cannot be written through.
    ///
    /// # Errors
    /// `ShapeMismatch` if a non-1 size disagrees with `target` or `target`
    /// has lower rank.
    pub fn broadcast(&self, target: &[usize]) -> Result<Self> {
        let rank = self.rank();
        let mismatch = || NdError::ShapeMismatch(self.shape().to_vec(), target.to_vec());
        if target.len() < rank {
            return Err(mismatch());
        }
        if self.shape() == target {
            return Ok(self.clone());
        }
        if self.is_linear() {
            return Err(NdError::UnsupportedViewOperation("broadcast of a linear view"));
        }
        let lead = target.len() - rank;
        let mut strides: Strides = smallvec![0; target.len()];
        for d in 0..rank {
            let (size, want) = (self.shape()[d], target[lead + d]);
            if size == want {
                strides[lead + d] = self.strides()[d];
            } else if size != 1 {
                return Err(mismatch());
            }
        }
        Ok(self.view_with(Dims::from_slice(target), strides, self.offset(), false))
    }

    /// Rank-1 `[len]` view visiting the elements in row-major logical order.
    ///
    /// Sources whose row-major walk has one constant stride become a plain
    /// strided view; others become a `Linear` view that recomputes the
    /// source coordinate per index.
    pub fn linear_view(&self) -> Self {
        if self.is_linear() {
            return self.clone();
        }
        let len = self.len();
        let mut desc = match self.descriptor().fused_row_major_stride() {
            Some(step) => ShapeDescriptor::from_raw(
                smallvec![len],
                smallvec![step],
                self.offset(),
                self.order(),
                ViewKind::Direct,
            ),
            None => ShapeDescriptor::from_raw(
                smallvec![len],
                smallvec![1],
                self.offset(),
                self.order(),
                ViewKind::Linear {
                    shape: Dims::from_slice(self.shape()),
                    strides: Strides::from_slice(self.strides()),
                },
            ),
        };
        if desc.has_broadcast_axis() && !matches!(desc.kind(), ViewKind::Linear { .. }) {
            desc.set_kind(ViewKind::Broadcast);
        }
        self.with_descriptor(desc)
    }

    /// Row-major logical copy into a fresh rank-1 array.
    pub fn ravel(&self) -> Self {
        Self::from_logical(self.to_vec(), &[self.len()], self.order())
    }

    pub(crate) fn ravel_with<A: BufferAllocator>(&self, alloc: &A) -> Result<Self> {
        Self::from_logical_with(alloc, self.iter(), &[self.len()], self.order())
    }

    // ========================================================================
    // Tiling
    // ========================================================================

    /// Tile this array to fill `target`.
    ///
    /// The source is padded with leading size-1 axes to the target's rank;
    /// every target size must then be a whole multiple of the matching
    /// source size. Element `c` of the result is the source element at
    /// `c` modulo the source shape.
    ///
    /// # Errors
    /// `ShapeMismatch` if `target` has lower rank or a size is not a
    /// multiple of the source size.
    pub fn repmat(&self, target: &[usize]) -> Result<Self> {
        self.repmat_with(&HeapAllocator, target)
    }

    pub(crate) fn repmat_with<A: BufferAllocator>(&self, alloc: &A, target: &[usize]) -> Result<Self> {
        let rank = self.rank();
        if target.len() < rank {
            return Err(NdError::ShapeMismatch(self.shape().to_vec(), target.to_vec()));
        }
        let lead = target.len() - rank;
        let fits = target[lead..]
            .iter()
            .zip(self.shape())
            .all(|(&t, &s)| if s == 0 { t == 0 } else { t % s == 0 });
        if !fits {
            return Err(NdError::ShapeMismatch(self.shape().to_vec(), target.to_vec()));
        }
        let out = Self::zeros_with(alloc, target, self.order())?;
        debug!(from = ?self.shape(), to = ?target, "tiling into a new array");
        let desc = self.descriptor();
        let values = (0..out.len()).map(|i| {
            let coord = unravel(i, target);
            let src: Dims = coord[lead..]
                .iter()
                .zip(self.shape())
                .map(|(&c, &s)| c % s)
                .collect();
            self.buffer().get(desc.offset_of_unchecked(&src))
        });
        out.write_logical(values);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Order;

    fn arange_2d(rows: usize, cols: usize, order: Order) -> NdArray<f64> {
        NdArray::arange(1.0, (rows * cols) as f64 + 1.0, order)
            .reshape(&[rows, cols])
            .unwrap()
    }

    #[test]
    fn test_slice_retention() {
        let cases: &[(&[usize], usize, &[usize])] = &[
            (&[1, 10, 10], 1, &[1, 10]),
            (&[10, 10, 1], 0, &[10, 1]),
            (&[1, 10, 1], 1, &[1, 1]),
            (&[1, 10, 10, 1], 3, &[1, 10, 10]),
            (&[10, 10, 10, 10], 2, &[10, 10, 10]),
            (&[4, 5], 0, &[1, 5]),
            (&[4, 5], 1, &[4, 1]),
            (&[7], 0, &[1]),
        ];
        for &(shape, dim, expected) in cases {
            let a = NdArray::<f64>::zeros(shape, Order::RowMajor);
            assert_eq!(a.slice(0, dim).unwrap().shape(), expected, "{shape:?} dim {dim}");
        }
        assert!(matches!(
            NdArray::scalar(1.0f64).slice(0, 0),
            Err(NdError::DimensionOutOfRange { dim: 0, rank: 0 })
        ));
    }

    #[test]
    fn test_slice_aliases() {
        let a = arange_2d(3, 4, Order::RowMajor);
        let s = a.slice(1, 0).unwrap();
        assert_eq!(s.to_vec(), vec![5.0, 6.0, 7.0, 8.0]);
        s.put(&[0, 2], -1.0).unwrap();
        assert_eq!(a.get(&[1, 2]).unwrap(), -1.0);
        assert!(matches!(
            a.slice(3, 0),
            Err(NdError::IndexOutOfRange { index: 3, bound: 3 })
        ));
    }

    #[test]
    fn test_row_and_column_column_major() {
        // Column-major linspace(1, 4) reshaped: [[1, 3], [2, 4]].
        let a = NdArray::<f64>::linspace(1.0, 4.0, 4, Order::ColumnMajor)
            .reshape(&[2, 2])
            .unwrap();
        assert_eq!(a.get_row(0).unwrap().to_vec(), vec![1.0, 3.0]);
        assert_eq!(a.get_column(1).unwrap().to_vec(), vec![3.0, 4.0]);
        assert_eq!(a.get_column(1).unwrap().shape(), &[2, 1]);

        let col = NdArray::from_vec(vec![5.0, 6.0], &[2], Order::ColumnMajor).unwrap();
        a.put_column(0, &col).unwrap();
        assert_eq!(a.get_column(0).unwrap().to_vec(), vec![5.0, 6.0]);
        a.put_row(1, &NdArray::from_vec(vec![7.0, 8.0], &[2], Order::RowMajor).unwrap())
            .unwrap();
        assert_eq!(a.to_vec(), vec![5.0, 3.0, 7.0, 8.0]);

        let wrong = NdArray::<f64>::zeros(&[3], Order::RowMajor);
        assert!(matches!(a.put_row(0, &wrong), Err(NdError::ShapeMismatch(_, _))));
        let cube = NdArray::<f64>::zeros(&[2, 2, 2], Order::RowMajor);
        assert!(matches!(
            cube.get_row(0),
            Err(NdError::UnsupportedViewOperation(_))
        ));
    }

    #[test]
    fn test_put_row_from_overlapping_view() {
        let a = arange_2d(2, 2, Order::RowMajor);
        let col = a.get_column(0).unwrap();
        a.put_row(0, &col).unwrap();
        assert_eq!(a.to_vec(), vec![1.0, 3.0, 3.0, 4.0]);
    }

    #[test]
    fn test_put_slice() {
        let a = NdArray::<f64>::zeros(&[2, 2, 2], Order::ColumnMajor);
        let src = NdArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], Order::RowMajor).unwrap();
        a.put_slice(1, &src).unwrap();
        assert_eq!(a.slice(1, 0).unwrap(), src);
        assert_eq!(a.slice(0, 0).unwrap().to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn test_get_rows_and_columns_copy() {
        let a = arange_2d(3, 3, Order::RowMajor);
        let rows = a.get_rows(&[2, 0]).unwrap();
        assert_eq!(rows.to_vec(), vec![7.0, 8.0, 9.0, 1.0, 2.0, 3.0]);
        let cols = a.get_columns(&[1]).unwrap();
        assert_eq!(cols.shape(), &[3, 1]);
        assert_eq!(cols.to_vec(), vec![2.0, 5.0, 8.0]);
        assert!(!cols.shares_buffer(&a));
    }

    #[test]
    fn test_transpose_is_view() {
        let a = arange_2d(2, 3, Order::RowMajor);
        let t = a.transpose();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.strides(), &[1, 3]);
        assert_eq!(t.offset(), a.offset());
        assert_eq!(t.descriptor().kind(), &ViewKind::Permuted);
        t.put(&[2, 1], 0.0).unwrap();
        assert_eq!(a.get(&[1, 2]).unwrap(), 0.0);
        assert_eq!(t.transpose(), a);
    }

    #[test]
    fn test_permute_validation() {
        let a = NdArray::<f64>::zeros(&[2, 3, 4], Order::RowMajor);
        let p = a.permute(&[2, 0, 1]).unwrap();
        assert_eq!(p.shape(), &[4, 2, 3]);
        assert_eq!(p.strides(), &[1, 12, 4]);
        assert!(matches!(a.permute(&[0, 1]), Err(NdError::ShapeMismatch(_, _))));
        assert!(matches!(
            a.permute(&[0, 1, 3]),
            Err(NdError::DimensionOutOfRange { dim: 3, rank: 3 })
        ));
        assert!(matches!(
            a.permute(&[0, 1, 1]),
            Err(NdError::DuplicateDimension(1))
        ));
    }

    #[test]
    fn test_in_place_permutations() {
        let mut a = NdArray::<f64>::zeros(&[2, 3, 4], Order::RowMajor);
        let other = a.clone();
        a.transposei();
        assert_eq!(a.shape(), &[4, 3, 2]);
        assert_eq!(other.shape(), &[2, 3, 4]);
        a.permutei(&[1, 0, 2]).unwrap();
        assert_eq!(a.shape(), &[3, 4, 2]);
        assert!(a.permutei(&[0, 0, 1]).is_err());
        assert_eq!(a.shape(), &[3, 4, 2]);
    }

    #[test]
    fn test_swap_and_roll_axes() {
        let a = NdArray::<f64>::zeros(&[2, 3, 4, 5], Order::RowMajor);
        assert_eq!(a.swap_axes(0, 3).unwrap().shape(), &[5, 3, 4, 2]);
        assert_eq!(a.roll_axis(3, 1).unwrap().shape(), &[2, 5, 3, 4]);
        assert_eq!(a.roll_axis(0, 4).unwrap().shape(), &[3, 4, 5, 2]);
        assert!(a.roll_axis(4, 0).is_err());
    }

    #[test]
    fn test_expand_dims() {
        let a = NdArray::from_vec(vec![1.0, 2.0, 3.0], &[3], Order::RowMajor).unwrap();
        let row = a.expand_dims(0).unwrap();
        assert_eq!(row.shape(), &[1, 3]);
        let col = a.expand_dims(1).unwrap();
        assert_eq!(col.shape(), &[3, 1]);
        assert_eq!(col.to_vec(), a.to_vec());
        assert!(a.expand_dims(2).is_err());
    }

    #[test]
    fn test_reshape_contiguous_is_view() {
        let a = NdArray::<f64>::arange(0.0, 6.0, Order::RowMajor);
        let r = a.reshape(&[2, 3]).unwrap();
        assert!(r.shares_buffer(&a));
        assert_eq!(r.get(&[1, 0]).unwrap(), 3.0);
        let same = r.reshape(&[2, 3]).unwrap();
        assert_eq!(same.strides(), r.strides());
        assert!(same.shares_buffer(&r));
        assert!(matches!(a.reshape(&[4, 2]), Err(NdError::ShapeMismatch(_, _))));
    }

    #[test]
    fn test_reshape_follows_order() {
        let f = NdArray::<f64>::linspace(1.0, 6.0, 6, Order::ColumnMajor)
            .reshape(&[2, 3])
            .unwrap();
        assert_eq!(f.to_vec(), vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        let c = NdArray::<f64>::linspace(1.0, 6.0, 6, Order::RowMajor)
            .reshape(&[2, 3])
            .unwrap();
        assert_eq!(c.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_reshape_non_contiguous_copies() {
        let a = arange_2d(2, 3, Order::RowMajor);
        let t = a.transpose().reshape(&[6]).unwrap();
        assert!(!t.shares_buffer(&a));
        // Transposed copy stays row-major: logical order of the transpose.
        assert_eq!(t.to_vec(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_reshape_wildcard() {
        let a = NdArray::<f64>::zeros(&[4, 6], Order::RowMajor);
        assert_eq!(a.reshape_with_wildcard(&[-1, 8]).unwrap().shape(), &[3, 8]);
        assert_eq!(a.reshape_with_wildcard(&[2, -1, 3]).unwrap().shape(), &[2, 4, 3]);
        assert!(a.reshape_with_wildcard(&[-1, -1]).is_err());
        assert!(matches!(
            a.reshape_with_wildcard(&[-1, 5]),
            Err(NdError::ShapeMismatch(_, _))
        ));
    }

    #[test]
    fn test_broadcast_row_and_column() {
        let row = NdArray::from_vec(vec![1.0, 2.0, 3.0], &[1, 3], Order::RowMajor).unwrap();
        let b = row.broadcast(&[2, 3]).unwrap();
        assert_eq!(b.strides()[0], 0);
        assert_eq!(b.to_vec(), vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        assert_eq!(b.descriptor().kind(), &ViewKind::Broadcast);
        assert!(matches!(
            b.put(&[1, 1], 0.0),
            Err(NdError::UnsupportedViewOperation(_))
        ));

        let col = NdArray::from_vec(vec![1.0, 2.0], &[2, 1], Order::ColumnMajor).unwrap();
        assert_eq!(
            col.broadcast(&[2, 3]).unwrap().to_vec(),
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
        );

        let v = NdArray::from_vec(vec![1.0, 2.0], &[2], Order::RowMajor).unwrap();
        assert_eq!(v.broadcast(&[3, 2]).unwrap().shape(), &[3, 2]);
        assert!(matches!(v.broadcast(&[2, 3]), Err(NdError::ShapeMismatch(_, _))));
        assert!(matches!(
            row.broadcast(&[3]),
            Err(NdError::ShapeMismatch(_, _))
        ));
    }

    #[test]
    fn test_linear_view_sub_matrix() {
        let a = NdArray::<f64>::arange(1.0, 17.0, Order::ColumnMajor)
            .reshape(&[4, 4])
            .unwrap();
        let sub = a.sub_array(&[0..2, 0..2]).unwrap();
        let lin = sub.linear_view();
        assert_eq!(lin.shape(), &[4]);
        assert!(matches!(lin.descriptor().kind(), ViewKind::Linear { .. }));
        assert_eq!(lin.to_vec(), vec![1.0, 5.0, 2.0, 6.0]);
        lin.put_linear(3, 0.0).unwrap();
        assert_eq!(a.get(&[1, 1]).unwrap(), 0.0);
        assert_eq!(lin.slice(1, 0).unwrap().get(&[0]).unwrap(), 5.0);
    }

    #[test]
    fn test_linear_view_fused() {
        let a = arange_2d(2, 3, Order::RowMajor);
        let lin = a.linear_view();
        assert_eq!(lin.descriptor().kind(), &ViewKind::Direct);
        assert_eq!(lin.strides(), &[1]);
        assert_eq!(lin.to_vec(), a.to_vec());
    }

    #[test]
    fn test_ravel_copies() {
        let a = NdArray::<f64>::linspace(1.0, 4.0, 4, Order::ColumnMajor)
            .reshape(&[2, 2])
            .unwrap();
        let r = a.ravel();
        assert_eq!(r.to_vec(), vec![1.0, 3.0, 2.0, 4.0]);
        assert!(!r.shares_buffer(&a));
    }

    #[test]
    fn test_sub_array_bounds() {
        let a = NdArray::<f64>::zeros(&[3, 3], Order::RowMajor);
        assert_eq!(a.sub_array(&[1..3, 0..1]).unwrap().shape(), &[2, 1]);
        assert!(a.sub_array(&[0..4, 0..1]).is_err());
        assert!(a.sub_array(&[0..1]).is_err());
    }
}
