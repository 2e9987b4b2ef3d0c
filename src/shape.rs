//! Shape descriptors and the coordinate-to-offset mapping.
//!
//! A [`ShapeDescriptor`] is everything a view knows about its layout: sizes,
//! per-dimension strides (in elements), the base offset into the buffer, the
//! ordering tag, and a [`ViewKind`] recording how the view was derived. One
//! offset algorithm ([`ShapeDescriptor::offset_of`]) serves every kind.

use smallvec::SmallVec;

use crate::order::Order;
use crate::{NdError, Result};

/// Dimension sizes. Inline for rank ≤ 4.
pub type Dims = SmallVec<[usize; 4]>;

/// Per-dimension strides in elements. Inline for rank ≤ 4.
pub type Strides = SmallVec<[isize; 4]>;

/// How a view was derived from its buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    /// Freshly allocated, or derived by slicing/reshaping.
    Direct,
    /// Axes reordered by `permute`/`transpose`.
    Permuted,
    /// At least one axis has stride 0 and size > 1.
    Broadcast,
    /// Rank-1 flattening of a layout that does not fuse into one stride.
    /// The single coordinate is unravelled (row-major) over `shape` and
    /// dotted with `strides`.
    Linear { shape: Dims, strides: Strides },
}

/// Shape, strides, offset and ordering of one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDescriptor {
    shape: Dims,
    strides: Strides,
    offset: usize,
    order: Order,
    kind: ViewKind,
}

impl ShapeDescriptor {
    /// Descriptor of a freshly allocated array: canonical strides, offset 0.
    pub fn contiguous(shape: &[usize], order: Order) -> Self {
        Self {
            shape: Dims::from_slice(shape),
            strides: order.strides_for(shape),
            offset: 0,
            order,
            kind: ViewKind::Direct,
        }
    }

    /// Descriptor from explicit parts. The kind is inferred from the strides.
    ///
    /// # Errors
    /// `ShapeMismatch` when `shape` and `strides` differ in length.
    pub fn new(shape: &[usize], strides: &[isize], offset: usize, order: Order) -> Result<Self> {
        if shape.len() != strides.len() {
            return Err(NdError::ShapeMismatch(
                shape.to_vec(),
                vec![strides.len()],
            ));
        }
        let kind = if has_broadcast_axis(shape, strides) {
            ViewKind::Broadcast
        } else {
            ViewKind::Direct
        };
        Ok(Self {
            shape: Dims::from_slice(shape),
            strides: Strides::from_slice(strides),
            offset,
            order,
            kind,
        })
    }

    pub(crate) fn from_raw(
        shape: Dims,
        strides: Strides,
        offset: usize,
        order: Order,
        kind: ViewKind,
    ) -> Self {
        Self {
            shape,
            strides,
            offset,
            order,
            kind,
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    #[inline]
    pub fn kind(&self) -> &ViewKind {
        &self.kind
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of addressable elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.contains(&0)
    }

    /// A single element, whatever the rank.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.len() == 1
    }

    pub(crate) fn shape_mut(&mut self) -> (&mut Dims, &mut Strides) {
        (&mut self.shape, &mut self.strides)
    }

    pub(crate) fn set_kind(&mut self, kind: ViewKind) {
        self.kind = kind;
    }

    // ------------------------------------------------------------------------
    // Offset calculation
    // ------------------------------------------------------------------------

    /// Buffer position of `coord`.
    ///
    /// # Errors
    /// - `DimensionOutOfRange` if `coord.len()` differs from the rank
    /// - `IndexOutOfRange` if any `coord[d] >= shape[d]`
    pub fn offset_of(&self, coord: &[usize]) -> Result<usize> {
        if coord.len() != self.rank() {
            return Err(NdError::DimensionOutOfRange {
                dim: coord.len(),
                rank: self.rank(),
            });
        }
        for (&index, &bound) in coord.iter().zip(self.shape.iter()) {
            if index >= bound {
                return Err(NdError::IndexOutOfRange { index, bound });
            }
        }
        Ok(self.offset_of_unchecked(coord))
    }

    /// Buffer position of `coord` without bounds checking.
    ///
    /// The caller guarantees `coord` is in range; descriptors attached to a
    /// buffer have been validated so the result is then a valid position.
    #[inline]
    pub(crate) fn offset_of_unchecked(&self, coord: &[usize]) -> usize {
        match &self.kind {
            ViewKind::Linear { shape, strides } => {
                let mut rem = coord[0];
                let mut pos = self.offset as isize;
                for d in (0..shape.len()).rev() {
                    let size = shape[d];
                    pos += (rem % size) as isize * strides[d];
                    rem /= size;
                }
                pos as usize
            }
            _ => {
                let mut pos = self.offset as isize;
                for (&index, &stride) in coord.iter().zip(self.strides.iter()) {
                    pos += index as isize * stride;
                }
                pos as usize
            }
        }
    }

    /// Buffer position of the element at row-major linear index `index`.
    #[inline]
    pub(crate) fn offset_of_linear(&self, index: usize) -> usize {
        match &self.kind {
            ViewKind::Linear { .. } => self.offset_of_unchecked(&[index]),
            _ => {
                let mut rem = index;
                let mut pos = self.offset as isize;
                for d in (0..self.shape.len()).rev() {
                    let size = self.shape[d];
                    pos += (rem % size) as isize * self.strides[d];
                    rem /= size;
                }
                pos as usize
            }
        }
    }

    /// Check that every reachable position lies inside a buffer of `len`.
    ///
    /// # Errors
    /// `IndexOutOfRange` naming the furthest reachable position.
    pub fn validate_bounds(&self, len: usize) -> Result<()> {
        match &self.kind {
            ViewKind::Linear { shape, strides } => validate_bounds(len, shape, strides, self.offset),
            _ => validate_bounds(len, &self.shape, &self.strides, self.offset),
        }
    }

    // ------------------------------------------------------------------------
    // Layout queries
    // ------------------------------------------------------------------------

    /// True if some axis of size > 1 repeats one element (stride 0).
    pub fn has_broadcast_axis(&self) -> bool {
        match &self.kind {
            ViewKind::Linear { shape, strides } => has_broadcast_axis(shape, strides),
            _ => has_broadcast_axis(&self.shape, &self.strides),
        }
    }

    /// Contiguous under the descriptor's own ordering: the strides equal the
    /// canonical strides of `order`, ignoring size-1 dimensions.
    pub fn is_contiguous(&self) -> bool {
        if matches!(self.kind, ViewKind::Linear { .. }) {
            return false;
        }
        let rank = self.rank();
        let mut expected = 1isize;
        let mut check = |d: usize| {
            if self.shape[d] <= 1 {
                return true;
            }
            if self.strides[d] != expected {
                return false;
            }
            expected *= self.shape[d] as isize;
            true
        };
        match self.order {
            Order::RowMajor => (0..rank).rev().all(&mut check),
            Order::ColumnMajor => (0..rank).all(&mut check),
        }
    }

    /// If a row-major walk over this view advances by one constant stride,
    /// return that stride.
    ///
    /// Adjacent dimensions fuse when `stride[d] == shape[d + 1] * stride[d + 1]`;
    /// size-1 dimensions never break fusion.
    pub fn fused_row_major_stride(&self) -> Option<isize> {
        if matches!(self.kind, ViewKind::Linear { .. }) {
            return None;
        }
        let mut inner: Option<(usize, isize)> = None;
        for d in (0..self.rank()).rev() {
            let (size, stride) = (self.shape[d], self.strides[d]);
            if size <= 1 {
                continue;
            }
            match inner {
                None => inner = Some((size, stride)),
                Some((span, step)) => {
                    if stride != span as isize * step {
                        return None;
                    }
                    inner = Some((span * size, step));
                }
            }
        }
        Some(inner.map_or(1, |(_, step)| step))
    }

    /// True if a row-major walk visits consecutive buffer positions.
    pub fn is_row_major_contiguous(&self) -> bool {
        self.fused_row_major_stride() == Some(1)
    }

    pub fn is_vector(&self) -> bool {
        match self.rank() {
            1 => true,
            2 => self.shape[0] == 1 || self.shape[1] == 1,
            _ => false,
        }
    }

    pub fn is_row_vector(&self) -> bool {
        match self.rank() {
            1 => true,
            2 => self.shape[0] == 1,
            _ => false,
        }
    }

    pub fn is_column_vector(&self) -> bool {
        self.rank() == 2 && self.shape[1] == 1
    }

    pub fn is_matrix(&self) -> bool {
        self.rank() == 2
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Validate that all accessed offsets stay within `[0, len)`.
///
/// Offset arithmetic that overflows `isize` is reported as out of range.
pub(crate) fn validate_bounds(
    len: usize,
    dims: &[usize],
    strides: &[isize],
    offset: usize,
) -> Result<()> {
    // Empty array - no access needed
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let overflow = || NdError::IndexOutOfRange {
        index: usize::MAX,
        bound: len,
    };
    let base = isize::try_from(offset).map_err(|_| overflow())?;
    let mut min_offset = base;
    let mut max_offset = base;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let span = isize::try_from(dim - 1).map_err(|_| overflow())?;
            let end = stride.checked_mul(span).ok_or_else(overflow)?;
            if end >= 0 {
                max_offset = max_offset.checked_add(end).ok_or_else(overflow)?;
            } else {
                min_offset = min_offset.checked_add(end).ok_or_else(overflow)?;
            }
        }
    }
    if min_offset < 0 {
        return Err(NdError::IndexOutOfRange {
            index: 0,
            bound: len,
        });
    }
    if max_offset as usize >= len {
        return Err(NdError::IndexOutOfRange {
            index: max_offset as usize,
            bound: len,
        });
    }
    Ok(())
}

/// Element count of `shape`, or `None` if it does not fit in `usize`.
pub fn checked_len(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &s| acc.checked_mul(s))
}

pub(crate) fn has_broadcast_axis(dims: &[usize], strides: &[isize]) -> bool {
    dims.iter()
        .zip(strides.iter())
        .any(|(&d, &s)| d > 1 && s == 0)
}

/// Row-major coordinate of linear index `index` within `shape`.
pub fn unravel(index: usize, shape: &[usize]) -> Dims {
    let mut coord: Dims = smallvec::smallvec![0; shape.len()];
    let mut rem = index;
    for d in (0..shape.len()).rev() {
        let size = shape[d].max(1);
        coord[d] = rem % size;
        rem /= size;
    }
    coord
}

/// Sort `dims` ascending, rejecting out-of-range and repeated entries.
pub(crate) fn normalize_dims(dims: &[usize], rank: usize) -> Result<Dims> {
    let mut sorted = Dims::from_slice(dims);
    sorted.sort_unstable();
    for w in sorted.windows(2) {
        if w[0] == w[1] {
            return Err(NdError::DuplicateDimension(w[0]));
        }
    }
    if let Some(&dim) = sorted.iter().find(|&&d| d >= rank) {
        return Err(NdError::DimensionOutOfRange { dim, rank });
    }
    Ok(sorted)
}
