//! The array type: a shared buffer seen through one shape descriptor.

use std::fmt;

use tracing::debug;

use crate::backend::{BufferAllocator, ElementwiseTransform, HeapAllocator, MatmulBackend, Operand};
use crate::buffer::Buffer;
use crate::element::Element;
use crate::order::Order;
use crate::shape::{checked_len, normalize_dims, Dims, ShapeDescriptor, ViewKind};
use crate::{NdError, Result};

/// An N-dimensional view over a shared [`Buffer`].
///
/// Cloning an `NdArray` yields another view of the same buffer. Element
/// writes take `&self`: they go through the shared buffer and are observed
/// by every overlapping view. Use [`NdArray::dup`] for an independent copy.
pub struct NdArray<T> {
    buffer: Buffer<T>,
    desc: ShapeDescriptor,
}

impl<T> Clone for NdArray<T> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            desc: self.desc.clone(),
        }
    }
}

// ============================================================================
// Construction
// ============================================================================

impl<T: Element> NdArray<T> {
    /// Attach `desc` to `buffer`, validating that every position it can
    /// reach lies inside the buffer.
    ///
    /// # Errors
    /// `IndexOutOfRange` if the descriptor reaches past the buffer.
    pub fn from_buffer(buffer: Buffer<T>, desc: ShapeDescriptor) -> Result<Self> {
        desc.validate_bounds(buffer.len())?;
        Ok(Self { buffer, desc })
    }

    /// Build a view whose descriptor was derived from an already valid one.
    #[inline]
    pub(crate) fn from_parts(buffer: Buffer<T>, desc: ShapeDescriptor) -> Self {
        debug_assert!(desc.validate_bounds(buffer.len()).is_ok());
        Self { buffer, desc }
    }

    /// Wrap `data`, laid out in `order`'s storage order, as an array of `shape`.
    ///
    /// # Errors
    /// `ShapeMismatch` if `data.len()` differs from the product of `shape`
    /// or that product overflows.
    pub fn from_vec(data: Vec<T>, shape: &[usize], order: Order) -> Result<Self> {
        if checked_len(shape) != Some(data.len()) {
            return Err(NdError::ShapeMismatch(vec![data.len()], shape.to_vec()));
        }
        Ok(Self::from_parts(
            Buffer::from_vec(data),
            ShapeDescriptor::contiguous(shape, order),
        ))
    }

    /// Zero-filled array of `shape` in `order`, with storage from `alloc`.
    ///
    /// # Errors
    /// `ShapeMismatch` if the element count overflows; `IndexOutOfRange`
    /// if the allocator hands back a short buffer.
    pub(crate) fn zeros_with<A: BufferAllocator>(alloc: &A, shape: &[usize], order: Order) -> Result<Self> {
        let len = checked_len(shape)
            .ok_or_else(|| NdError::ShapeMismatch(shape.to_vec(), vec![usize::MAX]))?;
        Self::from_buffer(alloc.allocate(len), ShapeDescriptor::contiguous(shape, order))
    }

    /// [`NdArray::from_vec`] with storage from `alloc`.
    pub(crate) fn from_vec_with<A: BufferAllocator>(
        alloc: &A,
        data: Vec<T>,
        shape: &[usize],
        order: Order,
    ) -> Result<Self> {
        if checked_len(shape) != Some(data.len()) {
            return Err(NdError::ShapeMismatch(vec![data.len()], shape.to_vec()));
        }
        let out = Self::zeros_with(alloc, shape, order)?;
        for (cell, value) in out.buffer.cells().iter().zip(data) {
            cell.set(value);
        }
        Ok(out)
    }

    /// Allocate through `alloc` and fill from `values` in row-major logical
    /// order.
    pub(crate) fn from_logical_with<A: BufferAllocator>(
        alloc: &A,
        values: impl IntoIterator<Item = T>,
        shape: &[usize],
        order: Order,
    ) -> Result<Self> {
        let out = Self::zeros_with(alloc, shape, order)?;
        out.write_logical(values);
        Ok(out)
    }

    /// Allocate an array of `shape` in `order` and fill it from `values`
    /// given in row-major logical order.
    pub(crate) fn from_logical(values: Vec<T>, shape: &[usize], order: Order) -> Self {
        debug_assert_eq!(values.len(), shape.iter().product::<usize>());
        match order {
            Order::RowMajor => Self::from_parts(
                Buffer::from_vec(values),
                ShapeDescriptor::contiguous(shape, order),
            ),
            Order::ColumnMajor => {
                let out = Self::zeros(shape, order);
                out.write_logical(values);
                out
            }
        }
    }

    /// Rank-2 array from a list of equally long rows.
    ///
    /// # Errors
    /// `ShapeMismatch` if the rows differ in length.
    pub fn from_rows(rows: &[Vec<T>], order: Order) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(ragged) = rows.iter().find(|r| r.len() != cols) {
            return Err(NdError::ShapeMismatch(vec![cols], vec![ragged.len()]));
        }
        let values: Vec<T> = rows.iter().flatten().copied().collect();
        Ok(Self::from_logical(values, &[rows.len(), cols], order))
    }

    pub fn zeros(shape: &[usize], order: Order) -> Self {
        Self::filled(shape, T::zero(), order)
    }

    pub fn ones(shape: &[usize], order: Order) -> Self {
        Self::filled(shape, T::one(), order)
    }

    /// Array of `shape` with every element set to `value`.
    pub fn filled(shape: &[usize], value: T, order: Order) -> Self {
        let len = shape.iter().product();
        Self::from_parts(
            Buffer::filled(len, value),
            ShapeDescriptor::contiguous(shape, order),
        )
    }

    /// Rank-0 array holding `value`.
    pub fn scalar(value: T) -> Self {
        Self::filled(&[], value, Order::default())
    }

    /// `n` evenly spaced values from `start` to `stop` inclusive, as `[n]`.
    pub fn linspace(start: T, stop: T, n: usize, order: Order) -> Self {
        let step = if n > 1 {
            (stop - start) / T::from_usize(n - 1)
        } else {
            T::zero()
        };
        let values = (0..n).map(|i| start + step * T::from_usize(i)).collect();
        Self::from_logical(values, &[n], order)
    }

    /// `start, start + 1, ...` up to but excluding `end`, as a rank-1 array.
    pub fn arange(start: T, end: T, order: Order) -> Self {
        let n = (end - start).ceil().to_usize().unwrap_or(0);
        let values = (0..n).map(|i| start + T::from_usize(i)).collect();
        Self::from_logical(values, &[n], order)
    }

    /// `n × n` identity matrix.
    pub fn eye(n: usize, order: Order) -> Self {
        let out = Self::zeros(&[n, n], order);
        for i in 0..n {
            let pos = out.desc.offset_of_unchecked(&[i, i]);
            out.buffer.set(pos, T::one());
        }
        out
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl<T: Element> NdArray<T> {
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.desc.shape()
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.desc.strides()
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.desc.offset()
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.desc.order()
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.desc.rank()
    }

    /// Number of addressable elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.desc.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.desc.is_empty()
    }

    #[inline]
    pub fn descriptor(&self) -> &ShapeDescriptor {
        &self.desc
    }

    #[inline]
    pub fn buffer(&self) -> &Buffer<T> {
        &self.buffer
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.desc.is_scalar()
    }

    #[inline]
    pub fn is_vector(&self) -> bool {
        self.desc.is_vector()
    }

    #[inline]
    pub fn is_row_vector(&self) -> bool {
        self.desc.is_row_vector()
    }

    #[inline]
    pub fn is_column_vector(&self) -> bool {
        self.desc.is_column_vector()
    }

    #[inline]
    pub fn is_matrix(&self) -> bool {
        self.desc.is_matrix()
    }

    /// True when both arrays are views over the same buffer.
    #[inline]
    pub fn shares_buffer(&self, other: &NdArray<T>) -> bool {
        self.buffer.ptr_eq(&other.buffer)
    }

    pub(crate) fn with_descriptor(&self, desc: ShapeDescriptor) -> Self {
        Self::from_parts(self.buffer.clone(), desc)
    }

    pub(crate) fn descriptor_mut(&mut self) -> &mut ShapeDescriptor {
        &mut self.desc
    }
}

// ============================================================================
// Element access
// ============================================================================

impl<T: Element> NdArray<T> {
    /// Element at `coord`.
    ///
    /// # Errors
    /// `DimensionOutOfRange` or `IndexOutOfRange` for a bad coordinate.
    pub fn get(&self, coord: &[usize]) -> Result<T> {
        Ok(self.buffer.get(self.desc.offset_of(coord)?))
    }

    /// Write `value` at `coord`.
    ///
    /// # Errors
    /// As [`NdArray::get`], plus `UnsupportedViewOperation` on broadcast views.
    pub fn put(&self, coord: &[usize], value: T) -> Result<()> {
        self.ensure_writable()?;
        self.buffer.set(self.desc.offset_of(coord)?, value);
        Ok(())
    }

    /// Element at row-major linear index `index`.
    pub fn get_linear(&self, index: usize) -> Result<T> {
        self.check_linear(index)?;
        Ok(self.buffer.get(self.desc.offset_of_linear(index)))
    }

    pub fn put_linear(&self, index: usize, value: T) -> Result<()> {
        self.ensure_writable()?;
        self.check_linear(index)?;
        self.buffer.set(self.desc.offset_of_linear(index), value);
        Ok(())
    }

    /// The single element of a one-element array of any rank.
    ///
    /// # Errors
    /// `ShapeMismatch` if the array holds more or fewer than one element.
    pub fn get_scalar(&self) -> Result<T> {
        if !self.is_scalar() {
            return Err(NdError::ShapeMismatch(self.shape().to_vec(), vec![1]));
        }
        Ok(self.buffer.get(self.desc.offset_of_linear(0)))
    }

    /// Elements in row-major logical order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            buffer: &self.buffer,
            positions: self.positions(),
        }
    }

    /// Copy the elements out in row-major logical order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Copy the elements out in the storage order of `order`.
    pub fn to_vec_in(&self, order: Order) -> Vec<T> {
        match order {
            Order::RowMajor => self.to_vec(),
            Order::ColumnMajor => self.transpose().to_vec(),
        }
    }

    /// Independent contiguous copy in this array's own order.
    pub fn dup(&self) -> Self {
        self.dup_in(self.order())
    }

    /// Independent contiguous copy laid out in `order`.
    pub fn dup_in(&self, order: Order) -> Self {
        Self::from_parts(
            Buffer::from_vec(self.to_vec_in(order)),
            ShapeDescriptor::contiguous(self.shape(), order),
        )
    }

    /// [`NdArray::dup_in`] with storage from `alloc`.
    pub(crate) fn dup_with<A: BufferAllocator>(&self, alloc: &A, order: Order) -> Result<Self> {
        Self::from_logical_with(alloc, self.iter(), self.shape(), order)
    }

    /// Copy `src` element-wise into this view, in row-major logical order.
    ///
    /// `src` must have the same length as the receiver, or broadcast to its
    /// shape. Source values are read before any write.
    ///
    /// # Errors
    /// `ShapeMismatch` for incompatible sources; `UnsupportedViewOperation`
    /// if the receiver is a broadcast view.
    pub fn assign(&self, src: &NdArray<T>) -> Result<()> {
        self.ensure_writable()?;
        let values = if src.len() == self.len() {
            src.to_vec()
        } else {
            src.broadcast(self.shape())?.to_vec()
        };
        self.write_logical(values);
        Ok(())
    }

    /// Set every element of this view to `value`.
    pub fn assign_scalar(&self, value: T) -> Result<()> {
        self.ensure_writable()?;
        for pos in self.positions() {
            self.buffer.set(pos, value);
        }
        Ok(())
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.desc.has_broadcast_axis() {
            return Err(NdError::UnsupportedViewOperation(
                "write through a broadcast axis",
            ));
        }
        Ok(())
    }

    /// Buffer positions of this view in row-major logical order.
    pub(crate) fn positions(&self) -> Positions<'_> {
        Positions {
            desc: &self.desc,
            coord: smallvec::smallvec![0; self.desc.rank()],
            pos: self.desc.offset() as isize,
            index: 0,
            len: self.desc.len(),
        }
    }

    /// Write `values` in row-major logical order. The caller has checked
    /// writability and length.
    pub(crate) fn write_logical(&self, values: impl IntoIterator<Item = T>) {
        for (pos, value) in self.positions().zip(values) {
            self.buffer.set(pos, value);
        }
    }

    fn check_linear(&self, index: usize) -> Result<()> {
        let bound = self.len();
        if index >= bound {
            return Err(NdError::IndexOutOfRange { index, bound });
        }
        Ok(())
    }
}

// ============================================================================
// Iteration
// ============================================================================

/// Row-major walk over the buffer positions of one view.
///
/// Non-linear descriptors advance an odometer incrementally; `Linear`
/// descriptors recompute each position from the running index.
pub(crate) struct Positions<'a> {
    desc: &'a ShapeDescriptor,
    coord: Dims,
    pos: isize,
    index: usize,
    len: usize,
}

impl Iterator for Positions<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.index >= self.len {
            return None;
        }
        let current = if let ViewKind::Linear { .. } = self.desc.kind() {
            self.desc.offset_of_linear(self.index)
        } else {
            let current = self.pos as usize;
            let shape = self.desc.shape();
            let strides = self.desc.strides();
            // Advance indices (row-major order: last index changes fastest)
            for d in (0..shape.len()).rev() {
                self.coord[d] += 1;
                if self.coord[d] < shape[d] {
                    self.pos += strides[d];
                    break;
                }
                self.pos -= (shape[d] as isize - 1) * strides[d];
                self.coord[d] = 0;
            }
            current
        };
        self.index += 1;
        Some(current)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Positions<'_> {}

/// Iterator over the elements of an [`NdArray`] in row-major logical order.
pub struct Iter<'a, T> {
    buffer: &'a Buffer<T>,
    positions: Positions<'a>,
}

impl<T: Element> Iterator for Iter<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.positions.next().map(|pos| self.buffer.get(pos))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<T: Element> ExactSizeIterator for Iter<'_, T> {}

// ============================================================================
// Arithmetic
// ============================================================================

macro_rules! in_place_ops {
    ($($name:ident, $scalar_name:ident, $row_name:ident, $column_name:ident,
       $copy_name:ident, $copy_scalar_name:ident => $op:tt;)*) => {
        impl<T: Element> NdArray<T> {
            $(
                /// In-place element-wise operation with `other`, which must
                /// match or broadcast to the receiver's shape.
                pub fn $name(&self, other: &NdArray<T>) -> Result<()> {
                    self.zip_in_place(other, |a, b| a $op b)
                }

                pub fn $scalar_name(&self, value: T) -> Result<()> {
                    self.map_in_place(|a| a $op value)
                }

                /// Apply `row` to every row of a matrix.
                pub fn $row_name(&self, row: &NdArray<T>) -> Result<()> {
                    let operand = self.vector_operand(row, 1)?;
                    self.zip_in_place(&operand, |a, b| a $op b)
                }

                /// Apply `column` to every column of a matrix.
                pub fn $column_name(&self, column: &NdArray<T>) -> Result<()> {
                    let operand = self.vector_operand(column, 0)?;
                    self.zip_in_place(&operand, |a, b| a $op b)
                }

                pub fn $copy_name(&self, other: &NdArray<T>) -> Result<NdArray<T>> {
                    let out = self.dup();
                    out.$name(other)?;
                    Ok(out)
                }

                pub fn $copy_scalar_name(&self, value: T) -> NdArray<T> {
                    let out = self.dup();
                    for pos in out.positions() {
                        out.buffer.set(pos, out.buffer.get(pos) $op value);
                    }
                    out
                }
            )*
        }
    };
}

in_place_ops! {
    addi, addi_scalar, addi_row_vector, addi_column_vector, add, add_scalar => +;
    subi, subi_scalar, subi_row_vector, subi_column_vector, sub, sub_scalar => -;
    muli, muli_scalar, muli_row_vector, muli_column_vector, mul, mul_scalar => *;
    divi, divi_scalar, divi_row_vector, divi_column_vector, div, div_scalar => /;
}

// Operand order swapped: `self = other op self`.
macro_rules! reverse_ops {
    ($($name:ident, $scalar_name:ident, $copy_name:ident, $copy_scalar_name:ident => $op:tt;)*) => {
        impl<T: Element> NdArray<T> {
            $(
                /// In-place reversed operation: each element `a` becomes
                /// `b op a`, where `other` matches or broadcasts to the
                /// receiver's shape.
                pub fn $name(&self, other: &NdArray<T>) -> Result<()> {
                    self.zip_in_place(other, |a, b| b $op a)
                }

                /// Each element `a` becomes `value op a`.
                pub fn $scalar_name(&self, value: T) -> Result<()> {
                    self.map_in_place(|a| value $op a)
                }

                pub fn $copy_name(&self, other: &NdArray<T>) -> Result<NdArray<T>> {
                    let out = self.dup();
                    out.$name(other)?;
                    Ok(out)
                }

                pub fn $copy_scalar_name(&self, value: T) -> NdArray<T> {
                    let out = self.dup();
                    for pos in out.positions() {
                        out.buffer.set(pos, value $op out.buffer.get(pos));
                    }
                    out
                }
            )*
        }
    };
}

reverse_ops! {
    rsubi, rsubi_scalar, rsub, rsub_scalar => -;
    rdivi, rdivi_scalar, rdiv, rdiv_scalar => /;
}

impl<T: Element> NdArray<T> {
    fn zip_in_place(&self, other: &NdArray<T>, op: impl Fn(T, T) -> T) -> Result<()> {
        self.ensure_writable()?;
        let rhs = if other.shape() == self.shape() {
            other.to_vec()
        } else {
            other.broadcast(self.shape())?.to_vec()
        };
        for (pos, b) in self.positions().zip(rhs) {
            self.buffer.set(pos, op(self.buffer.get(pos), b));
        }
        Ok(())
    }

    /// `vector` as a `[1, n]` row (`axis == 1`) or `[m, 1]` column
    /// (`axis == 0`) matching this matrix.
    fn vector_operand(&self, vector: &NdArray<T>, axis: usize) -> Result<NdArray<T>> {
        if self.rank() != 2 {
            return Err(NdError::UnsupportedViewOperation("vector operand requires a matrix"));
        }
        let n = self.shape()[axis];
        if vector.len() != n {
            return Err(NdError::ShapeMismatch(self.shape().to_vec(), vector.shape().to_vec()));
        }
        let shape = if axis == 1 { [1, n] } else { [n, 1] };
        vector.reshape(&shape)
    }

    fn map_in_place(&self, op: impl Fn(T) -> T) -> Result<()> {
        self.ensure_writable()?;
        for pos in self.positions() {
            self.buffer.set(pos, op(self.buffer.get(pos)));
        }
        Ok(())
    }

    /// Matrix product `self × other` computed by `backend` into a fresh
    /// array in this array's order.
    ///
    /// Rank-2 operands give an `[m, n]` result. A rank-1 left operand is
    /// taken as a `[1, k]` row and a rank-1 right operand as a `[k, 1]`
    /// column; the unit axis is then dropped from the result, so a
    /// vector-matrix product is a vector.
    ///
    /// # Errors
    /// `UnsupportedViewOperation` for operands of rank 0 or above 2;
    /// `ShapeMismatch` if the inner dimensions differ.
    pub fn mmul<B: MatmulBackend<T>>(&self, other: &NdArray<T>, backend: &B) -> Result<NdArray<T>> {
        self.mmul_with(&HeapAllocator, other, backend)
    }

    pub(crate) fn mmul_with<A: BufferAllocator, B: MatmulBackend<T>>(
        &self,
        alloc: &A,
        other: &NdArray<T>,
        backend: &B,
    ) -> Result<NdArray<T>> {
        let lhs = match self.rank() {
            1 => self.reshape_with(alloc, &[1, self.len()])?,
            2 => self.clone(),
            _ => return Err(NdError::UnsupportedViewOperation("mmul requires rank-1 or rank-2 operands")),
        };
        let rhs = match other.rank() {
            1 => other.reshape_with(alloc, &[other.len(), 1])?,
            2 => other.clone(),
            _ => return Err(NdError::UnsupportedViewOperation("mmul requires rank-1 or rank-2 operands")),
        };
        let (m, k) = (lhs.shape()[0], lhs.shape()[1]);
        let (k2, n) = (rhs.shape()[0], rhs.shape()[1]);
        if k != k2 {
            return Err(NdError::ShapeMismatch(self.shape().to_vec(), other.shape().to_vec()));
        }
        let out = Self::zeros_with(alloc, &[m, n], self.order())?;
        backend.gemm(
            &Operand::from_array(&lhs)?,
            &Operand::from_array(&rhs)?,
            &Operand::from_array(&out)?,
        )?;
        match (self.rank(), other.rank()) {
            (2, 2) => Ok(out),
            (1, 2) => out.reshape_with(alloc, &[n]),
            (2, _) => out.reshape_with(alloc, &[m]),
            _ => out.reshape_with(alloc, &[1]),
        }
    }

    /// Tensor contraction: axis `axes[0][i]` of `self` is summed against
    /// axis `axes[1][i]` of `other`.
    ///
    /// The result has the uncontracted axes of `self` followed by those of
    /// `other`, each in ascending order, and is laid out row-major. Both
    /// operands are permuted and flattened to matrices and handed to
    /// `backend` as one matrix product.
    ///
    /// # Errors
    /// - `ShapeMismatch` if the two axis lists differ in length or a paired
    ///   axis differs in size
    /// - `DimensionOutOfRange` / `DuplicateDimension` for bad axes
    pub fn tensor_mmul<B: MatmulBackend<T>>(
        &self,
        other: &NdArray<T>,
        axes: [&[usize]; 2],
        backend: &B,
    ) -> Result<NdArray<T>> {
        self.tensor_mmul_with(&HeapAllocator, other, axes, backend)
    }

    pub(crate) fn tensor_mmul_with<A: BufferAllocator, B: MatmulBackend<T>>(
        &self,
        alloc: &A,
        other: &NdArray<T>,
        axes: [&[usize]; 2],
        backend: &B,
    ) -> Result<NdArray<T>> {
        let [a_axes, b_axes] = axes;
        if a_axes.len() != b_axes.len() {
            return Err(NdError::ShapeMismatch(a_axes.to_vec(), b_axes.to_vec()));
        }
        normalize_dims(a_axes, self.rank())?;
        normalize_dims(b_axes, other.rank())?;
        if a_axes
            .iter()
            .zip(b_axes)
            .any(|(&da, &db)| self.shape()[da] != other.shape()[db])
        {
            return Err(NdError::ShapeMismatch(self.shape().to_vec(), other.shape().to_vec()));
        }

        let a_free: Dims = (0..self.rank()).filter(|d| !a_axes.contains(d)).collect();
        let b_free: Dims = (0..other.rank()).filter(|d| !b_axes.contains(d)).collect();
        let k: usize = a_axes.iter().map(|&d| self.shape()[d]).product();
        let m: usize = a_free.iter().map(|&d| self.shape()[d]).product();
        let n: usize = b_free.iter().map(|&d| other.shape()[d]).product();
        debug!(m, k, n, "contracting tensors as a matrix product");

        let a_perm: Dims = a_free.iter().chain(a_axes).copied().collect();
        let b_perm: Dims = b_axes.iter().chain(b_free.iter()).copied().collect();
        let lhs = self
            .permute(&a_perm)?
            .dup_with(alloc, Order::RowMajor)?
            .reshape_with(alloc, &[m, k])?;
        let rhs = other
            .permute(&b_perm)?
            .dup_with(alloc, Order::RowMajor)?
            .reshape_with(alloc, &[k, n])?;
        let product = lhs.mmul_with(alloc, &rhs, backend)?;

        let shape: Dims = a_free
            .iter()
            .map(|&d| self.shape()[d])
            .chain(b_free.iter().map(|&d| other.shape()[d]))
            .collect();
        product.reshape_with(alloc, &shape)
    }

    /// Run `transform` over the elements (row-major) into a fresh array of
    /// the same shape and order.
    pub fn transform<F: ElementwiseTransform<T>>(&self, transform: &F) -> Result<NdArray<T>> {
        self.transform_with(&HeapAllocator, transform)
    }

    pub(crate) fn transform_with<A: BufferAllocator, F: ElementwiseTransform<T>>(
        &self,
        alloc: &A,
        transform: &F,
    ) -> Result<NdArray<T>> {
        let input = self.to_vec();
        let mut output = vec![T::zero(); input.len()];
        transform.apply(&input, &mut output)?;
        Self::from_logical_with(alloc, output, self.shape(), self.order())
    }
}

// ============================================================================
// Comparison and formatting
// ============================================================================

impl<T: Element> PartialEq for NdArray<T> {
    /// Equal shapes and equal elements; strides and ordering are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.iter().eq(other.iter())
    }
}

impl<T: Element> fmt::Debug for NdArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("offset", &self.offset())
            .field("order", &self.order())
            .field("data", &self.to_vec())
            .finish()
    }
}

impl<T: Element> fmt::Display for NdArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_nested(f, self.shape(), &self.to_vec(), 0)
    }
}

fn fmt_nested<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    shape: &[usize],
    values: &[T],
    depth: usize,
) -> fmt::Result {
    let Some((&outer, inner_shape)) = shape.split_first() else {
        return match values.first() {
            Some(v) => write!(f, "{v}"),
            None => Ok(()),
        };
    };
    let inner: usize = inner_shape.iter().product();
    write!(f, "[")?;
    for i in 0..outer {
        if i > 0 {
            if inner_shape.is_empty() {
                write!(f, ", ")?;
            } else {
                write!(f, ",\n{}", " ".repeat(depth + 1))?;
            }
        }
        fmt_nested(f, inner_shape, &values[i * inner..(i + 1) * inner], depth + 1)?;
    }
    write!(f, "]")
}
