//! Contracts for the collaborators the array core delegates to.
//!
//! The core never multiplies matrices, runs transcendental kernels or
//! samples random numbers itself. It describes operands and hands them to
//! one of these traits. Reference implementations are provided so the
//! contracts can be exercised without an external library.

use std::fmt;

use crate::array::NdArray;
use crate::buffer::Buffer;
use crate::element::Element;
use crate::{NdError, Result};

// ============================================================================
// Allocation
// ============================================================================

/// Supplies zero-filled buffers for new arrays.
pub trait BufferAllocator {
    fn allocate<T: Element>(&self, len: usize) -> Buffer<T>;
}

/// Plain heap allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    #[inline]
    fn allocate<T: Element>(&self, len: usize) -> Buffer<T> {
        Buffer::zeros(len)
    }
}

// ============================================================================
// Matrix multiplication
// ============================================================================

/// Memory layout of a rank-2 operand, when it has one a BLAS-style kernel
/// could consume directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixLayout {
    /// Rows are contiguous: `col_stride == 1`, `row_stride >= cols`.
    RowMajor { ld: usize },
    /// Columns are contiguous: `row_stride == 1`, `col_stride >= rows`.
    ColMajor { ld: usize },
}

/// A rank-2 matrix as seen by a [`MatmulBackend`].
#[derive(Clone)]
pub struct Operand<'a, T> {
    pub buffer: &'a Buffer<T>,
    pub rows: usize,
    pub cols: usize,
    pub row_stride: isize,
    pub col_stride: isize,
    pub offset: usize,
}

impl<T: Element> fmt::Debug for Operand<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operand")
            .field("buffer_len", &self.buffer.len())
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("row_stride", &self.row_stride)
            .field("col_stride", &self.col_stride)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T: Element> Operand<'a, T> {
    /// Describe a rank-2 array.
    ///
    /// # Errors
    /// `UnsupportedViewOperation` for other ranks or linear views.
    pub fn from_array(array: &'a NdArray<T>) -> Result<Self> {
        if array.rank() != 2 {
            return Err(NdError::UnsupportedViewOperation(
                "matrix operand must be rank 2",
            ));
        }
        if matches!(array.descriptor().kind(), crate::ViewKind::Linear { .. }) {
            return Err(NdError::UnsupportedViewOperation(
                "matrix operand cannot be a linear view",
            ));
        }
        Ok(Self {
            buffer: array.buffer(),
            rows: array.shape()[0],
            cols: array.shape()[1],
            row_stride: array.strides()[0],
            col_stride: array.strides()[1],
            offset: array.offset(),
        })
    }

    /// Buffer position of element `(i, j)`.
    #[inline]
    pub fn position(&self, i: usize, j: usize) -> usize {
        (self.offset as isize + i as isize * self.row_stride + j as isize * self.col_stride)
            as usize
    }

    /// The BLAS-compatible layout of this operand, if any.
    pub fn layout(&self) -> Option<MatrixLayout> {
        if self.col_stride == 1 && self.row_stride >= self.cols as isize {
            return Some(MatrixLayout::RowMajor {
                ld: self.row_stride as usize,
            });
        }
        if self.row_stride == 1 && self.col_stride >= self.rows as isize {
            return Some(MatrixLayout::ColMajor {
                ld: self.col_stride as usize,
            });
        }
        None
    }
}

/// Computes `out = a × b`. Shapes have been validated by the caller.
pub trait MatmulBackend<T: Element> {
    fn gemm(&self, a: &Operand<'_, T>, b: &Operand<'_, T>, out: &Operand<'_, T>) -> Result<()>;
}

/// Triple-loop reference kernel over arbitrary strides.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveMatmul;

impl<T: Element> MatmulBackend<T> for NaiveMatmul {
    fn gemm(&self, a: &Operand<'_, T>, b: &Operand<'_, T>, out: &Operand<'_, T>) -> Result<()> {
        if a.cols != b.rows {
            return Err(NdError::ShapeMismatch(vec![a.rows, a.cols], vec![b.rows, b.cols]));
        }
        if out.rows != a.rows || out.cols != b.cols {
            return Err(NdError::ShapeMismatch(
                vec![a.rows, b.cols],
                vec![out.rows, out.cols],
            ));
        }
        for i in 0..a.rows {
            for j in 0..b.cols {
                let mut sum = T::zero();
                for l in 0..a.cols {
                    sum = sum + a.buffer.get(a.position(i, l)) * b.buffer.get(b.position(l, j));
                }
                out.buffer.set(out.position(i, j), sum);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Elementwise transforms and random fill
// ============================================================================

/// Maps a linear stream of elements to an equally long output stream.
pub trait ElementwiseTransform<T: Element> {
    fn apply(&self, input: &[T], output: &mut [T]) -> Result<()>;
}

/// Any `Fn(T) -> T` is a transform.
impl<T: Element, F: Fn(T) -> T> ElementwiseTransform<T> for F {
    fn apply(&self, input: &[T], output: &mut [T]) -> Result<()> {
        if input.len() != output.len() {
            return Err(NdError::ShapeMismatch(vec![input.len()], vec![output.len()]));
        }
        for (o, &i) in output.iter_mut().zip(input) {
            *o = self(i);
        }
        Ok(())
    }
}

/// Fills an output stream with random values.
pub trait RandomFill<T: Element> {
    fn fill(&self, out: &mut [T]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Order;

    #[test]
    fn test_operand_layout() {
        let c = NdArray::<f64>::zeros(&[3, 4], Order::RowMajor);
        let op = Operand::from_array(&c).unwrap();
        assert_eq!(op.layout(), Some(MatrixLayout::RowMajor { ld: 4 }));
        let f = NdArray::<f64>::zeros(&[3, 4], Order::ColumnMajor);
        assert_eq!(
            Operand::from_array(&f).unwrap().layout(),
            Some(MatrixLayout::ColMajor { ld: 3 })
        );
        let v = NdArray::<f64>::zeros(&[3], Order::RowMajor);
        assert!(Operand::from_array(&v).is_err());
    }

    #[test]
    fn test_naive_matmul_mixed_orders() {
        let a = NdArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], Order::RowMajor).unwrap();
        let b = NdArray::from_rows(&[vec![5.0, 6.0], vec![7.0, 8.0]], Order::ColumnMajor).unwrap();
        let c = a.mmul(&b, &NaiveMatmul).unwrap();
        assert_eq!(c.to_vec(), vec![19.0, 22.0, 43.0, 50.0]);
        // Transposed operand goes through its strides.
        let ct = a.transpose().mmul(&b, &NaiveMatmul).unwrap();
        assert_eq!(ct.to_vec(), vec![26.0, 30.0, 38.0, 44.0]);
    }

    #[test]
    fn test_mmul_shape_mismatch() {
        let a = NdArray::<f64>::zeros(&[2, 3], Order::RowMajor);
        assert!(matches!(
            a.mmul(&a, &NaiveMatmul),
            Err(NdError::ShapeMismatch(_, _))
        ));
    }

    #[test]
    fn test_mmul_vector_operands() {
        let v = NdArray::<f64>::linspace(1.0, 4.0, 4, Order::RowMajor);
        let m = NdArray::<f64>::linspace(1.0, 16.0, 16, Order::ColumnMajor)
            .reshape(&[4, 4])
            .unwrap();
        let row = v.mmul(&m, &NaiveMatmul).unwrap();
        assert_eq!(row.shape(), &[4]);
        assert_eq!(row.to_vec(), vec![30.0, 70.0, 110.0, 150.0]);

        let col = m.mmul(&v, &NaiveMatmul).unwrap();
        assert_eq!(col.shape(), &[4]);
        assert_eq!(col.to_vec(), vec![90.0, 100.0, 110.0, 120.0]);

        let dot = v.mmul(&v, &NaiveMatmul).unwrap();
        assert_eq!(dot.shape(), &[1]);
        assert_eq!(dot.get_scalar().unwrap(), 30.0);

        let cube = NdArray::<f64>::zeros(&[2, 2, 2], Order::RowMajor);
        assert!(matches!(
            cube.mmul(&m, &NaiveMatmul),
            Err(NdError::UnsupportedViewOperation(_))
        ));
    }

    #[test]
    fn test_tensor_mmul_contracts_paired_axes() {
        let a = NdArray::<f64>::arange(0.0, 60.0, Order::ColumnMajor)
            .reshape(&[3, 4, 5])
            .unwrap();
        let b = NdArray::<f64>::arange(0.0, 24.0, Order::ColumnMajor)
            .reshape(&[4, 3, 2])
            .unwrap();
        let c = a.tensor_mmul(&b, [&[1, 0], &[0, 1]], &NaiveMatmul).unwrap();
        assert_eq!(c.shape(), &[5, 2]);
        let expected = NdArray::from_rows(
            &[
                vec![440.0, 1232.0],
                vec![1232.0, 3752.0],
                vec![2024.0, 6272.0],
                vec![2816.0, 8792.0],
                vec![3608.0, 11312.0],
            ],
            Order::RowMajor,
        )
        .unwrap();
        assert_eq!(c, expected);
    }

    #[test]
    fn test_tensor_mmul_matches_mmul_for_matrices() {
        let a = NdArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], Order::RowMajor).unwrap();
        let b = NdArray::from_rows(&[vec![5.0, 6.0], vec![7.0, 8.0]], Order::ColumnMajor).unwrap();
        let t = a.tensor_mmul(&b, [&[1], &[0]], &NaiveMatmul).unwrap();
        assert_eq!(t, a.mmul(&b, &NaiveMatmul).unwrap());
    }

    #[test]
    fn test_tensor_mmul_errors() {
        let a = NdArray::<f64>::zeros(&[2, 3], Order::RowMajor);
        let b = NdArray::<f64>::zeros(&[2, 3], Order::RowMajor);
        assert!(matches!(
            a.tensor_mmul(&b, [&[1], &[0]], &NaiveMatmul),
            Err(NdError::ShapeMismatch(_, _))
        ));
        assert!(matches!(
            a.tensor_mmul(&b, [&[0, 1], &[0]], &NaiveMatmul),
            Err(NdError::ShapeMismatch(_, _))
        ));
        assert!(matches!(
            a.tensor_mmul(&b, [&[2], &[0]], &NaiveMatmul),
            Err(NdError::DimensionOutOfRange { dim: 2, rank: 2 })
        ));
        assert!(matches!(
            a.tensor_mmul(&b, [&[0, 0], &[0, 1]], &NaiveMatmul),
            Err(NdError::DuplicateDimension(0))
        ));
    }

    #[test]
    fn test_operand_debug_hides_buffer_contents() {
        let a = NdArray::<f64>::zeros(&[2, 3], Order::RowMajor);
        let op = Operand::from_array(&a).unwrap();
        let shown = format!("{op:?}");
        assert!(shown.contains("rows: 2"));
        assert!(shown.contains("buffer_len: 6"));
    }

    #[test]
    fn test_closure_transform() {
        let a = NdArray::from_vec(vec![1.0, 4.0, 9.0], &[3], Order::RowMajor).unwrap();
        let r = a.transform(&|x: f64| x.sqrt()).unwrap();
        assert_eq!(r.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_heap_allocator() {
        let buf: Buffer<f32> = HeapAllocator.allocate(3);
        assert_eq!(buf.to_vec(), vec![0.0; 3]);
    }
}
