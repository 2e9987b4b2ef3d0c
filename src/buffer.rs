//! Shared element storage.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::element::{DType, Element};

/// Contiguous, fixed-length element storage shared by every view over it.
///
/// Cloning a `Buffer` clones the handle, not the elements. Element cells are
/// individually mutable through any handle, so a write through one view is
/// observed by every other view over the same region. The handle is `!Send`:
/// sharing across threads requires an explicit copy.
pub struct Buffer<T> {
    cells: Rc<[Cell<T>]>,
}

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            cells: Rc::clone(&self.cells),
        }
    }
}

impl<T: Element> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("dtype", &T::DTYPE)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Element> Buffer<T> {
    /// Allocate `len` zero-filled elements.
    pub fn zeros(len: usize) -> Self {
        Self::filled(len, T::zero())
    }

    /// Allocate `len` elements set to `value`.
    pub fn filled(len: usize, value: T) -> Self {
        Self {
            cells: (0..len).map(|_| Cell::new(value)).collect(),
        }
    }

    /// Take ownership of `data` as the buffer contents.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            cells: data.into_iter().map(Cell::new).collect(),
        }
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read the element at buffer position `pos`.
    ///
    /// # Panics
    /// Panics if `pos >= len`. Descriptors are validated against the buffer
    /// length on construction, so positions derived from them never panic.
    #[inline]
    pub fn get(&self, pos: usize) -> T {
        self.cells[pos].get()
    }

    /// Write the element at buffer position `pos`.
    #[inline]
    pub fn set(&self, pos: usize, value: T) {
        self.cells[pos].set(value);
    }

    /// The raw cells, for collaborators that fill or read whole regions.
    #[inline]
    pub fn cells(&self) -> &[Cell<T>] {
        &self.cells
    }

    /// Copy the whole buffer out in storage order.
    pub fn to_vec(&self) -> Vec<T> {
        self.cells.iter().map(Cell::get).collect()
    }

    /// True when both handles refer to the same storage.
    #[inline]
    pub fn ptr_eq(&self, other: &Buffer<T>) -> bool {
        Rc::ptr_eq(&self.cells, &other.cells)
    }

    /// Number of live handles (views) sharing this storage.
    #[inline]
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_aliasing() {
        let a = Buffer::<f64>::zeros(4);
        let b = a.clone();
        b.set(2, 5.0);
        assert_eq!(a.get(2), 5.0);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.handle_count(), 2);
    }

    #[test]
    fn test_buffer_from_vec() {
        let a = Buffer::from_vec(vec![1.0f32, 2.0, 3.0]);
        assert_eq!(a.len(), 3);
        assert_eq!(a.dtype(), DType::F32);
        assert_eq!(a.to_vec(), vec![1.0, 2.0, 3.0]);
        assert!(!a.ptr_eq(&Buffer::from_vec(vec![1.0f32, 2.0, 3.0])));
    }

    #[test]
    fn test_buffer_release() {
        let a = Buffer::<f64>::filled(2, 1.5);
        {
            let _view = a.clone();
            assert_eq!(a.handle_count(), 2);
        }
        assert_eq!(a.handle_count(), 1);
        assert_eq!(a.get(1), 1.5);
    }
}
