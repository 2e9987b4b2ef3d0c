//! Memory orderings and their canonical strides.

use serde::{Deserialize, Serialize};

use crate::shape::Strides;
use crate::{NdError, Result};

/// Canonical stride-assignment convention for freshly allocated arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Order {
    /// C order: the last index varies fastest.
    #[default]
    #[serde(rename = "c")]
    RowMajor,
    /// Fortran order: the first index varies fastest.
    #[serde(rename = "f")]
    ColumnMajor,
}

impl Order {
    /// Single-character tag used by the persisted formats.
    #[inline]
    pub fn tag(self) -> char {
        match self {
            Order::RowMajor => 'c',
            Order::ColumnMajor => 'f',
        }
    }

    /// Parse a tag produced by [`Order::tag`].
    pub fn from_tag(tag: char) -> Result<Self> {
        match tag {
            'c' | 'C' => Ok(Order::RowMajor),
            'f' | 'F' => Ok(Order::ColumnMajor),
            other => Err(NdError::IllegalOrdering(other)),
        }
    }

    /// Canonical contiguous strides for `dims` under this ordering.
    pub fn strides_for(self, dims: &[usize]) -> Strides {
        match self {
            Order::RowMajor => row_major_strides(dims),
            Order::ColumnMajor => col_major_strides(dims),
        }
    }
}

/// Compute column-major strides (first index varies fastest).
pub fn col_major_strides(dims: &[usize]) -> Strides {
    let rank = dims.len();
    let mut strides: Strides = smallvec::smallvec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * dims[i - 1] as isize;
    }
    strides
}

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Strides {
    let rank = dims.len();
    let mut strides: Strides = smallvec::smallvec![1isize; rank];
    if rank == 0 {
        return strides;
    }
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1] as isize;
    }
    strides
}
