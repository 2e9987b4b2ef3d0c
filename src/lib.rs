//! N-dimensional strided arrays over shared, aliasable buffers.
//!
//! An [`NdArray`] is a [`Buffer`] plus a [`ShapeDescriptor`] (shape, strides,
//! offset, [`Order`]). Every view-producing operation builds a new descriptor
//! over the same buffer, so writes through one view are visible through every
//! other view that overlaps it.
//!
//! # Core Types
//!
//! - [`NdArray`]: buffer + descriptor, the unit every operation works on
//! - [`ShapeDescriptor`]: shape/stride/offset/order plus a [`ViewKind`] tag,
//!   with the single coordinate-to-offset mapping used everywhere
//! - [`Buffer`]: reference-counted element storage
//! - [`Context`]: explicit factory for fresh arrays
//!
//! # View Operations (zero-copy)
//!
//! - `slice`, `get_row`, `get_column`
//! - `transpose`, `permute`, `swap_axes`, `roll_axis` (+ in-place `transposei`, `permutei`)
//! - `reshape` (copies only when the source is not contiguous)
//! - `broadcast`, `linear_view`
//! - `tensor_along_dimension`, `vector_along_dimension`
//!
//! # Copying Operations
//!
//! - Reductions: [`NdArray::sum`], [`NdArray::prod`], [`NdArray::mean`], [`NdArray::max`], [`NdArray::min`]
//! - Assembly: [`concat`], [`append`], [`prepend`], [`pad`], [`vstack`], [`hstack`], [`to_flattened`]
//! - Sorting: [`sort_with_indices`], [`sort`]
//!
//! # Example
//!
//! ```rust
//! use strided_nd::{NdArray, Order};
//!
//! let a = NdArray::<f64>::linspace(1.0, 4.0, 4, Order::ColumnMajor)
//!     .reshape(&[2, 2])
//!     .unwrap();
//! let col = a.get_column(0).unwrap();
//! assert_eq!(col.to_vec(), vec![1.0, 2.0]);
//!
//! // Transpose is a descriptor swap; the buffer is shared.
//! let t = a.transpose();
//! assert!(t.shares_buffer(&a));
//! assert_eq!(t.get(&[1, 0]).unwrap(), 3.0);
//! ```

mod along;
mod array;
pub mod backend;
mod buffer;
mod concat;
mod context;
mod element;
pub mod io;
mod order;
mod reduce;
pub mod shape;
mod sort;
mod view;

pub use array::{Iter, NdArray};
pub use buffer::Buffer;
pub use context::{Context, ContextConfig};
pub use element::{DType, Element};
pub use order::{col_major_strides, row_major_strides, Order};
pub use shape::{Dims, ShapeDescriptor, Strides, ViewKind};

// ============================================================================
// Copying operations
// ============================================================================
pub use concat::{append, concat, hstack, pad, prepend, to_flattened, vstack, PadMode};
pub use sort::{sort, sort_with_indices, SortedWithIndices};

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur during strided array operations.
#[derive(Debug, thiserror::Error)]
pub enum NdError {
    /// Operand or view shapes are incompatible for the operation.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// A coordinate (or computed buffer position) lies outside its bound.
    #[error("index {index} out of range for bound {bound}")]
    IndexOutOfRange { index: usize, bound: usize },

    /// A dimension argument is not smaller than the rank.
    #[error("invalid dimension {dim} for rank {rank}")]
    DimensionOutOfRange { dim: usize, rank: usize },

    /// The same dimension was named twice.
    #[error("dimension {0} given more than once")]
    DuplicateDimension(usize),

    /// Ordering tag outside {RowMajor, ColumnMajor}.
    #[error("illegal ordering tag {0:?}")]
    IllegalOrdering(char),

    /// The view does not support the requested operation.
    #[error("unsupported view operation: {0}")]
    UnsupportedViewOperation(&'static str),

    /// A persisted array holds a different element type than requested.
    #[error("element type mismatch: expected {expected:?}, found tag {found}")]
    ElementTypeMismatch { expected: DType, found: u8 },

    /// A text-format value or header could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),

    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),

    /// A delimited-text record could not be read or written.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Result type for strided array operations.
pub type Result<T> = std::result::Result<T, NdError>;
