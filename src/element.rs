//! Element types storable in a [`Buffer`](crate::Buffer).

use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Element-type tag, resolved once when a buffer is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    /// Tag byte used by the binary format.
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            DType::F32 => 0x20,
            DType::F64 => 0x40,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x20 => Some(DType::F32),
            0x40 => Some(DType::F64),
            _ => None,
        }
    }

    /// Width of one element in bytes.
    #[inline]
    pub fn size_of(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }
}

/// Shared trait bounds for every element type an array can hold.
///
/// Arithmetic comes from [`num_traits::Float`]; accumulation always happens
/// in `Self`, never in a wider type.
pub trait Element:
    num_traits::Float
    + Default
    + Debug
    + Display
    + FromStr
    + Serialize
    + DeserializeOwned
    + 'static
{
    /// Runtime tag for this element type.
    const DTYPE: DType;

    /// Total order over all values, NaN included.
    fn total_order(&self, other: &Self) -> Ordering;

    /// Convert a count or position into this element type.
    #[inline]
    fn from_usize(value: usize) -> Self {
        <Self as num_traits::NumCast>::from(value).unwrap_or_else(Self::nan)
    }
}

macro_rules! impl_element {
    ($($t:ty => $tag:expr),*) => {
        $(
            impl Element for $t {
                const DTYPE: DType = $tag;

                #[inline(always)]
                fn total_order(&self, other: &Self) -> Ordering {
                    self.total_cmp(other)
                }
            }
        )*
    };
}

impl_element!(f32 => DType::F32, f64 => DType::F64);

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_element<T: Element>() {}

    #[test]
    fn test_standard_types() {
        assert_element::<f32>();
        assert_element::<f64>();
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(f64::DTYPE.size_of(), 8);
    }

    #[test]
    fn test_dtype_tag_round_trip() {
        for dtype in [DType::F32, DType::F64] {
            assert_eq!(DType::from_tag(dtype.tag()), Some(dtype));
        }
        assert_eq!(DType::from_tag(0), None);
    }

    #[test]
    fn test_total_order_places_nan_last() {
        assert_eq!(1.0f64.total_order(&2.0), Ordering::Less);
        assert_eq!(f64::NAN.total_order(&f64::INFINITY), Ordering::Greater);
        assert_eq!(f64::from_usize(7), 7.0);
    }
}
