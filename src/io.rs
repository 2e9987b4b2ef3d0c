//! Persisted forms of an array: a compact binary codec and a delimited
//! text format.
//!
//! # Binary layout
//!
//! Two bincode values (standard configuration) written back to back:
//!
//! 1. a header `{rank: u32, shape: [u64], dtype: u8, order: u8}` where
//!    `dtype` is [`DType::tag`] and `order` is `b'c'` or `b'f'`;
//! 2. the element vector in the array's declared order.
//!
//! Decoding restores shape, ordering and every element exactly.
//!
//! # Text layout
//!
//! One record per row of a rank-2 array (a single record for rank 0 or 1),
//! values separated by a caller-supplied delimiter byte and written with
//! Rust's shortest round-trip float formatting. Records go through the
//! `csv` reader and writer, so quoting, `\r\n` line ends and surrounding
//! whitespace are handled on input.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bincode::config;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::array::NdArray;
use crate::element::{DType, Element};
use crate::order::Order;
use crate::shape::checked_len;
use crate::{NdError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Header {
    rank: u32,
    shape: Vec<u64>,
    dtype: u8,
    order: u8,
}

// ============================================================================
// Binary
// ============================================================================

/// Encode `array` onto `writer`.
pub fn write_binary<T: Element, W: Write>(array: &NdArray<T>, writer: &mut W) -> Result<()> {
    let header = Header {
        rank: array.rank() as u32,
        shape: array.shape().iter().map(|&s| s as u64).collect(),
        dtype: T::DTYPE.tag(),
        order: array.order().tag() as u8,
    };
    let data = array.to_vec_in(array.order());
    bincode::serde::encode_into_std_write(&header, &mut *writer, config::standard())?;
    bincode::serde::encode_into_std_write(&data, &mut *writer, config::standard())?;
    Ok(())
}

/// Decode an array written by [`write_binary`].
///
/// # Errors
/// - `ElementTypeMismatch` if the stored element type is not `T`
/// - `IllegalOrdering` for an unknown ordering tag
/// - `ShapeMismatch` if the element count disagrees with the shape
/// - `Parse` if the header's shape cannot describe an in-memory array
/// - `Decode` / `Io` for malformed or truncated input
pub fn read_binary<T: Element, R: Read>(reader: &mut R) -> Result<NdArray<T>> {
    let header: Header = bincode::serde::decode_from_std_read(&mut *reader, config::standard())?;
    if header.dtype != T::DTYPE.tag() {
        return Err(NdError::ElementTypeMismatch {
            expected: T::DTYPE,
            found: header.dtype,
        });
    }
    let order = Order::from_tag(header.order as char)?;
    if header.rank as usize != header.shape.len() {
        return Err(NdError::Parse(format!(
            "header rank {} disagrees with shape {:?}",
            header.rank, header.shape
        )));
    }
    let shape = header
        .shape
        .iter()
        .map(|&s| usize::try_from(s).map_err(|_| NdError::Parse(format!("dimension {s} too large"))))
        .collect::<Result<Vec<usize>>>()?;
    if checked_len(&shape).is_none() {
        return Err(NdError::Parse(format!("shape {shape:?} overflows the element count")));
    }
    let data: Vec<T> = bincode::serde::decode_from_std_read(&mut *reader, config::standard())?;
    debug!(?shape, ?order, dtype = ?DType::from_tag(header.dtype), "decoded array");
    NdArray::from_vec(data, &shape, order)
}

/// Encode `array` into a byte vector.
pub fn to_bytes<T: Element>(array: &NdArray<T>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_binary(array, &mut bytes)?;
    Ok(bytes)
}

/// Decode an array from bytes produced by [`to_bytes`].
pub fn from_bytes<T: Element>(mut bytes: &[u8]) -> Result<NdArray<T>> {
    read_binary(&mut bytes)
}

pub fn write_binary_file<T: Element>(array: &NdArray<T>, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_binary(array, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn read_binary_file<T: Element>(path: impl AsRef<Path>) -> Result<NdArray<T>> {
    let mut reader = BufReader::new(File::open(path)?);
    read_binary(&mut reader)
}

// ============================================================================
// Text
// ============================================================================

/// Write `array` as delimited text, one record per row.
///
/// # Errors
/// `UnsupportedViewOperation` for rank > 2, and for a matrix with rows but
/// no columns, which has no text form that reads back.
pub fn write_text<T: Element, W: Write>(array: &NdArray<T>, writer: &mut W, delimiter: u8) -> Result<()> {
    if array.rank() > 2 {
        return Err(NdError::UnsupportedViewOperation(
            "text format holds at most two dimensions",
        ));
    }
    let cols = if array.rank() == 2 {
        array.shape()[1]
    } else {
        array.len()
    };
    if cols == 0 {
        if array.rank() == 2 && array.shape()[0] > 0 {
            return Err(NdError::UnsupportedViewOperation(
                "text format cannot hold rows without columns",
            ));
        }
        return Ok(());
    }
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_writer(&mut *writer);
    for row in array.to_vec().chunks(cols) {
        out.write_record(row.iter().map(ToString::to_string))
            .map_err(text_error)?;
    }
    out.flush()?;
    Ok(())
}

/// Read delimited text into a rank-2 `[rows, cols]` array laid out in
/// `order`. Blank lines are skipped and fields are trimmed.
///
/// # Errors
/// `ShapeMismatch` for ragged rows, `Parse` for unreadable values, `Csv`
/// for malformed records.
pub fn read_text<T: Element, R: Read>(reader: R, delimiter: u8, order: Order) -> Result<NdArray<T>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows: Vec<Vec<T>> = Vec::new();
    let mut record = csv::StringRecord::new();
    while csv_reader.read_record(&mut record).map_err(text_error)? {
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        let row = record
            .iter()
            .map(|token| {
                token
                    .parse::<T>()
                    .map_err(|_| NdError::Parse(format!("invalid number {token:?}")))
            })
            .collect::<Result<Vec<T>>>()?;
        rows.push(row);
    }
    debug!(rows = rows.len(), "read text records");
    NdArray::from_rows(&rows, order)
}

fn text_error(err: csv::Error) -> NdError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            NdError::ShapeMismatch(vec![*expected_len as usize], vec![*len as usize])
        }
        _ => NdError::Csv(err),
    }
}

pub fn write_text_file<T: Element>(array: &NdArray<T>, path: impl AsRef<Path>, delimiter: u8) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_text(array, &mut writer, delimiter)?;
    writer.flush()?;
    Ok(())
}

pub fn read_text_file<T: Element>(path: impl AsRef<Path>, delimiter: u8, order: Order) -> Result<NdArray<T>> {
    read_text(File::open(path)?, delimiter, order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_round_trip_keeps_order() {
        let a = NdArray::<f64>::linspace(1.0, 6.0, 6, Order::ColumnMajor)
            .reshape(&[2, 3])
            .unwrap();
        let bytes = to_bytes(&a).unwrap();
        let b: NdArray<f64> = from_bytes(&bytes).unwrap();
        assert_eq!(b.order(), Order::ColumnMajor);
        assert_eq!(b.shape(), &[2, 3]);
        assert_eq!(b.strides(), &[1, 2]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_binary_view_is_materialized() {
        let a = NdArray::<f32>::arange(0.0, 12.0, Order::RowMajor)
            .reshape(&[3, 4])
            .unwrap();
        let t = a.transpose();
        let b: NdArray<f32> = from_bytes(&to_bytes(&t).unwrap()).unwrap();
        assert_eq!(b, t);
        assert!(b.descriptor().is_contiguous());
    }

    #[test]
    fn test_binary_dtype_mismatch() {
        let a = NdArray::<f32>::ones(&[2], Order::RowMajor);
        let bytes = to_bytes(&a).unwrap();
        assert!(matches!(
            from_bytes::<f64>(&bytes),
            Err(NdError::ElementTypeMismatch {
                expected: DType::F64,
                found: 0x20
            })
        ));
    }

    #[test]
    fn test_binary_bad_order_tag() {
        let header = Header {
            rank: 1,
            shape: vec![1],
            dtype: DType::F64.tag(),
            order: b'x',
        };
        let mut bytes = bincode::serde::encode_to_vec(&header, config::standard()).unwrap();
        bytes.extend(bincode::serde::encode_to_vec(vec![1.0f64], config::standard()).unwrap());
        assert!(matches!(
            from_bytes::<f64>(&bytes),
            Err(NdError::IllegalOrdering('x'))
        ));
    }

    #[test]
    fn test_binary_truncated() {
        let a = NdArray::<f64>::ones(&[4], Order::RowMajor);
        let bytes = to_bytes(&a).unwrap();
        assert!(from_bytes::<f64>(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_text_round_trip() {
        let a = NdArray::from_rows(&[vec![1.5, -2.0], vec![3.25, 4.0]], Order::RowMajor).unwrap();
        let mut out = Vec::new();
        write_text(&a, &mut out, b',').unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "1.5,-2\n3.25,4\n");
        let b: NdArray<f64> = read_text(out.as_slice(), b',', Order::ColumnMajor).unwrap();
        assert_eq!(b.order(), Order::ColumnMajor);
        assert_eq!(a, b);
    }

    #[test]
    fn test_text_vector_single_line() {
        let v = NdArray::from_vec(vec![1.0f32, 2.0, 3.0], &[3], Order::RowMajor).unwrap();
        let mut out = Vec::new();
        write_text(&v, &mut out, b' ').unwrap();
        assert_eq!(out, b"1 2 3\n");
        let cube = NdArray::<f32>::zeros(&[2, 2, 2], Order::RowMajor);
        assert!(matches!(
            write_text(&cube, &mut Vec::<u8>::new(), b' '),
            Err(NdError::UnsupportedViewOperation(_))
        ));
    }

    #[test]
    fn test_text_ragged_and_garbage() {
        let ragged = "1,2,3\n4,5\n";
        assert!(matches!(
            read_text::<f64, _>(ragged.as_bytes(), b',', Order::RowMajor),
            Err(NdError::ShapeMismatch(_, _))
        ));
        let garbage = "1,abc\n";
        assert!(matches!(
            read_text::<f64, _>(garbage.as_bytes(), b',', Order::RowMajor),
            Err(NdError::Parse(_))
        ));
    }

    #[test]
    fn test_text_tolerates_crlf_quotes_and_padding() {
        let text = "1,\"2.5\"\r\n\r\n -3 ,4\r\n";
        let a: NdArray<f64> = read_text(text.as_bytes(), b',', Order::RowMajor).unwrap();
        let expected = NdArray::from_rows(&[vec![1.0, 2.5], vec![-3.0, 4.0]], Order::RowMajor).unwrap();
        assert_eq!(a, expected);

        let tabbed = "1\t2\n3\t4\n";
        let b: NdArray<f64> = read_text(tabbed.as_bytes(), b'\t', Order::ColumnMajor).unwrap();
        assert_eq!(b.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_text_rejects_rows_without_columns() {
        let a = NdArray::<f64>::zeros(&[3, 0], Order::RowMajor);
        assert!(matches!(
            write_text(&a, &mut Vec::<u8>::new(), b','),
            Err(NdError::UnsupportedViewOperation(_))
        ));

        // No rows at all has a text form: nothing.
        let mut out = Vec::new();
        write_text(&NdArray::<f64>::zeros(&[0, 3], Order::RowMajor), &mut out, b',').unwrap();
        assert!(out.is_empty());
        let back: NdArray<f64> = read_text(out.as_slice(), b',', Order::RowMajor).unwrap();
        assert_eq!(back.shape(), &[0, 0]);
    }

    #[test]
    fn test_binary_rejects_overflowing_shape() {
        let header = Header {
            rank: 2,
            shape: vec![1 << 63, 2],
            dtype: DType::F64.tag(),
            order: b'c',
        };
        let mut bytes = bincode::serde::encode_to_vec(&header, config::standard()).unwrap();
        bytes.extend(bincode::serde::encode_to_vec(Vec::<f64>::new(), config::standard()).unwrap());
        assert!(matches!(from_bytes::<f64>(&bytes), Err(NdError::Parse(_))));
    }
}
