//! Minimal self-describing table/image writer: the concrete, swappable
//! stand-in for the full FITS writer, which is out of scope per the
//! specification.
//!
//! Grounded on `examples/original_source/FITSWriter.cpp`'s header-key names
//! and column-name conventions; serialized as a JSON metadata header
//! followed by raw column/image bytes, in the spirit of `src/sigmf.rs`'s
//! JSON-sidecar-plus-raw-data layout.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A typed column's values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "values")]
pub enum Column {
    /// Unsigned 16-bit.
    U16(Vec<u16>),
    /// Unsigned 32-bit.
    U32(Vec<u32>),
    /// Signed 32-bit.
    I32(Vec<i32>),
    /// 32-bit float.
    F32(Vec<f32>),
    /// 64-bit float.
    F64(Vec<f64>),
}

impl Column {
    fn byte_len(&self) -> usize {
        match self {
            Column::U16(v) => v.len() * 2,
            Column::U32(v) => v.len() * 4,
            Column::I32(v) => v.len() * 4,
            Column::F32(v) => v.len() * 4,
            Column::F64(v) => v.len() * 8,
        }
    }

    fn write_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Column::U16(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Column::U32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Column::I32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Column::F32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Column::F64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
        }
    }
}

/// A named-column binary table.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Columns in write order.
    pub columns: Vec<(String, Column)>,
}

/// A row-major 2-D image.
#[derive(Debug, Clone)]
pub struct Image2D {
    /// Pixel width.
    pub width: usize,
    /// Pixel height.
    pub height: usize,
    /// Row-major `width * height` pixel data.
    pub data: Vec<u16>,
}

/// A scalar archive header value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    Str(String),
}

#[derive(Serialize, Deserialize)]
struct ColumnMeta {
    name: String,
    kind: String,
    byte_len: usize,
}

#[derive(Serialize, Deserialize)]
struct ImageMeta {
    width: usize,
    height: usize,
    byte_len: usize,
}

#[derive(Serialize, Deserialize)]
struct FileMeta {
    header: BTreeMap<String, HeaderValue>,
    image: Option<ImageMeta>,
    columns: Vec<ColumnMeta>,
}

fn column_kind(c: &Column) -> &'static str {
    match c {
        Column::U16(_) => "u16",
        Column::U32(_) => "u32",
        Column::I32(_) => "i32",
        Column::F32(_) => "f32",
        Column::F64(_) => "f64",
    }
}

/// Write one product file: a JSON metadata header, a newline, then the raw
/// image bytes (if any) followed by the raw column bytes in declaration
/// order.
///
/// ProductWriter depends only on this function plus [`Table`], [`Column`],
/// and [`Image2D`], so a real FITS backend could replace this module
/// without any channel processor needing to change.
pub fn write_product(
    path: &Path,
    header: &[(String, HeaderValue)],
    image: Option<&Image2D>,
    table: Option<&Table>,
) -> Result<()> {
    let meta = FileMeta {
        header: header.iter().cloned().collect(),
        image: image.map(|i| ImageMeta {
            width: i.width,
            height: i.height,
            byte_len: i.data.len() * 2,
        }),
        columns: table
            .map(|t| {
                t.columns
                    .iter()
                    .map(|(name, c)| ColumnMeta {
                        name: name.clone(),
                        kind: column_kind(c).to_string(),
                        byte_len: c.byte_len(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    };

    let meta_json = serde_json::to_vec(&meta)?;
    let mut out = Vec::with_capacity(meta_json.len() + 1);
    out.extend_from_slice(&meta_json);
    out.push(b'\n');

    if let Some(img) = image {
        for px in &img.data {
            out.extend_from_slice(&px.to_be_bytes());
        }
    }
    if let Some(t) = table {
        for (_, c) in &t.columns {
            c.write_bytes(&mut out);
        }
    }

    let mut f = std::fs::File::create(path)?;
    f.write_all(&out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_table_bytes() -> Result<()> {
        let tmpd = tempfile::tempdir()?;
        let path = tmpd.path().join("product.fit");

        let header = vec![
            ("EXTNAME".to_string(), HeaderValue::Str("ESP".to_string())),
            ("SOD".to_string(), HeaderValue::Int(123)),
        ];
        let table = Table {
            columns: vec![("q0".to_string(), Column::U16(vec![1, 2, 3]))],
        };
        write_product(&path, &header, None, Some(&table))?;

        let bytes = std::fs::read(&path)?;
        let newline = bytes.iter().position(|&b| b == b'\n').unwrap();
        let meta: FileMeta = serde_json::from_slice(&bytes[..newline])?;
        assert_eq!(meta.header.get("SOD"), Some(&HeaderValue::Int(123)));
        assert_eq!(meta.columns[0].byte_len, 6);
        assert_eq!(bytes.len() - newline - 1, 6);
        Ok(())
    }
}
