//! Named binary tag trees.
//!
//! The persisted chunk format is a tagged binary tree: eleven payload
//! kinds, big-endian scalars, length-prefixed strings, and `Compound`
//! nodes holding named children terminated by an `End` marker. This crate
//! provides the in-memory [`Value`] tree, streaming [`read`]/[`write`],
//! and `"A/B/C"` path lookup over compound chains.

use std::collections::HashMap;
use std::io::{Read, Write};
use thiserror::Error;

/// Errors produced while reading or writing a tag tree.
#[derive(Debug, Error)]
pub enum NbtError {
    #[error("i/o error reading tag stream")]
    Io(#[from] std::io::Error),
    #[error("invalid tag kind byte {0:#x}")]
    InvalidTagKind(u8),
    #[error("tag string is not valid UTF-8")]
    InvalidString,
    #[error("negative length {0} in tag stream")]
    NegativeLength(i32),
    #[error("expected {expected:?} tag, got {got:?}")]
    UnexpectedTag { expected: TagKind, got: TagKind },
    #[error("top-level tag must be a compound, got {0:?}")]
    RootNotCompound(TagKind),
}

/// Tag kind bytes as they appear on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TagKind {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
}

impl TagKind {
    pub fn from_byte(byte: u8) -> Result<Self, NbtError> {
        Ok(match byte {
            0 => TagKind::End,
            1 => TagKind::Byte,
            2 => TagKind::Short,
            3 => TagKind::Int,
            4 => TagKind::Long,
            5 => TagKind::Float,
            6 => TagKind::Double,
            7 => TagKind::ByteArray,
            8 => TagKind::String,
            9 => TagKind::List,
            10 => TagKind::Compound,
            11 => TagKind::IntArray,
            other => return Err(NbtError::InvalidTagKind(other)),
        })
    }
}

/// A tag payload. Lists are homogeneous and remember their item kind so
/// that empty lists round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(TagKind, Vec<Value>),
    Compound(HashMap<String, Value>),
    IntArray(Vec<i32>),
}

impl Value {
    pub fn kind(&self) -> TagKind {
        match self {
            Value::Byte(_) => TagKind::Byte,
            Value::Short(_) => TagKind::Short,
            Value::Int(_) => TagKind::Int,
            Value::Long(_) => TagKind::Long,
            Value::Float(_) => TagKind::Float,
            Value::Double(_) => TagKind::Double,
            Value::ByteArray(_) => TagKind::ByteArray,
            Value::String(_) => TagKind::String,
            Value::List(_, _) => TagKind::List,
            Value::Compound(_) => TagKind::Compound,
            Value::IntArray(_) => TagKind::IntArray,
        }
    }

    /// Walk a `/`-separated path of compound children.
    ///
    /// Defined only over `Compound` chains; any non-compound intermediate
    /// or missing name yields `None`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut node = self;
        for name in path.split('/') {
            match node {
                Value::Compound(children) => node = children.get(name)?,
                _ => return None,
            }
        }
        Some(node)
    }

    pub fn as_byte(&self) -> Option<i8> {
        match self {
            Value::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_short(&self) -> Option<i16> {
        match self {
            Value::Short(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[u8]> {
        match self {
            Value::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(_, v) => Some(v),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Compound(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Value::IntArray(v) => Some(v),
            _ => None,
        }
    }
}

/// Read a tag tree whose root is a named compound. The root name is
/// discarded; chunk files use an empty one.
pub fn read<R: Read>(reader: &mut R) -> Result<Value, NbtError> {
    let (_, value) = read_named(reader)?;
    Ok(value)
}

/// Read a tag tree, returning the root's name alongside its value.
pub fn read_named<R: Read>(reader: &mut R) -> Result<(String, Value), NbtError> {
    let kind = TagKind::from_byte(read_u8(reader)?)?;
    if kind != TagKind::Compound {
        return Err(NbtError::RootNotCompound(kind));
    }
    let name = read_string(reader)?;
    let value = read_payload(reader, TagKind::Compound)?;
    Ok((name, value))
}

/// Write a tag tree rooted at a named compound.
pub fn write<W: Write>(writer: &mut W, name: &str, value: &Value) -> Result<(), NbtError> {
    if value.kind() != TagKind::Compound {
        return Err(NbtError::UnexpectedTag {
            expected: TagKind::Compound,
            got: value.kind(),
        });
    }
    write_u8(writer, TagKind::Compound as u8)?;
    write_string(writer, name)?;
    write_payload(writer, value)
}

fn read_payload<R: Read>(reader: &mut R, kind: TagKind) -> Result<Value, NbtError> {
    Ok(match kind {
        TagKind::End => {
            return Err(NbtError::UnexpectedTag {
                expected: TagKind::Compound,
                got: TagKind::End,
            })
        }
        TagKind::Byte => Value::Byte(read_u8(reader)? as i8),
        TagKind::Short => Value::Short(i16::from_be_bytes(read_array(reader)?)),
        TagKind::Int => Value::Int(i32::from_be_bytes(read_array(reader)?)),
        TagKind::Long => Value::Long(i64::from_be_bytes(read_array(reader)?)),
        TagKind::Float => Value::Float(f32::from_be_bytes(read_array(reader)?)),
        TagKind::Double => Value::Double(f64::from_be_bytes(read_array(reader)?)),
        TagKind::ByteArray => {
            let len = read_len(reader)?;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            Value::ByteArray(bytes)
        }
        TagKind::String => Value::String(read_string(reader)?),
        TagKind::List => {
            let item_kind = TagKind::from_byte(read_u8(reader)?)?;
            let len = read_len(reader)?;
            let mut items = Vec::with_capacity(len.min(1 << 16));
            for _ in 0..len {
                items.push(read_payload(reader, item_kind)?);
            }
            Value::List(item_kind, items)
        }
        TagKind::Compound => {
            let mut children = HashMap::new();
            loop {
                let child_kind = TagKind::from_byte(read_u8(reader)?)?;
                if child_kind == TagKind::End {
                    break;
                }
                let name = read_string(reader)?;
                let value = read_payload(reader, child_kind)?;
                children.insert(name, value);
            }
            Value::Compound(children)
        }
        TagKind::IntArray => {
            let len = read_len(reader)?;
            let mut items = Vec::with_capacity(len.min(1 << 16));
            for _ in 0..len {
                items.push(i32::from_be_bytes(read_array(reader)?));
            }
            Value::IntArray(items)
        }
    })
}

fn write_payload<W: Write>(writer: &mut W, value: &Value) -> Result<(), NbtError> {
    match value {
        Value::Byte(v) => write_u8(writer, *v as u8)?,
        Value::Short(v) => writer.write_all(&v.to_be_bytes())?,
        Value::Int(v) => writer.write_all(&v.to_be_bytes())?,
        Value::Long(v) => writer.write_all(&v.to_be_bytes())?,
        Value::Float(v) => writer.write_all(&v.to_be_bytes())?,
        Value::Double(v) => writer.write_all(&v.to_be_bytes())?,
        Value::ByteArray(bytes) => {
            writer.write_all(&(bytes.len() as i32).to_be_bytes())?;
            writer.write_all(bytes)?;
        }
        Value::String(s) => write_string(writer, s)?,
        Value::List(item_kind, items) => {
            write_u8(writer, *item_kind as u8)?;
            writer.write_all(&(items.len() as i32).to_be_bytes())?;
            for item in items {
                if item.kind() != *item_kind {
                    return Err(NbtError::UnexpectedTag {
                        expected: *item_kind,
                        got: item.kind(),
                    });
                }
                write_payload(writer, item)?;
            }
        }
        Value::Compound(children) => {
            // Sorted iteration keeps the encoding deterministic.
            let mut names: Vec<&String> = children.keys().collect();
            names.sort();
            for name in names {
                let child = &children[name];
                write_u8(writer, child.kind() as u8)?;
                write_string(writer, name)?;
                write_payload(writer, child)?;
            }
            write_u8(writer, TagKind::End as u8)?;
        }
        Value::IntArray(items) => {
            writer.write_all(&(items.len() as i32).to_be_bytes())?;
            for item in items {
                writer.write_all(&item.to_be_bytes())?;
            }
        }
    }
    Ok(())
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8, NbtError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(byte[0])
}

fn write_u8<W: Write>(writer: &mut W, byte: u8) -> Result<(), NbtError> {
    writer.write_all(&[byte])?;
    Ok(())
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], NbtError> {
    let mut bytes = [0u8; N];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn read_len<R: Read>(reader: &mut R) -> Result<usize, NbtError> {
    let len = i32::from_be_bytes(read_array(reader)?);
    if len < 0 {
        return Err(NbtError::NegativeLength(len));
    }
    Ok(len as usize)
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, NbtError> {
    let len = i16::from_be_bytes(read_array(reader)?);
    if len < 0 {
        return Err(NbtError::NegativeLength(len as i32));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| NbtError::InvalidString)
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<(), NbtError> {
    writer.write_all(&(s.len() as i16).to_be_bytes())?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}
