use crate::storage::error::{StorageError, StorageResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// Maximum number of bytes a text value may hold.
pub const STRING_LEN: usize = 128;

/// Field types supported by the storage layer. Every type has a fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Text,
}

impl DataType {
    /// Number of bytes a value of this type occupies on a page.
    pub fn size(&self) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Text => 4 + STRING_LEN,
        }
    }

    /// Reads a value of this type from `reader`.
    pub fn parse<R: Read>(&self, reader: &mut R) -> StorageResult<Value> {
        match self {
            DataType::Int => Ok(Value::Int(reader.read_i32::<BigEndian>()?)),
            DataType::Text => {
                let len = reader.read_u32::<BigEndian>()? as usize;
                if len > STRING_LEN {
                    return Err(StorageError::Corrupted(format!(
                        "text length {} exceeds {}",
                        len, STRING_LEN
                    )));
                }
                let mut buf = [0u8; STRING_LEN];
                reader.read_exact(&mut buf)?;
                let s = String::from_utf8(buf[..len].to_vec())
                    .map_err(|e| StorageError::Corrupted(e.to_string()))?;
                Ok(Value::Text(s))
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Text => write!(f, "TEXT"),
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Int(i32),
    Text(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Text(_) => DataType::Text,
        }
    }

    /// Checks that this value can be stored in a field of `data_type`.
    pub fn validate(&self, data_type: DataType) -> StorageResult<()> {
        if self.data_type() != data_type {
            return Err(StorageError::InvalidValue(format!(
                "{:?} is not of type {}",
                self, data_type
            )));
        }
        if let Value::Text(s) = self {
            if s.len() > STRING_LEN {
                return Err(StorageError::InvalidValue(format!(
                    "text of {} bytes exceeds {}",
                    s.len(),
                    STRING_LEN
                )));
            }
        }
        Ok(())
    }

    /// Writes the fixed-width encoding of this value. Text is zero-padded.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> StorageResult<()> {
        match self {
            Value::Int(v) => writer.write_i32::<BigEndian>(*v)?,
            Value::Text(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                writer.write_u32::<BigEndian>(len as u32)?;
                writer.write_all(&bytes[..len])?;
                writer.write_all(&[0u8; STRING_LEN][..STRING_LEN - len])?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_type_widths() {
        assert_eq!(DataType::Int.size(), 4);
        assert_eq!(DataType::Text.size(), 132);
    }

    #[test]
    fn test_int_encoding_is_big_endian() -> StorageResult<()> {
        let mut buf = Vec::new();
        Value::Int(0x01020304).write_to(&mut buf)?;
        assert_eq!(buf, vec![1, 2, 3, 4]);
        assert_eq!(DataType::Int.parse(&mut Cursor::new(&buf))?, Value::Int(0x01020304));
        Ok(())
    }

    #[test]
    fn test_text_is_zero_padded() -> StorageResult<()> {
        let mut buf = Vec::new();
        Value::Text("abc".to_string()).write_to(&mut buf)?;

        assert_eq!(buf.len(), DataType::Text.size());
        assert_eq!(&buf[..4], &[0, 0, 0, 3]);
        assert_eq!(&buf[4..7], b"abc");
        assert!(buf[7..].iter().all(|&b| b == 0));

        let parsed = DataType::Text.parse(&mut Cursor::new(&buf))?;
        assert_eq!(parsed, Value::Text("abc".to_string()));
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(Value::Int(1).validate(DataType::Int).is_ok());
        assert!(Value::Int(1).validate(DataType::Text).is_err());
        assert!(Value::Text("x".repeat(STRING_LEN)).validate(DataType::Text).is_ok());
        assert!(Value::Text("x".repeat(STRING_LEN + 1))
            .validate(DataType::Text)
            .is_err());
    }

    #[test]
    fn test_corrupted_text_length() {
        let mut buf = vec![0u8; DataType::Text.size()];
        buf[3] = 200;
        let result = DataType::Text.parse(&mut Cursor::new(&buf));
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }
}
