//! Table schemas.

use crate::access::value::DataType;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::HeapPage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One column of a schema. Names are optional.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub data_type: DataType,
    pub name: Option<String>,
}

/// Ordered list of typed fields describing a fixed-width tuple layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Creates a schema from `(type, name)` pairs. At least one field is
    /// required, and at least one tuple must fit on a page.
    pub fn new(fields: Vec<(DataType, Option<String>)>) -> StorageResult<Self> {
        if fields.is_empty() {
            return Err(StorageError::InvalidValue(
                "schema must have at least one field".to_string(),
            ));
        }
        let schema = Self {
            fields: fields
                .into_iter()
                .map(|(data_type, name)| Field { data_type, name })
                .collect(),
        };
        if HeapPage::slots_per_page(&schema) == 0 {
            return Err(StorageError::InvalidValue(format!(
                "{}-byte tuples do not fit on a page",
                schema.size()
            )));
        }
        Ok(schema)
    }

    /// Creates a schema of anonymous fields.
    pub fn from_types(types: &[DataType]) -> StorageResult<Self> {
        Self::new(types.iter().map(|t| (*t, None)).collect())
    }

    /// Creates a schema of `count` integer columns named `c0..c{count-1}`.
    pub fn ints(count: usize) -> StorageResult<Self> {
        Self::new(
            (0..count)
                .map(|i| (DataType::Int, Some(format!("c{}", i))))
                .collect(),
        )
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Size in bytes of one tuple with this schema.
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.data_type.size()).sum()
    }

    pub fn field_type(&self, i: usize) -> Option<DataType> {
        self.fields.get(i).map(|f| f.data_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.fields.get(i).and_then(|f| f.name.as_deref())
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| match &field.name {
                Some(name) => format!("{}({})", name, field.data_type),
                None => format!("({})", field.data_type),
            })
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
