use crate::access::schema::Schema;
use crate::access::value::Value;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// Locates one tuple slot within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}

/// A row: schema, one value per field, and its location once stored.
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Builds a tuple, validating every value against `schema`.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> StorageResult<Self> {
        if values.len() != schema.num_fields() {
            return Err(StorageError::InvalidValue(format!(
                "expected {} values, got {}",
                schema.num_fields(),
                values.len()
            )));
        }
        for (value, field) in values.iter().zip(schema.fields()) {
            value.validate(field.data_type)?;
        }
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn set_value(&mut self, i: usize, value: Value) -> StorageResult<()> {
        let data_type = self.schema.field_type(i).ok_or_else(|| {
            StorageError::InvalidValue(format!("field index {} out of range", i))
        })?;
        value.validate(data_type)?;
        self.values[i] = value;
        Ok(())
    }

    /// Where the tuple is stored; `None` until it has been placed on a page.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub(crate) fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> StorageResult<()> {
        for value in &self.values {
            value.write_to(writer)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(
        schema: &Arc<Schema>,
        reader: &mut R,
        record_id: RecordId,
    ) -> StorageResult<Self> {
        let values = schema
            .fields()
            .map(|field| field.data_type.parse(reader))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Self {
            schema: Arc::clone(schema),
            values,
            record_id: Some(record_id),
        })
    }
}

/// Tuples compare by content; the record id is location, not identity.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values && self.schema == other.schema
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join("\t"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::DataType;
    use std::io::Cursor;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(vec![
                (DataType::Int, Some("id".to_string())),
                (DataType::Text, Some("name".to_string())),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_record_id_ordering() {
        let rid1 = RecordId::new(PageId::new(1, 1), 5);
        let rid2 = RecordId::new(PageId::new(1, 1), 10);
        let rid3 = RecordId::new(PageId::new(1, 2), 3);

        assert!(rid1 < rid2);
        assert!(rid2 < rid3);
        assert_eq!(rid1, RecordId::new(PageId::new(1, 1), 5));
        assert_eq!(rid3.to_string(), "1:2#3");
    }

    #[test]
    fn test_new_validates_values() {
        let schema = schema();

        assert!(Tuple::new(schema.clone(), vec![Value::Int(1)]).is_err());
        assert!(Tuple::new(schema.clone(), vec![Value::Int(1), Value::Int(2)]).is_err());

        let tuple = Tuple::new(schema, vec![Value::Int(1), Value::Text("a".into())]).unwrap();
        assert_eq!(tuple.record_id(), None);
        assert_eq!(tuple.to_string(), "1\ta");
    }

    #[test]
    fn test_set_value() {
        let mut tuple =
            Tuple::new(schema(), vec![Value::Int(1), Value::Text("a".into())]).unwrap();

        tuple.set_value(0, Value::Int(9)).unwrap();
        assert_eq!(tuple.value(0), Some(&Value::Int(9)));
        assert!(tuple.set_value(1, Value::Int(3)).is_err());
        assert!(tuple.set_value(5, Value::Int(3)).is_err());
    }

    #[test]
    fn test_encoding_is_fixed_width() -> StorageResult<()> {
        let schema = schema();
        let tuple = Tuple::new(schema.clone(), vec![Value::Int(7), Value::Text("bob".into())])?;

        let mut buf = Vec::new();
        tuple.write_to(&mut buf)?;
        assert_eq!(buf.len(), schema.size());

        let rid = RecordId::new(PageId::new(1, 0), 2);
        let decoded = Tuple::read_from(&schema, &mut Cursor::new(&buf), rid)?;
        assert_eq!(decoded, tuple);
        assert_eq!(decoded.record_id(), Some(rid));
        Ok(())
    }
}
