use crate::access::schema::Schema;
use crate::access::tuple::{RecordId, Tuple};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageId};
use crate::storage::PAGE_SIZE;
use crate::transaction::TransactionId;
use std::io::Cursor;
use std::sync::Arc;

/// Slotted page of fixed-width tuples.
///
/// Layout: a header bitmap of `ceil(num_slots / 8)` bytes, one bit per slot
/// (bit `i % 8` of byte `i / 8`, set = occupied), followed by `num_slots`
/// tuple slots of `schema.size()` bytes each. Unused slots and the tail of the
/// page are zero.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
}

impl HeapPage {
    /// Number of tuples a page holds: each costs its bytes plus one header bit.
    pub fn slots_per_page(schema: &Schema) -> usize {
        (PAGE_SIZE * 8) / (schema.size() * 8 + 1)
    }

    pub fn header_size_for(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Bytes of a page with every slot empty.
    pub fn empty_page_data() -> Box<[u8; PAGE_SIZE]> {
        Box::new([0u8; PAGE_SIZE])
    }

    pub fn empty(page_id: PageId, schema: Arc<Schema>) -> Self {
        let num_slots = Self::slots_per_page(&schema);
        Self {
            page_id,
            header: vec![0u8; Self::header_size_for(num_slots)],
            tuples: vec![None; num_slots],
            schema,
            dirty: None,
        }
    }

    /// Parses a page image read from disk.
    pub fn from_bytes(
        page_id: PageId,
        data: &[u8; PAGE_SIZE],
        schema: Arc<Schema>,
    ) -> StorageResult<Self> {
        let mut page = Self::empty(page_id, schema);
        let header_size = page.header.len();
        let tuple_size = page.schema.size();

        page.header.copy_from_slice(&data[..header_size]);

        for slot in 0..page.tuples.len() {
            if !page.is_slot_used(slot as u16) {
                continue;
            }
            let start = header_size + slot * tuple_size;
            let mut reader = Cursor::new(&data[start..start + tuple_size]);
            let record_id = RecordId::new(page_id, slot as u16);
            page.tuples[slot] = Some(Tuple::read_from(&page.schema, &mut reader, record_id)?);
        }

        Ok(page)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_slots(&self) -> u16 {
        self.tuples.len() as u16
    }

    pub fn header_size(&self) -> usize {
        self.header.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots())
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    pub fn is_slot_used(&self, slot: u16) -> bool {
        let slot = slot as usize;
        slot < self.tuples.len() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot_used(&mut self, slot: u16, used: bool) {
        let slot = slot as usize;
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Places `tuple` in the lowest empty slot and records its new location.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> StorageResult<RecordId> {
        if **tuple.schema() != *self.schema {
            return Err(StorageError::SchemaMismatch);
        }

        let slot = (0..self.num_slots())
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or(StorageError::PageFull(self.page_id))?;

        let record_id = RecordId::new(self.page_id, slot);
        tuple.set_record_id(Some(record_id));
        self.set_slot_used(slot, true);
        self.tuples[slot as usize] = Some(tuple.clone());

        Ok(record_id)
    }

    /// Empties the slot named by the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> StorageResult<()> {
        let record_id = tuple.record_id().ok_or(StorageError::TupleNotPlaced)?;
        if record_id.page_id != self.page_id {
            return Err(StorageError::TupleNotOnPage {
                record_id,
                page_id: self.page_id,
            });
        }
        if record_id.slot >= self.num_slots() {
            return Err(StorageError::InvalidSlot {
                slot: record_id.slot,
                num_slots: self.num_slots(),
            });
        }
        if !self.is_slot_used(record_id.slot) {
            return Err(StorageError::SlotEmpty(record_id));
        }

        self.set_slot_used(record_id.slot, false);
        self.tuples[record_id.slot as usize] = None;
        Ok(())
    }

    pub fn tuple(&self, slot: u16) -> Option<&Tuple> {
        self.tuples.get(slot as usize).and_then(Option::as_ref)
    }

    /// Live tuples in slot order.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }
}

impl Page for HeapPage {
    fn id(&self) -> PageId {
        self.page_id
    }

    fn page_data(&self) -> Box<[u8; PAGE_SIZE]> {
        let mut data = Self::empty_page_data();
        let header_size = self.header.len();
        let tuple_size = self.schema.size();

        data[..header_size].copy_from_slice(&self.header);

        for (slot, tuple) in self.tuples.iter().enumerate() {
            let Some(tuple) = tuple else {
                continue;
            };
            let start = header_size + slot * tuple_size;
            let mut writer = Cursor::new(&mut data[start..start + tuple_size]);
            // Tuples are validated against the schema, so this cannot overflow.
            if tuple.write_to(&mut writer).is_err() {
                data[start..start + tuple_size].fill(0);
            }
        }

        data
    }

    fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty = tid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{DataType, Value};
    use anyhow::Result;

    fn int_schema(fields: usize) -> Arc<Schema> {
        Arc::new(Schema::ints(fields).unwrap())
    }

    fn int_tuple(schema: &Arc<Schema>, v: i32) -> Tuple {
        let values = (0..schema.num_fields()).map(|_| Value::Int(v)).collect();
        Tuple::new(Arc::clone(schema), values).unwrap()
    }

    #[test]
    fn test_slot_arithmetic() {
        // 64-byte tuples: 32768 bits / 513 bits per slot
        let schema = int_schema(16);
        assert_eq!(HeapPage::slots_per_page(&schema), 63);
        assert_eq!(HeapPage::header_size_for(63), 8);

        let schema = int_schema(2);
        assert_eq!(HeapPage::slots_per_page(&schema), 504);
        assert_eq!(HeapPage::header_size_for(504), 63);
    }

    #[test]
    fn test_empty_page() {
        let page = HeapPage::empty(PageId::new(1, 0), int_schema(16));

        assert_eq!(page.num_slots(), 63);
        assert_eq!(page.num_empty_slots(), 63);
        assert_eq!(page.tuples().count(), 0);
        assert_eq!(page.is_dirty(), None);
        assert_eq!(*page.page_data(), *HeapPage::empty_page_data());
    }

    #[test]
    fn test_insert_uses_lowest_free_slot() -> Result<()> {
        let schema = int_schema(2);
        let mut page = HeapPage::empty(PageId::new(1, 3), schema.clone());

        let mut t0 = int_tuple(&schema, 10);
        let mut t1 = int_tuple(&schema, 11);
        let mut t2 = int_tuple(&schema, 12);
        assert_eq!(page.insert_tuple(&mut t0)?.slot, 0);
        assert_eq!(page.insert_tuple(&mut t1)?.slot, 1);
        assert_eq!(page.insert_tuple(&mut t2)?.slot, 2);
        assert_eq!(t1.record_id(), Some(RecordId::new(PageId::new(1, 3), 1)));

        page.delete_tuple(&t1)?;
        assert!(!page.is_slot_used(1));

        let mut t3 = int_tuple(&schema, 13);
        assert_eq!(page.insert_tuple(&mut t3)?.slot, 1);

        let values: Vec<_> = page.tuples().map(|t| t.value(0).cloned()).collect();
        assert_eq!(
            values,
            vec![Some(Value::Int(10)), Some(Value::Int(13)), Some(Value::Int(12))]
        );
        Ok(())
    }

    #[test]
    fn test_delete_frees_exactly_one_slot() -> Result<()> {
        let schema = int_schema(4);
        let mut page = HeapPage::empty(PageId::new(1, 0), schema.clone());
        let mut tuple = int_tuple(&schema, 1);
        page.insert_tuple(&mut tuple)?;

        let before = page.num_empty_slots();
        page.delete_tuple(&tuple)?;
        assert_eq!(page.num_empty_slots(), before + 1);

        assert!(matches!(
            page.delete_tuple(&tuple),
            Err(StorageError::SlotEmpty(_))
        ));
        Ok(())
    }

    #[test]
    fn test_delete_rejects_foreign_tuples() -> Result<()> {
        let schema = int_schema(4);
        let mut page = HeapPage::empty(PageId::new(1, 0), schema.clone());

        let unplaced = int_tuple(&schema, 1);
        assert!(matches!(
            page.delete_tuple(&unplaced),
            Err(StorageError::TupleNotPlaced)
        ));

        let mut elsewhere = int_tuple(&schema, 1);
        HeapPage::empty(PageId::new(1, 9), schema.clone()).insert_tuple(&mut elsewhere)?;
        assert!(matches!(
            page.delete_tuple(&elsewhere),
            Err(StorageError::TupleNotOnPage { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_page_full() -> Result<()> {
        let schema = int_schema(16);
        let mut page = HeapPage::empty(PageId::new(1, 0), schema.clone());

        for i in 0..63 {
            page.insert_tuple(&mut int_tuple(&schema, i))?;
        }
        assert_eq!(page.num_empty_slots(), 0);

        let result = page.insert_tuple(&mut int_tuple(&schema, 63));
        assert!(matches!(result, Err(StorageError::PageFull(_))));
        Ok(())
    }

    #[test]
    fn test_schema_mismatch() {
        let mut page = HeapPage::empty(PageId::new(1, 0), int_schema(2));
        let other = int_schema(3);
        let result = page.insert_tuple(&mut int_tuple(&other, 1));
        assert!(matches!(result, Err(StorageError::SchemaMismatch)));
    }

    #[test]
    fn test_serialize_deserialize_identity() -> Result<()> {
        let schema = Arc::new(Schema::new(vec![
            (DataType::Int, Some("id".to_string())),
            (DataType::Text, Some("name".to_string())),
        ])?);
        let pid = PageId::new(2, 5);
        let mut page = HeapPage::empty(pid, schema.clone());

        let mut rows = Vec::new();
        for i in 0..5 {
            let mut tuple = Tuple::new(
                schema.clone(),
                vec![Value::Int(i), Value::Text(format!("row-{}", i))],
            )?;
            page.insert_tuple(&mut tuple)?;
            rows.push(tuple);
        }
        page.delete_tuple(&rows[2])?;

        let bytes = page.page_data();
        let decoded = HeapPage::from_bytes(pid, &bytes, schema)?;

        assert_eq!(*decoded.page_data(), *bytes);
        assert_eq!(decoded.tuples().count(), 4);
        assert!(!decoded.is_slot_used(2));
        assert_eq!(decoded.tuple(3).and_then(|t| t.record_id()), rows[3].record_id());

        // The freed slot is zeroed.
        let start = decoded.header_size() + 2 * decoded.schema().size();
        assert!(bytes[start..start + decoded.schema().size()]
            .iter()
            .all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_header_bits_match_live_tuples() -> Result<()> {
        let schema = int_schema(1);
        let mut page = HeapPage::empty(PageId::new(1, 0), schema.clone());
        let mut placed = Vec::new();
        for i in 0..20 {
            let mut tuple = int_tuple(&schema, i);
            page.insert_tuple(&mut tuple)?;
            placed.push(tuple);
        }
        for tuple in placed.iter().step_by(3) {
            page.delete_tuple(tuple)?;
        }

        let set_bits: u32 = page.page_data()[..page.header_size()]
            .iter()
            .map(|b| b.count_ones())
            .sum();
        assert_eq!(set_bits as usize, page.tuples().count());
        assert_eq!(set_bits, 13);
        Ok(())
    }

    #[test]
    fn test_mark_dirty() {
        let mut page = HeapPage::empty(PageId::new(1, 0), int_schema(1));
        page.mark_dirty(Some(TransactionId(4)));
        assert_eq!(page.is_dirty(), Some(TransactionId(4)));
        page.mark_dirty(None);
        assert_eq!(page.is_dirty(), None);
    }
}
