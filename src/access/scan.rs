//! Sequential scan over a heap-organized table.

use crate::access::tuple::Tuple;
use crate::access::{TableFile, TupleCursor};
use crate::storage::buffer::BufferPool;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use crate::transaction::{Permissions, TransactionId};
use std::vec;

enum CursorState {
    Inert,
    Open {
        page_number: u32,
        tuples: vec::IntoIter<Tuple>,
    },
    Closed,
}

/// Walks a table page by page under shared locks, yielding live tuples in
/// page and slot order. Pages are read as of the moment the cursor reaches
/// them, and the page count is re-checked on every advance.
pub struct HeapFileIterator<'a> {
    file: &'a dyn TableFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    state: CursorState,
}

impl<'a> HeapFileIterator<'a> {
    pub fn new(file: &'a dyn TableFile, pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            state: CursorState::Inert,
        }
    }

    fn load(&self, page_number: u32) -> StorageResult<vec::IntoIter<Tuple>> {
        if page_number >= self.file.num_pages() {
            return Ok(Vec::new().into_iter());
        }
        let page_id = PageId::new(self.file.id(), page_number);
        let page = self.pool.get_page(self.tid, page_id, Permissions::ReadOnly)?;
        let tuples: Vec<Tuple> = page.read().tuples().cloned().collect();
        Ok(tuples.into_iter())
    }
}

impl TupleCursor for HeapFileIterator<'_> {
    fn open(&mut self) -> StorageResult<()> {
        if matches!(self.state, CursorState::Closed) {
            return Err(StorageError::CursorClosed);
        }
        let tuples = self.load(0)?;
        self.state = CursorState::Open {
            page_number: 0,
            tuples,
        };
        Ok(())
    }

    fn has_next(&mut self) -> StorageResult<bool> {
        loop {
            let next_page = match &self.state {
                CursorState::Inert => return Err(StorageError::CursorNotOpen),
                CursorState::Closed => return Err(StorageError::CursorClosed),
                CursorState::Open { tuples, .. } if !tuples.as_slice().is_empty() => return Ok(true),
                CursorState::Open { page_number, .. } => page_number + 1,
            };

            if next_page >= self.file.num_pages() {
                return Ok(false);
            }
            let tuples = self.load(next_page)?;
            self.state = CursorState::Open {
                page_number: next_page,
                tuples,
            };
        }
    }

    fn next(&mut self) -> StorageResult<Tuple> {
        if !self.has_next()? {
            return Err(StorageError::NoMoreTuples);
        }
        match &mut self.state {
            CursorState::Open { tuples, .. } => tuples.next().ok_or(StorageError::NoMoreTuples),
            _ => Err(StorageError::CursorNotOpen),
        }
    }

    fn rewind(&mut self) -> StorageResult<()> {
        match self.state {
            CursorState::Inert => Err(StorageError::CursorNotOpen),
            CursorState::Closed => Err(StorageError::CursorClosed),
            CursorState::Open { .. } => self.open(),
        }
    }

    fn close(&mut self) {
        self.state = CursorState::Closed;
    }
}
