use crate::storage::error::StorageResult;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const PAGE_SIZE: usize = 4096;

/// Block-granular reader/writer over a single table file.
pub struct PageManager {
    file: File,
}

impl PageManager {
    /// Creates an empty file, truncating any existing content.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self { file })
    }

    /// Opens a file, creating it empty if it does not exist yet.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self { file })
    }

    /// Reads page `page_number` into `buf`.
    ///
    /// Fails with `UnexpectedEof` if the file does not contain the whole page.
    pub fn read_page(&mut self, page_number: u32, buf: &mut [u8; PAGE_SIZE]) -> StorageResult<()> {
        let offset = Self::page_offset(page_number);
        let file_size = self.file.metadata()?.len();

        if offset + PAGE_SIZE as u64 > file_size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "page {} needs {} bytes but file has {}",
                    page_number,
                    offset + PAGE_SIZE as u64,
                    file_size
                ),
            )
            .into());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;

        Ok(())
    }

    /// Writes `data` at page `page_number` and syncs it to disk.
    ///
    /// No retry is attempted; on failure the bytes at that offset are undefined.
    pub fn write_page(&mut self, page_number: u32, data: &[u8; PAGE_SIZE]) -> StorageResult<()> {
        let offset = Self::page_offset(page_number);

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;

        Ok(())
    }

    /// Number of pages in the file, counting a trailing partial page.
    pub fn num_pages(&self) -> StorageResult<u32> {
        let file_size = self.file.metadata()?.len();
        Ok(file_size.div_ceil(PAGE_SIZE as u64) as u32)
    }

    fn page_offset(page_number: u32) -> u64 {
        page_number as u64 * PAGE_SIZE as u64
    }
}
