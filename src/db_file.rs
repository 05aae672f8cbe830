use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use log::{debug, trace};

use crate::buffer_pool::BufferPool;
use crate::page::Page;
use crate::page_id::PageId;
use crate::permissions::Permission;
use crate::transaction_id::TransactionId;
use crate::types::BufferResult;

/// Identifies a single tuple within a page's fixed-width slot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: u32,
}

/// The per-table page store the buffer pool treats as an external
/// collaborator (SPEC_FULL.md §1/§6): `readPage`/`writePage` for the
/// buffer pool's own use, and `insertTuple`/`deleteTuple` for access
/// methods, which fetch and mutate pages through `bp` (thereby acquiring
/// the buffer pool's exclusive locks) and hand the dirtied pages back.
pub trait DbFile: Send + Sync {
    fn table_id(&self) -> i32;
    fn read_page(&self, pid: PageId) -> BufferResult<Page>;
    fn write_page(&self, page: &Page) -> BufferResult<()>;
    fn insert_tuple(&self, bp: &BufferPool, tid: TransactionId, tuple: &[u8]) -> BufferResult<Vec<Page>>;
    fn delete_tuple(&self, bp: &BufferPool, tid: TransactionId, rid: RecordId) -> BufferResult<Vec<Page>>;
}

/// A single-file heap table of fixed-width rows, one bitmap header per
/// page marking used/free slots -- the same layout as the teacher's
/// `HeapPage` (`src/page.rs`), generalized from a `RowScheme`-keyed page
/// to the crate's generic `PageId`/`Page` model.
///
/// `Tuple`/`TupleDesc`/`Field` are out of scope (SPEC_FULL.md §1); a
/// tuple here is just `tuple_size` raw bytes.
pub struct HeapFile {
    table_id: i32,
    tuple_size: usize,
    file: Mutex<File>,
}

impl HeapFile {
    pub fn new<P: AsRef<Path>>(path: P, table_id: i32, tuple_size: usize) -> std::io::Result<Self> {
        assert!(tuple_size > 0, "tuple_size must be positive");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            table_id,
            tuple_size,
            file: Mutex::new(file),
        })
    }

    fn slots_per_page(&self) -> usize {
        let page_size = BufferPool::get_page_size();
        (page_size * 8) / (self.tuple_size * 8 + 1)
    }

    fn header_size(&self) -> usize {
        (self.slots_per_page() + 7) / 8
    }

    fn slot_offset(&self, slot: usize) -> usize {
        self.header_size() + slot * self.tuple_size
    }

    fn slot_used(header: &[u8], slot: usize) -> bool {
        let byte = header[slot / 8];
        (byte & (1 << (7 - (slot % 8)))) != 0
    }

    fn set_slot(header: &mut [u8], slot: usize, used: bool) {
        let mask = 1u8 << (7 - (slot % 8));
        if used {
            header[slot / 8] |= mask;
        } else {
            header[slot / 8] &= !mask;
        }
    }

    fn num_pages(&self) -> BufferResult<u32> {
        let file = self.file.lock().unwrap();
        let len = file.metadata()?.len();
        Ok((len / BufferPool::get_page_size() as u64) as u32)
    }
}

impl DbFile for HeapFile {
    fn table_id(&self) -> i32 {
        self.table_id
    }

    fn read_page(&self, pid: PageId) -> BufferResult<Page> {
        let page_size = BufferPool::get_page_size();
        let mut file = self.file.lock().unwrap();
        let offset = pid.page_no() as u64 * page_size as u64;
        let len = file.metadata()?.len();

        let mut buf = vec![0u8; page_size];
        if offset < len {
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        trace!("read page {} from disk", pid);
        Ok(Page::new(pid, buf))
    }

    fn write_page(&self, page: &Page) -> BufferResult<()> {
        let page_size = BufferPool::get_page_size();
        let mut file = self.file.lock().unwrap();
        let offset = page.pid().page_no() as u64 * page_size as u64;
        let len = file.metadata()?.len();
        if len < offset + page_size as u64 {
            file.set_len(offset + page_size as u64)?;
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.data())?;
        file.sync_data()?;
        debug!("wrote page {} to disk", page.pid());
        Ok(())
    }

    fn insert_tuple(&self, bp: &BufferPool, tid: TransactionId, tuple: &[u8]) -> BufferResult<Vec<Page>> {
        assert_eq!(
            tuple.len(),
            self.tuple_size,
            "tuple length must match table's fixed row size"
        );

        let slots_per_page = self.slots_per_page();
        let header_size = self.header_size();
        let num_pages = self.num_pages()?;

        // Scan existing pages for a free slot, same linear strategy the
        // teacher's BufferPool uses; fine at this scale since it's the
        // access method, not the buffer pool, that pays the cost.
        for page_no in 0..num_pages {
            let pid = PageId::new(self.table_id, page_no);
            let mut page = bp.get_page(tid, pid, Permission::ReadWrite)?;
            let header = page.data()[..header_size].to_vec();
            if let Some(slot) = (0..slots_per_page).find(|&s| !Self::slot_used(&header, s)) {
                self.write_tuple_into(&mut page, slot, tuple);
                return Ok(vec![page]);
            }
        }

        // No free slot anywhere: extend the file with a fresh page.
        let pid = PageId::new(self.table_id, num_pages);
        let mut page = bp.get_page(tid, pid, Permission::ReadWrite)?;
        self.write_tuple_into(&mut page, 0, tuple);
        Ok(vec![page])
    }

    fn delete_tuple(&self, bp: &BufferPool, tid: TransactionId, rid: RecordId) -> BufferResult<Vec<Page>> {
        let mut page = bp.get_page(tid, rid.pid, Permission::ReadWrite)?;
        let header_size = self.header_size();
        let mut header = page.data()[..header_size].to_vec();
        Self::set_slot(&mut header, rid.slot as usize, false);
        page.data_mut()[..header_size].copy_from_slice(&header);
        Ok(vec![page])
    }
}

impl HeapFile {
    fn write_tuple_into(&self, page: &mut Page, slot: usize, tuple: &[u8]) {
        let header_size = self.header_size();
        let mut header = page.data()[..header_size].to_vec();
        Self::set_slot(&mut header, slot, true);
        let offset = self.slot_offset(slot);
        let data = page.data_mut();
        data[..header_size].copy_from_slice(&header);
        data[offset..offset + self.tuple_size].copy_from_slice(tuple);
    }
}
