use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::buffer::{BufferPool, Permissions};
use crate::common::{page_size, TableId};
use crate::error::{DbError, Result};
use crate::storage::heap_page::HeapPage;
use crate::storage::HeapPageId;
use crate::transaction::TransactionId;
use crate::tuple::desc::TupleDesc;
use crate::tuple::{RecordId, Tuple};

/// One table's backing store: an unordered collection of tuples laid out
/// page by page in a single flat file. Page `n` occupies bytes
/// `n * page_size .. (n + 1) * page_size`.
///
/// Reads and writes open a fresh handle per call; concurrent writers to
/// the same page are excluded by the buffer pool's page locks.
pub struct HeapFile {
    path: PathBuf,
    desc: Arc<TupleDesc>,
    table_id: TableId,
    // serializes concurrent appends so two inserts cannot claim the same
    // new page number
    append_lock: Mutex<()>,
}

impl HeapFile {
    /// Opens (creating if absent) the backing file. The table id is
    /// derived from the canonical path's hash, so the same file always
    /// yields the same id within a process.
    pub fn new(path: impl Into<PathBuf>, desc: Arc<TupleDesc>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            File::create(&path)?;
        }
        let path = path.canonicalize()?;

        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        let table_id = hasher.finish() as TableId;

        Ok(Self {
            path,
            desc,
            table_id,
            append_lock: Mutex::new(()),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of whole pages currently in the file, observed from the
    /// file size so appends are picked up.
    pub fn num_pages(&self) -> Result<usize> {
        let len = fs::metadata(&self.path)?.len();
        Ok(len as usize / page_size())
    }

    /// Reads one page straight from disk, bypassing the buffer pool. The
    /// pool's miss path and tests use this; everything else goes through
    /// [`BufferPool::get_page`].
    pub fn read_page(&self, pid: HeapPageId) -> Result<HeapPage> {
        if pid.table_id != self.table_id {
            return Err(DbError::NotFound(format!(
                "page {} does not belong to table {}",
                pid, self.table_id
            )));
        }
        if pid.page_no >= self.num_pages()? {
            return Err(DbError::NotFound(format!(
                "page {} is beyond the end of the table file",
                pid
            )));
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start((pid.page_no * page_size()) as u64))?;
        let mut data = vec![0u8; page_size()];
        file.read_exact(&mut data).map_err(|_| {
            DbError::FormatError(format!("short read for page {}", pid))
        })?;
        HeapPage::new(pid, &data, self.desc.clone())
    }

    /// Writes the page at its offset, growing the file if the offset is
    /// at or beyond the current end.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start((page.pid().page_no * page_size()) as u64))?;
        file.write_all(&page.page_data())?;
        file.sync_all()?;
        Ok(())
    }

    /// Extends the file by one zeroed page and returns its page number.
    /// The page carries no tuples, so its on-disk image doubles as its
    /// rollback image until a commit flushes it.
    pub fn append_empty_page(&self) -> Result<usize> {
        let _append = self.append_lock.lock().unwrap();
        let page_no = self.num_pages()?;
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start((page_no * page_size()) as u64))?;
        file.write_all(&HeapPage::empty_page_data())?;
        file.sync_all()?;
        debug!("table {}: appended empty page {}", self.table_id, page_no);
        Ok(page_no)
    }

    /// Inserts the tuple into the first page with a free slot, fetching
    /// pages through the buffer pool with exclusive permission; appends a
    /// fresh page when every existing page is full. The page taking the
    /// tuple is marked dirty.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> Result<RecordId> {
        loop {
            for page_no in 0..self.num_pages()? {
                let pid = HeapPageId::new(self.table_id, page_no);
                let frame = pool.get_page(tid, pid, Permissions::ReadWrite)?;
                let mut page = frame.write().unwrap();
                if page.num_empty_slots() > 0 {
                    let record_id = page.insert_tuple(tuple)?;
                    page.mark_dirty(true, tid);
                    return Ok(record_id);
                }
            }
            // every page was full; extend the file and retry, which will
            // find the new page (or a page another insert freed up)
            self.append_empty_page()?;
        }
    }

    /// Deletes the tuple from the page named by its record id, fetched
    /// with exclusive permission; the page is marked dirty.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> Result<()> {
        let record_id = tuple.record_id().ok_or(DbError::NotOnPage)?;
        if record_id.pid.table_id != self.table_id {
            return Err(DbError::NotOnPage);
        }
        let frame = pool.get_page(tid, record_id.pid, Permissions::ReadWrite)?;
        let mut page = frame.write().unwrap();
        page.delete_tuple(tuple)?;
        page.mark_dirty(true, tid);
        Ok(())
    }

    /// A sequential scan over all tuples in `(page, slot)` order. The
    /// iterator starts closed; call [`HeapFileIterator::open`] first.
    pub fn iter<'a>(&'a self, tid: TransactionId, pool: &'a BufferPool) -> HeapFileIterator<'a> {
        HeapFileIterator {
            file: self,
            pool,
            tid,
            state: None,
        }
    }
}

struct IterState {
    page_no: usize,
    slot: usize,
    num_pages: usize,
}

/// Open/close-stateful scan over a heap file. Pages are fetched through
/// the buffer pool with read-only permission under the scanning
/// transaction; no page reference is held between `next` calls.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    state: Option<IterState>,
}

impl HeapFileIterator<'_> {
    pub fn open(&mut self) -> Result<()> {
        self.state = Some(IterState {
            page_no: 0,
            slot: 0,
            num_pages: self.file.num_pages()?,
        });
        Ok(())
    }

    /// The next tuple, or `None` once the scan is exhausted. Calling this
    /// on a closed iterator is an error.
    pub fn next(&mut self) -> Result<Option<Tuple>> {
        let state = self.state.as_mut().ok_or(DbError::IteratorNotOpen)?;
        while state.page_no < state.num_pages {
            let pid = HeapPageId::new(self.file.table_id, state.page_no);
            let frame = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
            let page = frame.read().unwrap();
            while state.slot < page.num_slots() {
                let slot = state.slot;
                state.slot += 1;
                if let Some(tuple) = page.tuple_at(slot) {
                    return Ok(Some(tuple.clone()));
                }
            }
            state.page_no += 1;
            state.slot = 0;
        }
        Ok(None)
    }

    /// Equivalent to close followed by open.
    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.state = None;
    }
}
