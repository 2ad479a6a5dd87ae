use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{debug, warn};

use crate::catalog::Catalog;
use crate::common::TableId;
use crate::error::{DbError, Result};
use crate::storage::heap_page::HeapPage;
use crate::storage::log::LogFile;
use crate::storage::HeapPageId;
use crate::transaction::TransactionId;
use crate::tuple::{RecordId, Tuple};

pub mod lock_table;

use lock_table::LockTable;

/// Default number of pages a buffer pool holds.
pub const DEFAULT_PAGES: usize = 50;

const LOCK_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(3000);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// The permission a transaction requests on a page. Read-only maps to a
/// shared lock, read-write to an exclusive one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

/// A cached page. The `RwLock` guards the physical bytes; which
/// transactions may touch the page at all is decided by the lock table.
pub type PageFrame = Arc<RwLock<HeapPage>>;

/// A bounded cache of heap pages that owns the lock table and mediates
/// every page access made on behalf of a transaction.
///
/// The pool runs NO STEAL / force-at-commit: a page dirtied by an
/// uncommitted transaction is never written to disk and never evicted;
/// at commit all of the transaction's dirty pages are logged and forced
/// out; at abort its dirty frames are dropped and any images the log
/// holds are restored.
pub struct BufferPool {
    capacity: usize,
    frames: DashMap<HeapPageId, PageFrame>,
    // resident pages in arrival order; eviction scans this front to back
    arrivals: Mutex<VecDeque<HeapPageId>>,
    // serializes frame-membership changes (miss, evict, discard, flush)
    admit: Mutex<()>,
    lock_table: LockTable,
    catalog: Arc<Catalog>,
    log: LogFile,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>, log: LogFile) -> Self {
        Self {
            capacity,
            frames: DashMap::new(),
            arrivals: Mutex::new(VecDeque::new()),
            admit: Mutex::new(()),
            lock_table: LockTable::new(),
            catalog,
            log,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn resident_page_count(&self) -> usize {
        self.frames.len()
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.lock_table
    }

    /// Fetches a page on behalf of a transaction, first acquiring the
    /// requested lock. Lock acquisition retries for up to three seconds
    /// of wall clock; running out of budget aborts the transaction, which
    /// is the engine's deadlock defense. On a miss the page is read from
    /// its heap file (evicting a clean frame when the pool is full) and
    /// its before image is snapshotted.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
    ) -> Result<PageFrame> {
        let deadline = Instant::now() + LOCK_ACQUIRE_TIMEOUT;
        while !self.lock_table.lock(pid, tid, perm) {
            if Instant::now() >= deadline {
                warn!("{} timed out waiting for {:?} on page {}", tid, perm, pid);
                return Err(DbError::TransactionAborted);
            }
            std::thread::sleep(LOCK_RETRY_INTERVAL);
        }

        if let Some(frame) = self.frames.get(&pid) {
            return Ok(frame.clone());
        }

        let _admit = self.admit.lock().unwrap();
        // another thread may have loaded it while we waited to admit
        if let Some(frame) = self.frames.get(&pid) {
            return Ok(frame.clone());
        }

        if self.frames.len() >= self.capacity {
            self.evict_page()?;
        }

        let file = self.catalog.table(pid.table_id)?;
        let mut page = file.read_page(pid)?;
        page.set_before_image();
        let frame = Arc::new(RwLock::new(page));
        self.frames.insert(pid, frame.clone());
        self.arrivals.lock().unwrap().push_back(pid);
        debug!("pool: loaded page {} ({} resident)", pid, self.frames.len());
        Ok(frame)
    }

    /// Evicts the first clean frame in arrival order. Dirty frames belong
    /// to uncommitted transactions and must stay (NO STEAL); if nothing
    /// is clean the pool is stuck.
    fn evict_page(&self) -> Result<()> {
        let mut arrivals = self.arrivals.lock().unwrap();
        for i in 0..arrivals.len() {
            let pid = arrivals[i];
            let clean = self
                .frames
                .get(&pid)
                .map(|frame| frame.read().unwrap().dirtier().is_none())
                .unwrap_or(false);
            if clean {
                arrivals.remove(i);
                self.frames.remove(&pid);
                debug!("pool: evicted clean page {}", pid);
                return Ok(());
            }
        }
        Err(DbError::CacheFull)
    }

    /// Drops the `(tid, pid)` lock entry without touching the page.
    /// Breaks two-phase locking; callers must know why that is safe.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: HeapPageId) {
        self.lock_table.unlock(pid, tid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: HeapPageId) -> bool {
        self.lock_table.holds_lock(pid, tid)
    }

    /// Adds a tuple to the table on behalf of `tid`. The heap file fetches
    /// its pages back through this pool, so the dirtied page is resident
    /// and marked by the time this returns.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &Tuple,
    ) -> Result<RecordId> {
        let file = self.catalog.table(table_id)?;
        file.insert_tuple(tid, tuple, self)
    }

    /// Removes a tuple on behalf of `tid`; the owning table is read off
    /// the tuple's record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(DbError::NotOnPage)?;
        let file = self.catalog.table(record_id.pid.table_id)?;
        file.delete_tuple(tid, tuple, self)
    }

    /// Flushes every dirty page in the pool. Breaks NO STEAL if any
    /// dirtier is still uncommitted; meant for orderly shutdown.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _admit = self.admit.lock().unwrap();
        for entry in self.frames.iter() {
            self.flush_frame(*entry.key(), entry.value())?;
        }
        Ok(())
    }

    /// Flushes the named page if it is resident and dirty.
    fn flush_frame(&self, pid: HeapPageId, frame: &PageFrame) -> Result<()> {
        let mut page = frame.write().unwrap();
        if let Some(tid) = page.dirtier() {
            let after = page.page_data();
            self.log
                .log_write(tid, pid, page.before_image_data(), &after)?;
            self.log.force()?;
            let file = self.catalog.table(pid.table_id)?;
            file.write_page(&page)?;
            page.mark_dirty(false, tid);
            debug!("pool: flushed page {} for {}", pid, tid);
        }
        Ok(())
    }

    /// Writes all pages dirtied by the transaction and resets their
    /// before images to the just-flushed contents.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let _admit = self.admit.lock().unwrap();
        for entry in self.frames.iter() {
            let mine = entry.value().read().unwrap().dirtier() == Some(tid);
            if mine {
                self.flush_frame(*entry.key(), entry.value())?;
                entry.value().write().unwrap().set_before_image();
            }
        }
        Ok(())
    }

    /// Removes the page from the pool and drops every lock on it. Used
    /// after rollback so the next read sees the restored bytes.
    pub fn discard_page(&self, pid: HeapPageId) {
        let _admit = self.admit.lock().unwrap();
        self.discard_page_admitted(pid);
    }

    fn discard_page_admitted(&self, pid: HeapPageId) {
        self.frames.remove(&pid);
        self.arrivals.lock().unwrap().retain(|p| *p != pid);
        self.lock_table.unlock_all(pid);
    }

    /// Finishes a transaction: commit forces its pages out (force at
    /// commit), abort restores before images and drops its dirty frames.
    /// Either way the transaction ends up holding no locks.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let outcome = if commit {
            self.commit_pages(tid)
        } else {
            self.rollback_pages(tid)
        };
        self.lock_table.release_transaction(tid);
        outcome
    }

    fn commit_pages(&self, tid: TransactionId) -> Result<()> {
        if let Err(err) = self.flush_pages(tid) {
            // the log was forced before any page write, so whatever did
            // reach disk can be undone; abort instead of half-committing
            warn!("commit flush for {} failed ({}); rolling back", tid, err);
            self.rollback_pages(tid)?;
            return Err(DbError::TransactionAborted);
        }
        self.log.log_checkpoint()?;
        Ok(())
    }

    fn rollback_pages(&self, tid: TransactionId) -> Result<()> {
        let images = self.log.rollback(tid)?;
        let _admit = self.admit.lock().unwrap();
        for (pid, before) in images {
            let file = self.catalog.table(pid.table_id)?;
            let page = HeapPage::new(pid, &before, file.desc())?;
            file.write_page(&page)?;
            self.discard_page_admitted(pid);
            debug!("pool: restored before image of page {}", pid);
        }

        // dirty frames that never reached the log just get dropped; the
        // disk still holds their pre-transaction contents
        let dirty: Vec<HeapPageId> = self
            .frames
            .iter()
            .filter(|entry| entry.value().read().unwrap().dirtier() == Some(tid))
            .map(|entry| *entry.key())
            .collect();
        for pid in dirty {
            self.discard_page_admitted(pid);
            debug!("pool: dropped dirty page {} of aborted {}", pid, tid);
        }
        drop(_admit);

        self.log.log_checkpoint()?;
        Ok(())
    }
}
