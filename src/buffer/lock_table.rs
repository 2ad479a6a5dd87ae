use std::collections::HashMap;
use std::sync::Mutex;

use crate::buffer::Permissions;
use crate::storage::HeapPageId;
use crate::transaction::TransactionId;

/// How many times one transaction holds a page, split by mode. A holder
/// carries shared and exclusive counts at the same time only transiently,
/// through explicit upgrade/downgrade.
#[derive(Debug, Default, Clone, Copy)]
pub struct HolderState {
    pub share: u32,
    pub exclusive: u32,
}

impl HolderState {
    fn grant(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => Self {
                share: 1,
                exclusive: 0,
            },
            Permissions::ReadWrite => Self {
                share: 0,
                exclusive: 1,
            },
        }
    }

    /// Re-entry by the sole holder. Same mode increments; a different
    /// mode transfers the whole count across (upgrade or downgrade).
    fn reenter(&mut self, perm: Permissions) {
        match perm {
            Permissions::ReadOnly => {
                if self.exclusive > 0 {
                    self.share = self.exclusive;
                    self.exclusive = 0;
                } else {
                    self.share += 1;
                }
            }
            Permissions::ReadWrite => {
                if self.exclusive > 0 {
                    self.exclusive += 1;
                } else {
                    self.exclusive = self.share;
                    self.share = 0;
                }
            }
        }
    }

    fn is_released(&self) -> bool {
        self.share == 0 && self.exclusive == 0
    }
}

/// The per-page holder table. `lock` never blocks; callers that need to
/// wait retry in their own loop (the buffer pool bounds that loop with a
/// timeout). One mutex covers every mutation.
#[derive(Default)]
pub struct LockTable {
    holders: Mutex<HashMap<HeapPageId, HashMap<TransactionId, HolderState>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire `perm` on `pid` for `tid`.
    ///
    /// Grants when the page has no holder, when `tid` is the sole holder
    /// (re-entry, upgrading or downgrading as needed), or when a shared
    /// request meets only shared holders. Anything else fails without
    /// waiting.
    pub fn lock(&self, pid: HeapPageId, tid: TransactionId, perm: Permissions) -> bool {
        let mut table = self.holders.lock().unwrap();
        let holders = table.entry(pid).or_default();

        if holders.is_empty() {
            holders.insert(tid, HolderState::grant(perm));
            return true;
        }

        if holders.len() == 1 {
            if let Some(state) = holders.get_mut(&tid) {
                state.reenter(perm);
                return true;
            }
        }

        if perm == Permissions::ReadOnly && holders.values().all(|h| h.exclusive == 0) {
            holders.entry(tid).or_default().share += 1;
            return true;
        }

        false
    }

    /// Releases one acquisition: the first non-zero counter is
    /// decremented, empty holders are dropped, and an unheld page's entry
    /// disappears.
    pub fn unlock(&self, pid: HeapPageId, tid: TransactionId) {
        let mut table = self.holders.lock().unwrap();
        if let Some(holders) = table.get_mut(&pid) {
            if let Some(state) = holders.get_mut(&tid) {
                if state.share > 0 {
                    state.share -= 1;
                } else if state.exclusive > 0 {
                    state.exclusive -= 1;
                }
                if state.is_released() {
                    holders.remove(&tid);
                }
            }
            if holders.is_empty() {
                table.remove(&pid);
            }
        }
    }

    /// Drops every holder of a page. Used when the page leaves the pool
    /// for good.
    pub fn unlock_all(&self, pid: HeapPageId) {
        self.holders.lock().unwrap().remove(&pid);
    }

    /// Removes the transaction from every page's holder set, whatever its
    /// counts. Called when the transaction completes.
    pub fn release_transaction(&self, tid: TransactionId) {
        let mut table = self.holders.lock().unwrap();
        table.retain(|_, holders| {
            holders.remove(&tid);
            !holders.is_empty()
        });
    }

    pub fn holds_lock(&self, pid: HeapPageId, tid: TransactionId) -> bool {
        self.holders
            .lock()
            .unwrap()
            .get(&pid)
            .map(|holders| holders.contains_key(&tid))
            .unwrap_or(false)
    }

    /// The holder's current counts, if it holds the page at all.
    pub fn holder_state(&self, pid: HeapPageId, tid: TransactionId) -> Option<HolderState> {
        self.holders
            .lock()
            .unwrap()
            .get(&pid)
            .and_then(|holders| holders.get(&tid).copied())
    }
}
