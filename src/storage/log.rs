use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use log::debug;

use crate::storage::codec::{Deserializer, Serializer};
use crate::storage::HeapPageId;
use crate::transaction::TransactionId;

const RECORD_WRITE: u8 = 1;
const RECORD_CHECKPOINT: u8 = 2;

/// The recovery log: an append-only file of page-image records.
///
/// A write record carries `(tid, page id, before image, after image)`; a
/// checkpoint record is a bare marker appended when a transaction
/// completes. The buffer pool forces the log before it writes the
/// corresponding page, so the before image of any page on disk is always
/// recoverable.
pub struct LogFile {
    file: Mutex<File>,
    path: PathBuf,
}

impl LogFile {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn append(&self, record: &[u8]) -> std::io::Result<()> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::End(0))?;
        file.write_all(record)
    }

    /// Appends a write record for a page about to be flushed.
    pub fn log_write(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        before: &[u8],
        after: &[u8],
    ) -> std::io::Result<()> {
        let mut record =
            vec![0u8; 1 + 8 + 4 + 8 + 4 + before.len() + 4 + after.len()];
        let mut ser = Serializer::new(&mut record);
        ser.write_u8(RECORD_WRITE);
        ser.write_u64(tid.id());
        ser.write_i32(pid.table_id);
        ser.write_u64(pid.page_no as u64);
        ser.write_u32(before.len() as u32);
        ser.write_bytes(before);
        ser.write_u32(after.len() as u32);
        ser.write_bytes(after);

        debug!("log: write record for page {} by {}", pid, tid);
        self.append(&record)
    }

    /// Appends a checkpoint marker and forces it to disk.
    pub fn log_checkpoint(&self) -> std::io::Result<()> {
        self.append(&[RECORD_CHECKPOINT])?;
        self.force()
    }

    /// Forces everything appended so far to durable storage.
    pub fn force(&self) -> std::io::Result<()> {
        self.file.lock().unwrap().sync_all()
    }

    /// Collects, for every page the transaction flushed, the earliest
    /// before image in the log, in first-touch order. The caller restores
    /// these through the heap files and discards the cached frames.
    pub fn rollback(
        &self,
        tid: TransactionId,
    ) -> std::io::Result<Vec<(HeapPageId, Vec<u8>)>> {
        let mut data = Vec::new();
        {
            let mut file = self.file.lock().unwrap();
            file.seek(SeekFrom::Start(0))?;
            file.read_to_end(&mut data)?;
        }

        let mut images = Vec::new();
        let mut seen: HashSet<HeapPageId> = HashSet::new();
        let mut de = Deserializer::new(&data);
        while de.remaining() > 0 {
            // a torn tail record cannot belong to a completed flush; stop
            let Ok(kind) = de.read_u8() else { break };
            match kind {
                RECORD_CHECKPOINT => {}
                RECORD_WRITE => {
                    let Ok(record) = read_write_record(&mut de) else {
                        break;
                    };
                    let (record_tid, pid, before) = record;
                    if record_tid == tid.id() && seen.insert(pid) {
                        images.push((pid, before));
                    }
                }
                _ => break,
            }
        }
        debug!("log: rollback of {} restores {} pages", tid, images.len());
        Ok(images)
    }
}

fn read_write_record(
    de: &mut Deserializer,
) -> crate::error::Result<(u64, HeapPageId, Vec<u8>)> {
    let tid = de.read_u64()?;
    let table_id = de.read_i32()?;
    let page_no = de.read_u64()? as usize;
    let before_len = de.read_u32()? as usize;
    let before = de.read_bytes(before_len)?.to_vec();
    let after_len = de.read_u32()? as usize;
    de.skip(after_len)?;
    Ok((tid, HeapPageId::new(table_id, page_no), before))
}
