use std::sync::Arc;

use crate::common::page_size;
use crate::error::{DbError, Result};
use crate::storage::codec::{Deserializer, Serializer};
use crate::storage::HeapPageId;
use crate::transaction::TransactionId;
use crate::tuple::desc::TupleDesc;
use crate::tuple::{RecordId, Tuple};

/// One page of a heap file: a header bitmap marking which slots are
/// occupied, followed by `num_slots` fixed-width tuple images, followed by
/// zero padding up to the page size.
///
/// Slot `8*b + i` maps to bit `i` of header byte `b`, least significant
/// bit first.
pub struct HeapPage {
    pid: HeapPageId,
    desc: Arc<TupleDesc>,
    num_slots: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    old_data: Vec<u8>,
    dirtier: Option<TransactionId>,
}

/// Tuple slots a page of `page_size` bytes can hold: each slot needs the
/// tuple width plus one header bit.
fn slots_per_page(page_size: usize, tuple_width: usize) -> usize {
    page_size * 8 / (tuple_width * 8 + 1)
}

fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

impl HeapPage {
    /// Parses a page from its on-disk image. Unused slots advance the
    /// stream by the tuple width and stay empty. The freshly parsed bytes
    /// double as the page's initial before-image.
    pub fn new(pid: HeapPageId, data: &[u8], desc: Arc<TupleDesc>) -> Result<Self> {
        let tuple_width = desc.byte_size();
        let num_slots = slots_per_page(page_size(), tuple_width);
        let mut de = Deserializer::new(data);

        let header = de.read_bytes(header_size(num_slots))?.to_vec();
        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] & (1 << (slot % 8)) != 0 {
                let mut tuple = Tuple::new(desc.clone());
                for i in 0..desc.num_fields() {
                    let field = desc.field_type(i)?.parse(&mut de)?;
                    tuple.set_field(i, field)?;
                }
                tuple.set_record_id(RecordId::new(pid, slot));
                tuples.push(Some(tuple));
            } else {
                de.skip(tuple_width)?;
                tuples.push(None);
            }
        }

        let mut page = Self {
            pid,
            desc,
            num_slots,
            header,
            tuples,
            old_data: Vec::new(),
            dirtier: None,
        };
        page.set_before_image();
        Ok(page)
    }

    /// The image of a page with no valid tuples: all zeroes.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; page_size()]
    }

    pub fn pid(&self) -> HeapPageId {
        self.pid
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Serializes the page: header, slots (zeroes for unused slots), zero
    /// padding to the page size. Feeding the result back to
    /// [`HeapPage::new`] reproduces an equivalent page.
    pub fn page_data(&self) -> Vec<u8> {
        let tuple_width = self.desc.byte_size();
        let mut buffer = vec![0u8; page_size()];
        let mut ser = Serializer::new(&mut buffer);

        ser.write_bytes(&self.header);
        for tuple in &self.tuples {
            match tuple {
                Some(tuple) => {
                    for (i, item) in self.desc.items().iter().enumerate() {
                        match tuple.field(i) {
                            Ok(field) => field.serialize(&mut ser),
                            // stored tuples are complete by construction
                            Err(_) => ser.write_zeros(item.field_type.len()),
                        }
                    }
                }
                None => ser.write_zeros(tuple_width),
            }
        }
        // the rest of the buffer is already zero padding
        buffer
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn mark_slot(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots).filter(|&i| !self.is_slot_used(i)).count()
    }

    /// Stores the tuple in the lowest unused slot and returns the record
    /// id it was assigned.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<RecordId> {
        if tuple.desc().as_ref() != self.desc.as_ref() {
            return Err(DbError::SchemaViolation(
                "tuple schema does not match the page schema".to_owned(),
            ));
        }
        if !tuple.is_complete() {
            return Err(DbError::SchemaViolation(
                "cannot store a tuple with unset fields".to_owned(),
            ));
        }

        let slot = (0..self.num_slots)
            .find(|&i| !self.is_slot_used(i))
            .ok_or(DbError::PageFull)?;

        let record_id = RecordId::new(self.pid, slot);
        let mut stored = tuple.clone();
        stored.set_record_id(record_id);
        self.mark_slot(slot, true);
        self.tuples[slot] = Some(stored);
        Ok(record_id)
    }

    /// Removes the tuple at its record id's slot. The slot must be in use
    /// and hold a tuple equal to `tuple`.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(DbError::NotOnPage)?;
        if record_id.pid != self.pid || !self.is_slot_used(record_id.slot) {
            return Err(DbError::NotOnPage);
        }
        if self.tuples[record_id.slot].as_ref() != Some(tuple) {
            return Err(DbError::NotOnPage);
        }
        self.mark_slot(record_id.slot, false);
        self.tuples[record_id.slot] = None;
        Ok(())
    }

    pub fn tuple_at(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(|t| t.as_ref())
    }

    /// Tuples of occupied slots, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtier = if dirty { Some(tid) } else { None };
    }

    /// The transaction that last dirtied this page, or `None` if clean.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Snapshots the current contents as the rollback image.
    pub fn set_before_image(&mut self) {
        self.old_data = self.page_data();
    }

    pub fn before_image_data(&self) -> &[u8] {
        &self.old_data
    }

    /// Reconstructs the page as it looked at the last snapshot.
    pub fn before_image(&self) -> Result<HeapPage> {
        HeapPage::new(self.pid, &self.old_data, self.desc.clone())
    }
}
