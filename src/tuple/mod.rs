use std::fmt::Display;
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::storage::HeapPageId;
use crate::tuple::desc::TupleDesc;
use crate::tuple::field::Field;

pub mod desc;
pub mod field;

/// The location of a tuple: the page it lives on and its slot there.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: HeapPageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(pid: HeapPageId, slot: usize) -> Self {
        Self { pid, slot }
    }
}

/// A row: a vector of field values matching a [`TupleDesc`], plus the
/// record id assigned once the tuple is stored on a page. Fields start
/// out unset and are filled via [`Tuple::set_field`].
#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Option<Field>>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: Arc<TupleDesc>) -> Self {
        let fields = vec![None; desc.num_fields()];
        Self {
            desc,
            fields,
            record_id: None,
        }
    }

    /// Builds a tuple with every field set, in column order.
    pub fn of(desc: Arc<TupleDesc>, values: Vec<Field>) -> Result<Self> {
        if values.len() != desc.num_fields() {
            return Err(DbError::SchemaViolation(format!(
                "expected {} values, got {}",
                desc.num_fields(),
                values.len()
            )));
        }
        let mut tuple = Self::new(desc);
        for (i, value) in values.into_iter().enumerate() {
            tuple.set_field(i, value)?;
        }
        Ok(tuple)
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Assigns field `i`. The value's type must match the descriptor.
    pub fn set_field(&mut self, i: usize, value: Field) -> Result<()> {
        let expected = self.desc.field_type(i)?;
        if value.field_type() != expected {
            return Err(DbError::SchemaViolation(format!(
                "column {} holds {} values, got a {} value",
                i,
                expected,
                value.field_type()
            )));
        }
        self.fields[i] = Some(value);
        Ok(())
    }

    pub fn field(&self, i: usize) -> Result<&Field> {
        if i >= self.fields.len() {
            return Err(DbError::NotFound(format!("no field with index {}", i)));
        }
        self.fields[i]
            .as_ref()
            .ok_or_else(|| DbError::NotFound(format!("field {} has not been set", i)))
    }

    /// True once every field has a value; only complete tuples can be
    /// stored on a page.
    pub fn is_complete(&self) -> bool {
        self.fields.iter().all(|f| f.is_some())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: RecordId) {
        self.record_id = Some(record_id);
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let row = self
            .fields
            .iter()
            .map(|field| match field {
                Some(field) => field.to_string(),
                None => "-".to_owned(),
            })
            .collect::<Vec<_>>()
            .join("\t");
        write!(f, "{}", row)
    }
}
