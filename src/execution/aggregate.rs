use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::tuple::desc::{TdItem, TupleDesc};
use crate::tuple::field::{Field, Type};
use crate::tuple::Tuple;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

#[derive(Clone, Copy)]
struct Accum {
    min: i64,
    max: i64,
    sum: i64,
    count: u64,
}

impl Accum {
    fn new() -> Self {
        Self {
            min: i64::MAX,
            max: i64::MIN,
            sum: 0,
            count: 0,
        }
    }

    fn update(&mut self, value: i64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    fn result(&self, op: AggregateOp) -> i64 {
        match op {
            AggregateOp::Min => self.min,
            AggregateOp::Max => self.max,
            AggregateOp::Sum => self.sum,
            // running integer mean, like the rest of the engine's int math
            AggregateOp::Avg => self.sum / self.count as i64,
            AggregateOp::Count => self.count as i64,
        }
    }
}

fn result_desc(group_type: Option<Type>) -> Arc<TupleDesc> {
    match group_type {
        Some(group_type) => Arc::new(TupleDesc::new(vec![
            TdItem::anonymous(group_type),
            TdItem::anonymous(Type::Int),
        ])),
        None => Arc::new(TupleDesc::from_types(&[Type::Int])),
    }
}

fn grouped_results(
    groups: &HashMap<Option<Field>, Accum>,
    group_type: Option<Type>,
    op: AggregateOp,
) -> Result<Vec<Tuple>> {
    let desc = result_desc(group_type);
    let mut results = Vec::with_capacity(groups.len());
    for (key, accum) in groups {
        let value = Field::Int(accum.result(op) as i32);
        let tuple = match key {
            Some(key) => Tuple::of(desc.clone(), vec![key.clone(), value])?,
            None => Tuple::of(desc.clone(), vec![value])?,
        };
        results.push(tuple);
    }
    Ok(results)
}

/// Computes one aggregate over a stream of tuples with integer aggregate
/// column, optionally grouped by another column. Without grouping the
/// result is a single one-field tuple.
pub struct IntegerAggregator {
    group_by: Option<(usize, Type)>,
    field: usize,
    op: AggregateOp,
    groups: HashMap<Option<Field>, Accum>,
}

impl IntegerAggregator {
    pub fn new(group_by: Option<(usize, Type)>, field: usize, op: AggregateOp) -> Self {
        Self {
            group_by,
            field,
            op,
            groups: HashMap::new(),
        }
    }

    pub fn merge(&mut self, tuple: &Tuple) -> Result<()> {
        let key = match self.group_by {
            Some((group_field, _)) => Some(tuple.field(group_field)?.clone()),
            None => None,
        };
        let value = match tuple.field(self.field)? {
            Field::Int(value) => *value as i64,
            other => {
                return Err(DbError::SchemaViolation(format!(
                    "integer aggregator fed a {} value",
                    other.field_type()
                )))
            }
        };
        self.groups.entry(key).or_insert_with(Accum::new).update(value);
        Ok(())
    }

    /// One `(group, aggregate)` tuple per group, or a single one-field
    /// tuple when grouping is absent.
    pub fn results(&self) -> Result<Vec<Tuple>> {
        let group_type = self.group_by.map(|(_, t)| t);
        if self.group_by.is_none() && self.groups.is_empty() && self.op == AggregateOp::Count {
            let desc = result_desc(None);
            return Ok(vec![Tuple::of(desc, vec![Field::Int(0)])?]);
        }
        grouped_results(&self.groups, group_type, self.op)
    }
}

/// Counts string values, optionally grouped. COUNT is the only aggregate
/// that makes sense over strings; anything else is rejected up front.
pub struct StringAggregator {
    group_by: Option<(usize, Type)>,
    field: usize,
    groups: HashMap<Option<Field>, Accum>,
}

impl StringAggregator {
    pub fn new(
        group_by: Option<(usize, Type)>,
        field: usize,
        op: AggregateOp,
    ) -> Result<Self> {
        if op != AggregateOp::Count {
            return Err(DbError::SchemaViolation(
                "string columns only support the COUNT aggregate".to_owned(),
            ));
        }
        Ok(Self {
            group_by,
            field,
            groups: HashMap::new(),
        })
    }

    pub fn merge(&mut self, tuple: &Tuple) -> Result<()> {
        let key = match self.group_by {
            Some((group_field, _)) => Some(tuple.field(group_field)?.clone()),
            None => None,
        };
        match tuple.field(self.field)? {
            Field::Str(_) => {}
            other => {
                return Err(DbError::SchemaViolation(format!(
                    "string aggregator fed a {} value",
                    other.field_type()
                )))
            }
        }
        self.groups.entry(key).or_insert_with(Accum::new).update(0);
        Ok(())
    }

    pub fn results(&self) -> Result<Vec<Tuple>> {
        let group_type = self.group_by.map(|(_, t)| t);
        if self.group_by.is_none() && self.groups.is_empty() {
            let desc = result_desc(None);
            return Ok(vec![Tuple::of(desc, vec![Field::Int(0)])?]);
        }
        grouped_results(&self.groups, group_type, AggregateOp::Count)
    }
}
