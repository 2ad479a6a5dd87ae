use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use minidb::buffer::BufferPool;
use minidb::catalog::Catalog;
use minidb::common::TableId;
use minidb::storage::heap_file::HeapFile;
use minidb::storage::log::LogFile;
use minidb::tuple::desc::{TdItem, TupleDesc};
use minidb::tuple::field::{Field, Type};
use minidb::tuple::Tuple;

/// Schema shared by the scenario tests: two named integer columns.
pub fn two_int_desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::new(vec![
        TdItem::named(Type::Int, "a"),
        TdItem::named(Type::Int, "b"),
    ]))
}

pub fn row(desc: &Arc<TupleDesc>, a: i32, b: i32) -> Tuple {
    Tuple::of(desc.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
}

/// An engine over a scratch directory: a catalog with one empty table
/// named "t", a recovery log, and a buffer pool of the given capacity.
pub fn engine(dir: &TempDir, capacity: usize) -> Result<(Arc<Catalog>, BufferPool, TableId)> {
    let catalog = Arc::new(Catalog::new());
    let file = HeapFile::new(dir.path().join("t.dat"), two_int_desc())?;
    let table_id = catalog.add_table("t", file);
    let log = LogFile::open(dir.path().join("wal"))?;
    let pool = BufferPool::new(capacity, catalog.clone(), log);
    Ok((catalog, pool, table_id))
}

/// All `(a, b)` pairs in the table, in scan order.
pub fn scan_rows(catalog: &Catalog, pool: &BufferPool, table_id: TableId) -> Result<Vec<(i32, i32)>> {
    let file = catalog.table(table_id)?;
    let tid = minidb::transaction::TransactionId::new();
    let mut iter = file.iter(tid, pool);
    iter.open()?;
    let mut rows = Vec::new();
    while let Some(tuple) = iter.next()? {
        let a = match tuple.field(0)? {
            Field::Int(v) => *v,
            _ => unreachable!(),
        };
        let b = match tuple.field(1)? {
            Field::Int(v) => *v,
            _ => unreachable!(),
        };
        rows.push((a, b));
    }
    iter.close();
    pool.transaction_complete(tid, true)?;
    Ok(rows)
}
