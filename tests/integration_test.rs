mod common;

use anyhow::Result;
use tempfile::tempdir;

use common::{engine, row, scan_rows, two_int_desc};
use minidb::buffer::Permissions;
use minidb::error::DbError;
use minidb::storage::HeapPageId;
use minidb::transaction::TransactionId;

#[test]
fn small_heap_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let (catalog, pool, table_id) = engine(&dir, 8)?;
    let desc = two_int_desc();

    let tid = TransactionId::new();
    for (a, b) in [(1, 2), (3, 4), (5, 6)] {
        pool.insert_tuple(tid, table_id, &row(&desc, a, b))?;
    }
    pool.transaction_complete(tid, true)?;

    assert_eq!(
        scan_rows(&catalog, &pool, table_id)?,
        vec![(1, 2), (3, 4), (5, 6)]
    );
    Ok(())
}

#[test]
fn inserts_spill_onto_new_pages_and_scan_in_order() -> Result<()> {
    let dir = tempdir()?;
    let (catalog, pool, table_id) = engine(&dir, 8)?;
    let desc = two_int_desc();

    // two int columns are 8 bytes, so a 4096-byte page holds 504 slots;
    // a thousand rows need three pages
    let tid = TransactionId::new();
    for i in 0..1000 {
        pool.insert_tuple(tid, table_id, &row(&desc, i, -i))?;
    }
    pool.transaction_complete(tid, true)?;

    let file = catalog.table(table_id)?;
    assert!(file.num_pages()? >= 2);

    let rows = scan_rows(&catalog, &pool, table_id)?;
    assert_eq!(rows.len(), 1000);
    assert_eq!(rows[0], (0, 0));
    assert_eq!(rows[999], (999, -999));
    assert!(rows.windows(2).all(|w| w[0].0 < w[1].0));
    Ok(())
}

#[test]
fn deleted_tuples_disappear_from_scans() -> Result<()> {
    let dir = tempdir()?;
    let (catalog, pool, table_id) = engine(&dir, 8)?;
    let desc = two_int_desc();

    let tid = TransactionId::new();
    for (a, b) in [(1, 1), (2, 2), (3, 3)] {
        pool.insert_tuple(tid, table_id, &row(&desc, a, b))?;
    }
    pool.transaction_complete(tid, true)?;

    // scan to obtain a stored tuple with its record id, then delete it
    let file = catalog.table(table_id)?;
    let tid = TransactionId::new();
    let mut iter = file.iter(tid, &pool);
    iter.open()?;
    let mut victim = None;
    while let Some(tuple) = iter.next()? {
        if tuple.field(0)? == &minidb::tuple::field::Field::Int(2) {
            victim = Some(tuple);
            break;
        }
    }
    iter.close();

    pool.delete_tuple(tid, &victim.expect("row (2,2) exists"))?;
    pool.transaction_complete(tid, true)?;

    assert_eq!(scan_rows(&catalog, &pool, table_id)?, vec![(1, 1), (3, 3)]);
    Ok(())
}

#[test]
fn abort_discards_uncommitted_inserts_and_releases_locks() -> Result<()> {
    let dir = tempdir()?;
    let (catalog, pool, table_id) = engine(&dir, 8)?;
    let desc = two_int_desc();

    let setup = TransactionId::new();
    pool.insert_tuple(setup, table_id, &row(&desc, 1, 1))?;
    pool.transaction_complete(setup, true)?;

    let aborted = TransactionId::new();
    let rid = pool.insert_tuple(aborted, table_id, &row(&desc, 2, 2))?;
    assert!(pool.holds_lock(aborted, rid.pid));

    pool.transaction_complete(aborted, false)?;
    assert!(!pool.holds_lock(aborted, rid.pid));

    assert_eq!(scan_rows(&catalog, &pool, table_id)?, vec![(1, 1)]);
    Ok(())
}

#[test]
fn abort_restores_pages_the_log_saw() -> Result<()> {
    let dir = tempdir()?;
    let (catalog, pool, table_id) = engine(&dir, 8)?;
    let desc = two_int_desc();

    let setup = TransactionId::new();
    pool.insert_tuple(setup, table_id, &row(&desc, 1, 1))?;
    pool.transaction_complete(setup, true)?;

    // flush the transaction's page mid-flight so its images reach the
    // log, then abort; rollback must restore the pre-insert bytes
    let aborted = TransactionId::new();
    pool.insert_tuple(aborted, table_id, &row(&desc, 2, 2))?;
    pool.flush_pages(aborted)?;
    pool.transaction_complete(aborted, false)?;

    assert_eq!(scan_rows(&catalog, &pool, table_id)?, vec![(1, 1)]);
    Ok(())
}

#[test]
fn committed_data_survives_a_fresh_pool() -> Result<()> {
    let dir = tempdir()?;
    let desc = two_int_desc();
    let table_id;
    {
        let (_catalog, pool, id) = engine(&dir, 8)?;
        table_id = id;
        let tid = TransactionId::new();
        pool.insert_tuple(tid, table_id, &row(&desc, 7, 8))?;
        pool.transaction_complete(tid, true)?;
    }

    // a second engine over the same files sees the committed row
    let (catalog, pool, reopened_id) = engine(&dir, 8)?;
    assert_eq!(reopened_id, table_id);
    assert_eq!(scan_rows(&catalog, &pool, reopened_id)?, vec![(7, 8)]);
    Ok(())
}

#[test]
fn a_closed_iterator_refuses_next() -> Result<()> {
    let dir = tempdir()?;
    let (catalog, pool, table_id) = engine(&dir, 8)?;

    let file = catalog.table(table_id)?;
    let tid = TransactionId::new();
    let mut iter = file.iter(tid, &pool);
    assert!(matches!(iter.next(), Err(DbError::IteratorNotOpen)));

    iter.open()?;
    assert!(iter.next()?.is_none());
    iter.close();
    assert!(matches!(iter.next(), Err(DbError::IteratorNotOpen)));

    // rewind is close followed by open
    iter.rewind()?;
    assert!(iter.next()?.is_none());
    Ok(())
}

#[test]
fn scans_read_pages_with_shared_permission() -> Result<()> {
    let dir = tempdir()?;
    let (catalog, pool, table_id) = engine(&dir, 8)?;
    let desc = two_int_desc();

    let setup = TransactionId::new();
    pool.insert_tuple(setup, table_id, &row(&desc, 1, 1))?;
    pool.transaction_complete(setup, true)?;

    // a reader holding the page shared does not stop a second scan
    let reader = TransactionId::new();
    let pid = HeapPageId::new(table_id, 0);
    pool.get_page(reader, pid, Permissions::ReadOnly)?;

    assert_eq!(scan_rows(&catalog, &pool, table_id)?, vec![(1, 1)]);
    pool.transaction_complete(reader, true)?;
    Ok(())
}
