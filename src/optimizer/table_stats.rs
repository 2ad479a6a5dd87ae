use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use log::info;

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::execution::predicate::Op;
use crate::optimizer::histogram::{IntHistogram, StringHistogram};
use crate::storage::heap_file::HeapFile;
use crate::transaction::TransactionId;
use crate::tuple::desc::TupleDesc;
use crate::tuple::field::{Field, Type};

/// Buckets per column histogram.
pub const NUM_HIST_BINS: usize = 100;

/// Cost of reading one page, in the planner's abstract cost units.
pub const IO_COST_PER_PAGE: usize = 1000;

lazy_static! {
    // process-wide, keyed by table name; filled lazily by the planner
    static ref STATS_REGISTRY: DashMap<String, Arc<TableStats>> = DashMap::new();
}

pub fn table_stats(name: &str) -> Option<Arc<TableStats>> {
    STATS_REGISTRY.get(name).map(|stats| stats.clone())
}

pub fn set_table_stats(name: &str, stats: TableStats) {
    STATS_REGISTRY.insert(name.to_owned(), Arc::new(stats));
}

/// Builds statistics for every table in the catalog and registers them
/// under the tables' names.
pub fn compute_statistics(catalog: &Catalog, pool: &BufferPool) -> Result<()> {
    for table_id in catalog.table_ids() {
        let name = catalog.table_name(table_id)?;
        let file = catalog.table(table_id)?;
        let stats = TableStats::new(&file, pool, IO_COST_PER_PAGE)?;
        info!(
            "stats: table {} has {} tuples on {} pages",
            name,
            stats.total_tuples(),
            stats.num_pages
        );
        set_table_stats(&name, stats);
    }
    Ok(())
}

/// Per-table statistics: tuple and page counts plus one histogram per
/// column, built from two sequential scans (the first finds each integer
/// column's range, the second fills the histograms).
pub struct TableStats {
    num_pages: usize,
    num_tuples: usize,
    io_cost_per_page: usize,
    desc: Arc<TupleDesc>,
    int_histograms: HashMap<usize, IntHistogram>,
    str_histograms: HashMap<usize, StringHistogram>,
}

impl TableStats {
    pub fn new(file: &HeapFile, pool: &BufferPool, io_cost_per_page: usize) -> Result<Self> {
        let desc = file.desc();
        let tid = TransactionId::new();

        let mut mins: HashMap<usize, i32> = HashMap::new();
        let mut maxs: HashMap<usize, i32> = HashMap::new();
        let mut str_histograms: HashMap<usize, StringHistogram> = HashMap::new();
        let mut num_tuples = 0usize;

        let mut iter = file.iter(tid, pool);
        iter.open()?;
        while let Some(tuple) = iter.next()? {
            num_tuples += 1;
            for i in 0..desc.num_fields() {
                match tuple.field(i)? {
                    Field::Int(value) => {
                        let min = mins.entry(i).or_insert(*value);
                        *min = (*min).min(*value);
                        let max = maxs.entry(i).or_insert(*value);
                        *max = (*max).max(*value);
                    }
                    Field::Str(value) => {
                        str_histograms
                            .entry(i)
                            .or_insert_with(|| StringHistogram::new(NUM_HIST_BINS))
                            .add_value(value);
                    }
                }
            }
        }

        let mut int_histograms: HashMap<usize, IntHistogram> = mins
            .iter()
            .map(|(&i, &min)| (i, IntHistogram::new(NUM_HIST_BINS, min, maxs[&i])))
            .collect();

        iter.rewind()?;
        while let Some(tuple) = iter.next()? {
            for (i, histogram) in int_histograms.iter_mut() {
                if let Field::Int(value) = tuple.field(*i)? {
                    histogram.add_value(*value);
                }
            }
        }
        iter.close();

        let num_pages = file.num_pages()?;
        // release the scan's read locks
        pool.transaction_complete(tid, true)?;

        Ok(Self {
            num_pages,
            num_tuples,
            io_cost_per_page,
            desc,
            int_histograms,
            str_histograms,
        })
    }

    /// Cost of a full sequential scan under the nested-loop cost model,
    /// which reads every page twice.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page * 2) as f64
    }

    /// Rows surviving a predicate of the given selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.num_tuples as f64 * selectivity) as usize
    }

    pub fn total_tuples(&self) -> usize {
        self.num_tuples
    }

    /// Selectivity of `column op constant`, estimated from the column's
    /// histogram.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &Field) -> Result<f64> {
        match constant {
            Field::Int(value) => self
                .int_histograms
                .get(&field)
                .map(|hist| hist.estimate_selectivity(op, *value))
                .ok_or_else(|| no_histogram(field)),
            Field::Str(value) => self
                .str_histograms
                .get(&field)
                .map(|hist| hist.estimate_selectivity(op, value))
                .ok_or_else(|| no_histogram(field)),
        }
    }

    /// Expected selectivity of `column op ?` when the operand is unknown.
    pub fn avg_selectivity(&self, field: usize, _op: Op) -> Result<f64> {
        match self.desc.field_type(field)? {
            Type::Int => self
                .int_histograms
                .get(&field)
                .map(|hist| hist.avg_selectivity())
                .ok_or_else(|| no_histogram(field)),
            Type::Str => self
                .str_histograms
                .get(&field)
                .map(|hist| hist.avg_selectivity())
                .ok_or_else(|| no_histogram(field)),
        }
    }
}

fn no_histogram(field: usize) -> crate::error::DbError {
    crate::error::DbError::NotFound(format!("no histogram for column {}", field))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::TableStats;
    use crate::buffer::{BufferPool, DEFAULT_PAGES};
    use crate::catalog::Catalog;
    use crate::execution::predicate::Op;
    use crate::storage::heap_file::HeapFile;
    use crate::storage::log::LogFile;
    use crate::transaction::TransactionId;
    use crate::tuple::desc::{TdItem, TupleDesc};
    use crate::tuple::field::{Field, Type};
    use crate::tuple::Tuple;

    #[test]
    fn stats_from_two_scans() -> Result<()> {
        let dir = tempdir()?;
        let desc = Arc::new(TupleDesc::new(vec![
            TdItem::named(Type::Int, "n"),
            TdItem::named(Type::Str, "label"),
        ]));
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(dir.path().join("t.dat"), desc.clone())?;
        let table_id = catalog.add_table("t", file);
        let log = LogFile::open(dir.path().join("wal"))?;
        let pool = BufferPool::new(DEFAULT_PAGES, catalog.clone(), log);

        let tid = TransactionId::new();
        for i in 1..=100 {
            let tuple = Tuple::of(
                desc.clone(),
                vec![Field::Int(i), Field::string(format!("row-{}", i))],
            )?;
            pool.insert_tuple(tid, table_id, &tuple)?;
        }
        pool.transaction_complete(tid, true)?;

        let file = catalog.table(table_id)?;
        let stats = TableStats::new(&file, &pool, 1000)?;

        assert_eq!(stats.total_tuples(), 100);
        assert_eq!(stats.estimate_table_cardinality(0.5), 50);
        assert_eq!(
            stats.estimate_scan_cost(),
            (file.num_pages()? * 1000 * 2) as f64
        );

        let eq = stats.estimate_selectivity(0, Op::Equals, &Field::Int(50))?;
        assert!((eq - 0.01).abs() < 1e-9);
        let gt = stats.estimate_selectivity(0, Op::GreaterThan, &Field::Int(50))?;
        assert!((gt - 0.5).abs() < 0.02);

        let like = stats.estimate_selectivity(1, Op::Equals, &Field::string("row-1"))?;
        assert!((0.0..=1.0).contains(&like));
        assert!((0.0..=1.0).contains(&stats.avg_selectivity(0, Op::Equals)?));
        Ok(())
    }

    #[test]
    fn registry_is_keyed_by_table_name() -> Result<()> {
        let dir = tempdir()?;
        let desc = Arc::new(TupleDesc::from_types(&[Type::Int]));
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(dir.path().join("r.dat"), desc)?;
        catalog.add_table("registry_test_table", file);
        let log = LogFile::open(dir.path().join("wal"))?;
        let pool = BufferPool::new(DEFAULT_PAGES, catalog.clone(), log);

        super::compute_statistics(&catalog, &pool)?;
        let stats = super::table_stats("registry_test_table").expect("stats registered");
        assert_eq!(stats.total_tuples(), 0);
        assert!(super::table_stats("unknown_table").is_none());
        Ok(())
    }
}
