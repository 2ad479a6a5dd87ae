use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use minidb::buffer::{BufferPool, DEFAULT_PAGES};
use minidb::catalog::Catalog;
use minidb::optimizer::table_stats;
use minidb::storage::log::LogFile;
use minidb::transaction::TransactionId;

#[derive(Parser)]
struct Config {
    #[arg(long, help = "Catalog schema file; table data files live next to it")]
    catalog: PathBuf,

    #[arg(long, default_value_t = DEFAULT_PAGES, help = "Number of pages the buffer pool may hold")]
    pool_size: usize,

    #[command(subcommand)]
    command: DbCommand,
}

#[derive(Subcommand)]
enum DbCommand {
    /// Print every tuple of a table
    Scan { table: String },
    /// Compute and print per-table statistics
    Stats,
}

fn scan_table(catalog: &Catalog, pool: &BufferPool, table: &str) -> Result<()> {
    let file = catalog
        .table_named(table)
        .with_context(|| format!("unknown table {}", table))?;
    println!("{}", file.desc());

    let tid = TransactionId::new();
    let mut iter = file.iter(tid, pool);
    iter.open()?;
    let mut rows = 0usize;
    while let Some(tuple) = iter.next()? {
        println!("{}", tuple);
        rows += 1;
    }
    iter.close();
    pool.transaction_complete(tid, true)?;

    println!("({} rows)", rows);
    Ok(())
}

fn print_stats(catalog: &Catalog, pool: &BufferPool) -> Result<()> {
    table_stats::compute_statistics(catalog, pool)?;
    let mut names: Vec<String> = catalog
        .table_ids()
        .into_iter()
        .filter_map(|id| catalog.table_name(id).ok())
        .collect();
    names.sort();

    for name in names {
        if let Some(stats) = table_stats::table_stats(&name) {
            println!(
                "{}: {} tuples, scan cost {}",
                name,
                stats.total_tuples(),
                stats.estimate_scan_cost()
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::parse();

    let catalog = Arc::new(Catalog::new());
    let tables = catalog
        .load_schema(&config.catalog)
        .with_context(|| format!("could not load catalog {}", config.catalog.display()))?;
    let log = LogFile::open(config.catalog.with_extension("log"))
        .with_context(|| "could not open the recovery log")?;
    let pool = BufferPool::new(config.pool_size, catalog.clone(), log);

    match config.command {
        DbCommand::Scan { table } => scan_table(&catalog, &pool, &table)?,
        DbCommand::Stats => {
            println!("{} tables", tables.len());
            print_stats(&catalog, &pool)?;
        }
    }
    Ok(())
}
