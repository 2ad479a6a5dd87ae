use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use log::info;

use crate::common::TableId;
use crate::error::{DbError, Result};
use crate::storage::heap_file::HeapFile;
use crate::tuple::desc::{TdItem, TupleDesc};
use crate::tuple::field::Type;

struct CatalogEntry {
    name: String,
    file: Arc<HeapFile>,
}

/// The table registry: maps names and table ids to heap files. Tables are
/// registered at startup (or by tests) and live for the process lifetime.
#[derive(Default)]
pub struct Catalog {
    tables: DashMap<TableId, CatalogEntry>,
    names: DashMap<String, TableId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under a name, replacing any previous table of
    /// that name. Returns the table id.
    pub fn add_table(&self, name: &str, file: HeapFile) -> TableId {
        let table_id = file.table_id();
        self.names.insert(name.to_owned(), table_id);
        self.tables.insert(
            table_id,
            CatalogEntry {
                name: name.to_owned(),
                file: Arc::new(file),
            },
        );
        table_id
    }

    pub fn table(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .get(&table_id)
            .map(|entry| entry.file.clone())
            .ok_or_else(|| DbError::NotFound(format!("no table with id {}", table_id)))
    }

    pub fn table_named(&self, name: &str) -> Result<Arc<HeapFile>> {
        let table_id = self
            .names
            .get(name)
            .map(|id| *id)
            .ok_or_else(|| DbError::NotFound(format!("no table named {}", name)))?;
        self.table(table_id)
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        self.tables
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| DbError::NotFound(format!("no table with id {}", table_id)))
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.iter().map(|entry| *entry.key()).collect()
    }

    /// Loads a catalog schema file: one `name (col type, col type, ...)`
    /// line per table, with `int` and `string` column types. Each table's
    /// data file lives next to the schema file as `<name>.dat`. Returns
    /// the names of the tables loaded.
    pub fn load_schema(&self, path: &Path) -> Result<Vec<String>> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let contents = std::fs::read_to_string(path)?;
        let mut loaded = Vec::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (name, columns) = parse_schema_line(line)?;
            let desc = Arc::new(TupleDesc::new(columns));
            let file = HeapFile::new(base_dir.join(format!("{}.dat", name)), desc)?;
            info!("catalog: table {} (id {})", name, file.table_id());
            self.add_table(&name, file);
            loaded.push(name);
        }
        Ok(loaded)
    }
}

fn parse_schema_line(line: &str) -> Result<(String, Vec<TdItem>)> {
    let malformed =
        || DbError::FormatError(format!("malformed catalog line: {}", line));

    let open = line.find('(').ok_or_else(malformed)?;
    let close = line.rfind(')').ok_or_else(malformed)?;
    if close < open {
        return Err(malformed());
    }

    let name = line[..open].trim();
    if name.is_empty() {
        return Err(malformed());
    }

    let mut columns = Vec::new();
    for column in line[open + 1..close].split(',') {
        let mut parts = column.split_whitespace();
        let column_name = parts.next().ok_or_else(malformed)?;
        let type_name = parts.next().ok_or_else(malformed)?;
        let field_type = match type_name.to_ascii_lowercase().as_str() {
            "int" => Type::Int,
            "string" => Type::Str,
            _ => {
                return Err(DbError::FormatError(format!(
                    "unknown column type {} in catalog line: {}",
                    type_name, line
                )))
            }
        };
        columns.push(TdItem::named(field_type, column_name));
    }
    if columns.is_empty() {
        return Err(malformed());
    }

    Ok((name.to_owned(), columns))
}
