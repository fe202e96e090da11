//! Reference fixity table access
//!
//! The archive's recorded fixity values are read-only to this tool. Lookups
//! filter on the digest value alone: the same content may have been fixed
//! under different algorithm names over the years, so the algorithm column
//! is reported but never used as a filter.
//!
//! Two backends are provided:
//! - [`SqliteFixityTable`] - the indexed SQLite database built by `import`
//! - [`MemoryFixityTable`] - an in-memory map, loaded from records or
//!   straight from an archive CSV export

use crate::core::config::ImportConfig;
use crate::core::error::{Result, VerifyError};
use log::{debug, info};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, Row};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// One (file identity, digest, algorithm) triple recorded by the archive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixityRecord {
    /// External archive identifier of the file
    pub file_ref: String,
    /// Recorded digest value
    pub digest_value: String,
    /// Algorithm name as recorded at ingestion time
    pub algorithm_name: String,
}

impl FixityRecord {
    pub fn new(
        file_ref: impl Into<String>,
        digest_value: impl Into<String>,
        algorithm_name: impl Into<String>,
    ) -> Self {
        Self {
            file_ref: file_ref.into(),
            digest_value: digest_value.into(),
            algorithm_name: algorithm_name.into(),
        }
    }
}

/// Exact-match lookup of recorded fixity values by digest
pub trait FixityLookup {
    /// All records whose stored digest equals `digest_value`.
    ///
    /// "Not found" is an empty list. An `Err` means the table itself could
    /// not be queried.
    fn find_by_digest(&self, digest_value: &str) -> Result<Vec<FixityRecord>>;
}

impl<T: FixityLookup + ?Sized> FixityLookup for &T {
    fn find_by_digest(&self, digest_value: &str) -> Result<Vec<FixityRecord>> {
        (**self).find_by_digest(digest_value)
    }
}

impl<T: FixityLookup + ?Sized> FixityLookup for Box<T> {
    fn find_by_digest(&self, digest_value: &str) -> Result<Vec<FixityRecord>> {
        (**self).find_by_digest(digest_value)
    }
}

/// Check that a table name can be safely interpolated into SQL
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(VerifyError::InvalidTableName(table.to_string()))
    }
}

/// Read a column as text whatever storage class SQLite used for it
fn column_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    })
}

// ============================================================================
// SQLite backend
// ============================================================================

/// Fixity table stored in a SQLite database
pub struct SqliteFixityTable {
    connection: Connection,
    select_sql: String,
    table: String,
    cache: Option<RefCell<HashMap<String, Vec<FixityRecord>>>>,
}

impl SqliteFixityTable {
    /// Open `database` read-only and query `table`
    pub fn open(database: &Path, table: &str) -> Result<Self> {
        if !database.exists() {
            return Err(VerifyError::DatabaseMissing(database.to_path_buf()));
        }

        let connection = Connection::open_with_flags(
            database,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        info!(
            "Opened checksum database {} (table '{}')",
            database.display(),
            table
        );
        Self::from_connection(connection, table)
    }

    /// Wrap an existing connection
    pub fn from_connection(connection: Connection, table: &str) -> Result<Self> {
        validate_table_name(table)?;

        Ok(Self {
            connection,
            select_sql: format!(
                "SELECT file_ref, fixity_value, algorithm_name FROM {} WHERE fixity_value = ?1",
                table
            ),
            table: table.to_string(),
            cache: None,
        })
    }

    /// Remember lookup results for the lifetime of this handle
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| RefCell::new(HashMap::new()));
        self
    }

    /// Number of records in the table
    pub fn record_count(&self) -> Result<u64> {
        let count: i64 = self.connection.query_row(
            &format!("SELECT count(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn query(&self, digest_value: &str) -> Result<Vec<FixityRecord>> {
        let mut statement = self.connection.prepare_cached(&self.select_sql)?;
        let rows = statement.query_map(params![digest_value], |row| {
            Ok(FixityRecord {
                file_ref: column_text(row, 0)?,
                digest_value: column_text(row, 1)?,
                algorithm_name: column_text(row, 2)?,
            })
        })?;

        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("{} record(s) for digest {}", records.len(), digest_value);
        Ok(records)
    }
}

impl FixityLookup for SqliteFixityTable {
    fn find_by_digest(&self, digest_value: &str) -> Result<Vec<FixityRecord>> {
        let Some(cache) = &self.cache else {
            return self.query(digest_value);
        };

        if let Some(hit) = cache.borrow().get(digest_value) {
            return Ok(hit.clone());
        }

        // Misses are not kept
        let records = self.query(digest_value)?;
        if !records.is_empty() {
            cache
                .borrow_mut()
                .insert(digest_value.to_string(), records.clone());
        }
        Ok(records)
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Fixity table held in memory, keyed by digest value
#[derive(Debug, Clone, Default)]
pub struct MemoryFixityTable {
    by_digest: HashMap<String, Vec<FixityRecord>>,
    len: usize,
}

impl MemoryFixityTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from records, keeping their order per digest
    pub fn from_records<I: IntoIterator<Item = FixityRecord>>(records: I) -> Self {
        let mut table = Self::new();
        for record in records {
            table.insert(record);
        }
        table
    }

    /// Load every row of an archive fixity CSV export
    pub fn from_csv(path: &Path, columns: &ImportConfig) -> Result<Self> {
        let mut table = Self::new();
        read_fixity_csv(path, columns, |record| {
            table.insert(record);
            Ok(())
        })?;
        info!("Loaded {} fixity records from {}", table.len(), path.display());
        Ok(table)
    }

    /// Add a record
    pub fn insert(&mut self, record: FixityRecord) {
        self.by_digest
            .entry(record.digest_value.clone())
            .or_default()
            .push(record);
        self.len += 1;
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table holds no records
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl FixityLookup for MemoryFixityTable {
    fn find_by_digest(&self, digest_value: &str) -> Result<Vec<FixityRecord>> {
        Ok(self
            .by_digest
            .get(digest_value)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// CSV export import
// ============================================================================

/// Stream the rows of an archive fixity CSV export into `sink`
///
/// Columns are located by header name, so exports with extra columns or a
/// different column order are fine.
pub fn read_fixity_csv<F>(path: &Path, columns: &ImportConfig, mut sink: F) -> Result<usize>
where
    F: FnMut(FixityRecord) -> Result<()>,
{
    let import_error = |message: String| VerifyError::ImportError {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|e| import_error(e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| import_error(e.to_string()))?
        .clone();

    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| import_error(format!("missing column '{}'", name)))
    };
    let file_ref_idx = column_index(&columns.file_ref_column)?;
    let value_idx = column_index(&columns.fixity_value_column)?;
    let algorithm_idx = column_index(&columns.algorithm_name_column)?;

    let mut rows = 0;
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| import_error(e.to_string()))?;
        let field = |idx: usize| {
            record.get(idx).map(str::to_string).ok_or_else(|| {
                import_error(format!("row {} is missing column {}", line + 2, idx + 1))
            })
        };

        sink(FixityRecord {
            file_ref: field(file_ref_idx)?,
            digest_value: field(value_idx)?,
            algorithm_name: field(algorithm_idx)?,
        })?;
        rows += 1;
    }

    Ok(rows)
}

/// Build (or extend) the SQLite reference table from a fixity CSV export
///
/// Creates the table and the digest index when they don't exist yet and
/// inserts every row in a single transaction. Returns the number of rows
/// added.
pub fn import_fixity_csv(
    csv_path: &Path,
    database: &Path,
    table: &str,
    columns: &ImportConfig,
) -> Result<usize> {
    validate_table_name(table)?;

    let mut connection = Connection::open(database)?;
    let transaction = connection.transaction()?;
    transaction.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (file_ref TEXT, fixity_value TEXT, algorithm_name TEXT);
         CREATE INDEX IF NOT EXISTS index_{table}_fixity_value ON {table} (fixity_value ASC);"
    ))?;

    info!("Adding rows from '{}' into table '{}'", csv_path.display(), table);
    let rows = {
        let mut insert = transaction.prepare(&format!(
            "INSERT INTO {} (file_ref, fixity_value, algorithm_name) VALUES (?1, ?2, ?3)",
            table
        ))?;
        read_fixity_csv(csv_path, columns, |record| {
            insert.execute(params![
                record.file_ref,
                record.digest_value,
                record.algorithm_name
            ])?;
            Ok(())
        })?
    };
    transaction.commit()?;

    info!("Imported {} fixity records into {}", rows, database.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const EXPORT: &str = "\
file_ref,fixity_value,algorithm_name,notes
ref-1,aaa111,SHA256,first
ref-2,bbb222,MD5,
ref-3,aaa111,SHA256,duplicate content
ref-1,ccc333,SHA1,\"same file, other algorithm\"
";

    fn write_export(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("export.csv");
        fs::write(&path, EXPORT).unwrap();
        path
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("fixity_values").is_ok());
        assert!(validate_table_name("_t1").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1table").is_err());
        assert!(validate_table_name("t; DROP TABLE t").is_err());
        assert!(validate_table_name("t\"x").is_err());
    }

    #[test]
    fn test_memory_table_filters_on_digest_only() {
        let table = MemoryFixityTable::from_records(vec![
            FixityRecord::new("ref-1", "aaa111", "sha256"),
            FixityRecord::new("ref-2", "aaa111", "SHA-256"),
            FixityRecord::new("ref-3", "bbb222", "md5"),
        ]);

        let hits = table.find_by_digest("aaa111").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].file_ref, "ref-1");
        assert_eq!(hits[1].file_ref, "ref-2");

        assert!(table.find_by_digest("zzz999").unwrap().is_empty());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_memory_table_from_csv() {
        let dir = TempDir::new().unwrap();
        let path = write_export(&dir);

        let table = MemoryFixityTable::from_csv(&path, &ImportConfig::default()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.find_by_digest("aaa111").unwrap().len(), 2);
        assert_eq!(
            table.find_by_digest("ccc333").unwrap(),
            vec![FixityRecord::new("ref-1", "ccc333", "SHA1")]
        );
    }

    #[test]
    fn test_csv_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = write_export(&dir);
        let columns = ImportConfig {
            fixity_value_column: "checksum".to_string(),
            ..ImportConfig::default()
        };

        let err = MemoryFixityTable::from_csv(&path, &columns).unwrap_err();
        assert!(matches!(err, VerifyError::ImportError { .. }));
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_import_then_lookup_sqlite() {
        let dir = TempDir::new().unwrap();
        let csv_path = write_export(&dir);
        let db_path = dir.path().join("checksums.db");

        let rows =
            import_fixity_csv(&csv_path, &db_path, "fixity_values", &ImportConfig::default())
                .unwrap();
        assert_eq!(rows, 4);

        let table = SqliteFixityTable::open(&db_path, "fixity_values").unwrap();
        assert_eq!(table.record_count().unwrap(), 4);

        let mut refs: Vec<String> = table
            .find_by_digest("aaa111")
            .unwrap()
            .into_iter()
            .map(|r| r.file_ref)
            .collect();
        refs.sort();
        assert_eq!(refs, vec!["ref-1", "ref-3"]);

        let md5 = table.find_by_digest("bbb222").unwrap();
        assert_eq!(md5, vec![FixityRecord::new("ref-2", "bbb222", "MD5")]);

        assert!(table.find_by_digest("not-there").unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_cache_returns_same_records() {
        let dir = TempDir::new().unwrap();
        let csv_path = write_export(&dir);
        let db_path = dir.path().join("checksums.db");
        import_fixity_csv(&csv_path, &db_path, "fixity_values", &ImportConfig::default())
            .unwrap();

        let table = SqliteFixityTable::open(&db_path, "fixity_values")
            .unwrap()
            .with_cache(true);
        let first = table.find_by_digest("bbb222").unwrap();
        let second = table.find_by_digest("bbb222").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_sqlite_cache_keeps_only_hits() {
        let dir = TempDir::new().unwrap();
        let csv_path = write_export(&dir);
        let db_path = dir.path().join("checksums.db");
        import_fixity_csv(&csv_path, &db_path, "fixity_values", &ImportConfig::default())
            .unwrap();

        let table = SqliteFixityTable::open(&db_path, "fixity_values")
            .unwrap()
            .with_cache(true);
        for _ in 0..3 {
            assert!(table.find_by_digest("not-there").unwrap().is_empty());
        }
        assert_eq!(table.find_by_digest("aaa111").unwrap().len(), 2);

        let cache = table.cache.as_ref().unwrap().borrow();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key("aaa111"));
        assert!(!cache.contains_key("not-there"));
    }

    #[test]
    fn test_sqlite_integer_file_refs_read_as_text() {
        let connection = Connection::open_in_memory().unwrap();
        connection
            .execute_batch(
                "CREATE TABLE fixity (file_ref, fixity_value, algorithm_name);
                 INSERT INTO fixity VALUES (42, 'abc', 'md5');",
            )
            .unwrap();

        let table = SqliteFixityTable::from_connection(connection, "fixity").unwrap();
        let records = table.find_by_digest("abc").unwrap();
        assert_eq!(records, vec![FixityRecord::new("42", "abc", "md5")]);
    }

    #[test]
    fn test_open_missing_database() {
        let dir = TempDir::new().unwrap();
        let result = SqliteFixityTable::open(&dir.path().join("nope.db"), "fixity_values");
        assert!(matches!(result, Err(VerifyError::DatabaseMissing(_))));
    }

    #[test]
    fn test_missing_table_is_a_lookup_error() {
        let connection = Connection::open_in_memory().unwrap();
        let table = SqliteFixityTable::from_connection(connection, "fixity_values").unwrap();
        assert!(matches!(
            table.find_by_digest("abc"),
            Err(VerifyError::LookupError(_))
        ));
    }
}
