use crate::errors::StoreError;
use crate::types::{LabelTask, PhraseSummary, Record, ScoredResult};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Table and column names of the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub table: String,
    pub id_column: String,
    pub body_column: String,
    pub term_column: String,
    pub term_present_column: String,
    pub label_column: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            table: "tweets".to_string(),
            id_column: "tweet_id".to_string(),
            body_column: "usnmtext".to_string(),
            term_column: "search_term".to_string(),
            term_present_column: "term_present".to_string(),
            label_column: "corr_def".to_string(),
        }
    }
}

impl StoreLayout {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn columns(&self) -> [&str; 5] {
        [
            self.id_column.as_str(),
            self.body_column.as_str(),
            self.term_column.as_str(),
            self.term_present_column.as_str(),
            self.label_column.as_str(),
        ]
    }

    /// Names are interpolated into SQL, so only plain identifiers pass.
    fn validate(&self) -> Result<(), StoreError> {
        std::iter::once(self.table.as_str())
            .chain(self.columns())
            .try_for_each(validate_identifier)
    }
}

fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// SQLite record store keyed by record identifier
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
    layout: StoreLayout,
}

impl RecordStore {
    /// Open an existing database. When `table` is `None` the first table
    /// (by name) that has the label column is used.
    pub async fn open<P: AsRef<Path>>(path: P, table: Option<&str>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let mut layout = StoreLayout::default();
        layout.table = match table {
            Some(table) => table.to_string(),
            None => find_table_with_column(&conn, &layout.label_column)?,
        };

        Self::from_connection(conn, layout)
    }

    /// Wrap an already opened connection, checking that the layout exists.
    pub fn from_connection(conn: Connection, layout: StoreLayout) -> Result<Self, StoreError> {
        layout.validate()?;

        for column in layout.columns() {
            let present: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
                params![layout.table, column],
                |row| row.get(0),
            )?;
            if !present {
                return Err(StoreError::MissingColumn {
                    table: layout.table.clone(),
                    column: column.to_string(),
                });
            }
        }

        info!("Using table '{}' for labels", layout.table);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            layout,
        })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Eligible records for `task`: unlabeled (NULL or blank), term present,
    /// and search term equal to the phrase ignoring case and surrounding
    /// whitespace. Rows come back in `rowid` order.
    ///
    /// Records whose identifier is empty or contains whitespace or `|` are
    /// skipped with a warning. Such an identifier can never appear on a
    /// well-formed result line, so its batch would be rejected on every run.
    pub async fn fetch_pending(&self, task: &LabelTask) -> Result<Vec<Record>, StoreError> {
        let StoreLayout {
            table,
            id_column,
            body_column,
            term_column,
            term_present_column,
            label_column,
        } = &self.layout;

        let sql = format!(
            "SELECT CAST({id_column} AS TEXT), CAST({body_column} AS TEXT) FROM {table}
             WHERE {id_column} IS NOT NULL
               AND LOWER(TRIM({term_column})) = LOWER(TRIM(?1))
               AND CAST({term_present_column} AS INTEGER) = 1
               AND ({label_column} IS NULL OR TRIM({label_column}) = '')
             ORDER BY rowid"
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![task.phrase], |row| {
                Ok(Record {
                    identifier: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    body: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let (records, unaddressable): (Vec<Record>, Vec<Record>) = records
            .into_iter()
            .partition(|record| is_addressable(&record.identifier));
        for record in &unaddressable {
            warn!(
                "Skipping record with identifier {:?} for '{}': it cannot appear on a result line",
                record.identifier, task.phrase
            );
        }

        debug!("{} pending records for '{}'", records.len(), task.phrase);
        Ok(records)
    }

    /// Write every result and commit them as one transaction. Nothing is
    /// applied if any write fails or touches no row.
    pub async fn commit_labels(&self, results: &[ScoredResult]) -> Result<(), StoreError> {
        let sql = format!(
            // Column affinity converts the text identifier, keeping the key lookup indexed
            "UPDATE {} SET {} = ?1 WHERE {} = ?2",
            self.layout.table, self.layout.label_column, self.layout.id_column
        );

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for result in results {
                let updated = stmt.execute(params![result.probability, result.identifier])?;
                if updated == 0 {
                    return Err(StoreError::MissingIdentifier(result.identifier.clone()));
                }
            }
        }
        tx.commit()?;

        debug!("Committed {} labels", results.len());
        Ok(())
    }

    pub async fn phrase_summary(&self, phrase: &str) -> Result<PhraseSummary, StoreError> {
        let StoreLayout {
            table,
            term_column,
            term_present_column,
            label_column,
            ..
        } = &self.layout;

        let sql = format!(
            "SELECT
                COALESCE(SUM(CASE WHEN {label_column} IS NULL OR TRIM({label_column}) = '' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN {label_column} IS NULL OR TRIM({label_column}) = '' THEN 0 ELSE 1 END), 0),
                COALESCE(SUM(CASE WHEN CAST({label_column} AS REAL) = 1.0 THEN 1 ELSE 0 END), 0)
             FROM {table}
             WHERE LOWER(TRIM({term_column})) = LOWER(TRIM(?1))
               AND CAST({term_present_column} AS INTEGER) = 1"
        );

        let conn = self.conn.lock().await;
        let summary = conn.query_row(&sql, params![phrase], |row| {
            Ok(PhraseSummary {
                pending: row.get::<_, i64>(0)?.max(0) as u64,
                labeled: row.get::<_, i64>(1)?.max(0) as u64,
                accepted: row.get::<_, i64>(2)?.max(0) as u64,
            })
        })?;

        Ok(summary)
    }
}

/// Identifiers the result-line grammar can carry: non-empty, no whitespace, no `|`.
fn is_addressable(identifier: &str) -> bool {
    !identifier.is_empty() && !identifier.contains(|c: char| c.is_whitespace() || c == '|')
}

fn find_table_with_column(conn: &Connection, column: &str) -> Result<String, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT m.name FROM sqlite_master m
         WHERE m.type = 'table'
           AND EXISTS (SELECT 1 FROM pragma_table_info(m.name) p WHERE p.name = ?1)
         ORDER BY m.name
         LIMIT 1",
    )?;

    let mut rows = stmt.query_map(params![column], |row| row.get::<_, String>(0))?;
    match rows.next() {
        Some(table) => Ok(table?),
        None => Err(StoreError::NoLabelTable(column.to_string())),
    }
}
