//! SQLite implementation of [`RecordStore`]

use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};

use super::filter::{Filter, quote_ident};
use super::update_log::{DatabaseLog, UpdateRecord};
use super::RecordStore;
use crate::workbook::{CellValue, Row, TIMESTAMP_FORMAT, parse_timestamp};

pub struct SqliteStore {
    pool: SqlitePool,
    log: Option<DatabaseLog>,
}

impl SqliteStore {
    /// Open an existing database file; its update log lives next to it
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Database file does not exist: {}", path.display());
        }

        let options = SqliteConnectOptions::new().filename(path);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let update_log = DatabaseLog::load(DatabaseLog::path_for(path))?;
        log::info!("Connected to database {}", path.display());

        Ok(Self::with_pool(pool, Some(update_log)))
    }

    pub fn with_pool(pool: SqlitePool, log: Option<DatabaseLog>) -> Self {
        Self { pool, log }
    }

    pub fn log(&self) -> Option<&DatabaseLog> {
        self.log.as_ref()
    }

    /// Persist the update log, if any
    pub fn flush(&self) -> Result<()> {
        match &self.log {
            Some(update_log) => update_log.persist(),
            None => Ok(()),
        }
    }

    pub async fn close(self) -> Result<()> {
        self.flush()?;
        self.pool.close().await;
        Ok(())
    }

    async fn ensure_table(&self, table: &str) -> Result<Vec<String>> {
        if !self.list_tables().await?.iter().any(|t| t == table) {
            bail!("Table '{}' does not exist in the database", table);
        }
        self.table_columns(table).await
    }
}

fn ensure_columns<'a>(
    table: &str,
    known: &[String],
    requested: impl IntoIterator<Item = &'a String>,
) -> Result<()> {
    let unknown: Vec<&str> = requested
        .into_iter()
        .filter(|c| !known.contains(*c))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!(
            "Columns not found in table '{}': {}",
            table,
            unknown.join(", ")
        );
    }
    Ok(())
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &CellValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        CellValue::Null => query.bind(None::<String>),
        CellValue::String(s) => query.bind(s.clone()),
        CellValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            query.bind(*n as i64)
        }
        CellValue::Number(n) => query.bind(*n),
        CellValue::Boolean(b) => query.bind(*b),
        CellValue::Timestamp(ts) => query.bind(ts.format(TIMESTAMP_FORMAT).to_string()),
    }
}

/// Decode one column by its storage class, refined by the declared type
fn decode_cell(row: &SqliteRow, idx: usize) -> Result<CellValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let storage = raw.type_info().name().to_uppercase();
    let declared = row.column(idx).type_info().name().to_uppercase();

    let value = match storage.as_str() {
        "INTEGER" if declared == "BOOLEAN" => {
            CellValue::Boolean(row.try_get_unchecked::<i64, _>(idx)? != 0)
        }
        "INTEGER" => CellValue::from(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" => CellValue::from(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx)?;
            CellValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => {
            let text = row.try_get_unchecked::<String, _>(idx)?;
            match declared.as_str() {
                "DATETIME" | "DATE" | "TIMESTAMP" => parse_timestamp(&text)
                    .map(CellValue::Timestamp)
                    .unwrap_or(CellValue::String(text)),
                _ => CellValue::String(text),
            }
        }
    };
    Ok(value)
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    row.columns()
        .iter()
        .map(|column| Ok((column.name().to_string(), decode_cell(row, column.ordinal())?)))
        .collect()
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tables")?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to get columns of table '{}'", table))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    async fn select(&self, table: &str, columns: &[String], filter: &Filter) -> Result<Vec<Row>> {
        let known = self.ensure_table(table).await?;
        ensure_columns(table, &known, columns)?;

        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            projection,
            quote_ident(table),
            filter.clause()
        );
        log::debug!("{} {:?}", sql, filter.params());

        let mut query = sqlx::query(&sql);
        for param in filter.params() {
            query = bind_value(query, param);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to select from table '{}'", table))?;

        rows.iter().map(decode_row).collect()
    }

    async fn update(
        &mut self,
        process: &str,
        table: &str,
        changes: &Row,
        filter: &Filter,
    ) -> Result<u64> {
        if changes.is_empty() {
            return Ok(0);
        }

        let known = self.ensure_table(table).await?;
        ensure_columns(table, &known, changes.keys())?;

        let assignments = changes
            .keys()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(table),
            assignments,
            filter.clause()
        );
        log::debug!("{} {:?} {:?}", sql, changes, filter.params());

        let mut query = sqlx::query(&sql);
        for value in changes.values().chain(filter.params()) {
            query = bind_value(query, value);
        }

        let rows_affected = query
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to update table '{}'", table))?
            .rows_affected();

        log::info!(
            "[{}] Updated {} rows in '{}' where {}",
            process,
            rows_affected,
            table,
            filter
        );

        if let Some(update_log) = &mut self.log {
            update_log.record(
                process,
                table,
                UpdateRecord {
                    changes: changes.clone(),
                    filter: filter.clone(),
                    rows_affected,
                },
            );
        }

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE courses (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                discipline TEXT,
                credits REAL,
                active BOOLEAN,
                updated DATETIME
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            r#"
            INSERT INTO courses (id, title, discipline, credits, active, updated) VALUES
                (1, 'Logic', 'Philosophy', 3.5, 1, '2024-01-02 03:04:05'),
                (2, 'Ethics', 'Philosophy', 3.0, 0, NULL),
                (3, 'Algebra', 'Mathematics', 4.0, 1, NULL)
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        // Never persisted by these tests
        SqliteStore::with_pool(pool, Some(DatabaseLog::empty("unused_database_logs.json")))
    }

    #[tokio::test]
    async fn test_list_tables_and_columns() {
        let store = store().await;
        assert_eq!(store.list_tables().await.unwrap(), ["courses"]);
        assert_eq!(
            store.table_columns("courses").await.unwrap(),
            ["id", "title", "discipline", "credits", "active", "updated"]
        );
    }

    #[tokio::test]
    async fn test_select_decodes_typed_values() {
        let store = store().await;
        let filter = Filter::equals([("id", CellValue::from(1))]);
        let rows = store.select("courses", &[], &filter).await.unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["title"], CellValue::from("Logic"));
        assert_eq!(row["credits"], CellValue::from(3.5));
        assert_eq!(row["active"], CellValue::Boolean(true));
        assert_eq!(row["updated"], CellValue::parse("2024-01-02 03:04:05"));
    }

    #[tokio::test]
    async fn test_select_projection_and_unknown_names() {
        let store = store().await;
        let filter = Filter::equals([("discipline", CellValue::from("Philosophy"))]);
        let rows = store
            .select("courses", &["id".to_string()], &filter)
            .await
            .unwrap();
        let ids: Vec<CellValue> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, [CellValue::from(1), CellValue::from(2)]);
        assert_eq!(rows[0].len(), 1);

        let never_updated = Filter::equals([("updated", CellValue::Null)]);
        let rows = store
            .select("courses", &["id".to_string()], &never_updated)
            .await
            .unwrap();
        let ids: Vec<CellValue> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, [CellValue::from(2), CellValue::from(3)]);

        assert!(store.select("nope", &[], &Filter::all()).await.is_err());
        assert!(
            store
                .select("courses", &["bogus".to_string()], &Filter::all())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_update_binds_values_and_records_log() {
        let mut store = store().await;
        let changes = Row::from([(
            "discipline".to_string(),
            CellValue::from("Logic'; DROP TABLE courses; --"),
        )]);
        let filter = Filter::any_of("id", vec![1.into(), 2.into()]);

        let affected = store
            .update("Modify Database Records", "courses", &changes, &filter)
            .await
            .unwrap();
        assert_eq!(affected, 2);

        // Value was bound, not interpolated
        assert_eq!(store.list_tables().await.unwrap(), ["courses"]);
        let by_id = Filter::equals([("id", CellValue::from(2))]);
        let rows = store
            .select("courses", &["discipline".to_string()], &by_id)
            .await
            .unwrap();
        assert_eq!(rows[0]["discipline"], CellValue::from("Logic'; DROP TABLE courses; --"));

        let log = store.log().unwrap();
        let logged: Vec<&UpdateRecord> = log
            .entries()
            .values()
            .flat_map(|tables| tables["courses"]["Modify Database Records"].iter())
            .collect();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].rows_affected, 2);
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_column() {
        let mut store = store().await;
        let changes = Row::from([("bogus".to_string(), CellValue::from(1))]);
        let err = store
            .update("Fix", "courses", &changes, &Filter::all())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bogus"));
        assert!(store.log().unwrap().entries().is_empty());
    }
}
