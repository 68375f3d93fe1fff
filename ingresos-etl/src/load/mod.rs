//! Persist detail records with insert, upsert or overwrite semantics
//!
//! All three methods share one discipline: ensure the schema, open a single
//! transaction, write set-based multi-row statements, then commit. Any
//! storage error inside the transaction rolls the whole call back.

pub mod table;

pub use table::{ColumnDef, ColumnType, DEFAULT_TABLE, TableDefinition};

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::{Any, AnyPool, Transaction};

use crate::db::Backend;
use crate::error::{EtlError, EtlResult};
use crate::transform::DetailRecord;

/// Rows per statement. 500 rows x 12 columns stays well under the
/// bound-parameter limits of SQLite and PostgreSQL.
const CHUNK_SIZE: usize = 500;

/// How rows are written to the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMethod {
    /// Append; an existing id is a constraint violation
    Insert,
    /// Insert new ids, rewrite every non-key column of existing ones
    Upsert,
    /// Replace the whole table contents
    Overwrite,
}

impl LoadMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMethod::Insert => "insert",
            LoadMethod::Upsert => "upsert",
            LoadMethod::Overwrite => "overwrite",
        }
    }
}

impl std::fmt::Display for LoadMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LoadMethod {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insert" => Ok(LoadMethod::Insert),
            "upsert" => Ok(LoadMethod::Upsert),
            "overwrite" => Ok(LoadMethod::Overwrite),
            other => Err(EtlError::invalid_argument(format!(
                "Invalid load method '{}': choose from [insert, upsert, overwrite]",
                other
            ))),
        }
    }
}

/// Progress of one load call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Idle,
    SchemaEnsured,
    Inserting,
    Upserting,
    Truncating,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub method: LoadMethod,
    /// Rows sent to storage after collapsing duplicate ids
    pub rows_written: usize,
}

/// Writes detail records into one table
#[derive(Debug, Clone)]
pub struct Loader {
    pool: AnyPool,
    backend: Backend,
    table: TableDefinition,
}

impl Loader {
    pub fn new(pool: AnyPool, backend: Backend, table: TableDefinition) -> Self {
        Self {
            pool,
            backend,
            table,
        }
    }

    pub fn table(&self) -> &TableDefinition {
        &self.table
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Dispatch to the method's operation
    pub async fn load(&self, method: LoadMethod, rows: &[DetailRecord]) -> EtlResult<LoadSummary> {
        match method {
            LoadMethod::Insert => self.insert(rows).await,
            LoadMethod::Upsert => self.upsert(rows).await,
            LoadMethod::Overwrite => self.overwrite(rows).await,
        }
    }

    /// Append rows. Fails with [`EtlError::ConstraintViolation`] when any id
    /// already exists, including ids repeated inside `rows`.
    pub async fn insert(&self, rows: &[DetailRecord]) -> EtlResult<LoadSummary> {
        let rows: Vec<&DetailRecord> = rows.iter().collect();
        self.run(LoadMethod::Insert, rows).await
    }

    /// Insert-or-update keyed on `id` as one set-based statement per chunk.
    pub async fn upsert(&self, rows: &[DetailRecord]) -> EtlResult<LoadSummary> {
        self.run(LoadMethod::Upsert, latest_per_id(rows)).await
    }

    /// Delete everything and write `rows` in the same transaction.
    pub async fn overwrite(&self, rows: &[DetailRecord]) -> EtlResult<LoadSummary> {
        self.run(LoadMethod::Overwrite, latest_per_id(rows)).await
    }

    async fn run(&self, method: LoadMethod, rows: Vec<&DetailRecord>) -> EtlResult<LoadSummary> {
        let table = self.table.name();
        self.trace(LoadState::Idle, method);

        self.table.ensure(&self.pool, self.backend).await?;
        self.trace(LoadState::SchemaEnsured, method);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EtlError::from_storage(method.as_str(), table, e))?;

        match self.write(&mut tx, method, &rows).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| EtlError::from_storage(method.as_str(), table, e))?;
                self.trace(LoadState::Committed, method);
                log::info!("{} of {} rows into {} committed", method, rows.len(), table);
                Ok(LoadSummary {
                    method,
                    rows_written: rows.len(),
                })
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    log::error!("Rollback of {} on {} failed: {}", method, table, rollback_err);
                }
                self.trace(LoadState::RolledBack, method);
                log::error!("{} into {} rolled back: {}", method, table, err);
                Err(err)
            }
        }
    }

    async fn write(
        &self,
        tx: &mut Transaction<'_, Any>,
        method: LoadMethod,
        rows: &[&DetailRecord],
    ) -> EtlResult<()> {
        let table = self.table.name();
        let fail = |e: sqlx::Error| EtlError::from_storage(method.as_str(), table, e);

        match method {
            LoadMethod::Insert => self.trace(LoadState::Inserting, method),
            LoadMethod::Upsert => self.trace(LoadState::Upserting, method),
            LoadMethod::Overwrite => {
                self.trace(LoadState::Truncating, method);
                let cleared = sqlx::query(&self.backend.clear_sql(table))
                    .execute(&mut **tx)
                    .await
                    .map_err(fail)?;
                log::debug!("Cleared {} rows from {}", cleared.rows_affected(), table);
                self.trace(LoadState::Inserting, method);
            }
        }

        for chunk in rows.chunks(CHUNK_SIZE) {
            let sql = write_sql(&self.table, chunk.len(), method == LoadMethod::Upsert);

            // Bind order must follow TableDefinition::columns
            let mut query = sqlx::query(&sql);
            for record in chunk {
                query = query
                    .bind(record.concepto.as_deref())
                    .bind(record.estimado.as_amount())
                    .bind(record.ampliaciones_reducciones.as_amount())
                    .bind(record.modificado.as_amount())
                    .bind(record.devengado.as_amount())
                    .bind(record.recaudado.as_amount())
                    .bind(record.diferencia.as_amount())
                    .bind(record.clave_primaria.as_deref())
                    .bind(record.clave_secundaria.as_deref())
                    .bind(record.fecha.as_deref())
                    .bind(record.cuarto.map(i64::from))
                    .bind(record.id.as_str());
            }
            query.execute(&mut **tx).await.map_err(fail)?;
        }

        Ok(())
    }

    fn trace(&self, state: LoadState, method: LoadMethod) {
        log::debug!("{} {}: {:?}", method, self.table.name(), state);
    }
}

/// Multi-row `INSERT` for `rows` records, with an `ON CONFLICT` update of
/// every non-key column when `upsert` is set.
///
/// Placeholders are numbered (`$1`, `$2`, ...), which both SQLite and
/// PostgreSQL accept.
fn write_sql(table: &TableDefinition, rows: usize, upsert: bool) -> String {
    let columns: Vec<&str> = table.column_names().collect();
    let width = columns.len();

    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let params: Vec<String> = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect();
            format!("({})", params.join(", "))
        })
        .collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table.name(),
        columns.join(", "),
        tuples.join(", ")
    );

    if upsert {
        let assignments: Vec<String> = table
            .non_key_columns()
            .map(|c| format!("{0} = excluded.{0}", c.name))
            .collect();
        sql.push_str(&format!(
            " ON CONFLICT({}) DO UPDATE SET {}",
            table.primary_key(),
            assignments.join(", ")
        ));
    }

    sql
}

/// Collapse repeated ids, keeping the position of the first occurrence and
/// the values of the last.
fn latest_per_id(rows: &[DetailRecord]) -> Vec<&DetailRecord> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<&DetailRecord> = Vec::with_capacity(rows.len());

    for row in rows {
        match index.get(row.id.as_str()) {
            Some(&i) => out[i] = row,
            None => {
                index.insert(row.id.as_str(), out.len());
                out.push(row);
            }
        }
    }

    if out.len() < rows.len() {
        log::warn!(
            "Collapsed {} rows sharing an id with a later row",
            rows.len() - out.len()
        );
    }
    out
}
