//! Shape of the target relation

use sqlx::{AnyPool, Row};

use crate::db::Backend;
use crate::error::{EtlError, EtlResult};

pub const DEFAULT_TABLE: &str = "nuevo_leon_ingresos_detallado";

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Real,
    Integer,
}

impl ColumnType {
    pub fn sql(&self, backend: Backend) -> &'static str {
        match (self, backend) {
            (ColumnType::Text, _) => "TEXT",
            (ColumnType::Real, Backend::Sqlite) => "REAL",
            (ColumnType::Real, Backend::Postgres) => "DOUBLE PRECISION",
            (ColumnType::Integer, Backend::Sqlite) => "INTEGER",
            (ColumnType::Integer, Backend::Postgres) => "BIGINT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub primary_key: bool,
}

impl ColumnDef {
    const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            primary_key: false,
        }
    }

    const fn key(name: &'static str) -> Self {
        Self {
            name,
            column_type: ColumnType::Text,
            primary_key: true,
        }
    }

    fn ddl(&self, backend: Backend) -> String {
        if self.primary_key {
            format!("{} {} PRIMARY KEY NOT NULL", self.name, self.column_type.sql(backend))
        } else {
            format!("{} {}", self.name, self.column_type.sql(backend))
        }
    }
}

/// Columns in bind order. `id` is the only key and the only non-nullable column.
static COLUMNS: [ColumnDef; 12] = [
    ColumnDef::new("concepto", ColumnType::Text),
    ColumnDef::new("estimado", ColumnType::Real),
    ColumnDef::new("ampliaciones_reducciones", ColumnType::Real),
    ColumnDef::new("modificado", ColumnType::Real),
    ColumnDef::new("devengado", ColumnType::Real),
    ColumnDef::new("recaudado", ColumnType::Real),
    ColumnDef::new("diferencia", ColumnType::Real),
    ColumnDef::new("clave_primaria", ColumnType::Text),
    ColumnDef::new("clave_secundaria", ColumnType::Text),
    ColumnDef::new("fecha", ColumnType::Text),
    ColumnDef::new("cuarto", ColumnType::Integer),
    ColumnDef::key("id"),
];

/// Named relation holding detail records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    name: String,
}

impl TableDefinition {
    /// Definition for `name`; rejects anything that is not a plain SQL identifier
    pub fn new(name: &str) -> EtlResult<Self> {
        if !is_identifier(name) {
            return Err(EtlError::invalid_argument(format!(
                "Invalid table name '{}': use letters, digits and underscores",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        &COLUMNS
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> {
        COLUMNS.iter().map(|c| c.name)
    }

    pub fn primary_key(&self) -> &'static str {
        "id"
    }

    /// Columns rewritten on upsert
    pub fn non_key_columns(&self) -> impl Iterator<Item = &'static ColumnDef> {
        COLUMNS.iter().filter(|c| !c.primary_key)
    }

    pub fn create_sql(&self, backend: Backend) -> String {
        let cols: Vec<String> = COLUMNS
            .iter()
            .map(|c| format!("    {}", c.ddl(backend)))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name,
            cols.join(",\n")
        )
    }

    /// Create the table, then add any declared column an older table lacks.
    /// Safe to run before every load.
    pub async fn ensure(&self, pool: &AnyPool, backend: Backend) -> EtlResult<()> {
        let fail = |err: sqlx::Error| EtlError::from_storage("ensure schema", &self.name, err);

        sqlx::query(&self.create_sql(backend))
            .execute(pool)
            .await
            .map_err(fail)?;

        let rows = sqlx::query(&backend.columns_sql(&self.name))
            .fetch_all(pool)
            .await
            .map_err(fail)?;

        let mut existing = Vec::with_capacity(rows.len());
        for row in rows {
            existing.push(row.try_get::<String, _>("name").map_err(fail)?);
        }

        for column in COLUMNS.iter().filter(|c| !existing.iter().any(|e| e == c.name)) {
            log::info!("Adding missing column {}.{}", self.name, column.name);
            sqlx::query(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                self.name,
                column.name,
                column.column_type.sql(backend)
            ))
            .execute(pool)
            .await
            .map_err(fail)?;
        }

        Ok(())
    }
}

impl Default for TableDefinition {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE.to_string(),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_pool;

    async fn column_names(pool: &AnyPool, table: &str) -> Vec<String> {
        sqlx::query(&Backend::Sqlite.columns_sql(table))
            .fetch_all(pool)
            .await
            .unwrap()
            .iter()
            .map(|r| r.get::<String, _>("name"))
            .collect()
    }

    #[test]
    fn test_table_name_validation() {
        assert!(TableDefinition::new("nuevo_leon_ingresos_detallado").is_ok());
        assert!(TableDefinition::new("_staging2").is_ok());
        assert!(TableDefinition::new("").is_err());
        assert!(TableDefinition::new("2024_ingresos").is_err());
        assert!(TableDefinition::new("x; DROP TABLE y").is_err());
    }

    #[test]
    fn test_create_sql() {
        let sql = TableDefinition::default().create_sql(Backend::Sqlite);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS nuevo_leon_ingresos_detallado ("));
        assert!(sql.contains("id TEXT PRIMARY KEY NOT NULL"));
        assert!(sql.contains("cuarto INTEGER"));
        assert!(sql.contains("ampliaciones_reducciones REAL"));
    }

    #[test]
    fn test_create_sql_postgres() {
        let sql = TableDefinition::default().create_sql(Backend::Postgres);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS nuevo_leon_ingresos_detallado ("));
        assert!(sql.contains("id TEXT PRIMARY KEY NOT NULL"));
        assert!(sql.contains("cuarto BIGINT"));
        assert!(sql.contains("estimado DOUBLE PRECISION"));
        assert!(!sql.contains(" REAL"));
    }

    #[test]
    fn test_single_primary_key() {
        let table = TableDefinition::default();
        assert_eq!(table.columns().iter().filter(|c| c.primary_key).count(), 1);
        assert_eq!(table.non_key_columns().count(), 11);
        assert!(table.non_key_columns().all(|c| c.name != table.primary_key()));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let pool = memory_pool().await;
        let table = TableDefinition::default();
        table.ensure(&pool, Backend::Sqlite).await.unwrap();
        table.ensure(&pool, Backend::Sqlite).await.unwrap();

        assert_eq!(column_names(&pool, DEFAULT_TABLE).await.len(), 12);
    }

    #[tokio::test]
    async fn test_ensure_adds_missing_columns() {
        let pool = memory_pool().await;
        sqlx::query("CREATE TABLE legacy (id TEXT PRIMARY KEY NOT NULL, concepto TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let table = TableDefinition::new("legacy").unwrap();
        table.ensure(&pool, Backend::Sqlite).await.unwrap();

        let names = column_names(&pool, "legacy").await;
        assert_eq!(names.len(), 12);
        assert!(names.contains(&"cuarto".to_string()));
    }
}
