//! One extract → transform → key → load pass
//!
//! Every log line of an invocation carries its run id so overlapping runs
//! against the same table can be told apart.

use uuid::Uuid;

use crate::error::EtlResult;
use crate::extract::{self, ExtractRequest, ObjectStore, Quarter, Source};
use crate::keys::assign_keys;
use crate::load::{LoadMethod, LoadSummary, Loader};
use crate::transform::{self, DetailRecord, SheetLayout};

/// Validated selectors for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub year: i32,
    pub quarter: Quarter,
    pub source: Source,
    pub bucket: Option<String>,
    pub method: LoadMethod,
}

impl RunRequest {
    /// Parse raw selectors. Every check here happens before any I/O.
    pub fn parse(
        year: i32,
        quarter: &str,
        source: &str,
        bucket: Option<String>,
        method: &str,
    ) -> EtlResult<Self> {
        let request = Self {
            year,
            quarter: quarter.parse()?,
            source: source.parse()?,
            bucket,
            method: method.parse()?,
        };
        request.extract_request("").bucket()?;
        Ok(request)
    }

    fn extract_request(&self, sheet_name: &str) -> ExtractRequest {
        ExtractRequest {
            year: self.year,
            quarter: self.quarter,
            source: self.source,
            bucket: self.bucket.clone(),
            sheet_name: sheet_name.to_string(),
        }
    }
}

/// Records produced by the extract and transform stages
#[derive(Debug, Clone)]
pub struct Prepared {
    pub provenance: Option<String>,
    pub records: Vec<DetailRecord>,
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub provenance: Option<String>,
    pub records: usize,
    /// `None` when there was nothing to load
    pub load: Option<LoadSummary>,
}

pub struct Pipeline<'a> {
    store: &'a dyn ObjectStore,
    sheet_name: String,
    layout: SheetLayout,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn ObjectStore, sheet_name: impl Into<String>, layout: SheetLayout) -> Self {
        Self {
            store,
            sheet_name: sheet_name.into(),
            layout,
        }
    }

    /// Extract, transform and key the report without touching the database
    pub async fn prepare(&self, run_id: Uuid, request: &RunRequest) -> EtlResult<Prepared> {
        log::info!(
            "[run {}] Extracting {} {} ({})",
            run_id,
            request.year,
            request.quarter,
            extract::report_file_name(request.year, request.quarter)
        );

        let extraction =
            extract::extract(self.store, &request.extract_request(&self.sheet_name)).await?;
        if extraction.is_failed() {
            log::warn!("[run {}] Extraction failed, continuing with no records", run_id);
        }

        let mut records = transform::transform(&extraction.sheet, &self.layout)?;
        assign_keys(&mut records);
        log::info!("[run {}] {} records ready", run_id, records.len());

        Ok(Prepared {
            provenance: extraction.provenance,
            records,
        })
    }

    /// Full pass. An empty record set (e.g. after a failed extraction) skips
    /// the load instead of, say, overwriting the table with nothing.
    pub async fn run(&self, loader: &Loader, request: &RunRequest) -> EtlResult<RunReport> {
        let run_id = Uuid::new_v4();
        let prepared = self.prepare(run_id, request).await?;

        let load = if prepared.records.is_empty() {
            log::warn!("[run {}] No records to load into {}", run_id, loader.table().name());
            None
        } else {
            log::info!(
                "[run {}] Loading {} records into {} ({})",
                run_id,
                prepared.records.len(),
                loader.table().name(),
                request.method
            );
            Some(loader.load(request.method, &prepared.records).await?)
        };

        Ok(RunReport {
            run_id,
            provenance: prepared.provenance,
            records: prepared.records.len(),
            load,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::extract::workbook::tests::report_workbook;
    use crate::extract::{DEFAULT_SHEET, LocalObjectStore, report_object_key};
    use crate::db::{Backend, tests::memory_pool};
    use crate::load::TableDefinition;
    use rust_xlsxwriter::Workbook;
    use sqlx::Row;

    async fn memory_loader() -> Loader {
        Loader::new(memory_pool().await, Backend::Sqlite, TableDefinition::default())
    }

    fn seeded_store(header: &str) -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let path = store.object_path("finanzas", &report_object_key(2024, Quarter::Q1));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, report_workbook(DEFAULT_SHEET, header)).unwrap();
        (dir, store)
    }

    /// Report whose second window runs out at `last_row`; nothing below it
    /// is written, so the decoded sheet stops there too.
    fn trimmed_workbook(last_row: u32) -> Vec<u8> {
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name(DEFAULT_SHEET).unwrap();
            sheet.write_string(3, 3, "al 30 de junio de 2024").unwrap();
            for row in 7..44 {
                sheet.write_string(row, 1, format!("a{}) Concepto", row)).unwrap();
                sheet.write_number(row, 7, row as f64).unwrap();
            }
            for row in 45..=last_row {
                sheet.write_string(row, 1, format!("Transferencia {}", row)).unwrap();
                sheet.write_number(row, 2, row as f64).unwrap();
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    async fn count(loader: &Loader) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM nuevo_leon_ingresos_detallado")
            .fetch_one(loader.pool())
            .await
            .unwrap()
            .get("n")
    }

    #[test]
    fn test_bad_selectors_fail_before_io() {
        let bucket = Some("finanzas".to_string());
        for (quarter, source, method, bucket) in [
            ("Q1", "gcs", "upsert", bucket.clone()),
            ("Q1", "s3", "replace", bucket.clone()),
            ("Q9", "s3", "upsert", bucket.clone()),
            ("Q1", "s3", "upsert", None),
        ] {
            let err = RunRequest::parse(2024, quarter, source, bucket, method).unwrap_err();
            assert!(matches!(err, EtlError::InvalidArgument(_)), "{}", err);
        }
    }

    #[tokio::test]
    async fn test_end_to_end_upsert_twice() {
        let (_dir, store) = seeded_store("Del 1 de enero al 15 de marzo de 2024");
        let pipeline = Pipeline::new(&store, DEFAULT_SHEET, SheetLayout::default());
        let loader = memory_loader().await;
        let request =
            RunRequest::parse(2024, "Q1", "s3", Some("finanzas".to_string()), "upsert").unwrap();

        let first = pipeline.run(&loader, &request).await.unwrap();
        let second = pipeline.run(&loader, &request).await.unwrap();
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.records, 68);

        let prepared_a = pipeline.prepare(Uuid::new_v4(), &request).await.unwrap();
        let prepared_b = pipeline.prepare(Uuid::new_v4(), &request).await.unwrap();
        let ids_a: Vec<&str> = prepared_a.records.iter().map(|r| r.id.as_str()).collect();
        let ids_b: Vec<&str> = prepared_b.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);

        let distinct: std::collections::HashSet<&str> = ids_a.iter().copied().collect();
        assert_eq!(count(&loader).await, distinct.len() as i64);

        let row = sqlx::query(
            "SELECT fecha, cuarto, clave_primaria, clave_secundaria \
             FROM nuevo_leon_ingresos_detallado WHERE concepto = 'A. Impuestos'",
        )
        .fetch_one(loader.pool())
        .await
        .unwrap();
        assert_eq!(row.get::<String, _>("fecha"), "15/03/2024");
        assert_eq!(row.get::<i64, _>("cuarto"), 1);
        assert_eq!(row.get::<String, _>("clave_primaria"), "A.");
        assert_eq!(row.get::<Option<String>, _>("clave_secundaria"), None);
    }

    #[tokio::test]
    async fn test_trailing_blank_rows_are_not_a_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let path = store.object_path("finanzas", &report_object_key(2024, Quarter::Q2));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, trimmed_workbook(69)).unwrap();

        let pipeline = Pipeline::new(&store, DEFAULT_SHEET, SheetLayout::default());
        let loader = memory_loader().await;
        let request =
            RunRequest::parse(2024, "Q2", "s3", Some("finanzas".to_string()), "upsert").unwrap();

        let report = pipeline.run(&loader, &request).await.unwrap();
        assert!(report.provenance.is_some());
        assert_eq!(report.records, 37 + 25);
        assert_eq!(count(&loader).await, 62);

        let row = sqlx::query(
            "SELECT fecha, cuarto, estimado FROM nuevo_leon_ingresos_detallado \
             WHERE concepto = 'Transferencia 69'",
        )
        .fetch_one(loader.pool())
        .await
        .unwrap();
        assert_eq!(row.get::<String, _>("fecha"), "30/06/2024");
        assert_eq!(row.get::<i64, _>("cuarto"), 2);
        assert_eq!(row.get::<f64, _>("estimado"), 69.0);
    }

    #[tokio::test]
    async fn test_failed_extraction_skips_load() {
        let (_dir, store) = seeded_store("al 15 de marzo de 2024");
        let pipeline = Pipeline::new(&store, DEFAULT_SHEET, SheetLayout::default());
        let loader = memory_loader().await;
        let seed =
            RunRequest::parse(2024, "Q1", "s3", Some("finanzas".to_string()), "upsert").unwrap();
        pipeline.run(&loader, &seed).await.unwrap();
        let before = count(&loader).await;
        assert!(before > 0);

        // No Q2 object in the store
        let request =
            RunRequest::parse(2024, "Q2", "s3", Some("finanzas".to_string()), "overwrite").unwrap();
        let report = pipeline.run(&loader, &request).await.unwrap();

        assert_eq!(report.provenance, None);
        assert_eq!(report.records, 0);
        assert!(report.load.is_none());
        assert_eq!(count(&loader).await, before);
    }
}
