//! Fetch the quarterly report from object storage
//!
//! Selector problems (unknown source, missing bucket, bad quarter) are hard
//! errors raised before any I/O. Read or parse failures are not: they come
//! back as an [`Extraction`] with an empty sheet and no provenance so the
//! caller can decide whether to skip or alert.

pub mod store;
pub mod workbook;

pub use store::{DEFAULT_REGION, LocalObjectStore, ObjectStore, S3ObjectStore};
pub use workbook::{DEFAULT_SHEET, read_sheet};

use std::str::FromStr;

use crate::error::{EtlError, EtlResult};
use crate::transform::RawSheet;

const KEY_PREFIX: &str = "finanzas/Ingresos_Detallado/raw";

/// Where the report is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    S3,
}

impl FromStr for Source {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(Source::S3),
            other => Err(EtlError::invalid_argument(format!(
                "Invalid source '{}'. Use 's3'",
                other
            ))),
        }
    }
}

/// Fiscal quarter selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// Code used in report file names ("1T".."4T")
    pub fn file_code(&self) -> &'static str {
        match self {
            Quarter::Q1 => "1T",
            Quarter::Q2 => "2T",
            Quarter::Q3 => "3T",
            Quarter::Q4 => "4T",
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }
}

impl std::fmt::Display for Quarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

impl FromStr for Quarter {
    type Err = EtlError;

    /// Accepts "Q1".."Q4" and the file codes "1T".."4T"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "Q1" | "1T" => Ok(Quarter::Q1),
            "Q2" | "2T" => Ok(Quarter::Q2),
            "Q3" | "3T" => Ok(Quarter::Q3),
            "Q4" | "4T" => Ok(Quarter::Q4),
            other => Err(EtlError::invalid_argument(format!(
                "Invalid quarter '{}': use Q1-Q4",
                other
            ))),
        }
    }
}

/// File name of the report for one quarter
pub fn report_file_name(year: i32, quarter: Quarter) -> String {
    format!("F5_Edo_Ana_Ing_Det_LDF_{}{}.xlsx", quarter.file_code(), year)
}

/// Object key of the report for one quarter
pub fn report_object_key(year: i32, quarter: Quarter) -> String {
    format!("{}/{}", KEY_PREFIX, report_file_name(year, quarter))
}

/// What to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub year: i32,
    pub quarter: Quarter,
    pub source: Source,
    pub bucket: Option<String>,
    pub sheet_name: String,
}

impl ExtractRequest {
    pub fn new(year: i32, quarter: Quarter, bucket: Option<String>) -> Self {
        Self {
            year,
            quarter,
            source: Source::S3,
            bucket,
            sheet_name: DEFAULT_SHEET.to_string(),
        }
    }

    /// Bucket to read from; `s3` requires one
    pub fn bucket(&self) -> EtlResult<&str> {
        match self.source {
            Source::S3 => self
                .bucket
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .ok_or_else(|| {
                    EtlError::invalid_argument("bucket_name is required for S3 extraction")
                }),
        }
    }
}

/// Result of an extraction attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub sheet: RawSheet,
    /// `s3://bucket/key` the sheet came from; `None` when extraction failed
    pub provenance: Option<String>,
}

impl Extraction {
    /// Soft-failure sentinel
    pub fn failed() -> Self {
        Self {
            sheet: RawSheet::empty(),
            provenance: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.provenance.is_none()
    }
}

/// Read the report named by `request` from `store`.
///
/// Only argument errors are returned as `Err`.
pub async fn extract(store: &dyn ObjectStore, request: &ExtractRequest) -> EtlResult<Extraction> {
    let bucket = request.bucket()?;
    let key = report_object_key(request.year, request.quarter);
    let location = store.describe(bucket, &key);

    let bytes = match store.get(bucket, &key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("Failed to read object {}. Error: {:#}", location, e);
            return Ok(Extraction::failed());
        }
    };
    log::debug!("Fetched {} bytes from {}", bytes.len(), location);

    match read_sheet(bytes, &request.sheet_name) {
        Ok(sheet) => {
            log::info!(
                "Extracted sheet '{}' ({}x{}) from {}",
                request.sheet_name,
                sheet.height(),
                sheet.width(),
                location
            );
            Ok(Extraction {
                sheet,
                provenance: Some(format!("s3://{}/{}", bucket, key)),
            })
        }
        Err(e) => {
            log::error!("Failed to parse workbook {}. Error: {:#}", location, e);
            Ok(Extraction::failed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::workbook::tests::report_workbook;

    fn store_with(bytes: &[u8], year: i32, quarter: Quarter) -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let path = store.object_path("finanzas", &report_object_key(year, quarter));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        (dir, store)
    }

    #[test]
    fn test_object_key_convention() {
        assert_eq!(
            report_object_key(2024, Quarter::Q3),
            "finanzas/Ingresos_Detallado/raw/F5_Edo_Ana_Ing_Det_LDF_3T2024.xlsx"
        );
    }

    #[test]
    fn test_parse_quarter() {
        assert_eq!("Q1".parse::<Quarter>().unwrap(), Quarter::Q1);
        assert_eq!("q4".parse::<Quarter>().unwrap(), Quarter::Q4);
        assert_eq!("2T".parse::<Quarter>().unwrap(), Quarter::Q2);
        assert!(matches!("Q5".parse::<Quarter>(), Err(EtlError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_source() {
        assert_eq!("s3".parse::<Source>().unwrap(), Source::S3);
        assert!(matches!("local".parse::<Source>(), Err(EtlError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_missing_bucket_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let request = ExtractRequest::new(2024, Quarter::Q1, None);
        let err = extract(&store, &request).await.unwrap_err();
        assert!(matches!(err, EtlError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_extract_success() {
        let bytes = report_workbook(DEFAULT_SHEET, "al 31 de marzo de 2024");
        let (_dir, store) = store_with(&bytes, 2024, Quarter::Q1);

        let request = ExtractRequest::new(2024, Quarter::Q1, Some("finanzas".to_string()));
        let extraction = extract(&store, &request).await.unwrap();

        assert_eq!(
            extraction.provenance.as_deref(),
            Some("s3://finanzas/finanzas/Ingresos_Detallado/raw/F5_Edo_Ana_Ing_Det_LDF_1T2024.xlsx")
        );
        assert_eq!(extraction.sheet.height(), 76);
    }

    #[tokio::test]
    async fn test_missing_object_is_soft_failure() {
        let bytes = report_workbook(DEFAULT_SHEET, "al 31 de marzo de 2024");
        let (_dir, store) = store_with(&bytes, 2024, Quarter::Q1);

        let request = ExtractRequest::new(2024, Quarter::Q2, Some("finanzas".to_string()));
        let extraction = extract(&store, &request).await.unwrap();

        assert!(extraction.is_failed());
        assert!(extraction.sheet.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_workbook_is_soft_failure() {
        let (_dir, store) = store_with(b"definitely not xlsx", 2024, Quarter::Q1);
        let request = ExtractRequest::new(2024, Quarter::Q1, Some("finanzas".to_string()));
        let extraction = extract(&store, &request).await.unwrap();
        assert_eq!(extraction, Extraction::failed());
    }
}
