//! Batch loader for the quarterly "Ingresos Detallado" fiscal report
//!
//! ```text
//! S3 ──▶ extract ──▶ transform ──▶ keys ──▶ load ──▶ PostgreSQL | SQLite
//! (.xlsx) (RawSheet)  (DetailRecord) (id)    (insert | upsert | overwrite)
//! ```
//!
//! - [`extract`] - object storage access and workbook decoding
//! - [`transform`] - fixed-window slicing, reporting date and quarter
//! - [`keys`] - deterministic surrogate keys
//! - [`load`] - table definition and the three write strategies
//! - [`db`] - connection pools and backend dialects
//! - [`pipeline`] - one run end to end

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod keys;
pub mod load;
pub mod pipeline;
pub mod transform;

pub use error::{EtlError, EtlResult};
pub use keys::generate_key;
pub use load::{LoadMethod, Loader, TableDefinition};
pub use pipeline::{Pipeline, RunReport, RunRequest};
pub use transform::{DetailRecord, RawSheet};
