//! Command handlers

use std::fs;

use anyhow::{Context, Result};
use colored::*;
use uuid::Uuid;

use super::{InspectArgs, OutputFormat, ReportArgs, RunArgs};
use crate::config::Config;
use crate::db;
use crate::keys::{KEY_SCHEME, generate_key};
use crate::load::Loader;
use crate::pipeline::{Pipeline, RunRequest};
use crate::transform::DetailRecord;

fn run_request(config: &Config, report: &ReportArgs, method: &str) -> Result<RunRequest> {
    let bucket = report.bucket.clone().or_else(|| config.storage.bucket.clone());
    Ok(RunRequest::parse(
        report.year,
        &report.quarter,
        &report.source,
        bucket,
        method,
    )?)
}

/// Handle `run`
pub async fn handle_run_command(mut config: Config, args: RunArgs) -> Result<()> {
    if let Some(url) = args.database {
        config.database.url = url;
    }
    if let Some(table) = args.table {
        config.database.table = table;
    }

    // Selector and table-name checks come before any connection or download
    let request = run_request(&config, &args.report, &args.method)?;
    let table = config.table()?;
    let backend = config.backend()?;

    let pool = db::connect(&config.database.url).await?;
    let loader = Loader::new(pool, backend, table);
    let store = config.object_store().await;
    let pipeline = Pipeline::new(store.as_ref(), &config.sheet.name, config.sheet.layout.clone());

    let report = pipeline
        .run(&loader, &request)
        .await
        .with_context(|| format!("Run for {} {} failed", request.year, request.quarter))?;

    println!("{} {}", "Run".bold(), report.run_id.to_string().dimmed());
    match &report.provenance {
        Some(source) => println!("  Source:  {}", source.cyan()),
        None => println!("  Source:  {}", "extraction failed".yellow()),
    }
    println!("  Records: {}", report.records);
    match &report.load {
        Some(load) => println!(
            "  Loaded:  {} rows into {} ({}, {})",
            load.rows_written.to_string().bright_green().bold(),
            loader.table().name(),
            load.method,
            loader.backend()
        ),
        None => println!("  Loaded:  {}", "nothing".yellow()),
    }

    Ok(())
}

/// Handle `inspect`
pub async fn handle_inspect_command(config: Config, args: InspectArgs) -> Result<()> {
    let request = run_request(&config, &args.report, "upsert")?;
    let store = config.object_store().await;
    let pipeline = Pipeline::new(store.as_ref(), &config.sheet.name, config.sheet.layout.clone());

    let prepared = pipeline.prepare(Uuid::new_v4(), &request).await?;
    if prepared.provenance.is_none() {
        eprintln!("{}", "Extraction failed; see log for details".yellow());
    }

    let output = format_records(&prepared.records, args.format)?;
    match args.output {
        Some(path) => {
            fs::write(&path, &output)
                .with_context(|| format!("Failed to write output to: {}", path.display()))?;
            println!("Wrote {} records to {}", prepared.records.len(), path.display());
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Handle `key`
pub fn handle_key_command(concepto: &str, fecha: &str, cuarto: &str) -> Result<()> {
    println!("{}", generate_key(concepto, fecha, cuarto));
    log::debug!("Key scheme {}", KEY_SCHEME);
    Ok(())
}

/// Handle `schema`: DDL in the dialect of the configured database
pub fn handle_schema_command(config: &Config) -> Result<()> {
    println!("{};", config.table()?.create_sql(config.backend()?));
    Ok(())
}

const HEADERS: [&str; 12] = [
    "id",
    "concepto",
    "estimado",
    "ampliaciones_reducciones",
    "modificado",
    "devengado",
    "recaudado",
    "diferencia",
    "clave_primaria",
    "clave_secundaria",
    "fecha",
    "cuarto",
];

fn record_fields(record: &DetailRecord) -> Vec<String> {
    let mut fields = vec![record.id.clone(), record.concepto_str().to_string()];
    fields.extend(record.amounts().iter().map(|c| c.render()));
    fields.push(record.clave_primaria.clone().unwrap_or_default());
    fields.push(record.clave_secundaria.clone().unwrap_or_default());
    fields.push(record.fecha.clone().unwrap_or_default());
    fields.push(record.cuarto.map(|q| q.to_string()).unwrap_or_default());
    fields
}

fn format_records(records: &[DetailRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(records).context("Failed to serialize records")?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(HEADERS)?;
            for record in records {
                writer.write_record(record_fields(record))?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
            String::from_utf8(bytes).context("CSV output is not UTF-8")
        }
        OutputFormat::Table => {
            let mut out = String::new();
            for record in records {
                let code = record
                    .clave_primaria
                    .as_deref()
                    .or(record.clave_secundaria.as_deref())
                    .unwrap_or("");
                out.push_str(&format!(
                    "{:>20}  {:<6} {:<60} {:>16} {:>16}\n",
                    record.id.dimmed(),
                    code.bold(),
                    record.concepto_str(),
                    record.estimado.render(),
                    record.recaudado.render()
                ));
            }
            out.push_str(&format!("{} records\n", records.len()));
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::assign_keys;
    use crate::transform::RawCell;

    fn records() -> Vec<DetailRecord> {
        let cells = [
            RawCell::text("A. Impuestos, derechos"),
            RawCell::Number(10.0),
            RawCell::Empty,
            RawCell::Number(10.0),
            RawCell::Number(5.5),
            RawCell::Number(5.0),
            RawCell::text("-"),
        ];
        let mut records = vec![DetailRecord::from_cells(
            cells,
            Some("31/03/2024".to_string()),
            Some(1),
        )];
        assign_keys(&mut records);
        records
    }

    #[test]
    fn test_csv_output() {
        let out = format_records(&records(), OutputFormat::Csv).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), HEADERS.join(","));
        let row = lines.next().unwrap();
        assert!(row.contains("\"A. Impuestos, derechos\",10,,10,5.5,5,-,A.,,31/03/2024,1"));
    }

    #[test]
    fn test_json_output() {
        let out = format_records(&records(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["concepto"], "A. Impuestos, derechos");
        assert_eq!(value[0]["estimado"], 10.0);
        assert!(value[0]["ampliaciones_reducciones"].is_null());
        assert_eq!(value[0]["cuarto"], 1);
    }

    #[test]
    fn test_record_fields_match_headers() {
        assert_eq!(record_fields(&records()[0]).len(), HEADERS.len());
    }
}
