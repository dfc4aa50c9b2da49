// ==============================================================================
// output.rs - Multi-Format Instrument Output
// ==============================================================================
// Description: Writes merged instruments as CSV (default), JSON, Parquet or
//              SQLite with label-suffixed column names
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

// Apache Arrow/Parquet for columnar data
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

// SQLite for queryable database
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};

use crate::merge::output_header;
use crate::models::{CanonicalColumn, GwasRecord, InstrumentRow};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values (spreadsheet and R/pandas friendly)
    Csv,
    /// JSON array of row objects (best for web APIs and JavaScript)
    Json,
    /// Apache Parquet (best for data science: Python, R, Spark)
    Parquet,
    /// SQLite database (best for querying and exploration)
    Sqlite,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Parquet => "parquet",
            OutputFormat::Sqlite => "db",
        }
    }

    /// Output path for this format: CSV uses `base` as given, other formats
    /// replace its extension
    pub fn path_for(&self, base: &Path) -> PathBuf {
        match self {
            OutputFormat::Csv => base.to_path_buf(),
            _ => base.with_extension(self.extension()),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "parquet" => Ok(OutputFormat::Parquet),
            "sqlite" | "db" => Ok(OutputFormat::Sqlite),
            _ => Err(format!("unknown output format '{}' (expected csv, json, parquet or sqlite)", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Parquet => "parquet",
            OutputFormat::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

/// Writes merged instruments under a fixed pair of trait labels
pub struct InstrumentWriter {
    exposure_label: String,
    outcome_label: String,
    header: Vec<String>,
}

impl InstrumentWriter {
    pub fn new(exposure_label: &str, outcome_label: &str) -> Result<Self> {
        let header = output_header(exposure_label, outcome_label)?;
        Ok(Self {
            exposure_label: exposure_label.to_string(),
            outcome_label: outcome_label.to_string(),
            header,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Write `rows` in every requested format
    ///
    /// # Arguments
    /// * `rows` - Merged instruments
    /// * `base_path` - CSV path; other formats swap its extension
    /// * `formats` - Requested formats
    ///
    /// # Returns
    /// Paths of the written files, in `formats` order
    pub fn write_all(&self, rows: &[InstrumentRow], base_path: &Path, formats: &[OutputFormat]) -> Result<Vec<PathBuf>> {
        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }

        formats
            .iter()
            .map(|format| self.write(rows, &format.path_for(base_path), *format))
            .collect()
    }

    /// Write `rows` to `path` in one format
    pub fn write(&self, rows: &[InstrumentRow], path: &Path, format: OutputFormat) -> Result<PathBuf> {
        info!("Generating {} output: {:?}", format, path);
        let result = match format {
            OutputFormat::Csv => self.write_csv(rows, path),
            OutputFormat::Json => self.write_json(rows, path),
            OutputFormat::Parquet => self.write_parquet(rows, path),
            OutputFormat::Sqlite => self.write_sqlite(rows, path),
        };
        result.with_context(|| format!("Failed to write {} output {:?}", format, path))?;

        info!("{} output complete: {} instruments", format, rows.len());
        Ok(path.to_path_buf())
    }

    /// Values of one row in header order: (record side, column) pairs
    fn cells(row: &InstrumentRow) -> impl Iterator<Item = (&GwasRecord, CanonicalColumn)> {
        [&row.exposure, &row.outcome]
            .into_iter()
            .flat_map(|record| CanonicalColumn::VALUE_COLUMNS.into_iter().map(move |c| (record, c)))
    }

    fn write_csv(&self, rows: &[InstrumentRow], path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).context("Failed to create CSV file")?;
        writer.write_record(&self.header).context("Failed to write CSV header")?;

        for row in rows {
            let mut record = Vec::with_capacity(self.header.len());
            record.push(row.snp.clone());
            record.extend(Self::cells(row).map(|(side, column)| side.field_text(column).unwrap_or_default()));
            record.push(row.f_stat.map(|f| f.to_string()).unwrap_or_default());
            writer.write_record(&record).context("Failed to write CSV row")?;
        }

        writer.flush().context("Failed to flush CSV file")?;
        Ok(())
    }

    fn write_json(&self, rows: &[InstrumentRow], path: &Path) -> Result<()> {
        let objects: Vec<Value> = rows
            .iter()
            .map(|row| {
                let mut values = vec![Value::from(row.snp.clone())];
                values.extend(Self::cells(row).map(|(side, column)| json_value(side, column)));
                values.push(row.f_stat.map(Value::from).unwrap_or(Value::Null));

                let object: Map<String, Value> = self.header.iter().cloned().zip(values).collect();
                Value::Object(object)
            })
            .collect();

        let file = BufWriter::new(File::create(path).context("Failed to create JSON file")?);
        serde_json::to_writer_pretty(file, &objects).context("Failed to serialize JSON output")?;
        Ok(())
    }

    fn write_parquet(&self, rows: &[InstrumentRow], path: &Path) -> Result<()> {
        let mut fields = vec![Field::new(&self.header[0], DataType::Utf8, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
            rows.iter().map(|r| r.snp.as_str()).collect::<Vec<_>>(),
        ))];

        let exposures: Vec<&GwasRecord> = rows.iter().map(|r| &r.exposure).collect();
        let outcomes: Vec<&GwasRecord> = rows.iter().map(|r| &r.outcome).collect();
        let names = self.header[1..self.header.len() - 1].iter();
        let columns = [&exposures, &outcomes]
            .into_iter()
            .flat_map(|records| CanonicalColumn::VALUE_COLUMNS.into_iter().map(move |c| (records, c)));

        for (name, (records, column)) in names.zip(columns) {
            let (data_type, array) = arrow_column(records, column);
            fields.push(Field::new(name, data_type, true));
            arrays.push(array);
        }

        fields.push(Field::new(&self.header[self.header.len() - 1], DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(
            rows.iter().map(|r| r.f_stat).collect::<Vec<_>>(),
        )));

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays).context("Failed to create Arrow RecordBatch")?;

        // Write to Parquet file with compression
        let file = File::create(path).context("Failed to create Parquet file")?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props)).context("Failed to create Parquet writer")?;
        writer.write(&batch).context("Failed to write Parquet data")?;
        writer.close().context("Failed to close Parquet writer")?;
        Ok(())
    }

    fn write_sqlite(&self, rows: &[InstrumentRow], path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path).context("Failed to replace existing SQLite database")?;
        }
        let mut conn = Connection::open(path).context("Failed to create SQLite database")?;

        let mut definitions = vec![format!("{} TEXT PRIMARY KEY", quote_identifier(&self.header[0]))];
        let names = self.header[1..self.header.len() - 1].iter();
        let types = CanonicalColumn::VALUE_COLUMNS.iter().chain(CanonicalColumn::VALUE_COLUMNS.iter());
        for (name, column) in names.zip(types) {
            definitions.push(format!("{} {}", quote_identifier(name), sql_type(*column)));
        }
        definitions.push(format!("{} REAL", quote_identifier(&self.header[self.header.len() - 1])));

        conn.execute(&format!("CREATE TABLE instruments ({})", definitions.join(", ")), [])
            .context("Failed to create instruments table")?;

        conn.execute(
            "CREATE TABLE metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create metadata table")?;

        let instrument_count = rows.len().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let metadata_items = [
            ("exposure", &self.exposure_label),
            ("outcome", &self.outcome_label),
            ("instruments", &instrument_count),
            ("created_at", &created_at),
        ];
        for (key, value) in metadata_items {
            conn.execute("INSERT INTO metadata (key, value) VALUES (?1, ?2)", params![key, value])
                .context("Failed to insert metadata")?;
        }

        let placeholders = (1..=self.header.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!("INSERT INTO instruments VALUES ({})", placeholders);

        let tx = conn.transaction().context("Failed to start transaction")?;
        {
            let mut stmt = tx.prepare(&insert).context("Failed to prepare instruments insert statement")?;
            for row in rows {
                let mut values = vec![SqlValue::Text(row.snp.clone())];
                values.extend(Self::cells(row).map(|(side, column)| sql_value(side, column)));
                values.push(row.f_stat.map(SqlValue::Real).unwrap_or(SqlValue::Null));

                stmt.execute(params_from_iter(values)).context("Failed to insert instrument")?;
            }
        }
        tx.commit().context("Failed to commit instruments")?;

        Ok(())
    }
}

fn json_value(record: &GwasRecord, column: CanonicalColumn) -> Value {
    match column {
        CanonicalColumn::Chr => record.chr.map(Value::from),
        CanonicalColumn::Pos => record.pos.map(Value::from),
        CanonicalColumn::Beta => record.beta.map(Value::from),
        CanonicalColumn::Se => record.se.map(Value::from),
        CanonicalColumn::P => record.p.map(Value::from),
        CanonicalColumn::Eaf => record.eaf.map(Value::from),
        _ => record.field_text(column).map(Value::from),
    }
    .unwrap_or(Value::Null)
}

fn sql_type(column: CanonicalColumn) -> &'static str {
    match column {
        CanonicalColumn::Chr | CanonicalColumn::Pos => "INTEGER",
        CanonicalColumn::Snp | CanonicalColumn::Ea | CanonicalColumn::Nea => "TEXT",
        _ => "REAL",
    }
}

fn sql_value(record: &GwasRecord, column: CanonicalColumn) -> SqlValue {
    let value = match column {
        CanonicalColumn::Chr => record.chr.map(|v| SqlValue::Integer(i64::from(v))),
        CanonicalColumn::Pos => record.pos.and_then(|v| i64::try_from(v).ok()).map(SqlValue::Integer),
        CanonicalColumn::Beta => record.beta.map(SqlValue::Real),
        CanonicalColumn::Se => record.se.map(SqlValue::Real),
        CanonicalColumn::P => record.p.map(SqlValue::Real),
        CanonicalColumn::Eaf => record.eaf.map(SqlValue::Real),
        _ => record.field_text(column).map(SqlValue::Text),
    };
    value.unwrap_or(SqlValue::Null)
}

/// Labels are user input, so column names are always quoted
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn arrow_column(records: &[&GwasRecord], column: CanonicalColumn) -> (DataType, ArrayRef) {
    match column {
        CanonicalColumn::Chr => (
            DataType::UInt64,
            Arc::new(UInt64Array::from(
                records.iter().map(|r| r.chr.map(u64::from)).collect::<Vec<_>>(),
            )),
        ),
        CanonicalColumn::Pos => (
            DataType::UInt64,
            Arc::new(UInt64Array::from(records.iter().map(|r| r.pos).collect::<Vec<_>>())),
        ),
        CanonicalColumn::Snp | CanonicalColumn::Ea | CanonicalColumn::Nea => (
            DataType::Utf8,
            Arc::new(StringArray::from(
                records.iter().map(|r| r.field_text(column)).collect::<Vec<Option<String>>>(),
            )),
        ),
        CanonicalColumn::Beta => float_column(records.iter().map(|r| r.beta)),
        CanonicalColumn::Se => float_column(records.iter().map(|r| r.se)),
        CanonicalColumn::P => float_column(records.iter().map(|r| r.p)),
        CanonicalColumn::Eaf => float_column(records.iter().map(|r| r.eaf)),
    }
}

fn float_column(values: impl Iterator<Item = Option<f64>>) -> (DataType, ArrayRef) {
    (DataType::Float64, Arc::new(Float64Array::from(values.collect::<Vec<_>>())))
}
