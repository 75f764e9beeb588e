// src/mapping/mod.rs
use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use csv::{ReaderBuilder, WriterBuilder};
use std::{
    fs::File,
    io::{BufReader, Read, Write},
    path::Path,
    sync::Arc,
};
use tracing::{debug, warn};

pub mod literal;
pub mod segments;
pub mod utils;

/// The mapping file held in memory.
///
/// Every column is a nullable `Utf8` array: cells stay in their raw string
/// form and are only interpreted (numbers, nested literals) by the lookups
/// that need them. Empty and NaN cells are null.
#[derive(Debug, Clone)]
pub struct MappingTable {
    batch: RecordBatch,
}

impl MappingTable {
    /// Wrap an existing batch. All columns must be `Utf8`.
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        for field in batch.schema().fields() {
            if field.data_type() != &DataType::Utf8 {
                bail!(
                    "mapping column `{}` must be Utf8, found {:?}",
                    field.name(),
                    field.data_type()
                );
            }
        }
        Ok(Self { batch })
    }

    /// Build a table from headers and row-major cells. Rows shorter than the
    /// header are padded with nulls.
    pub fn from_rows(headers: &[String], rows: &[Vec<Option<String>>]) -> Result<Self> {
        if rows.iter().any(|r| r.len() > headers.len()) {
            warn!(
                "some mapping rows have more cells than headers ({} headers); extra cells dropped",
                headers.len()
            );
        }

        let fields: Vec<Field> = headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect();

        let mut cols: Vec<ArrayRef> = Vec::with_capacity(headers.len());
        for idx in 0..headers.len() {
            let values: Vec<Option<&str>> = rows
                .iter()
                .map(|row| row.get(idx).and_then(|c| c.as_deref()))
                .collect();
            cols.push(Arc::new(StringArray::from(values)) as ArrayRef);
        }

        let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
        let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), cols, &options)
            .context("building mapping record batch")?;
        Ok(Self { batch })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.column_by_name(name).is_some()
    }

    /// The string array behind `name`, or an error if the column is missing.
    pub fn column(&self, name: &str) -> Result<&StringArray> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| anyhow!("mapping has no column `{}`", name))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("mapping column `{}` is not Utf8", name))
    }

    /// A single cell; `None` means the cell is null.
    pub fn cell(&self, name: &str, row: usize) -> Result<Option<&str>> {
        let col = self.column(name)?;
        if row >= col.len() {
            bail!("row {} out of range for column `{}`", row, name);
        }
        Ok(utils::cell_at(col, row))
    }

    /// Copy of the table without the named columns. Names that are not
    /// present are ignored.
    pub fn drop_columns(&self, names: &[String]) -> Result<MappingTable> {
        let keep: Vec<usize> = self
            .batch
            .schema()
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| !names.contains(f.name()))
            .map(|(i, _)| i)
            .collect();
        let batch = self
            .batch
            .project(&keep)
            .context("projecting mapping columns")?;
        Ok(Self { batch })
    }

    /// Write the table as a headered CSV, nulls as empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(self.column_names())?;

        let cols: Vec<&StringArray> = self
            .column_names()
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<_>>()?;
        for row in 0..self.num_rows() {
            wtr.write_record(
                cols.iter()
                    .map(|col| utils::cell_at(col, row).unwrap_or("")),
            )?;
        }
        wtr.flush().context("flushing mapping CSV")?;
        Ok(())
    }
}

/// Open `path` and read it as a mapping CSV.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_mapping_csv<P: AsRef<Path>>(path: P) -> Result<MappingTable> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open mapping file: {:?}", path.as_ref()))?;
    read_mapping(BufReader::new(file))
        .with_context(|| format!("Failed to read mapping file: {:?}", path.as_ref()))
}

/// Read a headered mapping CSV from any reader.
///
/// Empty cells and the usual NaN spellings become nulls.
pub fn read_mapping<R: Read>(reader: R) -> Result<MappingTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("reading mapping header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        bail!("mapping CSV has no header row");
    }

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        let row = record
            .iter()
            .map(|raw| {
                if utils::is_null_cell(raw) {
                    None
                } else {
                    Some(raw.to_string())
                }
            })
            .collect();
        rows.push(row);
    }
    debug!(columns = headers.len(), rows = rows.len(), "read mapping CSV");

    MappingTable::from_rows(&headers, &rows)
}
