//! Overwrites column A of one sheet in an existing template.
//!
//! The template is loaded whole and written back through the same reader and
//! writer, so styles, merges, formulas and the VBA project stay as they were.

use std::future::Future;
use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use umya_spreadsheet::Spreadsheet;

use crate::error::ExportError;
use crate::schema::cell_ref;
use crate::template::to_bytes;

/// Where the base template comes from.
pub trait TemplateStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Remote(String),
}

impl TemplateStore for TemplateSource {
    async fn load(&self) -> Result<Vec<u8>> {
        match self {
            Self::File(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("read template {}", path.display())),
            Self::Remote(url) => {
                let response = reqwest::get(url)
                    .await
                    .with_context(|| format!("fetch template {url}"))?
                    .error_for_status()
                    .with_context(|| format!("fetch template {url}"))?;
                let bytes = response
                    .bytes()
                    .await
                    .with_context(|| format!("download template {url}"))?;
                Ok(bytes.to_vec())
            }
        }
    }
}

/// Parses template bytes, keeping every part the writer knows how to round-trip.
pub fn open_template(bytes: &[u8]) -> Result<Spreadsheet, ExportError> {
    umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true)
        .context("parse template workbook")
        .map_err(ExportError::DependencyUnavailable)
}

/// Checks that `sheet_name` exists without deserializing any worksheet.
pub fn check_template(bytes: &[u8], sheet_name: &str) -> Result<(), ExportError> {
    let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), false)
        .context("parse template workbook")
        .map_err(ExportError::DependencyUnavailable)?;
    ensure_sheet(&book, sheet_name)
}

pub fn ensure_sheet(book: &Spreadsheet, sheet_name: &str) -> Result<(), ExportError> {
    match book.get_sheet_by_name(sheet_name) {
        Some(_) => Ok(()),
        None => Err(ExportError::dependency(anyhow!(
            "sheet {sheet_name} not found in template"
        ))),
    }
}

/// Writes `values` into A1..An of `sheet_name`. Rows past n are not touched.
pub fn fill_column(
    book: &mut Spreadsheet,
    sheet_name: &str,
    values: &[String],
) -> Result<(), ExportError> {
    let sheet = book.get_sheet_by_name_mut(sheet_name).ok_or_else(|| {
        ExportError::dependency(anyhow!("sheet {sheet_name} not found in template"))
    })?;

    for (i, value) in values.iter().enumerate() {
        let addr = cell_ref(0, i as u32 + 1);
        sheet.get_cell_mut(addr.as_str()).set_value_string(value);
    }
    Ok(())
}

/// Opens `bytes`, overwrites column A of `sheet_name` and serializes the result.
pub fn fill_template(
    bytes: &[u8],
    sheet_name: &str,
    values: &[String],
) -> Result<Vec<u8>, ExportError> {
    let mut book = open_template(bytes)?;
    fill_column(&mut book, sheet_name, values)?;
    to_bytes(&book)
}
