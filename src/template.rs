//! Data-entry template synthesis.
//!
//! The generated workbook has one visible sheet laid out by [`Schema`] and up to
//! four `veryHidden` lookup sheets feeding its dropdowns. Every pre-filled row
//! carries the same validations, number formats and per-row formulas.

use std::io::Cursor;

use anyhow::{Context, anyhow};
use umya_spreadsheet::structs::{
    DataValidation, DataValidationValues, DataValidations, PatternValues, SequenceOfReferences,
    VerticalAlignmentValues,
};
use umya_spreadsheet::{Spreadsheet, Style};

use crate::error::ExportError;
use crate::lookup::LookupData;
use crate::schema::{
    CATEGORY_DIVIDER, Schema, TASK_DIVIDER, cell_ref, column_letter, column_range,
};

pub const DATA_SHEET: &str = "Sheet1";
pub const DEFAULT_PREFILL_ROWS: u32 = 1000;

/// Last row an xlsx worksheet can address.
pub const MAX_ROW: u32 = 1_048_576;

/// Formula source meaning "no values to offer".
pub const EMPTY_SOURCE: &str = "\"\"";

const LOOKUP_SHEET_STATE: &str = "veryHidden";
const PERCENT_FORMAT: &str = "0.00%";
const DIVIDER_WIDTH: f64 = 2.0;
const MAN_DAY_HOURS: u32 = 8;

// umya turns an ARGB that matches one of its indexed colours into indexed="n";
// lowercase keeps it written as rgb.
const DIVIDER_ARGB: &str = "ffffff00";

/// Where a dropdown takes its allowed values from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropdownSource {
    /// Range reference into a lookup sheet, or [`EMPTY_SOURCE`].
    Range(String),
    Values(&'static [&'static str]),
}

impl DropdownSource {
    pub fn formula(&self) -> String {
        match self {
            Self::Range(range) => range.clone(),
            Self::Values(values) => format!("\"{}\"", values.join(",")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dropdown {
    pub header: String,
    pub column: usize,
    pub source: DropdownSource,
}

/// Range formulas returned by the four lookup sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRanges {
    pub project: String,
    pub task: String,
    pub category: String,
    pub unit: String,
}

/// Writes `values` under `header` into a new hidden sheet and returns the range
/// a dropdown can point at. An empty list creates nothing and yields [`EMPTY_SOURCE`].
pub fn create_lookup_sheet(
    book: &mut Spreadsheet,
    sheet_name: &str,
    header: &str,
    values: &[String],
) -> Result<String, ExportError> {
    if values.is_empty() {
        return Ok(EMPTY_SOURCE.to_string());
    }

    let sheet = book
        .new_sheet(sheet_name)
        .map_err(|e| ExportError::unexpected(anyhow!("cannot create sheet {sheet_name}: {e}")))?;

    sheet.get_cell_mut("A1").set_value_string(header);
    for (i, value) in values.iter().enumerate() {
        let addr = cell_ref(0, i as u32 + 2);
        sheet.get_cell_mut(addr.as_str()).set_value_string(value);
    }
    sheet.set_sheet_state(LOOKUP_SHEET_STATE.to_string());

    Ok(format!("{sheet_name}!$A$2:$A${}", values.len() + 1))
}

fn create_lookup_sheets(
    book: &mut Spreadsheet,
    lookups: &LookupData,
) -> Result<LookupRanges, ExportError> {
    Ok(LookupRanges {
        project: create_lookup_sheet(book, "ProjectLookup", "projectCode", &lookups.projects)?,
        task: create_lookup_sheet(book, "TaskLookup", "taskName", &lookups.tasks)?,
        category: create_lookup_sheet(book, "CategoryLookup", "category", &lookups.categories)?,
        unit: create_lookup_sheet(book, "UnitLookup", "unitName", &lookups.units)?,
    })
}

/// Resolves every constrained header to its column.
pub fn dropdown_bindings(
    schema: &Schema,
    ranges: &LookupRanges,
) -> Result<Vec<Dropdown>, ExportError> {
    let mut pairs: Vec<(String, DropdownSource)> = vec![
        ("projectCode".into(), DropdownSource::Range(ranges.project.clone())),
        ("workGroup".into(), DropdownSource::Values(&["Direct", "Indirect"])),
        ("isDeleted".into(), DropdownSource::Values(&["Yes", "No"])),
        ("subcontractorActivity".into(), DropdownSource::Values(&["Yes", "No"])),
        ("unitSymbol".into(), DropdownSource::Range(ranges.unit.clone())),
    ];
    for slot in schema.task_slots() {
        pairs.push((slot.name, DropdownSource::Range(ranges.task.clone())));
    }
    for slot in schema.category_slots() {
        pairs.push((slot.name, DropdownSource::Range(ranges.category.clone())));
    }

    pairs
        .into_iter()
        .map(|(header, source)| {
            let column = schema.position(&header)?;
            Ok(Dropdown {
                header,
                column,
                source,
            })
        })
        .collect()
}

/// Category block as absolute column indices, first name column to last rate column.
fn category_block(schema: &Schema) -> Result<(usize, usize), ExportError> {
    let first = schema
        .category_slots()
        .into_iter()
        .next()
        .map(|slot| slot.name)
        .ok_or_else(|| ExportError::SchemaIntegrity("WorkmenCategory1Name".into()))?;
    let start = schema.position(&first)?;
    Ok((start, start + schema.category_span() - 1))
}

fn row_range(first: usize, last: usize, row: u32) -> String {
    format!("{}:{}", cell_ref(first, row), cell_ref(last, row))
}

fn blank_when_zero(aggregate: &str) -> String {
    format!("IFERROR(IF({aggregate}=0,\"\",{aggregate}),\"\")")
}

/// Pairs each column `c` of the block where `COLUMN() mod 3 = 0` with column `c + 1`
/// and sums their products. Text cells count as zero.
pub fn unit_rate_formula(start: usize, end: usize, row: u32) -> String {
    let block = row_range(start, end, row);
    let shifted = row_range(start + 1, end + 1, row);
    let aggregate = format!(
        "SUMPRODUCT((MOD(COLUMN({block}),3)=0)*IF(ISNUMBER({block}),{block},0),\
         (MOD(COLUMN({shifted}),3)=1)*IF(ISNUMBER({shifted}),{shifted},0))"
    );
    blank_when_zero(&aggregate)
}

/// Sums the hours column of every category triplet and converts to man-days.
pub fn productivity_formula(start: usize, end: usize, row: u32) -> String {
    let block = row_range(start, end, row);
    let origin = start + 1;
    let aggregate = format!(
        "SUMPRODUCT((MOD(COLUMN({block})-{origin},3)=1)*IF(ISNUMBER({block}),{block},0))/{MAN_DAY_HOURS}"
    );
    blank_when_zero(&aggregate)
}

fn divider_style() -> Style {
    let mut style = Style::default();
    style
        .get_fill_mut()
        .get_pattern_fill_mut()
        .set_pattern_type(PatternValues::Solid);
    style
        .get_fill_mut()
        .get_pattern_fill_mut()
        .get_foreground_color_mut()
        .set_argb(DIVIDER_ARGB);
    style
        .get_fill_mut()
        .get_pattern_fill_mut()
        .get_background_color_mut()
        .set_argb(DIVIDER_ARGB);
    style
        .get_alignment_mut()
        .set_vertical(VerticalAlignmentValues::Top);
    style.get_alignment_mut().set_wrap_text(true);
    style
}

/// Builds the data-entry workbook with `prefill_rows` blank rows under the header.
pub fn build_template(
    schema: &Schema,
    lookups: &LookupData,
    prefill_rows: u32,
) -> Result<Spreadsheet, ExportError> {
    let headers = schema.headers();
    let last_row = prefill_rows
        .checked_add(1)
        .filter(|&row| row <= MAX_ROW)
        .ok_or_else(|| {
            ExportError::unexpected(anyhow!("{prefill_rows} prefill rows exceed the sheet size"))
        })?;

    let mut book = umya_spreadsheet::new_file();
    {
        let sheet = book
            .get_sheet_by_name_mut(DATA_SHEET)
            .ok_or_else(|| ExportError::unexpected(anyhow!("new workbook has no {DATA_SHEET}")))?;
        for (i, header) in headers.iter().enumerate() {
            sheet.get_cell_mut(cell_ref(i, 1).as_str()).set_value_string(header);
        }
    }

    let ranges = create_lookup_sheets(&mut book, lookups)?;

    let sheet = book
        .get_sheet_by_name_mut(DATA_SHEET)
        .ok_or_else(|| ExportError::unexpected(anyhow!("workbook lost {DATA_SHEET}")))?;

    for row in 2..=last_row {
        for i in 0..headers.len() {
            sheet.get_cell_mut(cell_ref(i, row).as_str()).set_value_string("");
        }
    }

    let mut validations = DataValidations::default();
    for dropdown in dropdown_bindings(schema, &ranges)? {
        let mut refs = SequenceOfReferences::default();
        refs.set_sqref(column_range(dropdown.column, 2, last_row));

        let mut validation = DataValidation::default();
        validation.set_type(DataValidationValues::List);
        validation.set_allow_blank(true);
        validation.set_formula1(dropdown.source.formula());
        validation.set_sequence_of_references(refs);
        validations.add_data_validation_list(validation);
    }
    sheet.set_data_validations(validations);

    let style = divider_style();
    for divider in [TASK_DIVIDER, CATEGORY_DIVIDER] {
        let column = schema.position(divider)?;
        sheet.add_merge_cells(column_range(column, 1, last_row));
        sheet
            .get_cell_mut(cell_ref(column, 1).as_str())
            .set_style(style.clone());
        sheet
            .get_column_dimension_mut(&column_letter(column))
            .set_width(DIVIDER_WIDTH);
    }

    let percent_columns: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, header)| header.ends_with("Weightage"))
        .map(|(i, _)| i)
        .collect();
    let unit_rate = schema.position("unitRate")?;
    let productivity = schema.position("producitivityPerManDay")?;
    let (start, end) = category_block(schema)?;

    for row in 2..=last_row {
        for &column in &percent_columns {
            sheet
                .get_style_mut(cell_ref(column, row).as_str())
                .get_number_format_mut()
                .set_format_code(PERCENT_FORMAT);
        }
        sheet
            .get_cell_mut(cell_ref(unit_rate, row).as_str())
            .set_formula(unit_rate_formula(start, end, row));
        sheet
            .get_cell_mut(cell_ref(productivity, row).as_str())
            .set_formula(productivity_formula(start, end, row));
    }

    for i in 0..headers.len() {
        sheet
            .get_style_mut(cell_ref(i, 1).as_str())
            .get_font_mut()
            .set_bold(true);
    }

    Ok(book)
}

/// Serializes a workbook into an in-memory xlsx file.
pub fn to_bytes(book: &Spreadsheet) -> Result<Vec<u8>, ExportError> {
    let mut cursor = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(book, &mut cursor)
        .context("serialize workbook")
        .map_err(ExportError::Unexpected)?;
    Ok(cursor.into_inner())
}
