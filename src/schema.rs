//! Column layout of the data-entry sheet.
//!
//! Other steps never cache positions: they ask [`Schema::position`] for a
//! header by name, so the order produced by [`Schema::headers`] is the only
//! source of truth for column letters and formula ranges.

use crate::error::ExportError;

const BASE_HEADERS: [&str; 13] = [
    "projectCode",
    "mainActivityCode",
    "mainActivityName",
    "subActivityCode",
    "subActivityName",
    "activityCode",
    "activityName",
    "workGroup",
    "isDeleted",
    "subcontractorActivity",
    "unitSymbol",
    "unitRate",
    "producitivityPerManDay",
];

pub const CATEGORY_DIVIDER: &str = "categoryDetails";
pub const TASK_DIVIDER: &str = "taskDetails";

/// Fields repeated for every category slot: name, hours, rate per hour.
pub const CATEGORY_FIELDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub task_count: usize,
    pub category_count: usize,
}

/// Header names of one task slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSlot {
    pub name: String,
    pub weightage: String,
}

/// Header names of one category slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySlot {
    pub name: String,
    pub hours: String,
    pub rate: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            task_count: 3,
            category_count: 3,
        }
    }
}

impl Schema {
    pub fn new(task_count: usize, category_count: usize) -> Self {
        Self {
            task_count,
            category_count,
        }
    }

    /// The first slot is the prime task, the rest are `SubTask1..`.
    pub fn task_slots(&self) -> Vec<TaskSlot> {
        (0..self.task_count)
            .map(|i| {
                let prefix = if i == 0 {
                    "PrimeTask".to_string()
                } else {
                    format!("SubTask{i}")
                };
                TaskSlot {
                    name: format!("{prefix}Name"),
                    weightage: format!("{prefix}Weightage"),
                }
            })
            .collect()
    }

    pub fn category_slots(&self) -> Vec<CategorySlot> {
        (1..=self.category_count)
            .map(|n| CategorySlot {
                name: format!("WorkmenCategory{n}Name"),
                hours: format!("WorkmenCategory{n}Hrs"),
                rate: format!("WorkmenCategory{n}RatePerHour"),
            })
            .collect()
    }

    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = BASE_HEADERS.iter().map(|h| h.to_string()).collect();

        headers.push(CATEGORY_DIVIDER.to_string());
        for slot in self.category_slots() {
            headers.extend([slot.name, slot.hours, slot.rate]);
        }

        headers.push(TASK_DIVIDER.to_string());
        for slot in self.task_slots() {
            headers.extend([slot.name, slot.weightage]);
        }

        headers
    }

    /// Zero-based column index of `header`.
    pub fn position(&self, header: &str) -> Result<usize, ExportError> {
        self.headers()
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| ExportError::SchemaIntegrity(header.to_string()))
    }

    /// Number of columns spanned by all category slots.
    pub fn category_span(&self) -> usize {
        self.category_count * CATEGORY_FIELDS
    }
}

/// 0 -> A, 25 -> Z, 26 -> AA ...
pub fn column_letter(index: usize) -> String {
    let mut column = index + 1;
    let mut name = String::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        name.insert(0, (b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    name
}

/// A1-style reference for a zero-based column and a one-based row.
pub fn cell_ref(index: usize, row: u32) -> String {
    format!("{}{}", column_letter(index), row)
}

/// `X{first}:X{last}` for a single column.
pub fn column_range(index: usize, first_row: u32, last_row: u32) -> String {
    let letter = column_letter(index);
    format!("{letter}{first_row}:{letter}{last_row}")
}
