//! Export interface: named sets of labeled tabular sheets converted to a
//! spreadsheet workbook and a delimiter-separated text artifact.
//!
//! Both conversions are one-shot and in-memory; a failure is terminal for
//! that export action only and leaves no partial artifact behind.

use rust_xlsxwriter::Workbook;
use serde::Serialize;

use crate::aggregate::{BucketSet, FunnelStage};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("workbook generation failed: {0}")]
    Workbook(String),
    #[error("text artifact generation failed: {0}")]
    Delimited(String),
}

/// A single cell; everything the dashboard exports is scalar or string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<u64> for Cell {
    fn from(v: u64) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl Cell {
    fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// One labeled table: a header row plus data rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(title: impl Into<String>, header: &[&str]) -> Self {
        Self {
            title: title.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }
}

/// A named export: the sheets become worksheets in the workbook and
/// titled sections in the delimited artifact.
#[derive(Debug, Clone)]
pub struct SheetSet {
    pub name: String,
    pub sheets: Vec<Sheet>,
}

impl SheetSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), sheets: Vec::new() }
    }

    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// Render the whole set as an xlsx workbook.
    pub fn to_xlsx(&self) -> Result<Vec<u8>, ExportError> {
        let mut workbook = Workbook::new();

        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(&sheet.title)
                .map_err(|e| ExportError::Workbook(e.to_string()))?;

            for (col, title) in sheet.header.iter().enumerate() {
                worksheet
                    .write_string(0, col as u16, title.as_str())
                    .map_err(|e| ExportError::Workbook(e.to_string()))?;
            }
            for (r, row) in sheet.rows.iter().enumerate() {
                let r = (r + 1) as u32;
                for (c, cell) in row.iter().enumerate() {
                    let c = c as u16;
                    match cell {
                        Cell::Text(s) => worksheet.write_string(r, c, s.as_str()),
                        Cell::Int(i) => worksheet.write_number(r, c, *i as f64),
                        Cell::Float(f) => worksheet.write_number(r, c, *f),
                        Cell::Empty => continue,
                    }
                    .map_err(|e| ExportError::Workbook(e.to_string()))?;
                }
            }
        }

        workbook
            .save_to_buffer()
            .map_err(|e| ExportError::Workbook(e.to_string()))
    }

    /// Render the whole set as one delimiter-separated text artifact;
    /// sheets are separated by a title record and a blank line.
    pub fn to_delimited(&self, delimiter: u8) -> Result<Vec<u8>, ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(Vec::new());

        for (i, sheet) in self.sheets.iter().enumerate() {
            if i > 0 {
                writer
                    .write_record([""])
                    .map_err(|e| ExportError::Delimited(e.to_string()))?;
            }
            writer
                .write_record([sheet.title.as_str()])
                .map_err(|e| ExportError::Delimited(e.to_string()))?;
            writer
                .write_record(&sheet.header)
                .map_err(|e| ExportError::Delimited(e.to_string()))?;
            for row in &sheet.rows {
                let record: Vec<String> = row.iter().map(Cell::as_text).collect();
                writer
                    .write_record(&record)
                    .map_err(|e| ExportError::Delimited(e.to_string()))?;
            }
        }

        writer
            .into_inner()
            .map_err(|e| ExportError::Delimited(e.to_string()))
    }
}

/// Sheet from a bucket breakdown.
pub fn bucket_sheet(title: &str, set: &BucketSet) -> Sheet {
    let mut sheet = Sheet::new(title, &["Label", "Count", "Percent"]);
    for bucket in &set.buckets {
        sheet.push_row(vec![
            Cell::from(bucket.label.as_str()),
            Cell::from(bucket.count),
            Cell::from(bucket.pct),
        ]);
    }
    sheet
}

/// Sheet from funnel stages; the percentage basis is spelled out per row.
pub fn funnel_sheet(title: &str, stages: &[FunnelStage]) -> Sheet {
    let mut sheet = Sheet::new(title, &["Stage", "Count", "Percent", "Basis"]);
    for stage in stages {
        let basis = match stage.basis {
            crate::aggregate::PercentBasis::PreviousStage => "previous-stage",
            crate::aggregate::PercentBasis::TopOfFunnel => "top-of-funnel",
        };
        sheet.push_row(vec![
            Cell::from(stage.label.as_str()),
            Cell::from(stage.count),
            Cell::from(stage.pct),
            Cell::from(basis),
        ]);
    }
    sheet
}
