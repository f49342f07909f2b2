use std::collections::HashMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{FieldSpec, FieldType},
    error::{CatalogError, CatalogResult},
};

pub const HEADER_TABLE_ID: &str = "ID";
pub const HEADER_TABLE_NAME: &str = "資料表";
pub const HEADER_FIELD_NAME: &str = "欄位名稱";
pub const DEFAULT_FILE_NAME: &str = "uploaded_file.xlsx";

/// Fields containing one of these move to the end, in this order.
pub const TRAILING_FIELD_PRIORITY: &[&str] = &[
    "代號", "名稱", "股票代號", "股票名稱", "日期", "年月", "年季", "年度", "RTIME",
];

const DATE_HINTS: &[&str] = &["日期", "時間", "date", "time"];
const NUMBER_HINTS: &[&str] = &["價", "量", "率", "%", "金額", "數量", "比例", "指數"];
const BOOLEAN_HINTS: &[&str] = &["是否", "標記"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn single(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            sheets: vec![Sheet {
                name: name.into(),
                rows,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcelFieldGroup {
    pub sheet_name: String,
    pub table_id: String,
    /// Normalized with [`normalize_table_name`].
    pub table_name: String,
    pub original_table_name: String,
    pub fields: Vec<FieldSpec>,
    pub field_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingDetails {
    pub total_rows_processed: usize,
    pub sheets_processed: usize,
    pub tables_found: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldListImport {
    pub file_name: String,
    pub sheets: usize,
    pub tables: Vec<ExcelFieldGroup>,
    pub total_fields: usize,
    pub processing_details: ProcessingDetails,
}

pub fn parse(workbook: &Workbook) -> CatalogResult<FieldListImport> {
    parse_named(workbook, DEFAULT_FILE_NAME)
}

pub fn parse_named(workbook: &Workbook, file_name: &str) -> CatalogResult<FieldListImport> {
    let mut tables = Vec::new();
    let mut total_rows = 0usize;

    for sheet in &workbook.sheets {
        let mut groups: Vec<ExcelFieldGroup> = Vec::new();
        let mut positions: HashMap<(String, String), usize> = HashMap::new();

        for (row_idx, row) in sheet.rows.iter().enumerate() {
            let Some((table_id, table_name, field_name)) = field_row(row) else {
                debug!("Sheet '{}' row {} skipped", sheet.name, row_idx + 1);
                continue;
            };
            let key = (table_id.to_string(), table_name.to_string());
            let position = *positions.entry(key).or_insert_with(|| {
                groups.push(ExcelFieldGroup {
                    sheet_name: sheet.name.clone(),
                    table_id: table_id.to_string(),
                    table_name: normalize_table_name(table_name),
                    original_table_name: table_name.to_string(),
                    fields: Vec::new(),
                    field_count: 0,
                });
                groups.len() - 1
            });
            let field_type = infer_type(&field_name);
            groups[position]
                .fields
                .push(FieldSpec::new(field_name, field_type));
            total_rows += 1;
        }

        for mut group in groups {
            if group.fields.is_empty() {
                continue;
            }
            group.fields = sort_fields(group.fields);
            group.field_count = group.fields.len();
            tables.push(group);
        }
    }

    if tables.is_empty() {
        warn!("No field rows found across {} sheet(s)", workbook.sheets.len());
        return Err(CatalogError::parse(
            "No table fields found; expected rows of (table id, table name, field name)",
        ));
    }

    let total_fields = tables.iter().map(|t| t.field_count).sum();
    info!(
        "Parsed {} table(s) with {} field(s) from {} sheet(s)",
        tables.len(),
        total_fields,
        workbook.sheets.len()
    );
    Ok(FieldListImport {
        file_name: file_name.to_string(),
        sheets: workbook.sheets.len(),
        processing_details: ProcessingDetails {
            total_rows_processed: total_rows,
            sheets_processed: workbook.sheets.len(),
            tables_found: tables.len(),
        },
        total_fields,
        tables,
    })
}

/// Extracts `(table id, table name, field name)` or `None` when the row is unusable.
fn field_row(row: &[String]) -> Option<(&str, &str, String)> {
    if row.len() < 3 {
        return None;
    }
    let table_id = row[0].trim();
    let table_name = row[1].trim();
    let raw_field = row[2].trim();
    if table_id.is_empty() || table_name.is_empty() || raw_field.is_empty() {
        return None;
    }
    if table_id == HEADER_TABLE_ID
        || table_name == HEADER_TABLE_NAME
        || raw_field == HEADER_FIELD_NAME
    {
        return None;
    }
    let field_name = strip_brackets(raw_field).trim();
    if field_name.is_empty() {
        return None;
    }
    Some((table_id, table_name, field_name.to_string()))
}

fn strip_brackets(value: &str) -> &str {
    let value = value.strip_prefix('[').unwrap_or(value);
    value.strip_suffix(']').unwrap_or(value)
}

/// Keeps ASCII word characters and CJK ideographs, lower-cased.
pub fn normalize_table_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || ('\u{4e00}'..='\u{9fff}').contains(c))
        .collect::<String>()
        .to_lowercase()
}

pub fn infer_type(field_name: &str) -> FieldType {
    let lowered = field_name.to_lowercase();
    if DATE_HINTS.iter().any(|hint| lowered.contains(hint)) || lowered == "rtime" {
        FieldType::Date
    } else if NUMBER_HINTS.iter().any(|hint| lowered.contains(hint)) {
        FieldType::Number
    } else if BOOLEAN_HINTS.iter().any(|hint| lowered.contains(hint)) {
        FieldType::Boolean
    } else {
        FieldType::String
    }
}

fn trailing_rank(field_name: &str) -> Option<usize> {
    TRAILING_FIELD_PRIORITY
        .iter()
        .position(|term| field_name.contains(term))
}

/// Moves identifier and period fields to the end; stable otherwise.
pub fn sort_fields(fields: Vec<FieldSpec>) -> Vec<FieldSpec> {
    let (mut trailing, mut leading): (Vec<_>, Vec<_>) = fields
        .into_iter()
        .partition(|field| trailing_rank(&field.name).is_some());
    trailing.sort_by_key(|field| trailing_rank(&field.name));
    leading.extend(trailing);
    leading
}
