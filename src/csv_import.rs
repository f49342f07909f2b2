use std::{
    collections::{BTreeMap, HashSet},
    io,
};

use chrono::{DateTime, Utc};
use csv::QuoteStyle;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    catalog::{
        Catalog, CatalogMetadata, CatalogRecord, DEFAULT_DATA_VERSION, date_stamp, split_tags,
        timestamp,
    },
    config::CatalogConfig,
    error::{CatalogError, CatalogResult},
    io_utils,
};

pub const COL_TABLE_NAME: &str = "Table名稱";
pub const COL_NAME_FALLBACK: &str = "名稱";
pub const COL_MARKET: &str = "市場";
pub const COL_ASPECT: &str = "面向";
pub const COL_CLASS: &str = "類別";
pub const COL_SAMPLE: &str = "樣本";
pub const COL_DESCRIPTION: &str = "描述";
pub const COL_CREATED_AT: &str = "建立時間";
pub const COL_UPDATED_AT: &str = "更新時間";

pub const REQUIRED_COLUMNS: &[&str] = &[COL_TABLE_NAME, COL_MARKET, COL_ASPECT, COL_CLASS, COL_SAMPLE];
pub const SOURCE_CSV_IMPORT: &str = "csv_import";

const TEMPLATE: &str = "\
Table名稱,市場,面向,類別,樣本,描述
台股資產負債表分析,台灣,基本面,001,RSI,分析台股上市櫃公司的資產負債狀況
美股季度財報分析,美國,基本面,002,季度財報,美股標普500公司季度財務表現分析
A股技術指標分析,中國,技術面,\"001, 003\",資金流向,A股市場技術分析和資金流向追蹤（多類別範例）
港股南向資金分析,香港,技術面,004,\"資金流向, 成交量\",港股通南向資金流入流出分析（多樣本範例）
台股外資持股分析,台灣,籌碼面,\"001, 002, 005\",\"外資持股, 持股變化\",外資在台股市場的持股變化追蹤（多類別多樣本範例）
美股機構持股分析,美國,籌碼面,006,投資銀行,美股機構投資者持股分析
A股政策影響分析,中國,消息面,007,貨幣政策,央行政策對A股市場的影響評估
港股IPO分析,香港,消息面,008,新股上市,港股新股上市表現和投資機會分析
";

#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// 1-based line number in the source text.
    pub line: usize,
    pub token_count: usize,
    pub values: BTreeMap<String, String>,
}

impl CsvRow {
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

impl CsvTable {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

/// A single validation finding, renderable without knowing where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl Issue {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            row: None,
            fields: Vec::new(),
        }
    }

    fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub row_count: usize,
    pub column_count: usize,
    pub unique_table_names: usize,
}

pub fn parse(raw: &str) -> CatalogResult<CsvTable> {
    let text = io_utils::strip_bom(raw);
    let mut reader = io_utils::open_csv_reader(text.as_bytes(), io_utils::DEFAULT_CSV_DELIMITER);

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| CatalogError::parse(format!("Malformed CSV: {err}")))?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let tokens = record
            .iter()
            .map(|cell| cell.trim().to_string())
            .collect::<Vec<_>>();
        if tokens.iter().all(String::is_empty) {
            debug!("Line {line} is blank; skipping");
            continue;
        }
        let Some(columns) = headers.as_ref() else {
            headers = Some(tokens);
            continue;
        };
        if tokens.len() != columns.len() {
            warn!(
                "Line {line} has {} field(s), expected {}",
                tokens.len(),
                columns.len()
            );
        }
        let values = columns
            .iter()
            .enumerate()
            .map(|(idx, header)| (header.clone(), tokens.get(idx).cloned().unwrap_or_default()))
            .collect();
        rows.push(CsvRow {
            line,
            token_count: tokens.len(),
            values,
        });
    }

    match headers {
        Some(headers) if !rows.is_empty() => Ok(CsvTable { headers, rows }),
        _ => Err(CatalogError::parse(
            "CSV needs a header line and at least one data line",
        )),
    }
}

pub fn validate(table: &CsvTable, config: &CatalogConfig) -> ValidationReport {
    let mut report = ValidationReport {
        is_valid: false,
        errors: Vec::new(),
        warnings: Vec::new(),
        row_count: table.rows.len(),
        column_count: table.column_count(),
        unique_table_names: 0,
    };

    if table.rows.is_empty() {
        report.errors.push(Issue::new("No data rows"));
        return report;
    }

    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !table.has_column(column))
        .map(|column| column.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        report.errors.push(
            Issue::new(format!("Missing required columns: {}", missing.join(", ")))
                .with_fields(missing),
        );
        return report;
    }

    let mut names = HashSet::new();
    for row in &table.rows {
        if row.token_count != table.column_count() {
            report.warnings.push(
                Issue::new(format!(
                    "Row {} has {} field(s), expected {}",
                    row.line,
                    row.token_count,
                    table.column_count()
                ))
                .at_row(row.line),
            );
        }

        for column in REQUIRED_COLUMNS {
            if row.get(column).is_empty() {
                report.warnings.push(
                    Issue::new(format!("Row {} is missing a value for {column}", row.line))
                        .at_row(row.line)
                        .with_fields(vec![column.to_string()]),
                );
            }
        }

        let name = row.get(COL_TABLE_NAME);
        if !name.is_empty() && !names.insert(name.to_string()) {
            report.warnings.push(
                Issue::new(format!("Duplicate table name: {name}"))
                    .at_row(row.line)
                    .with_fields(vec![COL_TABLE_NAME.to_string()]),
            );
        }

        let market = row.get(COL_MARKET);
        if !market.is_empty() && !config.is_valid_market(market) {
            report.warnings.push(
                Issue::new(format!("Row {} has an unknown market: {market}", row.line))
                    .at_row(row.line)
                    .with_fields(vec![COL_MARKET.to_string()]),
            );
        }

        let aspect = row.get(COL_ASPECT);
        if !aspect.is_empty() && !config.is_valid_aspect(aspect) {
            report.warnings.push(
                Issue::new(format!("Row {} has an unknown aspect: {aspect}", row.line))
                    .at_row(row.line)
                    .with_fields(vec![COL_ASPECT.to_string()]),
            );
        }
    }

    report.unique_table_names = names.len();
    report.is_valid = report.errors.is_empty();
    report
}

pub fn convert(table: &CsvTable) -> Catalog {
    convert_at(table, Utc::now())
}

pub fn convert_at(table: &CsvTable, now: DateTime<Utc>) -> Catalog {
    let stamp = date_stamp(now);
    let records = table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let name = [row.get(COL_TABLE_NAME), row.get(COL_NAME_FALLBACK)]
                .into_iter()
                .find(|candidate| !candidate.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("表格{}", idx + 1));
            CatalogRecord::new(
                format!("table-{}", idx + 1),
                name,
                row.get(COL_MARKET),
                row.get(COL_ASPECT),
                split_tags(row.get(COL_CLASS)),
                split_tags(row.get(COL_SAMPLE)),
            )
            .with_description(row.get(COL_DESCRIPTION))
            .with_dates(&stamp)
        })
        .collect::<Vec<_>>();

    let metadata = CatalogMetadata {
        total_tables: records.len(),
        last_updated: stamp,
        data_version: DEFAULT_DATA_VERSION.to_string(),
        source: SOURCE_CSV_IMPORT.to_string(),
        import_timestamp: Some(timestamp(now)),
        ..CatalogMetadata::default()
    };
    let catalog = Catalog::from_records(records, metadata);
    info!(
        "Converted {} row(s) into {} market(s) and {} aspect(s)",
        catalog.len(),
        catalog.markets.len(),
        catalog.aspects.len()
    );
    catalog
}

pub fn template() -> &'static str {
    TEMPLATE
}

pub fn export_records(records: &[CatalogRecord]) -> CatalogResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record([
        COL_TABLE_NAME,
        COL_MARKET,
        COL_ASPECT,
        COL_CLASS,
        COL_SAMPLE,
        COL_DESCRIPTION,
        COL_CREATED_AT,
        COL_UPDATED_AT,
    ])?;
    for record in records {
        writer.write_record([
            record.name.as_str(),
            record.market.as_str(),
            record.aspect.as_str(),
            record.classes.join(", ").as_str(),
            record.samples.join(", ").as_str(),
            record.description.as_str(),
            record.created_at.as_str(),
            record.updated_at.as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| CatalogError::Io(err.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|err| CatalogError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Table名稱,市場,面向,類別,樣本\nA表,台灣,基本面,001,RSI\nB表,美國,技術面,\"002, 003\",\"RSI, MACD\"";

    #[test]
    fn parse_handles_quoted_multi_value_cells() {
        let table = parse(SAMPLE).expect("parse");
        assert_eq!(table.headers.len(), 5);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].get(COL_CLASS), "002, 003");
        assert_eq!(table.rows[1].line, 3);
    }

    #[test]
    fn parse_requires_header_and_data() {
        let err = parse("Table名稱,市場\n\n").expect_err("header only");
        assert!(err.is_parse());
        assert!(parse("").expect_err("empty").is_parse());
    }

    #[test]
    fn short_rows_pad_with_empty_strings() {
        let table = parse("Table名稱,市場,面向,類別,樣本\nA表,台灣\n").expect("parse");
        let row = &table.rows[0];
        assert_eq!(row.token_count, 2);
        assert_eq!(row.get(COL_SAMPLE), "");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let table = parse("Table名稱,市場\n\nA表,台灣\n , \nB表,美國\n").expect("parse");
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn validate_reports_missing_columns_only() {
        let table = parse("Table名稱,市場\nA表,火星\n").expect("parse");
        let report = validate(&table, &CatalogConfig::default());
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].fields, vec![COL_ASPECT, COL_CLASS, COL_SAMPLE]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn validate_collects_warnings_without_failing() {
        let text = "Table名稱,市場,面向,類別,樣本\nA表,台灣,基本面,001,RSI\nA表,日本,宏觀面,,KD\nC表,台灣,基本面,001\n";
        let report = validate(&parse(text).expect("parse"), &CatalogConfig::default());
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
        assert_eq!(report.row_count, 3);
        assert_eq!(report.column_count, 5);
        assert_eq!(report.unique_table_names, 2);
        let messages = report
            .warnings
            .iter()
            .map(|w| w.message.as_str())
            .collect::<Vec<_>>();
        assert!(messages.contains(&"Row 3 is missing a value for 類別"));
        assert!(messages.contains(&"Duplicate table name: A表"));
        assert!(messages.contains(&"Row 3 has an unknown market: 日本"));
        assert!(messages.contains(&"Row 3 has an unknown aspect: 宏觀面"));
        assert!(messages.contains(&"Row 4 has 4 field(s), expected 5"));
        assert!(messages.contains(&"Row 4 is missing a value for 樣本"));
    }

    #[test]
    fn convert_builds_records_and_options() {
        let catalog = convert(&parse(SAMPLE).expect("parse"));
        assert_eq!(catalog.len(), 2);
        let b = &catalog.table_list[1];
        assert_eq!(b.id, "table-2");
        assert_eq!(b.classes, vec!["002", "003"]);
        assert_eq!(b.samples, vec!["RSI", "MACD"]);
        assert_eq!(catalog.class_options["美國"]["技術面"], vec!["002", "003"]);
        assert_eq!(catalog.metadata.total_tables, 2);
        assert_eq!(catalog.metadata.data_version, "1.0");
        assert_eq!(catalog.metadata.source, "csv_import");
    }

    #[test]
    fn convert_falls_back_for_missing_names() {
        let table = parse("Table名稱,名稱,市場\n,備用名,台灣\n,,台灣\n").expect("parse");
        let catalog = convert(&table);
        assert_eq!(catalog.table_list[0].name, "備用名");
        assert_eq!(catalog.table_list[1].name, "表格2");
    }

    #[test]
    fn template_passes_validation() {
        let table = parse(template()).expect("parse template");
        let report = validate(&table, &CatalogConfig::default());
        assert!(report.is_valid);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.row_count, 8);
    }

    #[test]
    fn export_quotes_multi_value_cells() {
        let catalog = convert(&parse(SAMPLE).expect("parse"));
        let csv = export_records(&catalog.table_list).expect("export");
        let second = csv.lines().nth(2).expect("second record");
        assert!(second.starts_with("B表,美國,技術面,\"002, 003\",\"RSI, MACD\","));
    }
}
