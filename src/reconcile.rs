use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;

use crate::{
    catalog::{Catalog, CatalogRecord, export_file_name, timestamp},
    config::MatchConfig,
    error::{CatalogError, CatalogResult},
    field_list::{ExcelFieldGroup, normalize_table_name},
};

pub const MERGE_EXPORT_PREFIX: &str = "updated_table_data";
const DEFAULT_BASE_VERSION: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyCandidate {
    pub table: CatalogRecord,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub excel_table: ExcelFieldGroup,
    pub exact_match: Option<CatalogRecord>,
    pub fuzzy_matches: Vec<FuzzyCandidate>,
    pub match_type: MatchType,
    pub selected_match: Option<CatalogRecord>,
    pub status: MatchStatus,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched
    }

    pub fn best_similarity(&self) -> Option<f64> {
        self.fuzzy_matches.first().map(|c| c.similarity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub total_tables: usize,
    pub matched_tables: usize,
    pub unmatched_tables: usize,
    pub total_fields_added: usize,
    pub tables_with_fields: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub merged_catalog: Catalog,
    pub summary: MergeSummary,
    pub export: ExportPayload,
}

/// Normalized Levenshtein similarity in `[0, 1]` over trimmed, lower-cased input.
pub fn similarity(left: &str, right: &str) -> f64 {
    let left = left.trim().to_lowercase();
    let right = right.trim().to_lowercase();
    if left == right {
        return 1.0;
    }
    let max_len = left.chars().count().max(right.chars().count());
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let distance = strsim::levenshtein(&left, &right);
    (max_len - distance) as f64 / max_len as f64
}

fn is_exact(record: &CatalogRecord, group: &ExcelFieldGroup) -> bool {
    normalize_table_name(&record.name) == normalize_table_name(&group.table_name)
        || record.name == group.table_name
        || record.name == group.original_table_name
}

fn candidate_score(record: &CatalogRecord, group: &ExcelFieldGroup) -> f64 {
    let normalized = similarity(
        &normalize_table_name(&record.name),
        &normalize_table_name(&group.table_name),
    );
    let original = similarity(&record.name, &group.original_table_name);
    let cleaned = similarity(&record.name, &group.table_name);
    normalized.max(original).max(cleaned)
}

/// One result per group, in input order.
pub fn match_groups(
    groups: &[ExcelFieldGroup],
    records: &[CatalogRecord],
    config: &MatchConfig,
) -> Vec<MatchResult> {
    groups
        .iter()
        .map(|group| {
            if let Some(exact) = records.iter().find(|r| is_exact(r, group)) {
                debug!(
                    "'{}' matched '{}' exactly",
                    group.original_table_name, exact.name
                );
                return MatchResult {
                    excel_table: group.clone(),
                    exact_match: Some(exact.clone()),
                    fuzzy_matches: Vec::new(),
                    match_type: MatchType::Exact,
                    selected_match: Some(exact.clone()),
                    status: MatchStatus::Matched,
                };
            }

            let mut candidates = records
                .iter()
                .map(|record| FuzzyCandidate {
                    similarity: candidate_score(record, group),
                    table: record.clone(),
                })
                .filter(|c| c.similarity > config.threshold)
                .collect::<Vec<_>>();
            candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
            candidates.truncate(config.max_candidates);

            let match_type = if candidates.is_empty() {
                MatchType::None
            } else {
                MatchType::Fuzzy
            };
            debug!(
                "'{}' has {} fuzzy candidate(s)",
                group.original_table_name,
                candidates.len()
            );
            MatchResult {
                excel_table: group.clone(),
                exact_match: None,
                fuzzy_matches: candidates,
                match_type,
                selected_match: None,
                status: MatchStatus::Pending,
            }
        })
        .collect()
}

/// Sets (or clears) the chosen record for `results[index]`; touches nothing else.
pub fn select_match(
    results: &mut [MatchResult],
    index: usize,
    choice: Option<CatalogRecord>,
) -> CatalogResult<()> {
    let len = results.len();
    let result = results
        .get_mut(index)
        .ok_or(CatalogError::MatchIndex { index, len })?;
    result.status = if choice.is_some() {
        MatchStatus::Matched
    } else {
        MatchStatus::Pending
    };
    result.selected_match = choice;
    Ok(())
}

/// Accepts the top fuzzy candidate of each unresolved result scoring at least
/// `min_similarity`. Returns how many results were settled.
pub fn auto_select(results: &mut [MatchResult], min_similarity: f64) -> usize {
    let mut selected = 0;
    for result in results.iter_mut() {
        if result.selected_match.is_some() {
            continue;
        }
        let Some(best) = result.fuzzy_matches.first() else {
            continue;
        };
        if best.similarity >= min_similarity {
            result.selected_match = Some(best.table.clone());
            result.status = MatchStatus::Matched;
            selected += 1;
        }
    }
    selected
}

pub fn merge(results: &[MatchResult], catalog: &Catalog) -> CatalogResult<MergeOutcome> {
    merge_at(results, catalog, Utc::now())
}

pub fn merge_at(
    results: &[MatchResult],
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> CatalogResult<MergeOutcome> {
    let table_list = catalog
        .table_list
        .iter()
        .map(|record| {
            let chosen = results.iter().find(|result| {
                result
                    .selected_match
                    .as_ref()
                    .is_some_and(|selected| selected.id == record.id)
            });
            match chosen {
                Some(result) => {
                    let mut merged = record.clone();
                    merged.fields = Some(result.excel_table.fields.clone());
                    merged
                }
                None => record.clone(),
            }
        })
        .collect::<Vec<_>>();

    let mut merged_catalog = catalog.clone();
    merged_catalog.table_list = table_list;
    let stamp = timestamp(now);
    merged_catalog.metadata.last_updated = stamp.clone();
    merged_catalog.metadata.data_version = bump_version(&catalog.metadata.data_version);
    merged_catalog.metadata.fields_added = Some(true);
    merged_catalog.metadata.fields_added_timestamp = Some(stamp);

    let summary = MergeSummary {
        total_tables: catalog.table_list.len(),
        matched_tables: results.iter().filter(|r| r.is_matched()).count(),
        unmatched_tables: results
            .iter()
            .filter(|r| r.status == MatchStatus::Pending)
            .count(),
        total_fields_added: results
            .iter()
            .filter(|r| r.is_matched())
            .map(|r| r.excel_table.field_count)
            .sum(),
        tables_with_fields: merged_catalog
            .table_list
            .iter()
            .filter(|r| r.field_count() > 0)
            .count(),
    };
    info!(
        "Merged {} matched table(s), {} field(s) added, {} pending",
        summary.matched_tables, summary.total_fields_added, summary.unmatched_tables
    );

    let export = ExportPayload {
        file_name: export_file_name(MERGE_EXPORT_PREFIX, now),
        content: merged_catalog.to_json_string(true)?,
    };
    Ok(MergeOutcome {
        merged_catalog,
        summary,
        export,
    })
}

/// `"1.0"` → `"1.1"`; empty or unreadable versions count as `1.0`.
pub fn bump_version(version: &str) -> String {
    let base = version
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_BASE_VERSION);
    format!("{:.1}", base + 0.1)
}
