use std::{cmp::Ordering, str::FromStr};

use regex::RegexBuilder;
use serde::Serialize;

use crate::catalog::CatalogRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Market,
    Aspect,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDirective {
    pub key: SortKey,
    pub order: SortOrder,
}

impl FromStr for SortDirective {
    type Err = String;

    /// Parses `key[:asc|desc]`, e.g. `name`, `createdAt:desc`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (key, order) = match spec.split_once(':') {
            Some((key, order)) => (key.trim(), order.trim()),
            None => (spec.trim(), "asc"),
        };
        let key = match key.to_ascii_lowercase().as_str() {
            "name" => SortKey::Name,
            "market" => SortKey::Market,
            "aspect" => SortKey::Aspect,
            "createdat" | "created_at" | "created" => SortKey::CreatedAt,
            "updatedat" | "updated_at" | "updated" => SortKey::UpdatedAt,
            other => return Err(format!("Unknown sort key '{other}'")),
        };
        let order = match order.to_ascii_lowercase().as_str() {
            "" | "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => return Err(format!("Unknown sort order '{other}'")),
        };
        Ok(SortDirective { key, order })
    }
}

fn sort_value(record: &CatalogRecord, key: SortKey) -> String {
    match key {
        SortKey::Name => record.name.to_lowercase(),
        SortKey::Market => record.market.to_lowercase(),
        SortKey::Aspect => record.aspect.to_lowercase(),
        SortKey::CreatedAt => record.created_at.clone(),
        SortKey::UpdatedAt => record.updated_at.clone(),
    }
}

/// Stable sort; ties keep their incoming order.
pub fn sort_records<'a>(records: &[&'a CatalogRecord], directive: SortDirective) -> Vec<&'a CatalogRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        let ordering: Ordering = sort_value(a, directive.key).cmp(&sort_value(b, directive.key));
        match directive.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
    /// 1-based index of the first item on the page.
    pub start_index: usize,
    pub end_index: usize,
}

pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> (Vec<T>, Pagination) {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size).min(total_items);
    let end = start.saturating_add(page_size).min(total_items);
    let pagination = Pagination {
        current_page: page,
        page_size,
        total_items,
        total_pages,
        has_next: page < total_pages,
        has_prev: page > 1,
        start_index: start + 1,
        end_index: end,
    };
    (items[start..end].to_vec(), pagination)
}

/// Wraps every case-insensitive occurrence of `term` in `open`/`close`.
pub fn highlight(text: &str, term: &str, open: &str, close: &str) -> String {
    let term = term.trim();
    if term.is_empty() {
        return text.to_string();
    }
    let Ok(pattern) = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    else {
        return text.to_string();
    };
    pattern
        .replace_all(text, |caps: &regex::Captures<'_>| format!("{open}{}{close}", &caps[0]))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<CatalogRecord> {
        ["beta", "Alpha", "gamma"]
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                CatalogRecord::new(format!("t{idx}"), *name, "台灣", "基本面", ["001"], ["RSI"])
                    .with_dates(&format!("2024-01-0{}", 3 - idx))
            })
            .collect()
    }

    #[test]
    fn sorts_case_insensitively() {
        let records = records();
        let refs = records.iter().collect::<Vec<_>>();
        let sorted = sort_records(&refs, "name".parse().expect("directive"));
        let names = sorted.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Alpha", "beta", "gamma"]);

        let sorted = sort_records(&refs, "createdAt:desc".parse().expect("directive"));
        assert_eq!(sorted[0].name, "beta");
    }

    #[test]
    fn rejects_unknown_sort_keys() {
        assert!("size".parse::<SortDirective>().is_err());
        assert!("name:sideways".parse::<SortDirective>().is_err());
    }

    #[test]
    fn paginates_with_bounds() {
        let items = (1..=25).collect::<Vec<_>>();
        let (page, info) = paginate(&items, 3, 10);
        assert_eq!(page, vec![21, 22, 23, 24, 25]);
        assert_eq!(info.total_pages, 3);
        assert!(!info.has_next);
        assert!(info.has_prev);
        assert_eq!((info.start_index, info.end_index), (21, 25));

        let (page, info) = paginate(&items, 9, 10);
        assert!(page.is_empty());
        assert_eq!(info.total_items, 25);
    }

    #[test]
    fn huge_page_numbers_yield_an_empty_page() {
        let (page, info) = paginate(&[1, 2, 3], usize::MAX, 10);
        assert!(page.is_empty());
        assert_eq!(info.total_pages, 1);
        assert!(!info.has_next);

        let (page, _) = paginate(&[1, 2, 3], 2, usize::MAX);
        assert!(page.is_empty());
    }

    #[test]
    fn highlights_case_insensitive_literal() {
        assert_eq!(highlight("MACD and macd", "macd", "[", "]"), "[MACD] and [macd]");
        assert_eq!(highlight("a+b", "+", "<", ">"), "a<+>b");
        assert_eq!(highlight("text", " ", "<", ">"), "text");
    }
}
