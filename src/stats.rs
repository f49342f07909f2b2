use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::{Catalog, CatalogRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatistics {
    pub overview: Overview,
    pub distribution: Distribution,
    pub data_quality: DataQuality,
    pub coverage: Coverage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_tables: usize,
    pub total_markets: usize,
    pub total_aspects: usize,
    pub total_classes: usize,
    pub total_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub by_market: Vec<ShareBucket>,
    pub by_aspect: Vec<ShareBucket>,
    pub by_class: Vec<CountBucket>,
    pub by_sample: Vec<CountBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareBucket {
    pub name: String,
    pub count: usize,
    /// Share of all records, one decimal place.
    pub percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountBucket {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub complete_tables: usize,
    pub incomplete_tables: usize,
    pub duplicate_names: usize,
    pub multi_class_tables: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub market_coverage: String,
    pub aspect_coverage: String,
}

pub fn statistics(catalog: &Catalog) -> CatalogStatistics {
    let records = &catalog.table_list;
    let total = records.len();

    let by_market = share_buckets(&catalog.markets, total, |r, m| r.market == m, records);
    let by_aspect = share_buckets(&catalog.aspects, total, |r, a| r.aspect == a, records);
    let by_class = tag_counts(records, |r| &r.classes);
    let by_sample = tag_counts(records, |r| &r.samples);

    let complete_tables = records.iter().filter(|r| is_complete(r)).count();
    let distinct_names = records
        .iter()
        .map(|r| r.name.as_str())
        .collect::<HashSet<_>>()
        .len();

    let coverage = Coverage {
        market_coverage: coverage_percent(&by_market),
        aspect_coverage: coverage_percent(&by_aspect),
    };

    CatalogStatistics {
        overview: Overview {
            total_tables: total,
            total_markets: catalog.markets.len(),
            total_aspects: catalog.aspects.len(),
            total_classes: by_class.len(),
            total_samples: by_sample.len(),
        },
        data_quality: DataQuality {
            complete_tables,
            incomplete_tables: total - complete_tables,
            duplicate_names: total - distinct_names,
            multi_class_tables: records.iter().filter(|r| r.classes.len() > 1).count(),
        },
        distribution: Distribution {
            by_market,
            by_aspect,
            by_class,
            by_sample,
        },
        coverage,
    }
}

fn is_complete(record: &CatalogRecord) -> bool {
    !record.name.is_empty()
        && !record.market.is_empty()
        && !record.aspect.is_empty()
        && !record.classes.is_empty()
        && !record.samples.is_empty()
}

fn share_buckets(
    names: &[String],
    total: usize,
    matches: impl Fn(&CatalogRecord, &str) -> bool,
    records: &[CatalogRecord],
) -> Vec<ShareBucket> {
    names
        .iter()
        .map(|name| {
            let count = records.iter().filter(|r| matches(r, name)).count();
            ShareBucket {
                name: name.clone(),
                count,
                percentage: percent(count, total),
            }
        })
        .collect()
}

/// Counts tag membership; a record with N tags lands in N buckets.
fn tag_counts(
    records: &[CatalogRecord],
    tags: impl Fn(&CatalogRecord) -> &Vec<String>,
) -> Vec<CountBucket> {
    let mut buckets: Vec<CountBucket> = Vec::new();
    for record in records {
        for tag in tags(record) {
            match buckets.iter_mut().find(|b| &b.name == tag) {
                Some(bucket) => bucket.count += 1,
                None => buckets.push(CountBucket {
                    name: tag.clone(),
                    count: 1,
                }),
            }
        }
    }
    buckets
}

fn coverage_percent(buckets: &[ShareBucket]) -> String {
    let covered = buckets.iter().filter(|b| b.count > 0).count();
    percent(covered, buckets.len())
}

pub fn percent(count: usize, total: usize) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", count as f64 / total as f64 * 100.0)
}

/// Flattens the report into `section, name, count, percent` rows for table output.
pub fn render_rows(stats: &CatalogStatistics) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for bucket in &stats.distribution.by_market {
        rows.push(share_row("market", bucket));
    }
    for bucket in &stats.distribution.by_aspect {
        rows.push(share_row("aspect", bucket));
    }
    let total = stats.overview.total_tables;
    for bucket in &stats.distribution.by_class {
        rows.push(count_row("class", bucket, total));
    }
    for bucket in &stats.distribution.by_sample {
        rows.push(count_row("sample", bucket, total));
    }
    rows
}

fn share_row(section: &str, bucket: &ShareBucket) -> Vec<String> {
    vec![
        section.to_string(),
        bucket.name.clone(),
        bucket.count.to_string(),
        format!("{}%", bucket.percentage),
    ]
}

fn count_row(section: &str, bucket: &CountBucket, total: usize) -> Vec<String> {
    vec![
        section.to_string(),
        bucket.name.clone(),
        bucket.count.to_string(),
        format!("{}%", percent(bucket.count, total)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogMetadata, CatalogRecord};

    fn catalog() -> Catalog {
        Catalog::from_records(
            vec![
                CatalogRecord::new("t1", "A", "台灣", "基本面", ["001", "002"], ["RSI"]),
                CatalogRecord::new("t2", "A", "台灣", "技術面", ["001"], ["MACD"]),
                CatalogRecord::new("t3", "C", "美國", "基本面", ["003"], Vec::<String>::new()),
            ],
            CatalogMetadata::default(),
        )
    }

    #[test]
    fn distribution_counts_multi_membership() {
        let stats = statistics(&catalog());
        assert_eq!(stats.overview.total_tables, 3);
        assert_eq!(stats.distribution.by_market[0].name, "台灣");
        assert_eq!(stats.distribution.by_market[0].count, 2);
        assert_eq!(stats.distribution.by_market[0].percentage, "66.7");
        assert_eq!(stats.distribution.by_market[1].percentage, "33.3");
        let class_001 = stats
            .distribution
            .by_class
            .iter()
            .find(|b| b.name == "001")
            .expect("class 001");
        assert_eq!(class_001.count, 2);
        assert_eq!(stats.overview.total_classes, 3);
        assert_eq!(stats.overview.total_samples, 2);
    }

    #[test]
    fn quality_counts() {
        let stats = statistics(&catalog());
        assert_eq!(stats.data_quality.complete_tables, 2);
        assert_eq!(stats.data_quality.incomplete_tables, 1);
        assert_eq!(stats.data_quality.duplicate_names, 1);
        assert_eq!(stats.data_quality.multi_class_tables, 1);
        assert_eq!(stats.coverage.market_coverage, "100.0");
    }

    #[test]
    fn empty_catalog_has_zero_percentages() {
        let stats = statistics(&Catalog::default());
        assert_eq!(stats.overview.total_tables, 0);
        assert_eq!(stats.coverage.aspect_coverage, "0.0");
        assert!(render_rows(&stats).is_empty());
    }
}
