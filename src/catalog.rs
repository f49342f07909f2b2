use std::{collections::BTreeMap, fs, path::Path};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::CatalogResult;

pub const DEFAULT_DATA_VERSION: &str = "1.0";

/// `market -> aspect -> classes`, classes kept in first-seen order.
pub type ClassOptions = BTreeMap<String, BTreeMap<String, Vec<String>>>;
/// `class -> samples`, samples kept in first-seen order.
pub type SampleOptions = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Date,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub searchable: bool,
}

fn default_true() -> bool {
    true
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: String::new(),
            searchable: true,
        }
    }
}

/// One data table listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRecord")]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    pub market: String,
    pub aspect: String,
    pub classes: Vec<String>,
    pub samples: Vec<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldSpec>>,
    pub created_at: String,
    pub updated_at: String,
}

impl CatalogRecord {
    /// Builds a record; tags are trimmed, de-duplicated and stripped of empties.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        market: impl Into<String>,
        aspect: impl Into<String>,
        classes: impl IntoIterator<Item = impl AsRef<str>>,
        samples: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            market: market.into(),
            aspect: aspect.into(),
            classes: clean_tags(classes),
            samples: clean_tags(samples),
            description: String::new(),
            fields: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dates(mut self, stamp: &str) -> Self {
        self.created_at = stamp.to_string();
        self.updated_at = stamp.to_string();
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn field_count(&self) -> usize {
        self.fields.as_ref().map_or(0, Vec::len)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn has_sample(&self, sample: &str) -> bool {
        self.samples.iter().any(|s| s == sample)
    }
}

/// Wire shape accepted on load. Older exports carried a single `class` /
/// `sample` string instead of the `classes` / `samples` lists.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    market: String,
    #[serde(default)]
    aspect: String,
    classes: Option<Vec<String>>,
    class: Option<String>,
    samples: Option<Vec<String>>,
    sample: Option<String>,
    #[serde(default)]
    description: Option<String>,
    fields: Option<Vec<FieldSpec>>,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

impl From<RawRecord> for CatalogRecord {
    fn from(raw: RawRecord) -> Self {
        let classes = match (raw.classes, raw.class) {
            (Some(list), _) => list,
            (None, Some(single)) => split_tags(&single),
            (None, None) => Vec::new(),
        };
        let samples = match (raw.samples, raw.sample) {
            (Some(list), _) => list,
            (None, Some(single)) => split_tags(&single),
            (None, None) => Vec::new(),
        };
        let mut record =
            CatalogRecord::new(raw.id, raw.name, raw.market, raw.aspect, classes, samples)
                .with_description(raw.description.unwrap_or_default());
        record.fields = raw.fields;
        record.created_at = raw.created_at;
        record.updated_at = raw.updated_at;
        record
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogMetadata {
    pub total_tables: usize,
    pub last_updated: String,
    pub data_version: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_added: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_added_timestamp: Option<String>,
}

impl Default for CatalogMetadata {
    fn default() -> Self {
        Self {
            total_tables: 0,
            last_updated: String::new(),
            data_version: DEFAULT_DATA_VERSION.to_string(),
            source: String::new(),
            import_timestamp: None,
            fields_added: None,
            fields_added_timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub markets: Vec<String>,
    #[serde(default)]
    pub aspects: Vec<String>,
    #[serde(default)]
    pub class_options: ClassOptions,
    #[serde(default)]
    pub sample_options: SampleOptions,
    #[serde(default)]
    pub table_list: Vec<CatalogRecord>,
    #[serde(default)]
    pub metadata: CatalogMetadata,
}

/// The taxonomy caches derived from a record list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaxonomyOptions {
    pub markets: Vec<String>,
    pub aspects: Vec<String>,
    pub class_options: ClassOptions,
    pub sample_options: SampleOptions,
}

pub fn derive_options(records: &[CatalogRecord]) -> TaxonomyOptions {
    let markets = records
        .iter()
        .map(|r| r.market.as_str())
        .filter(|m| !m.is_empty())
        .unique()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let aspects = records
        .iter()
        .map(|r| r.aspect.as_str())
        .filter(|a| !a.is_empty())
        .unique()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut class_options = ClassOptions::new();
    for record in records {
        if record.market.is_empty() || record.aspect.is_empty() || record.classes.is_empty() {
            continue;
        }
        let bucket = class_options
            .entry(record.market.clone())
            .or_default()
            .entry(record.aspect.clone())
            .or_default();
        push_unique(bucket, &record.classes);
    }

    let mut sample_options = SampleOptions::new();
    for record in records {
        if record.samples.is_empty() {
            continue;
        }
        for class in &record.classes {
            push_unique(sample_options.entry(class.clone()).or_default(), &record.samples);
        }
    }

    TaxonomyOptions {
        markets,
        aspects,
        class_options,
        sample_options,
    }
}

fn push_unique(bucket: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !bucket.contains(value) {
            bucket.push(value.clone());
        }
    }
}

impl Catalog {
    pub fn from_records(records: Vec<CatalogRecord>, metadata: CatalogMetadata) -> Self {
        let mut catalog = Catalog {
            table_list: records,
            metadata,
            ..Catalog::default()
        };
        catalog.rebuild_options();
        catalog
    }

    pub fn rebuild_options(&mut self) {
        let options = derive_options(&self.table_list);
        self.markets = options.markets;
        self.aspects = options.aspects;
        self.class_options = options.class_options;
        self.sample_options = options.sample_options;
        self.metadata.total_tables = self.table_list.len();
    }

    pub fn available_classes(&self, market: &str, aspect: &str) -> &[String] {
        self.class_options
            .get(market)
            .and_then(|aspects| aspects.get(aspect))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn record(&self, id: &str) -> Option<&CatalogRecord> {
        self.table_list.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.table_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table_list.is_empty()
    }

    /// Structural consistency warnings; an empty list means the snapshot is coherent.
    pub fn check(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.metadata.total_tables != self.table_list.len() {
            warnings.push(format!(
                "metadata.totalTables is {} but tableList holds {} record(s)",
                self.metadata.total_tables,
                self.table_list.len()
            ));
        }
        let derived = derive_options(&self.table_list);
        if derived.class_options != self.class_options {
            warnings.push("classOptions does not match the records in tableList".to_string());
        }
        if derived.sample_options != self.sample_options {
            warnings.push("sampleOptions does not match the records in tableList".to_string());
        }
        let duplicate_ids = self
            .table_list
            .iter()
            .map(|r| r.id.as_str())
            .duplicates()
            .collect::<Vec<_>>();
        if !duplicate_ids.is_empty() {
            warnings.push(format!("Duplicate record ids: {}", duplicate_ids.join(", ")));
        }
        warnings
    }

    pub fn from_json_str(raw: &str) -> CatalogResult<Self> {
        let mut catalog: Catalog = serde_json::from_str(raw)?;
        let issues = catalog.check();
        if !issues.is_empty() {
            for issue in &issues {
                warn!("{issue}");
            }
            debug!("Rebuilding taxonomy caches for loaded catalog");
            catalog.rebuild_options();
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> CatalogResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(raw.trim_start_matches('\u{feff}'))
    }

    pub fn to_json_string(&self, pretty: bool) -> CatalogResult<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// Splits a multi-valued cell such as `"001, 002"` into clean tags.
pub fn split_tags(cell: &str) -> Vec<String> {
    clean_tags(cell.split(','))
}

fn clean_tags(values: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .unique()
        .collect()
}

pub fn date_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Suggested download name, e.g. `updated_table_data_2024-05-01_1714521600000.json`.
pub fn export_file_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!(
        "{prefix}_{}_{}.json",
        date_stamp(now),
        now.timestamp_millis()
    )
}
