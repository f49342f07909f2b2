//! Faceted filtering and free-text search over a catalog.
//!
//! [`FilterState`] is a plain value. [`FilterEngine::dispatch`] is a reducer
//! that returns the next state for a [`FilterEvent`]; everything shown to the
//! user (available options, matching records, summary) is derived on demand
//! from `(catalog, state)`.
//!
//! The engine has two mutually exclusive modes:
//!
//! - **Filter**: market and aspect are single-select, classes and samples are
//!   multi-select with AND semantics (a record must carry *every* selected tag).
//! - **Search**: entered as soon as the search term becomes non-blank. The
//!   facet selection is stashed and cleared, facet events are ignored, and it
//!   is restored when the term is cleared again.

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Catalog, CatalogRecord},
    config::CatalogConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Filter,
    Search,
}

/// Facet selection stashed while search mode is active.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub market: String,
    pub aspect: String,
    pub classes: Vec<String>,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub selected_market: String,
    pub selected_aspect: String,
    pub selected_classes: Vec<String>,
    pub selected_samples: Vec<String>,
    pub search_term: String,
    pub is_search_mode: bool,
    pub saved_filters: Option<FilterSnapshot>,
}

impl FilterState {
    pub fn mode(&self) -> FilterMode {
        if self.is_search_mode {
            FilterMode::Search
        } else {
            FilterMode::Filter
        }
    }

    fn snapshot(&self) -> FilterSnapshot {
        FilterSnapshot {
            market: self.selected_market.clone(),
            aspect: self.selected_aspect.clone(),
            classes: self.selected_classes.clone(),
            samples: self.selected_samples.clone(),
        }
    }

    fn restore(&mut self, snapshot: FilterSnapshot) {
        self.selected_market = snapshot.market;
        self.selected_aspect = snapshot.aspect;
        self.selected_classes = snapshot.classes;
        self.selected_samples = snapshot.samples;
    }

    fn clear_facets(&mut self) {
        self.selected_market.clear();
        self.selected_aspect.clear();
        self.selected_classes.clear();
        self.selected_samples.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    SetMarket(String),
    SetAspect(String),
    ToggleClass(String),
    ToggleSample(String),
    SelectAllClasses,
    ClearClasses,
    SelectAllSamples,
    ClearSamples,
    SetSearchTerm(String),
    ClearSearch,
    ResetAll,
}

impl FilterEvent {
    fn is_facet_event(&self) -> bool {
        !matches!(
            self,
            FilterEvent::SetSearchTerm(_) | FilterEvent::ClearSearch | FilterEvent::ResetAll
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSummary {
    pub active_filters: Vec<String>,
    pub active_count: usize,
    pub total_count: usize,
    pub filtered_count: usize,
    /// Percentage of records kept, one decimal place.
    pub filter_rate: f64,
    pub mode: FilterMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefaults {
    pub market: String,
    pub aspect: String,
}

impl From<&CatalogConfig> for FilterDefaults {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            market: config.default_market.clone(),
            aspect: config.default_aspect.clone(),
        }
    }
}

pub struct FilterEngine<'a> {
    catalog: &'a Catalog,
    defaults: FilterDefaults,
}

impl<'a> FilterEngine<'a> {
    pub fn new(catalog: &'a Catalog, defaults: FilterDefaults) -> Self {
        Self { catalog, defaults }
    }

    pub fn with_config(catalog: &'a Catalog, config: &CatalogConfig) -> Self {
        Self::new(catalog, FilterDefaults::from(config))
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn initial_state(&self) -> FilterState {
        FilterState {
            selected_market: self.defaults.market.clone(),
            selected_aspect: self.defaults.aspect.clone(),
            ..FilterState::default()
        }
    }

    pub fn dispatch(&self, state: &FilterState, event: FilterEvent) -> FilterState {
        let mut next = state.clone();
        if next.is_search_mode && event.is_facet_event() {
            debug!("Ignoring {event:?} while search mode is active");
            return next;
        }
        match event {
            FilterEvent::SetMarket(market) => {
                next.selected_market = market;
                next.selected_aspect = self.catalog.aspects.first().cloned().unwrap_or_default();
                next.selected_classes.clear();
                next.selected_samples.clear();
            }
            FilterEvent::SetAspect(aspect) => {
                next.selected_aspect = aspect;
                next.selected_classes.clear();
                next.selected_samples.clear();
            }
            FilterEvent::ToggleClass(class) => {
                toggle(&mut next.selected_classes, class);
                next.selected_samples.clear();
            }
            FilterEvent::ToggleSample(sample) => toggle(&mut next.selected_samples, sample),
            FilterEvent::SelectAllClasses => {
                next.selected_classes = self.available_classes(&next);
                next.selected_samples.clear();
            }
            FilterEvent::ClearClasses => {
                next.selected_classes.clear();
                next.selected_samples.clear();
            }
            FilterEvent::SelectAllSamples => next.selected_samples = self.available_samples(&next),
            FilterEvent::ClearSamples => next.selected_samples.clear(),
            FilterEvent::SetSearchTerm(term) => self.apply_search_term(&mut next, term),
            FilterEvent::ClearSearch => self.apply_search_term(&mut next, String::new()),
            FilterEvent::ResetAll => next = self.initial_state(),
        }
        next
    }

    fn apply_search_term(&self, state: &mut FilterState, term: String) {
        let searching = !term.trim().is_empty();
        state.search_term = term;
        if searching && !state.is_search_mode {
            state.saved_filters = Some(state.snapshot());
            state.clear_facets();
            state.is_search_mode = true;
        } else if !searching && state.is_search_mode {
            state.is_search_mode = false;
            match state.saved_filters.take() {
                Some(snapshot) => state.restore(snapshot),
                None => {
                    state.selected_market = self.defaults.market.clone();
                    state.selected_aspect = self.defaults.aspect.clone();
                    state.selected_classes.clear();
                    state.selected_samples.clear();
                }
            }
        }
    }

    pub fn available_classes(&self, state: &FilterState) -> Vec<String> {
        if state.is_search_mode {
            return Vec::new();
        }
        available_classes(self.catalog, &state.selected_market, &state.selected_aspect)
    }

    pub fn available_samples(&self, state: &FilterState) -> Vec<String> {
        if state.is_search_mode {
            return Vec::new();
        }
        available_samples(
            &self.catalog.table_list,
            &state.selected_market,
            &state.selected_aspect,
            &state.selected_classes,
        )
    }

    pub fn filtered(&self, state: &FilterState) -> Vec<&'a CatalogRecord> {
        filtered_set(&self.catalog.table_list, state)
    }

    pub fn summary(&self, state: &FilterState) -> FilterSummary {
        let filtered = self.filtered(state).len();
        summary(state, self.catalog.len(), filtered)
    }

    pub fn has_active_filters(&self, state: &FilterState) -> bool {
        state.is_search_mode
            || state.selected_market != self.defaults.market
            || state.selected_aspect != self.defaults.aspect
            || !state.selected_classes.is_empty()
            || !state.selected_samples.is_empty()
            || !state.search_term.trim().is_empty()
    }

    /// Drops selected classes and samples that this catalog no longer offers.
    pub fn prune_state(&self, state: &FilterState) -> FilterState {
        let mut next = state.clone();
        if next.is_search_mode {
            return next;
        }
        if !next.selected_market.is_empty() && !next.selected_aspect.is_empty() {
            let offered = self.available_classes(&next);
            next.selected_classes.retain(|c| offered.contains(c));
        }
        if !next.selected_classes.is_empty() {
            let offered = self.available_samples(&next);
            next.selected_samples.retain(|s| offered.contains(s));
        }
        if next != *state {
            debug!("Pruned stale selections from filter state");
        }
        next
    }
}

fn toggle(selection: &mut Vec<String>, value: String) {
    if let Some(pos) = selection.iter().position(|v| *v == value) {
        selection.remove(pos);
    } else {
        selection.push(value);
    }
}

pub fn available_classes(catalog: &Catalog, market: &str, aspect: &str) -> Vec<String> {
    catalog.available_classes(market, aspect).to_vec()
}

/// Samples carried by records that already satisfy market, aspect and every
/// selected class, sorted.
pub fn available_samples(
    records: &[CatalogRecord],
    market: &str,
    aspect: &str,
    selected_classes: &[String],
) -> Vec<String> {
    records
        .iter()
        .filter(|r| market.is_empty() || r.market == market)
        .filter(|r| aspect.is_empty() || r.aspect == aspect)
        .filter(|r| selected_classes.iter().all(|c| r.has_class(c)))
        .flat_map(|r| r.samples.iter().cloned())
        .unique()
        .sorted()
        .collect()
}

pub fn matches_filters(record: &CatalogRecord, state: &FilterState) -> bool {
    (state.selected_market.is_empty() || record.market == state.selected_market)
        && (state.selected_aspect.is_empty() || record.aspect == state.selected_aspect)
        && state.selected_classes.iter().all(|c| record.has_class(c))
        && state.selected_samples.iter().all(|s| record.has_sample(s))
}

/// Case-insensitive substring match on names, taxonomy tags and field metadata.
pub fn matches_search(record: &CatalogRecord, term: &str) -> bool {
    let needle = term.to_lowercase();
    let hit = |value: &str| value.to_lowercase().contains(&needle);
    hit(&record.name)
        || hit(&record.market)
        || hit(&record.aspect)
        || record.classes.iter().any(|c| hit(c))
        || record.samples.iter().any(|s| hit(s))
        || record
            .fields
            .iter()
            .flatten()
            .any(|f| hit(&f.name) || hit(&f.description))
}

pub fn filtered_set<'a>(records: &'a [CatalogRecord], state: &FilterState) -> Vec<&'a CatalogRecord> {
    if state.is_search_mode {
        records
            .iter()
            .filter(|r| matches_search(r, &state.search_term))
            .collect()
    } else {
        records.iter().filter(|r| matches_filters(r, state)).collect()
    }
}

pub fn summary(state: &FilterState, total_count: usize, filtered_count: usize) -> FilterSummary {
    let mut active_filters = Vec::new();
    if state.is_search_mode {
        if !state.search_term.trim().is_empty() {
            active_filters.push(format!("Search: \"{}\"", state.search_term));
        }
    } else {
        if !state.selected_market.is_empty() {
            active_filters.push(format!("Market: {}", state.selected_market));
        }
        if !state.selected_aspect.is_empty() {
            active_filters.push(format!("Aspect: {}", state.selected_aspect));
        }
        if !state.selected_classes.is_empty() {
            active_filters.push(format!("Classes: {} selected", state.selected_classes.len()));
        }
        if !state.selected_samples.is_empty() {
            active_filters.push(format!("Samples: {} selected", state.selected_samples.len()));
        }
    }
    let filter_rate = if total_count == 0 {
        0.0
    } else {
        (filtered_count as f64 / total_count as f64 * 1000.0).round() / 10.0
    };
    FilterSummary {
        active_count: active_filters.len(),
        active_filters,
        total_count,
        filtered_count,
        filter_rate,
        mode: state.mode(),
    }
}
