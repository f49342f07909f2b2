use table_catalog::{
    catalog::{Catalog, CatalogMetadata, CatalogRecord, FieldType},
    config::{CatalogConfig, MatchConfig},
    csv_import,
    field_list::{self, Workbook},
    filter::{FilterEngine, FilterEvent},
    reconcile::{self, MatchType},
};

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn catalog_of(records: Vec<CatalogRecord>) -> Catalog {
    Catalog::from_records(records, CatalogMetadata::default())
}

fn group_named(table_name: &str) -> field_list::ExcelFieldGroup {
    let workbook = Workbook::single("Sheet1", vec![row(&["M001", table_name, "[收盤價]"])]);
    field_list::parse(&workbook)
        .expect("parse field list")
        .tables
        .remove(0)
}

#[test]
fn csv_with_multi_tag_cells_converts_to_two_records() {
    let text = "Table名稱,市場,面向,類別,樣本\nA表,台灣,基本面,001,RSI\nB表,美國,技術面,\"002, 003\",\"RSI, MACD\"";
    let table = csv_import::parse(text).expect("parse csv");
    let report = csv_import::validate(&table, &CatalogConfig::default());
    assert!(report.is_valid);

    let catalog = csv_import::convert(&table);
    assert_eq!(catalog.len(), 2);
    let b = &catalog.table_list[1];
    assert_eq!(b.classes, vec!["002", "003"]);
    assert_eq!(b.samples, vec!["RSI", "MACD"]);
    assert_eq!(catalog.available_classes("美國", "技術面"), ["002", "003"]);
    assert_eq!(catalog.sample_options["002"], vec!["RSI", "MACD"]);
}

#[test]
fn bracketed_field_rows_group_and_reorder() {
    let workbook = Workbook::single(
        "Sheet1",
        vec![row(&["M001", "日表", "[日期]"]), row(&["M001", "日表", "[收盤價]"])],
    );
    let parsed = field_list::parse(&workbook).expect("parse field list");
    assert_eq!(parsed.tables.len(), 1);
    let group = &parsed.tables[0];
    assert_eq!(group.table_id, "M001");
    let names = group.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["收盤價", "日期"]);
    assert_eq!(group.fields[0].field_type, FieldType::Number);
    assert_eq!(group.fields[1].field_type, FieldType::Date);
}

#[test]
fn normalized_name_equality_is_an_exact_match() {
    let catalog = catalog_of(vec![CatalogRecord::new(
        "table-1", "台股分析", "台灣", "基本面", ["001"], ["RSI"],
    )]);
    let results = reconcile::match_groups(
        &[group_named("台股 分析")],
        &catalog.table_list,
        &MatchConfig::default(),
    );
    assert_eq!(results[0].match_type, MatchType::Exact);
    assert!(results[0].is_matched());
}

#[test]
fn near_name_becomes_fuzzy_candidate() {
    let catalog = catalog_of(vec![CatalogRecord::new(
        "table-1",
        "台股技術分析",
        "台灣",
        "技術面",
        ["001"],
        ["MACD"],
    )]);
    let results = reconcile::match_groups(
        &[group_named("台股技術分析表")],
        &catalog.table_list,
        &MatchConfig::default(),
    );
    let result = &results[0];
    assert_eq!(result.match_type, MatchType::Fuzzy);
    assert!(!result.is_matched());
    assert_eq!(result.fuzzy_matches.len(), 1);
    assert_eq!(result.fuzzy_matches[0].table.id, "table-1");
    assert!(result.fuzzy_matches[0].similarity > 0.5);
}

#[test]
fn classes_without_common_record_filter_to_nothing() {
    let catalog = catalog_of(vec![
        CatalogRecord::new("table-1", "甲", "台灣", "基本面", ["001"], ["RSI"]),
        CatalogRecord::new("table-2", "乙", "台灣", "基本面", ["002"], ["RSI"]),
    ]);
    let engine = FilterEngine::with_config(&catalog, &CatalogConfig::default());
    let state = [
        FilterEvent::ToggleClass("001".into()),
        FilterEvent::ToggleClass("002".into()),
    ]
    .into_iter()
    .fold(engine.initial_state(), |s, e| engine.dispatch(&s, e));

    assert_eq!(state.selected_market, "台灣");
    assert!(engine.filtered(&state).is_empty());
    let summary = engine.summary(&state);
    assert_eq!(summary.filtered_count, 0);
    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.filter_rate, 0.0);
}

#[test]
fn clearing_search_restores_previous_market() {
    let catalog = catalog_of(vec![
        CatalogRecord::new("table-1", "台股", "台灣", "基本面", ["001"], ["RSI"]),
        CatalogRecord::new("table-2", "美股", "美國", "技術面", ["002"], ["MACD"]),
    ]);
    let engine = FilterEngine::with_config(&catalog, &CatalogConfig::default());
    let filtered = engine.dispatch(&engine.initial_state(), FilterEvent::SetMarket("美國".into()));
    let filtered = engine.dispatch(&filtered, FilterEvent::SetAspect("技術面".into()));
    assert_eq!(filtered.selected_market, "美國");

    let searching = engine.dispatch(&filtered, FilterEvent::SetSearchTerm("股".into()));
    assert!(searching.is_search_mode);
    assert!(searching.selected_market.is_empty());
    assert_eq!(engine.filtered(&searching).len(), 2);

    let ignored = engine.dispatch(&searching, FilterEvent::SetMarket("香港".into()));
    assert_eq!(ignored, searching);

    let restored = engine.dispatch(&searching, FilterEvent::ClearSearch);
    assert!(!restored.is_search_mode);
    assert_eq!(restored.selected_market, "美國");
    assert_eq!(restored.selected_aspect, "技術面");
}

#[test]
fn selection_and_merge_only_touch_chosen_records() {
    let catalog = catalog_of(vec![
        CatalogRecord::new("table-1", "台股技術分析", "台灣", "技術面", ["001"], ["MACD"]),
        CatalogRecord::new("table-2", "美股籌碼", "美國", "籌碼面", ["002"], ["外資"]),
    ]);
    let mut results = reconcile::match_groups(
        &[group_named("台股技術分析表"), group_named("毫無關聯")],
        &catalog.table_list,
        &MatchConfig::default(),
    );
    assert_eq!(results[1].match_type, MatchType::None);

    let choice = catalog.record("table-1").cloned();
    reconcile::select_match(&mut results, 0, choice.clone()).expect("select");
    reconcile::select_match(&mut results, 0, choice).expect("select twice");
    assert!(reconcile::select_match(&mut results, 5, None).is_err());

    let outcome = reconcile::merge(&results, &catalog).expect("merge");
    assert_eq!(outcome.summary.matched_tables, 1);
    assert_eq!(outcome.summary.unmatched_tables, 1);
    assert_eq!(outcome.summary.total_fields_added, 1);
    assert_eq!(outcome.merged_catalog.table_list[1], catalog.table_list[1]);
    assert_eq!(outcome.merged_catalog.class_options, catalog.class_options);
    assert!(outcome.export.file_name.starts_with("updated_table_data_"));
    assert!(outcome.export.file_name.ends_with(".json"));
}
