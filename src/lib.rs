pub mod catalog;
pub mod cli;
pub mod config;
pub mod csv_import;
pub mod error;
pub mod field_list;
pub mod filter;
pub mod io_utils;
pub mod listing;
pub mod reconcile;
pub mod stats;
pub mod table;

use std::{
    env,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    catalog::Catalog,
    cli::{Cli, Commands},
    config::CatalogConfig,
    filter::{FilterEngine, FilterEvent},
    io_utils::{FsHost, HostIo},
    listing::SortDirective,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("table_catalog", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CatalogConfig::load(path)
            .with_context(|| format!("Loading configuration from {path:?}"))?,
        None => CatalogConfig::default(),
    };
    match cli.command {
        Commands::Template(args) => handle_template(&args),
        Commands::Validate(args) => handle_validate(&args, &config),
        Commands::Convert(args) => handle_convert(&args, &config),
        Commands::Stats(args) => handle_stats(&args),
        Commands::Fields(args) => handle_fields(&args),
        Commands::Reconcile(args) => handle_reconcile(&args, &config),
        Commands::Query(args) => handle_query(&args, &config),
        Commands::Export(args) => handle_export(&args),
    }
}

fn host_for(path: &Path, encoding: Option<&str>) -> Result<FsHost> {
    let encoding = io_utils::resolve_encoding(encoding)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(FsHost::new(encoding, dir))
}

fn write_output(path: &Path, content: &str) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Output path {path:?} has no file name"))?;
    host_for(path, None)?.trigger_download(file_name, content)
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    Catalog::load(path).with_context(|| format!("Loading catalog from {path:?}"))
}

fn handle_template(args: &cli::TemplateArgs) -> Result<()> {
    match &args.output {
        Some(path) => {
            write_output(path, csv_import::template())?;
        }
        None => FsHost::default().write_clipboard(csv_import::template())?,
    }
    Ok(())
}

fn read_csv_table(path: &Path, encoding: Option<&str>) -> Result<csv_import::CsvTable> {
    let text = host_for(path, encoding)?.read_text(path)?;
    csv_import::parse(&text).with_context(|| format!("Parsing {path:?}"))
}

fn print_report(report: &csv_import::ValidationReport) {
    let rows = report
        .errors
        .iter()
        .map(|issue| ("error", issue))
        .chain(report.warnings.iter().map(|issue| ("warning", issue)))
        .map(|(level, issue)| {
            vec![
                level.to_string(),
                issue.row.map(|r| r.to_string()).unwrap_or_default(),
                issue.message.clone(),
            ]
        })
        .collect::<Vec<_>>();
    if !rows.is_empty() {
        table::print_table(&table::headers(&["level", "row", "message"]), &rows);
    }
    println!(
        "rows: {}, columns: {}, unique table names: {}",
        report.row_count, report.column_count, report.unique_table_names
    );
}

fn handle_validate(args: &cli::ValidateArgs, config: &CatalogConfig) -> Result<()> {
    let table = read_csv_table(&args.input, args.input_encoding.as_deref())?;
    let report = csv_import::validate(&table, config);
    print_report(&report);
    if !report.is_valid {
        bail!("{:?} failed validation", args.input);
    }
    info!(
        "✓ {:?} is valid with {} warning(s)",
        args.input,
        report.warnings.len()
    );
    Ok(())
}

fn handle_convert(args: &cli::ConvertArgs, config: &CatalogConfig) -> Result<()> {
    let table = read_csv_table(&args.input, args.input_encoding.as_deref())?;
    let report = csv_import::validate(&table, config);
    if !report.is_valid {
        let messages = report
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>();
        bail!("{:?} failed validation: {}", args.input, messages.join("; "));
    }
    for warning in &report.warnings {
        warn!("{}", warning.message);
    }
    let catalog = csv_import::convert(&table);
    let target = write_output(&args.output, &catalog.to_json_string(config.export.pretty)?)?;
    info!(
        "Catalog with {} table(s) written to {:?}",
        catalog.len(),
        target
    );
    Ok(())
}

fn handle_stats(args: &cli::StatsArgs) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let report = stats::statistics(&catalog);
    table::print_table(
        &table::headers(&["section", "name", "count", "percent"]),
        &stats::render_rows(&report),
    );
    let quality = &report.data_quality;
    println!(
        "tables: {}, complete: {}, incomplete: {}, duplicate names: {}, multi-class: {}",
        report.overview.total_tables,
        quality.complete_tables,
        quality.incomplete_tables,
        quality.duplicate_names,
        quality.multi_class_tables
    );
    Ok(())
}

fn read_field_list(
    path: &Path,
    delimiter: Option<u8>,
    encoding: Option<&str>,
) -> Result<field_list::FieldListImport> {
    let workbook = host_for(path, encoding)?.read_workbook(path, delimiter)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(field_list::DEFAULT_FILE_NAME);
    field_list::parse_named(&workbook, file_name).with_context(|| format!("Parsing {path:?}"))
}

fn handle_fields(args: &cli::FieldsArgs) -> Result<()> {
    let parsed = read_field_list(&args.input, args.delimiter, args.input_encoding.as_deref())?;
    let rows = parsed
        .tables
        .iter()
        .map(|group| {
            vec![
                group.sheet_name.clone(),
                group.table_id.clone(),
                group.original_table_name.clone(),
                group.field_count.to_string(),
                group
                    .fields
                    .iter()
                    .map(|f| format!("{}:{}", f.name, f.field_type.as_str()))
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(
        &table::headers(&["sheet", "id", "table", "count", "fields"]),
        &rows,
    );
    println!(
        "tables: {}, fields: {}, rows processed: {}",
        parsed.processing_details.tables_found,
        parsed.total_fields,
        parsed.processing_details.total_rows_processed
    );
    Ok(())
}

fn parse_selection(raw: &str) -> Result<(usize, Option<String>)> {
    let (index, target) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Selection '{raw}' must look like INDEX=RECORD_ID"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .with_context(|| format!("Parsing selection index in '{raw}'"))?;
    let target = target.trim();
    if target.eq_ignore_ascii_case("none") {
        Ok((index, None))
    } else {
        Ok((index, Some(target.to_string())))
    }
}

fn handle_reconcile(args: &cli::ReconcileArgs, config: &CatalogConfig) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let parsed = read_field_list(&args.fields, args.delimiter, args.input_encoding.as_deref())?;
    let mut results =
        reconcile::match_groups(&parsed.tables, &catalog.table_list, &config.matching);

    if let Some(threshold) = args.auto_accept {
        let accepted = reconcile::auto_select(&mut results, threshold);
        info!("Auto-accepted {accepted} fuzzy match(es) at similarity >= {threshold}");
    }
    for raw in &args.selections {
        let (index, target) = parse_selection(raw)?;
        let choice = match target {
            Some(id) => Some(
                catalog
                    .record(&id)
                    .cloned()
                    .ok_or_else(|| anyhow!("No catalog record with id '{id}'"))?,
            ),
            None => None,
        };
        debug!("Selection {index} -> {:?}", choice.as_ref().map(|r| &r.name));
        reconcile::select_match(&mut results, index, choice)?;
    }

    let rows = results
        .iter()
        .enumerate()
        .map(|(idx, result)| {
            let candidates = result
                .fuzzy_matches
                .iter()
                .map(|c| format!("{} ({:.2})", c.table.id, c.similarity))
                .collect::<Vec<_>>()
                .join(", ");
            vec![
                idx.to_string(),
                result.excel_table.original_table_name.clone(),
                format!("{:?}", result.match_type).to_lowercase(),
                result
                    .selected_match
                    .as_ref()
                    .map(|r| r.name.clone())
                    .unwrap_or_default(),
                candidates,
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(
        &table::headers(&["#", "table", "match", "selected", "candidates"]),
        &rows,
    );

    let outcome = reconcile::merge(&results, &catalog)?;
    let content = if config.export.pretty {
        outcome.export.content.clone()
    } else {
        outcome.merged_catalog.to_json_string(false)?
    };
    let target = write_output(&args.output, &content)?;
    let summary = &outcome.summary;
    println!(
        "matched: {}, pending: {}, fields added: {}, tables with fields: {}",
        summary.matched_tables,
        summary.unmatched_tables,
        summary.total_fields_added,
        summary.tables_with_fields
    );
    info!("Merged catalog written to {:?}", target);
    Ok(())
}

fn handle_query(args: &cli::QueryArgs, config: &CatalogConfig) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let engine = FilterEngine::with_config(&catalog, config);

    let mut events = Vec::new();
    if let Some(market) = &args.market {
        events.push(FilterEvent::SetMarket(market.clone()));
    }
    if let Some(aspect) = &args.aspect {
        events.push(FilterEvent::SetAspect(aspect.clone()));
    }
    events.extend(args.classes.iter().cloned().map(FilterEvent::ToggleClass));
    events.extend(args.samples.iter().cloned().map(FilterEvent::ToggleSample));
    if let Some(term) = &args.search {
        events.push(FilterEvent::SetSearchTerm(term.clone()));
    }
    let state = events
        .into_iter()
        .fold(engine.initial_state(), |state, event| engine.dispatch(&state, event));

    let mut records = engine.filtered(&state);
    if let Some(spec) = &args.sort {
        let directive = spec.parse::<SortDirective>().map_err(|err| anyhow!(err))?;
        records = listing::sort_records(&records, directive);
    }
    let shown = match args.page {
        Some(page) => {
            let (slice, pagination) = listing::paginate(&records, page, args.page_size);
            println!(
                "page {}/{} ({}-{} of {})",
                pagination.current_page,
                pagination.total_pages,
                pagination.start_index,
                pagination.end_index,
                pagination.total_items
            );
            slice
        }
        None => records,
    };
    table::print_table(
        &table::headers(table::RECORD_HEADERS),
        &table::record_rows(&shown),
    );

    let summary = engine.summary(&state);
    println!(
        "{} of {} table(s) ({}%) [{}] {}",
        summary.filtered_count,
        summary.total_count,
        summary.filter_rate,
        format!("{:?}", summary.mode).to_lowercase(),
        summary.active_filters.join(" | ")
    );
    Ok(())
}

fn handle_export(args: &cli::ExportArgs) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let csv = csv_import::export_records(&catalog.table_list)?;
    match &args.output {
        Some(path) => {
            let target = write_output(path, &csv)?;
            info!("Exported {} record(s) to {:?}", catalog.len(), target);
        }
        None => FsHost::default().write_clipboard(&csv)?,
    }
    Ok(())
}
