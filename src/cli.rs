use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Catalog, filter, and reconcile data-table inventories", long_about = None)]
pub struct Cli {
    /// YAML configuration overriding vocabularies, defaults, and match tuning
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write the sample CSV import template
    Template(TemplateArgs),
    /// Check a CSV import file for missing columns and data-quality issues
    Validate(ValidateArgs),
    /// Convert a CSV import file into a catalog JSON snapshot
    Convert(ConvertArgs),
    /// Print distribution and data-quality statistics for a catalog
    Stats(StatsArgs),
    /// Parse a field-list file and list the table groups it contains
    Fields(FieldsArgs),
    /// Match a field-list file against a catalog and merge the fields in
    Reconcile(ReconcileArgs),
    /// Filter or search catalog records
    Query(QueryArgs),
    /// Export catalog records as CSV
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Destination file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// CSV import file
    #[arg(short, long)]
    pub input: PathBuf,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// CSV import file
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination catalog JSON file
    #[arg(short, long)]
    pub output: PathBuf,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Catalog JSON file
    #[arg(short, long)]
    pub catalog: PathBuf,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    /// Field-list file (.csv, .tsv, or a JSON workbook)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Delimiter for delimited field lists (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Catalog JSON file to enrich
    #[arg(short, long)]
    pub catalog: PathBuf,
    /// Field-list file (.csv, .tsv, or a JSON workbook)
    #[arg(short, long)]
    pub fields: PathBuf,
    /// Destination for the merged catalog JSON
    #[arg(short, long)]
    pub output: PathBuf,
    /// Explicit choices of the form `INDEX=RECORD_ID` or `INDEX=none`
    #[arg(long = "select", action = clap::ArgAction::Append)]
    pub selections: Vec<String>,
    /// Accept the best fuzzy candidate when its similarity reaches this value
    #[arg(long = "auto-accept")]
    pub auto_accept: Option<f64>,
    /// Delimiter for delimited field lists (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the field-list file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Catalog JSON file
    #[arg(short, long)]
    pub catalog: PathBuf,
    /// Market to filter on (defaults to the configured market)
    #[arg(long)]
    pub market: Option<String>,
    /// Aspect to filter on (defaults to the configured aspect)
    #[arg(long)]
    pub aspect: Option<String>,
    /// Class that every record must carry (repeatable)
    #[arg(long = "class", action = clap::ArgAction::Append)]
    pub classes: Vec<String>,
    /// Sample that every record must carry (repeatable)
    #[arg(long = "sample", action = clap::ArgAction::Append)]
    pub samples: Vec<String>,
    /// Free-text search; ignores all facet options
    #[arg(short, long)]
    pub search: Option<String>,
    /// Sort directive of the form `key[:asc|desc]`
    #[arg(long)]
    pub sort: Option<String>,
    /// 1-based page to print
    #[arg(long)]
    pub page: Option<usize>,
    /// Records per page
    #[arg(long = "page-size", default_value_t = 10)]
    pub page_size: usize,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Catalog JSON file
    #[arg(short, long)]
    pub catalog: PathBuf,
    /// Destination CSV file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
