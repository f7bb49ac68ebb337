//! Normalize a migration readiness-report export.
//!
//! Reads a CSV whose status column is free-form `key: value` text, parses
//! every row with the explicit grammar in [`crate::readiness`], and writes a
//! normalized CSV. Rows that fail to parse are recorded with the parse
//! error and counted, never fatal.

use crate::error::{Ops365Error, Result};
use crate::readiness::{self, ReadinessState};
use clap::Args;
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Input readiness-report CSV
    #[arg(short, long)]
    pub input: PathBuf,

    /// Normalized output CSV
    #[arg(short, long, default_value = "readiness-normalized.csv")]
    pub output: PathBuf,

    /// Column holding the identity
    #[arg(long, default_value = "UserPrincipalName")]
    pub identity_column: String,

    /// Column holding the free-form status text
    #[arg(long, default_value = "Status")]
    pub status_column: String,
}

struct ParsedRow {
    identity: String,
    state: String,
    fields: std::collections::BTreeMap<String, String>,
    parse_error: Option<String>,
}

pub async fn process(args: ProcessArgs) -> Result<()> {
    println!("{} readiness report...", "Processing".cyan().bold());

    let mut reader = csv::Reader::from_path(&args.input)?;
    let headers = reader.headers()?.clone();

    let identity_idx = headers
        .iter()
        .position(|h| h == args.identity_column)
        .ok_or_else(|| {
            Ops365Error::InvalidArgument(format!(
                "column '{}' not found in {}",
                args.identity_column,
                args.input.display()
            ))
        })?;
    let status_idx = headers
        .iter()
        .position(|h| h == args.status_column)
        .ok_or_else(|| {
            Ops365Error::InvalidArgument(format!(
                "column '{}' not found in {}",
                args.status_column,
                args.input.display()
            ))
        })?;

    let mut rows: Vec<ParsedRow> = Vec::new();
    let mut parse_errors: Vec<(usize, String)> = Vec::new();

    for (row_idx, record) in reader.records().enumerate() {
        let row_num = row_idx + 2; // header is row 1
        let record = record?;
        let identity = record.get(identity_idx).unwrap_or("").to_string();
        let raw_status = record.get(status_idx).unwrap_or("");

        match readiness::parse_record(&identity, raw_status) {
            Ok(parsed) => rows.push(ParsedRow {
                identity,
                state: parsed.state.to_string(),
                fields: parsed.fields,
                parse_error: None,
            }),
            Err(e) => {
                parse_errors.push((row_num, e.to_string()));
                rows.push(ParsedRow {
                    identity,
                    state: String::new(),
                    fields: Default::default(),
                    parse_error: Some(e.to_string()),
                });
            }
        }
    }

    if !parse_errors.is_empty() {
        println!(
            "\n{} {} row(s) failed to parse:",
            "⚠".yellow().bold(),
            parse_errors.len()
        );
        for (row, msg) in &parse_errors {
            println!("  Row {}: {}", row, msg.red());
        }
    }

    // Normalized columns: identity, state, parseError, then the sorted union
    // of every parsed field.
    let field_columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.fields.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(&args.output)?;
    let mut header = vec!["identity", "state", "parseError"];
    header.extend(field_columns.iter().copied());
    writer.write_record(&header)?;

    for row in &rows {
        let mut record = vec![
            row.identity.clone(),
            row.state.clone(),
            row.parse_error.clone().unwrap_or_default(),
        ];
        for column in &field_columns {
            record.push(row.fields.get(*column).cloned().unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;

    let ready = rows
        .iter()
        .filter(|r| r.state == ReadinessState::Ready.to_string())
        .count();
    let blocked = rows
        .iter()
        .filter(|r| r.state == ReadinessState::Blocked.to_string())
        .count();

    println!("\n{} Readiness Summary:", "→".cyan().bold());
    println!("  Rows:     {}", rows.len());
    println!("  Ready:    {}", ready.to_string().green());
    println!("  Blocked:  {}", blocked.to_string().red());
    if !parse_errors.is_empty() {
        println!("  Unparsed: {}", parse_errors.len().to_string().yellow());
    }
    println!(
        "\n{} Normalized report written to {}",
        "✓".green().bold(),
        args.output.display()
    );

    Ok(())
}
