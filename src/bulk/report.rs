//! Render a completed run: tabular file export and console aggregate.

use crate::bulk::RunSummary;
use crate::error::Result;
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::Path;

/// Supported export formats for a run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = crate::error::Ops365Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(crate::error::Ops365Error::InvalidArgument(format!(
                "unknown report format '{}', expected csv or json",
                other
            ))),
        }
    }
}

/// Write the summary to `destination` in the given format.
pub fn export(summary: &RunSummary, destination: &Path, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Csv => write_csv(summary, destination),
        ReportFormat::Json => write_json(summary, destination),
    }
}

/// CSV export: fixed result columns followed by one column per payload key.
///
/// Payload columns are the sorted union of keys across all results, so rows
/// without a given key get an empty cell rather than a ragged record.
pub fn write_csv(summary: &RunSummary, destination: &Path) -> Result<()> {
    let payload_columns: BTreeSet<&str> = summary
        .results
        .iter()
        .flat_map(|r| r.payload.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(destination)?;

    let mut header = vec!["identity", "outcome", "attempts", "error", "finishedAt"];
    header.extend(payload_columns.iter().copied());
    writer.write_record(&header)?;

    for result in &summary.results {
        let mut record = vec![
            result.identity.clone(),
            result.outcome.to_string(),
            result.attempts.to_string(),
            result.error.clone().unwrap_or_default(),
            result.finished_at.to_rfc3339(),
        ];
        for column in &payload_columns {
            record.push(result.payload.get(*column).cloned().unwrap_or_default());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_json(summary: &RunSummary, destination: &Path) -> Result<()> {
    let contents = serde_json::to_string_pretty(summary)?;
    std::fs::write(destination, contents)?;
    Ok(())
}

/// Colored console aggregate: counts and elapsed time.
pub fn print_summary(summary: &RunSummary, label: &str) {
    println!("\n{} {} Summary:", "→".cyan().bold(), label);
    println!("  Total:     {}", summary.total);
    println!("  Succeeded: {}", summary.succeeded.to_string().green());
    if summary.failed > 0 {
        println!("  Failed:    {}", summary.failed.to_string().red());
    }
    if summary.skipped > 0 {
        println!("  Skipped:   {}", summary.skipped.to_string().yellow());
    }

    let elapsed = summary.elapsed();
    let secs = elapsed.num_milliseconds() as f64 / 1000.0;
    println!("  Elapsed:   {:.1}s", secs);

    for result in summary.results.iter().filter(|r| !r.is_success()) {
        match &result.error {
            Some(error) => println!("  {} {}: {}", "✗".red(), result.identity, error),
            None => println!("  {} {}: skipped", "○".dimmed(), result.identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::result::RunSummaryBuilder;
    use crate::bulk::{OperationError, OperationResult, Payload};
    use crate::error::FailureKind;

    fn sample_summary() -> RunSummary {
        let mut payload = Payload::new();
        payload.insert("driveId".to_string(), "b!abc".to_string());
        payload.insert("webUrl".to_string(), "https://x.test/drive".to_string());

        let mut builder = RunSummaryBuilder::new();
        builder.push(OperationResult::succeeded("a@x.com", 1, payload));
        builder.push(OperationResult::failed(
            "b@x.com",
            3,
            OperationError::new(FailureKind::Transient, "throttled"),
        ));
        builder.finish()
    }

    #[test]
    fn csv_flattens_payload_into_columns() {
        let summary = sample_summary();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        write_csv(&summary, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "identity,outcome,attempts,error,finishedAt,driveId,webUrl"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("a@x.com,succeeded,1,"));
        assert!(first.contains("b!abc"));
        let second = lines.next().unwrap();
        assert!(second.starts_with("b@x.com,failed,3,throttled"));
        // Missing payload keys become empty cells, not short records.
        assert!(second.ends_with(",,"));
    }

    #[test]
    fn json_round_trips_counts() {
        let summary = sample_summary();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_json(&summary, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["succeeded"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("xlsx".parse::<ReportFormat>().is_err());
    }
}
