mod bootstrap;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use enrollment_core::error::ReportError;
use enrollment_core::formatting::{format_number, format_percent, format_run_summary};
use enrollment_core::models::RunSummary;
use enrollment_core::retrieval::RetrievalParams;
use enrollment_core::settings::Settings;
use enrollment_data::aggregator::{AggregateRow, Aggregator};
use enrollment_data::analysis::{process_file, report_paths};
use enrollment_data::exporter::export;

fn main() -> ExitCode {
    let settings = Settings::parse();

    if let Err(e) = bootstrap::setup_logging(settings.tracing_level()) {
        eprintln!("Failed to initialise logging: {}", e);
    }
    tracing::info!("enrollment-report v{} starting", env!("CARGO_PKG_VERSION"));

    let mut summary = RunSummary::default();
    match run(&settings, &mut summary) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", report_failure(&err));
            eprintln!("{}", format_run_summary(&summary));
            ExitCode::FAILURE
        }
    }
}

/// The stderr line for a failed run: error kind and stage when the error
/// came from the pipeline.
fn report_failure(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ReportError>() {
        Some(report_err) => format!(
            "{} in {} stage: {}",
            report_err.kind(),
            report_err.stage(),
            report_err
        ),
        None => format!("Error: {:#}", err),
    }
}

/// Process every report behind the input path. `summary` keeps the counts
/// of reports finished before any failure.
fn run(settings: &Settings, summary: &mut RunSummary) -> Result<()> {
    if let Some(plan) = &settings.retrieval_plan {
        let params = RetrievalParams::load_from(plan, settings.cancel)?;
        println!("{}", serde_json::to_string_pretty(&params.queries())?);
        return Ok(());
    }

    let input = settings
        .input
        .as_deref()
        .ok_or_else(|| ReportError::Config("no report path given".to_string()))?;
    let options = settings.pipeline_options()?;
    tracing::info!(
        "Layout: {}, format: {}",
        options.layout.name,
        options.format.extension()
    );

    let output_dir = settings.output_dir.as_deref();
    let reports = report_paths(input)?;
    let stems = bootstrap::output_stems(input, &reports, output_dir)?;
    let mut sections: Vec<AggregateRow> = Vec::new();

    for (path, stem) in reports.iter().zip(&stems) {
        let report = process_file(path, &options)?;
        summary.absorb(&report.summary);

        if output_dir.is_some() {
            if let Some(dir) = stem.parent() {
                bootstrap::ensure_output_dir(dir)?;
            }
        }
        export(&report.records, &report.aggregates, stem, options.format)?;
        sections = Aggregator::merge(&sections, &report.aggregates);

        if settings.summary_json {
            println!("{}", serde_json::to_string_pretty(&report.statistics)?);
        }
        if settings.archive {
            bootstrap::archive_report(path, &report.metadata)?;
        }
    }

    let totals = Aggregator::totals(&sections);
    println!("{}", format_run_summary(summary));
    println!(
        "{} sections, {} of {} seats filled ({})",
        format_number(totals.sections as f64, 0),
        format_number(totals.enrolled as f64, 0),
        format_number(totals.capacity as f64, 0),
        format_percent(totals.fill_ratio())
    );
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::path::Path;
    use tempfile::TempDir;

    const SCENARIO: &str = "FALL2023 BIOL 1010 001 Intro Biology  Smith J   28  30   2   4";

    fn settings_for(input: &Path, output_dir: &Path) -> Settings {
        Settings::parse_from([
            OsStr::new("enrollment-report"),
            input.as_os_str(),
            OsStr::new("--output-dir"),
            output_dir.as_os_str(),
        ])
    }

    // ── report_failure ────────────────────────────────────────────────────────

    #[test]
    fn test_failure_line_names_kind_and_stage() {
        let err = anyhow::Error::from(ReportError::MalformedInput("input is empty".to_string()));
        assert_eq!(
            report_failure(&err),
            "MalformedInputError in reader stage: Malformed input: input is empty"
        );
    }

    #[test]
    fn test_failure_line_for_output_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("taken");
        std::fs::write(&file, "x").unwrap();

        let err = anyhow::Error::from(bootstrap::ensure_output_dir(&file.join("out")).unwrap_err());
        assert!(report_failure(&err).starts_with("IOError in exporter stage: Failed to write"));
    }

    #[test]
    fn test_failure_line_for_other_errors() {
        let err = anyhow::anyhow!("logging already initialised");
        assert_eq!(report_failure(&err), "Error: logging already initialised");
    }

    // ── run ───────────────────────────────────────────────────────────────────

    #[test]
    fn test_run_writes_tables_under_output_dir() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("reports");
        std::fs::create_dir_all(input.join("fall")).unwrap();
        std::fs::create_dir_all(input.join("spring")).unwrap();
        std::fs::write(input.join("fall").join("report.txt"), SCENARIO).unwrap();
        std::fs::write(input.join("spring").join("report.txt"), SCENARIO).unwrap();
        let out = tmp.path().join("out");

        let mut summary = RunSummary::default();
        run(&settings_for(&input, &out), &mut summary).unwrap();

        assert!(out.join("fall").join("report.records.csv").is_file());
        assert!(out.join("spring").join("report.aggregates.csv").is_file());
        assert_eq!(summary.records_processed, 2);
    }

    #[test]
    fn test_run_failure_keeps_finished_reports_in_summary() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("reports");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("a.txt"), SCENARIO).unwrap();
        std::fs::write(input.join("b.txt"), "ENROLLMENT REPORT\n").unwrap();
        let out = tmp.path().join("out");

        let mut summary = RunSummary::default();
        let err = run(&settings_for(&input, &out), &mut summary).unwrap_err();

        assert!(report_failure(&err).starts_with("MalformedInputError in reader stage"));
        assert_eq!(summary.records_processed, 1);
        assert!(out.join("a.records.csv").is_file());
    }
}
