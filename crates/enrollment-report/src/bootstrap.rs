use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use enrollment_core::error::{ReportError, Result};
use enrollment_core::models::ReportMetadata;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber on stderr.
///
/// `level` is an [`EnvFilter`] directive; `RUST_LOG` wins when set.
/// Unrecognised directives fall back to `"info"`.
pub fn setup_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(layer).try_init()?;
    Ok(())
}

// ── Output paths ───────────────────────────────────────────────────────────────

/// Stem the output tables are written under.
///
/// Without `output_dir` the tables sit next to the report. With it, the
/// report's directory relative to `input` is mirrored under `output_dir`.
pub fn output_stem(input: &Path, report: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = report
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "report".into());
    let parent = report.parent().unwrap_or_else(|| Path::new(""));
    let dir = match output_dir {
        Some(out) => match parent.strip_prefix(input) {
            Ok(relative) => out.join(relative),
            Err(_) => out.to_path_buf(),
        },
        None => parent.to_path_buf(),
    };
    dir.join(stem)
}

/// Output stems for every report, in order.
///
/// Fails before anything is written when two reports would share a stem
/// (`report.txt` beside `report.lis`).
pub fn output_stems(input: &Path, reports: &[PathBuf], output_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut claimed: BTreeMap<PathBuf, &Path> = BTreeMap::new();
    let mut stems = Vec::with_capacity(reports.len());

    for report in reports {
        let stem = output_stem(input, report, output_dir);
        if let Some(previous) = claimed.insert(stem.clone(), report.as_path()) {
            return Err(ReportError::FileWrite {
                source: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!(
                        "{} and {} would write the same tables",
                        previous.display(),
                        report.display()
                    ),
                ),
                path: stem,
            });
        }
        stems.push(stem);
    }
    Ok(stems)
}

/// Create the output directory, including missing parents.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })
}

// ── Archiving ──────────────────────────────────────────────────────────────────

/// Rename `report` to its canonical archive name in the same directory.
///
/// Returns the new path, or `None` when the metadata is incomplete, the
/// report already carries its archive name, or the target exists.
pub fn archive_report(report: &Path, metadata: &ReportMetadata) -> Result<Option<PathBuf>> {
    let extension = report
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "txt".to_string());

    let Some(name) = metadata.archive_file_name(&extension) else {
        warn!(
            "Not archiving {}: report name, term or run date missing",
            report.display()
        );
        return Ok(None);
    };

    let target = report.with_file_name(&name);
    if target == report {
        return Ok(None);
    }
    if target.exists() {
        warn!("Not archiving {}: {} already exists", report.display(), target.display());
        return Ok(None);
    }

    std::fs::rename(report, &target).map_err(|source| ReportError::FileWrite {
        path: target.clone(),
        source,
    })?;
    info!("Archived {} as {}", report.display(), name);
    Ok(Some(target))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
