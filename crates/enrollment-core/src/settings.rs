use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::layout::ReportLayout;
use crate::models::TableFormat;
use crate::vocabulary::SubjectVocabulary;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Turn SWRCGSR enrollment report text into record and aggregate tables
#[derive(Parser, Debug, Clone)]
#[command(
    name = "enrollment-report",
    about = "Turn SWRCGSR enrollment report text into record and aggregate tables",
    version
)]
pub struct Settings {
    /// Report file, or a directory of reports
    #[arg(required_unless_present = "retrieval_plan")]
    pub input: Option<PathBuf>,

    /// Built-in report layout
    #[arg(long, value_parser = ["standard", "banner9"])]
    pub layout: Option<String>,

    /// JSON layout file (takes precedence over --layout)
    #[arg(long)]
    pub layout_file: Option<PathBuf>,

    /// Pipeline configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Keep only these subject codes (comma separated)
    #[arg(short = 'd', long = "dept", value_delimiter = ',')]
    pub subjects: Vec<String>,

    /// Output table format
    #[arg(long, value_parser = ["csv", "tsv"])]
    pub format: Option<String>,

    /// Directory for the output tables (defaults to the report's directory)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Print report statistics as JSON on stdout
    #[arg(long)]
    pub summary_json: bool,

    /// Rename each report to <REPORT>_<TERM>_<YYYYMMDD>.<ext> after processing
    #[arg(long)]
    pub archive: bool,

    /// Print the retrieval queries described by a parameter file and exit
    #[arg(long, value_name = "INFO")]
    pub retrieval_plan: Option<PathBuf>,

    /// Include canceled sections in retrieval queries
    #[arg(short = 'c', long)]
    pub cancel: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── PipelineConfig ─────────────────────────────────────────────────────────────

/// Pipeline configuration read from `<config_dir>/enrollment-report/config.json`
/// or an explicit `--config` file. Command-line values always win.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_file: Option<PathBuf>,
    #[serde(default)]
    pub vocabulary: SubjectVocabulary,
    #[serde(default)]
    pub subject_filter: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<TableFormat>,
    /// Location codes that mean an online section (whitespace-insensitive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_locations: Option<Vec<String>>,
}

impl PipelineConfig {
    /// Return the default path to the config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join("enrollment-report").join("config.json")
    }

    /// Load the config at the default path; a missing file means defaults.
    pub fn load_default() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an explicit path. Missing or malformed files are errors.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the config, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

// ── PipelineOptions ────────────────────────────────────────────────────────────

/// Everything the pipeline needs for one run, resolved from CLI and config.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub layout: ReportLayout,
    pub vocabulary: SubjectVocabulary,
    /// Canonical subject codes to keep; empty keeps everything.
    pub subject_filter: BTreeSet<String>,
    pub format: TableFormat,
    pub online_locations: Vec<String>,
}

/// Location codes the Banner report uses for online sections.
pub fn default_online_locations() -> Vec<String> {
    vec!["SYNC T".to_string(), "ASYN T".to_string()]
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            layout: ReportLayout::standard(),
            vocabulary: SubjectVocabulary::default(),
            subject_filter: BTreeSet::new(),
            format: TableFormat::Csv,
            online_locations: default_online_locations(),
        }
    }
}

impl PipelineOptions {
    /// Merge `config` under the CLI `settings`: CLI > config > built-in default.
    pub fn resolve(settings: &Settings, config: PipelineConfig) -> Result<Self> {
        let layout = match settings.layout_file.as_ref().or(config.layout_file.as_ref()) {
            Some(path) => ReportLayout::load_from(path)?,
            None => {
                let name = settings
                    .layout
                    .as_deref()
                    .or(config.layout.as_deref())
                    .unwrap_or("standard");
                let layout = ReportLayout::builtin(name)
                    .ok_or_else(|| ReportError::Config(format!("unknown layout {}", name)))?;
                layout.validate()?;
                layout
            }
        };

        let format = match settings.format.as_deref() {
            Some(name) => TableFormat::from_name(name)
                .ok_or_else(|| ReportError::Config(format!("unknown format {}", name)))?,
            None => config.format.unwrap_or_default(),
        };

        let raw_filter = if settings.subjects.is_empty() {
            &config.subject_filter
        } else {
            &settings.subjects
        };
        let subject_filter = raw_filter
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| config.vocabulary.canonicalize(s).into_code())
            .collect();

        Ok(Self {
            layout,
            subject_filter,
            format,
            online_locations: config
                .online_locations
                .unwrap_or_else(default_online_locations),
            vocabulary: config.vocabulary,
        })
    }
}

impl Settings {
    /// Load the pipeline config (explicit `--config`, else the default path)
    /// and resolve the run options.
    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        let config = match &self.config {
            Some(path) => PipelineConfig::load_from(path)?,
            None => PipelineConfig::load_default()?,
        };
        PipelineOptions::resolve(self, config)
    }

    /// Effective tracing filter directive; `--debug` overrides `--log-level`.
    pub fn tracing_level(&self) -> &'static str {
        if self.debug {
            return "debug";
        }
        match self.log_level.to_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARNING" => "warn",
            "ERROR" => "error",
            _ => "info",
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
