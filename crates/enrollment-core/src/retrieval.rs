//! Report retrieval parameters.
//!
//! The retrieval side (driving the SWRCGSR form in the student information
//! system) is an external collaborator. What it needs from us is an explicit
//! parameter set per term, read from a small `key = value` file:
//!
//! ```text
//! term = 201940, 202030, 202040
//! department = M&CS
//! school = LA
//! createmergefile = N
//! ```
//!
//! Only `term` is mandatory; every other key defaults to the `%` wildcard.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::{ReportError, Result};

/// Wildcard accepted by every SWRCGSR form field.
pub const WILDCARD: &str = "%";

/// Form fields in the order the SWRCGSR parameter page lists them.
pub const FORM_FIELDS: [&str; 10] = [
    "term",
    "subject",
    "school",
    "department",
    "campus",
    "status",
    "session",
    "createmergefile",
    "scheduletype",
    "level",
];

/// Parsed retrieval parameter file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalParams {
    pub terms: Vec<String>,
    /// Section status: `A` (active only) or `%` (include canceled).
    pub status: String,
    /// Every other key, values split on whitespace.
    pub values: BTreeMap<String, Vec<String>>,
}

/// One filled-in SWRCGSR form, ready for the retrieval collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalQuery {
    pub term: String,
    /// `(form field, value)` in form order.
    pub fields: Vec<(String, String)>,
}

impl RetrievalParams {
    /// Parse the parameter file text.
    ///
    /// Blank lines and `#` comments are ignored. `term` is split on commas,
    /// everything else on whitespace.
    pub fn parse(text: &str, include_canceled: bool) -> Result<Self> {
        let mut terms = Vec::new();
        let mut values = BTreeMap::new();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                debug!("ignoring parameter line {} without '=': {:?}", idx + 1, line);
                continue;
            };
            let key = key.trim().to_lowercase();
            if key == "term" {
                terms = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            } else {
                let items: Vec<String> = value.split_whitespace().map(str::to_string).collect();
                if items.is_empty() {
                    return Err(ReportError::Config(format!(
                        "parameter {} on line {} has no value",
                        key,
                        idx + 1
                    )));
                }
                values.insert(key, items);
            }
        }

        if terms.is_empty() {
            return Err(ReportError::Config(
                "retrieval parameters must name at least one term".to_string(),
            ));
        }

        Ok(Self {
            terms,
            status: if include_canceled { WILDCARD } else { "A" }.to_string(),
            values,
        })
    }

    pub fn load_from(path: &Path, include_canceled: bool) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, include_canceled)
    }

    /// Value typed into `field`, `%` when the file leaves it open.
    pub fn value(&self, field: &str) -> String {
        self.values
            .get(field)
            .map(|v| v.join(" "))
            .unwrap_or_else(|| WILDCARD.to_string())
    }

    /// One form submission per term.
    pub fn queries(&self) -> Vec<RetrievalQuery> {
        self.terms
            .iter()
            .map(|term| RetrievalQuery {
                term: term.clone(),
                fields: FORM_FIELDS
                    .iter()
                    .map(|field| {
                        let value = match *field {
                            "term" => term.clone(),
                            "status" => self.status.clone(),
                            other => self.value(other),
                        };
                        (field.to_string(), value)
                    })
                    .collect(),
            })
            .collect()
    }
}
