//! Subject code vocabulary.
//!
//! Departments rename and reletter their codes over the years (`CHEM` vs
//! `CHE`, `M&CS` vs `MTH`). The vocabulary maps every known spelling to its
//! canonical code so aggregates don't split one department in two.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Result of looking a code up in the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    /// Already canonical.
    Known(String),
    /// An alias, rewritten to its canonical code.
    Aliased { from: String, to: String },
    /// Not in the vocabulary; passed through for operator review.
    Unknown(String),
}

impl Canonical {
    pub fn code(&self) -> &str {
        match self {
            Canonical::Known(c) | Canonical::Unknown(c) => c,
            Canonical::Aliased { to, .. } => to,
        }
    }

    pub fn into_code(self) -> String {
        match self {
            Canonical::Known(c) | Canonical::Unknown(c) => c,
            Canonical::Aliased { to, .. } => to,
        }
    }
}

/// Canonical subject codes plus their known aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectVocabulary {
    #[serde(default)]
    pub canonical: BTreeSet<String>,
    /// alias → canonical code.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl SubjectVocabulary {
    pub fn new<I, S>(canonical: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            canonical: canonical
                .into_iter()
                .map(|s| s.into().trim().to_uppercase())
                .collect(),
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
        let canonical = canonical.trim().to_uppercase();
        self.canonical.insert(canonical.clone());
        self.aliases.insert(alias.trim().to_uppercase(), canonical);
        self
    }

    /// An empty vocabulary disables canonicalisation and review flagging.
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty() && self.aliases.is_empty()
    }

    /// Canonicalise `code` (trimmed, upper-cased).
    pub fn canonicalize(&self, code: &str) -> Canonical {
        let code = code.trim().to_uppercase();
        if let Some(target) = self.aliases.get(&code) {
            if *target != code {
                return Canonical::Aliased {
                    from: code,
                    to: target.clone(),
                };
            }
            return Canonical::Known(code);
        }
        if self.is_empty() || self.canonical.contains(&code) {
            Canonical::Known(code)
        } else {
            Canonical::Unknown(code)
        }
    }
}
