// src/filter.rs
//! Keyword relevance filter. Case-insensitive substring matching:
//! roles and exclusions against the title, locations against the location.

use serde::{Deserialize, Serialize};

use crate::posting::Posting;

/// Keyword rule set as configured. Empty `roles`/`locations` match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    pub roles: Vec<String>,
    pub locations: Vec<String>,
    pub exclude: Vec<String>,
}

/// Lower-cased copy of [`FilterRules`] ready for matching.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    roles: Vec<String>,
    locations: Vec<String>,
    exclude: Vec<String>,
}

fn lowered(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .map(|k| k.to_lowercase())
        .collect()
}

impl FilterEngine {
    pub fn new(rules: &FilterRules) -> Self {
        Self {
            roles: lowered(&rules.roles),
            locations: lowered(&rules.locations),
            exclude: lowered(&rules.exclude),
        }
    }

    pub fn matches(&self, posting: &Posting) -> bool {
        let title = posting.title.to_lowercase();
        if self.exclude.iter().any(|k| title.contains(k.as_str())) {
            return false;
        }
        let role_ok = self.roles.is_empty() || self.roles.iter().any(|k| title.contains(k.as_str()));
        if !role_ok {
            return false;
        }
        let location = posting.location.to_lowercase();
        self.locations.is_empty() || self.locations.iter().any(|k| location.contains(k.as_str()))
    }
}

/// One-shot form of [`FilterEngine::matches`].
pub fn matches(posting: &Posting, rules: &FilterRules) -> bool {
    FilterEngine::new(rules).matches(posting)
}
