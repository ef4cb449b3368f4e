//! Alias dictionary and the exact/alias matcher (first matching tier).
//!
//! The dictionary maps a target field name to the spellings it is commonly
//! exported as. Keys and aliases are stored normalized, so `"first_name"`,
//! `"FirstName"` and `"FIRST NAME"` all hit the same entry.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use fieldmap_model::{CandidateMatch, MatchMethod};
use tracing::{debug, warn};

use crate::error::AliasError;
use crate::normalize::normalize;

/// Confidence for a normalized-name match.
pub const EXACT_CONFIDENCE: f32 = 1.0;
/// Confidence for a registered alias match.
pub const ALIAS_CONFIDENCE: f32 = 0.95;

const BUILTIN_ALIASES: &str = include_str!("../data/aliases.json");

/// Target name → known aliases, all normalized.
#[derive(Debug, Clone, Default)]
pub struct AliasDictionary {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl AliasDictionary {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// The alias table shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_json_or_empty(BUILTIN_ALIASES, "builtin")
    }

    /// Parses `json`, logging and falling back to an empty table on error.
    fn from_json_or_empty(json: &str, origin: &str) -> Self {
        match Self::from_json(json) {
            Ok(dictionary) => dictionary,
            Err(error) => {
                warn!(%error, origin, "alias table is invalid, matching without aliases");
                Self::new()
            }
        }
    }

    /// Parses a `{ "TARGET": ["alias", ...] }` document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut dictionary = Self::new();
        for (target, aliases) in raw {
            dictionary.extend(&target, aliases);
        }
        Ok(dictionary)
    }

    /// Reads a JSON alias file from disk.
    pub fn from_file(path: &Path) -> Result<Self, AliasError> {
        let contents = fs::read_to_string(path).map_err(|e| AliasError::io(path, e))?;
        let dictionary = Self::from_json(&contents).map_err(|source| AliasError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), targets = dictionary.len(), "loaded alias file");
        Ok(dictionary)
    }

    /// Adds aliases for a target.
    pub fn extend<I, S>(&mut self, target: &str, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = normalize(target);
        if key.is_empty() {
            return;
        }
        let entry = self.entries.entry(key.clone()).or_default();
        for alias in aliases {
            let alias = normalize(alias.as_ref());
            // An alias equal to the target itself is already an exact match.
            if !alias.is_empty() && alias != key {
                entry.insert(alias);
            }
        }
    }

    /// Merges another dictionary into this one. Aliases accumulate.
    pub fn merge(&mut self, other: AliasDictionary) {
        for (target, aliases) in other.entries {
            self.entries.entry(target).or_default().extend(aliases);
        }
    }

    /// Normalized aliases for a target (empty if none are registered).
    pub fn aliases_for(&self, target: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(&normalize(target))
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Whether `source` (any spelling) is a registered alias of `target`.
    pub fn is_alias(&self, source: &str, target: &str) -> bool {
        let source = normalize(source);
        self.entries
            .get(&normalize(target))
            .is_some_and(|set| set.contains(&source))
    }

    /// Number of targets with aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Exact and alias matching. No partial credit.
#[derive(Debug, Clone, Default)]
pub struct ExactAliasMatcher {
    aliases: AliasDictionary,
}

impl ExactAliasMatcher {
    pub fn new(aliases: AliasDictionary) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasDictionary {
        &self.aliases
    }

    /// Matches one source name against the target names.
    ///
    /// Returns `(1.0, exact)` for normalized equality, `(0.95, alias)` for a
    /// registered alias, `None` otherwise. Exact hits win over alias hits;
    /// among alias hits the first target in `targets` order wins.
    pub fn match_field<S: AsRef<str>>(&self, source: &str, targets: &[S]) -> Option<CandidateMatch> {
        let normalized = normalize(source);
        if normalized.is_empty() {
            return None;
        }

        if let Some(target) = targets
            .iter()
            .map(AsRef::as_ref)
            .find(|target| normalize(target) == normalized)
        {
            return Some(CandidateMatch::new(target, EXACT_CONFIDENCE, MatchMethod::Exact));
        }

        targets
            .iter()
            .map(AsRef::as_ref)
            .find(|target| {
                self.aliases
                    .entries
                    .get(&normalize(target))
                    .is_some_and(|set| set.contains(&normalized))
            })
            .map(|target| CandidateMatch::new(target, ALIAS_CONFIDENCE, MatchMethod::Alias))
    }
}
