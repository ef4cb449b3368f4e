//! Heuristic lexical scoring between a source name and a target name.
//!
//! Four scores are computed over the normalized forms and the best one wins:
//!
//! | rule | confidence | method |
//! |---|---|---|
//! | substring containment (shorter ≥ 3 chars) | 0.85 + 0.05 × length ratio, ≤ 0.90 | `partial` |
//! | shared semantic suffix (`id`, `email`, …) | 0.82 | `partial` |
//! | stem overlap ratio ≥ 0.5 | 0.80 + 0.05 × ratio | `partial` |
//! | Indel similarity ratio | ≤ 0.84 | `fuzzy` |
//!
//! Targets with registered aliases get a second pass against each alias; a
//! result ≥ 0.85 there is worth its score minus 0.05 as `alias_partial`.

use std::cmp::Ordering;
use std::sync::Arc;

use fieldmap_model::{CandidateMatch, MatchMethod};
use rapidfuzz::fuzz;
use tracing::trace;

use crate::aliases::AliasDictionary;
use crate::normalize::{normalize, split_words};

const SUBSTRING_MIN_LEN: usize = 3;
const SUBSTRING_BASE: f32 = 0.85;
const SUBSTRING_CAP: f32 = 0.90;
const SUFFIX_SCORE: f32 = 0.82;
const OVERLAP_BASE: f32 = 0.80;
const OVERLAP_MIN_RATIO: f32 = 0.5;
const FUZZY_CAP: f32 = 0.84;
const ALIAS_PARTIAL_MIN: f32 = 0.85;
const ALIAS_PARTIAL_PENALTY: f32 = 0.05;

/// Suffixes checked longest first so `timestamp` is preferred over `time`.
const SEMANTIC_SUFFIXES: [&str; 9] = [
    "timestamp", "location", "email", "phone", "name", "date", "time", "url", "id",
];

/// Stems recognised by the word-overlap rule.
const STEM_VOCABULARY: &[&str] = &[
    "work", "home", "personal", "private", "office", "business", "mobile", "cell", "first",
    "last", "middle", "full", "given", "family", "email", "mail", "phone", "address", "street",
    "city", "state", "zip", "postal", "country", "birth", "date", "start", "end", "hire", "job",
    "title", "department", "manager", "salary", "company", "employee", "candidate", "person",
    "user", "name", "number", "code", "status", "source", "skill", "resume", "linkedin", "url",
    "login", "active", "location", "type", "experience", "year", "time",
];

/// A name prepared for scoring.
#[derive(Debug, Clone)]
struct Form {
    normalized: String,
    last_word: Option<String>,
}

impl Form {
    fn new(name: &str) -> Self {
        Self {
            normalized: normalize(name),
            last_word: split_words(name).pop(),
        }
    }

    /// Aliases are stored normalized, so their word boundaries are unknown.
    fn from_normalized(normalized: &str) -> Self {
        Self {
            normalized: normalized.to_string(),
            last_word: None,
        }
    }
}

/// Lexical matcher over a shared alias dictionary.
#[derive(Debug, Clone, Default)]
pub struct LexicalMatcher {
    aliases: Arc<AliasDictionary>,
}

impl LexicalMatcher {
    pub fn new(aliases: Arc<AliasDictionary>) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasDictionary {
        &self.aliases
    }

    /// Scores one pair. Always returns a definite result; a hopeless pair
    /// comes back as a low `fuzzy` score.
    pub fn score(&self, source: &str, target: &str) -> CandidateMatch {
        let source_form = Form::new(source);
        let (confidence, method) = base_score(&source_form, &Form::new(target));
        let mut best = (confidence, method);

        for alias in self.aliases.aliases_for(target) {
            let (alias_score, _) = base_score(&source_form, &Form::from_normalized(alias));
            if alias_score >= ALIAS_PARTIAL_MIN {
                let candidate = (alias_score - ALIAS_PARTIAL_PENALTY, MatchMethod::AliasPartial);
                if compare(candidate, best) == Ordering::Greater {
                    best = candidate;
                }
            }
        }

        trace!(source, target, confidence = best.0, method = %best.1, "lexical score");
        CandidateMatch::new(target, best.0, best.1)
    }

    /// Scores the source against every target, best first.
    ///
    /// Ties on confidence are broken by method priority
    /// (`alias_partial` > `partial` > `fuzzy`), then by target order.
    pub fn rank<S: AsRef<str>>(&self, source: &str, targets: &[S]) -> Vec<CandidateMatch> {
        let mut ranked: Vec<CandidateMatch> = targets
            .iter()
            .map(|target| self.score(source, target.as_ref()))
            .collect();
        ranked.sort_by(|a, b| compare((b.confidence, b.method), (a.confidence, a.method)));
        ranked
    }

    /// Best target for the source, if there are any targets at all.
    pub fn best_match<S: AsRef<str>>(&self, source: &str, targets: &[S]) -> Option<CandidateMatch> {
        self.rank(source, targets).into_iter().next()
    }
}

fn compare(a: (f32, MatchMethod), b: (f32, MatchMethod)) -> Ordering {
    a.0.total_cmp(&b.0)
        .then_with(|| a.1.lexical_priority().cmp(&b.1.lexical_priority()))
}

fn base_score(source: &Form, target: &Form) -> (f32, MatchMethod) {
    let (a, b) = (source.normalized.as_str(), target.normalized.as_str());
    if a.is_empty() || b.is_empty() {
        return (0.0, MatchMethod::Fuzzy);
    }

    let mut partial: f32 = 0.0;
    if let Some(score) = substring_score(a, b) {
        partial = partial.max(score);
    }
    if shares_semantic_suffix(source, target) {
        partial = partial.max(SUFFIX_SCORE);
    }
    if let Some(score) = overlap_score(a, b) {
        partial = partial.max(score);
    }

    let fuzzy = (fuzz::ratio(a.chars(), b.chars()) as f32).min(FUZZY_CAP);

    // On equal scores `partial` outranks `fuzzy`.
    if partial > 0.0 && partial >= fuzzy {
        (partial, MatchMethod::Partial)
    } else {
        (fuzzy, MatchMethod::Fuzzy)
    }
}

fn substring_score(a: &str, b: &str) -> Option<f32> {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let shorter_len = shorter.chars().count();
    if shorter_len < SUBSTRING_MIN_LEN || !longer.contains(shorter) {
        return None;
    }
    let ratio = shorter_len as f32 / longer.chars().count() as f32;
    Some((SUBSTRING_BASE + 0.05 * ratio).min(SUBSTRING_CAP))
}

/// Both names end with the same semantic suffix and have something before it.
///
/// Short suffixes (`id`, `url`) must also be a whole trailing word, so `paid`
/// does not look like an identifier.
fn shares_semantic_suffix(source: &Form, target: &Form) -> bool {
    let (a, b) = (source.normalized.as_str(), target.normalized.as_str());
    SEMANTIC_SUFFIXES.iter().any(|suffix| {
        let ends = |s: &str| s.len() > suffix.len() && s.ends_with(suffix);
        if !ends(a) || !ends(b) {
            return false;
        }
        if suffix.len() > 3 {
            return true;
        }
        let whole_word = |form: &Form| {
            form.last_word
                .as_deref()
                .is_none_or(|word| word == *suffix)
        };
        whole_word(source) && whole_word(target)
    })
}

fn overlap_score(a: &str, b: &str) -> Option<f32> {
    let stems_a = stems_in(a);
    let stems_b = stems_in(b);
    if stems_a.is_empty() || stems_b.is_empty() {
        return None;
    }
    let shared = stems_a.iter().filter(|stem| stems_b.contains(stem)).count();
    let ratio = shared as f32 / stems_a.len().max(stems_b.len()) as f32;
    (ratio >= OVERLAP_MIN_RATIO).then(|| OVERLAP_BASE + 0.05 * ratio)
}

fn stems_in(normalized: &str) -> Vec<&'static str> {
    STEM_VOCABULARY
        .iter()
        .copied()
        .filter(|stem| normalized.contains(stem))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> LexicalMatcher {
        LexicalMatcher::new(Arc::new(AliasDictionary::builtin()))
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn substring_containment_scales_with_length_ratio() {
        let hit = matcher().score("WorkEmails", "EMAIL");
        assert_eq!(hit.method, MatchMethod::Partial);
        // 0.85 + 0.05 * 5/10
        assert!(approx(hit.confidence, 0.875));
    }

    #[test]
    fn substring_needs_three_chars() {
        assert!(substring_score("id", "personid").is_none());
        assert!(substring_score("pid", "personpid").is_some());
    }

    #[test]
    fn substring_is_capped() {
        let score = substring_score("email", "email").unwrap();
        assert!(approx(score, 0.90));
    }

    #[test]
    fn shared_suffix_scores_082() {
        let hit = LexicalMatcher::default().score("PersonID", "CANDIDATE_ID");
        assert!(approx(hit.confidence, 0.82));
        assert_eq!(hit.method, MatchMethod::Partial);
    }

    #[test]
    fn short_suffix_must_be_a_word() {
        assert!(!shares_semantic_suffix(&Form::new("paid"), &Form::new("CANDIDATE_ID")));
        assert!(shares_semantic_suffix(&Form::new("emp_id"), &Form::new("MANAGER_ID")));
    }

    #[test]
    fn word_overlap_uses_stems() {
        // {home, phone} vs {work, phone}: 1/2
        let score = overlap_score("homephone", "workphone").unwrap();
        assert!(approx(score, 0.825));
        assert!(overlap_score("salutation", "status").is_none());
    }

    #[test]
    fn fuzzy_is_capped() {
        let hit = LexicalMatcher::default().score("adress", "ADDRESS");
        assert!(hit.confidence <= FUZZY_CAP + 1e-6);
        assert!(hit.confidence > 0.80);
        assert_eq!(hit.method, MatchMethod::Fuzzy);
    }

    #[test]
    fn alias_partial_pass() {
        // "mobile" is an alias of MOBILE_PHONE; "mobile_no" contains it.
        let hit = matcher().score("mobile_no", "MOBILE_PHONE");
        assert_eq!(hit.method, MatchMethod::AliasPartial);
        assert!(hit.confidence >= 0.80);
    }

    #[test]
    fn empty_source_scores_zero() {
        let hit = matcher().score("__", "EMAIL");
        assert_eq!(hit.confidence, 0.0);
    }

    #[test]
    fn rank_orders_best_first() {
        let ranked = matcher().rank("WorkEmails", &["PHONE", "EMAIL", "CITY"]);
        assert_eq!(ranked[0].target_field, "EMAIL");
        assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn salutation_stays_below_threshold() {
        let targets = ["CANDIDATE_ID", "FIRST_NAME", "LAST_NAME", "EMAIL", "STATUS", "LOCATION"];
        let best = matcher().best_match("Salutation", &targets).unwrap();
        assert!(best.confidence < 0.70, "{best:?}");
    }
}
