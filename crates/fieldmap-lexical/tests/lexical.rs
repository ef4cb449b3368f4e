use std::fs;
use std::sync::Arc;

use fieldmap_lexical::{AliasDictionary, AliasError, ExactAliasMatcher, LexicalMatcher, normalize};
use fieldmap_model::MatchMethod;
use proptest::prelude::*;

#[test]
fn first_name_spellings_share_one_token() {
    let tokens: Vec<String> = ["first_name", "FirstName", "FIRST NAME", "first-name", "cust_first_name"]
        .iter()
        .map(|name| normalize(name))
        .collect();
    assert!(tokens.iter().all(|t| t == "firstname"), "{tokens:?}");
}

#[test]
fn exact_matcher_resolves_all_first_name_spellings() {
    let matcher = ExactAliasMatcher::new(AliasDictionary::builtin());
    for source in ["first_name", "FirstName", "FIRST NAME"] {
        let hit = matcher.match_field(source, &["FIRST_NAME"]).expect(source);
        assert_eq!(hit.method, MatchMethod::Exact);
        assert_eq!(hit.confidence, 1.0);
    }
}

#[test]
fn alias_file_merges_into_builtin() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("aliases.json");
    fs::write(&path, r#"{"DEPARTMENT": ["cost_center", "org_unit"]}"#).unwrap();

    let mut aliases = AliasDictionary::builtin();
    aliases.merge(AliasDictionary::from_file(&path).expect("alias file"));

    let matcher = ExactAliasMatcher::new(aliases);
    let hit = matcher.match_field("OrgUnit", &["DEPARTMENT", "LOCATION"]).unwrap();
    assert_eq!(hit.target_field, "DEPARTMENT");
    assert_eq!(hit.method, MatchMethod::Alias);
}

#[test]
fn alias_file_errors_carry_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.json");
    assert!(matches!(
        AliasDictionary::from_file(&missing),
        Err(AliasError::Io { ref path, .. }) if path == &missing
    ));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "[1, 2").unwrap();
    assert!(matches!(AliasDictionary::from_file(&broken), Err(AliasError::Json { .. })));
}

#[test]
fn long_spellings_still_score_as_partial() {
    // "emailaddr" is a builtin alias of EMAIL; the source contains it.
    let matcher = LexicalMatcher::new(Arc::new(AliasDictionary::builtin()));
    let hit = matcher.score("primary_emailaddr_1", "EMAIL");
    assert!(matches!(hit.method, MatchMethod::Partial | MatchMethod::AliasPartial));
    assert!(hit.confidence >= 0.80);
}

proptest! {
    #[test]
    fn normalize_is_idempotent(name in "[A-Za-z0-9 _.-]{0,24}") {
        let once = normalize(&name);
        prop_assert_eq!(normalize(&once), once.clone());
        prop_assert!(once.chars().all(char::is_alphanumeric));
    }

    #[test]
    fn lexical_scores_stay_in_unit_range(
        source in "[A-Za-z_]{0,16}",
        target in "[A-Z_]{1,16}",
    ) {
        let matcher = LexicalMatcher::new(Arc::new(AliasDictionary::builtin()));
        let hit = matcher.score(&source, &target);
        prop_assert!((0.0..=1.0).contains(&hit.confidence));
        prop_assert!(hit.confidence <= 0.90 + 1e-6);
    }
}
