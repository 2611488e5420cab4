use std::cmp::Ordering;

use rstest::rstest;

use forge_resolver::version::{
    self, Constraint, Version, matches, natural_cmp, parse_constraint, sort_natural,
};

fn check(constraint: &str, version: &str) -> bool {
    matches(&parse_constraint(constraint), &version::parse(version))
}

#[rstest]
#[case("^1.2.3", "1.9.9", true)]
#[case("^1.2.3", "2.0.0", false)]
#[case("~1.2.3", "1.2.9", true)]
#[case("~1.2.3", "1.3.0", false)]
#[case("", "0.0.0", true)]
#[case("", "12.4.1-rc.3", true)]
#[case("0.0.0", "3.9.8", true)]
#[case("1.x", "1.4.2", true)]
#[case("1.2.*", "1.3.0", false)]
#[case(">=3.9.0 <3.11.0", "3.10.4", true)]
#[case("~3.9.0 || ~3.11.0", "3.10.0", false)]
#[case(">=1.0.0", "٣.٤.٥", false)]
fn constraint_matches_published_examples(
    #[case] constraint: &str,
    #[case] version: &str,
    #[case] expected: bool,
) {
    assert_eq!(check(constraint, version), expected);
}

#[test]
fn parse_strips_v_prefix() {
    assert_eq!(version::parse("v2.1.0"), version::parse("2.1.0"));
    assert_eq!(version::parse("V2.1.0"), version::parse("2.1.0"));
}

#[test]
fn parse_falls_back_to_labelled_zero_version() {
    let v = version::parse("nightly build");
    assert_eq!((v.major, v.minor, v.patch), (0, 0, 0));
    assert_eq!(v.labels.len(), 1);
    assert_eq!(v.labels[0].as_str(), "nightly build");
    assert_eq!(v.raw, "nightly build");
}

#[rstest]
#[case("1.0.0-beta", "1.0.0", Ordering::Less)]
#[case("1.0.0-2", "1.0.0-10", Ordering::Less)]
#[case("1.0.0-10", "1.0.0-alpha", Ordering::Less)]
#[case("1.0.0-alpha", "1.0.0-alpha.1", Ordering::Less)]
#[case("3.10.0", "3.9.8", Ordering::Greater)]
fn compare_follows_release_precedence(
    #[case] a: &str,
    #[case] b: &str,
    #[case] expected: Ordering,
) {
    assert_eq!(
        version::compare(&version::parse(a), &version::parse(b)),
        expected
    );
}

#[test]
fn non_ascii_digits_do_not_outrank_releases() {
    let v = version::parse("٣.٤.٥");
    assert_eq!((v.major, v.minor, v.patch), (0, 0, 0));
    assert!(v < version::parse("0.0.1"));
}

#[test]
fn sort_natural_orders_display_strings() {
    let mut values = vec!["3.10.0", "3.9.8", "3.9.10", "3.9.8-beta"];
    sort_natural(&mut values);
    assert_eq!(values, vec!["3.9.8", "3.9.8-beta", "3.9.10", "3.10.0"]);
}

#[test]
fn natural_cmp_is_consistent_with_equality() {
    assert_eq!(natural_cmp("v01", "v1").reverse(), natural_cmp("v1", "v01"));
    assert_ne!(natural_cmp("v01", "v1"), Ordering::Equal);
    assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
}

#[test]
fn max_satisfying_selects_greatest_release() {
    let versions: Vec<Version> = ["1.0.0", "1.5.0", "2.0.0"]
        .into_iter()
        .map(Version::parse)
        .collect();
    let best = Constraint::parse("^1.0.0").max_satisfying(&versions);
    assert_eq!(best.map(|v| v.raw.as_str()), Some("1.5.0"));
}

#[test]
fn constraint_serde_preserves_authored_text() {
    let c: Constraint = serde_json::from_str("\" >= 3.9 \"").unwrap();
    assert_eq!(c, Constraint::parse(">=3.9.0"));
    assert_eq!(serde_json::to_string(&c).unwrap(), "\">= 3.9\"");
}
