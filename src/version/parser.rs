//! Version string parsing
//!
//! Parsing is total: any input produces a [`Version`]. Text without a numeric
//! prefix falls back to `0.0.0` carrying the whole text as a single label.

use std::sync::LazyLock;

use regex::Regex;

use crate::version::types::{Label, Version};

/// Numeric dotted prefix: `1`, `1.2`, `1.2.3`, ASCII digits only
static NUMERIC_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?").unwrap());

/// Constraint operand: components may be `x`, `X` or `*`
static PARTIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+|[xX*])(?:\.([0-9]+|[xX*]))?(?:\.([0-9]+|[xX*]))?").unwrap()
});

/// Strip a leading `v`/`V` only when it prefixes a digit
pub(crate) fn strip_v_prefix(text: &str) -> &str {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some('v' | 'V'), Some(c)) if c.is_ascii_digit() => &text[1..],
        _ => text,
    }
}

fn parse_component(digits: &str) -> u32 {
    // Saturate instead of failing on absurdly large components
    digits.parse::<u32>().unwrap_or(u32::MAX)
}

/// Split trailing label text on `.`, `-` and `+`
pub(crate) fn split_labels(rest: &str) -> Vec<Label> {
    rest.split(['.', '-', '+'])
        .filter(|s| !s.is_empty())
        .map(Label::new)
        .collect()
}

/// Parse text that starts with a numeric component, returning `None` otherwise
pub fn try_parse(text: &str) -> Option<Version> {
    let raw = text.trim();
    let body = strip_v_prefix(raw);
    let caps = NUMERIC_PREFIX_RE.captures(body)?;
    let component = |i: usize| caps.get(i).map_or(0, |m| parse_component(m.as_str()));
    let end = caps.get(0).map_or(0, |m| m.end());

    Some(Version {
        major: component(1),
        minor: component(2),
        patch: component(3),
        labels: split_labels(&body[end..]),
        raw: raw.to_string(),
    })
}

/// Parse any text into a version
///
/// - `"v1.2.3-beta.1"` -> 1.2.3 with labels `["beta", "1"]`
/// - `"1.2"` -> 1.2.0
/// - `"latest"` -> 0.0.0 with label `["latest"]`
/// - `""` -> 0.0.0
pub fn parse(text: &str) -> Version {
    try_parse(text).unwrap_or_else(|| {
        let raw = text.trim();
        let labels = if raw.is_empty() {
            Vec::new()
        } else {
            vec![Label::Alpha(raw.to_string())]
        };
        Version {
            major: 0,
            minor: 0,
            patch: 0,
            labels,
            raw: raw.to_string(),
        }
    })
}

/// A possibly incomplete version used as a constraint operand
///
/// Missing or wildcard components are `None`; components following a
/// wildcard are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Partial {
    pub major: Option<u32>,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
    pub labels: Vec<Label>,
    /// At least one component was written as `x`, `X` or `*`
    pub wildcard: bool,
    pub raw: String,
}

impl Partial {
    /// Number of leading components that carry a concrete value
    pub fn specified(&self) -> usize {
        [self.major, self.minor, self.patch]
            .iter()
            .take_while(|c| c.is_some())
            .count()
    }

    /// Pad missing components with zero
    pub fn floor(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            labels: self.labels.clone(),
            raw: self.raw.clone(),
        }
    }
}

/// Parse a constraint operand such as `1.2.x`, `^0.3`, `v3.9.8-beta`
pub(crate) fn parse_partial(text: &str) -> Option<Partial> {
    let raw = text.trim();
    let body = strip_v_prefix(raw);
    let caps = PARTIAL_RE.captures(body)?;
    let end = caps.get(0).map_or(0, |m| m.end());

    let mut wildcard = false;
    let mut components = [None; 3];
    for (i, slot) in components.iter_mut().enumerate() {
        let Some(m) = caps.get(i + 1) else { break };
        match m.as_str() {
            "x" | "X" | "*" => {
                wildcard = true;
                break;
            }
            digits => *slot = Some(parse_component(digits)),
        }
    }

    Some(Partial {
        major: components[0],
        minor: components[1].filter(|_| components[0].is_some()),
        patch: components[2].filter(|_| components[1].is_some()),
        labels: if wildcard {
            Vec::new()
        } else {
            split_labels(&body[end..])
        },
        wildcard,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn labels(v: &Version) -> Vec<&str> {
        v.labels.iter().map(Label::as_str).collect()
    }

    #[rstest]
    #[case("1.2.3", (1, 2, 3), vec![])]
    #[case("v1.2.3", (1, 2, 3), vec![])]
    #[case("V1.2.3", (1, 2, 3), vec![])]
    #[case("  1.2.3  ", (1, 2, 3), vec![])]
    #[case("1.2", (1, 2, 0), vec![])]
    #[case("1", (1, 0, 0), vec![])]
    #[case("1.2.3-beta.1", (1, 2, 3), vec!["beta", "1"])]
    #[case("1.2.3-beta+build.5", (1, 2, 3), vec!["beta", "build", "5"])]
    #[case("1.2.3beta", (1, 2, 3), vec!["beta"])]
    #[case("3.9.8.1", (3, 9, 8), vec!["1"])]
    #[case("1.2-rc1", (1, 2, 0), vec!["rc1"])]
    #[case("latest", (0, 0, 0), vec!["latest"])]
    #[case("very-old", (0, 0, 0), vec!["very-old"])]
    #[case("v", (0, 0, 0), vec!["v"])]
    #[case("", (0, 0, 0), vec![])]
    #[case("99999999999.1.2", (u32::MAX, 1, 2), vec![])]
    #[case("٣.٤.٥", (0, 0, 0), vec!["٣.٤.٥"])]
    #[case("v١.2.3", (0, 0, 0), vec!["v١.2.3"])]
    fn parse_returns_expected(
        #[case] input: &str,
        #[case] triplet: (u32, u32, u32),
        #[case] expected_labels: Vec<&str>,
    ) {
        let v = parse(input);
        assert_eq!((v.major, v.minor, v.patch), triplet);
        assert_eq!(labels(&v), expected_labels);
        assert_eq!(v.raw, input.trim());
    }

    #[test]
    fn parse_strips_prefix_idempotently() {
        assert_eq!(parse("v2.1.0"), parse("2.1.0"));
        assert_eq!(parse(&parse("v2.1.0").normalized()), parse("2.1.0"));
    }

    #[rstest]
    #[case("1.2.3", true)]
    #[case("v0.1", true)]
    #[case("latest", false)]
    #[case("", false)]
    #[case("x.1", false)]
    #[case("٣.٤.٥", false)]
    fn try_parse_requires_numeric_prefix(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(try_parse(input).is_some(), expected);
    }

    #[rstest]
    #[case("1.2.3", (Some(1), Some(2), Some(3)), false, 3)]
    #[case("1.2", (Some(1), Some(2), None), false, 2)]
    #[case("1", (Some(1), None, None), false, 1)]
    #[case("1.x", (Some(1), None, None), true, 1)]
    #[case("1.2.*", (Some(1), Some(2), None), true, 2)]
    #[case("1.X.3", (Some(1), None, None), true, 1)]
    #[case("*", (None, None, None), true, 0)]
    fn parse_partial_returns_expected(
        #[case] input: &str,
        #[case] components: (Option<u32>, Option<u32>, Option<u32>),
        #[case] wildcard: bool,
        #[case] specified: usize,
    ) {
        let p = parse_partial(input).unwrap();
        assert_eq!((p.major, p.minor, p.patch), components);
        assert_eq!(p.wildcard, wildcard);
        assert_eq!(p.specified(), specified);
    }

    #[test]
    fn parse_partial_rejects_non_numeric_text() {
        assert_eq!(parse_partial("latest"), None);
        assert_eq!(parse_partial(""), None);
    }
}
