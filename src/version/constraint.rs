//! Constraint grammar
//!
//! Supports the range forms authors write in mod metadata:
//! - `""`, `*`, `x` - any version
//! - `1.2.3`, `=1.2.3` - exact match (`0.0.0` alone is the legacy "unconstrained" sentinel)
//! - `^1.2.3` - compatible with version (>=1.2.3 <2.0.0, tighter below 1.0.0)
//! - `~1.2.3` - approximately equivalent (>=1.2.3 <1.3.0)
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3`, `!=1.2.3` - comparison operators
//! - `1.2.x`, `1.*` - wildcards
//! - `1.0.0 - 2.0.0` - inclusive hyphen range
//! - `>=1.0.0 <2.0.0`, `>=1.0, <2.0` - AND of ranges
//! - `^1.0.0 || ^2.0.0` - OR of ranges
//!
//! Parsing never fails. Atoms that cannot be read are dropped, so malformed
//! text degrades towards "any version".

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::version::parser::{Partial, parse_partial};
use crate::version::types::Version;

/// Top-level parsed constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Matches every version, pre-releases included
    Any,
    /// Single range (^1.0.0, >=1.0.0, etc.)
    Single(VersionRange),
    /// AND of ranges (>=1.0.0 <2.0.0), all must satisfy
    And(Vec<VersionRange>),
    /// OR of specs (^1.0.0 || ^2.0.0), any must satisfy
    Or(Vec<VersionSpec>),
}

/// A single range atom
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// Any version: `*`
    Any,
    /// Exact version match, labels included
    Exact(Version),
    /// Anything except this version
    NotEqual(Version),
    /// Caret range: `^1.2.3` means >=1.2.3 <2.0.0; `ceiling` is None only on overflow
    Caret {
        floor: Version,
        ceiling: Option<Version>,
    },
    /// Tilde range: `~1.2.3` means >=1.2.3 <1.3.0
    Tilde {
        floor: Version,
        ceiling: Option<Version>,
    },
    /// Greater than or equal
    Gte(Version),
    /// Greater than
    Gt(Version),
    /// Less than or equal
    Lte(Version),
    /// Less than
    Lt(Version),
    /// Wildcard major: `1.x` means >=1.0.0 <2.0.0
    WildcardMajor(u32),
    /// Wildcard minor: `1.2.x` means >=1.2.0 <1.3.0
    WildcardMinor(u32, u32),
    /// Hyphen range: `1.0.0 - 2.0.0` means >=1.0.0 <=2.0.0
    Hyphen { from: Version, to: Version },
}

const OPERATORS: &[&str] = &[">=", "<=", "!=", "==", ">", "<", "=", "^", "~"];

impl VersionRange {
    /// Parse a single atom, returning None when it carries no usable version
    pub(crate) fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();

        if let Some(range) = Self::parse_hyphen(spec) {
            return Some(range);
        }

        if let Some(rest) = spec.strip_prefix(">=") {
            parse_partial(rest).map(|p| VersionRange::Gte(p.floor()))
        } else if let Some(rest) = spec.strip_prefix("<=") {
            parse_partial(rest).map(|p| VersionRange::Lte(p.floor()))
        } else if let Some(rest) = spec.strip_prefix("!=") {
            parse_partial(rest).map(|p| VersionRange::NotEqual(p.floor()))
        } else if let Some(rest) = spec.strip_prefix('>') {
            parse_partial(rest).map(|p| VersionRange::Gt(p.floor()))
        } else if let Some(rest) = spec.strip_prefix('<') {
            parse_partial(rest).map(|p| VersionRange::Lt(p.floor()))
        } else if let Some(rest) = spec
            .strip_prefix("==")
            .or_else(|| spec.strip_prefix('='))
        {
            parse_partial(rest).map(Self::bare)
        } else if let Some(rest) = spec.strip_prefix('^') {
            parse_partial(rest).map(Self::caret)
        } else if let Some(rest) = spec.strip_prefix('~') {
            parse_partial(rest).map(Self::tilde)
        } else {
            parse_partial(spec).map(Self::bare)
        }
    }

    /// Parse hyphen range like "1.0.0 - 2.0.0"
    fn parse_hyphen(spec: &str) -> Option<Self> {
        let (from, to) = spec.split_once(" - ")?;
        let from = parse_partial(from)?.floor();
        let to = parse_partial(to)?.floor();
        Some(VersionRange::Hyphen { from, to })
    }

    /// Operand without operator: exact, or wildcard when `x`/`*` appears
    fn bare(p: Partial) -> Self {
        if !p.wildcard {
            return VersionRange::Exact(p.floor());
        }
        match (p.major, p.minor) {
            (Some(major), Some(minor)) => VersionRange::WildcardMinor(major, minor),
            (Some(major), None) => VersionRange::WildcardMajor(major),
            _ => VersionRange::Any,
        }
    }

    /// Upper bound excludes changes to the leftmost nonzero specified component
    ///
    /// `^1.2 -> <2.0.0`, `^0.2 -> <0.3.0`, `^0 -> <1.0.0`, `^0.0 -> <0.1.0`, `^0.0.3 -> <0.0.4`
    fn caret(p: Partial) -> Self {
        let floor = p.floor();
        let ceiling = match (p.specified(), floor.major, floor.minor) {
            (0, _, _) => return VersionRange::Any,
            (_, major, _) if major > 0 => bump(major).map(|m| Version::new(m, 0, 0)),
            (1, _, _) => Some(Version::new(1, 0, 0)),
            (_, _, minor) if minor > 0 => bump(minor).map(|n| Version::new(0, n, 0)),
            (2, _, _) => Some(Version::new(0, 1, 0)),
            (_, _, _) => bump(floor.patch).map(|p| Version::new(0, 0, p)),
        };
        VersionRange::Caret { floor, ceiling }
    }

    /// `~1.2.3` and `~1.2` allow patch drift, `~1` allows minor drift
    fn tilde(p: Partial) -> Self {
        let floor = p.floor();
        let ceiling = match p.specified() {
            0 => return VersionRange::Any,
            1 => bump(floor.major).map(|m| Version::new(m, 0, 0)),
            _ => bump(floor.minor).map(|n| Version::new(floor.major, n, 0)),
        };
        VersionRange::Tilde { floor, ceiling }
    }

    /// The version this atom compares against, if any
    pub(crate) fn target(&self) -> Option<&Version> {
        match self {
            VersionRange::Exact(v)
            | VersionRange::NotEqual(v)
            | VersionRange::Gte(v)
            | VersionRange::Gt(v)
            | VersionRange::Lte(v)
            | VersionRange::Lt(v)
            | VersionRange::Caret { floor: v, .. }
            | VersionRange::Tilde { floor: v, .. } => Some(v),
            VersionRange::Hyphen { from, .. } => Some(from),
            VersionRange::Any | VersionRange::WildcardMajor(_) | VersionRange::WildcardMinor(..) => {
                None
            }
        }
    }
}

fn bump(n: u32) -> Option<u32> {
    n.checked_add(1)
}

impl VersionSpec {
    /// Parse a full constraint string
    fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec.is_empty() {
            return VersionSpec::Any;
        }

        // OR has the lowest precedence; composer also accepts a single `|`
        let mut alternatives: Vec<VersionSpec> = spec
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse_and_or_single)
            .collect();

        if alternatives.iter().any(|a| *a == VersionSpec::Any) {
            return VersionSpec::Any;
        }

        match alternatives.len() {
            0 => VersionSpec::Any,
            1 => alternatives.remove(0),
            _ => VersionSpec::Or(alternatives),
        }
    }

    /// Parse a spec that may be AND (space or comma separated) or a single range
    fn parse_and_or_single(spec: &str) -> Self {
        if let Some(range) = VersionRange::parse_hyphen(spec) {
            return VersionSpec::Single(range);
        }

        let mut ranges: Vec<VersionRange> = Self::split_and_parts(spec)
            .iter()
            .filter_map(|part| {
                let range = VersionRange::parse(part);
                if range.is_none() {
                    debug!("Dropping unreadable constraint atom '{}'", part);
                }
                range
            })
            .filter(|range| *range != VersionRange::Any)
            .collect();

        match ranges.len() {
            0 => VersionSpec::Any,
            1 => VersionSpec::Single(ranges.remove(0)),
            _ => VersionSpec::And(ranges),
        }
    }

    /// Split spec into AND parts, re-attaching operators written with a trailing space (`>= 1.0`)
    fn split_and_parts(spec: &str) -> Vec<String> {
        let mut parts: Vec<String> = Vec::new();
        let mut pending: Option<&str> = None;

        for token in spec.split([' ', ',', '\t']).filter(|t| !t.is_empty()) {
            if let Some(op) = pending.take() {
                parts.push(format!("{}{}", op, token));
            } else if OPERATORS.contains(&token) {
                pending = Some(token);
            } else {
                parts.push(token.to_string());
            }
        }

        if let Some(op) = pending {
            parts.push(op.to_string());
        }
        parts
    }
}

/// An immutable parsed constraint with its original text
///
/// Equality compares the parsed form only, so re-parsing the same text is
/// idempotent and cosmetic differences (`>=1.0` vs `>= 1.0.0`) compare equal.
#[derive(Debug, Clone)]
pub struct Constraint {
    raw: String,
    spec: VersionSpec,
}

impl Constraint {
    /// Parse constraint text. Never fails; see the module docs for fallbacks.
    pub fn parse(text: &str) -> Self {
        let raw = text.trim().to_string();
        let spec = match VersionSpec::parse(&raw) {
            // Legacy sentinel: a lone `0.0.0` historically meant "no constraint"
            VersionSpec::Single(VersionRange::Exact(v)) if v == Version::new(0, 0, 0) => {
                debug!("Treating legacy sentinel constraint '{}' as any", raw);
                VersionSpec::Any
            }
            spec => spec,
        };
        Self { raw, spec }
    }

    /// The always-true constraint
    pub fn any() -> Self {
        Self {
            raw: String::new(),
            spec: VersionSpec::Any,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn spec(&self) -> &VersionSpec {
        &self.spec
    }

    pub fn is_any(&self) -> bool {
        self.spec == VersionSpec::Any
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl Eq for Constraint {}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Constraint {
    fn from(text: &str) -> Self {
        Constraint::parse(text)
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Constraint::parse(&raw))
    }
}

/// Parse constraint text into a [`Constraint`]
pub fn parse_constraint(text: &str) -> Constraint {
    Constraint::parse(text)
}
