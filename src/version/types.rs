//! Version value type

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::version::natural::{cmp_digits, natural_cmp};
use crate::version::parser;

/// A single pre-release or build identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// Digits only, stored without leading zeros ("0" for all zeros)
    Numeric(String),
    /// Anything containing a non-digit character
    Alpha(String),
}

impl Label {
    /// Classify a raw identifier
    pub fn new(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            let trimmed = raw.trim_start_matches('0');
            Label::Numeric(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
        } else {
            Label::Alpha(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::Numeric(s) | Label::Alpha(s) => s,
        }
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Label::Numeric(a), Label::Numeric(b)) => cmp_digits(a, b),
            (Label::Numeric(_), Label::Alpha(_)) => Ordering::Less,
            (Label::Alpha(_), Label::Numeric(_)) => Ordering::Greater,
            (Label::Alpha(a), Label::Alpha(b)) => natural_cmp(a, b),
        }
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed version: numeric triplet, ordered labels, and the original text
///
/// Equality, ordering and hashing ignore `raw`, so `v2.1.0` and `2.1.0` are
/// the same version. A version without labels is greater than the same
/// triplet with labels (release > pre-release).
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub labels: Vec<Label>,
    pub raw: String,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            labels: Vec::new(),
            raw: format!("{}.{}.{}", major, minor, patch),
        }
    }

    /// Parse any text into a version. Never fails; see [`parser::parse`].
    pub fn parse(text: &str) -> Self {
        parser::parse(text)
    }

    /// Parse text that must start with a numeric component
    pub fn try_parse(text: &str) -> Option<Self> {
        parser::try_parse(text)
    }

    pub fn is_prerelease(&self) -> bool {
        !self.labels.is_empty()
    }

    /// Canonical text form, e.g. `1.2.3-beta.1`
    pub fn normalized(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if !self.labels.is_empty() {
            let labels: Vec<&str> = self.labels.iter().map(Label::as_str).collect();
            out.push('-');
            out.push_str(&labels.join("."));
        }
        out
    }

    /// The same triplet without labels
    pub fn release(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }

    fn triplet(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triplet()
            .cmp(&other.triplet())
            .then_with(|| match (self.labels.is_empty(), other.labels.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.labels.cmp(&other.labels),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.triplet().hash(state);
        self.labels.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Version {
    fn from(text: &str) -> Self {
        Version::parse(text)
    }
}

impl From<&semver::Version> for Version {
    fn from(v: &semver::Version) -> Self {
        let clamp = |n: u64| u32::try_from(n).unwrap_or(u32::MAX);
        let labels = if v.pre.is_empty() {
            Vec::new()
        } else {
            v.pre.as_str().split('.').map(Label::new).collect()
        };
        // Build metadata has no precedence and is left out of raw as well
        let mut release = v.clone();
        release.build = semver::BuildMetadata::EMPTY;
        Self {
            major: clamp(v.major),
            minor: clamp(v.minor),
            patch: clamp(v.patch),
            labels,
            raw: release.to_string(),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Version::parse(&raw))
    }
}
