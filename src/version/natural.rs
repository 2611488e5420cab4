//! Natural ordering for version strings and labels
//!
//! Splits text into digit and non-digit runs so that `"beta9"` sorts before
//! `"beta10"` and `"1.9.0"` sorts before `"1.10.0"`. Usable on its own for
//! display ordering of raw version strings, and by [`Version`] for labels.
//!
//! [`Version`]: crate::version::types::Version

use std::cmp::Ordering;

/// A run of consecutive digits or consecutive non-digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> impl Iterator<Item = Chunk<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(if is_digit {
            Chunk::Digits(run)
        } else {
            Chunk::Text(run)
        })
    })
}

/// Compare two digit runs by numeric value without parsing them into a fixed-width integer
pub(crate) fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_chunk(a: Chunk<'_>, b: Chunk<'_>) -> Ordering {
    match (a, b) {
        (Chunk::Digits(a), Chunk::Digits(b)) => cmp_digits(a, b),
        (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        (Chunk::Text(a), Chunk::Text(b)) => a.cmp(b),
    }
}

/// Compare two strings run by run
///
/// Numeric runs compare as integers, a numeric run orders before a text run at
/// the same position, text runs compare case-sensitively. When every run
/// compares equal (e.g. `"01"` vs `"1"`) the strings are ordered bytewise so
/// that `Equal` is only returned for identical strings.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match cmp_chunk(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Sort raw version strings in natural order
pub fn sort_natural<S: AsRef<str>>(values: &mut [S]) {
    values.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}
