//! Version value layer
//!
//! Pure, synchronous building blocks for version resolution. Nothing in this
//! module performs I/O or holds shared state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Parser    │────▶│   Version   │◀────│   Natural   │
//! │ (text→ver)  │     │  (ordering) │     │ (comparator)│
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲
//!                            │
//! ┌─────────────┐     ┌─────────────┐
//! │ Constraint  │────▶│  Evaluator  │
//! │  (grammar)  │     │  (matches)  │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: `Version` and `Label` value types
//! - [`parser`]: total version parsing with `0.0.0` fallback
//! - [`natural`]: natural string ordering, also used for labels
//! - [`constraint`]: constraint grammar (caret, tilde, wildcard, AND/OR)
//! - [`evaluator`]: constraint matching and upper-edge headroom checks

pub mod constraint;
pub mod evaluator;
pub mod natural;
pub mod parser;
pub mod types;

pub use constraint::{Constraint, VersionRange, VersionSpec, parse_constraint};
pub use evaluator::matches;
pub use natural::{natural_cmp, sort_natural};
pub use types::{Label, Version};

/// Parse any text into a [`Version`]
pub fn parse(text: &str) -> Version {
    parser::parse(text)
}

/// Total order over versions
pub fn compare(a: &Version, b: &Version) -> std::cmp::Ordering {
    a.cmp(b)
}
