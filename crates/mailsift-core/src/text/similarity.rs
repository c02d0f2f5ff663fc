//! Sequence similarity of sentence-like units.

use similar::TextDiff;

/// Returns the similarity of two strings in `[0.0, 1.0]`.
///
/// Computed over characters as `2 * M / T`, where `T` is the total number of
/// characters in both strings and `M` the number of characters left
/// unchanged by their diff. Two empty strings are identical.
#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(a, b).ratio())
}
