//! Field reducers.
//!
//! Each reducer collapses the values of one column across a work's outcome
//! rows into a single representative value. All of them ignore blank cells
//! and produce the same result for any ordering of their input.

use std::collections::{BTreeMap, BTreeSet};

/// Most frequent non-blank value; ties go to the alphabetically first value.
///
/// Returns an empty string when every value is blank.
pub fn reduce_mode<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() {
            *counts.entry(value).or_default() += 1;
        }
    }

    // BTreeMap iterates in ascending key order, so the first maximum wins ties.
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        match best {
            Some((_, top)) if top >= count => {}
            _ => best = Some((value, count)),
        }
    }

    best.map(|(value, _)| value.to_string()).unwrap_or_default()
}

/// Distinct non-blank values, sorted ascending and joined with `"; "`.
pub fn reduce_unique_join<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let unique: BTreeSet<&str> = values
        .into_iter()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    unique.into_iter().collect::<Vec<_>>().join("; ")
}

/// Minimum and maximum over the values that parse as finite numbers.
///
/// Unparseable and blank entries are skipped, never read as zero. Returns
/// `None` when nothing parses.
pub fn reduce_numeric_range<'a, I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .filter_map(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_tie_break_is_alphabetical() {
        assert_eq!(reduce_mode(["b", "a"]), "a");
        assert_eq!(reduce_mode(["a", "b"]), "a");
    }

    #[test]
    fn test_mode_prefers_frequency() {
        assert_eq!(reduce_mode(["light", "caffeine", "light"]), "light");
        assert_eq!(reduce_mode(["z", "z", "a", "b", "b"]), "b");
    }

    #[test]
    fn test_mode_ignores_blanks() {
        assert_eq!(reduce_mode(["", "  ", "home", ""]), "home");
        assert_eq!(reduce_mode(["", " "]), "");
        assert_eq!(reduce_mode(Vec::<&str>::new()), "");
    }

    #[test]
    fn test_mode_trims_values() {
        assert_eq!(reduce_mode([" field", "field ", "lab"]), "field");
    }

    #[test]
    fn test_unique_join_sorts_and_dedups() {
        assert_eq!(
            reduce_unique_join(["vigilance", "fatigue", "vigilance", "", "sleepiness"]),
            "fatigue; sleepiness; vigilance"
        );
        assert_eq!(reduce_unique_join(["", " "]), "");
    }

    #[test]
    fn test_numeric_range_skips_non_numeric() {
        assert_eq!(reduce_numeric_range(["7", "abc", "14", ""]), Some((7.0, 14.0)));
    }

    #[test]
    fn test_numeric_range_empty() {
        assert_eq!(reduce_numeric_range(["", "n/a"]), None);
        assert_eq!(reduce_numeric_range(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_numeric_range_single_and_fractional() {
        assert_eq!(reduce_numeric_range(["28"]), Some((28.0, 28.0)));
        assert_eq!(reduce_numeric_range(["0.5", "2.25", "1"]), Some((0.5, 2.25)));
    }

    #[test]
    fn test_numeric_range_rejects_non_finite() {
        assert_eq!(reduce_numeric_range(["inf", "NaN", "3"]), Some((3.0, 3.0)));
    }
}
