//! Directional classification of vigilance evidence.

use crate::models::{EffectDirection, OutcomeRow, VigilanceSummary};
use std::collections::BTreeSet;

/// Summarize a study's vigilance evidence from its effect-direction labels.
///
/// `labels` holds the direction of every vigilance-domain row of one study.
/// Only the set of labels matters. A study reporting both an improvement
/// and a worsening is `Mixed` regardless of how many rows point each way.
pub fn classify_directions<'a, I>(labels: I) -> VigilanceSummary
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen_any = false;
    let mut directions = BTreeSet::new();
    for label in labels {
        seen_any = true;
        if let Some(direction) = EffectDirection::from_label(label) {
            directions.insert(direction);
        }
    }

    if !seen_any {
        return VigilanceSummary::NoVigilance;
    }

    let has = |d: EffectDirection| directions.contains(&d);

    if has(EffectDirection::Improves) && has(EffectDirection::Worsens) {
        VigilanceSummary::Mixed
    } else if has(EffectDirection::Mixed) {
        VigilanceSummary::Mixed
    } else if has(EffectDirection::Improves) {
        VigilanceSummary::Improves
    } else if has(EffectDirection::Worsens) {
        VigilanceSummary::Worsens
    } else if has(EffectDirection::Null) {
        VigilanceSummary::Null
    } else {
        // Explicit "unclear" and unrecognized labels land here alike.
        VigilanceSummary::Unclear
    }
}

/// Classify the vigilance-domain rows among `rows`.
pub fn vigilance_summary(rows: &[&OutcomeRow]) -> VigilanceSummary {
    classify_directions(
        rows.iter()
            .filter(|r| r.is_vigilance())
            .map(|r| r.effect_direction.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_directions_are_mixed() {
        assert_eq!(classify_directions(["improves", "worsens"]), VigilanceSummary::Mixed);
        assert_eq!(classify_directions(["improves", "mixed"]), VigilanceSummary::Mixed);
        assert_eq!(classify_directions(["worsens", "mixed"]), VigilanceSummary::Mixed);
    }

    #[test]
    fn test_single_directions() {
        assert_eq!(classify_directions(["improves"]), VigilanceSummary::Improves);
        assert_eq!(classify_directions(["worsens", "null"]), VigilanceSummary::Worsens);
        assert_eq!(classify_directions(["improves", "null"]), VigilanceSummary::Improves);
        assert_eq!(classify_directions(["null", "unclear"]), VigilanceSummary::Null);
        assert_eq!(classify_directions(["unclear"]), VigilanceSummary::Unclear);
    }

    #[test]
    fn test_no_labels_is_no_vigilance() {
        assert_eq!(classify_directions(Vec::<&str>::new()), VigilanceSummary::NoVigilance);
    }

    #[test]
    fn test_unrecognized_labels_are_unclear() {
        assert_eq!(classify_directions(["better"]), VigilanceSummary::Unclear);
        assert_eq!(classify_directions([""]), VigilanceSummary::Unclear);
    }

    #[test]
    fn test_repetition_does_not_outvote() {
        assert_eq!(
            classify_directions(["improves", "improves", "improves", "worsens"]),
            VigilanceSummary::Mixed
        );
    }

    #[test]
    fn test_only_vigilance_rows_count() {
        let vig = OutcomeRow {
            outcome_domain: "vigilance".to_string(),
            effect_direction: "improves".to_string(),
            ..OutcomeRow::default()
        };
        let sleepy = OutcomeRow {
            outcome_domain: "sleepiness".to_string(),
            effect_direction: "worsens".to_string(),
            ..OutcomeRow::default()
        };

        assert_eq!(vigilance_summary(&[&vig, &sleepy]), VigilanceSummary::Improves);
        assert_eq!(vigilance_summary(&[&sleepy]), VigilanceSummary::NoVigilance);
    }
}
