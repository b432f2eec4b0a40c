//! Score aggregation and classification for evaluated ACMG criteria

use crate::model::{Classification, CriterionResult};

const PATHOGENIC_THRESHOLD: i32 = 8;
const LIKELY_PATHOGENIC_THRESHOLD: i32 = 6;
const BENIGN_THRESHOLD: i32 = -8;
const LIKELY_BENIGN_THRESHOLD: i32 = -6;

/// Sum of the signed weights of every satisfied criterion
pub fn compute_score(results: &[CriterionResult]) -> i32 {
    satisfied(results).map(|r| r.criterion.weight()).sum()
}

/// Map an aggregate score to a classification tier
pub fn classify_score(score: i32) -> Classification {
    if score >= PATHOGENIC_THRESHOLD {
        Classification::Pathogenic
    } else if score >= LIKELY_PATHOGENIC_THRESHOLD {
        Classification::LikelyPathogenic
    } else if score <= BENIGN_THRESHOLD {
        Classification::Benign
    } else if score <= LIKELY_BENIGN_THRESHOLD {
        Classification::LikelyBenign
    } else {
        Classification::UncertainSignificance
    }
}

/// Confidence in [0, 1]: the share of satisfied evidence weight over the
/// total satisfied evidence weight.
///
/// This is 1.0 whenever anything is satisfied and 0.0 otherwise.
pub fn compute_confidence(results: &[CriterionResult]) -> f64 {
    let total_weight: i32 = satisfied(results).map(|r| r.strength.magnitude()).sum();
    if total_weight == 0 {
        return 0.0;
    }

    let supporting_weight: i32 = satisfied(results).map(|r| r.strength.magnitude()).sum();
    (f64::from(supporting_weight) / f64::from(total_weight)).clamp(0.0, 1.0)
}

/// Human-readable trace: the classification followed by each satisfied
/// criterion with its explanation
pub fn build_reasoning(results: &[CriterionResult], classification: Classification) -> String {
    let mut applied = satisfied(results).peekable();

    if applied.peek().is_none() {
        return format!("Classification: {}. No ACMG criteria met.", classification);
    }

    let mut reasoning = format!("Classification: {}\nApplied criteria:", classification);
    for result in applied {
        reasoning.push_str(&format!("\n  {}: {}", result.criterion, result.reasoning));
    }

    reasoning
}

fn satisfied(results: &[CriterionResult]) -> impl Iterator<Item = &CriterionResult> {
    results.iter().filter(|r| r.satisfied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AcmgCriterion;

    fn met(criterion: AcmgCriterion) -> CriterionResult {
        CriterionResult::new(criterion, true, "Met", serde_json::json!({}))
    }

    fn unmet(criterion: AcmgCriterion) -> CriterionResult {
        CriterionResult::new(criterion, false, "Not met", serde_json::json!({}))
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(classify_score(9), Classification::Pathogenic);
        assert_eq!(classify_score(8), Classification::Pathogenic);
        assert_eq!(classify_score(7), Classification::LikelyPathogenic);
        assert_eq!(classify_score(6), Classification::LikelyPathogenic);
        assert_eq!(classify_score(5), Classification::UncertainSignificance);
        assert_eq!(classify_score(0), Classification::UncertainSignificance);
        assert_eq!(classify_score(-5), Classification::UncertainSignificance);
        assert_eq!(classify_score(-6), Classification::LikelyBenign);
        assert_eq!(classify_score(-7), Classification::LikelyBenign);
        assert_eq!(classify_score(-8), Classification::Benign);
        assert_eq!(classify_score(-12), Classification::Benign);
    }

    #[test]
    fn test_score_ignores_unsatisfied_and_order() {
        let forward = vec![
            met(AcmgCriterion::Pm2),
            unmet(AcmgCriterion::Pvs1),
            met(AcmgCriterion::Pp3),
            met(AcmgCriterion::Bp4),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(compute_score(&forward), 2);
        assert_eq!(compute_score(&forward), compute_score(&reversed));
    }

    #[test]
    fn test_benign_weights_are_negative() {
        assert_eq!(compute_score(&[met(AcmgCriterion::Ba1)]), -8);
        assert_eq!(compute_score(&[met(AcmgCriterion::Bs2)]), -4);
    }

    #[test]
    fn test_confidence_is_bounded() {
        assert_eq!(compute_confidence(&[]), 0.0);
        assert_eq!(compute_confidence(&[unmet(AcmgCriterion::Pvs1)]), 0.0);
        assert_eq!(
            compute_confidence(&[met(AcmgCriterion::Pm2), met(AcmgCriterion::Ba1)]),
            1.0
        );
    }

    #[test]
    fn test_reasoning_lists_applied_criteria() {
        let results = vec![
            met(AcmgCriterion::Pvs1),
            unmet(AcmgCriterion::Pm2),
            met(AcmgCriterion::Pp3),
        ];
        let reasoning = build_reasoning(&results, Classification::Pathogenic);
        assert_eq!(
            reasoning,
            "Classification: Pathogenic\nApplied criteria:\n  PVS1: Met\n  PP3: Met"
        );
    }

    #[test]
    fn test_reasoning_without_criteria() {
        let reasoning = build_reasoning(
            &[unmet(AcmgCriterion::Ba1)],
            Classification::UncertainSignificance,
        );
        assert_eq!(
            reasoning,
            "Classification: Uncertain Significance. No ACMG criteria met."
        );
    }
}
