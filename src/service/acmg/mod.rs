//! ACMG criteria evaluator
//!
//! Runs the criterion registry against an annotated variant and turns the
//! satisfied criteria into a score, a five-tier classification, a reasoning
//! trace and a confidence value.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;

use crate::model::{
    AcmgAssessment, AcmgCriterion, Classification, ClassificationResult, CriterionResult, Variant,
};

pub mod criteria;
pub mod scoring;

pub use criteria::{CriterionRule, default_rules};

use scoring::{build_reasoning, classify_score, compute_confidence, compute_score};

/// Evaluator over an ordered registry of criterion rules
pub struct AcmgEvaluator {
    rules: Vec<Box<dyn CriterionRule>>,
}

struct Evaluation {
    results: Vec<CriterionResult>,
    assessment: AcmgAssessment,
}

impl AcmgEvaluator {
    /// Creates an evaluator with one rule per ACMG code
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<Box<dyn CriterionRule>>) -> Self {
        Self { rules }
    }

    /// Evaluate every registered rule, in registry order
    pub fn evaluate(&self, variant: &Variant) -> Vec<CriterionResult> {
        self.rules.iter().map(|rule| rule.evaluate(variant)).collect()
    }

    /// Classify a variant.
    ///
    /// Never fails: if evaluation panics the result is Uncertain Significance
    /// with score 0, confidence 0 and the failure in the reasoning. The
    /// assessment is attached to the returned variant.
    pub fn classify(&self, mut variant: Variant) -> ClassificationResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.assess(&variant)));

        let Evaluation {
            results,
            assessment,
        } = match outcome {
            Ok(evaluation) => evaluation,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    chrom = %variant.chrom,
                    pos = variant.pos,
                    error = %message,
                    "ACMG classification failed"
                );
                Evaluation {
                    results: Vec::new(),
                    assessment: AcmgAssessment {
                        classification: Classification::UncertainSignificance,
                        criteria: Vec::new(),
                        score: 0,
                        reasoning: format!("Classification failed: {}", message),
                        confidence: 0.0,
                    },
                }
            }
        };

        tracing::debug!(
            chrom = %variant.chrom,
            pos = variant.pos,
            classification = %assessment.classification,
            score = assessment.score,
            criteria = ?assessment.criteria,
            "Classified variant"
        );

        variant.assessment = Some(assessment.clone());

        ClassificationResult {
            variant,
            classification: assessment.classification,
            criteria: assessment.criteria,
            evaluations: results,
            score: assessment.score,
            reasoning: assessment.reasoning,
            confidence: assessment.confidence,
            classified_at: Utc::now(),
        }
    }

    /// Classify a batch, preserving input order
    pub fn classify_all(&self, variants: Vec<Variant>) -> Vec<ClassificationResult> {
        variants.into_iter().map(|v| self.classify(v)).collect()
    }

    fn assess(&self, variant: &Variant) -> Evaluation {
        // Step 1: Evaluate every criterion
        let results = self.evaluate(variant);

        // Step 2: Aggregate the signed score and map it to a tier
        let score = compute_score(&results);
        let classification = classify_score(score);

        // Step 3: Explain and weigh the outcome
        let reasoning = build_reasoning(&results, classification);
        let confidence = compute_confidence(&results);

        let criteria: Vec<AcmgCriterion> = results
            .iter()
            .filter(|r| r.satisfied)
            .map(|r| r.criterion)
            .collect();

        Evaluation {
            results,
            assessment: AcmgAssessment {
                classification,
                criteria,
                score,
                reasoning,
                confidence,
            },
        }
    }
}

impl Default for AcmgEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}
