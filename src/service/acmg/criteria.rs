//! ACMG criterion rules
//!
//! Each rule is a pure function of the variant's current fields. The registry
//! holds one rule per ACMG code; codes without a concrete rule are registered
//! as [`NotEvaluated`] so they still show up in every evaluation.

use serde_json::json;

use crate::model::{AcmgCriterion, CriterionResult, Variant};

/// Impact terms that mark a variant as loss-of-function (matched case-insensitively)
const LOF_IMPACT_TERMS: &[&str] = &[
    "HIGH",
    "stop_gained",
    "frameshift_variant",
    "splice_acceptor_variant",
    "splice_donor_variant",
];

/// Protein notation marker for a premature stop codon
const PREMATURE_STOP_MARKER: &str = "Ter";

/// Genes with an established loss-of-function disease mechanism
const LOF_MECHANISM_GENES: &[&str] = &["BRCA1", "BRCA2", "TP53", "PTEN", "APC", "RB1", "VHL"];

/// PM2 rarity threshold (1 in 10,000)
const RARE_AF_THRESHOLD: f64 = 0.0001;

/// BA1 common-variant threshold (5%)
const COMMON_AF_THRESHOLD: f64 = 0.05;

const CADD_DELETERIOUS: f64 = 20.0;
const POLYPHEN_DELETERIOUS: f64 = 0.908;
const SIFT_DELETERIOUS: f64 = 0.05;

/// Minimum number of agreeing predictors for PP3
const MIN_DELETERIOUS_PREDICTIONS: usize = 2;

/// One pluggable evidentiary rule
pub trait CriterionRule: Send + Sync {
    /// The ACMG code this rule evaluates
    fn criterion(&self) -> AcmgCriterion;

    fn evaluate(&self, variant: &Variant) -> CriterionResult;
}

/// Build the registry of every ACMG criterion in evaluation order
pub fn default_rules() -> Vec<Box<dyn CriterionRule>> {
    AcmgCriterion::ALL
        .into_iter()
        .map(|criterion| -> Box<dyn CriterionRule> {
            match criterion {
                AcmgCriterion::Pvs1 => Box::new(NullVariantInLofGene),
                AcmgCriterion::Pm2 => Box::new(AbsentFromControls),
                AcmgCriterion::Pp3 => Box::new(ComputationalEvidence),
                AcmgCriterion::Ba1 => Box::new(CommonInPopulation),
                other => Box::new(NotEvaluated(other)),
            }
        })
        .collect()
}

/// PVS1: null variant in a gene where loss of function causes disease
pub struct NullVariantInLofGene;

impl CriterionRule for NullVariantInLofGene {
    fn criterion(&self) -> AcmgCriterion {
        AcmgCriterion::Pvs1
    }

    fn evaluate(&self, variant: &Variant) -> CriterionResult {
        let lof = is_loss_of_function(variant);
        let lof_gene = has_lof_mechanism(variant);

        let reasoning = match (lof, lof_gene) {
            (true, true) => "Met - null variant in gene with known LOF mechanism".to_string(),
            (true, false) => format!(
                "Not met - predicted LOF but gene {} has no known LOF mechanism",
                variant.gene.as_deref().unwrap_or("(unknown)")
            ),
            (false, _) => "Not met - insufficient evidence for LOF mechanism".to_string(),
        };

        CriterionResult::new(
            self.criterion(),
            lof && lof_gene,
            reasoning,
            json!({
                "gene": variant.gene,
                "impact": variant.impact,
                "hgvs_p": variant.hgvs_p,
                "loss_of_function": lof,
            }),
        )
    }
}

/// A variant is loss-of-function when its impact names a high-impact term or
/// its protein notation encodes a premature stop
fn is_loss_of_function(variant: &Variant) -> bool {
    let impact_is_lof = variant.impact.as_deref().is_some_and(|impact| {
        let impact = impact.to_ascii_lowercase();
        LOF_IMPACT_TERMS
            .iter()
            .any(|term| impact.contains(&term.to_ascii_lowercase()))
    });

    let premature_stop = variant
        .hgvs_p
        .as_deref()
        .is_some_and(|p| p.contains(PREMATURE_STOP_MARKER));

    impact_is_lof || premature_stop
}

fn has_lof_mechanism(variant: &Variant) -> bool {
    variant
        .gene
        .as_deref()
        .is_some_and(|gene| LOF_MECHANISM_GENES.contains(&gene))
}

/// PM2: absent or extremely rare in population databases
pub struct AbsentFromControls;

impl CriterionRule for AbsentFromControls {
    fn criterion(&self) -> AcmgCriterion {
        AcmgCriterion::Pm2
    }

    fn evaluate(&self, variant: &Variant) -> CriterionResult {
        let (satisfied, reasoning) = match variant.population_af {
            Some(af) if af < RARE_AF_THRESHOLD => {
                (true, format!("Met - rare variant (AF: {:.6})", af))
            }
            Some(af) => (false, format!("Not met - common variant (AF: {:.6})", af)),
            None => (
                false,
                "Not evaluated - no population frequency data".to_string(),
            ),
        };

        CriterionResult::new(
            self.criterion(),
            satisfied,
            reasoning,
            json!({ "population_af": variant.population_af }),
        )
    }
}

/// PP3: multiple computational predictors agree the variant is deleterious
pub struct ComputationalEvidence;

impl CriterionRule for ComputationalEvidence {
    fn criterion(&self) -> AcmgCriterion {
        AcmgCriterion::Pp3
    }

    fn evaluate(&self, variant: &Variant) -> CriterionResult {
        let predictions = [
            variant.cadd_score.map(|s| s > CADD_DELETERIOUS),
            variant.polyphen_score.map(|s| s > POLYPHEN_DELETERIOUS),
            variant.sift_score.map(|s| s < SIFT_DELETERIOUS),
        ];

        let evaluated = predictions.iter().flatten().count();
        let deleterious = predictions.iter().flatten().filter(|d| **d).count();

        let satisfied = deleterious >= MIN_DELETERIOUS_PREDICTIONS
            && evaluated >= MIN_DELETERIOUS_PREDICTIONS;

        let reasoning = if satisfied {
            format!("Met - {}/{} tools predict deleterious", deleterious, evaluated)
        } else {
            "Not met - insufficient computational evidence".to_string()
        };

        CriterionResult::new(
            self.criterion(),
            satisfied,
            reasoning,
            json!({
                "cadd_score": variant.cadd_score,
                "polyphen_score": variant.polyphen_score,
                "sift_score": variant.sift_score,
                "deleterious_count": deleterious,
                "total_count": evaluated,
            }),
        )
    }
}

/// BA1: allele frequency above 5% in population databases
pub struct CommonInPopulation;

impl CriterionRule for CommonInPopulation {
    fn criterion(&self) -> AcmgCriterion {
        AcmgCriterion::Ba1
    }

    fn evaluate(&self, variant: &Variant) -> CriterionResult {
        let (satisfied, reasoning) = match variant.population_af {
            Some(af) if af > COMMON_AF_THRESHOLD => {
                (true, format!("Met - common variant (AF: {:.6})", af))
            }
            _ => (false, "Not met - variant not common in population".to_string()),
        };

        CriterionResult::new(
            self.criterion(),
            satisfied,
            reasoning,
            json!({ "population_af": variant.population_af }),
        )
    }
}

/// Placeholder for a criterion without a concrete rule; never satisfied
pub struct NotEvaluated(pub AcmgCriterion);

impl CriterionRule for NotEvaluated {
    fn criterion(&self) -> AcmgCriterion {
        self.0
    }

    fn evaluate(&self, _variant: &Variant) -> CriterionResult {
        CriterionResult::new(self.0, false, "Not evaluated", json!({}))
    }
}
