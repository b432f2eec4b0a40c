use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::variant::Variant;

/// External knowledge source an annotator wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    ClinVar,
    Gnomad,
    Ensembl,
}

impl AnnotationSource {
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationSource::ClinVar => "clinvar",
            AnnotationSource::Gnomad => "gnomad",
            AnnotationSource::Ensembl => "ensembl",
        }
    }
}

impl fmt::Display for AnnotationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sparse annotation produced by one source for one variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hgvs_c: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hgvs_p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_significance: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diseases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_af: Option<f64>,
}

impl PartialAnnotation {
    /// True when no field carries data
    pub fn is_empty(&self) -> bool {
        self.gene.is_none()
            && self.transcript.is_none()
            && self.hgvs_c.is_none()
            && self.hgvs_p.is_none()
            && self.impact.is_none()
            && self.clinical_significance.is_none()
            && self.diseases.is_empty()
            && self.review_status.is_none()
            && self.last_evaluated.is_none()
            && self.population_af.is_none()
    }

    /// Apply this annotation to a variant, write-once: a field is only set when
    /// the variant does not already carry a value for it
    pub fn merge_into(self, variant: &mut Variant) {
        fill(&mut variant.gene, self.gene);
        fill(&mut variant.transcript, self.transcript);
        fill(&mut variant.hgvs_c, self.hgvs_c);
        fill(&mut variant.hgvs_p, self.hgvs_p);
        fill(&mut variant.impact, self.impact);
        fill(&mut variant.clinical_significance, self.clinical_significance);

        if variant.diseases.is_empty() {
            variant.diseases = self.diseases;
        }
        fill(&mut variant.review_status, self.review_status);
        fill(&mut variant.last_evaluated, self.last_evaluated);

        if let Some(af) = self.population_af
            && (0.0..=1.0).contains(&af)
        {
            fill(&mut variant.population_af, Some(af));
        }
    }
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// How many variants carry a given field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldCoverage {
    pub count: usize,
    pub percentage: f64,
}

impl FieldCoverage {
    fn of(count: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self { count, percentage }
    }
}

/// Annotation coverage across a set of variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CoverageSummary {
    pub total_variants: usize,
    pub clinvar: FieldCoverage,
    pub population_frequency: FieldCoverage,
    pub transcript: FieldCoverage,
    pub cadd: FieldCoverage,
    pub polyphen: FieldCoverage,
    pub sift: FieldCoverage,
}

impl CoverageSummary {
    pub fn from_variants(variants: &[Variant]) -> Self {
        let total = variants.len();
        let count = |pred: fn(&Variant) -> bool| {
            FieldCoverage::of(variants.iter().filter(|v| pred(v)).count(), total)
        };

        Self {
            total_variants: total,
            clinvar: count(|v| v.clinical_significance.is_some()),
            population_frequency: count(|v| v.population_af.is_some()),
            transcript: count(|v| v.gene.is_some()),
            cadd: count(|v| v.cadd_score.is_some()),
            polyphen: count(|v| v.polyphen_score.is_some()),
            sift: count(|v| v.sift_score.is_some()),
        }
    }
}
