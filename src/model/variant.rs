use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::acmg::AcmgAssessment;

/// Broad category of a variant, derived from allele lengths and INFO markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VariantCategory {
    SingleNucleotide,
    Indel,
    Structural,
}

/// Canonical INFO value after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum InfoValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl InfoValue {
    /// Numeric view of the value, parsing text when it holds a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Integer(i) => Some(*i as f64),
            InfoValue::Float(f) => Some(*f),
            InfoValue::Text(s) => s.trim().parse().ok(),
            InfoValue::Flag(_) => None,
        }
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Flag(b) => write!(f, "{}", b),
            InfoValue::Integer(i) => write!(f, "{}", i),
            InfoValue::Float(v) => write!(f, "{}", v),
            InfoValue::Text(s) => f.write_str(s),
        }
    }
}

/// INFO key/value metadata; keys are unique and iterate in sorted order
pub type InfoMap = BTreeMap<String, InfoValue>;

/// A single genomic variant under interpretation.
///
/// Identity is (chrom, pos, reference, alternate). Annotation fields start
/// absent and are filled write-once by the annotation coordinator; the
/// `assessment` is attached exactly once by the ACMG evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Variant {
    pub chrom: String,
    /// 1-based position
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
    pub category: VariantCategory,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default)]
    pub info: InfoMap,

    // Annotations
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
    #[serde(default)]
    pub diseases: Vec<String>,
    /// ClinVar review status of the significance call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated: Option<String>,
    /// Population allele frequency, always within [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_af: Option<f64>,

    // In-silico predictors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadd_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyphen_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sift_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AcmgAssessment>,
}

impl Variant {
    /// Create an unannotated variant with the given identity
    pub fn new(
        chrom: impl Into<String>,
        pos: u64,
        reference: impl Into<String>,
        alternate: impl Into<String>,
        category: VariantCategory,
    ) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
            reference: reference.into(),
            alternate: alternate.into(),
            category,
            id: None,
            quality: None,
            filter: None,
            info: InfoMap::new(),
            gene: None,
            transcript: None,
            hgvs_c: None,
            hgvs_p: None,
            impact: None,
            clinical_significance: None,
            diseases: Vec::new(),
            review_status: None,
            last_evaluated: None,
            population_af: None,
            cadd_score: None,
            polyphen_score: None,
            sift_score: None,
            assessment: None,
        }
    }

    /// Chromosome name without a leading `chr` prefix (case-insensitive)
    pub fn bare_chrom(&self) -> &str {
        strip_chr_prefix(&self.chrom)
    }

    /// Check the invariants of a variant supplied from outside the normalizer.
    ///
    /// A variant that already carries an assessment is rejected, since it can
    /// only be classified once.
    pub fn validate(&self) -> Result<(), InvalidVariant> {
        if self.chrom.trim().is_empty() {
            return Err(InvalidVariant::MissingChromosome);
        }
        if self.pos == 0 {
            return Err(InvalidVariant::ZeroPosition);
        }
        for allele in [&self.reference, &self.alternate] {
            if !is_nucleotide_sequence(allele) {
                return Err(InvalidVariant::NonNucleotideAllele(allele.clone()));
            }
        }
        if let Some(af) = self.population_af
            && !(0.0..=1.0).contains(&af)
        {
            return Err(InvalidVariant::FrequencyOutOfRange(af));
        }
        for (name, score) in [
            ("quality", self.quality),
            ("cadd_score", self.cadd_score),
            ("polyphen_score", self.polyphen_score),
            ("sift_score", self.sift_score),
        ] {
            if let Some(value) = score
                && !value.is_finite()
            {
                return Err(InvalidVariant::NonFiniteScore(name));
            }
        }
        if self.assessment.is_some() {
            return Err(InvalidVariant::AlreadyClassified);
        }
        Ok(())
    }
}

/// Why an externally supplied variant was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidVariant {
    #[error("chromosome must not be empty")]
    MissingChromosome,

    #[error("position must be positive")]
    ZeroPosition,

    #[error("allele '{0}' is not a non-empty ACGTN sequence")]
    NonNucleotideAllele(String),

    #[error("population_af {0} is outside [0, 1]")]
    FrequencyOutOfRange(f64),

    #[error("{0} must be a finite number")]
    NonFiniteScore(&'static str),

    #[error("variant already carries an assessment")]
    AlreadyClassified,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}>{}",
            self.chrom, self.pos, self.reference, self.alternate
        )
    }
}

/// Strip a leading `chr` (any case) from a chromosome name
pub fn strip_chr_prefix(chrom: &str) -> &str {
    match chrom.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") && chrom.len() > 3 => &chrom[3..],
        _ => chrom,
    }
}

/// Check that an allele is a non-empty nucleotide sequence (ACGTN, any case)
pub fn is_nucleotide_sequence(allele: &str) -> bool {
    !allele.is_empty()
        && allele
            .bytes()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
}

/// INFO value as emitted by an upstream record parser, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInfoValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<RawInfoValue>),
    /// Undecoded byte payload; only produced by in-process parsers
    #[serde(skip)]
    Bytes(Vec<u8>),
}

/// One record as delivered by an external variant-call file parser.
///
/// Mandatory fields are optional here so malformed input can be represented
/// and skipped rather than rejected wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RawRecord {
    #[serde(default)]
    pub chrom: Option<String>,
    #[serde(default)]
    pub pos: Option<i64>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    /// Alternate alleles; only the first one is interpreted
    #[serde(default)]
    pub alternates: Vec<String>,
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub info: BTreeMap<String, RawInfoValue>,
}

impl RawRecord {
    /// Short locus label for log messages, tolerant of missing fields
    pub fn locus(&self) -> String {
        format!(
            "{}:{}",
            self.chrom.as_deref().unwrap_or("?"),
            self.pos.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
        )
    }
}
