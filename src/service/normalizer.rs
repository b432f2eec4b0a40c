//! Variant record normalizer
//!
//! Maps raw records from an upstream variant-call parser into canonical
//! [`Variant`]s. Malformed records are skipped with a warning; a batch never
//! fails because of one bad record.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{
    InfoMap, InfoValue, RawInfoValue, RawRecord, Variant, VariantCategory, is_nucleotide_sequence,
};

const GENE_KEYS: &[&str] = &["Gene_Name", "Gene", "SYMBOL"];
const TRANSCRIPT_KEYS: &[&str] = &["Transcript_ID", "Feature"];
const HGVS_C_KEYS: &[&str] = &["HGVSc"];
const HGVS_P_KEYS: &[&str] = &["HGVSp"];
const IMPACT_KEYS: &[&str] = &["IMPACT", "Consequence"];

const STRUCTURAL_MARKER: &str = "SVTYPE";
const MISSING: &str = ".";

const MAX_VALIDATION_ERRORS: usize = 10;
const TRUNCATION_MARKER: &str = "... (additional errors truncated)";

/// Why a record could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("missing chromosome")]
    MissingChromosome,

    #[error("missing or non-positive position")]
    InvalidPosition,

    #[error("missing reference allele")]
    MissingReference,

    #[error("missing alternate allele")]
    MissingAlternate,

    #[error("allele is not a nucleotide sequence: {0}")]
    NonNucleotideAllele(String),
}

/// Structural validation summary for a batch of raw records
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub record_count: usize,
    pub errors: Vec<String>,
}

/// Stateless mapper from raw records to canonical variants
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize one record, or explain why it has to be skipped
    pub fn normalize(&self, record: &RawRecord) -> Result<Variant, SkipReason> {
        let chrom = record
            .chrom
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or(SkipReason::MissingChromosome)?;

        let pos = record
            .pos
            .filter(|p| *p > 0)
            .ok_or(SkipReason::InvalidPosition)? as u64;

        let reference = record
            .reference
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or(SkipReason::MissingReference)?;

        let alternate = record
            .alternates
            .first()
            .map(String::as_str)
            .filter(|a| !a.is_empty())
            .ok_or(SkipReason::MissingAlternate)?;

        for allele in [reference, alternate] {
            if !is_nucleotide_sequence(allele) {
                return Err(SkipReason::NonNucleotideAllele(allele.to_string()));
            }
        }

        let info: InfoMap = record
            .info
            .iter()
            .map(|(key, value)| (key.clone(), convert_info_value(value)))
            .collect();

        let category = categorize(reference, alternate, &info);

        let mut variant = Variant::new(chrom, pos, reference, alternate, category);
        variant.id = present(record.id.as_deref());
        variant.quality = record.quality;
        variant.filter = present(record.filter.as_deref());

        variant.gene = first_text(&info, GENE_KEYS);
        variant.transcript = first_text(&info, TRANSCRIPT_KEYS);
        variant.hgvs_c = first_text(&info, HGVS_C_KEYS);
        variant.hgvs_p = first_text(&info, HGVS_P_KEYS);
        variant.impact = first_text(&info, IMPACT_KEYS);
        variant.info = info;

        Ok(variant)
    }

    /// Normalize every recoverable record, logging the ones that are skipped.
    ///
    /// Returns the variants together with the number of skipped records.
    pub fn normalize_all(&self, records: &[RawRecord]) -> (Vec<Variant>, usize) {
        let mut variants = Vec::with_capacity(records.len());
        let mut skipped = 0;

        for (index, record) in records.iter().enumerate() {
            match self.normalize(record) {
                Ok(variant) => variants.push(variant),
                Err(reason) => {
                    skipped += 1;
                    tracing::warn!(
                        record = index,
                        locus = %record.locus(),
                        reason = %reason,
                        "Skipping malformed variant record"
                    );
                }
            }
        }

        tracing::debug!(
            normalized = variants.len(),
            skipped = skipped,
            "Normalized variant records"
        );

        (variants, skipped)
    }

    /// Check records for missing mandatory fields without normalizing them
    pub fn validate(&self, records: &[RawRecord]) -> ValidationReport {
        let mut errors = Vec::new();
        let mut truncated = false;

        'records: for (index, record) in records.iter().enumerate() {
            for problem in structural_problems(record) {
                if errors.len() >= MAX_VALIDATION_ERRORS {
                    truncated = true;
                    break 'records;
                }
                errors.push(format!("Record {}: {}", index + 1, problem));
            }
        }

        let is_valid = errors.is_empty();
        if truncated {
            errors.push(TRUNCATION_MARKER.to_string());
        }

        ValidationReport {
            is_valid,
            record_count: records.len(),
            errors,
        }
    }
}

fn structural_problems(record: &RawRecord) -> Vec<SkipReason> {
    let mut problems = Vec::new();

    if record.chrom.as_deref().is_none_or(|c| c.trim().is_empty()) {
        problems.push(SkipReason::MissingChromosome);
    }
    if record.pos.is_none_or(|p| p <= 0) {
        problems.push(SkipReason::InvalidPosition);
    }
    if record.reference.as_deref().is_none_or(str::is_empty) {
        problems.push(SkipReason::MissingReference);
    }
    if record.alternates.first().is_none_or(|a| a.is_empty()) {
        problems.push(SkipReason::MissingAlternate);
    }

    problems
}

/// Determine the variant category from allele lengths and INFO markers.
///
/// Equal-length multi-base substitutions without a structural marker fall
/// back to single-nucleotide.
fn categorize(reference: &str, alternate: &str, info: &InfoMap) -> VariantCategory {
    if reference.len() == 1 && alternate.len() == 1 {
        VariantCategory::SingleNucleotide
    } else if reference.len() != alternate.len() {
        VariantCategory::Indel
    } else if info.get(STRUCTURAL_MARKER).is_some_and(is_set) {
        VariantCategory::Structural
    } else {
        VariantCategory::SingleNucleotide
    }
}

/// Whether an INFO value carries something: a raised flag, a non-zero
/// number or non-empty text
fn is_set(value: &InfoValue) -> bool {
    match value {
        InfoValue::Flag(b) => *b,
        InfoValue::Integer(i) => *i != 0,
        InfoValue::Float(f) => *f != 0.0,
        InfoValue::Text(s) => !s.is_empty(),
    }
}

fn convert_info_value(value: &RawInfoValue) -> InfoValue {
    match value {
        RawInfoValue::Flag(b) => InfoValue::Flag(*b),
        RawInfoValue::Integer(i) => InfoValue::Integer(*i),
        RawInfoValue::Float(f) => InfoValue::Float(*f),
        RawInfoValue::Text(s) => InfoValue::Text(s.clone()),
        RawInfoValue::List(items) => InfoValue::Text(
            items
                .iter()
                .map(|item| convert_info_value(item).to_string())
                .collect::<Vec<_>>()
                .join(","),
        ),
        RawInfoValue::Bytes(bytes) => InfoValue::Text(
            String::from_utf8_lossy(bytes)
                .chars()
                .filter(|c| *c != char::REPLACEMENT_CHARACTER)
                .collect(),
        ),
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != MISSING)
        .map(str::to_string)
}

fn first_text(info: &InfoMap, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| info.get(*key))
        .map(InfoValue::to_string)
        .find(|v| !v.is_empty() && v != MISSING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(chrom: &str, pos: i64, reference: &str, alt: &str) -> RawRecord {
        RawRecord {
            chrom: Some(chrom.to_string()),
            pos: Some(pos),
            reference: Some(reference.to_string()),
            alternates: vec![alt.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip_identity() {
        let raw = record("chr17", 43057093, "acGT", "A");
        let variant = Normalizer::new().normalize(&raw).unwrap();

        assert_eq!(Some(variant.chrom.clone()), raw.chrom);
        assert_eq!(Some(variant.pos as i64), raw.pos);
        assert_eq!(Some(variant.reference.clone()), raw.reference);
        assert_eq!(variant.alternate, raw.alternates[0]);
    }

    #[test]
    fn test_categories() {
        let normalizer = Normalizer::new();
        let category = |r: &RawRecord| normalizer.normalize(r).unwrap().category;

        assert_eq!(category(&record("1", 10, "A", "G")), VariantCategory::SingleNucleotide);
        assert_eq!(category(&record("1", 10, "A", "AT")), VariantCategory::Indel);
        assert_eq!(category(&record("1", 10, "ATG", "A")), VariantCategory::Indel);
        assert_eq!(category(&record("1", 10, "AT", "GC")), VariantCategory::SingleNucleotide);

        let mut sv = record("1", 10, "AT", "GC");
        sv.info.insert("SVTYPE".to_string(), RawInfoValue::Text("INV".to_string()));
        assert_eq!(category(&sv), VariantCategory::Structural);
    }

    #[test]
    fn test_unset_structural_marker_is_ignored() {
        let normalizer = Normalizer::new();
        for marker in [
            RawInfoValue::Text(String::new()),
            RawInfoValue::Flag(false),
            RawInfoValue::Integer(0),
        ] {
            let mut mnv = record("1", 10, "AT", "GC");
            mnv.info.insert("SVTYPE".to_string(), marker.clone());
            assert_eq!(
                normalizer.normalize(&mnv).unwrap().category,
                VariantCategory::SingleNucleotide,
                "SVTYPE={:?}",
                marker
            );
        }

        let mut flagged = record("1", 10, "AT", "GC");
        flagged.info.insert("SVTYPE".to_string(), RawInfoValue::Flag(true));
        assert_eq!(
            normalizer.normalize(&flagged).unwrap().category,
            VariantCategory::Structural
        );
    }

    #[test]
    fn test_padded_chromosome_is_kept_verbatim() {
        let raw = record(" chr7 ", 117559590, "ATCT", "A");
        let variant = Normalizer::new().normalize(&raw).unwrap();
        assert_eq!(Some(variant.chrom), raw.chrom);

        let blank = record("   ", 117559590, "ATCT", "A");
        assert_eq!(
            Normalizer::new().normalize(&blank).err(),
            Some(SkipReason::MissingChromosome)
        );
    }

    #[test]
    fn test_missing_fields_are_skipped() {
        let normalizer = Normalizer::new();

        let mut no_chrom = record("1", 10, "A", "G");
        no_chrom.chrom = None;
        assert_eq!(normalizer.normalize(&no_chrom), Err(SkipReason::MissingChromosome));

        assert_eq!(
            normalizer.normalize(&record("1", 0, "A", "G")),
            Err(SkipReason::InvalidPosition)
        );

        let mut no_alt = record("1", 10, "A", "G");
        no_alt.alternates.clear();
        assert_eq!(normalizer.normalize(&no_alt), Err(SkipReason::MissingAlternate));

        assert!(matches!(
            normalizer.normalize(&record("1", 10, "A", "<DEL>")),
            Err(SkipReason::NonNucleotideAllele(_))
        ));
    }

    #[test]
    fn test_normalize_all_keeps_recoverable_records() {
        let records = vec![
            record("1", 10, "A", "G"),
            RawRecord::default(),
            record("2", 20, "C", "T"),
        ];
        let (variants, skipped) = Normalizer::new().normalize_all(&records);
        assert_eq!(variants.len(), 2);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_info_conversion() {
        let mut raw = record("1", 10, "A", "G");
        raw.info = BTreeMap::from([
            (
                "AF".to_string(),
                RawInfoValue::List(vec![RawInfoValue::Float(0.5), RawInfoValue::Integer(1)]),
            ),
            (
                "ANN".to_string(),
                RawInfoValue::Bytes(vec![b'o', b'k', 0xff, b'!']),
            ),
            ("DB".to_string(), RawInfoValue::Flag(true)),
        ]);

        let variant = Normalizer::new().normalize(&raw).unwrap();
        assert_eq!(variant.info["AF"], InfoValue::Text("0.5,1".to_string()));
        assert_eq!(variant.info["ANN"], InfoValue::Text("ok!".to_string()));
        assert_eq!(variant.info["DB"], InfoValue::Flag(true));
    }

    #[test]
    fn test_alias_extraction() {
        let mut raw = record("17", 43057093, "A", "T");
        raw.id = Some(".".to_string());
        raw.filter = Some("PASS".to_string());
        raw.info = BTreeMap::from([
            ("Gene".to_string(), RawInfoValue::Text("BRCA1".to_string())),
            ("SYMBOL".to_string(), RawInfoValue::Text("IGNORED".to_string())),
            ("Feature".to_string(), RawInfoValue::Text("ENST00000357654".to_string())),
            ("HGVSp".to_string(), RawInfoValue::Text("p.Arg1751Ter".to_string())),
            ("Consequence".to_string(), RawInfoValue::Text("stop_gained".to_string())),
        ]);

        let variant = Normalizer::new().normalize(&raw).unwrap();
        assert_eq!(variant.id, None);
        assert_eq!(variant.filter.as_deref(), Some("PASS"));
        assert_eq!(variant.gene.as_deref(), Some("BRCA1"));
        assert_eq!(variant.transcript.as_deref(), Some("ENST00000357654"));
        assert_eq!(variant.hgvs_p.as_deref(), Some("p.Arg1751Ter"));
        assert_eq!(variant.impact.as_deref(), Some("stop_gained"));
        assert_eq!(variant.hgvs_c, None);
    }

    #[test]
    fn test_validate_reports_problems() {
        let records = vec![record("1", 10, "A", "G"), RawRecord::default()];
        let report = Normalizer::new().validate(&records);

        assert!(!report.is_valid);
        assert_eq!(report.record_count, 2);
        assert_eq!(report.errors.len(), 4);
        assert!(report.errors[0].starts_with("Record 2:"));
    }

    #[test]
    fn test_validate_truncates_errors() {
        let records = vec![RawRecord::default(); 5];
        let report = Normalizer::new().validate(&records);

        assert_eq!(report.errors.len(), MAX_VALIDATION_ERRORS + 1);
        assert_eq!(report.errors.last().map(String::as_str), Some(TRUNCATION_MARKER));
    }

    #[test]
    fn test_validate_clean_batch() {
        let report = Normalizer::new().validate(&[record("X", 5, "C", "CA")]);
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }
}
