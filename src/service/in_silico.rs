//! In-silico predictor scores embedded in a variant's INFO map

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{InfoMap, InfoValue, Variant};

const CADD_KEYS: &[&str] = &["CADD_PHRED", "CADD"];
const POLYPHEN_KEYS: &[&str] = &["PolyPhen"];
const SIFT_KEYS: &[&str] = &["SIFT"];

/// Trailing score in `label:score` or `label(score)` form
static LABELLED_SCORE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"[:(]\s*([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)\s*\)?\s*$").ok()
});

/// Fill unset predictor scores from INFO. Values that cannot be parsed are
/// ignored.
pub fn extract_in_silico(variant: &mut Variant) {
    if variant.cadd_score.is_none() {
        variant.cadd_score = first_score(&variant.info, CADD_KEYS, InfoValue::as_f64);
    }
    if variant.polyphen_score.is_none() {
        variant.polyphen_score = first_score(&variant.info, POLYPHEN_KEYS, labelled_score);
    }
    if variant.sift_score.is_none() {
        variant.sift_score = first_score(&variant.info, SIFT_KEYS, labelled_score);
    }
}

fn first_score(
    info: &InfoMap,
    keys: &[&str],
    parse: fn(&InfoValue) -> Option<f64>,
) -> Option<f64> {
    keys.iter()
        .filter_map(|key| info.get(*key))
        .find_map(parse)
        .filter(|score| score.is_finite())
}

/// Accept a bare number, `label:score` or `label(score)`
fn labelled_score(value: &InfoValue) -> Option<f64> {
    if let Some(score) = value.as_f64() {
        return Some(score);
    }

    let InfoValue::Text(text) = value else {
        return None;
    };

    LABELLED_SCORE
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VariantCategory;

    fn text(s: &str) -> InfoValue {
        InfoValue::Text(s.to_string())
    }

    fn variant_with(info: &[(&str, InfoValue)]) -> Variant {
        let mut variant = Variant::new("7", 140753336, "A", "T", VariantCategory::SingleNucleotide);
        variant.info = info
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        variant
    }

    #[test]
    fn test_labelled_scores() {
        assert_eq!(labelled_score(&text("probably_damaging(0.998)")), Some(0.998));
        assert_eq!(labelled_score(&text("deleterious:0.01")), Some(0.01));
        assert_eq!(labelled_score(&text("0.5")), Some(0.5));
        assert_eq!(labelled_score(&InfoValue::Float(0.2)), Some(0.2));
        assert_eq!(labelled_score(&text("benign")), None);
        assert_eq!(labelled_score(&InfoValue::Flag(true)), None);
    }

    #[test]
    fn test_extract_all_predictors() {
        let mut variant = variant_with(&[
            ("CADD_PHRED", InfoValue::Float(32.0)),
            ("PolyPhen", text("probably_damaging(0.95)")),
            ("SIFT", text("deleterious(0.01)")),
        ]);
        extract_in_silico(&mut variant);

        assert_eq!(variant.cadd_score, Some(32.0));
        assert_eq!(variant.polyphen_score, Some(0.95));
        assert_eq!(variant.sift_score, Some(0.01));
    }

    #[test]
    fn test_cadd_fallback_key() {
        let mut variant = variant_with(&[("CADD", text("24.1"))]);
        extract_in_silico(&mut variant);
        assert_eq!(variant.cadd_score, Some(24.1));
    }

    #[test]
    fn test_existing_scores_are_kept() {
        let mut variant = variant_with(&[("SIFT", text("tolerated(0.6)"))]);
        variant.sift_score = Some(0.02);
        extract_in_silico(&mut variant);
        assert_eq!(variant.sift_score, Some(0.02));
    }

    #[test]
    fn test_unparseable_values_ignored() {
        let mut variant = variant_with(&[
            ("CADD_PHRED", text("n/a")),
            ("PolyPhen", text("unknown")),
        ]);
        extract_in_silico(&mut variant);
        assert_eq!(variant.cadd_score, None);
        assert_eq!(variant.polyphen_score, None);
    }
}
