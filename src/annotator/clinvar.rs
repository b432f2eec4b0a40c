//! ClinVar annotator backed by the NCBI E-utilities API
//!
//! Supplies clinical significance, associated diseases and review metadata.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{
    AnnotatorError, RateLimiter, SourceAnnotator, build_client, non_empty, read_json,
    resolve_base_url,
};
use crate::model::{AnnotationSource, PartialAnnotation, SourceConfig, Variant};

const CLINVAR_API_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

// esearch response, only the fields we need
#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    esearchresult: Option<SearchResult>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

// esummary wraps records in a map keyed by uid, next to a "uids" array
#[derive(Debug, Default, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    result: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct VariationSummary {
    #[serde(default)]
    germline_classification: Option<GermlineClassification>,
    #[serde(default)]
    clinical_significance: Option<SignificanceField>,
    #[serde(default)]
    trait_set: Vec<Trait>,
    #[serde(default)]
    phenotype_ids: Vec<Phenotype>,
    #[serde(default)]
    review_status: Option<String>,
    #[serde(default)]
    last_evaluated: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GermlineClassification {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    review_status: Option<String>,
    #[serde(default)]
    last_evaluated: Option<String>,
    #[serde(default)]
    trait_set: Vec<Trait>,
}

/// Older summaries carry a bare string, newer ones an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignificanceField {
    Label(String),
    Detailed {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        review_status: Option<String>,
        #[serde(default)]
        last_evaluated: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct Trait {
    #[serde(default)]
    trait_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Phenotype {
    #[serde(default)]
    disease_name: Option<String>,
}

/// Annotator for clinical significance from ClinVar
pub struct ClinVarAnnotator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    limiter: RateLimiter,
}

impl ClinVarAnnotator {
    /// Create a new ClinVar annotator
    ///
    /// The base URL defaults to the public E-utilities endpoint unless the
    /// source configuration overrides it.
    pub fn new(config: &SourceConfig, timeout: Duration) -> Result<Self, AnnotatorError> {
        let base_url = resolve_base_url(config.base_url.as_deref(), CLINVAR_API_BASE_URL)?;
        let interval = config.min_interval_ms.unwrap_or(DEFAULT_MIN_INTERVAL_MS);

        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            api_key: config.api_key.clone(),
            limiter: RateLimiter::new(Duration::from_millis(interval)),
        })
    }

    /// Find the ClinVar uid of the first record matching the variant
    async fn search_variant(&self, variant: &Variant) -> Result<Option<String>, AnnotatorError> {
        let term = build_search_term(variant);
        let url = format!("{}/esearch.fcgi", self.base_url);

        tracing::debug!(term = %term, url = %url, "Searching ClinVar");

        let mut params = vec![
            ("db", "clinvar".to_string()),
            ("term", term),
            ("retmode", "json".to_string()),
            ("retmax", "1".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        self.limiter.acquire().await;
        let response = self.client.get(&url).query(&params).send().await?;
        let search: Option<SearchResponse> = read_json(response).await?;

        Ok(search
            .and_then(|s| s.esearchresult)
            .and_then(|r| r.idlist.into_iter().next()))
    }

    /// Fetch the summary record for a ClinVar uid
    async fn variation_summary(
        &self,
        uid: &str,
    ) -> Result<Option<VariationSummary>, AnnotatorError> {
        let url = format!("{}/esummary.fcgi", self.base_url);

        let mut params = vec![
            ("db", "clinvar".to_string()),
            ("id", uid.to_string()),
            ("retmode", "json".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        self.limiter.acquire().await;
        let response = self.client.get(&url).query(&params).send().await?;
        let summary: Option<SummaryResponse> = read_json(response).await?;

        Ok(summary.and_then(|s| extract_summary(s, uid)))
    }
}

#[async_trait]
impl SourceAnnotator for ClinVarAnnotator {
    fn source(&self) -> AnnotationSource {
        AnnotationSource::ClinVar
    }

    async fn fetch(&self, variant: &Variant) -> Result<Option<PartialAnnotation>, AnnotatorError> {
        let Some(uid) = self.search_variant(variant).await? else {
            return Ok(None);
        };

        let Some(summary) = self.variation_summary(&uid).await? else {
            return Ok(None);
        };

        let partial = summary_to_partial(summary);

        tracing::debug!(
            uid = %uid,
            significance = ?partial.clinical_significance,
            diseases = partial.diseases.len(),
            "Fetched ClinVar record"
        );

        Ok(Some(partial))
    }
}

/// Build the esearch term for a variant.
///
/// The chromosome is given bare (no `chr` prefix) and the locus is encoded as
/// a region term; gene and HGVS hints narrow the search when present.
pub(crate) fn build_search_term(variant: &Variant) -> String {
    let mut parts = vec![
        format!("{}[chr]", variant.bare_chrom()),
        format!("{}[chrpos38]", variant.pos),
    ];

    if let Some(gene) = &variant.gene {
        parts.push(format!("{}[gene]", gene));
    }
    if let Some(hgvs_c) = &variant.hgvs_c {
        parts.push(format!("\"{}\"[hgvs]", hgvs_c));
    }
    if let Some(hgvs_p) = &variant.hgvs_p {
        parts.push(format!("\"{}\"[hgvs]", hgvs_p));
    }

    parts.join(" AND ")
}

fn extract_summary(mut response: SummaryResponse, uid: &str) -> Option<VariationSummary> {
    let raw = response.result.remove(uid)?;
    match serde_json::from_value(raw) {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::debug!(uid = %uid, error = %e, "Unrecognized ClinVar summary shape");
            None
        }
    }
}

fn summary_to_partial(summary: VariationSummary) -> PartialAnnotation {
    let VariationSummary {
        germline_classification,
        clinical_significance,
        trait_set,
        phenotype_ids,
        review_status,
        last_evaluated,
    } = summary;

    let mut significance = None;
    let mut review = non_empty(review_status);
    let mut evaluated = non_empty(last_evaluated);
    let mut diseases = BTreeSet::new();

    if let Some(germline) = germline_classification {
        significance = non_empty(germline.description);
        review = review.or(non_empty(germline.review_status));
        evaluated = evaluated.or(non_empty(germline.last_evaluated));
        diseases.extend(germline.trait_set.into_iter().filter_map(|t| non_empty(t.trait_name)));
    }

    match clinical_significance {
        Some(SignificanceField::Label(label)) => {
            significance = significance.or(non_empty(Some(label)));
        }
        Some(SignificanceField::Detailed {
            description,
            review_status,
            last_evaluated,
        }) => {
            significance = significance.or(non_empty(description));
            review = review.or(non_empty(review_status));
            evaluated = evaluated.or(non_empty(last_evaluated));
        }
        None => {}
    }

    diseases.extend(trait_set.into_iter().filter_map(|t| non_empty(t.trait_name)));
    diseases.extend(
        phenotype_ids
            .into_iter()
            .filter_map(|p| non_empty(p.disease_name)),
    );

    PartialAnnotation {
        clinical_significance: significance,
        diseases: diseases.into_iter().collect(),
        review_status: review,
        last_evaluated: evaluated,
        ..Default::default()
    }
}
