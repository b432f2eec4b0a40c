//! gnomAD annotator backed by the gnomAD GraphQL API
//!
//! Supplies population allele frequencies.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    AnnotatorError, RateLimiter, SourceAnnotator, build_client, read_json, resolve_base_url,
};
use crate::model::{AnnotationSource, PartialAnnotation, SourceConfig, Variant};

const GNOMAD_API_BASE_URL: &str = "https://gnomad.broadinstitute.org/api";
const GNOMAD_DATASET: &str = "gnomad_r4";
const DEFAULT_MIN_INTERVAL_MS: u64 = 200;
const DEFAULT_COMMON_THRESHOLD: f64 = 0.01;

const VARIANT_QUERY: &str = r#"
query VariantFrequency($variantId: String!, $dataset: DatasetId!) {
  variant(variantId: $variantId, dataset: $dataset) {
    variant_id
    genome { ac an af populations { id ac an } }
    exome { ac an af populations { id ac an } }
  }
}
"#;

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: QueryVariables,
}

#[derive(Debug, Serialize)]
struct QueryVariables {
    #[serde(rename = "variantId")]
    variant_id: String,
    dataset: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseData {
    #[serde(default)]
    variant: Option<VariantData>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct VariantData {
    #[serde(default)]
    genome: Option<FrequencyData>,
    #[serde(default)]
    exome: Option<FrequencyData>,
}

#[derive(Debug, Default, Deserialize)]
struct FrequencyData {
    #[serde(default)]
    ac: Option<u64>,
    #[serde(default)]
    an: Option<u64>,
    #[serde(default)]
    af: Option<f64>,
    #[serde(default)]
    populations: Vec<PopulationData>,
}

impl FrequencyData {
    /// Reported frequency, or ac/an when the service omits it
    fn allele_frequency(&self) -> Option<f64> {
        self.af
            .or_else(|| ratio(self.ac, self.an))
            .filter(|af| (0.0..=1.0).contains(af))
    }
}

#[derive(Debug, Default, Deserialize)]
struct PopulationData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    ac: Option<u64>,
    #[serde(default)]
    an: Option<u64>,
}

fn ratio(ac: Option<u64>, an: Option<u64>) -> Option<f64> {
    match (ac, an) {
        (Some(ac), Some(an)) if an > 0 => Some(ac as f64 / an as f64),
        _ => None,
    }
}

/// Annotator for population allele frequencies from gnomAD
pub struct GnomadAnnotator {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl GnomadAnnotator {
    pub fn new(config: &SourceConfig, timeout: Duration) -> Result<Self, AnnotatorError> {
        let base_url = resolve_base_url(config.base_url.as_deref(), GNOMAD_API_BASE_URL)?;
        let interval = config.min_interval_ms.unwrap_or(DEFAULT_MIN_INTERVAL_MS);

        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            limiter: RateLimiter::new(Duration::from_millis(interval)),
        })
    }

    async fn query_variant(
        &self,
        variant: &Variant,
    ) -> Result<Option<VariantData>, AnnotatorError> {
        let request = build_request(variant);

        tracing::debug!(
            variant_id = %request.variables.variant_id,
            url = %self.base_url,
            "Querying gnomAD"
        );

        self.limiter.acquire().await;
        let response = self.client.post(&self.base_url).json(&request).send().await?;
        let body: Option<GraphQlResponse> = read_json(response).await?;

        let Some(body) = body else {
            return Ok(None);
        };

        let variant_data = body.data.and_then(|d| d.variant);
        if variant_data.is_none() && !body.errors.is_empty() {
            // gnomAD reports unknown variants as GraphQL errors
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            tracing::debug!(errors = ?messages, "gnomAD returned no variant");
        }

        Ok(variant_data)
    }

    /// Per-population allele frequencies (af = ac / an) for a variant.
    ///
    /// Uses genome data when present, exome data otherwise. Returns an empty
    /// map when the variant is unknown or the source fails.
    pub async fn population_frequencies(&self, variant: &Variant) -> BTreeMap<String, f64> {
        match self.query_variant(variant).await {
            Ok(Some(data)) => population_frequencies_of(&data),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(
                    chrom = %variant.chrom,
                    pos = variant.pos,
                    error = %e,
                    "gnomAD population lookup failed"
                );
                BTreeMap::new()
            }
        }
    }

    /// Whether the variant's frequency exceeds `threshold` (default 0.01).
    ///
    /// An unknown frequency is reported as not common.
    pub async fn is_common_variant(&self, variant: &Variant, threshold: Option<f64>) -> bool {
        let threshold = threshold.unwrap_or(DEFAULT_COMMON_THRESHOLD);
        self.annotate(variant)
            .await
            .and_then(|p| p.population_af)
            .is_some_and(|af| af > threshold)
    }
}

#[async_trait]
impl SourceAnnotator for GnomadAnnotator {
    fn source(&self) -> AnnotationSource {
        AnnotationSource::Gnomad
    }

    async fn fetch(&self, variant: &Variant) -> Result<Option<PartialAnnotation>, AnnotatorError> {
        let Some(data) = self.query_variant(variant).await? else {
            return Ok(None);
        };

        Ok(preferred_frequency(&data).map(|af| PartialAnnotation {
            population_af: Some(af),
            ..Default::default()
        }))
    }
}

/// Composite gnomAD identifier `chrom-pos-ref-alt` with a bare chromosome
pub(crate) fn variant_id(variant: &Variant) -> String {
    format!(
        "{}-{}-{}-{}",
        variant.bare_chrom(),
        variant.pos,
        variant.reference,
        variant.alternate
    )
}

fn build_request(variant: &Variant) -> GraphQlRequest<'static> {
    GraphQlRequest {
        query: VARIANT_QUERY,
        variables: QueryVariables {
            variant_id: variant_id(variant),
            dataset: GNOMAD_DATASET,
        },
    }
}

/// Genome frequency, falling back to exome
fn preferred_frequency(data: &VariantData) -> Option<f64> {
    data.genome
        .as_ref()
        .and_then(FrequencyData::allele_frequency)
        .or_else(|| data.exome.as_ref().and_then(FrequencyData::allele_frequency))
}

fn population_frequencies_of(data: &VariantData) -> BTreeMap<String, f64> {
    let Some(source) = data.genome.as_ref().or(data.exome.as_ref()) else {
        return BTreeMap::new();
    };

    source
        .populations
        .iter()
        .filter_map(|p| {
            let id = p.id.clone()?;
            ratio(p.ac, p.an).map(|af| (id, af))
        })
        .collect()
}
