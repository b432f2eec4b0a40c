//! Ensembl annotator backed by the Ensembl REST API (VEP)
//!
//! Supplies gene, transcript, HGVS notation and predicted impact.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{
    AnnotatorError, RateLimiter, SourceAnnotator, build_client, non_empty, read_json,
    resolve_base_url,
};
use crate::model::{AnnotationSource, PartialAnnotation, SourceConfig, Variant};

const ENSEMBL_API_BASE_URL: &str = "https://rest.ensembl.org";
const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

#[derive(Debug, Serialize)]
struct VepRequest {
    variants: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VepResult {
    #[serde(default)]
    most_severe_consequence: Option<String>,
    #[serde(default)]
    transcript_consequences: Vec<TranscriptConsequence>,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptConsequence {
    #[serde(default)]
    gene_symbol: Option<String>,
    #[serde(default)]
    transcript_id: Option<String>,
    #[serde(default)]
    hgvsc: Option<String>,
    #[serde(default)]
    hgvsp: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    /// Ensembl encodes the flag as `1`
    #[serde(default)]
    canonical: Option<u8>,
}

/// Gene or transcript metadata from an Ensembl stable id lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnsemblLookup {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub biotype: Option<String>,
    #[serde(default)]
    pub seq_region_name: Option<String>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
    #[serde(default)]
    pub strand: Option<i8>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Annotator for transcript consequences from Ensembl VEP
pub struct EnsemblAnnotator {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl EnsemblAnnotator {
    pub fn new(config: &SourceConfig, timeout: Duration) -> Result<Self, AnnotatorError> {
        let base_url = resolve_base_url(config.base_url.as_deref(), ENSEMBL_API_BASE_URL)?;
        let interval = config.min_interval_ms.unwrap_or(DEFAULT_MIN_INTERVAL_MS);

        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            limiter: RateLimiter::new(Duration::from_millis(interval)),
        })
    }

    /// Look up gene or transcript metadata by Ensembl stable id.
    ///
    /// Returns `Ok(None)` when Ensembl does not know the id, and an error when
    /// Ensembl could not be asked.
    pub async fn lookup(&self, stable_id: &str) -> Result<Option<EnsemblLookup>, AnnotatorError> {
        let url = format!("{}/lookup/id/{}", self.base_url, stable_id);

        tracing::debug!(stable_id = %stable_id, url = %url, "Looking up Ensembl id");

        self.limiter.acquire().await;
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        read_json(response).await
    }
}

#[async_trait]
impl SourceAnnotator for EnsemblAnnotator {
    fn source(&self) -> AnnotationSource {
        AnnotationSource::Ensembl
    }

    async fn fetch(&self, variant: &Variant) -> Result<Option<PartialAnnotation>, AnnotatorError> {
        let url = format!("{}/vep/homo_sapiens/region", self.base_url);
        let line = region_line(variant);

        tracing::debug!(line = %line, url = %url, "Querying Ensembl VEP");

        let request = VepRequest {
            variants: vec![line],
        };

        self.limiter.acquire().await;
        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .query(&[("hgvs", "1"), ("canonical", "1")])
            .json(&request)
            .send()
            .await?;

        let results: Option<Vec<VepResult>> = read_json(response).await?;

        Ok(results
            .and_then(|r| r.into_iter().next())
            .and_then(result_to_partial))
    }
}

/// VCF-style input line for the VEP region endpoint.
///
/// The chromosome is bare and the mitochondrial contig is spelled `MT`.
pub(crate) fn region_line(variant: &Variant) -> String {
    let chrom = match variant.bare_chrom() {
        "M" | "m" => "MT",
        other => other,
    };
    let id = variant.id.as_deref().unwrap_or(".");

    format!(
        "{} {} {} {} {} . . .",
        chrom, variant.pos, id, variant.reference, variant.alternate
    )
}

/// Take the canonical transcript consequence, or the first one listed
fn result_to_partial(result: VepResult) -> Option<PartialAnnotation> {
    let VepResult {
        most_severe_consequence,
        mut transcript_consequences,
    } = result;

    if transcript_consequences.is_empty() {
        return None;
    }

    let index = transcript_consequences
        .iter()
        .position(|tc| tc.canonical == Some(1))
        .unwrap_or(0);
    let consequence = transcript_consequences.swap_remove(index);

    let partial = PartialAnnotation {
        gene: non_empty(consequence.gene_symbol),
        transcript: non_empty(consequence.transcript_id),
        hgvs_c: non_empty(consequence.hgvsc),
        hgvs_p: non_empty(consequence.hgvsp),
        impact: non_empty(consequence.impact).or(non_empty(most_severe_consequence)),
        ..Default::default()
    };

    (!partial.is_empty()).then_some(partial)
}
