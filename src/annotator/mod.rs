//! Source annotators wrapping external variant knowledge bases

mod clinvar;
mod ensembl;
#[cfg(test)]
pub(crate) mod fixtures;
mod gnomad;
mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::model::{AnnotationSource, PartialAnnotation, Variant};

pub use clinvar::ClinVarAnnotator;
pub use ensembl::{EnsemblAnnotator, EnsemblLookup};
pub use gnomad::GnomadAnnotator;
pub use rate_limit::RateLimiter;

const USER_AGENT: &str = concat!("variant-intel/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum AnnotatorError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Uniform contract for one external knowledge source.
///
/// Implementors provide `fetch`, which may fail. Callers use `annotate`, which
/// never fails: errors are logged with the source and variant identity and
/// turn into an absent annotation.
#[async_trait]
pub trait SourceAnnotator: Send + Sync {
    /// The source this annotator queries
    fn source(&self) -> AnnotationSource;

    /// Query the source for one variant
    async fn fetch(&self, variant: &Variant) -> Result<Option<PartialAnnotation>, AnnotatorError>;

    /// Query the source, absorbing every failure
    async fn annotate(&self, variant: &Variant) -> Option<PartialAnnotation> {
        match self.fetch(variant).await {
            Ok(Some(partial)) if !partial.is_empty() => Some(partial),
            Ok(_) => {
                tracing::debug!(
                    source = %self.source(),
                    chrom = %variant.chrom,
                    pos = variant.pos,
                    "No annotation data"
                );
                None
            }
            Err(AnnotatorError::RateLimited) => {
                tracing::warn!(
                    source = %self.source(),
                    chrom = %variant.chrom,
                    pos = variant.pos,
                    "Rate limited by annotation source, skipping"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.source(),
                    chrom = %variant.chrom,
                    pos = variant.pos,
                    error = %e,
                    "Annotation failed"
                );
                None
            }
        }
    }
}

/// Build the HTTP client shared by all requests of one annotator
fn build_client(timeout: Duration) -> Result<Client, AnnotatorError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Validate a configured base URL and return it without a trailing slash
fn resolve_base_url(configured: Option<&str>, default: &str) -> Result<String, AnnotatorError> {
    let raw = configured.unwrap_or(default);
    Url::parse(raw)?;
    Ok(raw.trim_end_matches('/').to_string())
}

/// Decode a JSON response body.
///
/// A 404 is a valid "no data" answer and yields `None`.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, AnnotatorError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AnnotatorError::RateLimited);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AnnotatorError::UnexpectedStatus {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    let parsed = response
        .json::<T>()
        .await
        .map_err(|e| AnnotatorError::ParseError(format!("Failed to deserialize response: {}", e)))?;

    Ok(Some(parsed))
}

/// Treat empty or whitespace-only strings from a response as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
