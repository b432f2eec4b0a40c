//! Application state and service initialization
//!
//! This module centralizes service construction so handlers receive one
//! shared [`AppState`].

use std::sync::Arc;

use tokio::sync::watch;

use crate::annotator::{
    AnnotatorError, ClinVarAnnotator, EnsemblAnnotator, GnomadAnnotator, SourceAnnotator,
};
use crate::model::{AnnotationConfig, Config};
use crate::service::{AcmgEvaluator, AnnotationCache, AnnotationCoordinator, Normalizer};

/// Application state containing all services and shared resources
pub struct AppState {
    pub normalizer: Normalizer,
    pub coordinator: Arc<AnnotationCoordinator>,
    pub evaluator: Arc<AcmgEvaluator>,
    /// gnomAD annotator for population helper queries, when enabled
    pub gnomad: Option<Arc<GnomadAnnotator>>,
    /// Ensembl annotator for stable id lookups, when enabled
    pub ensembl: Option<Arc<EnsemblAnnotator>>,
    /// Redis cache (optional)
    pub cache: Option<AnnotationCache>,
    /// Flips to true when the server is shutting down
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Redis cache initialization (optional)
    /// 2. Construction of the enabled source annotators
    /// 3. Coordinator and evaluator construction
    pub async fn new(config: &Config, shutdown: watch::Receiver<bool>) -> Result<Self, AppError> {
        // Initialize Redis cache (optional - will log warning if Redis is unavailable)
        let cache = match AnnotationCache::new().await {
            Ok(cache) => {
                tracing::info!("Redis cache enabled");
                Some(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis cache unavailable, running without cache");
                None
            }
        };

        let sources = Self::build_sources(&config.annotation)?;
        if sources.all.is_empty() {
            tracing::warn!("All annotation sources are disabled, variants will not be annotated");
        }

        let coordinator = Arc::new(AnnotationCoordinator::new(
            sources.all,
            cache.clone(),
            config.annotation.max_workers,
        ));

        Ok(Self {
            normalizer: Normalizer::new(),
            coordinator,
            evaluator: Arc::new(AcmgEvaluator::new()),
            gnomad: sources.gnomad,
            ensembl: sources.ensembl,
            cache,
            shutdown,
        })
    }

    /// Build the enabled annotators in precedence order: ClinVar, gnomAD, Ensembl
    fn build_sources(config: &AnnotationConfig) -> Result<Sources, AppError> {
        let timeout = config.request_timeout();
        let mut sources = Sources::default();

        if config.clinvar.enabled {
            let annotator = ClinVarAnnotator::new(&config.clinvar, timeout)
                .map_err(|e| AppError::AnnotatorInit("clinvar", e))?;
            sources.all.push(Arc::new(annotator));
        }
        if config.gnomad.enabled {
            let annotator = Arc::new(
                GnomadAnnotator::new(&config.gnomad, timeout)
                    .map_err(|e| AppError::AnnotatorInit("gnomad", e))?,
            );
            sources.all.push(annotator.clone());
            sources.gnomad = Some(annotator);
        }
        if config.ensembl.enabled {
            let annotator = Arc::new(
                EnsemblAnnotator::new(&config.ensembl, timeout)
                    .map_err(|e| AppError::AnnotatorInit("ensembl", e))?,
            );
            sources.all.push(annotator.clone());
            sources.ensembl = Some(annotator);
        }

        Ok(sources)
    }

    #[cfg(test)]
    pub fn for_tests(sources: Vec<Arc<dyn SourceAnnotator>>) -> Self {
        let (_tx, shutdown) = watch::channel(false);
        Self {
            normalizer: Normalizer::new(),
            coordinator: Arc::new(AnnotationCoordinator::new(sources, None, 2)),
            evaluator: Arc::new(AcmgEvaluator::new()),
            gnomad: None,
            ensembl: None,
            cache: None,
            shutdown,
        }
    }
}

/// Constructed annotators; helper handles share instances (and rate
/// limiters) with the coordinator
#[derive(Default)]
struct Sources {
    all: Vec<Arc<dyn SourceAnnotator>>,
    gnomad: Option<Arc<GnomadAnnotator>>,
    ensembl: Option<Arc<EnsemblAnnotator>>,
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// An annotation source could not be constructed
    #[error("Failed to initialize {0} annotator: {1}")]
    AnnotatorInit(&'static str, #[source] AnnotatorError),
}
