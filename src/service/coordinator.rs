//! Annotation coordinator
//!
//! Fans a batch of variants out over a bounded number of workers. Each worker
//! runs every source annotator in order for one variant, merging results
//! write-once, then fills in-silico scores from the variant's own INFO map.
//! Source failures and panics are isolated per source per variant, and the
//! batch always returns one variant per input.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt, stream};
use tokio::sync::watch;

use crate::annotator::SourceAnnotator;
use crate::model::{AnnotationSource, CoverageSummary, PartialAnnotation, Variant};
use crate::service::cache::{AnnotationCache, CacheError};
use crate::service::cache_keys::generate_annotation_cache_key;
use crate::service::in_silico::extract_in_silico;

const DEFAULT_MAX_WORKERS: usize = 4;

/// Coordinates the source annotators over variants
pub struct AnnotationCoordinator {
    /// Queried in order; earlier sources win on conflicting fields
    sources: Vec<Arc<dyn SourceAnnotator>>,
    cache: Option<AnnotationCache>,
    max_workers: usize,
}

impl AnnotationCoordinator {
    pub fn new(
        sources: Vec<Arc<dyn SourceAnnotator>>,
        cache: Option<AnnotationCache>,
        max_workers: usize,
    ) -> Self {
        let max_workers = if max_workers == 0 {
            DEFAULT_MAX_WORKERS
        } else {
            max_workers
        };

        tracing::info!(
            sources = ?sources.iter().map(|s| s.source().name()).collect::<Vec<_>>(),
            max_workers = max_workers,
            cache_enabled = cache.is_some(),
            "Annotation coordinator initialized"
        );

        Self {
            sources,
            cache,
            max_workers,
        }
    }

    /// Sources in query order
    pub fn sources(&self) -> Vec<AnnotationSource> {
        self.sources.iter().map(|s| s.source()).collect()
    }

    /// Annotate a single variant with every source.
    ///
    /// Never fails; a source that errors or panics contributes nothing.
    pub async fn annotate(&self, mut variant: Variant) -> Variant {
        for source in &self.sources {
            let query = AssertUnwindSafe(self.query_source(source.as_ref(), &variant));

            match query.catch_unwind().await {
                Ok(Some(partial)) => partial.merge_into(&mut variant),
                Ok(None) => {}
                Err(payload) => {
                    tracing::warn!(
                        source = %source.source(),
                        chrom = %variant.chrom,
                        pos = variant.pos,
                        error = %panic_message(payload.as_ref()),
                        "Annotation source panicked, continuing with remaining sources"
                    );
                }
            }
        }

        extract_in_silico(&mut variant);
        variant
    }

    /// Annotate a batch with at most `max_workers` variants in flight.
    ///
    /// The output has one variant per input but the order is not preserved;
    /// correlate by variant identity. When `shutdown` flips to true, in-flight
    /// and queued variants are returned unmodified.
    pub async fn annotate_batch(
        &self,
        variants: Vec<Variant>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<Variant> {
        let total = variants.len();
        let start_time = std::time::Instant::now();

        tracing::info!(
            variants = total,
            max_workers = self.max_workers,
            "Starting batch annotation"
        );

        let annotated: Vec<Variant> = stream::iter(variants)
            .map(|variant| self.annotate_guarded(variant, shutdown.clone()))
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        let coverage = CoverageSummary::from_variants(&annotated);
        tracing::info!(
            variants = annotated.len(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            clinvar = coverage.clinvar.count,
            population_frequency = coverage.population_frequency.count,
            transcript = coverage.transcript.count,
            "Batch annotation complete"
        );

        annotated
    }

    /// Coverage of each annotation field across `variants`
    pub fn coverage(&self, variants: &[Variant]) -> CoverageSummary {
        CoverageSummary::from_variants(variants)
    }

    /// Per-variant worker: survives panics and honors cancellation
    async fn annotate_guarded(
        &self,
        variant: Variant,
        mut shutdown: watch::Receiver<bool>,
    ) -> Variant {
        if *shutdown.borrow() {
            return variant;
        }

        let original = variant.clone();
        let work = AssertUnwindSafe(self.annotate(variant)).catch_unwind();

        tokio::select! {
            result = work => match result {
                Ok(annotated) => annotated,
                Err(payload) => {
                    tracing::warn!(
                        chrom = %original.chrom,
                        pos = original.pos,
                        error = %panic_message(payload.as_ref()),
                        "Variant annotation failed, returning it unannotated"
                    );
                    original
                }
            },
            _ = cancelled(&mut shutdown) => {
                tracing::debug!(
                    chrom = %original.chrom,
                    pos = original.pos,
                    "Annotation cancelled"
                );
                original
            }
        }
    }

    /// One source call for one variant, read-through the cache when enabled
    async fn query_source(
        &self,
        source: &dyn SourceAnnotator,
        variant: &Variant,
    ) -> Option<PartialAnnotation> {
        let Some(cache) = &self.cache else {
            return source.annotate(variant).await;
        };

        let key = generate_annotation_cache_key(variant);

        match cache.get_annotation(source.source(), &key).await {
            Ok(partial) => {
                tracing::debug!(
                    source = %source.source(),
                    chrom = %variant.chrom,
                    pos = variant.pos,
                    "Cache hit"
                );
                return Some(partial);
            }
            Err(CacheError::Miss(_)) => {}
            Err(e) => {
                tracing::warn!(source = %source.source(), error = %e, "Cache read failed");
            }
        }

        let partial = source.annotate(variant).await?;

        if let Err(e) = cache.set_annotation(source.source(), &key, &partial).await {
            tracing::warn!(source = %source.source(), error = %e, "Failed to cache annotation");
        }

        Some(partial)
    }
}

/// Resolves once the shutdown flag is set; never resolves if the sender is gone
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}
