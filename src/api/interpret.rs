//! REST API endpoints for variant interpretation

use actix_web::{HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::annotator::EnsemblLookup;
use crate::api::error::{ApiError, ErrorResponse};
use crate::api::health::{DependencyHealth, HealthStatus, ReadinessStatus};
use crate::api::sources::{PopulationRequest, PopulationResponse};
use crate::app::AppState;
use crate::model::{
    AcmgAssessment, AcmgCriterion, Classification, ClassificationResult, CoverageSummary,
    CriterionResult, EvidenceStrength, FieldCoverage, InfoValue, RawRecord, Variant,
    VariantCategory,
};
use crate::service::ValidationReport;

/// Largest accepted JSON body
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Optional post-classification filter on results
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ResultFilter {
    /// Drop results whose variant quality is below this value; unknown quality is kept
    #[serde(default)]
    pub min_quality: Option<f64>,
    /// Drop results whose population frequency exceeds this value; unknown frequency is kept
    #[serde(default)]
    pub max_population_af: Option<f64>,
}

impl ResultFilter {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(q) = self.min_quality
            && q < 0.0
        {
            return Err(ApiError::BadRequest(format!(
                "min_quality must not be negative, got {}",
                q
            )));
        }

        if let Some(af) = self.max_population_af
            && !(0.0..=1.0).contains(&af)
        {
            return Err(ApiError::BadRequest(format!(
                "max_population_af must be within [0, 1], got {}",
                af
            )));
        }

        Ok(())
    }

    pub fn accepts(&self, variant: &Variant) -> bool {
        let quality_ok = match (self.min_quality, variant.quality) {
            (Some(min), Some(quality)) => quality >= min,
            _ => true,
        };
        let frequency_ok = match (self.max_population_af, variant.population_af) {
            (Some(max), Some(af)) => af <= max,
            _ => true,
        };
        quality_ok && frequency_ok
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InterpretRequest {
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub filter: Option<ResultFilter>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InterpretResponse {
    pub results: Vec<ClassificationResult>,
    pub coverage: CoverageSummary,
    /// Malformed records that were skipped
    pub skipped: usize,
    /// Results removed by the filter
    pub filtered: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordsRequest {
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnotateResponse {
    pub variants: Vec<Variant>,
    pub coverage: CoverageSummary,
    pub skipped: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClassifyRequest {
    pub variants: Vec<Variant>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassifyResponse {
    pub results: Vec<ClassificationResult>,
}

/// Normalize, annotate and classify raw variant records
#[utoipa::path(
    post,
    path = "/v1/interpret",
    request_body = InterpretRequest,
    responses(
        (status = 200, description = "Variants interpreted", body = InterpretResponse),
        (status = 400, description = "Invalid request or filter", body = ErrorResponse)
    ),
    tag = "interpretation"
)]
#[post("/v1/interpret")]
pub async fn interpret(
    state: web::Data<AppState>,
    body: web::Json<InterpretRequest>,
) -> Result<HttpResponse, ApiError> {
    let InterpretRequest { records, filter } = body.into_inner();
    let filter = filter.unwrap_or_default();
    filter.validate()?;

    let (variants, skipped) = state.normalizer.normalize_all(&records);
    let annotated = state
        .coordinator
        .annotate_batch(variants, state.shutdown.clone())
        .await;
    let coverage = state.coordinator.coverage(&annotated);

    let classified = state.evaluator.classify_all(annotated);
    let total = classified.len();
    let results: Vec<ClassificationResult> = classified
        .into_iter()
        .filter(|r| filter.accepts(&r.variant))
        .collect();
    let filtered = total - results.len();

    tracing::info!(
        records = records.len(),
        skipped = skipped,
        classified = total,
        filtered = filtered,
        "Interpreted variant records"
    );

    Ok(HttpResponse::Ok().json(InterpretResponse {
        results,
        coverage,
        skipped,
        filtered,
    }))
}

/// Normalize and annotate raw variant records without classifying them
#[utoipa::path(
    post,
    path = "/v1/annotate",
    request_body = RecordsRequest,
    responses(
        (status = 200, description = "Variants annotated", body = AnnotateResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "interpretation"
)]
#[post("/v1/annotate")]
pub async fn annotate(
    state: web::Data<AppState>,
    body: web::Json<RecordsRequest>,
) -> Result<HttpResponse, ApiError> {
    let (variants, skipped) = state.normalizer.normalize_all(&body.records);
    let variants = state
        .coordinator
        .annotate_batch(variants, state.shutdown.clone())
        .await;
    let coverage = state.coordinator.coverage(&variants);

    Ok(HttpResponse::Ok().json(AnnotateResponse {
        variants,
        coverage,
        skipped,
    }))
}

/// Classify already annotated variants
#[utoipa::path(
    post,
    path = "/v1/classify",
    request_body = ClassifyRequest,
    responses(
        (status = 200, description = "Variants classified", body = ClassifyResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "interpretation"
)]
#[post("/v1/classify")]
pub async fn classify(
    state: web::Data<AppState>,
    body: web::Json<ClassifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let variants = body.into_inner().variants;
    for (index, variant) in variants.iter().enumerate() {
        variant.validate().map_err(|e| {
            ApiError::BadRequest(format!("variants[{}] ({}): {}", index, variant, e))
        })?;
    }

    let results = state.evaluator.classify_all(variants);
    Ok(HttpResponse::Ok().json(ClassifyResponse { results }))
}

/// Check raw variant records for missing mandatory fields
#[utoipa::path(
    post,
    path = "/v1/validate",
    request_body = RecordsRequest,
    responses(
        (status = 200, description = "Validation report", body = ValidationReport),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "interpretation"
)]
#[post("/v1/validate")]
pub async fn validate(
    state: web::Data<AppState>,
    body: web::Json<RecordsRequest>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(state.normalizer.validate(&body.records)))
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Variant Intel",
        description = "Clinical interpretation of genomic variants with ACMG criteria"
    ),
    paths(
        interpret,
        annotate,
        classify,
        validate,
        crate::api::sources::population,
        crate::api::sources::lookup,
        crate::api::health::liveness,
        crate::api::health::readiness
    ),
    components(schemas(
        InterpretRequest,
        InterpretResponse,
        RecordsRequest,
        AnnotateResponse,
        ClassifyRequest,
        ClassifyResponse,
        ResultFilter,
        RawRecord,
        Variant,
        VariantCategory,
        InfoValue,
        ClassificationResult,
        Classification,
        AcmgAssessment,
        AcmgCriterion,
        CriterionResult,
        EvidenceStrength,
        CoverageSummary,
        FieldCoverage,
        ValidationReport,
        PopulationRequest,
        PopulationResponse,
        EnsemblLookup,
        ErrorResponse,
        HealthStatus,
        ReadinessStatus,
        DependencyHealth
    )),
    tags(
        (name = "interpretation", description = "Normalization, annotation and classification"),
        (name = "sources", description = "Helper queries against individual annotation sources"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// Configure interpretation routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into());

    cfg.app_data(json_config)
        .service(interpret)
        .service(annotate)
        .service(classify)
        .service(validate);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::test as actix_test;
    use actix_web::{App, http::StatusCode};
    use async_trait::async_trait;

    use crate::annotator::{AnnotatorError, SourceAnnotator};
    use crate::model::{AnnotationSource, PartialAnnotation};

    struct FrequencySource;

    #[async_trait]
    impl SourceAnnotator for FrequencySource {
        fn source(&self) -> AnnotationSource {
            AnnotationSource::Gnomad
        }

        async fn fetch(
            &self,
            variant: &Variant,
        ) -> Result<Option<PartialAnnotation>, AnnotatorError> {
            // Odd positions are common, even positions are rare
            let af = if variant.pos % 2 == 1 { 0.2 } else { 0.00001 };
            Ok(Some(PartialAnnotation {
                population_af: Some(af),
                ..Default::default()
            }))
        }
    }

    fn state() -> web::Data<AppState> {
        web::Data::new(AppState::for_tests(vec![Arc::new(FrequencySource)]))
    }

    fn record_json(pos: i64, quality: f64) -> serde_json::Value {
        serde_json::json!({
            "chrom": "chr2",
            "pos": pos,
            "reference": "G",
            "alternates": ["A"],
            "quality": quality
        })
    }

    #[test]
    fn test_filter_validation() {
        assert!(ResultFilter::default().validate().is_ok());
        assert!(
            ResultFilter {
                min_quality: Some(-1.0),
                max_population_af: None
            }
            .validate()
            .is_err()
        );
        assert!(
            ResultFilter {
                min_quality: None,
                max_population_af: Some(1.5)
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_filter_keeps_unknown_values() {
        let filter = ResultFilter {
            min_quality: Some(30.0),
            max_population_af: Some(0.01),
        };
        let mut variant = Variant::new("1", 1, "A", "C", VariantCategory::SingleNucleotide);
        assert!(filter.accepts(&variant));

        variant.quality = Some(10.0);
        assert!(!filter.accepts(&variant));

        variant.quality = Some(50.0);
        variant.population_af = Some(0.02);
        assert!(!filter.accepts(&variant));
    }

    #[actix_web::test]
    async fn test_interpret_pipeline() {
        let app =
            actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/v1/interpret")
            .set_json(serde_json::json!({
                "records": [
                    record_json(101, 50.0),
                    record_json(200, 50.0),
                    {"chrom": "chr2", "reference": "G", "alternates": ["A"]}
                ]
            }))
            .to_request();

        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["skipped"], 1);
        assert_eq!(body["filtered"], 0);
        assert_eq!(body["coverage"]["total_variants"], 2);

        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        for result in results {
            let expected = if result["variant"]["pos"] == 101 {
                "Benign"
            } else {
                "Uncertain Significance"
            };
            assert_eq!(result["classification"], expected);
        }
    }

    #[actix_web::test]
    async fn test_interpret_applies_filter() {
        let app =
            actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/v1/interpret")
            .set_json(serde_json::json!({
                "records": [record_json(101, 50.0), record_json(200, 5.0), record_json(300, 50.0)],
                "filter": {"min_quality": 20.0, "max_population_af": 0.05}
            }))
            .to_request();

        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["filtered"], 2);
        assert_eq!(body["results"][0]["variant"]["pos"], 300);
    }

    #[actix_web::test]
    async fn test_invalid_filter_is_rejected() {
        let app =
            actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/v1/interpret")
            .set_json(serde_json::json!({
                "records": [],
                "filter": {"max_population_af": 2.0}
            }))
            .to_request();

        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_malformed_body_is_bad_request() {
        let app =
            actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/v1/validate")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"records\": 12}")
            .to_request();

        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_classify_endpoint() {
        let app =
            actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/v1/classify")
            .set_json(serde_json::json!({
                "variants": [{
                    "chrom": "17",
                    "pos": 43057093,
                    "reference": "A",
                    "alternate": "T",
                    "category": "single_nucleotide",
                    "gene": "BRCA1",
                    "impact": "HIGH",
                    "hgvs_p": "p.Arg1751Ter"
                }]
            }))
            .to_request();

        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["results"][0]["classification"], "Pathogenic");
        assert_eq!(body["results"][0]["score"], 8);
        assert_eq!(body["results"][0]["criteria"], serde_json::json!(["PVS1"]));
    }

    #[actix_web::test]
    async fn test_classify_rejects_invalid_variants() {
        let app =
            actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let valid = serde_json::json!({
            "chrom": "17",
            "pos": 43057093,
            "reference": "A",
            "alternate": "T",
            "category": "single_nucleotide"
        });
        let mut cases = Vec::new();
        for (field, value) in [
            ("pos", serde_json::json!(0)),
            ("chrom", serde_json::json!("")),
            ("reference", serde_json::json!("")),
            ("alternate", serde_json::json!("<DEL>")),
            ("population_af", serde_json::json!(7.5)),
        ] {
            let mut variant = valid.clone();
            variant[field] = value;
            cases.push((field, variant));
        }
        let mut classified = valid.clone();
        classified["assessment"] = serde_json::json!({
            "classification": "Benign",
            "criteria": ["BA1"],
            "score": -8,
            "reasoning": "Classification: Benign",
            "confidence": 1.0
        });
        cases.push(("assessment", classified));

        for (field, variant) in cases {
            let req = actix_test::TestRequest::post()
                .uri("/v1/classify")
                .set_json(serde_json::json!({ "variants": [valid.clone(), variant] }))
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{} was accepted", field);

            let body: serde_json::Value = actix_test::read_body_json(resp).await;
            assert!(body["message"].as_str().unwrap().contains("variants[1]"));
        }
    }

    #[actix_web::test]
    async fn test_annotate_endpoint() {
        let app =
            actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/v1/annotate")
            .set_json(serde_json::json!({ "records": [record_json(200, 40.0)] }))
            .to_request();

        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["variants"][0]["population_af"], 0.00001);
        assert_eq!(body["coverage"]["population_frequency"]["count"], 1);
        assert!(body["variants"][0].get("assessment").is_none());
    }

    #[actix_web::test]
    async fn test_validate_endpoint() {
        let app =
            actix_test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/v1/validate")
            .set_json(serde_json::json!({
                "records": [record_json(10, 1.0), {"pos": -4, "alternates": []}]
            }))
            .to_request();

        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["is_valid"], false);
        assert_eq!(body["record_count"], 2);
        assert_eq!(body["errors"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/v1/interpret",
            "/v1/annotate",
            "/v1/classify",
            "/v1/validate",
            "/v1/population",
            "/v1/lookup/{stable_id}",
            "/health/ready",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
