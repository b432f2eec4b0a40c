//! REST API endpoints for source helper queries

use std::collections::BTreeMap;

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::annotator::EnsemblLookup;
use crate::api::error::{ApiError, ErrorResponse};
use crate::app::AppState;
use crate::model::Variant;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PopulationRequest {
    pub variant: Variant,
    /// Frequency above which the variant counts as common (default: 0.01)
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PopulationResponse {
    /// Allele frequency per gnomAD population id
    pub frequencies: BTreeMap<String, f64>,
    pub is_common: bool,
}

/// Population frequency breakdown for one variant from gnomAD
#[utoipa::path(
    post,
    path = "/v1/population",
    request_body = PopulationRequest,
    responses(
        (status = 200, description = "Population frequencies", body = PopulationResponse),
        (status = 400, description = "Invalid variant or threshold", body = ErrorResponse),
        (status = 503, description = "gnomAD is disabled", body = ErrorResponse)
    ),
    tag = "sources"
)]
#[post("/v1/population")]
pub async fn population(
    state: web::Data<AppState>,
    body: web::Json<PopulationRequest>,
) -> Result<HttpResponse, ApiError> {
    let gnomad = state
        .gnomad
        .as_ref()
        .ok_or(ApiError::SourceDisabled("gnomad"))?;

    let PopulationRequest { variant, threshold } = body.into_inner();
    variant
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("variant {}: {}", variant, e)))?;
    if let Some(t) = threshold
        && !(0.0..=1.0).contains(&t)
    {
        return Err(ApiError::BadRequest(format!(
            "threshold must be within [0, 1], got {}",
            t
        )));
    }

    let frequencies = gnomad.population_frequencies(&variant).await;
    let is_common = gnomad.is_common_variant(&variant, threshold).await;

    Ok(HttpResponse::Ok().json(PopulationResponse {
        frequencies,
        is_common,
    }))
}

/// Look up an Ensembl gene or transcript by stable id
#[utoipa::path(
    get,
    path = "/v1/lookup/{stable_id}",
    params(
        ("stable_id" = String, Path, description = "Ensembl stable id (e.g. ENSG00000012048)")
    ),
    responses(
        (status = 200, description = "Lookup result", body = EnsemblLookup),
        (status = 404, description = "Unknown id", body = ErrorResponse),
        (status = 502, description = "Ensembl could not be reached", body = ErrorResponse),
        (status = 503, description = "Ensembl is disabled", body = ErrorResponse)
    ),
    tag = "sources"
)]
#[get("/v1/lookup/{stable_id}")]
pub async fn lookup(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let ensembl = state
        .ensembl
        .as_ref()
        .ok_or(ApiError::SourceDisabled("ensembl"))?;

    let stable_id = path.into_inner();
    let found = ensembl
        .lookup(&stable_id)
        .await
        .map_err(|e| ApiError::Upstream(format!("ensembl lookup of {}: {}", stable_id, e)))?
        .ok_or_else(|| ApiError::NotFound(stable_id.clone()))?;

    Ok(HttpResponse::Ok().json(found))
}

/// Configure source helper routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(population).service(lookup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{App, http::StatusCode, test};

    use crate::annotator::fixtures::FixtureServer;
    use crate::annotator::{EnsemblAnnotator, GnomadAnnotator};
    use crate::model::SourceConfig;

    fn unreachable_source() -> SourceConfig {
        SourceConfig {
            base_url: Some("http://127.0.0.1:9".to_string()),
            min_interval_ms: Some(0),
            ..Default::default()
        }
    }

    fn variant_json() -> serde_json::Value {
        serde_json::json!({
            "chrom": "chr1",
            "pos": 55051215,
            "reference": "G",
            "alternate": "GA",
            "category": "indel"
        })
    }

    #[actix_web::test]
    async fn test_disabled_sources_return_503() {
        let state = web::Data::new(AppState::for_tests(Vec::new()));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/population")
            .set_json(serde_json::json!({ "variant": variant_json() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let req = test::TestRequest::get()
            .uri("/v1/lookup/ENSG00000012048")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_unreachable_sources_degrade_gracefully() {
        let timeout = Duration::from_secs(2);
        let mut state = AppState::for_tests(Vec::new());
        state.gnomad = Some(Arc::new(
            GnomadAnnotator::new(&unreachable_source(), timeout).unwrap(),
        ));
        state.ensembl = Some(Arc::new(
            EnsemblAnnotator::new(&unreachable_source(), timeout).unwrap(),
        ));
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(configure))
                .await;

        let req = test::TestRequest::post()
            .uri("/v1/population")
            .set_json(serde_json::json!({ "variant": variant_json(), "threshold": 0.05 }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["frequencies"], serde_json::json!({}));
        assert_eq!(body["is_common"], false);

        let req = test::TestRequest::get()
            .uri("/v1/lookup/ENSG00000012048")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_invalid_variant_is_rejected() {
        let mut state = AppState::for_tests(Vec::new());
        state.gnomad = Some(Arc::new(
            GnomadAnnotator::new(&unreachable_source(), Duration::from_secs(2)).unwrap(),
        ));
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(configure))
                .await;

        for (field, value) in [
            ("pos", serde_json::json!(0)),
            ("alternate", serde_json::json!("<DEL>")),
            ("population_af", serde_json::json!(-0.2)),
        ] {
            let mut variant = variant_json();
            variant[field] = value;
            let req = test::TestRequest::post()
                .uri("/v1/population")
                .set_json(serde_json::json!({ "variant": variant }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{} was accepted", field);
        }
    }

    #[actix_web::test]
    async fn test_lookup_distinguishes_unknown_id() {
        let upstream = FixtureServer::start(|cfg: &mut web::ServiceConfig| {
            cfg.route(
                "/lookup/id/{id}",
                web::get().to(|| async { HttpResponse::NotFound().finish() }),
            );
        });
        let mut state = AppState::for_tests(Vec::new());
        state.ensembl = Some(Arc::new(
            EnsemblAnnotator::new(&upstream.source_config(), Duration::from_secs(5)).unwrap(),
        ));
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(configure))
                .await;

        let req = test::TestRequest::get()
            .uri("/v1/lookup/ENSG00000000000")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        upstream.stop().await;
    }

    #[actix_web::test]
    async fn test_invalid_threshold() {
        let mut state = AppState::for_tests(Vec::new());
        state.gnomad = Some(Arc::new(
            GnomadAnnotator::new(&unreachable_source(), Duration::from_secs(2)).unwrap(),
        ));
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(configure))
                .await;

        let req = test::TestRequest::post()
            .uri("/v1/population")
            .set_json(serde_json::json!({ "variant": variant_json(), "threshold": 3.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
