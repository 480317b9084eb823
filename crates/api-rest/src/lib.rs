//! # API REST
//!
//! REST API implementation for Ferry.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation
//! - REST-specific concerns (content negotiation, deadlines, CORS)
//!
//! Transcoding itself is synchronous; each request runs on a blocking worker under the
//! configured session deadline.

#![warn(rust_2018_idioms)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use ferry_core::{registry, select, Adapter, CoreConfig, CoreResult};
use fhir::BundleFormat;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};

/// Response header naming the adapter that produced the bundle.
pub const ADAPTER_HEADER: &str = "x-ferry-adapter";

/// Response header carrying the chosen adapter's success count.
pub const CONFIDENCE_HEADER: &str = "x-ferry-confidence";

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    adapters: Arc<[Adapter]>,
}

impl AppState {
    pub fn new(cfg: CoreConfig) -> CoreResult<Self> {
        let adapters = registry(&cfg)?;
        Ok(Self {
            cfg: Arc::new(cfg),
            adapters: adapters.into(),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(paths(health, openehr_to_fhir), components(schemas(HealthRes)))]
pub struct ApiDoc;

/// Builds the REST router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/openehr-to-fhir", post(openehr_to_fhir))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Ferry REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/openehr-to-fhir",
    request_body(content = String, description = "openEHR flat file", content_type = "text/plain"),
    responses(
        (status = 200, description = "FHIR collection bundle, JSON or YAML by Accept header"),
        (status = 400, description = "Empty message"),
        (status = 422, description = "No adapter matched the message"),
        (status = 504, description = "Transcoding exceeded the session deadline"),
        (status = 500, description = "Internal server error")
    )
)]
/// Transcode an openEHR flat file into a FHIR bundle
///
/// Every registered adapter is tried and the one with the most successful writes is used.
/// The response carries the chosen adapter in `x-ferry-adapter` and its score in
/// `x-ferry-confidence`.
async fn openehr_to_fhir(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, (StatusCode, &'static str)> {
    if body.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Empty message"));
    }
    let format = negotiate(&headers);

    let adapters = Arc::clone(&state.adapters);
    let chosen = run_blocking(state.cfg.session_timeout(), move || select(&adapters, &body)).await?;
    let session = match chosen {
        Some(session) if session.successes() > 0 => session,
        _ => return Err((StatusCode::UNPROCESSABLE_ENTITY, "No adapter matched")),
    };

    let rendered = fhir::bundle::render(&session.bundle(), format).map_err(|e| {
        tracing::error!("Render bundle error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })?;

    tracing::info!(
        adapter = session.adapter(),
        confidence = session.successes(),
        %format,
        "transcoded message"
    );

    let response_headers = [
        (header::CONTENT_TYPE, format.content_type().to_string()),
        (
            HeaderName::from_static(ADAPTER_HEADER),
            session.adapter().to_string(),
        ),
        (
            HeaderName::from_static(CONFIDENCE_HEADER),
            session.successes().to_string(),
        ),
    ];
    Ok((StatusCode::OK, response_headers, rendered).into_response())
}

/// OpenAPI document for this API
async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// YAML when the `Accept` header asks for it, JSON otherwise.
fn negotiate(headers: &HeaderMap) -> BundleFormat {
    let wants_yaml = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.to_ascii_lowercase().contains("yaml"));
    if wants_yaml {
        BundleFormat::Yaml
    } else {
        BundleFormat::Json
    }
}

/// Runs `job` on a blocking worker, giving up after `deadline`.
async fn run_blocking<T, F>(deadline: Duration, job: F) -> Result<T, (StatusCode, &'static str)>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::time::timeout(deadline, tokio::task::spawn_blocking(job)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!("Transcoding worker error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
        Err(_) => {
            tracing::error!("Transcoding exceeded {:?}", deadline);
            Err((StatusCode::GATEWAY_TIMEOUT, "Transcoding timed out"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const CRITICALITY: &str =
        r#""adverse_reaction_list/adverse_reaction_risk:0/criticality|code": "at0102""#;

    fn app() -> Router {
        router(AppState::new(CoreConfig::default()).expect("state builds"))
    }

    fn post_message(body: &str, accept: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/openehr-to-fhir")
            .header(header::CONTENT_TYPE, "text/plain");
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    async fn body_text(response: Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn transcodes_to_json_by_default() {
        let response = app()
            .oneshot(post_message(CRITICALITY, None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/fhir+json"
        );
        assert_eq!(
            response.headers()[ADAPTER_HEADER],
            "NwisAdverseReactionList"
        );
        assert_eq!(response.headers()[CONFIDENCE_HEADER], "1");

        let bundle: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json bundle");
        assert_eq!(bundle["type"], "collection");
        assert_eq!(bundle["entry"][0]["resource"]["criticality"], "low");
    }

    #[tokio::test]
    async fn yaml_when_accept_asks_for_it() {
        let response = app()
            .oneshot(post_message(CRITICALITY, Some("application/x-yaml")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/yaml");
        assert!(body_text(response).await.contains("criticality: low"));
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let response = app()
            .oneshot(post_message("  \n", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unmatched_message_is_unprocessable() {
        let response = app()
            .oneshot(post_message(r#""unrelated/field": "x""#, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn slow_job_hits_deadline() {
        let result = run_blocking(Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_millis(300));
        })
        .await;
        assert!(matches!(result, Err((StatusCode::GATEWAY_TIMEOUT, _))));
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let response = app()
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let doc: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json");
        assert!(doc["paths"]["/openehr-to-fhir"]["post"].is_object());
    }
}
