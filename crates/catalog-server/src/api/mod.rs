//! HTTP API: shared state, router, response envelope and pagination.
//!
//! Each resource family lives in its own submodule and contributes a
//! `routes()` router that is nested under `/api/<family>` here.

mod course_media;
mod courses;
mod resources;
mod sections;
mod subsections;
mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use catalog_shared::constants::DEFAULT_PAGE_SIZE;
use catalog_shared::token::TokenSigner;
use catalog_shared::MediaType;
use catalog_store::PageRequest;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::catalog::SharedDb;
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::uploads::UploadStore;

/// Room for multipart framing and text fields on top of the file itself.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub uploads: Arc<UploadStore>,
    pub tokens: Arc<TokenSigner>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/users", users::routes())
        .nest("/api/courses", courses::routes())
        .nest("/api/sections", sections::routes())
        .nest("/api/course-media", course_media::routes())
        .nest("/api/subsections", subsections::routes())
        .nest("/api/subsection-resources", resources::routes())
        .nest_service("/uploads", ServeDir::new(state.uploads.base_path()))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_size.saturating_add(BODY_LIMIT_SLACK),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn envelope<T: Serialize>(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Response {
    let body = Envelope {
        success: true,
        message: message.into(),
        data,
    };
    (status, Json(body)).into_response()
}

pub(crate) fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    envelope(StatusCode::OK, message, Some(data))
}

pub(crate) fn created<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    envelope(StatusCode::CREATED, message, Some(data))
}

/// Success without a `data` field.
pub(crate) fn done(message: impl Into<String>) -> Response {
    envelope::<()>(StatusCode::OK, message, None)
}

// ---------------------------------------------------------------------------
// Pagination and path ids
// ---------------------------------------------------------------------------

/// `page` and `limit` query parameters, kept as text so junk falls back to
/// the defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

fn positive_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(default)
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest {
            page: positive_or(self.page.as_deref(), 1),
            limit: positive_or(self.limit.as_deref(), DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Pagination {
    total_count: u64,
    total_pages: u64,
    current_page: u32,
    limit: u32,
}

impl Pagination {
    pub fn new(total: u64, page: PageRequest) -> Self {
        Self {
            total_count: total,
            total_pages: total.div_ceil(u64::from(page.limit.max(1))),
            current_page: page.page,
            limit: page.limit,
        }
    }
}

/// Parse a numeric path segment. Anything unparsable cannot name a row, so
/// it is reported with the entity's not-found message.
pub(crate) fn path_id(raw: &str, not_found: &'static str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::not_found(not_found))
}

/// Optional numeric filter from the query string.
pub(crate) fn query_id(raw: &Option<String>, field: &str) -> ApiResult<Option<i64>> {
    crate::form::filled(raw)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| ApiError::bad_request(format!("Invalid {field}")))
        })
        .transpose()
}

pub(crate) fn parse_media_type(raw: &str) -> ApiResult<MediaType> {
    raw.parse::<MediaType>().map_err(|_| {
        ApiError::bad_request(format!(
            "Invalid type. Must be one of: {}",
            MediaType::allowed()
        ))
    })
}

/// Turn an optional text field into a required one, or fail with `message`.
pub(crate) fn require<'a>(value: &'a Option<String>, message: &'static str) -> ApiResult<&'a str> {
    crate::form::filled(value).ok_or_else(|| ApiError::bad_request(message))
}


#[cfg(test)]
mod tests {
    use super::testing::TestApp;
    use super::*;

    #[test]
    fn test_page_query_defaults() {
        let q = PageQuery {
            page: Some("0".into()),
            limit: Some("abc".into()),
        };
        assert_eq!(q.request(), PageRequest { page: 1, limit: 10 });

        let q = PageQuery {
            page: Some("3".into()),
            limit: Some("25".into()),
        };
        assert_eq!(q.request(), PageRequest { page: 3, limit: 25 });
        assert_eq!(PageQuery::default().request(), PageRequest { page: 1, limit: 10 });
    }

    #[test]
    fn test_pagination_rounds_up() {
        let p = Pagination::new(21, PageRequest { page: 2, limit: 10 });
        assert_eq!(p.total_pages, 3);
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            serde_json::json!({"totalCount": 21, "totalPages": 3, "currentPage": 2, "limit": 10})
        );
        assert_eq!(Pagination::new(0, PageRequest { page: 1, limit: 10 }).total_pages, 0);
    }

    #[test]
    fn test_path_id() {
        assert_eq!(path_id("42", "Course not found").unwrap(), 42);
        let err = path_id("abc", "Course not found").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Course not found");
    }

    #[test]
    fn test_query_filters() {
        assert_eq!(query_id(&Some("7".into()), "course_id").unwrap(), Some(7));
        assert_eq!(query_id(&Some(" ".into()), "course_id").unwrap(), None);
        let err = query_id(&Some("seven".into()), "course_id").unwrap_err();
        assert_eq!(err.to_string(), "Invalid course_id");

        assert_eq!(parse_media_type("VIDEOID").unwrap(), MediaType::VideoId);
        assert_eq!(
            parse_media_type("video").unwrap_err().to_string(),
            "Invalid type. Must be one of: IMAGE, VIDEO, PDF, DOCUMENT, LINK, VIDEOID"
        );
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;
        let (status, body) = app.get("/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_uploaded_files_are_served() {
        let app = TestApp::new().await;
        std::fs::write(app.state.uploads.base_path().join("123.pdf"), b"%PDF").unwrap();

        let response = app.get("/uploads/123.pdf", None).await;
        assert_eq!(response.0, StatusCode::OK);
    }
}
