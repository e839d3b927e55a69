use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use catalog_store::{NewSection, SectionPatch};
use serde::Deserialize;
use tracing::info;

use super::{created, done, ok, path_id, query_id, AppState, PageQuery, Pagination};
use crate::auth::{AdminPrincipal, Principal};
use crate::catalog;
use crate::error::{ApiError, ApiResult};
use crate::form::{filled, lenient, Payload, RequestShape};

const SECTION_NOT_FOUND: &str = "Section not found";
const NAME_TAKEN: &str = "A section with this name already exists for this course";
const SEQUENCE_TAKEN: &str = "A section with this sequence number already exists for this course";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/addSection", post(add_section))
        .route("/getAllSections", get(get_all_sections))
        .route("/getSectionById/:id", get(get_section_by_id))
        .route("/updateSection", post(update_section))
        .route("/deleteSection/:id", post(delete_section))
        .route("/getSectionsByCourseId/:course_id", get(get_sections_by_course_id))
}

#[derive(Debug, Deserialize)]
pub struct SectionRequest {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    course_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::nullable_text")]
    description: Option<Option<String>>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    sequence: Option<i64>,
}

impl RequestShape for SectionRequest {}

#[derive(Debug, Deserialize)]
pub struct SectionListQuery {
    #[serde(flatten)]
    page: PageQuery,
    course_id: Option<String>,
}

async fn add_section(
    State(state): State<AppState>,
    AdminPrincipal(principal): AdminPrincipal,
    Payload { body, .. }: Payload<SectionRequest>,
) -> ApiResult<Response> {
    create_section(&state, &principal, body)
        .await
        .map_err(|e| e.in_action("Failed to create section"))
}

async fn create_section(
    state: &AppState,
    principal: &Principal,
    body: SectionRequest,
) -> ApiResult<Response> {
    let (Some(course_id), Some(name)) = (body.course_id, filled(&body.name)) else {
        return Err(ApiError::bad_request("Course ID and name are required fields"));
    };
    let Some(sequence) = body.sequence else {
        return Err(ApiError::bad_request("Sequence is required"));
    };

    let section = {
        let db = state.db.lock().await;

        // a missing course is a 400 here, unlike the read paths
        if !db.course_exists(course_id)? {
            return Err(ApiError::bad_request("Course not found"));
        }
        if db.section_name_taken(course_id, name, None)? {
            return Err(ApiError::bad_request(NAME_TAKEN));
        }
        if db.section_sequence_taken(course_id, sequence, None)? {
            return Err(ApiError::bad_request(SEQUENCE_TAKEN));
        }

        db.create_section(&NewSection {
            course_id,
            name: name.to_string(),
            description: body.description.clone().flatten(),
            sequence,
            created_by: Some(principal.id),
        })?
    };

    info!(section_id = section.id, course_id, "Section created");
    Ok(created("Section created successfully", section))
}

async fn get_all_sections(
    State(state): State<AppState>,
    Query(query): Query<SectionListQuery>,
) -> ApiResult<Response> {
    let course_id = query_id(&query.course_id, "course_id")?;
    let page = query.page.request();

    async {
        let sections = state.db.lock().await.list_sections(course_id, page)?;
        let views = catalog::section_views(&state.db, sections.items).await?;
        ApiResult::Ok(ok(
            "Sections retrieved successfully",
            serde_json::json!({
                "sections": views,
                "pagination": Pagination::new(sections.total, page),
            }),
        ))
    }
    .await
    .map_err(|e| e.in_action("Failed to retrieve sections"))
}

async fn get_section_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = path_id(&id, SECTION_NOT_FOUND)?;

    async {
        let section = state
            .db
            .lock()
            .await
            .find_section(id)?
            .ok_or_else(|| ApiError::not_found(SECTION_NOT_FOUND))?;
        let view = catalog::section_view(&state.db, section).await?;
        ApiResult::Ok(ok("Section retrieved successfully", view))
    }
    .await
    .map_err(|e| e.in_action("Failed to retrieve section"))
}

async fn update_section(
    State(state): State<AppState>,
    Payload { body, .. }: Payload<SectionRequest>,
) -> ApiResult<Response> {
    let Some(id) = body.id else {
        return Err(ApiError::bad_request("Section ID is required in body"));
    };

    apply_section_update(&state, id, body)
        .await
        .map_err(|e| e.in_action("Failed to update section"))
}

async fn apply_section_update(state: &AppState, id: i64, body: SectionRequest) -> ApiResult<Response> {
    let section = {
        let db = state.db.lock().await;
        let existing = db
            .find_section(id)?
            .ok_or_else(|| ApiError::not_found(SECTION_NOT_FOUND))?;

        let name = filled(&body.name).filter(|n| *n != existing.name);
        if let Some(name) = name {
            if db.section_name_taken(existing.course_id, name, Some(id))? {
                return Err(ApiError::bad_request(NAME_TAKEN));
            }
        }

        let sequence = body.sequence.filter(|s| *s != existing.sequence);
        if let Some(sequence) = sequence {
            if db.section_sequence_taken(existing.course_id, sequence, Some(id))? {
                return Err(ApiError::bad_request(SEQUENCE_TAKEN));
            }
        }

        // unauthenticated route, so nobody to record
        db.update_section(
            id,
            &SectionPatch {
                name: name.map(str::to_string),
                description: body.description,
                sequence,
                modified_by: None,
            },
        )?
    };

    info!(section_id = id, "Section updated");
    let view = catalog::section_view(&state.db, section).await?;
    Ok(ok("Section updated successfully", view))
}

async fn delete_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = path_id(&id, SECTION_NOT_FOUND)?;

    let deleted = state
        .db
        .lock()
        .await
        .delete_section(id)
        .map_err(|e| ApiError::from(e).in_action("Failed to delete section"))?;
    if !deleted {
        return Err(ApiError::not_found(SECTION_NOT_FOUND));
    }

    info!(section_id = id, "Section deleted");
    Ok(done("Section deleted successfully"))
}

async fn get_sections_by_course_id(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<Response> {
    let course_id = path_id(&course_id, "Course not found")?;

    let sections = state
        .db
        .lock()
        .await
        .sections_for_course(course_id)
        .map_err(|e| ApiError::from(e).in_action("Failed to retrieve sections"))?;

    Ok(ok("Sections retrieved successfully", sections))
}
