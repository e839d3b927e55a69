use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use catalog_store::{CourseMediaPatch, MediaFilter, NewCourseMedia};
use serde::Deserialize;
use tracing::info;

use super::{
    created, done, ok, parse_media_type, path_id, query_id, AppState, PageQuery, Pagination,
};
use crate::auth::{AdminPrincipal, Principal};
use crate::catalog;
use crate::error::{ApiError, ApiResult};
use crate::form::{filled, lenient, Payload, RequestShape};
use crate::media::{resolve_for_create, resolve_for_update, LinkInput};
use crate::uploads::UploadedFile;

const MEDIA_NOT_FOUND: &str = "Course media not found";
const NAME_TAKEN: &str = "A course media with this name already exists for this course";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/addCourseMedia", post(add_course_media))
        .route("/getCourseMedia", get(get_course_media))
        .route("/getCourseMediaById/:id", get(get_course_media_by_id))
        .route("/updateCourseMedia/:id", post(update_course_media))
        .route("/deleteCourseMedia/:id", post(delete_course_media))
}

#[derive(Debug, Deserialize)]
pub struct MediaRequest {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    course_id: Option<i64>,
    #[serde(default, rename = "type", deserialize_with = "lenient::opt_text")]
    media_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    length: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    link: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    video_id: Option<String>,
}

impl RequestShape for MediaRequest {
    const FILE_FIELD: Option<&'static str> = Some("file");
}

impl MediaRequest {
    fn link_input<'a>(&'a self, file: Option<&'a UploadedFile>) -> LinkInput<'a> {
        LinkInput {
            link: self.link.as_deref(),
            video_id: self.video_id.as_deref(),
            file,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MediaListQuery {
    #[serde(flatten)]
    page: PageQuery,
    course_id: Option<String>,
    #[serde(rename = "type")]
    media_type: Option<String>,
}

async fn add_course_media(
    State(state): State<AppState>,
    principal: Principal,
    Payload { body, file }: Payload<MediaRequest>,
) -> ApiResult<Response> {
    create_course_media(&state, &principal, &body, file.as_ref())
        .await
        .map_err(|e| e.in_action("Failed to create course media"))
}

async fn create_course_media(
    state: &AppState,
    principal: &Principal,
    body: &MediaRequest,
    file: Option<&UploadedFile>,
) -> ApiResult<Response> {
    let (Some(course_id), Some(raw_type), Some(name)) =
        (body.course_id, filled(&body.media_type), filled(&body.name))
    else {
        return Err(ApiError::bad_request(
            "Course ID, type, and name are required fields",
        ));
    };
    let media_type = parse_media_type(raw_type)?;

    let plan = {
        let db = state.db.lock().await;
        if !db.course_exists(course_id)? {
            return Err(ApiError::bad_request("Course not found"));
        }
        let plan = resolve_for_create(media_type, body.link_input(file))?;
        if db.media_name_taken(course_id, name, None)? {
            return Err(ApiError::bad_request(NAME_TAKEN));
        }
        plan
    };

    let link = plan.commit(&state.uploads).await?;
    let media = state.db.lock().await.create_course_media(&NewCourseMedia {
        course_id,
        media_type,
        name: name.to_string(),
        link,
        length: body.length,
        created_by: Some(principal.id),
    })?;

    info!(media_id = media.id, course_id, media_type = %media_type, "Course media created");
    let view = catalog::media_view(&state.db, media).await?;
    Ok(created("Course media created successfully", view))
}

async fn get_course_media(
    State(state): State<AppState>,
    Query(query): Query<MediaListQuery>,
) -> ApiResult<Response> {
    let filter = MediaFilter {
        course_id: query_id(&query.course_id, "course_id")?,
        media_type: filled(&query.media_type).map(parse_media_type).transpose()?,
    };
    let page = query.page.request();

    async {
        let media = state.db.lock().await.list_course_media(&filter, page)?;
        let views = catalog::media_views(&state.db, media.items).await?;
        ApiResult::Ok(ok(
            "Course media retrieved successfully",
            serde_json::json!({
                "media": views,
                "pagination": Pagination::new(media.total, page),
            }),
        ))
    }
    .await
    .map_err(|e| e.in_action("Failed to retrieve course media"))
}

async fn get_course_media_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = path_id(&id, MEDIA_NOT_FOUND)?;

    async {
        let media = state
            .db
            .lock()
            .await
            .find_course_media(id)?
            .ok_or_else(|| ApiError::not_found(MEDIA_NOT_FOUND))?;
        let view = catalog::media_view(&state.db, media).await?;
        ApiResult::Ok(ok("Course media retrieved successfully", view))
    }
    .await
    .map_err(|e| e.in_action("Failed to retrieve course media"))
}

async fn update_course_media(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Payload { body, file }: Payload<MediaRequest>,
) -> ApiResult<Response> {
    let id = path_id(&id, MEDIA_NOT_FOUND)?;
    apply_media_update(&state, &principal, id, &body, file.as_ref())
        .await
        .map_err(|e| e.in_action("Failed to update course media"))
}

async fn apply_media_update(
    state: &AppState,
    principal: &Principal,
    id: i64,
    body: &MediaRequest,
    file: Option<&UploadedFile>,
) -> ApiResult<Response> {
    let (requested, plan, name, course_id) = {
        let db = state.db.lock().await;
        let existing = db
            .find_course_media(id)?
            .ok_or_else(|| ApiError::not_found(MEDIA_NOT_FOUND))?;

        let requested = filled(&body.media_type).map(parse_media_type).transpose()?;
        let plan = resolve_for_update(existing.media_type, requested, body.link_input(file))?;

        let course_id = body.course_id.filter(|c| *c != existing.course_id);
        if let Some(course_id) = course_id {
            if !db.course_exists(course_id)? {
                return Err(ApiError::bad_request("Course not found"));
            }
        }

        // (course_id, name) must stay unique wherever the row ends up
        let name = filled(&body.name).filter(|n| *n != existing.name);
        if name.is_some() || course_id.is_some() {
            let target_course = course_id.unwrap_or(existing.course_id);
            let target_name = name.unwrap_or(existing.name.as_str());
            if db.media_name_taken(target_course, target_name, Some(id))? {
                return Err(ApiError::bad_request(NAME_TAKEN));
            }
        }

        (requested, plan, name, course_id)
    };

    let link = plan.commit(&state.uploads).await?;
    let patch = CourseMediaPatch {
        course_id,
        media_type: requested,
        name: name.map(str::to_string),
        link,
        length: body.length,
        modified_by: Some(principal.id),
    };
    let media = state.db.lock().await.update_course_media(id, &patch)?;

    info!(media_id = id, "Course media updated");
    let view = catalog::media_view(&state.db, media).await?;
    Ok(ok("Course media updated successfully", view))
}

async fn delete_course_media(
    State(state): State<AppState>,
    _admin: AdminPrincipal,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = path_id(&id, MEDIA_NOT_FOUND)?;

    let deleted = state
        .db
        .lock()
        .await
        .delete_course_media(id)
        .map_err(|e| ApiError::from(e).in_action("Failed to delete course media"))?;
    if !deleted {
        return Err(ApiError::not_found(MEDIA_NOT_FOUND));
    }

    info!(media_id = id, "Course media deleted");
    Ok(done("Course media deleted successfully"))
}
