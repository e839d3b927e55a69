use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use catalog_shared::slug::generate_unique_slug;
use catalog_shared::CourseStatus;
use catalog_store::{Course, CourseFilter, CoursePatch, CourseScope, NewCourse};
use serde::Deserialize;
use tracing::info;

use super::{created, done, ok, path_id, AppState, PageQuery, Pagination};
use crate::auth::{AdminPrincipal, Principal};
use crate::catalog;
use crate::error::{ApiError, ApiResult};
use crate::form::{filled, lenient, Payload, RequestShape};
use crate::uploads::UploadedFile;

const COURSE_NOT_FOUND: &str = "Course not found";
const NAME_TAKEN: &str = "A course with this name already exists";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/addCourse", post(add_course))
        .route("/getAllCourses", get(get_all_courses))
        .route("/getCourseById/:id", get(get_course_by_id))
        .route("/getCourseBySlug/:slug", get(get_course_by_slug))
        .route("/updateCourse/:id", post(update_course))
        .route("/deleteCourse/:id", post(delete_course))
        .route("/getAllCoursesforadmin", get(get_all_courses_for_admin))
        .route("/changeCourseStatus/:id", post(change_course_status))
}

#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    topic: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_list")]
    prerequisites: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::opt_list")]
    outcomes: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    duration: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    intro_video: Option<String>,
}

impl RequestShape for CourseRequest {
    const FILE_FIELD: Option<&'static str> = Some("banner");
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    status: Option<String>,
}

impl RequestShape for StatusRequest {}

#[derive(Debug, Deserialize)]
pub struct CourseListQuery {
    #[serde(flatten)]
    page: PageQuery,
    #[serde(rename = "searchTerm")]
    search_term: Option<String>,
    status: Option<String>,
    topic: Option<String>,
}

fn parse_status(raw: &str) -> ApiResult<CourseStatus> {
    raw.parse::<CourseStatus>().map_err(|_| {
        ApiError::bad_request(format!(
            "Invalid status. Must be one of: {}",
            CourseStatus::allowed()
        ))
    })
}

/// Draw slugs until one is not held by another live course.
async fn unique_slug(state: &AppState, name: &str, exclude: Option<i64>) -> ApiResult<String> {
    let slug = generate_unique_slug(name, |candidate| {
        let db = state.db.clone();
        async move {
            let taken = db.lock().await.slug_in_use(&candidate, exclude);
            taken
        }
    })
    .await?;
    Ok(slug)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn add_course(
    State(state): State<AppState>,
    AdminPrincipal(principal): AdminPrincipal,
    Payload { body, file }: Payload<CourseRequest>,
) -> ApiResult<Response> {
    create_course(&state, &principal, body, file)
        .await
        .map_err(|e| e.in_action("Failed to create course"))
}

async fn create_course(
    state: &AppState,
    principal: &Principal,
    body: CourseRequest,
    file: Option<UploadedFile>,
) -> ApiResult<Response> {
    let (Some(name), Some(description), Some(topic)) = (
        filled(&body.name),
        filled(&body.description),
        filled(&body.topic),
    ) else {
        return Err(ApiError::bad_request(
            "Name, description, topic are required fields",
        ));
    };

    if state.db.lock().await.active_course_name_taken(name, None)? {
        return Err(ApiError::bad_request(NAME_TAKEN));
    }

    let slug = unique_slug(state, name, None).await?;
    let banner = match &file {
        Some(file) => Some(state.uploads.save(file).await?),
        None => None,
    };

    let course = state.db.lock().await.create_course(&NewCourse {
        name: name.to_string(),
        description: description.to_string(),
        topic: topic.to_string(),
        slug,
        prerequisites: body.prerequisites.unwrap_or_default(),
        outcomes: body.outcomes.unwrap_or_default(),
        duration: filled(&body.duration).map(str::to_string),
        banner,
        intro_video: filled(&body.intro_video).map(str::to_string),
        created_by: Some(principal.id),
    })?;

    info!(course_id = course.id, slug = ?course.slug, "Course created");
    Ok(created("Course created successfully", course))
}

async fn list_courses(
    state: &AppState,
    scope: CourseScope,
    query: CourseListQuery,
) -> ApiResult<Response> {
    let status = filled(&query.status).map(parse_status).transpose()?;
    let filter = CourseFilter {
        scope,
        search: filled(&query.search_term).map(str::to_string),
        status,
        topic: filled(&query.topic).map(str::to_string),
    };
    let page = query.page.request();

    let courses = state.db.lock().await.list_courses(&filter, page)?;
    let listings = catalog::course_listings(&state.db, courses.items).await?;

    Ok(ok(
        "Courses retrieved successfully",
        serde_json::json!({
            "courses": listings,
            "pagination": Pagination::new(courses.total, page),
        }),
    ))
}

async fn get_all_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseListQuery>,
) -> ApiResult<Response> {
    list_courses(&state, CourseScope::Published, query)
        .await
        .map_err(|e| e.in_action("Failed to retrieve courses"))
}

async fn get_all_courses_for_admin(
    State(state): State<AppState>,
    Query(query): Query<CourseListQuery>,
) -> ApiResult<Response> {
    list_courses(&state, CourseScope::Admin, query)
        .await
        .map_err(|e| e.in_action("Failed to retrieve courses"))
}

/// Assemble the full tree for a looked-up course, or 404.
async fn tree_response(state: &AppState, course: Option<Course>) -> ApiResult<Response> {
    let course = course.ok_or_else(|| ApiError::not_found(COURSE_NOT_FOUND))?;
    let tree = catalog::course_tree(&state.db, course).await?;
    Ok(ok("Course retrieved successfully", tree))
}

async fn get_course_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = path_id(&id, COURSE_NOT_FOUND)?;
    let course = state
        .db
        .lock()
        .await
        .find_course(id)
        .map_err(|e| ApiError::from(e).in_action("Failed to retrieve course"))?;
    tree_response(&state, course)
        .await
        .map_err(|e| e.in_action("Failed to retrieve course"))
}

async fn get_course_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Response> {
    let course = state
        .db
        .lock()
        .await
        .find_live_course_by_slug(&slug)
        .map_err(|e| ApiError::from(e).in_action("Failed to retrieve course"))?;
    tree_response(&state, course)
        .await
        .map_err(|e| e.in_action("Failed to retrieve course"))
}

async fn update_course(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Payload { body, file }: Payload<CourseRequest>,
) -> ApiResult<Response> {
    let id = path_id(&id, COURSE_NOT_FOUND)?;
    apply_course_update(&state, &principal, id, body, file)
        .await
        .map_err(|e| e.in_action("Failed to update course"))
}

async fn apply_course_update(
    state: &AppState,
    principal: &Principal,
    id: i64,
    body: CourseRequest,
    file: Option<UploadedFile>,
) -> ApiResult<Response> {
    let existing = state
        .db
        .lock()
        .await
        .find_course(id)?
        .ok_or_else(|| ApiError::not_found(COURSE_NOT_FOUND))?;

    let status = filled(&body.status).map(parse_status).transpose()?;

    // only a changed name is re-checked and re-slugged
    let name = filled(&body.name).filter(|n| *n != existing.name);
    let slug = match name {
        Some(name) => {
            if state.db.lock().await.active_course_name_taken(name, Some(id))? {
                return Err(ApiError::bad_request(NAME_TAKEN));
            }
            Some(unique_slug(state, name, Some(id)).await?)
        }
        None => None,
    };

    let banner = match &file {
        Some(file) => Some(state.uploads.save(file).await?),
        None => None,
    };

    let patch = CoursePatch {
        name: name.map(str::to_string),
        description: filled(&body.description).map(str::to_string),
        topic: filled(&body.topic).map(str::to_string),
        status,
        prerequisites: body.prerequisites.clone(),
        outcomes: body.outcomes.clone(),
        duration: filled(&body.duration).map(str::to_string),
        banner,
        intro_video: filled(&body.intro_video).map(str::to_string),
        slug,
        modified_by: Some(principal.id),
    };
    let course = state.db.lock().await.update_course(id, &patch)?;

    info!(course_id = id, "Course updated");
    Ok(ok("Course updated successfully", course))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = path_id(&id, COURSE_NOT_FOUND)?;
    let deactivated = state
        .db
        .lock()
        .await
        .deactivate_course(id)
        .map_err(|e| ApiError::from(e).in_action("Failed to delete course"))?;

    if !deactivated {
        return Err(ApiError::not_found(COURSE_NOT_FOUND));
    }

    info!(course_id = id, "Course deactivated");
    Ok(done("Course deleted successfully"))
}

async fn change_course_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload { body, .. }: Payload<StatusRequest>,
) -> ApiResult<Response> {
    let status = filled(&body.status)
        .and_then(|s| s.parse::<CourseStatus>().ok())
        .ok_or_else(|| {
            ApiError::bad_request("Invalid or missing status. Must be 'ACTIVE' or 'INACTIVE'.")
        })?;
    let id = path_id(&id, COURSE_NOT_FOUND)?;

    let course = {
        let db = state.db.lock().await;
        let exists = db
            .course_exists(id)
            .map_err(|e| ApiError::from(e).in_action("Failed to update course status"))?;
        if !exists {
            return Err(ApiError::not_found(COURSE_NOT_FOUND));
        }
        db.set_course_status(id, status)
            .map_err(|e| ApiError::from(e).in_action("Failed to update course status"))?
    };

    info!(course_id = id, status = %status, "Course status changed");
    Ok(ok(format!("Course status updated to {status}"), course))
}
