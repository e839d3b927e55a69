use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use catalog_store::{NewSubsection, SubsectionPatch};
use serde::Deserialize;
use tracing::info;

use super::{created, done, ok, parse_media_type, path_id, AppState, PageQuery, Pagination};
use crate::auth::Principal;
use crate::catalog;
use crate::error::{ApiError, ApiResult};
use crate::form::{filled, lenient, Payload, RequestShape};
use crate::media::{resolve_for_create, resolve_for_update, LinkInput};
use crate::uploads::UploadedFile;

const SUBSECTION_NOT_FOUND: &str = "Subsection not found";
const NAME_TAKEN: &str = "A subsection with this name already exists for this course/section";
const SEQUENCE_TAKEN: &str =
    "A subsection with this sequence number already exists for this course/section";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/addsubsection", post(add_subsection))
        .route("/getSubSectionById/:id", get(get_subsection_by_id))
        .route("/getSubSectionsByCourseId/:course_id", get(get_subsections_by_course))
        .route(
            "/getsubsectionsbycourseidandsectionid/:course_id/:section_id",
            get(get_subsections_by_course_and_section),
        )
        .route("/updatesubsection", post(update_subsection))
        .route("/deletesubsection", post(delete_subsection))
}

#[derive(Debug, Deserialize)]
pub struct SubsectionRequest {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    course_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    section_id: Option<i64>,
    #[serde(default, rename = "type", deserialize_with = "lenient::opt_text")]
    media_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    length: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    sequence: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    link: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    video_id: Option<String>,
}

impl RequestShape for SubsectionRequest {
    const FILE_FIELD: Option<&'static str> = Some("file");
}

impl SubsectionRequest {
    fn link_input<'a>(&'a self, file: Option<&'a UploadedFile>) -> LinkInput<'a> {
        LinkInput {
            link: self.link.as_deref(),
            video_id: self.video_id.as_deref(),
            file,
        }
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

async fn add_subsection(
    State(state): State<AppState>,
    principal: Principal,
    Payload { body, file }: Payload<SubsectionRequest>,
) -> ApiResult<Response> {
    create_subsection(&state, &principal, &body, file.as_ref())
        .await
        .map_err(|e| e.in_action("Failed to create subsection"))
}

async fn create_subsection(
    state: &AppState,
    principal: &Principal,
    body: &SubsectionRequest,
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
    let section_id = body.section_id;

    let plan = {
        let db = state.db.lock().await;
        if !db.course_exists(course_id)? {
            return Err(ApiError::bad_request("Course not found"));
        }
        if let Some(section_id) = section_id {
            if !db.section_exists(section_id)? {
                return Err(ApiError::bad_request("Section not found"));
            }
        }

        let plan = resolve_for_create(media_type, body.link_input(file))?;

        if db.subsection_name_taken(course_id, section_id, name, None)? {
            return Err(ApiError::bad_request(NAME_TAKEN));
        }
        if let Some(sequence) = body.sequence {
            if db.subsection_sequence_taken(course_id, section_id, sequence, None)? {
                return Err(ApiError::bad_request(SEQUENCE_TAKEN));
            }
        }
        plan
    };

    let link = plan.commit(&state.uploads).await?;
    let subsection = state.db.lock().await.create_subsection(&NewSubsection {
        course_id,
        section_id,
        media_type,
        name: name.to_string(),
        length: body.length,
        sequence: body.sequence,
        link,
        created_by: Some(principal.id),
    })?;

    info!(subsection_id = subsection.id, course_id, ?section_id, "Subsection created");
    let view = catalog::subsection_view(&state.db, subsection).await?;
    Ok(created("Subsection created successfully", view))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

async fn get_subsection_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = path_id(&id, SUBSECTION_NOT_FOUND)?;

    async {
        let subsection = state
            .db
            .lock()
            .await
            .find_subsection(id)?
            .ok_or_else(|| ApiError::not_found(SUBSECTION_NOT_FOUND))?;
        let view = catalog::subsection_with_resources(&state.db, subsection).await?;
        ApiResult::Ok(ok("Subsection retrieved successfully", view))
    }
    .await
    .map_err(|e| e.in_action("Failed to retrieve subsection"))
}

/// One page of a course's subsections, each with its resources attached.
async fn subsection_page(
    state: &AppState,
    course_id: i64,
    section_id: Option<i64>,
    query: &PageQuery,
) -> ApiResult<Response> {
    {
        let db = state.db.lock().await;
        if !db.course_exists(course_id)? {
            return Err(ApiError::not_found("Course not found"));
        }
        if let Some(section_id) = section_id {
            if !db.section_exists(section_id)? {
                return Err(ApiError::not_found("Section not found"));
            }
        }
    }

    let page = query.request();
    let subsections = state
        .db
        .lock()
        .await
        .list_subsections(course_id, section_id, page)?;
    let views = catalog::subsection_views_with_resources(&state.db, subsections.items).await?;

    Ok(ok(
        "Subsections retrieved successfully",
        serde_json::json!({
            "subsections": views,
            "pagination": Pagination::new(subsections.total, page),
        }),
    ))
}

async fn get_subsections_by_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Response> {
    let course_id = path_id(&course_id, "Course not found")?;
    subsection_page(&state, course_id, None, &query)
        .await
        .map_err(|e| e.in_action("Failed to retrieve subsections"))
}

async fn get_subsections_by_course_and_section(
    State(state): State<AppState>,
    _principal: Principal,
    Path((course_id, section_id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Response> {
    let course_id = path_id(&course_id, "Course not found")?;
    let section_id = path_id(&section_id, "Section not found")?;
    subsection_page(&state, course_id, Some(section_id), &query)
        .await
        .map_err(|e| e.in_action("Failed to retrieve subsections"))
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

async fn update_subsection(
    State(state): State<AppState>,
    principal: Principal,
    Payload { body, file }: Payload<SubsectionRequest>,
) -> ApiResult<Response> {
    let Some(id) = body.id else {
        return Err(ApiError::bad_request("Subsection ID is required in body"));
    };
    apply_subsection_update(&state, &principal, id, &body, file.as_ref())
        .await
        .map_err(|e| e.in_action("Failed to update subsection"))
}

async fn apply_subsection_update(
    state: &AppState,
    principal: &Principal,
    id: i64,
    body: &SubsectionRequest,
    file: Option<&UploadedFile>,
) -> ApiResult<Response> {
    let (requested, plan, name, sequence) = {
        let db = state.db.lock().await;
        let existing = db
            .find_subsection(id)?
            .ok_or_else(|| ApiError::not_found(SUBSECTION_NOT_FOUND))?;

        let requested = filled(&body.media_type).map(parse_media_type).transpose()?;
        let plan = resolve_for_update(existing.media_type, requested, body.link_input(file))?;

        let name = filled(&body.name).filter(|n| *n != existing.name);
        if let Some(name) = name {
            if db.subsection_name_taken(existing.course_id, existing.section_id, name, Some(id))? {
                return Err(ApiError::bad_request(NAME_TAKEN));
            }
        }

        let sequence = body.sequence.filter(|s| Some(*s) != existing.sequence);
        if let Some(sequence) = sequence {
            if db.subsection_sequence_taken(
                existing.course_id,
                existing.section_id,
                sequence,
                Some(id),
            )? {
                return Err(ApiError::bad_request(SEQUENCE_TAKEN));
            }
        }

        (requested, plan, name, sequence)
    };

    let link = plan.commit(&state.uploads).await?;
    let subsection = state.db.lock().await.update_subsection(
        id,
        &SubsectionPatch {
            media_type: requested,
            name: name.map(str::to_string),
            length: body.length,
            sequence,
            link,
            modified_by: Some(principal.id),
        },
    )?;

    info!(subsection_id = id, "Subsection updated");
    let view = catalog::subsection_view(&state.db, subsection).await?;
    Ok(ok("Subsection updated successfully", view))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    id: Option<i64>,
}

impl RequestShape for DeleteRequest {}

async fn delete_subsection(
    State(state): State<AppState>,
    _principal: Principal,
    Payload { body, .. }: Payload<DeleteRequest>,
) -> ApiResult<Response> {
    let Some(id) = body.id else {
        return Err(ApiError::bad_request("Subsection ID is required in body"));
    };

    let removed = state
        .db
        .lock()
        .await
        .delete_subsection(id)
        .map_err(|e| ApiError::from(e).in_action("Failed to delete subsection"))?;
    let Some(resources) = removed else {
        return Err(ApiError::not_found(SUBSECTION_NOT_FOUND));
    };

    info!(subsection_id = id, resources, "Subsection deleted");
    Ok(done("Subsection deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{FilePart, TestApp};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    async fn add_resource(app: &TestApp, sub: &Value, name: &str, sequence: i64) -> Value {
        let token = app.student_token();
        let (status, body) = app
            .post(
                "/api/subsection-resources/addsubsectionresource",
                Some(&token),
                json!({
                    "course_id": sub["course_id"],
                    "section_id": sub["section_id"],
                    "subsection_id": sub["id"],
                    "type": "LINK",
                    "name": name,
                    "sequence": sequence,
                    "link": format!("https://example.com/{name}"),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    #[tokio::test]
    async fn test_add_subsection_checks_parents() {
        let app = TestApp::new().await;
        let course = app.add_course("Parents").await;
        let token = app.student_token();

        let (status, _) = app
            .post("/api/subsections/addsubsection", None, json!({}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let cases = [
            (json!({"type": "LINK", "name": "x"}), "Course ID, type, and name are required fields"),
            (
                json!({"course_id": 77, "type": "LINK", "name": "x", "link": "https://a"}),
                "Course not found",
            ),
            (
                json!({"course_id": course["id"], "section_id": 77, "type": "LINK", "name": "x", "link": "https://a"}),
                "Section not found",
            ),
            (
                json!({"course_id": course["id"], "type": "VIDEO", "name": "x"}),
                "File is required for type: VIDEO",
            ),
        ];
        for (payload, message) in cases {
            let (status, body) = app
                .post("/api/subsections/addsubsection", Some(&token), payload)
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], message);
        }
    }

    #[tokio::test]
    async fn test_subsection_uniqueness_is_scoped_to_section() {
        let app = TestApp::new().await;
        let course = app.add_course("Scoped").await;
        let course_id = course["id"].as_i64().unwrap();
        let s1 = app.add_section(course_id, "S1", 1).await["id"].as_i64().unwrap();
        let s2 = app.add_section(course_id, "S2", 2).await["id"].as_i64().unwrap();
        let token = app.student_token();

        let created = app.add_link_subsection(course_id, Some(s1), "Intro", 1).await;
        assert_eq!(created["section"]["name"], "S1");
        assert_eq!(created["course"]["id"], course_id);
        assert!(created.get("resources").is_none());

        // same name and sequence in another section, and with no section at all
        app.add_link_subsection(course_id, Some(s2), "Intro", 1).await;
        let loose = app.add_link_subsection(course_id, None, "Intro", 1).await;
        assert_eq!(loose["section"], Value::Null);

        let add = |section: Option<i64>, name: &str, sequence: i64| {
            json!({
                "course_id": course_id,
                "section_id": section,
                "type": "LINK",
                "name": name,
                "sequence": sequence,
                "link": "https://example.com",
            })
        };

        let (status, body) = app
            .post("/api/subsections/addsubsection", Some(&token), add(Some(s1), "Intro", 5))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], super::NAME_TAKEN);

        let (status, body) = app
            .post("/api/subsections/addsubsection", Some(&token), add(None, "Other", 1))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], super::SEQUENCE_TAKEN);
    }

    #[tokio::test]
    async fn test_file_subsection_upload() {
        let app = TestApp::new().await;
        let course = app.add_course("Uploads").await;
        let token = app.student_token();
        let course_id = course["id"].to_string();

        let (status, body) = app
            .post_form(
                "/api/subsections/addsubsection",
                Some(&token),
                &[("course_id", &course_id), ("type", "VIDEO"), ("name", "Lecture"), ("length", "600")],
                Some(FilePart {
                    field: "file",
                    file_name: "lecture.mov",
                    content_type: "video/quicktime",
                    bytes: b"moov",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["length"], 600);
        assert!(body["data"]["link"].as_str().unwrap().ends_with(".mov"));

        let (status, body) = app
            .post_form(
                "/api/subsections/addsubsection",
                Some(&token),
                &[("course_id", &course_id), ("type", "VIDEO"), ("name", "Wrong field")],
                Some(FilePart {
                    field: "banner",
                    file_name: "lecture.mp4",
                    content_type: "video/mp4",
                    bytes: b"moov",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    #[tokio::test]
    async fn test_read_endpoints_attach_resources_newest_first() {
        let app = TestApp::new().await;
        let course = app.add_course("Reading").await;
        let course_id = course["id"].as_i64().unwrap();
        let section_id = app.add_section(course_id, "Only", 1).await["id"].as_i64().unwrap();
        let sub = app
            .add_link_subsection(course_id, Some(section_id), "Lesson", 1)
            .await;
        add_resource(&app, &sub, "older", 1).await;
        add_resource(&app, &sub, "newer", 1).await;

        let (status, body) = app
            .get(&format!("/api/subsections/getSubSectionById/{}", sub["id"]), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = body["data"]["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["newer", "older"]);

        let (status, body) = app
            .get(&format!("/api/subsections/getSubSectionsByCourseId/{course_id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["totalCount"], 1);
        assert_eq!(body["data"]["subsections"][0]["resources"][0]["name"], "newer");
        assert_eq!(body["data"]["subsections"][0]["section"]["name"], "Only");

        let (status, body) = app
            .get("/api/subsections/getSubSectionsByCourseId/404", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Course not found");

        let (status, body) = app
            .get("/api/subsections/getSubSectionById/404", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Subsection not found");
    }

    #[tokio::test]
    async fn test_by_course_and_section_requires_auth() {
        let app = TestApp::new().await;
        let course = app.add_course("Gated").await;
        let course_id = course["id"].as_i64().unwrap();
        let section_id = app.add_section(course_id, "Part", 1).await["id"].as_i64().unwrap();
        app.add_link_subsection(course_id, Some(section_id), "In part", 1).await;
        app.add_link_subsection(course_id, None, "Loose", 1).await;

        let uri = format!("/api/subsections/getsubsectionsbycourseidandsectionid/{course_id}/{section_id}");
        let (status, _) = app.get(&uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = app.student_token();
        let (status, body) = app.get(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let subsections = body["data"]["subsections"].as_array().unwrap();
        assert_eq!(subsections.len(), 1);
        assert_eq!(subsections[0]["name"], "In part");

        let (status, body) = app
            .get(
                &format!("/api/subsections/getsubsectionsbycourseidandsectionid/{course_id}/999"),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Section not found");
    }

    #[tokio::test]
    async fn test_update_subsection() {
        let app = TestApp::new().await;
        let course = app.add_course("Changing").await;
        let course_id = course["id"].as_i64().unwrap();
        let sub = app.add_link_subsection(course_id, None, "Draft", 1).await;
        app.add_link_subsection(course_id, None, "Taken", 2).await;
        let token = app.token_for(9, catalog_shared::Role::Teacher);

        let (status, body) = app
            .post("/api/subsections/updatesubsection", Some(&token), json!({"name": "x"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Subsection ID is required in body");

        let (status, body) = app
            .post(
                "/api/subsections/updatesubsection",
                Some(&token),
                json!({"id": sub["id"], "name": "Taken"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], super::NAME_TAKEN);

        let (status, body) = app
            .post(
                "/api/subsections/updatesubsection",
                Some(&token),
                json!({"id": sub["id"], "sequence": 2}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], super::SEQUENCE_TAKEN);

        let (status, body) = app
            .post(
                "/api/subsections/updatesubsection",
                Some(&token),
                json!({"id": sub["id"], "type": "PDF"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "File is required for type: PDF");

        let id = sub["id"].to_string();
        let (status, body) = app
            .post_form(
                "/api/subsections/updatesubsection",
                Some(&token),
                &[("id", &id), ("type", "PDF"), ("name", "Final")],
                Some(FilePart {
                    field: "file",
                    file_name: "notes.pdf",
                    content_type: "application/pdf",
                    bytes: b"%PDF",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let data = &body["data"];
        assert_eq!(data["type"], "PDF");
        assert_eq!(data["name"], "Final");
        assert_eq!(data["modified_by"], 9);
        assert!(data["link"].as_str().unwrap().ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_delete_subsection_removes_its_resources() {
        let app = TestApp::new().await;
        let course = app.add_course("Cascade").await;
        let course_id = course["id"].as_i64().unwrap();
        let sub = app.add_link_subsection(course_id, None, "Doomed", 1).await;
        let first = add_resource(&app, &sub, "a", 1).await;
        let second = add_resource(&app, &sub, "b", 2).await;
        let token = app.student_token();

        let (status, body) = app
            .post("/api/subsections/deletesubsection", Some(&token), json!({}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Subsection ID is required in body");

        let (status, body) = app
            .post(
                "/api/subsections/deletesubsection",
                Some(&token),
                json!({"id": sub["id"]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Subsection deleted successfully");

        for resource in [first, second] {
            let (status, _) = app
                .get(
                    &format!("/api/subsection-resources/getResourceById/{}", resource["id"]),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }

        let (status, _) = app
            .post(
                "/api/subsections/deletesubsection",
                Some(&token),
                json!({"id": sub["id"]}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
