use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use catalog_store::{Database, NewSubsectionResource, SubsectionResourcePatch};
use serde::Deserialize;
use tracing::info;

use super::{created, ok, parse_media_type, path_id, AppState};
use crate::auth::Principal;
use crate::catalog;
use crate::error::{ApiError, ApiResult};
use crate::form::{filled, lenient, Payload, RequestShape};
use crate::media::{resolve_for_create, resolve_for_update, LinkInput};
use crate::uploads::UploadedFile;

const RESOURCE_NOT_FOUND: &str = "Subsection resource not found";
const SUBSECTION_NOT_FOUND: &str = "Subsection not found";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/addsubsectionresource", post(add_resource))
        .route("/getResourceById/:id", get(get_resource_by_id))
        .route("/updatesubsectionresource", post(update_resource))
        .route("/deletesubsectionresource", post(delete_resource))
        .route(
            "/getresourcesbycourseidandsectionandsubsectionid/:course_id/:section_id/:subsection_id",
            get(get_resources_by_parents),
        )
}

#[derive(Debug, Deserialize)]
pub struct ResourceRequest {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    course_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    section_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    subsection_id: Option<i64>,
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

impl RequestShape for ResourceRequest {
    const FILE_FIELD: Option<&'static str> = Some("file");
}

impl ResourceRequest {
    fn link_input<'a>(&'a self, file: Option<&'a UploadedFile>) -> LinkInput<'a> {
        LinkInput {
            link: self.link.as_deref(),
            video_id: self.video_id.as_deref(),
            file,
        }
    }
}

/// Reject ids that name no row. Absent ids pass.
fn check_parents(
    db: &Database,
    course_id: Option<i64>,
    section_id: Option<i64>,
    subsection_id: Option<i64>,
) -> ApiResult<()> {
    if let Some(id) = course_id {
        if !db.course_exists(id)? {
            return Err(ApiError::bad_request("Course not found"));
        }
    }
    if let Some(id) = section_id {
        if !db.section_exists(id)? {
            return Err(ApiError::bad_request("Section not found"));
        }
    }
    if let Some(id) = subsection_id {
        if !db.subsection_exists(id)? {
            return Err(ApiError::bad_request(SUBSECTION_NOT_FOUND));
        }
    }
    Ok(())
}

async fn add_resource(
    State(state): State<AppState>,
    principal: Principal,
    Payload { body, file }: Payload<ResourceRequest>,
) -> ApiResult<Response> {
    create_resource(&state, &principal, &body, file.as_ref())
        .await
        .map_err(|e| e.in_action("Failed to create subsection resource"))
}

async fn create_resource(
    state: &AppState,
    principal: &Principal,
    body: &ResourceRequest,
    file: Option<&UploadedFile>,
) -> ApiResult<Response> {
    let (Some(course_id), Some(raw_type), Some(name), Some(subsection_id)) = (
        body.course_id,
        filled(&body.media_type),
        filled(&body.name),
        body.subsection_id,
    ) else {
        return Err(ApiError::bad_request(
            "Course ID, type, name, and subsection ID are required fields",
        ));
    };
    let media_type = parse_media_type(raw_type)?;

    let plan = {
        let db = state.db.lock().await;
        check_parents(&db, Some(course_id), body.section_id, Some(subsection_id))?;
        resolve_for_create(media_type, body.link_input(file))?
    };

    let link = plan.commit(&state.uploads).await?;
    let resource = state.db.lock().await.create_resource(&NewSubsectionResource {
        course_id,
        section_id: body.section_id,
        subsection_id,
        media_type,
        name: name.to_string(),
        length: body.length,
        sequence: body.sequence,
        link,
        created_by: Some(principal.id),
    })?;

    info!(resource_id = resource.id, subsection_id, "Subsection resource created");
    let view = catalog::resource_view(&state.db, resource).await?;
    Ok(created("Subsection resource created successfully", view))
}

async fn get_resource_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = path_id(&id, RESOURCE_NOT_FOUND)?;

    async {
        let resource = state
            .db
            .lock()
            .await
            .find_resource(id)?
            .ok_or_else(|| ApiError::not_found(RESOURCE_NOT_FOUND))?;
        let view = catalog::resource_view(&state.db, resource).await?;
        ApiResult::Ok(ok("Subsection resource retrieved successfully", view))
    }
    .await
    .map_err(|e| e.in_action("Failed to retrieve subsection resource"))
}

async fn update_resource(
    State(state): State<AppState>,
    principal: Principal,
    Payload { body, file }: Payload<ResourceRequest>,
) -> ApiResult<Response> {
    let Some(id) = body.id else {
        return Err(ApiError::bad_request("Resource ID is required for update"));
    };
    apply_resource_update(&state, &principal, id, &body, file.as_ref())
        .await
        .map_err(|e| e.in_action("Failed to update subsection resource"))
}

async fn apply_resource_update(
    state: &AppState,
    principal: &Principal,
    id: i64,
    body: &ResourceRequest,
    file: Option<&UploadedFile>,
) -> ApiResult<Response> {
    let (requested, plan) = {
        let db = state.db.lock().await;
        let existing = db
            .find_resource(id)?
            .ok_or_else(|| ApiError::not_found(RESOURCE_NOT_FOUND))?;

        let requested = filled(&body.media_type).map(parse_media_type).transpose()?;
        check_parents(&db, body.course_id, body.section_id, body.subsection_id)?;
        let plan = resolve_for_update(existing.media_type, requested, body.link_input(file))?;
        (requested, plan)
    };

    let link = plan.commit(&state.uploads).await?;
    let patch = SubsectionResourcePatch {
        course_id: body.course_id,
        section_id: body.section_id,
        subsection_id: body.subsection_id,
        media_type: requested,
        name: filled(&body.name).map(str::to_string),
        length: body.length,
        sequence: body.sequence,
        link,
        modified_by: Some(principal.id),
    };
    let resource = state.db.lock().await.update_resource(id, &patch)?;

    info!(resource_id = id, "Subsection resource updated");
    let view = catalog::resource_view(&state.db, resource).await?;
    Ok(ok("Subsection resource updated successfully", view))
}

async fn delete_resource(
    State(state): State<AppState>,
    _principal: Principal,
    Payload { body, .. }: Payload<ResourceRequest>,
) -> ApiResult<Response> {
    let Some(id) = body.id else {
        return Err(ApiError::bad_request("Resource ID is required for deletion"));
    };

    async {
        let resource = state
            .db
            .lock()
            .await
            .find_resource(id)?
            .ok_or_else(|| ApiError::not_found(RESOURCE_NOT_FOUND))?;

        // the response echoes the record, so assemble it while the parents resolve
        let view = catalog::resource_view(&state.db, resource).await?;
        state.db.lock().await.delete_resource(id)?;

        info!(resource_id = id, "Subsection resource deleted");
        ApiResult::Ok(ok("Subsection resource deleted successfully", view))
    }
    .await
    .map_err(|e| e.in_action("Failed to delete subsection resource"))
}

async fn get_resources_by_parents(
    State(state): State<AppState>,
    Path((course_id, section_id, subsection_id)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let course_id = path_id(&course_id, "Course not found")?;
    let section_id = path_id(&section_id, "Section not found")?;
    let subsection_id = path_id(&subsection_id, SUBSECTION_NOT_FOUND)?;

    async {
        let resources = {
            let db = state.db.lock().await;
            if !db.course_exists(course_id)? {
                return Err(ApiError::not_found("Course not found"));
            }
            if !db.section_exists(section_id)? {
                return Err(ApiError::not_found("Section not found"));
            }
            if !db.subsection_exists(subsection_id)? {
                return Err(ApiError::not_found(SUBSECTION_NOT_FOUND));
            }
            db.list_resources(course_id, Some(section_id), subsection_id)?
        };

        let views = catalog::resource_views(&state.db, resources).await?;
        ApiResult::Ok(ok(
            "Resources retrieved successfully",
            serde_json::json!({
                "total_count": views.len(),
                "resources": views,
            }),
        ))
    }
    .await
    .map_err(|e| e.in_action("Failed to retrieve resources"))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{FilePart, TestApp};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    struct Tree {
        course_id: i64,
        section_id: i64,
        subsection: Value,
    }

    async fn tree(app: &TestApp) -> Tree {
        let course = app.add_course("Resources").await;
        let course_id = course["id"].as_i64().unwrap();
        let section_id = app.add_section(course_id, "Chapter", 1).await["id"].as_i64().unwrap();
        let subsection = app
            .add_link_subsection(course_id, Some(section_id), "Topic", 1)
            .await;
        Tree {
            course_id,
            section_id,
            subsection,
        }
    }

    fn link_resource(tree: &Tree, name: &str, sequence: i64) -> Value {
        json!({
            "course_id": tree.course_id,
            "section_id": tree.section_id,
            "subsection_id": tree.subsection["id"],
            "type": "LINK",
            "name": name,
            "sequence": sequence,
            "link": format!("https://example.com/{name}"),
        })
    }

    async fn add(app: &TestApp, payload: Value) -> Value {
        let token = app.student_token();
        let (status, body) = app
            .post("/api/subsection-resources/addsubsectionresource", Some(&token), payload)
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    #[tokio::test]
    async fn test_add_resource_validation() {
        let app = TestApp::new().await;
        let tree = tree(&app).await;
        let token = app.student_token();

        let (status, _) = app
            .post(
                "/api/subsection-resources/addsubsectionresource",
                None,
                link_resource(&tree, "x", 1),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut no_subsection = link_resource(&tree, "x", 1);
        no_subsection["subsection_id"] = Value::Null;
        let mut bad_subsection = link_resource(&tree, "x", 1);
        bad_subsection["subsection_id"] = json!(999);
        let mut bad_section = link_resource(&tree, "x", 1);
        bad_section["section_id"] = json!(999);
        let mut no_link = link_resource(&tree, "x", 1);
        no_link["link"] = Value::Null;

        let cases = [
            (no_subsection, "Course ID, type, name, and subsection ID are required fields"),
            (bad_section, "Section not found"),
            (bad_subsection, "Subsection not found"),
            (no_link, "Link is required for LINK type"),
        ];
        for (payload, message) in cases {
            let (status, body) = app
                .post("/api/subsection-resources/addsubsectionresource", Some(&token), payload)
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], message);
        }
    }

    #[tokio::test]
    async fn test_resource_carries_parent_refs() {
        let app = TestApp::new().await;
        let tree = tree(&app).await;

        let created = add(&app, link_resource(&tree, "slides", 1)).await;
        assert_eq!(created["course"]["id"], tree.course_id);
        assert_eq!(created["section"], json!({"id": tree.section_id, "name": "Chapter"}));
        assert_eq!(
            created["subsection"],
            json!({"id": tree.subsection["id"], "name": "Topic", "type": "LINK"})
        );

        let (status, body) = app
            .get(
                &format!("/api/subsection-resources/getResourceById/{}", created["id"]),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], created);
    }

    #[tokio::test]
    async fn test_list_by_parents_oldest_first() {
        let app = TestApp::new().await;
        let tree = tree(&app).await;
        add(&app, link_resource(&tree, "second", 2)).await;
        add(&app, link_resource(&tree, "first-a", 1)).await;
        add(&app, link_resource(&tree, "first-b", 1)).await;

        let uri = format!(
            "/api/subsection-resources/getresourcesbycourseidandsectionandsubsectionid/{}/{}/{}",
            tree.course_id, tree.section_id, tree.subsection["id"]
        );
        let (status, body) = app.get(&uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_count"], 3);
        let names: Vec<_> = body["data"]["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["first-a", "first-b", "second"]);

        let (status, body) = app
            .get(
                &format!(
                    "/api/subsection-resources/getresourcesbycourseidandsectionandsubsectionid/{}/{}/999",
                    tree.course_id, tree.section_id
                ),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Subsection not found");
    }

    #[tokio::test]
    async fn test_update_resource() {
        let app = TestApp::new().await;
        let tree = tree(&app).await;
        let resource = add(&app, link_resource(&tree, "notes", 1)).await;
        let token = app.token_for(4, catalog_shared::Role::Teacher);
        let uri = "/api/subsection-resources/updatesubsectionresource";

        let (status, body) = app.post(uri, Some(&token), json!({"name": "x"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Resource ID is required for update");

        let (status, _) = app.post(uri, Some(&token), json!({"id": 999})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .post(uri, Some(&token), json!({"id": resource["id"], "subsection_id": 999}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Subsection not found");

        let id = resource["id"].to_string();
        let (status, body) = app
            .post_form(
                uri,
                Some(&token),
                &[("id", &id), ("type", "IMAGE"), ("name", "diagram"), ("sequence", "3")],
                Some(FilePart {
                    field: "file",
                    file_name: "diagram.gif",
                    content_type: "image/gif",
                    bytes: b"GIF89a",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let data = &body["data"];
        assert_eq!(data["type"], "IMAGE");
        assert_eq!(data["name"], "diagram");
        assert_eq!(data["sequence"], 3);
        assert_eq!(data["modified_by"], 4);
        assert!(data["link"].as_str().unwrap().ends_with(".gif"));
        assert_eq!(data["subsection"]["name"], "Topic");
    }

    #[tokio::test]
    async fn test_delete_returns_the_removed_record() {
        let app = TestApp::new().await;
        let tree = tree(&app).await;
        let resource = add(&app, link_resource(&tree, "temp", 1)).await;
        let token = app.student_token();
        let uri = "/api/subsection-resources/deletesubsectionresource";

        let (status, body) = app.post(uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Resource ID is required for deletion");

        let (status, body) = app
            .post(uri, Some(&token), json!({"id": resource["id"]}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Subsection resource deleted successfully");
        assert_eq!(body["data"], resource);

        let (status, _) = app
            .post(uri, Some(&token), json!({"id": resource["id"]}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
