use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use catalog_shared::password::{hash_password, verify_password};
use catalog_shared::token::TokenSubject;
use catalog_shared::Role;
use catalog_store::{NewUser, UserPatch};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{created, done, ok, path_id, require, AppState, PageQuery, Pagination};
use crate::auth::AdminPrincipal;
use crate::error::{ApiError, ApiResult};
use crate::form::{filled, lenient, Payload, RequestShape};

const USER_NOT_FOUND: &str = "User not found";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/addUser", post(add_user))
        .route("/login", post(login))
        .route("/getAllUsers", get(get_all_users))
        .route("/updateUser/:id", post(update_user))
        .route("/deleteUser/:id", post(delete_user))
        .route("/getUserById/:id", get(get_user_by_id))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserRequest {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    mobile: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    password: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    role: Option<String>,
}

impl RequestShape for UserRequest {}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    password: Option<String>,
}

impl RequestShape for LoginRequest {}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    #[serde(flatten)]
    page: PageQuery,
    #[serde(rename = "searchTerm")]
    search_term: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    success: bool,
    message: &'static str,
    access_token: String,
    refresh_token: String,
}

fn parse_role(raw: Option<&str>) -> ApiResult<Option<Role>> {
    raw.map(|r| {
        r.parse::<Role>().map_err(|_| {
            ApiError::bad_request(format!("Invalid role. Must be one of: {}", Role::allowed()))
        })
    })
    .transpose()
}

/// Argon2 is CPU-bound, keep it off the async workers.
async fn hash_off_thread(password: String) -> ApiResult<String> {
    Ok(tokio::task::spawn_blocking(move || hash_password(&password)).await??)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn add_user(
    State(state): State<AppState>,
    Payload { body, .. }: Payload<UserRequest>,
) -> ApiResult<Response> {
    create_user(&state, body)
        .await
        .map_err(|e| e.in_action("Failed to create user"))
}

async fn create_user(state: &AppState, body: UserRequest) -> ApiResult<Response> {
    let (Some(mobile), Some(email)) = (filled(&body.mobile), filled(&body.email)) else {
        return Err(ApiError::bad_request("Mobile and email are required"));
    };
    let password = require(&body.password, "Password is required")?.to_string();
    let role = parse_role(filled(&body.role))?.unwrap_or_default();

    if state.db.lock().await.email_in_use(email, None)? {
        return Err(ApiError::bad_request("User already exists with this email"));
    }

    let password_hash = hash_off_thread(password).await?;
    let user = state.db.lock().await.create_user(&NewUser {
        first_name: body.first_name.clone(),
        last_name: body.last_name.clone(),
        mobile: mobile.to_string(),
        email: email.to_string(),
        password_hash,
        role,
    })?;

    info!(user_id = user.id, role = %user.role, "User created");
    Ok(created("User created successfully", user))
}

async fn login(
    State(state): State<AppState>,
    Payload { body, .. }: Payload<LoginRequest>,
) -> ApiResult<Response> {
    let (Some(email), Some(password)) = (filled(&body.email), body.password.clone()) else {
        return Err(ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            error: "Email and password are required",
        });
    };
    if password.is_empty() {
        return Err(ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            error: "Email and password are required",
        });
    }

    let user = state.db.lock().await.find_active_user_by_email(email)?;

    let Some(user) = user else {
        // spend comparable time so a missing account is not observable
        let _ = hash_off_thread(password).await;
        return Err(ApiError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            error: INVALID_CREDENTIALS,
        });
    };

    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await??;
    if !valid {
        tracing::debug!(user_id = user.id, "Login rejected");
        return Err(ApiError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            error: INVALID_CREDENTIALS,
        });
    }

    let subject = TokenSubject {
        id: user.id,
        mobile: user.mobile.clone(),
        is_active: user.is_active,
        role: user.role,
    };
    let response = LoginResponse {
        success: true,
        message: "Login successful",
        access_token: state.tokens.issue_access_token(&subject)?,
        refresh_token: state.tokens.issue_refresh_token(&subject)?,
    };

    info!(user_id = user.id, "User logged in");
    Ok((StatusCode::OK, Json(response)).into_response())
}

async fn get_all_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Response> {
    let page = query.page.request();
    let search = filled(&query.search_term);

    let users = state
        .db
        .lock()
        .await
        .list_users(search, page)
        .map_err(|e| ApiError::from(e).in_action("Failed to retrieve users"))?;

    Ok(ok(
        "Users retrieved successfully",
        serde_json::json!({
            "users": users.items,
            "pagination": Pagination::new(users.total, page),
        }),
    ))
}

async fn update_user(
    State(state): State<AppState>,
    AdminPrincipal(principal): AdminPrincipal,
    Path(id): Path<String>,
    Payload { body, .. }: Payload<UserRequest>,
) -> ApiResult<Response> {
    let id = path_id(&id, USER_NOT_FOUND)?;
    apply_user_update(&state, id, principal.id, body)
        .await
        .map_err(|e| e.in_action("Failed to update user"))
}

async fn apply_user_update(
    state: &AppState,
    id: i64,
    modified_by: i64,
    body: UserRequest,
) -> ApiResult<Response> {
    let existing = state.db.lock().await.find_user(id)?;
    let Some(existing) = existing.filter(|u| u.is_active) else {
        return Err(ApiError::not_found(USER_NOT_FOUND));
    };

    let role = parse_role(filled(&body.role))?;
    let email = filled(&body.email).map(str::to_string);
    if let Some(email) = email.as_deref().filter(|e| *e != existing.email) {
        if state.db.lock().await.email_in_use(email, Some(id))? {
            return Err(ApiError::bad_request("User already exists with this email"));
        }
    }

    let password_hash = match filled(&body.password) {
        Some(password) => Some(hash_off_thread(password.to_string()).await?),
        None => None,
    };

    let patch = UserPatch {
        first_name: filled(&body.first_name).map(str::to_string),
        last_name: filled(&body.last_name).map(str::to_string),
        mobile: filled(&body.mobile).map(str::to_string),
        email,
        password_hash,
        role,
        modified_by: Some(modified_by),
    };
    let user = state.db.lock().await.update_user(id, &patch)?;

    info!(user_id = id, modified_by, "User updated");
    Ok(ok("User updated successfully", user))
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let id = path_id(&id, USER_NOT_FOUND)?;
    let db = state.db.lock().await;

    let live = db
        .find_user(id)
        .map_err(|e| ApiError::from(e).in_action("Failed to delete user"))?
        .is_some_and(|u| u.is_active);
    if !live {
        return Err(ApiError::not_found(USER_NOT_FOUND));
    }

    db.deactivate_user(id)
        .map_err(|e| ApiError::from(e).in_action("Failed to delete user"))?;

    info!(user_id = id, "User deactivated");
    Ok(done("User deleted successfully"))
}

async fn get_user_by_id(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let id = path_id(&id, USER_NOT_FOUND)?;
    let user = state
        .db
        .lock()
        .await
        .find_user(id)
        .map_err(|e| ApiError::from(e).in_action("Failed to retrieve user"))?;

    match user.filter(|u| u.is_active) {
        Some(user) => Ok(ok("User retrieved successfully", user)),
        None => Err(ApiError::not_found(USER_NOT_FOUND)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::TestApp;
    use axum::http::StatusCode;
    use catalog_shared::Role;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_user_hides_password_and_rejects_duplicates() {
        let app = TestApp::new().await;
        let payload = json!({
            "first_name": "Ada",
            "mobile": "5551234",
            "email": "ada@example.com",
            "password": "hunter22",
        });

        let (status, body) = app.post("/api/users/addUser", None, payload.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["role"], "STUDENT");
        assert_eq!(body["data"]["created_by"], body["data"]["id"]);
        assert!(body["data"].get("password").is_none());
        assert!(body["data"].get("password_hash").is_none());

        let (status, body) = app.post("/api/users/addUser", None, payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists with this email");
    }

    #[tokio::test]
    async fn test_add_user_validation() {
        let app = TestApp::new().await;

        let (status, body) = app
            .post("/api/users/addUser", None, json!({"email": "x@example.com"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Mobile and email are required");

        let (status, body) = app
            .post(
                "/api/users/addUser",
                None,
                json!({"email": "x@example.com", "mobile": "1"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password is required");

        let (status, body) = app
            .post(
                "/api/users/addUser",
                None,
                json!({"email": "x@example.com", "mobile": "1", "password": "pw", "role": "ROOT"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Invalid role. Must be one of: STUDENT, ADMIN, TEACHER"
        );
    }

    #[tokio::test]
    async fn test_login_issues_tokens() {
        let app = TestApp::new().await;
        let user = app.seed_user("grace@example.com", "correct-horse", Role::Admin).await;

        let (status, body) = app
            .post(
                "/api/users/login",
                None,
                json!({"email": "grace@example.com", "password": "correct-horse"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");

        let access = body["accessToken"].as_str().unwrap();
        let claims = app.state.tokens.verify_access_token(access).unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.role, Role::Admin);
        assert!(body["refreshToken"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let app = TestApp::new().await;
        app.seed_user("grace@example.com", "correct-horse", Role::Student).await;

        let wrong_password = app
            .post(
                "/api/users/login",
                None,
                json!({"email": "grace@example.com", "password": "battery-staple"}),
            )
            .await;
        let unknown_email = app
            .post(
                "/api/users/login",
                None,
                json!({"email": "nobody@example.com", "password": "battery-staple"}),
            )
            .await;

        assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(
            wrong_password.1,
            json!({"success": false, "error": "Invalid credentials"})
        );
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post("/api/users/login", None, json!({"email": "a@example.com"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email and password are required");
    }

    #[tokio::test]
    async fn test_update_user_is_admin_only() {
        let app = TestApp::new().await;
        let user = app.seed_user("lin@example.com", "pw-one", Role::Student).await;
        let uri = format!("/api/users/updateUser/{}", user.id);
        let change = json!({"first_name": "Linus"});

        let (status, body) = app.post(&uri, None, change.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid authorization header");

        let (status, _) = app.post(&uri, Some("garbage"), change.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let student = app.student_token();
        let (status, body) = app.post(&uri, Some(&student), change.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access denied, admin only");

        let admin = app.token_for(99, Role::Admin);
        let (status, body) = app.post(&uri, Some(&admin), change).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["first_name"], "Linus");
        assert_eq!(body["data"]["last_name"], "User");
        assert_eq!(body["data"]["modified_by"], 99);
    }

    #[tokio::test]
    async fn test_update_user_rehashes_password() {
        let app = TestApp::new().await;
        let user = app.seed_user("lin@example.com", "pw-one", Role::Student).await;
        let admin = app.admin_token();

        let (status, _) = app
            .post(
                &format!("/api/users/updateUser/{}", user.id),
                Some(&admin),
                json!({"password": "pw-two"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .post(
                "/api/users/login",
                None,
                json!({"email": "lin@example.com", "password": "pw-two"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_user_is_soft() {
        let app = TestApp::new().await;
        let user = app.seed_user("gone@example.com", "pw", Role::Student).await;
        let uri = format!("/api/users/deleteUser/{}", user.id);

        let (status, body) = app.post(&uri, None, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User deleted successfully");

        let row = app.state.db.lock().await.get_user(user.id).unwrap();
        assert!(!row.is_active);

        let (status, _) = app
            .get(&format!("/api/users/getUserById/{}", user.id), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.post(&uri, None, json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }

    #[tokio::test]
    async fn test_list_users_paginates_and_searches() {
        let app = TestApp::new().await;
        for i in 0..3 {
            app.seed_user(&format!("user{i}@example.com"), "pw", Role::Student)
                .await;
        }
        app.seed_user("special@corp.test", "pw", Role::Teacher).await;

        let (status, body) = app.get("/api/users/getAllUsers?page=2&limit=3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["users"].as_array().unwrap().len(), 1);
        assert_eq!(
            body["data"]["pagination"],
            json!({"totalCount": 4, "totalPages": 2, "currentPage": 2, "limit": 3})
        );

        let (_, body) = app.get("/api/users/getAllUsers?searchTerm=corp", None).await;
        let users = body["data"]["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["email"], "special@corp.test");
    }

    #[tokio::test]
    async fn test_unparsable_id_is_not_found() {
        let app = TestApp::new().await;
        let (status, body) = app.get("/api/users/getUserById/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }
}
