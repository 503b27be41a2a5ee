//! HTTP handlers for the account provisioning endpoint.

use crate::{
    AppState,
    api::models::users::{UserCreate, UserCreateResponse},
    auth::RequiresAdmin,
    errors::{Error, Result},
};
use axum::{Json, extract::State, extract::rejection::JsonRejection};
use tracing::info;

/// Provision a platform account.
///
/// Creates the credential account in the identity store, then the profile
/// row keyed by the new account's id, rolling the identity record back if
/// the profile insert fails. Successful creations are recorded in the
/// audit trail on a best-effort basis.
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "users",
    summary = "Provision a user",
    description = "Create an account in the identity store and its profile row. Administrators only.",
    request_body = UserCreate,
    responses(
        (status = 200, description = "Account provisioned", body = UserCreateResponse),
        (status = 400, description = "Invalid request body, missing email/password, or identity store rejection"),
        (status = 401, description = "Missing or invalid credential"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Store failure"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    RequiresAdmin(admin): RequiresAdmin,
    payload: std::result::Result<Json<UserCreate>, JsonRejection>,
) -> Result<Json<UserCreateResponse>> {
    // Decode failures become the deterministic 400 instead of axum's
    // default rejection statuses.
    let Json(request) = payload.map_err(|rejection| Error::BadRequest {
        message: rejection.body_text(),
    })?;

    let user = state.provisioner().provision(&request).await?;

    state
        .auditor()
        .user_created(&admin, &user, request.send_verification_email)
        .await;

    info!(user_id = %user.id, admin_user_id = %admin.id, "Provisioned account");

    Ok(Json(UserCreateResponse {
        success: true,
        user_id: user.id,
        email: user.email,
    }))
}

/// Fallback for unsupported methods on the provisioning route.
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}

/// Answers stray OPTIONS requests that are not CORS preflights; real
/// preflights are short-circuited by the CORS layer before routing.
pub async fn preflight() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::test_utils::{ScriptedFailure, create_test_server, register_caller};
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn provisions_an_account_for_an_administrator() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&json!({
                "email": "new@example.com",
                "password": "hunter2hunter2",
                "full_name": "New Person",
            }))
            .await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["email"], "new@example.com");

        // The profile row is keyed by the identity record's id.
        let user_id: uuid::Uuid = serde_json::from_value(body["user_id"].clone()).unwrap();
        let inserted = stores.profiles.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].id, user_id);
        assert_eq!(inserted[0].full_name.as_deref(), Some("New Person"));
    }

    #[tokio::test]
    async fn defaults_role_and_status_when_not_supplied() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));

        server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&json!({ "email": "new@example.com", "password": "hunter2hunter2" }))
            .await
            .assert_status(StatusCode::OK);

        let inserted = stores.profiles.inserted.lock().unwrap();
        assert_eq!(serde_json::to_value(inserted[0].role).unwrap(), json!("user"));
        assert_eq!(serde_json::to_value(inserted[0].status).unwrap(), json!("active"));
    }

    #[tokio::test]
    async fn missing_credential_is_401_with_no_side_effects() {
        let (server, stores) = create_test_server();

        let response = server
            .post("/admin/users")
            .json(&json!({ "email": "new@example.com", "password": "hunter2hunter2" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["error"], "Unauthorized");

        assert!(stores.identity.created.lock().unwrap().is_empty());
        assert!(stores.profiles.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_token_is_401() {
        let (server, _stores) = create_test_server();

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer not-a-real-token")
            .json(&json!({ "email": "new@example.com", "password": "hunter2hunter2" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["error"], "Invalid token");
    }

    #[tokio::test]
    async fn non_admin_is_403_with_no_side_effects() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "user-token", "user@example.com", Some(Role::User));

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer user-token")
            .json(&json!({ "email": "new@example.com", "password": "hunter2hunter2" }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["error"], "Forbidden: Admin access required");

        assert!(stores.identity.created.lock().unwrap().is_empty());
        assert!(stores.profiles.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_email_or_password_is_400_before_any_store_call() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&json!({ "full_name": "No Creds" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "Email and password are required");

        assert!(stores.identity.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let (server, stores) = create_test_server();
        // Auth comes first, so even decode checks need a valid caller.
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .text("{not json")
            .content_type("application/json")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_role_value_is_400() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&json!({
                "email": "new@example.com",
                "password": "hunter2hunter2",
                "role": "superuser",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(stores.identity.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_maps_the_store_rejection_to_400() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));

        let body = json!({ "email": "dup@example.com", "password": "hunter2hunter2" });

        server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&body)
            .await
            .assert_status(StatusCode::OK);

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&body)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json_body: Value = response.json();
        assert_eq!(json_body["error"], "A user with this email address has already been registered");
    }

    #[tokio::test]
    async fn profile_failure_rolls_back_and_reports_500() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));
        *stores.profiles.insert_failure.lock().unwrap() = Some(ScriptedFailure::Reject {
            status: 409,
            message: "duplicate key value".to_string(),
        });

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&json!({ "email": "rollback@example.com", "password": "hunter2hunter2" }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "Failed to create profile: duplicate key value");

        // Step A was compensated.
        assert_eq!(stores.identity.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn audit_failure_leaves_the_response_unchanged() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));
        *stores.audit.failure.lock().unwrap() = Some(ScriptedFailure::Reject {
            status: 500,
            message: "audit table missing".to_string(),
        });

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&json!({ "email": "new@example.com", "password": "hunter2hunter2" }))
            .await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn audit_records_the_admin_and_the_new_account() {
        let (server, stores) = create_test_server();
        let admin = register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));

        let response = server
            .post("/admin/users")
            .add_header("authorization", "Bearer admin-token")
            .json(&json!({
                "email": "new@example.com",
                "password": "hunter2hunter2",
                "send_verification_email": true,
            }))
            .await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        let user_id: uuid::Uuid = serde_json::from_value(body["user_id"].clone()).unwrap();

        let entries = stores.audit.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].admin_user_id, admin.id);
        assert_eq!(entries[0].record_id, user_id);
        assert_eq!(entries[0].metadata["send_verification_email"], true);
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let (server, _stores) = create_test_server();

        let response = server.get("/admin/users").await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = response.json();
        assert_eq!(body["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn options_succeeds_without_credentials() {
        let (server, stores) = create_test_server();

        let response = server.method(axum::http::Method::OPTIONS, "/admin/users").await;

        response.assert_status_ok();
        assert!(stores.identity.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn preflight_carries_the_permissive_cors_headers() {
        let (server, _stores) = create_test_server();

        let response = server
            .method(axum::http::Method::OPTIONS, "/admin/users")
            .add_header("origin", "https://dashboard.example.com")
            .add_header("access-control-request-method", "POST")
            .add_header("access-control-request-headers", "authorization, content-type")
            .await;

        let headers = response.headers();
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");

        let allowed = headers.get("access-control-allow-headers").unwrap().to_str().unwrap();
        assert!(allowed.contains("authorization"));
        assert!(allowed.contains("content-type"));
    }

    #[tokio::test]
    async fn error_responses_carry_the_cors_grant() {
        let (server, _stores) = create_test_server();

        let response = server
            .post("/admin/users")
            .add_header("origin", "https://dashboard.example.com")
            .json(&json!({ "email": "new@example.com", "password": "hunter2hunter2" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");
    }

    #[tokio::test]
    async fn concurrent_duplicates_end_with_one_winner() {
        let (server, stores) = create_test_server();
        register_caller(&stores, "admin-token", "admin@example.com", Some(Role::Admin));

        let send = || {
            server
                .post("/admin/users")
                .add_header("authorization", "Bearer admin-token")
                .json(&json!({ "email": "race@example.com", "password": "hunter2hunter2" }))
        };

        let (first, second) = tokio::join!(send(), send());

        let statuses = [first.status_code(), second.status_code()];
        assert!(statuses.contains(&StatusCode::OK));
        assert!(statuses.contains(&StatusCode::BAD_REQUEST));
        assert_eq!(stores.profiles.inserted.lock().unwrap().len(), 1);
    }
}
