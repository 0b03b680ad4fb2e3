//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use common::validation::FieldErrors;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::{
    error::{AccountError, AuthError, AuthResult},
    manager::ProfileChanges,
    middleware::{AuthUser, auth_middleware},
    models::{LoginCredentials, User},
    state::AppState,
    validation::{validate_email, validate_name, validate_password},
};

const REQUIRED: &str = "This field is required.";

// JSON body whose rejections render as `AuthError`
type JsonBody = WithRejection<Json<Value>, AuthError>;

/// Account fields of a registration or profile payload
#[derive(Debug)]
pub struct AccountFields {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl AccountFields {
    /// Read and validate the fields present in `body`
    ///
    /// With `required` set every field must be given, as on registration and
    /// PUT; otherwise omitted fields stay `None`.
    pub fn from_json(body: &Value, required: bool) -> Result<Self, FieldErrors> {
        let object = as_object(body)?;
        let mut errors = FieldErrors::new();
        let fields = Self {
            email: string_field(&mut errors, object, "email", required),
            password: string_field(&mut errors, object, "password", required),
            name: string_field(&mut errors, object, "name", required),
        };

        if let Some(email) = &fields.email {
            errors.check("email", validate_email(email));
        }
        if let Some(password) = &fields.password {
            errors.check("password", validate_password(password));
        }
        if let Some(name) = &fields.name {
            errors.check("name", validate_name(name));
        }
        errors.into_result()?;

        Ok(fields)
    }
}

/// Public view of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}

/// Response for token generation
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/user/me/",
            get(get_profile).put(replace_profile).patch(patch_profile),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/user/create/", post(create_user))
        .route("/api/user/token/", post(create_token))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.users.health_check().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "auth-service"
        })),
    )
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, FieldErrors> {
    body.as_object().ok_or_else(|| {
        FieldErrors::single("non_field_errors", "Invalid data. Expected a dictionary.")
    })
}

/// Text of a field; numbers are taken as their decimal form
fn string_field(
    errors: &mut FieldErrors,
    object: &Map<String, Value>,
    field: &str,
    required: bool,
) -> Option<String> {
    match object.get(field) {
        None => {
            if required {
                errors.add(field, REQUIRED);
            }
            None
        }
        Some(Value::Null) => {
            errors.add(field, "This field may not be null.");
            None
        }
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        Some(_) => {
            errors.add(field, "Not a valid string.");
            None
        }
    }
}

fn account_error(e: AccountError) -> AuthError {
    match e {
        AccountError::EmailTaken(_) => {
            FieldErrors::single("email", "user with this email already exists.").into()
        }
        AccountError::MissingEmail => FieldErrors::single("email", e.to_string()).into(),
        other => {
            error!("Account operation failed: {}", other);
            AuthError::InternalServerError
        }
    }
}

/// Create a new user
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody,
) -> AuthResult<impl IntoResponse> {
    let fields = AccountFields::from_json(&body, true)?;
    let (Some(email), Some(password), Some(name)) = (fields.email, fields.password, fields.name)
    else {
        return Err(FieldErrors::single("non_field_errors", REQUIRED).into());
    };

    let user = state
        .users
        .create_user(&email, &name, &password)
        .await
        .map_err(account_error)?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Issue a bearer token for valid credentials
pub async fn create_token(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody,
) -> AuthResult<impl IntoResponse> {
    let object = as_object(&body)?;
    let mut errors = FieldErrors::new();
    let email = string_field(&mut errors, object, "email", true);
    let password = string_field(&mut errors, object, "password", true);

    if let Some(email) = &email {
        errors.check("email", validate_email(email));
    }
    if password.as_deref() == Some("") {
        errors.add("password", "This field may not be blank.");
    }
    errors.into_result()?;

    let credentials = LoginCredentials {
        email: email.unwrap_or_default(),
        password: password.unwrap_or_default(),
    };

    info!("Token request for {}", credentials.email);

    let user = state
        .users
        .authenticate(&credentials.email, &credentials.password)
        .await
        .map_err(account_error)?
        .ok_or_else(|| {
            AuthError::Validation(FieldErrors::single(
                "non_field_errors",
                "Unable to authenticate with provided credentials",
            ))
        })?;

    let token = state.tokens.issue(user.id, &user.email).map_err(|e| {
        error!("Failed to issue token: {}", e);
        AuthError::InternalServerError
    })?;

    Ok(Json(TokenResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_token_expiry(),
    }))
}

/// Return the authenticated user's profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AuthResult<impl IntoResponse> {
    let user = state
        .users
        .find_by_id(auth.id)
        .await
        .map_err(account_error)?
        .ok_or(AuthError::NotFound)?;

    Ok(Json(UserResponse::from(user)))
}

/// Replace the authenticated user's profile; every field is required
pub async fn replace_profile(
    state: State<AppState>,
    auth: Extension<AuthUser>,
    WithRejection(Json(body), _): JsonBody,
) -> AuthResult<impl IntoResponse> {
    update_profile(state, auth, body, false).await
}

/// Partially update the authenticated user's profile
pub async fn patch_profile(
    state: State<AppState>,
    auth: Extension<AuthUser>,
    WithRejection(Json(body), _): JsonBody,
) -> AuthResult<impl IntoResponse> {
    update_profile(state, auth, body, true).await
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Value,
    partial: bool,
) -> AuthResult<Json<UserResponse>> {
    let fields = AccountFields::from_json(&body, !partial)?;

    info!("Updating profile for {}", auth.email);

    let changes = ProfileChanges {
        email: fields.email,
        name: fields.name,
        password: fields.password,
    };

    let user = state
        .users
        .update_profile(auth.id, changes)
        .await
        .map_err(account_error)?
        .ok_or(AuthError::NotFound)?;

    Ok(Json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{manager::UserManager, repositories::MemoryUserStore};
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use common::token::{JwtConfig, TokenService};
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let tokens = TokenService::new(&JwtConfig {
            secret: "an-insecure-secret-used-only-in-tests".to_string(),
            access_token_expiry: 300,
        })
        .unwrap();

        AppState {
            users: UserManager::new(Arc::new(MemoryUserStore::new())),
            tokens,
        }
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state());
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_user_success() {
        let state = test_state();
        let app = create_router(state.clone());
        let payload = json!({
            "email": "test@example.com",
            "password": "testpass123",
            "name": "test"
        });

        let (status, body) =
            send(&app, Method::POST, "/api/user/create/", None, Some(payload)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "test@example.com");
        assert_eq!(body["name"], "test");
        assert!(body.get("password").is_none());

        let user = state
            .users
            .authenticate("test@example.com", "testpass123")
            .await
            .unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_create_user_with_existing_email_fails() {
        let state = test_state();
        state
            .users
            .create_user("test@example.com", "test", "testpass123")
            .await
            .unwrap();
        let app = create_router(state);

        let payload = json!({
            "email": "test@example.com",
            "password": "testpass123",
            "name": "test"
        });
        let (status, body) =
            send(&app, Method::POST, "/api/user/create/", None, Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["email"].is_array());
    }

    #[tokio::test]
    async fn test_password_too_short_fails() {
        let state = test_state();
        let app = create_router(state.clone());
        let payload = json!({ "email": "test@example.com", "password": "pw", "name": "test" });

        let (status, body) =
            send(&app, Method::POST, "/api/user/create/", None, Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["password"].is_array());
        assert!(
            state
                .users
                .authenticate("test@example.com", "pw")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_create_user_missing_fields() {
        let app = create_router(test_state());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/user/create/",
            None,
            Some(json!({ "email": "" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["email"].is_array());
        assert!(body["password"].is_array());
        assert!(body["name"].is_array());
    }

    #[tokio::test]
    async fn test_create_token_for_user() {
        let state = test_state();
        let user = state
            .users
            .create_user("test@example.com", "test", "testpass123")
            .await
            .unwrap();
        let app = create_router(state.clone());

        let payload = json!({ "email": "test@example.com", "password": "testpass123" });
        let (status, body) =
            send(&app, Method::POST, "/api/user/token/", None, Some(payload)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "Bearer");
        let token = body["token"].as_str().unwrap();
        let claims = state.tokens.validate(token).unwrap();
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn test_create_token_bad_credentials() {
        let state = test_state();
        state
            .users
            .create_user("test@example.com", "test", "goodpass")
            .await
            .unwrap();
        let app = create_router(state);

        let payload = json!({ "email": "test@example.com", "password": "badpass" });
        let (status, body) =
            send(&app, Method::POST, "/api/user/token/", None, Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    async fn test_create_token_blank_password() {
        let app = create_router(test_state());
        let payload = json!({ "email": "test@example.com", "password": "" });
        let (status, body) =
            send(&app, Method::POST, "/api/user/token/", None, Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    async fn test_retrieve_user_unauthorized() {
        let app = create_router(test_state());
        let (status, _) = send(&app, Method::GET, "/api/user/me/", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/api/user/me/", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_retrieve_profile_success() {
        let state = test_state();
        let user = state
            .users
            .create_user("test@example.com", "test", "testpass123")
            .await
            .unwrap();
        let token = state.tokens.issue(user.id, &user.email).unwrap();
        let app = create_router(state);

        let (status, body) = send(&app, Method::GET, "/api/user/me/", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "email": "test@example.com", "name": "test" }));
    }

    #[tokio::test]
    async fn test_post_me_not_allowed() {
        let state = test_state();
        let user = state
            .users
            .create_user("test@example.com", "test", "testpass123")
            .await
            .unwrap();
        let token = state.tokens.issue(user.id, &user.email).unwrap();
        let app = create_router(state);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/user/me/",
            Some(&token),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_update_user_profile() {
        let state = test_state();
        let user = state
            .users
            .create_user("test@example.com", "test", "testpass123")
            .await
            .unwrap();
        let token = state.tokens.issue(user.id, &user.email).unwrap();
        let app = create_router(state.clone());

        let payload = json!({ "name": "updated name", "password": "newpassword123" });
        let (status, body) = send(
            &app,
            Method::PATCH,
            "/api/user/me/",
            Some(&token),
            Some(payload),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "updated name");
        assert!(
            state
                .users
                .authenticate("test@example.com", "newpassword123")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_put_profile_requires_all_fields() {
        let state = test_state();
        let user = state
            .users
            .create_user("test@example.com", "test", "testpass123")
            .await
            .unwrap();
        let token = state.tokens.issue(user.id, &user.email).unwrap();
        let app = create_router(state);

        let payload = json!({ "name": "only name" });
        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/user/me/",
            Some(&token),
            Some(payload),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["email"].is_array());
        assert!(body["password"].is_array());
    }

    #[tokio::test]
    async fn test_create_user_wrong_types() {
        let app = create_router(test_state());
        let payload = json!({ "email": 123, "password": null, "name": ["test"] });

        let (status, body) =
            send(&app, Method::POST, "/api/user/create/", None, Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["email"].is_array());
        assert_eq!(body["password"], json!(["This field may not be null."]));
        assert_eq!(body["name"], json!(["Not a valid string."]));
    }

    #[tokio::test]
    async fn test_create_token_wrong_types() {
        let app = create_router(test_state());
        let payload = json!({ "email": null, "password": {} });

        let (status, body) =
            send(&app, Method::POST, "/api/user/token/", None, Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["email"], json!(["This field may not be null."]));
        assert!(body["password"].is_array());
        assert!(body.get("token").is_none());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/user/token/",
            None,
            Some(json!([])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["non_field_errors"].is_array());
    }

    #[tokio::test]
    async fn test_update_profile_wrong_types() {
        let state = test_state();
        let user = state
            .users
            .create_user("test@example.com", "test", "testpass123")
            .await
            .unwrap();
        let token = state.tokens.issue(user.id, &user.email).unwrap();
        let app = create_router(state);

        let payload = json!({ "name": false });
        let (status, body) = send(
            &app,
            Method::PATCH,
            "/api/user/me/",
            Some(&token),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["name"].is_array());

        let payload = json!({ "email": 5, "password": "testpass123", "name": "test" });
        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/user/me/",
            Some(&token),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["email"].is_array());
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let app = create_router(test_state());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/user/create/")
            .header("content-type", "application/json")
            .body(Body::from("{\"email\": "))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }
}
