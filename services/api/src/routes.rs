//! API routes for the recipe service

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::extract::WithRejection;
use common::validation::FieldErrors;
use serde_json::Value;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    media::MEDIA_URL,
    middleware::{AuthUser, auth_middleware},
    models::{Attribute, AttributeKind},
    serializers::{
        AttributeQuery, ImageResponse, RecipeDetail, RecipeQuery, RecipeSummary, attribute_name,
        new_recipe, recipe_changes,
    },
    state::AppState,
};

/// Multipart field carrying the uploaded image
const IMAGE_FIELD: &str = "image";

// Extractors whose rejections render as `ApiError`
type JsonBody = WithRejection<Json<Value>, ApiError>;
type RecordId = WithRejection<Path<i64>, ApiError>;
type Upload = WithRejection<Multipart, ApiError>;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/recipe/recipes/",
            get(list_recipes).post(create_recipe),
        )
        .route(
            "/api/recipe/recipes/:id/",
            get(get_recipe)
                .put(replace_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/api/recipe/recipes/:id/upload-image/",
            post(upload_image).layer(DefaultBodyLimit::max(state.media.max_upload_bytes())),
        )
        .merge(attribute_routes(AttributeKind::Tag))
        .merge(attribute_routes(AttributeKind::Ingredient))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .nest_service(MEDIA_URL, ServeDir::new(state.media.root()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Tags and ingredients share their endpoints
fn attribute_routes(kind: AttributeKind) -> Router<AppState> {
    let collection = format!("/api/recipe/{}/", kind.field());
    let member = format!("/api/recipe/{}/:id/", kind.field());

    Router::new()
        .route(
            &collection,
            get(
                move |state: State<AppState>,
                      auth: Extension<AuthUser>,
                      query: Query<AttributeQuery>| {
                    list_attributes(state, auth, query, kind)
                },
            ),
        )
        .route(
            &member,
            put(
                move |state: State<AppState>,
                      auth: Extension<AuthUser>,
                      id: RecordId,
                      body: JsonBody| {
                    update_attribute(state, auth, id, body, kind, false)
                },
            )
            .patch(
                move |state: State<AppState>,
                      auth: Extension<AuthUser>,
                      id: RecordId,
                      body: JsonBody| {
                    update_attribute(state, auth, id, body, kind, true)
                },
            )
            .delete(
                move |state: State<AppState>, auth: Extension<AuthUser>, id: RecordId| {
                    delete_attribute(state, auth, id, kind)
                },
            ),
        )
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.store.health_check().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "api-service"
        })),
    )
}

fn store_error(e: anyhow::Error) -> ApiError {
    ApiError::internal("Store operation failed", e)
}

/// List the caller's recipes, optionally filtered by tag and ingredient IDs
pub async fn list_recipes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<RecipeQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = query.filter()?;

    let recipes = state
        .store
        .list_recipes(auth.id, &filter)
        .await
        .map_err(store_error)?;

    Ok(Json(
        recipes.iter().map(RecipeSummary::from).collect::<Vec<_>>(),
    ))
}

/// Create a recipe owned by the caller
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Json(body), _): JsonBody,
) -> ApiResult<impl IntoResponse> {
    let new_recipe = new_recipe(&body)?;

    let recipe = state
        .store
        .create_recipe(auth.id, &new_recipe)
        .await
        .map_err(store_error)?;

    info!("{} created recipe {}", auth.email, recipe.id);

    Ok((StatusCode::CREATED, Json(RecipeDetail::from(&recipe))))
}

/// Get one of the caller's recipes
pub async fn get_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Path(id), _): RecordId,
) -> ApiResult<impl IntoResponse> {
    let recipe = state
        .store
        .find_recipe(auth.id, id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(RecipeDetail::from(&recipe)))
}

/// Fully update one of the caller's recipes
pub async fn replace_recipe(
    state: State<AppState>,
    auth: Extension<AuthUser>,
    id: RecordId,
    WithRejection(Json(body), _): JsonBody,
) -> ApiResult<impl IntoResponse> {
    update_recipe(state, auth, id, body, false).await
}

/// Partially update one of the caller's recipes
pub async fn patch_recipe(
    state: State<AppState>,
    auth: Extension<AuthUser>,
    id: RecordId,
    WithRejection(Json(body), _): JsonBody,
) -> ApiResult<impl IntoResponse> {
    update_recipe(state, auth, id, body, true).await
}

async fn update_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Path(id), _): RecordId,
    body: Value,
    partial: bool,
) -> ApiResult<Json<RecipeDetail>> {
    state
        .store
        .find_recipe(auth.id, id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;

    let changes = recipe_changes(&body, partial)?;

    let recipe = state
        .store
        .update_recipe(auth.id, id, &changes)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;

    info!("{} updated recipe {}", auth.email, id);

    Ok(Json(RecipeDetail::from(&recipe)))
}

/// Delete one of the caller's recipes
pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Path(id), _): RecordId,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .store
        .delete_recipe(auth.id, id)
        .await
        .map_err(store_error)?;

    if !deleted {
        return Err(ApiError::NotFound);
    }

    info!("{} deleted recipe {}", auth.email, id);
    Ok(StatusCode::NO_CONTENT)
}

/// Attach an uploaded image to one of the caller's recipes
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Path(id), _): RecordId,
    WithRejection(mut multipart, _): Upload,
) -> ApiResult<impl IntoResponse> {
    state
        .store
        .find_recipe(auth.id, id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        let errors = FieldErrors::single(IMAGE_FIELD, "No file was submitted.");
        return Err(errors.into());
    };

    let path = state
        .media
        .save_recipe_image(filename.as_deref(), &bytes)
        .await
        .map_err(|e| ApiError::internal("Failed to store image", e))?
        .ok_or_else(|| {
            FieldErrors::single(
                IMAGE_FIELD,
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            )
        })?;

    let recipe = state
        .store
        .set_recipe_image(auth.id, id, &path)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;

    info!("{} uploaded an image for recipe {}", auth.email, id);

    Ok(Json(ImageResponse::from(&recipe)))
}

async fn list_attributes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<AttributeQuery>,
    kind: AttributeKind,
) -> ApiResult<Json<Vec<Attribute>>> {
    let assigned_only = query.assigned_only()?;

    let attributes = state
        .store
        .list_attributes(kind, auth.id, assigned_only)
        .await
        .map_err(store_error)?;

    Ok(Json(attributes))
}

async fn update_attribute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Path(id), _): RecordId,
    WithRejection(Json(body), _): JsonBody,
    kind: AttributeKind,
    partial: bool,
) -> ApiResult<Json<Attribute>> {
    let existing = state
        .store
        .find_attribute(kind, auth.id, id)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;

    let Some(name) = attribute_name(&body, kind, partial)? else {
        return Ok(Json(existing));
    };

    let attribute = state
        .store
        .rename_attribute(kind, auth.id, id, &name)
        .await
        .map_err(store_error)?
        .ok_or(ApiError::NotFound)?;

    info!("{} renamed {} {}", auth.email, kind.field(), id);

    Ok(Json(attribute))
}

async fn delete_attribute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Path(id), _): RecordId,
    kind: AttributeKind,
) -> ApiResult<StatusCode> {
    let deleted = state
        .store
        .delete_attribute(kind, auth.id, id)
        .await
        .map_err(store_error)?;

    if !deleted {
        return Err(ApiError::NotFound);
    }

    info!("{} deleted {} {}", auth.email, kind.field(), id);
    Ok(StatusCode::NO_CONTENT)
}
