use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use partforge_core::PartId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_parts).post(create_part))
        .route("/:id", get(get_part))
        .route("/:id/stock", post(add_stock))
}

pub async fn create_part(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreatePartRequest>,
) -> axum::response::Response {
    let new_part = match body.into_new_part() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.create_part(new_part).await {
        Ok(part) => (StatusCode::CREATED, Json(dto::part_to_json(&part))).into_response(),
        Err(e) => errors::create_error_to_response(e),
    }
}

pub async fn add_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddStockRequest>,
) -> axum::response::Response {
    let part_id = match PartId::new(id) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.add_stock(&part_id, body.quantity).await {
        Ok(part) => (StatusCode::OK, Json(dto::part_to_json(&part))).into_response(),
        Err(e) => errors::add_stock_error_to_response(e),
    }
}

pub async fn list_parts(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.list_all().await {
        Ok(parts) => {
            let body: Vec<_> = parts.iter().map(dto::part_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn get_part(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let part_id = match PartId::new(id) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.get(&part_id).await {
        Ok(Some(part)) => (StatusCode::OK, Json(dto::part_to_json(&part))).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "part_not_found",
            format!("part not found: {part_id}"),
        ),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
