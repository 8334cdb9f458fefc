use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use partforge_core::DomainError;
use partforge_infra::{AddStockError, CatalogError, CreatePartError};
use partforge_parts::{OperationError, ValidationError};

pub fn create_error_to_response(err: CreatePartError) -> axum::response::Response {
    match err {
        CreatePartError::Validation(e) => validation_error_to_response(e),
        CreatePartError::Catalog(e) => catalog_error_to_response(e),
    }
}

pub fn add_stock_error_to_response(err: AddStockError) -> axum::response::Response {
    match err {
        AddStockError::Operation(e) => operation_error_to_response(e),
        AddStockError::Catalog(e) => catalog_error_to_response(e),
    }
}

fn validation_error_to_response(err: ValidationError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        ValidationError::EmptyName => json_error(StatusCode::BAD_REQUEST, "empty_name", message),
        ValidationError::MissingBillOfMaterials => {
            json_error(StatusCode::BAD_REQUEST, "missing_bill_of_materials", message)
        }
        ValidationError::CircularDependency(_) => {
            json_error(StatusCode::BAD_REQUEST, "circular_dependency", message)
        }
        ValidationError::UnknownSubPart(_) => {
            json_error(StatusCode::BAD_REQUEST, "unknown_sub_part", message)
        }
        ValidationError::DuplicatePartId(_) => {
            json_error(StatusCode::CONFLICT, "duplicate_part_id", message)
        }
    }
}

fn operation_error_to_response(err: OperationError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        OperationError::PartNotFound(_) => json_error(StatusCode::NOT_FOUND, "part_not_found", message),
        OperationError::InvalidQuantity(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_quantity", message)
        }
        OperationError::SubPartNotFound(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "sub_part_not_found", message)
        }
        OperationError::InsufficientSubStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_sub_stock", message)
        }
        OperationError::QuantityOverflow(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "quantity_overflow", message)
        }
        OperationError::CircularBom(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "circular_bom", message)
        }
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    tracing::error!(error = %err, "catalog failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "catalog_error", err.to_string())
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
