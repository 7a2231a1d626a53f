//! Catalog endpoints constraining region and city selection.

use axum::extract::Path;
use axum::Json;

use crate::errors::{AppError, ErrorResponse};
use crate::services::catalog;

/// List all selectable regions, sorted.
#[utoipa::path(
    get,
    path = "/api/v1/regions",
    tag = "Catalog",
    responses(
        (status = 200, description = "Sorted region names", body = Vec<String>),
    )
)]
pub async fn list_regions() -> Json<Vec<String>> {
    Json(catalog::list_regions().into_iter().map(String::from).collect())
}

/// List the cities of a region, sorted.
#[utoipa::path(
    get,
    path = "/api/v1/regions/{region}/cities",
    tag = "Catalog",
    params(
        ("region" = String, Path, description = "Region name (e.g. \"NCR\")"),
    ),
    responses(
        (status = 200, description = "Sorted city names", body = Vec<String>),
        (status = 404, description = "Region not found", body = ErrorResponse),
    )
)]
pub async fn list_cities(Path(region): Path<String>) -> Result<Json<Vec<String>>, AppError> {
    let cities = catalog::list_cities(&region)
        .ok_or_else(|| AppError::NotFound(format!("Region '{}' not found", region)))?;
    Ok(Json(cities.into_iter().map(String::from).collect()))
}
