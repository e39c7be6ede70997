//! JSON view of the counter tables.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use crate::aggregator::Granularity;
use crate::api::middleware::error::ApiError;
use crate::api::models::CountersResponse;
use crate::app_state::AppState;

/// Returns every bucket of the `hour`, `day` or `week` table.
#[instrument(skip(state))]
pub async fn get_counters(
    State(state): State<AppState>,
    Path(granularity): Path<String>,
) -> Result<Json<CountersResponse>, ApiError> {
    let granularity: Granularity = granularity.parse().map_err(ApiError::BadRequest)?;
    let entries = state.aggregator.snapshot(granularity);
    Ok(Json(CountersResponse::new(granularity, entries)))
}
