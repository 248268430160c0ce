//! Small read-only endpoints: dashboard metadata, liveness, version and
//! session ids.

use std::sync::Arc;

use axum::{Json, extract::State};
use pulse_core::{banner::BannerSummary, store::AnalyticsStore};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct MetaResponse {
  pub banners: Vec<BannerSummary>,
  pub games:   Vec<String>,
}

/// `GET /api/meta`: filter options for the dashboard.
pub async fn meta<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<MetaResponse>, ApiError>
where
  S: AnalyticsStore,
{
  let mut banners: Vec<BannerSummary> = store
    .list_banners()
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .map(BannerSummary::from)
    .collect();
  banners.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.banner_id.cmp(&b.banner_id)));

  let games = store.game_ids().await.map_err(ApiError::store)?;
  Ok(Json(MetaResponse { banners, games }))
}

/// `GET /healthz`
pub async fn health() -> Json<Value> { Json(json!({ "ok": true })) }

/// `GET /api/version`
pub async fn version() -> Json<Value> {
  Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// `POST /api/sessions/start`: a fresh id for the client to tag events with.
pub async fn start_session() -> Json<Value> {
  Json(json!({ "session_id": Uuid::new_v4().to_string() }))
}
