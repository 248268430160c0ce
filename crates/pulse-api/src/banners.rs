//! Handlers for `/api/banners` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/api/banners` | Newest first |
//! | `POST`   | `/api/banners` | Body: `{"banner_id","name","url"}`; 409 on duplicate |
//! | `PUT`    | `/api/banners/{id}` | Replaces all three fields; 404 if absent |
//! | `DELETE` | `/api/banners/{id}` | 404 if absent |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use pulse_core::{
  banner::{Banner, NewBanner},
  store::AnalyticsStore,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::ApiError;

fn parse_id(raw: &str) -> Result<i64, ApiError> {
  raw
    .trim()
    .parse::<i64>()
    .ok()
    .filter(|id| *id > 0)
    .ok_or_else(|| ApiError::BadRequest("Invalid id".into()))
}

fn parse_body(body: Result<Json<Value>, JsonRejection>) -> Result<NewBanner, ApiError> {
  let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
  Ok(NewBanner::from_json(&body)?)
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub rows: Vec<Banner>,
}

/// `GET /api/banners`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<ListResponse>, ApiError>
where
  S: AnalyticsStore,
{
  let rows = store.list_banners().await.map_err(ApiError::store)?;
  Ok(Json(ListResponse { rows }))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /api/banners`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: AnalyticsStore,
{
  let input = parse_body(body)?;
  let banner = store.create_banner(input).await.map_err(ApiError::store)?;
  tracing::info!(id = banner.id, banner_id = %banner.banner_id, "banner created");
  Ok(Json(json!({ "ok": true })))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT /api/banners/{id}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: AnalyticsStore,
{
  let id = parse_id(&id)?;
  let input = parse_body(body)?;
  store
    .update_banner(id, input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("banner {id} not found")))?;
  Ok(Json(json!({ "ok": true })))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /api/banners/{id}`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
  S: AnalyticsStore,
{
  let id = parse_id(&id)?;
  if !store.delete_banner(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("banner {id} not found")));
  }
  tracing::info!(id, "banner deleted");
  Ok(Json(json!({ "ok": true })))
}
