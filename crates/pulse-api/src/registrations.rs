//! Handlers for `/api/registrations`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/registrations` | Body: name, email, phone required |
//! | `GET`  | `/api/registrations` | Optional `?q=&banner_id=&game_id=` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State, rejection::JsonRejection},
};
use pulse_core::{
  registration::{NewRegistration, Registration, RegistrationQuery},
  store::AnalyticsStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{error::ApiError, non_blank};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /api/registrations`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: AnalyticsStore,
{
  let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
  let input = NewRegistration::from_json(&body)?;
  let saved = store.record_registration(input).await.map_err(ApiError::store)?;
  tracing::info!(id = saved.id, game_id = ?saved.game_id, "registration recorded");
  Ok(Json(json!({ "ok": true })))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub q:         Option<String>,
  pub banner_id: Option<String>,
  pub game_id:   Option<String>,
}

impl From<ListParams> for RegistrationQuery {
  fn from(p: ListParams) -> Self {
    Self {
      q:         non_blank(p.q),
      banner_id: non_blank(p.banner_id),
      game_id:   non_blank(p.game_id),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub rows: Vec<Registration>,
}

/// `GET /api/registrations[?q=<text>&banner_id=<id>&game_id=<id>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError>
where
  S: AnalyticsStore,
{
  let query = RegistrationQuery::from(params);
  let rows = store.list_registrations(&query).await.map_err(ApiError::store)?;
  Ok(Json(ListResponse { rows }))
}
