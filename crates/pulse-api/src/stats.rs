//! Handler for `GET /api/stats`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::Utc;
use pulse_core::{
  stats::{StatsQuery, StatsReport, aggregate},
  store::AnalyticsStore,
};
use serde::Deserialize;

use crate::{error::ApiError, non_blank};

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
  pub days:       Option<String>,
  pub banner_id:  Option<String>,
  pub banner_url: Option<String>,
  pub game_id:    Option<String>,
}

impl From<StatsParams> for StatsQuery {
  fn from(p: StatsParams) -> Self {
    Self {
      days:       StatsQuery::parse_days(p.days.as_deref()),
      banner_id:  non_blank(p.banner_id),
      banner_url: non_blank(p.banner_url),
      game_id:    non_blank(p.game_id),
    }
  }
}

/// `GET /api/stats[?days=N&banner_id=&banner_url=&game_id=]`
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<StatsParams>,
) -> Result<Json<StatsReport>, ApiError>
where
  S: AnalyticsStore,
{
  let query = StatsQuery::from(params);
  let now = Utc::now();
  let since = query.window_start(now);

  let events = store.events_since(since).await.map_err(ApiError::store)?;
  let registrations =
    store.registrations_since(since).await.map_err(ApiError::store)?;

  Ok(Json(aggregate(&query, &events, &registrations, now)))
}
