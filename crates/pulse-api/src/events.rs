//! Event collection endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/events` | Body: `{"events":[...]}`, at most 500 |
//! | `GET`  | `/api/pixel.gif` | One event from query params; always a GIF |

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::{HeaderMap, HeaderValue, header},
  response::{IntoResponse, Response},
};
use chrono::Utc;
use pulse_core::{
  dedup::DedupProbe,
  event::{MAX_BATCH_LEN, MAX_ID_LEN, NewEvent, parse_client_ts_str},
  sanitize::{clip, clip_non_empty},
  store::AnalyticsStore,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;

// ─── Batch ───────────────────────────────────────────────────────────────────

fn invalid_batch() -> ApiError { ApiError::BadRequest("Invalid events batch".into()) }

/// `POST /api/events`, body: `{"events":[{"event_name":"win",...}]}`
///
/// Malformed elements are skipped; the rest are stored as one batch.
pub async fn ingest<S>(
  State(store): State<Arc<S>>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: AnalyticsStore,
{
  let Ok(Json(body)) = body else { return Err(invalid_batch()) };
  let Some(batch) = body.get("events").and_then(Value::as_array) else {
    return Err(invalid_batch());
  };
  if batch.len() > MAX_BATCH_LEN {
    return Err(invalid_batch());
  }

  let events: Vec<NewEvent> = batch
    .iter()
    .filter_map(|raw| match NewEvent::from_json(raw) {
      Ok(event) => Some(event),
      Err(e) => {
        tracing::debug!(error = %e, "skipping malformed event");
        None
      }
    })
    .collect();

  let well_formed = events.len();
  let outcome = store.ingest(events).await.map_err(ApiError::store)?;
  tracing::debug!(
    received = batch.len(),
    skipped = batch.len() - well_formed,
    stored = outcome.stored,
    duplicates = outcome.duplicates,
    "ingested batch"
  );

  Ok(Json(json!({ "ok": true, "ingested": batch.len() })))
}

// ─── Pixel ───────────────────────────────────────────────────────────────────

/// A transparent 1×1 GIF.
pub const PIXEL_GIF: &[u8] = &[
  71, 73, 70, 56, 57, 97, 1, 0, 1, 0, 128, 0, 0, 0, 0, 0, 255, 255, 255, 44,
  0, 0, 0, 0, 1, 0, 1, 0, 0, 2, 1, 76, 0, 59,
];

const MAX_TS_LEN: usize = 60;
const MAX_URL_LEN: usize = 500;
const MAX_EXTRA_LEN: usize = 900;

#[derive(Debug, Default, Deserialize)]
pub struct PixelParams {
  pub event:             Option<String>,
  pub event_name:        Option<String>,
  pub campaign_id:       Option<String>,
  pub game_id:           Option<String>,
  pub session_id:        Option<String>,
  pub anon:              Option<String>,
  pub anonymous_user_id: Option<String>,
  pub ts:                Option<String>,
  pub url:               Option<String>,
  #[serde(rename = "ref")]
  pub referrer:          Option<String>,
  pub extra:             Option<String>,
}

fn first_present<'a>(a: &'a Option<String>, b: &'a Option<String>) -> Option<&'a str> {
  [a, b]
    .into_iter()
    .filter_map(|v| v.as_deref())
    .find(|s| !s.is_empty())
}

impl PixelParams {
  /// Build the event this request describes. `referer` is the request's
  /// `Referer` header, used when no `url` parameter is given.
  pub fn into_event(self, referer: Option<&str>) -> NewEvent {
    let name = first_present(&self.event, &self.event_name).unwrap_or("pixel");
    let mut event = NewEvent::new(name);

    let id = |v: Option<&str>| v.and_then(|s| clip_non_empty(s, MAX_ID_LEN));
    event.campaign_id = id(self.campaign_id.as_deref());
    event.game_id = id(self.game_id.as_deref());
    event.session_id = id(self.session_id.as_deref());
    event.anonymous_user_id = id(first_present(&self.anon, &self.anonymous_user_id));

    event.client_ts = Some(
      self
        .ts
        .as_deref()
        .and_then(|ts| parse_client_ts_str(&clip(ts, MAX_TS_LEN)))
        .unwrap_or_else(Utc::now),
    );

    let url = self
      .url
      .as_deref()
      .filter(|s| !s.is_empty())
      .or(referer)
      .and_then(|s| clip_non_empty(s, MAX_URL_LEN));
    let referrer =
      self.referrer.as_deref().and_then(|s| clip_non_empty(s, MAX_URL_LEN));
    let extra = self.extra.as_deref().and_then(|s| clip_non_empty(s, MAX_EXTRA_LEN));
    event.props = json!({ "url": url, "referrer": referrer, "extra": extra });

    event
  }
}

/// `GET /api/pixel.gif?event=banner_view&game_id=...`
///
/// Repeated views are answered without a write. Storage failures are logged
/// and never surface to the client.
pub async fn pixel<S>(
  State(store): State<Arc<S>>,
  headers: HeaderMap,
  params: Result<Query<PixelParams>, QueryRejection>,
) -> Response
where
  S: AnalyticsStore,
{
  let params = params.map(|Query(p)| p).unwrap_or_default();
  let referer = headers.get(header::REFERER).and_then(|v| v.to_str().ok());
  let event = params.into_event(referer);

  let duplicate = match DedupProbe::for_event(&event, Utc::now()) {
    Some(probe) => store.seen_recently(&probe).await.unwrap_or_else(|e| {
      tracing::warn!(error = %e, "pixel dedup lookup failed");
      false
    }),
    None => false,
  };

  if duplicate {
    tracing::debug!(event_name = %event.event_name, "pixel view already recorded");
  } else if let Err(e) = store.ingest(vec![event]).await {
    tracing::warn!(error = %e, "pixel event not stored");
  }

  (
    [
      (header::CONTENT_TYPE, HeaderValue::from_static("image/gif")),
      (
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
      ),
    ],
    PIXEL_GIF,
  )
    .into_response()
}
