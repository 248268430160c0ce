//! JSON HTTP API for Pulse.
//!
//! Exposes an axum [`Router`] backed by any
//! [`pulse_core::store::AnalyticsStore`]. CORS, body limits and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = pulse_api::api_router(store.clone()).layer(cors);
//! ```

pub mod banners;
pub mod error;
pub mod events;
pub mod meta;
pub mod registrations;
pub mod stats;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use pulse_core::store::AnalyticsStore;

pub use error::ApiError;

/// Build a fully-materialised router for `store`.
///
/// Paths are absolute (`/api/...` plus `/healthz`), so the result is merged
/// rather than nested.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: AnalyticsStore + 'static,
{
  Router::new()
    .route("/healthz", get(meta::health))
    .route("/api/version", get(meta::version))
    .route("/api/sessions/start", post(meta::start_session))
    .route("/api/meta", get(meta::meta::<S>))
    // Collection
    .route("/api/events", post(events::ingest::<S>))
    .route("/api/pixel.gif", get(events::pixel::<S>))
    .route(
      "/api/registrations",
      get(registrations::list::<S>).post(registrations::create::<S>),
    )
    // Reporting
    .route("/api/stats", get(stats::handler::<S>))
    // Banner registry
    .route("/api/banners", get(banners::list::<S>).post(banners::create::<S>))
    .route(
      "/api/banners/{id}",
      put(banners::update::<S>).delete(banners::delete_one::<S>),
    )
    .with_state(store)
}

/// Treat absent and whitespace-only query values alike.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
  };
  use chrono::{DateTime, SecondsFormat, Utc};
  use pulse_core::{
    banner::{Banner, NewBanner},
    dedup::DedupProbe,
    event::{Event, NewEvent},
    registration::{NewRegistration, Registration, RegistrationQuery},
    store::{IngestOutcome, StoreError},
  };
  use pulse_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn make_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.unwrap())
  }

  async fn send(
    store: &Arc<SqliteStore>,
    method: Method,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        req = req.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = api_router(store.clone())
      .oneshot(req.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
  }

  async fn send_json(
    store: &Arc<SqliteStore>,
    method: Method,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let (status, _, bytes) = send(store, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  fn now_ts() -> String { Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true) }

  // ─── Events ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn batch_reports_batch_length() {
    let store = make_store().await;
    let ts = now_ts();
    let body = json!({ "events": [
      { "event_name": "game_start", "client_ts": ts, "game_id": "g1" },
      { "event_name": "win", "client_ts": ts, "game_id": "g1" },
      { "no_name": true },
    ]});
    let (status, resp) = send_json(&store, Method::POST, "/api/events", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, json!({ "ok": true, "ingested": 3 }));

    let (_, stats) = send_json(&store, Method::GET, "/api/stats?days=1", None).await;
    assert_eq!(stats["totals"]["starts"], 1);
    assert_eq!(stats["totals"]["wins"], 1);
  }

  #[tokio::test]
  async fn batch_rejects_bad_shapes() {
    let store = make_store().await;
    for body in [json!({}), json!({ "events": "nope" }), json!([1, 2])] {
      let (status, resp) =
        send_json(&store, Method::POST, "/api/events", Some(body)).await;
      assert_eq!(status, StatusCode::BAD_REQUEST);
      assert_eq!(resp, json!({ "error": "Invalid events batch" }));
    }

    let too_many: Vec<Value> =
      (0..501).map(|_| json!({ "event_name": "win" })).collect();
    let (status, _) = send_json(
      &store,
      Method::POST,
      "/api/events",
      Some(json!({ "events": too_many })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn pixel_returns_gif_and_records_event() {
    let store = make_store().await;
    let (status, headers, bytes) = send(
      &store,
      Method::GET,
      "/api/pixel.gif?event=banner_click&game_id=g9&url=https%3A%2F%2Fa.example",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/gif");
    assert_eq!(
      headers[header::CACHE_CONTROL],
      "no-store, no-cache, must-revalidate, proxy-revalidate"
    );
    assert_eq!(bytes, events::PIXEL_GIF);

    let (_, stats) =
      send_json(&store, Method::GET, "/api/stats?days=1&game_id=g9", None).await;
    assert_eq!(stats["totals"]["clicks"], 1);

    let (_, meta) = send_json(&store, Method::GET, "/api/meta", None).await;
    assert_eq!(meta["games"], json!(["g9"]));
  }

  #[tokio::test]
  async fn repeated_pixel_views_are_deduplicated() {
    let store = make_store().await;
    for _ in 0..3 {
      let (status, _, _) = send(
        &store,
        Method::GET,
        "/api/pixel.gif?event=banner_view&session_id=s1&url=https%3A%2F%2Fa.example",
        None,
      )
      .await;
      assert_eq!(status, StatusCode::OK);
    }
    let (_, stats) = send_json(&store, Method::GET, "/api/stats?days=1", None).await;
    assert_eq!(stats["totals"]["views"], 1);
  }

  // ─── Registrations ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn registration_round_trip() {
    let store = make_store().await;
    let (status, resp) = send_json(
      &store,
      Method::POST,
      "/api/registrations",
      Some(json!({
        "name": "Ada", "email": "ada@example.com", "phone": "555",
        "game_id": "g1", "score": 42.9,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, json!({ "ok": true }));

    let (status, resp) =
      send_json(&store, Method::GET, "/api/registrations?q=ADA&game_id=g1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = resp["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["score"], 42);

    let (_, resp) =
      send_json(&store, Method::GET, "/api/registrations?game_id=other", None).await;
    assert_eq!(resp["rows"], json!([]));
  }

  #[tokio::test]
  async fn registration_missing_fields() {
    let store = make_store().await;
    let (status, resp) = send_json(
      &store,
      Method::POST,
      "/api/registrations",
      Some(json!({ "name": "Ada", "email": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp, json!({ "error": "Missing fields" }));

    let (status, _) = send_json(&store, Method::POST, "/api/registrations", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ─── Stats ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn stats_series_is_dense_and_clamped() {
    let store = make_store().await;
    let (status, stats) =
      send_json(&store, Method::GET, "/api/stats?days=7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["series"].as_array().unwrap().len(), 7);
    assert_eq!(stats["rates"]["winRate"], 0.0);
    assert_eq!(stats["funnel"][0]["label"], "Views");

    let (_, stats) = send_json(&store, Method::GET, "/api/stats?days=9999", None).await;
    assert_eq!(stats["series"].as_array().unwrap().len(), 365);

    let (_, stats) = send_json(&store, Method::GET, "/api/stats?days=abc", None).await;
    assert_eq!(stats["series"].as_array().unwrap().len(), 28);
  }

  // ─── Banners ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn banner_lifecycle() {
    let store = make_store().await;
    let create = |id: &str, name: &str, url: &str| {
      json!({ "banner_id": id, "name": name, "url": url })
    };

    let (status, _) = send_json(
      &store,
      Method::POST,
      "/api/banners",
      Some(create("spring", "Zeta", "https://a.example/spring")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    send_json(
      &store,
      Method::POST,
      "/api/banners",
      Some(create("autumn", "Alpha", "https://a.example/autumn")),
    )
    .await;

    let (status, resp) = send_json(
      &store,
      Method::POST,
      "/api/banners",
      Some(create("spring", "Dup", "https://a.example/other")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(resp, json!({ "error": "banner_id already exists" }));

    let (_, list) = send_json(&store, Method::GET, "/api/banners", None).await;
    let rows = list["rows"].as_array().unwrap();
    assert_eq!(rows[0]["banner_id"], "autumn");
    let id = rows[1]["id"].as_i64().unwrap();

    let (_, meta) = send_json(&store, Method::GET, "/api/meta", None).await;
    assert_eq!(meta["banners"][0]["name"], "Alpha");
    assert_eq!(meta["banners"][1]["name"], "Zeta");

    let (status, _) = send_json(
      &store,
      Method::PUT,
      &format!("/api/banners/{id}"),
      Some(create("spring", "Spring", "https://a.example/spring-2")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
      send_json(&store, Method::DELETE, &format!("/api/banners/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) =
      send_json(&store, Method::DELETE, &format!("/api/banners/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn banner_validation_errors() {
    let store = make_store().await;
    let (status, resp) = send_json(
      &store,
      Method::POST,
      "/api/banners",
      Some(json!({ "banner_id": "x", "name": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp, json!({ "error": "Missing banner_id, name or url" }));

    let (status, resp) = send_json(
      &store,
      Method::PUT,
      "/api/banners/abc",
      Some(json!({ "banner_id": "x", "name": "X", "url": "https://x.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp, json!({ "error": "Invalid id" }));

    let (status, _) = send_json(
      &store,
      Method::PUT,
      "/api/banners/77",
      Some(json!({ "banner_id": "x", "name": "X", "url": "https://x.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ─── Storage failures ────────────────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  #[error("store offline")]
  struct Offline;

  impl StoreError for Offline {
    fn is_conflict(&self) -> bool { false }
  }

  /// A backend whose every call fails.
  struct OfflineStore;

  impl AnalyticsStore for OfflineStore {
    type Error = Offline;

    async fn ingest(&self, _: Vec<NewEvent>) -> Result<IngestOutcome, Offline> {
      Err(Offline)
    }
    async fn seen_recently(&self, _: &DedupProbe) -> Result<bool, Offline> {
      Err(Offline)
    }
    async fn events_since(&self, _: DateTime<Utc>) -> Result<Vec<Event>, Offline> {
      Err(Offline)
    }
    async fn game_ids(&self) -> Result<Vec<String>, Offline> { Err(Offline) }
    async fn record_registration(
      &self,
      _: NewRegistration,
    ) -> Result<Registration, Offline> {
      Err(Offline)
    }
    async fn list_registrations(
      &self,
      _: &RegistrationQuery,
    ) -> Result<Vec<Registration>, Offline> {
      Err(Offline)
    }
    async fn registrations_since(
      &self,
      _: DateTime<Utc>,
    ) -> Result<Vec<Registration>, Offline> {
      Err(Offline)
    }
    async fn list_banners(&self) -> Result<Vec<Banner>, Offline> { Err(Offline) }
    async fn create_banner(&self, _: NewBanner) -> Result<Banner, Offline> {
      Err(Offline)
    }
    async fn update_banner(
      &self,
      _: i64,
      _: NewBanner,
    ) -> Result<Option<Banner>, Offline> {
      Err(Offline)
    }
    async fn delete_banner(&self, _: i64) -> Result<bool, Offline> { Err(Offline) }
  }

  async fn send_offline(uri: &str, method: Method, body: Body) -> axum::response::Response {
    api_router(Arc::new(OfflineStore))
      .oneshot(
        Request::builder()
          .method(method)
          .uri(uri)
          .header(header::CONTENT_TYPE, "application/json")
          .body(body)
          .unwrap(),
      )
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn pixel_still_returns_gif_when_store_fails() {
    let resp = send_offline(
      "/api/pixel.gif?event=banner_view&session_id=s1",
      Method::GET,
      Body::empty(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/gif");
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], events::PIXEL_GIF);

    let resp = send_offline("/api/pixel.gif?event=win", Method::GET, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn batch_surfaces_store_failure() {
    let body = json!({ "events": [{ "event_name": "win" }] }).to_string();
    let resp = send_offline("/api/events", Method::POST, Body::from(body)).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "error": "store offline" }));
  }

  // ─── Misc ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_version_and_sessions() {
    let store = make_store().await;
    let (status, resp) = send_json(&store, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, json!({ "ok": true }));

    let (_, resp) = send_json(&store, Method::GET, "/api/version", None).await;
    assert_eq!(resp["version"], env!("CARGO_PKG_VERSION"));

    let (_, a) = send_json(&store, Method::POST, "/api/sessions/start", None).await;
    let (_, b) = send_json(&store, Method::POST, "/api/sessions/start", None).await;
    assert!(a["session_id"].as_str().is_some_and(|s| !s.is_empty()));
    assert_ne!(a["session_id"], b["session_id"]);
  }
}
