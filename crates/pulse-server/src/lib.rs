//! HTTP service assembly for Pulse.
//!
//! Wraps the [`pulse_api`] router with CORS, a request body limit and
//! request tracing. The binary in `main.rs` handles configuration loading
//! and serving.

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::{HeaderValue, Method, header},
};
use pulse_core::store::AnalyticsStore;
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, Any, CorsLayer},
  limit::RequestBodyLimitLayer,
  trace::TraceLayer,
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `pulse.toml` and
/// `PULSE_*` environment variables. Every key is optional.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// `"*"` anywhere in the list allows every origin.
  pub allowed_origins: Vec<String>,
  pub max_body_bytes:  usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "0.0.0.0".to_owned(),
      port:            3000,
      store_path:      PathBuf::from("data.sqlite"),
      allowed_origins: vec!["*".to_owned()],
      max_body_bytes:  512 * 1024,
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete application router for `store`.
pub fn app<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: AnalyticsStore + 'static,
{
  pulse_api::api_router(store)
    .layer(cors_layer(&config.allowed_origins))
    .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
    .layer(TraceLayer::new_for_http())
}

/// CORS for the dashboard and embedding pages. Origins that are not valid
/// header values are ignored.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
  let base = CorsLayer::new()
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
    .allow_headers([header::CONTENT_TYPE]);

  if origins.iter().any(|o| o.trim() == "*") {
    return base.allow_origin(Any);
  }

  let list: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|o| match HeaderValue::from_str(o.trim()) {
      Ok(v) => Some(v),
      Err(_) => {
        tracing::warn!(origin = %o, "ignoring invalid CORS origin");
        None
      }
    })
    .collect();
  base.allow_origin(AllowOrigin::list(list))
}
