//! Banner registry entries: the admin-managed list of tracked banners.
//!
//! Banners are not referenced by foreign key. Events and registrations link
//! to a banner softly, by carrying its `banner_id` in their `game_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  sanitize::{clip, scalar_string},
};

pub const MAX_BANNER_ID_LEN: usize = 120;
pub const MAX_BANNER_NAME_LEN: usize = 120;
pub const MAX_BANNER_URL_LEN: usize = 800;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
  pub id:         i64,
  pub created_at: DateTime<Utc>,
  pub banner_id:  String,
  pub name:       String,
  pub url:        String,
}

/// The subset of a banner the dashboard filter needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerSummary {
  pub banner_id: String,
  pub name:      String,
  pub url:       String,
}

impl From<Banner> for BannerSummary {
  fn from(b: Banner) -> Self {
    Self { banner_id: b.banner_id, name: b.name, url: b.url }
  }
}

/// Validated input for creating or replacing a banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBanner {
  pub banner_id: String,
  pub name:      String,
  pub url:       String,
}

impl NewBanner {
  /// Trim, cap and validate the three fields.
  pub fn new(banner_id: &str, name: &str, url: &str) -> Result<Self> {
    let banner_id = clip(banner_id.trim(), MAX_BANNER_ID_LEN);
    let name = clip(name.trim(), MAX_BANNER_NAME_LEN);
    let url = clip(url.trim(), MAX_BANNER_URL_LEN);

    if banner_id.is_empty() || name.is_empty() || url.is_empty() {
      return Err(Error::Validation("Missing banner_id, name or url".into()));
    }
    if !is_valid_banner_id(&banner_id) {
      return Err(Error::Validation(
        "banner_id should be letters/numbers/._-".into(),
      ));
    }
    if !has_http_scheme(&url) {
      return Err(Error::Validation("URL must start with http(s)://".into()));
    }

    Ok(Self { banner_id, name, url })
  }

  /// Validate a JSON body of the shape `{"banner_id","name","url"}`.
  pub fn from_json(body: &Value) -> Result<Self> {
    let field = |key: &str| scalar_string(body.get(key), usize::MAX).unwrap_or_default();
    Self::new(&field("banner_id"), &field("name"), &field("url"))
  }
}

/// `^[a-zA-Z0-9._-]+$`
pub fn is_valid_banner_id(id: &str) -> bool {
  !id.is_empty()
    && id
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// `^https?://`, case-insensitive.
pub fn has_http_scheme(url: &str) -> bool {
  let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
  lower.starts_with("http://") || lower.starts_with("https://")
}
