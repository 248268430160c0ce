//! Registrations captured at the end of a game. Append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  event::MAX_ID_LEN,
  sanitize::{clip, scalar_string},
};

/// Upper bound on name, email and phone, in characters.
pub const MAX_CONTACT_LEN: usize = 200;

/// Most rows a registration listing ever returns.
pub const MAX_LISTED: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
  pub id:          i64,
  pub created_at:  DateTime<Utc>,
  pub session_id:  Option<String>,
  pub campaign_id: Option<String>,
  pub game_id:     Option<String>,
  pub name:        String,
  pub email:       String,
  pub phone:       String,
  pub score:       Option<i64>,
  pub duration_ms: Option<i64>,
}

/// Input to [`crate::store::AnalyticsStore::record_registration`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRegistration {
  pub session_id:  Option<String>,
  pub campaign_id: Option<String>,
  pub game_id:     Option<String>,
  pub name:        String,
  pub email:       String,
  pub phone:       String,
  pub score:       Option<i64>,
  pub duration_ms: Option<i64>,
}

impl NewRegistration {
  /// Validate a registration form body. `name`, `email` and `phone` are
  /// required; `score` and `duration_ms` are kept only when numeric.
  pub fn from_json(body: &Value) -> Result<Self> {
    let field = |key: &str| {
      scalar_string(body.get(key), usize::MAX)
        .map(|s| clip(s.trim(), MAX_CONTACT_LEN))
        .filter(|s| !s.is_empty())
    };

    let (Some(name), Some(email), Some(phone)) =
      (field("name"), field("email"), field("phone"))
    else {
      return Err(Error::Validation("Missing fields".into()));
    };

    Ok(Self {
      session_id: scalar_string(body.get("session_id"), MAX_ID_LEN),
      campaign_id: scalar_string(body.get("campaign_id"), MAX_ID_LEN),
      game_id: scalar_string(body.get("game_id"), MAX_ID_LEN),
      name,
      email,
      phone,
      score: integer(body.get("score")),
      duration_ms: integer(body.get("duration_ms")),
    })
  }
}

fn integer(value: Option<&Value>) -> Option<i64> {
  let n = value?.as_number()?;
  n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))
}

/// Filters for [`crate::store::AnalyticsStore::list_registrations`].
#[derive(Debug, Clone, Default)]
pub struct RegistrationQuery {
  /// Case-insensitive substring of name, email or phone.
  pub q:         Option<String>,
  /// Exact match against `game_id` (banners are soft-linked through it).
  pub banner_id: Option<String>,
  pub game_id:   Option<String>,
}

impl RegistrationQuery {
  /// Whether `reg` contains the `q` text in its name, email or phone,
  /// compared with Unicode lowercasing. Always true without `q`.
  pub fn matches_text(&self, reg: &Registration) -> bool {
    let Some(needle) = self.q.as_deref().map(str::to_lowercase) else {
      return true;
    };
    [&reg.name, &reg.email, &reg.phone]
      .iter()
      .any(|field| field.to_lowercase().contains(&needle))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn requires_contact_fields() {
    let err = NewRegistration::from_json(&json!({ "name": "A", "email": "a@b" }))
      .unwrap_err();
    assert_eq!(err.to_string(), "Missing fields");

    assert!(
      NewRegistration::from_json(&json!({ "name": " ", "email": "a@b", "phone": "1" }))
        .is_err()
    );
  }

  #[test]
  fn keeps_numeric_score_only() {
    let reg = NewRegistration::from_json(&json!({
      "name": "Anna", "email": "anna@example.com", "phone": "5551234",
      "score": 12.9, "duration_ms": "fast", "game_id": "memory"
    }))
    .unwrap();

    assert_eq!(reg.score, Some(12));
    assert_eq!(reg.duration_ms, None);
    assert_eq!(reg.game_id.as_deref(), Some("memory"));
    assert_eq!(reg.session_id, None);
  }

  #[test]
  fn text_match_folds_non_ascii_case() {
    let reg = Registration {
      id:          1,
      created_at:  Utc::now(),
      session_id:  None,
      campaign_id: None,
      game_id:     None,
      name:        "Þórður".into(),
      email:       "thordur@example.is".into(),
      phone:       "5551234".into(),
      score:       None,
      duration_ms: None,
    };
    let query = |q: &str| RegistrationQuery { q: Some(q.into()), ..Default::default() };

    assert!(query("ÞÓR").matches_text(&reg));
    assert!(query("þór").matches_text(&reg));
    assert!(query("EXAMPLE.IS").matches_text(&reg));
    assert!(!query("anna").matches_text(&reg));
    assert!(RegistrationQuery::default().matches_text(&reg));
  }
}
