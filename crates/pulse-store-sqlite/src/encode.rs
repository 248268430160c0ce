//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with millisecond precision
//! and a `Z` suffix, which keeps lexical and chronological order identical.
//! Event props are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use pulse_core::{
  banner::Banner,
  dedup::{DedupProbe, Identity},
  event::{Event, NewEvent},
  registration::Registration,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// An event ready to be bound to the `INSERT` statement, plus its dedup probe
/// if it is subject to one.
pub struct EncodedEvent {
  pub client_ts:         Option<String>,
  pub campaign_id:       Option<String>,
  pub game_id:           Option<String>,
  pub session_id:        Option<String>,
  pub anonymous_user_id: Option<String>,
  pub event_name:        String,
  pub props:             String,
  pub probe:             Option<EncodedProbe>,
}

impl EncodedEvent {
  pub fn new(event: NewEvent, received_at: DateTime<Utc>) -> Result<Self> {
    let probe = DedupProbe::for_event(&event, received_at)
      .as_ref()
      .map(EncodedProbe::new);

    Ok(Self {
      client_ts: event.client_ts.map(encode_dt),
      campaign_id: event.campaign_id,
      game_id: event.game_id,
      session_id: event.session_id,
      anonymous_user_id: event.anonymous_user_id,
      event_name: event.event_name,
      props: serde_json::to_string(&event.props)?,
      probe,
    })
  }
}

/// Which identity column a dedup probe matches on.
#[derive(Clone, Copy)]
pub enum IdentityColumn {
  Session,
  Anonymous,
}

/// A [`DedupProbe`] with its window rendered as column values.
pub struct EncodedProbe {
  pub event_name: String,
  pub column:     IdentityColumn,
  pub identity:   String,
  pub since:      String,
  pub until:      String,
}

impl EncodedProbe {
  pub fn new(probe: &DedupProbe) -> Self {
    let (column, identity) = match &probe.identity {
      Identity::Session(s) => (IdentityColumn::Session, s.clone()),
      Identity::Anonymous(a) => (IdentityColumn::Anonymous, a.clone()),
    };
    let (since, until) = probe.window();

    Self {
      event_name: probe.event_name.clone(),
      column,
      identity,
      since: encode_dt(since),
      until: encode_dt(until),
    }
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `events` row.
pub struct RawEvent {
  pub id:                i64,
  pub received_at:       String,
  pub client_ts:         Option<String>,
  pub campaign_id:       Option<String>,
  pub game_id:           Option<String>,
  pub session_id:        Option<String>,
  pub anonymous_user_id: Option<String>,
  pub event_name:        String,
  pub props:             String,
}

impl RawEvent {
  pub const COLUMNS: &'static str = "id, received_at, client_ts, campaign_id, game_id, \
     session_id, anonymous_user_id, event_name, props";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      received_at:       row.get(1)?,
      client_ts:         row.get(2)?,
      campaign_id:       row.get(3)?,
      game_id:           row.get(4)?,
      session_id:        row.get(5)?,
      anonymous_user_id: row.get(6)?,
      event_name:        row.get(7)?,
      props:             row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      id:                self.id,
      received_at:       decode_dt(&self.received_at)?,
      client_ts:         self.client_ts.as_deref().map(decode_dt).transpose()?,
      campaign_id:       self.campaign_id,
      game_id:           self.game_id,
      session_id:        self.session_id,
      anonymous_user_id: self.anonymous_user_id,
      event_name:        self.event_name,
      props:             serde_json::from_str(&self.props)?,
    })
  }
}

/// Raw values read directly from a `registrations` row.
pub struct RawRegistration {
  pub id:          i64,
  pub created_at:  String,
  pub session_id:  Option<String>,
  pub campaign_id: Option<String>,
  pub game_id:     Option<String>,
  pub name:        String,
  pub email:       String,
  pub phone:       String,
  pub score:       Option<i64>,
  pub duration_ms: Option<i64>,
}

impl RawRegistration {
  pub const COLUMNS: &'static str = "id, created_at, session_id, campaign_id, game_id, \
     name, email, phone, score, duration_ms";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      created_at:  row.get(1)?,
      session_id:  row.get(2)?,
      campaign_id: row.get(3)?,
      game_id:     row.get(4)?,
      name:        row.get(5)?,
      email:       row.get(6)?,
      phone:       row.get(7)?,
      score:       row.get(8)?,
      duration_ms: row.get(9)?,
    })
  }

  pub fn into_registration(self) -> Result<Registration> {
    Ok(Registration {
      id:          self.id,
      created_at:  decode_dt(&self.created_at)?,
      session_id:  self.session_id,
      campaign_id: self.campaign_id,
      game_id:     self.game_id,
      name:        self.name,
      email:       self.email,
      phone:       self.phone,
      score:       self.score,
      duration_ms: self.duration_ms,
    })
  }
}

/// Raw values read directly from a `banners` row.
pub struct RawBanner {
  pub id:         i64,
  pub created_at: String,
  pub banner_id:  String,
  pub name:       String,
  pub url:        String,
}

impl RawBanner {
  pub const COLUMNS: &'static str = "id, created_at, banner_id, name, url";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      created_at: row.get(1)?,
      banner_id:  row.get(2)?,
      name:       row.get(3)?,
      url:        row.get(4)?,
    })
  }

  pub fn into_banner(self) -> Result<Banner> {
    Ok(Banner {
      id:         self.id,
      created_at: decode_dt(&self.created_at)?,
      banner_id:  self.banner_id,
      name:       self.name,
      url:        self.url,
    })
  }
}
