//! [`SqliteStore`], the SQLite implementation of [`AnalyticsStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{ErrorCode, OptionalExtension as _};

use pulse_core::{
  banner::{Banner, NewBanner},
  dedup::DedupProbe,
  event::{Event, NewEvent},
  registration::{MAX_LISTED, NewRegistration, Registration, RegistrationQuery},
  store::{AnalyticsStore, IngestOutcome},
};

use crate::{
  Error, Result,
  encode::{
    EncodedEvent, EncodedProbe, IdentityColumn, RawBanner, RawEvent,
    RawRegistration, encode_dt,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Pulse analytics store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Server time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(3) }

// ─── Statement helpers (run on the connection thread) ────────────────────────

/// The "seen recently" query. A stored event without a client timestamp is
/// compared by its receive time.
fn probe_matches(
  conn: &rusqlite::Connection,
  probe: &EncodedProbe,
) -> rusqlite::Result<bool> {
  let sql = match probe.column {
    IdentityColumn::Session => {
      "SELECT 1 FROM events
       WHERE event_name = ?1 AND session_id = ?2
         AND COALESCE(client_ts, received_at) >= ?3
         AND COALESCE(client_ts, received_at) <= ?4
       LIMIT 1"
    }
    IdentityColumn::Anonymous => {
      "SELECT 1 FROM events
       WHERE event_name = ?1 AND anonymous_user_id = ?2
         AND COALESCE(client_ts, received_at) >= ?3
         AND COALESCE(client_ts, received_at) <= ?4
       LIMIT 1"
    }
  };

  Ok(
    conn
      .query_row(
        sql,
        rusqlite::params![probe.event_name, probe.identity, probe.since, probe.until],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn insert_event(
  conn: &rusqlite::Connection,
  received_at: &str,
  ev: &EncodedEvent,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO events (
       received_at, client_ts, campaign_id, game_id,
       session_id, anonymous_user_id, event_name, props
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      received_at,
      ev.client_ts,
      ev.campaign_id,
      ev.game_id,
      ev.session_id,
      ev.anonymous_user_id,
      ev.event_name,
      ev.props,
    ],
  )?;
  Ok(())
}

/// If `err` is a unique-index violation on `banners`, the message to report.
fn banner_conflict(err: &rusqlite::Error) -> Option<String> {
  match err {
    rusqlite::Error::SqliteFailure(f, msg) if f.code == ErrorCode::ConstraintViolation => {
      let on_url = msg.as_deref().is_some_and(|m| m.contains("banners.url"));
      Some(
        if on_url { "banner url already exists" } else { "banner_id already exists" }
          .to_owned(),
      )
    }
    _ => None,
  }
}

fn select_banner(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawBanner>> {
  conn
    .query_row(
      &format!("SELECT {} FROM banners WHERE id = ?1", RawBanner::COLUMNS),
      rusqlite::params![id],
      RawBanner::from_row,
    )
    .optional()
}

// ─── AnalyticsStore impl ─────────────────────────────────────────────────────

impl AnalyticsStore for SqliteStore {
  type Error = Error;

  // ── Events ────────────────────────────────────────────────────────────────

  async fn ingest(&self, events: Vec<NewEvent>) -> Result<IngestOutcome> {
    if events.is_empty() {
      return Ok(IngestOutcome::default());
    }

    let received_at = now();
    let received_str = encode_dt(received_at);
    let rows = events
      .into_iter()
      .map(|e| EncodedEvent::new(e, received_at))
      .collect::<Result<Vec<_>>>()?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcome = IngestOutcome::default();

        for row in &rows {
          if let Some(probe) = &row.probe
            && probe_matches(&tx, probe)?
          {
            outcome.duplicates += 1;
            continue;
          }
          insert_event(&tx, &received_str, row)?;
          outcome.stored += 1;
        }

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    tracing::debug!(
      stored = outcome.stored,
      duplicates = outcome.duplicates,
      "ingested event batch"
    );
    Ok(outcome)
  }

  async fn seen_recently(&self, probe: &DedupProbe) -> Result<bool> {
    let probe = EncodedProbe::new(probe);
    Ok(self.conn.call(move |conn| Ok(probe_matches(conn, &probe)?)).await?)
  }

  async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>> {
    let since_str = encode_dt(since);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM events
           WHERE client_ts IS NOT NULL AND client_ts >= ?1
           ORDER BY client_ts, id",
          RawEvent::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![since_str], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn game_ids(&self) -> Result<Vec<String>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare(
            "SELECT DISTINCT game_id FROM events
             WHERE game_id IS NOT NULL AND game_id != ''
             ORDER BY game_id",
          )?;
          let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
          Ok(ids)
        })
        .await?,
    )
  }

  // ── Registrations ─────────────────────────────────────────────────────────

  async fn record_registration(&self, input: NewRegistration) -> Result<Registration> {
    let created_at = now();
    let created_str = encode_dt(created_at);
    let row = input.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO registrations (
             created_at, session_id, campaign_id, game_id,
             name, email, phone, score, duration_ms
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            created_str,
            row.session_id,
            row.campaign_id,
            row.game_id,
            row.name,
            row.email,
            row.phone,
            row.score,
            row.duration_ms,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Registration {
      id,
      created_at,
      session_id: input.session_id,
      campaign_id: input.campaign_id,
      game_id: input.game_id,
      name: input.name,
      email: input.email,
      phone: input.phone,
      score: input.score,
      duration_ms: input.duration_ms,
    })
  }

  async fn list_registrations(
    &self,
    query: &RegistrationQuery,
  ) -> Result<Vec<Registration>> {
    let game_id = query.game_id.clone();
    let banner_id = query.banner_id.clone();
    // `q` is matched below, after the id filters and before the cap.
    // SQLite reads a negative LIMIT as unbounded.
    let limit = if query.q.is_some() { -1 } else { MAX_LISTED as i64 };

    let raws: Vec<RawRegistration> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM registrations
           WHERE (?1 IS NULL OR game_id = ?1)
             AND (?2 IS NULL OR game_id = ?2)
           ORDER BY created_at DESC, id DESC
           LIMIT ?3",
          RawRegistration::COLUMNS
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![game_id, banner_id, limit],
            RawRegistration::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut out = Vec::new();
    for raw in raws {
      let reg = raw.into_registration()?;
      if query.matches_text(&reg) {
        out.push(reg);
        if out.len() == MAX_LISTED {
          break;
        }
      }
    }
    Ok(out)
  }

  async fn registrations_since(&self, since: DateTime<Utc>) -> Result<Vec<Registration>> {
    let since_str = encode_dt(since);

    let raws: Vec<RawRegistration> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM registrations WHERE created_at >= ?1 ORDER BY created_at, id",
          RawRegistration::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![since_str], RawRegistration::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRegistration::into_registration).collect()
  }

  // ── Banners ───────────────────────────────────────────────────────────────

  async fn list_banners(&self) -> Result<Vec<Banner>> {
    let raws: Vec<RawBanner> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM banners ORDER BY created_at DESC, id DESC",
          RawBanner::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawBanner::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBanner::into_banner).collect()
  }

  async fn create_banner(&self, input: NewBanner) -> Result<Banner> {
    let created_at = now();
    let created_str = encode_dt(created_at);
    let row = input.clone();

    let id = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO banners (created_at, banner_id, name, url) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![created_str, row.banner_id, row.name, row.url],
        );
        match inserted {
          Ok(_) => Ok(Ok(conn.last_insert_rowid())),
          Err(e) => match banner_conflict(&e) {
            Some(msg) => Ok(Err(msg)),
            None => Err(e.into()),
          },
        }
      })
      .await?
      .map_err(Error::Conflict)?;

    Ok(Banner {
      id,
      created_at,
      banner_id: input.banner_id,
      name: input.name,
      url: input.url,
    })
  }

  async fn update_banner(&self, id: i64, input: NewBanner) -> Result<Option<Banner>> {
    let raw = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE banners SET banner_id = ?1, name = ?2, url = ?3 WHERE id = ?4",
          rusqlite::params![input.banner_id, input.name, input.url, id],
        );
        match updated {
          Ok(0) => Ok(Ok(None)),
          Ok(_) => Ok(Ok(select_banner(conn, id)?)),
          Err(e) => match banner_conflict(&e) {
            Some(msg) => Ok(Err(msg)),
            None => Err(e.into()),
          },
        }
      })
      .await?
      .map_err(Error::Conflict)?;

    raw.map(RawBanner::into_banner).transpose()
  }

  async fn delete_banner(&self, id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM banners WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(deleted > 0)
  }
}
