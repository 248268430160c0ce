//! The stats aggregator behind the dashboard.
//!
//! [`aggregate`] is a pure function over already-loaded rows: it applies the
//! query filters, buckets by UTC calendar day, classifies events into funnel
//! stages, de-duplicates views per [`ViewBuckets`], and returns a dense daily
//! series plus totals, conversion rates and the funnel.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  dedup::ViewBuckets,
  event::{Event, EventKind},
  registration::Registration,
};

pub const DEFAULT_DAYS: u32 = 28;
pub const MAX_DAYS: u32 = 365;

// ─── Query ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
  /// Length of the window in days, `1..=MAX_DAYS`.
  pub days:       u32,
  /// Exact match against `game_id` of events and registrations.
  pub banner_id:  Option<String>,
  /// Substring match against the `url` or `referrer` prop of events.
  /// Registrations carry no props and are not filtered by it.
  pub banner_url: Option<String>,
  /// Exact match against `game_id` of events and registrations.
  pub game_id:    Option<String>,
}

impl Default for StatsQuery {
  fn default() -> Self {
    Self { days: DEFAULT_DAYS, banner_id: None, banner_url: None, game_id: None }
  }
}

impl StatsQuery {
  /// Interpret a raw `days` parameter: leading digits are read, the result
  /// is clamped to `1..=MAX_DAYS`, and anything unreadable means the default.
  pub fn parse_days(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim) else { return DEFAULT_DAYS };
    let (sign, rest) = match raw.strip_prefix('-') {
      Some(rest) => (-1_i64, rest),
      None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    match digits.parse::<i64>() {
      Ok(n) => (sign * n).clamp(1, i64::from(MAX_DAYS)) as u32,
      // Too many digits for i64 is still a large positive request.
      Err(_) if !digits.is_empty() => if sign > 0 { MAX_DAYS } else { 1 },
      Err(_) => DEFAULT_DAYS,
    }
  }

  /// The oldest day shown in the series.
  pub fn first_day(&self, now: DateTime<Utc>) -> NaiveDate {
    let back = u64::from(self.days.clamp(1, MAX_DAYS) - 1);
    now.date_naive() - Days::new(back)
  }

  /// Midnight UTC at the start of [`Self::first_day`]; rows older than this
  /// are not loaded.
  pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    self.first_day(now).and_time(NaiveTime::MIN).and_utc()
  }

  fn matches_game(&self, game_id: Option<&str>) -> bool {
    let game_id = game_id.unwrap_or_default();
    self.game_id.as_deref().is_none_or(|g| g == game_id)
      && self.banner_id.as_deref().is_none_or(|b| b == game_id)
  }

  fn matches_event(&self, event: &Event) -> bool {
    if !self.matches_game(event.game_id.as_deref()) {
      return false;
    }
    match self.banner_url.as_deref() {
      None => true,
      Some(needle) => ["url", "referrer"]
        .iter()
        .any(|key| event.prop_str(key).is_some_and(|v| v.contains(needle))),
    }
  }

  fn matches_registration(&self, reg: &Registration) -> bool {
    self.matches_game(reg.game_id.as_deref())
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Counters for one bucket (a day, or the whole window).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
  pub starts: u64,
  pub wins:   u64,
  pub regs:   u64,
  pub views:  u64,
  pub clicks: u64,
}

impl Counts {
  fn bump(&mut self, kind: EventKind) {
    match kind {
      EventKind::Start => self.starts += 1,
      EventKind::Win => self.wins += 1,
      EventKind::Click => self.clicks += 1,
      EventKind::View => self.views += 1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCounts {
  pub date:   NaiveDate,
  #[serde(flatten)]
  pub counts: Counts,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rates {
  pub win_rate:              f64,
  pub reg_rate_from_starts:  f64,
  pub reg_rate_from_wins:    f64,
}

impl Rates {
  pub fn from_totals(t: &Counts) -> Self {
    Self {
      win_rate:             ratio(t.wins, t.starts),
      reg_rate_from_starts: ratio(t.regs, t.starts),
      reg_rate_from_wins:   ratio(t.regs, t.wins),
    }
  }
}

fn ratio(num: u64, den: u64) -> f64 {
  if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStep {
  pub label: String,
  pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
  pub totals: Counts,
  pub rates:  Rates,
  /// Exactly `days` entries, oldest first.
  pub series: Vec<DayCounts>,
  pub funnel: Vec<FunnelStep>,
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Aggregate `events` and `registrations` for `query` as seen at `now`.
///
/// Rows older than [`StatsQuery::window_start`] and events without a client
/// timestamp are ignored, so callers may pass a superset of the window.
pub fn aggregate(
  query: &StatsQuery,
  events: &[Event],
  registrations: &[Registration],
  now: DateTime<Utc>,
) -> StatsReport {
  let start = query.window_start(now);
  let mut by_day: HashMap<NaiveDate, Counts> = HashMap::new();
  let mut totals = Counts::default();
  let mut views = ViewBuckets::new();

  for event in events.iter().filter(|e| query.matches_event(e)) {
    let Some(ts) = event.client_ts.filter(|ts| *ts >= start) else { continue };
    let Some(kind) = event.kind() else { continue };
    let day = ts.date_naive();

    if kind == EventKind::View && !views.first_in_bucket(day, event, ts) {
      continue;
    }
    by_day.entry(day).or_default().bump(kind);
    totals.bump(kind);
  }

  for reg in registrations.iter().filter(|r| query.matches_registration(r)) {
    if reg.created_at < start {
      continue;
    }
    by_day.entry(reg.created_at.date_naive()).or_default().regs += 1;
    totals.regs += 1;
  }

  let first = query.first_day(now);
  let series = (0..u64::from(query.days.clamp(1, MAX_DAYS)))
    .map(|offset| {
      let date = first + Days::new(offset);
      DayCounts { date, counts: by_day.get(&date).copied().unwrap_or_default() }
    })
    .collect();

  let funnel = [
    ("Views", totals.views),
    ("Starts", totals.starts),
    ("Wins", totals.wins),
    ("Registrations", totals.regs),
  ]
  .into_iter()
  .map(|(label, value)| FunnelStep { label: label.to_owned(), value })
  .collect();

  StatsReport { totals, rates: Rates::from_totals(&totals), series, funnel }
}
