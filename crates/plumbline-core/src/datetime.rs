use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  Local,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

use crate::config::{
  Config,
  KEY_TIMEZONE
};

const TIMEZONE_ENV_VAR: &str =
  "PLUMBLINE_TIMEZONE";

/// Where one calendar day ends and the
/// next begins for "today", "overdue"
/// and the date buckets.
#[derive(Debug, Clone, Copy)]
pub enum DayBoundary {
  SystemLocal,
  Zone(Tz)
}

impl DayBoundary {
  pub fn from_config(
    cfg: &Config
  ) -> Self {
    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && let Some(tz) = parse_timezone(
        &raw,
        TIMEZONE_ENV_VAR
      )
    {
      return DayBoundary::Zone(tz);
    }

    cfg
      .get(KEY_TIMEZONE)
      .and_then(|raw| {
        parse_timezone(
          &raw,
          KEY_TIMEZONE
        )
      })
      .map(DayBoundary::Zone)
      .unwrap_or(
        DayBoundary::SystemLocal
      )
  }

  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | DayBoundary::SystemLocal => {
        now
          .with_timezone(&Local)
          .date_naive()
      }
      | DayBoundary::Zone(tz) => {
        now
          .with_timezone(tz)
          .date_naive()
      }
    }
  }
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured day boundary timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}

fn relative_re() -> &'static Regex {
  static RELATIVE: OnceLock<Regex> =
    OnceLock::new();
  RELATIVE.get_or_init(|| {
    Regex::new(
      r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
    )
    .unwrap_or_else(|_| {
      unreachable!(
        "relative date pattern is \
         valid"
      )
    })
  })
}

/// Parses a due/reminder date typed by
/// the user, relative to `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             tomorrow"
          )
        });
    }
    | "yesterday" => {
      return today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             yesterday"
          )
        });
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  if let Some(caps) =
    relative_re().captures(token)
  {
    let num: u64 = caps["num"]
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match &caps["unit"] {
      | "w" => num.saturating_mul(7),
      | _ => num
    };
    let shifted = if &caps["sign"] == "-"
    {
      today
        .checked_sub_days(Days::new(days))
    } else {
      today
        .checked_add_days(Days::new(days))
    };
    return shifted.ok_or_else(|| {
      anyhow!(
        "date out of range: {token}"
      )
    });
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date: {token} \
       (try YYYY-MM-DD, today, \
       tomorrow, friday or +3d)"
    )
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Strictly after `from`: naming
/// today's weekday means next week.
fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as u64;
  let target_idx = target
    .num_days_from_monday()
    as u64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_days(Days::new(delta))
    .unwrap_or(from)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 9)
      .unwrap()
  }

  #[test]
  fn keywords_and_relative_offsets() {
    let today = monday();
    assert_eq!(
      parse_date_expr("today", today)
        .unwrap(),
      today
    );
    assert_eq!(
      parse_date_expr("Tomorrow", today)
        .unwrap(),
      NaiveDate::from_ymd_opt(2026, 3, 10)
        .unwrap()
    );
    assert_eq!(
      parse_date_expr("+2w", today)
        .unwrap(),
      NaiveDate::from_ymd_opt(2026, 3, 23)
        .unwrap()
    );
    assert_eq!(
      parse_date_expr("-3d", today)
        .unwrap(),
      NaiveDate::from_ymd_opt(2026, 3, 6)
        .unwrap()
    );
  }

  #[test]
  fn weekday_names_skip_to_next_week() {
    let today = monday();
    assert_eq!(
      parse_date_expr("fri", today)
        .unwrap(),
      NaiveDate::from_ymd_opt(2026, 3, 13)
        .unwrap()
    );
    assert_eq!(
      parse_date_expr("monday", today)
        .unwrap(),
      NaiveDate::from_ymd_opt(2026, 3, 16)
        .unwrap()
    );
  }

  #[test]
  fn iso_dates_and_garbage() {
    let today = monday();
    assert_eq!(
      parse_date_expr(
        "2026-12-01",
        today
      )
      .unwrap(),
      NaiveDate::from_ymd_opt(2026, 12, 1)
        .unwrap()
    );
    assert!(
      parse_date_expr("soonish", today)
        .is_err()
    );
  }

  #[test]
  fn zone_boundary_moves_the_date() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 3, 10, 3, 30, 0
      )
      .unwrap();
    let chicago = DayBoundary::Zone(
      "America/Chicago".parse().unwrap()
    );
    let tokyo = DayBoundary::Zone(
      "Asia/Tokyo".parse().unwrap()
    );
    assert_eq!(
      chicago.today(now),
      NaiveDate::from_ymd_opt(2026, 3, 9)
        .unwrap()
    );
    assert_eq!(
      tokyo.today(now),
      NaiveDate::from_ymd_opt(2026, 3, 10)
        .unwrap()
    );
  }
}
