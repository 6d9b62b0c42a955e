use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

const TIMEZONE_ENV_VAR: &str =
  "EDUCONNECT_TIMEZONE";

static DISPLAY_TZ: OnceLock<Tz> =
  OnceLock::new();

/// Timezone used to show login timestamps and resolve "today". First caller
/// wins: [`configure_display_timezone`] when run from the CLI, otherwise the
/// environment, otherwise UTC.
pub fn display_timezone() -> &'static Tz
{
  DISPLAY_TZ.get_or_init(|| {
    std::env::var(TIMEZONE_ENV_VAR)
      .ok()
      .and_then(|raw| {
        parse_timezone(
          &raw,
          TIMEZONE_ENV_VAR
        )
      })
      .unwrap_or(chrono_tz::UTC)
  })
}

/// Pins the display timezone from configuration. The environment variable
/// still takes precedence over the configured value.
pub fn configure_display_timezone(
  configured: Option<&str>
) -> &'static Tz {
  DISPLAY_TZ.get_or_init(|| {
    let from_env =
      std::env::var(TIMEZONE_ENV_VAR)
        .ok()
        .and_then(|raw| {
          parse_timezone(
            &raw,
            TIMEZONE_ENV_VAR
          )
        });
    from_env
      .or_else(|| {
        configured.and_then(|raw| {
          parse_timezone(
            raw,
            "config:time.timezone"
          )
        })
      })
      .unwrap_or(chrono_tz::UTC)
  })
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
        "configured display timezone"
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
pub fn local_today(
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(display_timezone())
    .date_naive()
}

/// "Oct 15, 2024"
#[must_use]
pub fn format_long_date(
  date: NaiveDate
) -> String {
  date.format("%b %-d, %Y").to_string()
}

/// "10/15/2024"
#[must_use]
pub fn format_short_date(
  date: NaiveDate
) -> String {
  date.format("%-m/%-d/%Y").to_string()
}

#[must_use]
pub fn format_timestamp(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(display_timezone())
    .format("%b %-d, %Y %H:%M %Z")
    .to_string()
}

#[must_use]
pub fn month_short_name(
  month: u32
) -> &'static str {
  match month {
    | 1 => "Jan",
    | 2 => "Feb",
    | 3 => "Mar",
    | 4 => "Apr",
    | 5 => "May",
    | 6 => "Jun",
    | 7 => "Jul",
    | 8 => "Aug",
    | 9 => "Sep",
    | 10 => "Oct",
    | 11 => "Nov",
    | 12 => "Dec",
    | _ => "???"
  }
}

/// Parses a calendar date typed on the command line.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_input(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "yesterday" => {
      return today
        .checked_sub_signed(
          Duration::days(1)
        )
        .ok_or_else(|| {
          anyhow!(
            "date out of range"
          )
        });
    }
    | "tomorrow" => {
      return today
        .checked_add_signed(
          Duration::days(1)
        )
        .ok_or_else(|| {
          anyhow!(
            "date out of range"
          )
        });
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("d") => num,
      | Some("w") => num * 7,
      | other => {
        return Err(anyhow!(
          "unknown relative unit: \
           {other:?}"
        ));
      }
    };
    let delta = Duration::days(days);
    let shifted = if sign == "-" {
      today.checked_sub_signed(delta)
    } else {
      today.checked_add_signed(delta)
    };
    return shifted.ok_or_else(|| {
      anyhow!("date out of range")
    });
  }

  for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, fmt
      )
    {
      return Ok(date);
    }
  }

  Err(anyhow!(
    "unrecognized date: {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/yesterday/tomorrow, \
     +Nd/-Nd/+Nw/-Nw, YYYY-MM-DD, \
     MM/DD/YYYY"
  })
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    format_long_date,
    format_short_date,
    month_short_name,
    parse_date_input
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 15)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_and_us_dates() {
    assert_eq!(
      parse_date_input(
        "2024-09-01",
        today()
      )
      .expect("iso date"),
      NaiveDate::from_ymd_opt(2024, 9, 1)
        .expect("valid date")
    );
    assert_eq!(
      parse_date_input(
        "09/01/2024",
        today()
      )
      .expect("us date"),
      NaiveDate::from_ymd_opt(2024, 9, 1)
        .expect("valid date")
    );
  }

  #[test]
  fn parses_relative_words_and_offsets() {
    assert_eq!(
      parse_date_input("today", today())
        .expect("today"),
      today()
    );
    assert_eq!(
      parse_date_input("-1w", today())
        .expect("one week ago"),
      NaiveDate::from_ymd_opt(2024, 10, 8)
        .expect("valid date")
    );
    assert_eq!(
      parse_date_input(
        "yesterday",
        today()
      )
      .expect("yesterday"),
      NaiveDate::from_ymd_opt(2024, 10, 14)
        .expect("valid date")
    );
  }

  #[test]
  fn rejects_garbage() {
    assert!(
      parse_date_input(
        "someday",
        today()
      )
      .is_err()
    );
  }

  #[test]
  fn formats_like_the_dashboard() {
    assert_eq!(
      format_long_date(today()),
      "Oct 15, 2024"
    );
    assert_eq!(
      format_short_date(
        NaiveDate::from_ymd_opt(
          2024, 9, 1
        )
        .expect("valid date")
      ),
      "9/1/2024"
    );
    assert_eq!(month_short_name(12), "Dec");
  }
}
