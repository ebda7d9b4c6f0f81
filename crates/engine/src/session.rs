use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use common::{Error, Result};
use strategy::WatchSchedule;

/// Regular trading session: weekdays between `open` and `close` (both
/// inclusive) in the market's own timezone. Holidays are not modelled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketHours {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl MarketHours {
    pub fn new(tz: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        assert!(open < close, "session must open before it closes");
        Self { tz, open, close }
    }

    pub fn from_schedule(schedule: &WatchSchedule) -> Result<Self> {
        let tz: Tz = schedule
            .timezone
            .parse()
            .map_err(|e| Error::Config(format!("unknown timezone '{}': {e}", schedule.timezone)))?;
        let open = parse_hm(&schedule.open)?;
        let close = parse_hm(&schedule.close)?;
        if open >= close {
            return Err(Error::Config(format!(
                "session open {} must be before close {}",
                schedule.open, schedule.close
            )));
        }
        Ok(Self { tz, open, close })
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    pub fn local<T: TimeZone>(&self, at: &DateTime<T>) -> DateTime<Tz> {
        at.with_timezone(&self.tz)
    }

    pub fn is_open_at<T: TimeZone>(&self, at: &DateTime<T>) -> bool {
        let local = self.local(at);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let t = local.time();
        self.open <= t && t <= self.close
    }

    /// Calendar date of the session `at` falls in, in market time.
    pub fn session_date<T: TimeZone>(&self, at: &DateTime<T>) -> NaiveDate {
        self.local(at).date_naive()
    }

    /// e.g. `Mon-Fri 06:30-13:00 US/Pacific`
    pub fn describe(&self) -> String {
        format!(
            "Mon-Fri {}-{} {}",
            self.open.format("%H:%M"),
            self.close.format("%H:%M"),
            self.tz.name()
        )
    }
}

/// True during the first half-minute of every `every_mins`-th minute. With a
/// 30 s poll this fires once per period.
pub fn on_cadence<T: TimeZone>(at: &DateTime<T>, every_mins: u32) -> bool {
    every_mins > 0 && at.minute() % every_mins == 0 && at.second() < 30
}

fn parse_hm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| Error::Config(format!("invalid session time '{s}': {e}")))
}
