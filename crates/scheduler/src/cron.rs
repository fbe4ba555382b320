//! Cron expression parsing and next-fire computation.
//!
//! Accepts the six-field form `sec min hour dom mon dow` as well as the
//! classic five-field form, which is treated as firing at second zero.
//! Fields support `*`, single values, ranges, comma lists and `/step`
//! suffixes. Day-of-week runs 0-7 with both 0 and 7 meaning Sunday.
//!
//! When day-of-month and day-of-week are both restricted a date matches
//! if either field matches, following the long-standing cron convention;
//! an unrestricted (`*`) day field never narrows the other one.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;

/// A cron expression that failed to parse.
#[derive(Debug, Error)]
pub enum CronError {
    /// Wrong number of whitespace-separated fields.
    #[error("expected 5 or 6 fields, found {0}")]
    FieldCount(usize),
    /// One field could not be interpreted.
    #[error("invalid {field} field `{text}`: {reason}")]
    Field {
        /// Which positional field was bad.
        field: &'static str,
        /// The offending field text.
        text: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// One parsed field, stored as a bitmask over its legal values.
#[derive(Clone, Copy, Debug)]
struct Field {
    mask: u64,
    /// False when the source text was `*` (possibly with a step of 1).
    restricted: bool,
}

impl Field {
    fn contains(self, value: u32) -> bool {
        self.mask & (1 << value) != 0
    }
}

fn parse_field(
    text: &str,
    name: &'static str,
    min: u32,
    max: u32,
) -> Result<Field, CronError> {
    let err = |reason: String| CronError::Field {
        field: name,
        text: text.to_string(),
        reason,
    };
    let parse_num = |part: &str| -> Result<u32, CronError> {
        let value: u32 = part
            .parse()
            .map_err(|_| err(format!("`{part}` is not a number")))?;
        if value < min || value > max {
            return Err(err(format!("{value} is outside {min}-{max}")));
        }
        Ok(value)
    };

    let mut mask = 0u64;
    let mut restricted = false;
    for item in text.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| err(format!("`{step}` is not a valid step")))?;
                if step == 0 {
                    return Err(err("step must be >= 1".to_string()));
                }
                (range, step)
            }
            None => (item, 1),
        };
        let (lo, hi) = if range == "*" {
            if step == 1 && text == "*" {
                // A bare `*` leaves the field unrestricted.
                return Ok(Field {
                    mask: range_mask(min, max),
                    restricted: false,
                });
            }
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            (parse_num(lo)?, parse_num(hi)?)
        } else {
            let value = parse_num(range)?;
            (value, value)
        };
        if lo > hi {
            return Err(err(format!("range {lo}-{hi} is inverted")));
        }
        restricted = true;
        let mut value = lo;
        while value <= hi {
            mask |= 1 << value;
            value += step;
        }
    }
    if mask == 0 {
        return Err(err("field matches nothing".to_string()));
    }
    Ok(Field { mask, restricted })
}

fn range_mask(min: u32, max: u32) -> u64 {
    let mut mask = 0u64;
    for value in min..=max {
        mask |= 1 << value;
    }
    mask
}

/// A parsed cron schedule.
#[derive(Clone, Copy, Debug)]
pub struct CronSchedule {
    sec: Field,
    min: Field,
    hour: Field,
    dom: Field,
    mon: Field,
    dow: Field,
}

impl CronSchedule {
    /// Parses a five- or six-field cron expression.
    pub fn parse(text: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        let (sec, rest) = match fields.len() {
            6 => (parse_field(fields[0], "second", 0, 59)?, &fields[1..]),
            5 => (parse_field("0", "second", 0, 59)?, &fields[..]),
            count => return Err(CronError::FieldCount(count)),
        };
        let mut dow = parse_field(rest[4], "day-of-week", 0, 7)?;
        // 7 is an alias for Sunday.
        if dow.contains(7) {
            dow.mask |= 1;
            dow.mask &= !(1 << 7);
        }
        Ok(Self {
            sec,
            min: parse_field(rest[0], "minute", 0, 59)?,
            hour: parse_field(rest[1], "hour", 0, 23)?,
            dom: parse_field(rest[2], "day-of-month", 1, 31)?,
            mon: parse_field(rest[3], "month", 1, 12)?,
            dow,
        })
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.dom.contains(date.day());
        let dow = self.dow.contains(date.weekday().num_days_from_sunday());
        match (self.dom.restricted, self.dow.restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// The first fire time strictly after `after`, or `None` if no slot
    /// exists within the next four years (an impossible date such as
    /// February 30th).
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut t = (after + Duration::seconds(1)).with_nanosecond(0)?;
        let limit = after + Duration::days(4 * 366);
        while t <= limit {
            if !self.mon.contains(t.month()) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hour.contains(t.hour()) {
                t = t
                    .with_minute(0)?
                    .with_second(0)?
                    .checked_add_signed(Duration::hours(1))?;
                continue;
            }
            if !self.min.contains(t.minute()) {
                t = t.with_second(0)?.checked_add_signed(Duration::minutes(1))?;
                continue;
            }
            if !self.sec.contains(t.second()) {
                t = t.checked_add_signed(Duration::seconds(1))?;
                continue;
            }
            return Some(t);
        }
        None
    }
}
