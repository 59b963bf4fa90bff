use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::{TokenExpiry, Tokens};

/// Tokens expiring on the same calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyExpiry {
    pub day: NaiveDate,
    pub amount: Tokens,
}

/// Sums upcoming expiries per day in the given time zone, soonest first.
/// Entries that already expired at `now` are skipped.
pub fn group_by_day(entries: &[TokenExpiry], now: DateTime<Utc>, time_zone: &Tz) -> Vec<DailyExpiry> {
    let mut upcoming: Vec<_> = entries.iter().filter(|e| e.expires_at > now).collect();
    upcoming.sort_by_key(|e| e.expires_at);

    let mut days: Vec<DailyExpiry> = vec![];

    for entry in upcoming {
        let day = entry.expires_at.with_timezone(time_zone).date_naive();

        match days.last_mut() {
            Some(last) if last.day == day => last.amount += entry.amount,
            _ => days.push(DailyExpiry {
                day,
                amount: entry.amount,
            }),
        }
    }

    days
}

/// When tokens granted at `now` would expire.
/// None if expiration is disabled or the date can't be represented.
pub fn expiry_date(now: DateTime<Utc>, expiration_days: i64) -> Option<DateTime<Utc>> {
    if expiration_days <= 0 {
        return None;
    }

    TimeDelta::try_days(expiration_days).and_then(|window| now.checked_add_signed(window))
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_grouping() {
        let tz = chrono_tz::Asia::Jakarta;
        let entries = vec![
            TokenExpiry { amount: 5, expires_at: at(10, 18) },
            TokenExpiry { amount: 10, expires_at: at(3, 2) },
            // Same Jakarta day as the previous one
            TokenExpiry { amount: 7, expires_at: at(3, 9) },
            // Already expired
            TokenExpiry { amount: 100, expires_at: at(1, 0) },
        ];

        let days = group_by_day(&entries, at(2, 0), &tz);

        assert_eq!(
            days,
            vec![
                DailyExpiry { day: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(), amount: 17 },
                DailyExpiry { day: NaiveDate::from_ymd_opt(2024, 6, 11).unwrap(), amount: 5 },
            ]
        );
    }

    #[test]
    fn test_expiry_date() {
        assert_eq!(expiry_date(at(1, 0), 3), Some(at(4, 0)));
        assert_eq!(expiry_date(at(1, 0), 0), None);
    }

    #[test]
    fn test_expiry_date_out_of_range() {
        assert_eq!(expiry_date(at(1, 0), 100_000_000), None);
        assert_eq!(expiry_date(at(1, 0), i64::MAX), None);
    }
}
