//! Filtering, paging, and exporting of the admin request listing.
//! Everything here works on lists that are already ordered newest first.

use chrono::NaiveDate;
use chrono_tz::Tz;
use thiserror::Error;

use crate::{RequestStatus, TokenRequest};

/// How the `Date` column of an export is rendered
const EXPORT_DATE_FORMAT: &str = "%d/%m/%Y, %H.%M.%S";
const EXPORT_HEADERS: [&str; 5] = ["User", "Email", "Amount", "Status", "Date"];

#[derive(Debug, Error)]
#[error("Failed to export requests: {0}")]
pub struct ExportError(String);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(RequestStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: RequestStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => *expected == status,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(Self::All),
            other => other.parse().map(Self::Only),
        }
    }
}

/// The filters of the admin request listing
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: StatusFilter,
    /// First day to include, inclusive
    pub start: Option<NaiveDate>,
    /// Last day to include, inclusive
    pub end: Option<NaiveDate>,
    /// Case insensitive search on the requester's email
    pub search: Option<String>,
}

impl RequestFilter {
    /// Returns true if the request passes every filter.
    /// Days are compared in the given time zone.
    pub fn matches(&self, request: &TokenRequest, time_zone: &Tz) -> bool {
        if !self.status.matches(request.status) {
            return false;
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let email = request.user_email.to_lowercase();

            if !email.contains(&search.to_lowercase()) {
                return false;
            }
        }

        let day = request.created_at.with_timezone(time_zone).date_naive();

        if self.start.is_some_and(|start| day < start) {
            return false;
        }

        if self.end.is_some_and(|end| day > end) {
            return false;
        }

        true
    }

    pub fn apply(&self, requests: &[TokenRequest], time_zone: &Tz) -> Vec<TokenRequest> {
        requests
            .iter()
            .filter(|r| self.matches(r, time_zone))
            .cloned()
            .collect()
    }
}

/// A slice of a longer list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// The page number, starting at 1
    pub current: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Cuts out page `page` (1-based) of `per_page` items.
/// Pages past the end are empty, page 0 is treated as page 1.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let current = page.max(1);
    let start = (current - 1).saturating_mul(per_page);

    Page {
        items: items.iter().skip(start).take(per_page).cloned().collect(),
        current,
        total_pages: items.len().div_ceil(per_page),
        total_items: items.len(),
    }
}

/// Renders requests into a CSV document with a header row
pub fn export_csv(requests: &[TokenRequest], time_zone: &Tz) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);

    writer
        .write_record(EXPORT_HEADERS)
        .map_err(|e| ExportError(e.to_string()))?;

    for request in requests {
        let date = request
            .created_at
            .with_timezone(time_zone)
            .format(EXPORT_DATE_FORMAT)
            .to_string();

        writer
            .write_record([
                request.user_id.to_string(),
                request.user_email.clone(),
                request.amount.to_string(),
                request.status.to_string(),
                date,
            ])
            .map_err(|e| ExportError(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| ExportError(e.to_string()))
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn request(email: &str, status: RequestStatus, created_at: (i32, u32, u32, u32)) -> TokenRequest {
        let (y, m, d, h) = created_at;

        TokenRequest {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_email: email.to_string(),
            amount: 100,
            status,
            created_at: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_status_and_search() {
        let tz = chrono_tz::Asia::Jakarta;
        let requests = vec![
            request("Ayu@Example.com", RequestStatus::Pending, (2024, 5, 2, 1)),
            request("budi@example.com", RequestStatus::Approved, (2024, 5, 1, 1)),
            request("citra@example.com", RequestStatus::Pending, (2024, 4, 30, 1)),
        ];

        let pending = RequestFilter {
            status: StatusFilter::Only(RequestStatus::Pending),
            ..Default::default()
        };
        assert_eq!(pending.apply(&requests, &tz).len(), 2);

        let search = RequestFilter {
            search: Some("ayu@".to_string()),
            ..Default::default()
        };
        let found = search.apply(&requests, &tz);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user_email, "Ayu@Example.com");
    }

    #[test]
    fn test_date_range_uses_time_zone() {
        let tz = chrono_tz::Asia::Jakarta;
        // 2024-05-01 20:00 UTC is already 2024-05-02 in Jakarta
        let requests = vec![request("a@example.com", RequestStatus::Pending, (2024, 5, 1, 20))];

        let may_first = RequestFilter {
            start: NaiveDate::from_ymd_opt(2024, 5, 1),
            end: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        assert!(may_first.apply(&requests, &tz).is_empty());

        let may_second = RequestFilter {
            start: NaiveDate::from_ymd_opt(2024, 5, 2),
            end: NaiveDate::from_ymd_opt(2024, 5, 2),
            ..Default::default()
        };
        assert_eq!(may_second.apply(&requests, &tz).len(), 1);
    }

    #[test]
    fn test_pagination() {
        let items: Vec<usize> = (0..23).collect();

        let first = paginate(&items, 1, 10);
        assert_eq!(first.items, (0..10).collect::<Vec<_>>());
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_items, 23);

        let last = paginate(&items, 3, 10);
        assert_eq!(last.items, vec![20, 21, 22]);

        assert!(paginate(&items, 4, 10).items.is_empty());
        assert_eq!(paginate(&items, 0, 10).current, 1);
        assert_eq!(paginate::<usize>(&[], 1, 10).total_pages, 0);
    }

    #[test]
    fn test_status_filter_parsing() {
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!(
            "rejected".parse::<StatusFilter>(),
            Ok(StatusFilter::Only(RequestStatus::Rejected))
        );
        assert!("done".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_csv_export() {
        let tz = chrono_tz::Asia::Jakarta;
        let request = request("a@example.com", RequestStatus::Approved, (2024, 5, 1, 3));

        let csv = export_csv(&[request.clone()], &tz).unwrap();
        let mut lines = csv.lines();

        assert_eq!(lines.next(), Some("User,Email,Amount,Status,Date"));
        assert_eq!(
            lines.next().unwrap(),
            format!(
                "{},a@example.com,100,approved,\"01/05/2024, 10.00.00\"",
                request.user_id
            )
        );
        assert_eq!(lines.next(), None);
    }
}
