//! Search filters for [`Reader::fetch_messages`](crate::Reader::fetch_messages).

use chrono::NaiveDate;
use ezmail_imap::SearchCriteria;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mailbox used when none is given.
pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Seen-flag filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Every message.
    #[default]
    All,
    /// Messages without `\Seen`.
    Unseen,
    /// Messages with `\Seen`.
    Seen,
}

fn default_mailbox() -> String {
    DEFAULT_MAILBOX.to_string()
}

/// Which messages to fetch. All set filters must match.
///
/// ```
/// use ezmail::{FetchFilters, StatusFilter};
///
/// let filters = FetchFilters::new()
///     .status(StatusFilter::Unseen)
///     .since(FetchFilters::parse_date("01-Oct-2025")?)
///     .limit(10);
/// assert_eq!(filters.mailbox, "INBOX");
/// # Ok::<(), ezmail::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFilters {
    /// Mailbox to search.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    /// Seen-flag filter.
    #[serde(default)]
    pub status: StatusFilter,
    /// Substring of the From header.
    #[serde(default)]
    pub sender: Option<String>,
    /// Substring of the Subject header.
    #[serde(default)]
    pub subject: Option<String>,
    /// Substring of any header or the body.
    #[serde(default)]
    pub text: Option<String>,
    /// Substring of the body.
    #[serde(default)]
    pub body: Option<String>,
    /// Received on this day.
    #[serde(default)]
    pub on: Option<NaiveDate>,
    /// Received on or after this day.
    #[serde(default)]
    pub since: Option<NaiveDate>,
    /// Received before this day.
    #[serde(default)]
    pub before: Option<NaiveDate>,
    /// Keep only the first N matches, in server order. `None` keeps all;
    /// `Some(0)` keeps none.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Fetch with `BODY[]`, which sets `\Seen`. Off by default.
    #[serde(default)]
    pub mark_seen: bool,
}

impl Default for FetchFilters {
    fn default() -> Self {
        Self {
            mailbox: default_mailbox(),
            status: StatusFilter::All,
            sender: None,
            subject: None,
            text: None,
            body: None,
            on: None,
            since: None,
            before: None,
            limit: None,
            mark_seen: false,
        }
    }
}

impl FetchFilters {
    /// Everything in INBOX.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mailbox.
    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = mailbox.into();
        self
    }

    /// Sets the seen-flag filter.
    #[must_use]
    pub const fn status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    /// Filters on the From header.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Filters on the Subject header.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Filters on headers and body.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Filters on the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Received on `date`.
    #[must_use]
    pub const fn on(mut self, date: NaiveDate) -> Self {
        self.on = Some(date);
        self
    }

    /// Received on or after `date`.
    #[must_use]
    pub const fn since(mut self, date: NaiveDate) -> Self {
        self.since = Some(date);
        self
    }

    /// Received before `date`.
    #[must_use]
    pub const fn before(mut self, date: NaiveDate) -> Self {
        self.before = Some(date);
        self
    }

    /// Caps the number of messages. A cap of 0 fetches nothing; leave the
    /// limit unset for no cap.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Lets the fetch set `\Seen`.
    #[must_use]
    pub const fn mark_seen(mut self, mark_seen: bool) -> Self {
        self.mark_seen = mark_seen;
        self
    }

    /// Parses an IMAP-style date such as `01-Oct-2025`. ISO `2025-10-01`
    /// is accepted too.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for anything else.
    pub fn parse_date(s: &str) -> Result<NaiveDate> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%d-%b-%Y")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .map_err(|_| Error::InvalidInput(format!("invalid date {s:?}, expected DD-Mon-YYYY")))
    }

    /// Rejects an empty mailbox name and empty search strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`].
    pub fn validate(&self) -> Result<()> {
        if self.mailbox.trim().is_empty() {
            return Err(Error::InvalidInput("mailbox name is empty".to_string()));
        }
        let strings = [
            ("sender", &self.sender),
            ("subject", &self.subject),
            ("text", &self.text),
            ("body", &self.body),
        ];
        for (name, value) in strings {
            if value.as_deref().is_some_and(str::is_empty) {
                return Err(Error::InvalidInput(format!("{name} filter is empty")));
            }
        }
        Ok(())
    }

    /// The SEARCH key set: status first, then the string keys, then dates.
    #[must_use]
    pub fn criteria(&self) -> SearchCriteria {
        let mut keys = Vec::new();
        match self.status {
            StatusFilter::All => {}
            StatusFilter::Unseen => keys.push(SearchCriteria::Unseen),
            StatusFilter::Seen => keys.push(SearchCriteria::Seen),
        }
        if let Some(sender) = &self.sender {
            keys.push(SearchCriteria::From(sender.clone()));
        }
        if let Some(subject) = &self.subject {
            keys.push(SearchCriteria::Subject(subject.clone()));
        }
        if let Some(text) = &self.text {
            keys.push(SearchCriteria::Text(text.clone()));
        }
        if let Some(body) = &self.body {
            keys.push(SearchCriteria::Body(body.clone()));
        }
        if let Some(on) = self.on {
            keys.push(SearchCriteria::On(on));
        }
        if let Some(since) = self.since {
            keys.push(SearchCriteria::Since(since));
        }
        if let Some(before) = self.before {
            keys.push(SearchCriteria::Before(before));
        }

        match keys.len() {
            0 => SearchCriteria::All,
            1 => keys.swap_remove(0),
            _ => SearchCriteria::And(keys),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use ezmail_imap::Command;

    fn search_line(filters: &FetchFilters) -> String {
        let bytes = Command::Search {
            criteria: filters.criteria(),
        }
        .serialize("A1");
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_empty_filters_search_all() {
        assert_eq!(FetchFilters::new().criteria(), SearchCriteria::All);
        assert_eq!(search_line(&FetchFilters::new()), "A1 SEARCH ALL\r\n");
    }

    #[test]
    fn test_unseen_since() {
        let filters = FetchFilters::new()
            .status(StatusFilter::Unseen)
            .since(FetchFilters::parse_date("01-Oct-2025").unwrap());
        assert_eq!(search_line(&filters), "A1 SEARCH UNSEEN SINCE 1-Oct-2025\r\n");
    }

    #[test]
    fn test_key_order() {
        let filters = FetchFilters::new()
            .before(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap())
            .subject("Invoice")
            .sender("billing@example.com")
            .status(StatusFilter::Seen);
        assert_eq!(
            filters.criteria(),
            SearchCriteria::And(vec![
                SearchCriteria::Seen,
                SearchCriteria::From("billing@example.com".to_string()),
                SearchCriteria::Subject("Invoice".to_string()),
                SearchCriteria::Before(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()),
            ])
        );
    }

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(FetchFilters::parse_date("01-Oct-2025").unwrap(), expected);
        assert_eq!(FetchFilters::parse_date("1-Oct-2025").unwrap(), expected);
        assert_eq!(FetchFilters::parse_date("2025-10-01").unwrap(), expected);
        assert!(matches!(FetchFilters::parse_date("Oct 1st"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_validate() {
        assert!(FetchFilters::new().validate().is_ok());
        assert!(FetchFilters::new().mailbox(" ").validate().is_err());
        assert!(FetchFilters::new().subject("").validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let filters: FetchFilters = serde_json::from_str(r#"{"status": "unseen", "limit": 5}"#).unwrap();
        assert_eq!(filters.mailbox, "INBOX");
        assert_eq!(filters.status, StatusFilter::Unseen);
        assert_eq!(filters.limit, Some(5));
        assert!(!filters.mark_seen);
    }
}
