//! Listing filters.

use chrono::NaiveDateTime;
use maplink_obex::{AppParams, MessageTypeFilter, PriorityFilter, ReadStatusFilter};
use regex::Regex;

use super::entry::ListingEntry;
use crate::error::{Error, Result};

/// Filter built from the `filter-*` application parameters.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    /// Excluded message types.
    pub message_types: MessageTypeFilter,
    /// Earliest datetime, inclusive.
    pub period_begin: Option<NaiveDateTime>,
    /// Latest datetime, inclusive.
    pub period_end: Option<NaiveDateTime>,
    /// Read status restriction.
    pub read_status: ReadStatusFilter,
    /// Priority restriction.
    pub priority: PriorityFilter,
    recipient: Option<Regex>,
    originator: Option<Regex>,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self {
            message_types: MessageTypeFilter::default(),
            period_begin: None,
            period_end: None,
            read_status: ReadStatusFilter::All,
            priority: PriorityFilter::All,
            recipient: None,
            originator: None,
        }
    }
}

impl MessageFilter {
    /// Builds and validates a filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Range`] if the period ends before it begins.
    pub fn from_params(params: &AppParams) -> Result<Self> {
        if let (Some(begin), Some(end)) = (params.filter_period_begin, params.filter_period_end) {
            if begin > end {
                return Err(Error::Range(format!(
                    "filter period begins {begin} after it ends {end}"
                )));
            }
        }
        Ok(Self {
            message_types: params.filter_message_type.unwrap_or_default(),
            period_begin: params.filter_period_begin,
            period_end: params.filter_period_end,
            read_status: params.filter_read_status.unwrap_or(ReadStatusFilter::All),
            priority: params.filter_priority.unwrap_or(PriorityFilter::All),
            recipient: params.filter_recipient.as_deref().map(wildcard).transpose()?.flatten(),
            originator: params.filter_originator.as_deref().map(wildcard).transpose()?.flatten(),
        })
    }

    /// Returns `true` if the entry passes every active criterion.
    #[must_use]
    pub fn matches(&self, entry: &ListingEntry) -> bool {
        if self.message_types.excludes(entry.msg_type().filter_bit()) {
            return false;
        }
        if self.period_begin.is_some_and(|begin| entry.datetime < begin)
            || self.period_end.is_some_and(|end| entry.datetime > end)
        {
            return false;
        }
        let read_ok = match self.read_status {
            ReadStatusFilter::All => true,
            ReadStatusFilter::UnreadOnly => !entry.read,
            ReadStatusFilter::ReadOnly => entry.read,
        };
        let priority_ok = match self.priority {
            PriorityFilter::All => true,
            PriorityFilter::HighOnly => entry.priority,
            PriorityFilter::NonHighOnly => !entry.priority,
        };
        read_ok
            && priority_ok
            && party_matches(self.originator.as_ref(), &entry.sender_name, &entry.sender_addressing)
            && party_matches(
                self.recipient.as_ref(),
                &entry.recipient_name,
                &entry.recipient_addressing,
            )
    }
}

fn party_matches(pattern: Option<&Regex>, name: &str, addressing: &str) -> bool {
    pattern.is_none_or(|re| re.is_match(name) || re.is_match(addressing))
}

/// Compiles a `*` wildcard into a case-insensitive substring regex.
fn wildcard(pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Ok(Some(Regex::new(&format!("(?i){body}"))?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{MessageHandle, MessageType};
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn entry(msg_type: MessageType, day: u32) -> ListingEntry {
        let mut entry = ListingEntry::new(MessageHandle::new(1, msg_type).unwrap(), "s", at(day));
        entry.sender_name = "Alice Smith".into();
        entry.sender_addressing = "+15551234".into();
        entry.recipient_addressing = "me@example.com".into();
        entry
    }

    #[test]
    fn test_default_matches_everything() {
        let filter = MessageFilter::from_params(&AppParams::default()).unwrap();
        assert!(filter.matches(&entry(MessageType::Email, 1)));
    }

    #[test]
    fn test_type_exclusion() {
        let params = AppParams {
            filter_message_type: Some(MessageTypeFilter::new(MessageTypeFilter::SMS_GSM).unwrap()),
            ..AppParams::default()
        };
        let filter = MessageFilter::from_params(&params).unwrap();
        assert!(!filter.matches(&entry(MessageType::SmsGsm, 1)));
        assert!(filter.matches(&entry(MessageType::Mms, 1)));
    }

    #[test]
    fn test_period_is_inclusive() {
        let params = AppParams {
            filter_period_begin: Some(at(5)),
            filter_period_end: Some(at(10)),
            ..AppParams::default()
        };
        let filter = MessageFilter::from_params(&params).unwrap();
        assert!(!filter.matches(&entry(MessageType::Email, 4)));
        assert!(filter.matches(&entry(MessageType::Email, 5)));
        assert!(filter.matches(&entry(MessageType::Email, 10)));
        assert!(!filter.matches(&entry(MessageType::Email, 11)));
    }

    #[test]
    fn test_inverted_period_is_range_error() {
        let params = AppParams {
            filter_period_begin: Some(at(10)),
            filter_period_end: Some(at(5)),
            ..AppParams::default()
        };
        assert!(matches!(
            MessageFilter::from_params(&params),
            Err(Error::Range(_))
        ));
    }

    #[test]
    fn test_read_and_priority() {
        let mut read_high = entry(MessageType::SmsGsm, 1);
        read_high.read = true;
        read_high.priority = true;
        let unread = entry(MessageType::SmsGsm, 1);

        let params = AppParams {
            filter_read_status: Some(ReadStatusFilter::UnreadOnly),
            ..AppParams::default()
        };
        let filter = MessageFilter::from_params(&params).unwrap();
        assert!(!filter.matches(&read_high));
        assert!(filter.matches(&unread));

        let params = AppParams {
            filter_priority: Some(PriorityFilter::HighOnly),
            ..AppParams::default()
        };
        let filter = MessageFilter::from_params(&params).unwrap();
        assert!(filter.matches(&read_high));
        assert!(!filter.matches(&unread));
    }

    #[test]
    fn test_wildcards() {
        let item = entry(MessageType::SmsGsm, 1);
        for (originator, expected) in [
            ("alice", true),
            ("A*Smith", true),
            ("5551", true),
            ("*", true),
            ("bob", false),
            ("a.ice", false),
        ] {
            let params = AppParams {
                filter_originator: Some(originator.to_string()),
                ..AppParams::default()
            };
            let filter = MessageFilter::from_params(&params).unwrap();
            assert_eq!(filter.matches(&item), expected, "{originator}");
        }

        let params = AppParams {
            filter_recipient: Some("EXAMPLE.com".to_string()),
            ..AppParams::default()
        };
        assert!(MessageFilter::from_params(&params).unwrap().matches(&item));
    }
}
