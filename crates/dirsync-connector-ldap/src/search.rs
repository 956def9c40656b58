//! Paged search request and response.

use std::time::Duration;

use dirsync_connector::entry::DirectoryEntry;
use dirsync_connector::mapping::AttributeMapping;
use dirsync_connector::sync::SyncMode;
use dirsync_connector::timestamp::format_generalized_time;

/// Filter used by a full sync.
pub const MATCH_ALL_FILTER: &str = "(objectClass=*)";

/// One page of a single-level paged search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub base_dn: String,
    pub filter: String,
    pub attributes: Vec<String>,
    pub page_size: u32,
    /// Server-side time limit for the page.
    pub time_limit: Duration,
    /// Continuation cookie from the previous page.
    pub cookie: Option<Vec<u8>>,
}

/// Entries of one page plus the continuation cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<DirectoryEntry>,
    pub cookie: Option<Vec<u8>>,
}

impl Page {
    /// Cookie to continue with. A present but empty cookie ends the search.
    #[must_use]
    pub fn next_cookie(self) -> Option<Vec<u8>> {
        self.cookie.filter(|c| !c.is_empty())
    }
}

/// Filter selecting the entries of one run.
#[must_use]
pub fn sync_filter(mode: SyncMode, mapping: &AttributeMapping) -> String {
    match mode {
        SyncMode::Full => MATCH_ALL_FILTER.to_string(),
        SyncMode::Incremental { since } => {
            let since = since.unwrap_or_default();
            format!(
                "({}>={})",
                mapping.updated,
                escape_filter_value(&format_generalized_time(since))
            )
        }
    }
}

/// Escape special characters in LDAP filter values (RFC 4515).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_full_filter() {
        assert_eq!(
            sync_filter(SyncMode::Full, &AttributeMapping::default()),
            "(objectClass=*)"
        );
    }

    #[test]
    fn test_incremental_filter_uses_watermark() {
        let since = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let filter = sync_filter(
            SyncMode::Incremental { since: Some(since) },
            &AttributeMapping::default(),
        );
        assert_eq!(filter, "(whenChanged>=20240506070809.0Z)");
    }

    #[test]
    fn test_incremental_without_watermark_starts_at_epoch() {
        let filter = sync_filter(
            SyncMode::Incremental { since: None },
            &AttributeMapping::default(),
        );
        assert_eq!(filter, "(whenChanged>=19700101000000.0Z)");
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("a*b"), "a\\2ab");
        assert_eq!(escape_filter_value("(x)"), "\\28x\\29");
        assert_eq!(escape_filter_value("back\\slash"), "back\\5cslash");
    }

    #[test]
    fn test_empty_cookie_ends_traversal() {
        let page = Page {
            entries: vec![],
            cookie: Some(vec![]),
        };
        assert_eq!(page.next_cookie(), None);

        let page = Page {
            entries: vec![],
            cookie: Some(vec![1, 2]),
        };
        assert_eq!(page.next_cookie(), Some(vec![1, 2]));
    }
}
