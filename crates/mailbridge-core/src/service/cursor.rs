//! Inbox continuation tokens.
//!
//! Account-scoped cursors read `"{account_id}:{provider_token}:{page}"`.
//! The provider token sits in the middle, so it may itself contain `:`.
//! All-accounts cursors are a bare page number.

use crate::account::AccountId;

/// Continuation of a single-account inbox listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Account the cursor was issued for.
    pub account_id: AccountId,
    /// Provider-native continuation token.
    pub provider_token: String,
    /// One-based logical page the token leads to.
    pub page: usize,
}

impl PageCursor {
    /// Creates a cursor.
    #[must_use]
    pub fn new(account_id: AccountId, provider_token: impl Into<String>, page: usize) -> Self {
        Self {
            account_id,
            provider_token: provider_token.into(),
            page,
        }
    }

    /// Render as an opaque string.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.account_id, self.provider_token, self.page)
    }

    /// Parse a cursor. Anything malformed yields `None`.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let (account, rest) = raw.trim().split_once(':')?;
        let (token, page) = rest.rsplit_once(':')?;
        let page = page.parse::<usize>().ok().filter(|p| *p > 0)?;
        if token.is_empty() {
            return None;
        }
        Some(Self {
            account_id: account.parse().ok()?,
            provider_token: token.to_string(),
            page,
        })
    }
}

/// Page number of an all-accounts cursor; 1 when absent or malformed.
#[must_use]
pub fn merged_page(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode() {
        let cursor = PageCursor::new(AccountId::new(7), "CAEQAA", 2);
        assert_eq!(cursor.encode(), "7:CAEQAA:2");
    }

    #[test]
    fn test_decode_token_with_colons() {
        let cursor = PageCursor::decode("7:a:b:c:3").unwrap();
        assert_eq!(cursor.account_id, AccountId::new(7));
        assert_eq!(cursor.provider_token, "a:b:c");
        assert_eq!(cursor.page, 3);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for raw in ["", "7", "7:tok", "x:tok:2", "7:tok:0", "7:tok:-1", "7::2", "7:tok:two"] {
            assert!(PageCursor::decode(raw).is_none(), "{raw:?} should not decode");
        }
    }

    #[test]
    fn test_merged_page() {
        assert_eq!(merged_page(None), 1);
        assert_eq!(merged_page(Some("3")), 3);
        assert_eq!(merged_page(Some("0")), 1);
        assert_eq!(merged_page(Some("7:tok:2")), 1);
        assert_eq!(merged_page(Some(" 4 ")), 4);
    }

    proptest! {
        #[test]
        fn cursor_round_trips(
            id in 0i64..i64::MAX,
            token in "[A-Za-z0-9_:=-]{1,40}",
            page in 1usize..100_000,
        ) {
            let cursor = PageCursor::new(AccountId::new(id), token, page);
            prop_assert_eq!(PageCursor::decode(&cursor.encode()), Some(cursor));
        }
    }
}
