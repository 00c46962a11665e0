//! Types for the provider's OAuth token endpoint and transaction feed

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Retry hint applied when a 429 response carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Token grant returned by `POST /token` for both code exchange and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Providers may rotate the refresh token; absent means keep the current one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenGrant {
    /// Absolute expiry of the access token, if the provider advertised a lifetime.
    ///
    /// A lifetime too large to represent is treated as unknown.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
    }
}

/// Parameters for a single transaction page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub account_id: &'a str,
    pub access_token: &'a str,
    /// Provider-issued cursor; `None` requests the start of the feed.
    pub cursor: Option<&'a str>,
    /// Ask the provider to simulate rate limiting (sent as `rl=true`).
    pub rate_limit_probe: bool,
}

/// Item shape as it appears on the wire.
#[derive(Debug, Deserialize)]
struct WireItem {
    id: String,
    amount: i64,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    description: Option<String>,
    posted_at: String,
    #[serde(default)]
    status: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// A transaction as reported by the provider.
///
/// `raw` keeps the item exactly as received so it can be stored for audit.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionItem {
    /// Provider transaction identifier, unique per account.
    pub id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub status: Option<String>,
    /// Serialized original JSON object.
    pub raw: String,
}

impl TryFrom<serde_json::Value> for TransactionItem {
    type Error = ProviderError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        let raw = value.to_string();
        let wire: WireItem = serde_json::from_value(value)?;
        let posted_at = parse_posted_at(&wire.posted_at).ok_or_else(|| {
            ProviderError::InvalidItem(format!(
                "transaction {} has unparseable posted_at {:?}",
                wire.id, wire.posted_at
            ))
        })?;

        Ok(Self {
            id: wire.id,
            amount: wire.amount,
            currency: wire.currency,
            description: wire.description,
            posted_at,
            status: wire.status,
            raw,
        })
    }
}

/// Accepts RFC 3339 timestamps as well as naive ISO-8601 ones, which are taken as UTC.
pub fn parse_posted_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Page body as it appears on the wire.
#[derive(Debug, Deserialize)]
struct WirePage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// One decoded page of the transaction feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPage {
    pub items: Vec<TransactionItem>,
    /// Cursor for the following page; `None` once the feed is drained.
    pub next_cursor: Option<String>,
}

impl TransactionPage {
    /// Decode a page from its JSON body.
    ///
    /// An empty-string cursor is treated the same as an absent one.
    pub fn from_json(body: serde_json::Value) -> Result<Self, ProviderError> {
        let wire: WirePage = serde_json::from_value(body)?;
        let items = wire
            .items
            .into_iter()
            .map(TransactionItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            items,
            next_cursor: wire.next_cursor.filter(|cursor| !cursor.is_empty()),
        })
    }

    /// Whether the provider signalled the end of the feed.
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Result of a single page fetch.
///
/// Expected provider conditions are distinct variants so that a transient signal can never be
/// mistaken for a crash.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The page was fetched and decoded.
    Success(TransactionPage),
    /// The access token was rejected (HTTP 401).
    TokenExpired,
    /// The provider asked us to slow down (HTTP 429).
    RateLimited { retry_after_secs: u64 },
    /// Any other failure; aborts the run.
    Fatal(ProviderError),
}

/// Parse a `Retry-After` header value given in whole seconds.
pub fn parse_retry_after(header: Option<&str>) -> u64 {
    header
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Error types for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Token expired or rejected by provider")]
    TokenExpired,

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid transaction item: {0}")]
    InvalidItem(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(expires_in: Option<i64>) -> TokenGrant {
        TokenGrant {
            access_token: "at".to_string(),
            refresh_token: None,
            token_type: None,
            expires_in,
        }
    }

    #[test]
    fn test_expires_at_adds_lifetime() {
        let issued = Utc::now();
        assert_eq!(
            grant(Some(120)).expires_at(issued),
            Some(issued + chrono::Duration::seconds(120))
        );
        assert_eq!(grant(None).expires_at(issued), None);
    }

    #[test]
    fn test_expires_at_out_of_range_is_unknown() {
        let issued = Utc::now();
        assert_eq!(grant(Some(i64::MAX)).expires_at(issued), None);
        assert_eq!(grant(Some(10_i64.pow(16))).expires_at(issued), None);
        assert_eq!(grant(Some(i64::MIN)).expires_at(issued), None);
    }

    #[test]
    fn test_empty_next_cursor_ends_feed() {
        let page = TransactionPage::from_json(serde_json::json!({
            "items": [],
            "next_cursor": ""
        }))
        .unwrap();
        assert!(page.is_last());
    }
}
