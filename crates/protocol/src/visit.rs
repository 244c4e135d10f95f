//! The visit record and its validity semantics.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value attributes attached to a visit. Later writes for the same key
/// override earlier ones.
pub type Extras = BTreeMap<String, Value>;

/// Campaign attribution keys conventionally stored as visit extras.
pub mod utm {
    pub const CAMPAIGN: &str = "utm_campaign";
    pub const CONTENT: &str = "utm_content";
    pub const MEDIUM: &str = "utm_medium";
    pub const SOURCE: &str = "utm_source";
    pub const TERM: &str = "utm_term";
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// An immutable visit-session record.
///
/// A visit pairs a delegate-assigned session token with accumulated extras
/// and an absolute expiry instant. The tracker replaces its visit wholesale
/// on every successful delegate round trip; nothing mutates in place.
/// Structural equality decides whether listeners are notified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    token: String,
    extras: Extras,
    expires_at: u64,
}

impl Visit {
    pub fn new(token: impl Into<String>, extras: Extras, expires_at: u64) -> Self {
        Self {
            token: token.into(),
            extras,
            expires_at,
        }
    }

    /// The unseeded cold-start visit: no token, already expired.
    pub fn empty() -> Self {
        Self {
            token: String::new(),
            extras: Extras::new(),
            expires_at: 0,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn extras(&self) -> &Extras {
        &self.extras
    }

    /// Look up a single extra attribute by key.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    /// Absolute expiry instant in epoch milliseconds.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Whether the visit has a token and has not yet expired.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_ms())
    }

    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        !self.token.is_empty() && now_ms < self.expires_at
    }

    /// A copy of this visit with the expiry forced into the past. The token
    /// and extras are preserved for in-flight comparisons.
    #[must_use]
    pub fn expire(&self) -> Visit {
        Visit {
            token: self.token.clone(),
            extras: self.extras.clone(),
            expires_at: 0,
        }
    }

    /// A copy of this visit with `extras` merged in, later keys overriding
    /// stored ones.
    #[must_use]
    pub fn with_extras(&self, extras: Extras) -> Visit {
        let mut merged = self.extras.clone();
        merged.extend(extras);
        Visit {
            token: self.token.clone(),
            extras: merged,
            expires_at: self.expires_at,
        }
    }
}
