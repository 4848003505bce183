//! Subscription and snapshot key types.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable identity of a subscription within its repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monitored URL plus its destinations and extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "SubscriptionId::is_empty")]
    pub id: SubscriptionId,

    /// Page to fetch
    #[serde(alias = "URL", alias = "Url")]
    pub url: String,

    /// CSS selector; empty means the whole document
    #[serde(default, alias = "Selector")]
    pub selector: String,

    #[serde(default, alias = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, alias = "MobileNumber", skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,

    /// Consecutive hard failures
    #[serde(default, alias = "ConsecutiveErrors")]
    pub consecutive_errors: u32,

    /// Set by the last cycle; never persisted
    #[serde(skip)]
    pub changed: bool,
}

impl Subscription {
    /// Create a subscription for the whole document at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: SubscriptionId::default(),
            url: url.into(),
            selector: String::new(),
            email: None,
            mobile_number: None,
            consecutive_errors: 0,
            changed: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = SubscriptionId::new(id);
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_mobile_number(mut self, number: impl Into<String>) -> Self {
        self.mobile_number = Some(number.into());
        self
    }

    /// At least one non-blank destination is configured.
    pub fn is_actionable(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.email) || present(&self.mobile_number)
    }

    /// Human-readable destination for log lines.
    pub fn destination(&self) -> String {
        match (&self.email, &self.mobile_number) {
            (Some(email), Some(phone)) => format!("{email} / {phone}"),
            (Some(email), None) => email.clone(),
            (None, Some(phone)) => phone.clone(),
            (None, None) => "<no destination>".to_string(),
        }
    }

    /// Key under which this subscription's snapshot is stored.
    pub fn snapshot_key(&self) -> SnapshotKey {
        SnapshotKey::new(&self.url, &self.selector)
    }

    /// Deterministic id derived from the URL, selector and destinations.
    pub fn derived_id(&self) -> SubscriptionId {
        let mut hasher = Sha256::new();
        hasher.update(self.url.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.selector.trim().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.email.as_deref().unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(self.mobile_number.as_deref().unwrap_or("").as_bytes());
        let digest = hex::encode(hasher.finalize());
        SubscriptionId(digest[..16].to_string())
    }

    /// Assign the derived id if none is set yet.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = self.derived_id();
        }
    }
}

/// Identity of a snapshot: the URL, narrowed by a selector when one is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey {
    pub url: String,
    pub selector: String,
}

impl SnapshotKey {
    pub fn new(url: impl Into<String>, selector: impl AsRef<str>) -> Self {
        Self {
            url: url.into(),
            selector: selector.as_ref().trim().to_string(),
        }
    }

    /// Key for the whole document at `url`.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(url, "")
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.selector.is_empty() {
            f.write_str(&self.url)
        } else {
            write!(f, "{} [{}]", self.url, self.selector)
        }
    }
}
