use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Microsoft identity platform tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MsTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl MsTokens {
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: u64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(expires_in as i64);
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Xbox Live user token with the user hash needed for the next hop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct XblToken {
    pub token: String,
    pub uhs: String,
    pub not_after: Option<String>,
}

/// XSTS authorization token; carries the user hash from its display claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct XstsToken {
    pub token: String,
    pub uhs: String,
    pub not_after: Option<String>,
}

/// Minecraft services access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl McToken {
    pub fn new(access_token: String, expires_in: u64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(expires_in as i64);
        Self {
            access_token,
            expires_at,
        }
    }

    /// True when the token expires within `margin` from now
    pub fn is_expired_within(&self, margin: std::time::Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::seconds(60));
        Utc::now() + margin >= self.expires_at
    }
}
