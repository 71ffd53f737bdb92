//! Persisted account schema, field-for-field compatible with the official
//! launcher's `launcher_accounts.json` so either launcher can read the
//! other's file without losing or duplicating accounts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{self, McProfile};
use crate::session::McToken;

/// Root of `launcher_accounts.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountCollection {
    pub accounts: HashMap<String, Account>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_account_local_id: Option<String>,
    pub mojang_client_token: String,
}

impl AccountCollection {
    /// Empty collection with a freshly generated client correlation token
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            active_account_local_id: None,
            mojang_client_token: random_hex(16),
        }
    }

    pub fn active(&self) -> Option<&Account> {
        let id = self.active_account_local_id.as_deref()?;
        self.accounts.get(id)
    }
}

impl Default for AccountCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// Account-type discriminator used by the official launcher
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccountType {
    Xbox,
    Offline,
}

/// One persisted account record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub eligible_for_migration: bool,
    #[serde(default)]
    pub has_multiple_profiles: bool,
    #[serde(default)]
    pub legacy: bool,
    pub local_id: String,
    pub minecraft_profile: LauncherProfile,
    /// Extension key; the official launcher keeps the MSA refresh token
    /// elsewhere and ignores this field on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msa_refresh_token: Option<String>,
    #[serde(default = "default_true")]
    pub persistent: bool,
    pub remote_id: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    // The misspelling is the official launcher's, preserved for round-trip
    // compatibility.
    #[serde(rename = "userProperites", default)]
    pub user_properites: Vec<serde_json::Value>,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Account {
    /// Build a fresh record from a completed token chain
    pub fn from_login(mc: &McToken, profile: McProfile, refresh_token: Option<String>) -> Self {
        Self {
            access_token: mc.access_token.clone(),
            access_token_expires_at: mc.expires_at,
            avatar: None,
            eligible_for_migration: false,
            has_multiple_profiles: false,
            legacy: false,
            local_id: random_hex(16),
            minecraft_profile: LauncherProfile::from_profile(&profile),
            msa_refresh_token: refresh_token,
            persistent: true,
            remote_id: profile.id,
            account_type: AccountType::Xbox,
            user_properites: Vec::new(),
            username: String::new(),
            last_used: Some(Utc::now()),
        }
    }

    /// Same account with renewed tokens and profile after a refresh
    pub fn with_renewed(
        &self,
        mc: &McToken,
        profile: McProfile,
        refresh_token: Option<String>,
    ) -> Self {
        let mut renewed = self.clone();
        renewed.access_token = mc.access_token.clone();
        renewed.access_token_expires_at = mc.expires_at;
        renewed.minecraft_profile = LauncherProfile::from_profile(&profile);
        renewed.remote_id = profile.id;
        if refresh_token.is_some() {
            renewed.msa_refresh_token = refresh_token;
        }
        renewed.last_used = Some(Utc::now());
        renewed
    }

    /// Usable for launching: a real, non-placeholder profile id
    pub fn is_usable(&self) -> bool {
        !models::is_placeholder_id(&self.minecraft_profile.id)
    }

    pub fn game_token(&self) -> McToken {
        McToken {
            access_token: self.access_token.clone(),
            expires_at: self.access_token_expires_at,
        }
    }
}

/// Nested profile object inside an account record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LauncherProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub requires_profile_name_change: bool,
    #[serde(default)]
    pub requires_skin_change: bool,
}

impl LauncherProfile {
    fn from_profile(profile: &McProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            requires_profile_name_change: false,
            requires_skin_change: false,
        }
    }
}

/// Random lowercase hex string from `bytes` bytes of OS entropy
pub(crate) fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    getrandom::fill(&mut buf).expect("OS RNG unavailable");
    buf.iter().map(|b| format!("{b:02x}")).collect()
}
