//! Token-chain resolution: identity token in, playable account out.

use tracing::{debug, info, instrument};

use crate::account::Account;
use crate::client::AuthClient;
use crate::errors::{AuthError, Result};
use crate::session::MsTokens;

/// Executes the ordered exchange across the trust boundaries:
/// Microsoft identity token → Xbox Live token → XSTS token →
/// Minecraft services token → game profile.
///
/// Hops are strictly sequential; failure at any hop short-circuits with a
/// hop-specific error so the caller can tell "no Xbox account" apart from
/// "does not own the game".
#[derive(Debug, Clone)]
pub struct TokenChainResolver {
    client: AuthClient,
}

impl TokenChainResolver {
    pub fn new(client: AuthClient) -> Self {
        Self { client }
    }

    /// Resolve a fresh identity token into a new account record
    #[instrument(skip(self, ms_tokens))]
    pub async fn resolve(&self, ms_tokens: &MsTokens) -> Result<Account> {
        let (mc, profile) = self.run_chain(&ms_tokens.access_token).await?;
        info!("Token chain resolved for profile '{}'", profile.name);
        Ok(Account::from_login(
            &mc,
            profile,
            ms_tokens.refresh_token.clone(),
        ))
    }

    /// Re-run the chain for an existing account, preserving its local id
    /// and bookkeeping fields
    #[instrument(skip(self, account, ms_tokens))]
    pub async fn resolve_renewed(&self, account: &Account, ms_tokens: &MsTokens) -> Result<Account> {
        let (mc, profile) = self.run_chain(&ms_tokens.access_token).await?;
        info!("Token chain renewed for profile '{}'", profile.name);
        Ok(account.with_renewed(&mc, profile, ms_tokens.refresh_token.clone()))
    }

    async fn run_chain(
        &self,
        ms_access_token: &str,
    ) -> Result<(crate::session::McToken, crate::models::McProfile)> {
        debug!("Running token chain");
        let xbl = self.client.xbl_authenticate(ms_access_token).await?;
        let xsts = self.client.xsts_authorize(&xbl.token).await?;
        let mc = self.client.mc_login(&xsts.token, &xsts.uhs).await?;
        let profile = self.client.fetch_profile(&mc.access_token).await?;

        // The HTTP call can succeed and still hand back the reserved
        // placeholder profile; that account cannot play.
        if profile.is_placeholder() {
            return Err(AuthError::NoMinecraftProfile);
        }

        Ok((mc, profile))
    }
}
