//! Expiry-driven credential renewal.

use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::account::Account;
use crate::chain::TokenChainResolver;
use crate::client::AuthClient;
use crate::errors::{AuthError, Result};

/// Decides whether a stored credential needs renewal and drives the
/// minimal re-exchange: the stored MSA refresh token re-enters the chain
/// at hop one, without any login UX.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    client: AuthClient,
    resolver: TokenChainResolver,
    margin: Duration,
}

impl RefreshCoordinator {
    /// `margin` is how long before expiry a token already counts as stale
    pub fn new(client: AuthClient, margin: Duration) -> Self {
        let resolver = TokenChainResolver::new(client.clone());
        Self {
            client,
            resolver,
            margin,
        }
    }

    /// Coordinator using the margin from the client's configuration
    pub fn from_config(client: AuthClient) -> Self {
        let margin = client.config().refresh_margin;
        Self::new(client, margin)
    }

    /// Return the account unchanged if its game token is still fresh;
    /// otherwise renew it through the token chain.
    ///
    /// [`AuthError::ReauthRequired`] means the stored refresh token was
    /// rejected or missing and the caller must start a login flow from
    /// scratch; it is an expected condition, not a failure.
    #[instrument(skip(self, account), fields(local_id = %account.local_id))]
    pub async fn ensure_fresh(&self, account: &Account) -> Result<Account> {
        if !account.game_token().is_expired_within(self.margin) {
            debug!("Game token still fresh, no renewal needed");
            return Ok(account.clone());
        }

        let refresh_token = account
            .msa_refresh_token
            .as_deref()
            .ok_or(AuthError::ReauthRequired)?;

        info!("Game token stale, renewing through the token chain");
        let ms_tokens = match self.client.refresh_ms_token(refresh_token).await {
            Ok(tokens) => tokens,
            Err(AuthError::OAuthInvalidGrant) => return Err(AuthError::ReauthRequired),
            Err(e) => return Err(e),
        };

        self.resolver.resolve_renewed(account, &ms_tokens).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, Endpoints};
    use crate::models::McProfile;
    use crate::session::McToken;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn coordinator_for(server: &MockServer) -> RefreshCoordinator {
        let mut config = AuthConfig::new("test-client-id");
        config.endpoints = Endpoints::with_base(&server.uri());
        RefreshCoordinator::from_config(AuthClient::new(config).unwrap())
    }

    fn account_expiring_in(seconds: u64) -> Account {
        Account::from_login(
            &McToken::new("mc-old".to_string(), seconds),
            McProfile {
                id: "069a79f444e94726a5befca90e38aaf5".to_string(),
                name: "Steve".to_string(),
            },
            Some("ms-refresh".to_string()),
        )
    }

    async fn mount_chain(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ms-new",
                "refresh_token": "ms-refresh-new",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Token": "xbl-token",
                "DisplayClaims": {"xui": [{"uhs": "hash-1"}]}
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/xsts/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Token": "xsts-token",
                "DisplayClaims": {"xui": [{"uhs": "hash-1"}]}
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/authentication/login_with_xbox"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "username": "069a79f444e94726a5befca90e38aaf5",
                "access_token": "mc-new",
                "token_type": "Bearer",
                "expires_in": 86400
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/minecraft/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "069a79f444e94726a5befca90e38aaf5",
                "name": "Steve"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fresh_token_issues_no_network_calls() {
        let server = MockServer::start().await;
        // Any request at all is a failure
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let coordinator = coordinator_for(&server);
        let account = account_expiring_in(3600);
        let result = coordinator.ensure_fresh(&account).await.unwrap();
        assert_eq!(result, account);
    }

    #[tokio::test]
    async fn stale_token_triggers_a_full_renewal() {
        let server = MockServer::start().await;
        mount_chain(&server).await;

        let coordinator = coordinator_for(&server);
        let account = account_expiring_in(10);
        let renewed = coordinator.ensure_fresh(&account).await.unwrap();

        assert_eq!(renewed.access_token, "mc-new");
        assert_eq!(renewed.local_id, account.local_id);
        assert_eq!(renewed.msa_refresh_token.as_deref(), Some("ms-refresh-new"));
        assert!(renewed.access_token_expires_at > account.access_token_expires_at);
    }

    #[tokio::test]
    async fn rejected_refresh_token_requires_reauth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let coordinator = coordinator_for(&server);
        let account = account_expiring_in(10);
        let err = coordinator.ensure_fresh(&account).await.unwrap_err();
        assert!(matches!(err, AuthError::ReauthRequired));
    }

    #[tokio::test]
    async fn missing_refresh_token_requires_reauth() {
        let server = MockServer::start().await;
        let coordinator = coordinator_for(&server);
        let mut account = account_expiring_in(10);
        account.msa_refresh_token = None;

        let err = coordinator.ensure_fresh(&account).await.unwrap_err();
        assert!(matches!(err, AuthError::ReauthRequired));
    }
}
