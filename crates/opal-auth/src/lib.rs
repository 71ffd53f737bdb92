//! Microsoft account authentication and token lifecycle for the Opal
//! launcher.
//!
//! This crate owns the two supported login flows (device code and
//! authorization code), the sequential token-exchange chain that turns a
//! Microsoft identity token into a playable game credential, and the
//! persisted account store that mirrors the official launcher's
//! `launcher_accounts.json` on disk.
//!
//! # Token chain
//!
//! 1. OAuth2 with the Microsoft identity platform (device or code flow)
//! 2. Xbox Live authentication
//! 3. XSTS authorization
//! 4. Minecraft services login
//! 5. Profile retrieval
//!
//! # Device code login
//!
//! ```no_run
//! use opal_auth::{AuthClient, AuthConfig, DevicePoll, FlowOrchestrator, TokenChainResolver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), opal_auth::AuthError> {
//!     let client = AuthClient::new(AuthConfig::new("your-azure-client-id"))?;
//!     let mut flow = FlowOrchestrator::new(client.clone());
//!
//!     let challenge = flow.start_device_flow().await?;
//!     println!("Visit {} and enter {}", challenge.verification_uri, challenge.user_code);
//!
//!     let tokens = loop {
//!         tokio::time::sleep(std::time::Duration::from_secs(challenge.interval)).await;
//!         match flow.poll_device_flow(&challenge.device_code).await? {
//!             DevicePoll::Token(tokens) => break tokens,
//!             DevicePoll::Pending | DevicePoll::SlowDown => continue,
//!         }
//!     };
//!
//!     let account = TokenChainResolver::new(client).resolve(&tokens).await?;
//!     println!("Logged in as {}", account.minecraft_profile.name);
//!     Ok(())
//! }
//! ```
//!
//! # Keeping credentials fresh
//!
//! ```no_run
//! use opal_auth::{AccountStore, AuthClient, AuthConfig, AuthError, FileAccountStore, RefreshCoordinator};
//!
//! # async fn example() -> Result<(), AuthError> {
//! let client = AuthClient::new(AuthConfig::new("your-azure-client-id"))?;
//! let store = FileAccountStore::new(FileAccountStore::default_path()?);
//! let coordinator = RefreshCoordinator::from_config(client);
//!
//! if let Some(account) = store.get_active().await? {
//!     match coordinator.ensure_fresh(&account).await {
//!         Ok(fresh) => store.upsert(fresh).await?,
//!         Err(AuthError::ReauthRequired) => {
//!             // stored refresh token is gone; run a login flow again
//!         }
//!         Err(e) => return Err(e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The accounts file is shared with the official launcher; writes are
//! atomic temp-file-then-rename so a partial write is never observable
//! from either side. Tokens are never logged.

pub mod account;
pub mod chain;
pub mod client;
pub mod config;
pub mod errors;
pub mod file_store;
pub mod flow;
pub mod models;
pub mod redirect;
pub mod refresh;
pub mod session;
pub mod store;

// Re-export main types
pub use account::{Account, AccountCollection, AccountType, LauncherProfile};
pub use chain::TokenChainResolver;
pub use client::{AuthClient, DevicePollStep};
pub use config::{AuthConfig, DevicePollPolicy, Endpoints, HttpTimeouts};
pub use errors::{AuthError, Result, XstsError};
pub use file_store::FileAccountStore;
pub use flow::{CodeChallenge, CodePoll, DeviceChallenge, DevicePoll, FlowOrchestrator};
pub use models::McProfile;
pub use redirect::{CapturedRedirect, RedirectListener};
pub use refresh::RefreshCoordinator;
pub use session::{McToken, MsTokens, XblToken, XstsToken};
pub use store::{AccountStore, LoadReport, MemoryAccountStore};

#[cfg(test)]
mod tests {
    //! End-to-end scenario: device login, chain resolution, persistence.

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn device_login_resolves_and_persists_an_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "device-123",
                "user_code": "ABCD-EFGH",
                "verification_uri": "https://microsoft.com/link",
                "interval": 5,
                "expires_in": 900
            })))
            .mount(&server)
            .await;
        // First poll: still waiting for approval
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": "authorization_pending"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        // Approval happened externally; second poll issues tokens
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ms-access",
                "refresh_token": "ms-refresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/user/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Token": "xbl-token",
                "DisplayClaims": {"xui": [{"uhs": "hash-1"}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/xsts/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Token": "xsts-token",
                "DisplayClaims": {"xui": [{"uhs": "hash-1"}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/authentication/login_with_xbox"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "username": "069a79f444e94726a5befca90e38aaf5",
                "access_token": "mc-access",
                "token_type": "Bearer",
                "expires_in": 86400
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/minecraft/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "069a79f444e94726a5befca90e38aaf5",
                "name": "Steve"
            })))
            .mount(&server)
            .await;

        let mut config = AuthConfig::new("test-client-id");
        config.endpoints = Endpoints::with_base(&server.uri());
        let client = AuthClient::new(config).unwrap();

        let mut flow = FlowOrchestrator::new(client.clone());
        let challenge = flow.start_device_flow().await.unwrap();
        assert_eq!(challenge.user_code, "ABCD-EFGH");
        assert_eq!(challenge.interval, 5);
        assert_eq!(challenge.expires_in, 900);

        assert!(matches!(
            flow.poll_device_flow(&challenge.device_code).await.unwrap(),
            DevicePoll::Pending
        ));
        let tokens = match flow.poll_device_flow(&challenge.device_code).await.unwrap() {
            DevicePoll::Token(tokens) => tokens,
            other => panic!("expected token, got {:?}", other),
        };

        let account = TokenChainResolver::new(client)
            .resolve(&tokens)
            .await
            .unwrap();
        assert!(account.is_usable());

        let temp = tempfile::TempDir::new().unwrap();
        let store = FileAccountStore::new(temp.path().join(file_store::ACCOUNTS_FILE));
        store.upsert(account.clone()).await.unwrap();
        store.set_active(&account.local_id).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].minecraft_profile.name, "Steve");
        assert_eq!(
            store.get_active().await.unwrap().unwrap().local_id,
            account.local_id
        );
    }
}
