use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{AuthConfig, OAUTH_SCOPE, RP_MINECRAFT, RP_XBOXLIVE_AUTH};
use crate::errors::{AuthError, Result, XstsError};
use crate::models::*;
use crate::session::{McToken, MsTokens, XblToken, XstsToken};

/// Outcome of a single device-token poll request
#[derive(Debug, Clone)]
pub enum DevicePollStep {
    /// The user approved; tokens were issued
    Issued(MsTokens),
    /// Approval still pending, poll again after the interval
    Pending,
    /// The platform asked to increase the polling interval
    SlowDown,
    /// The user declined the request
    Denied,
    /// The device code expired before approval
    Expired,
}

/// HTTP client for the Microsoft identity platform, Xbox Live, XSTS and
/// Minecraft services endpoints. Each hop of the token chain is one
/// request/response method so hops can be tested in isolation.
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: AuthConfig,
    http: Client,
}

impl AuthClient {
    /// Create a new authentication client
    pub fn new(config: AuthConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("opal-launcher"))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Build the authorization URL for the user's browser
    #[instrument(skip(self))]
    pub fn build_authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoints.authorize)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", OAUTH_SCOPE)
            .append_pair("prompt", "select_account")
            .append_pair("state", state);

        debug!("Built authorize URL: {}", url);
        Ok(url)
    }

    /// Request a device code from the identity platform
    #[instrument(skip(self))]
    pub async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        debug!("Requesting device code");
        let response = self
            .http
            .post(&self.config.endpoints.device_code)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Issue exactly one poll request against the token endpoint.
    ///
    /// The caller owns the polling loop and its pacing; protocol-level
    /// rejections come back as [`DevicePollStep`] variants so the flow
    /// state machine can react deterministically.
    #[instrument(skip(self, device_code))]
    pub async fn poll_device_token(&self, device_code: &str) -> Result<DevicePollStep> {
        let response = self
            .http
            .post(&self.config.endpoints.token)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("client_id", self.config.client_id.as_str()),
                ("device_code", device_code),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            let tokens: MsTokenResponse = response.json().await?;
            return Ok(DevicePollStep::Issued(MsTokens::new(
                tokens.access_token,
                tokens.refresh_token,
                tokens.expires_in,
            )));
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<MsTokenErrorResponse>(&body) {
            Ok(err) => match err.error.as_str() {
                "authorization_pending" => Ok(DevicePollStep::Pending),
                "slow_down" => Ok(DevicePollStep::SlowDown),
                "expired_token" => Ok(DevicePollStep::Expired),
                "access_denied" => Ok(DevicePollStep::Denied),
                other => {
                    warn!("Unexpected device poll error: {}", other);
                    Err(AuthError::Http {
                        status,
                        body_snippet: body.chars().take(200).collect(),
                    })
                }
            },
            Err(_) => Err(AuthError::Http {
                status,
                body_snippet: body.chars().take(200).collect(),
            }),
        }
    }

    /// Exchange an authorization code for Microsoft tokens
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<MsTokens> {
        debug!("Exchanging authorization code for tokens");
        let response = self
            .http
            .post(&self.config.endpoints.token)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await?;

        self.decode_token_response(response).await
    }

    /// Refresh Microsoft tokens using a stored refresh token
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_ms_token(&self, refresh_token: &str) -> Result<MsTokens> {
        debug!("Refreshing Microsoft access token");
        let response = self
            .http
            .post(&self.config.endpoints.token)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await?;

        self.decode_token_response(response).await
    }

    async fn decode_token_response(&self, response: reqwest::Response) -> Result<MsTokens> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if let Ok(err) = serde_json::from_str::<MsTokenErrorResponse>(&body)
                && err.error == "invalid_grant"
            {
                return Err(AuthError::OAuthInvalidGrant);
            }

            return Err(AuthError::Http {
                status,
                body_snippet: body.chars().take(200).collect(),
            });
        }

        let tokens: MsTokenResponse = response.json().await?;
        Ok(MsTokens::new(
            tokens.access_token,
            tokens.refresh_token,
            tokens.expires_in,
        ))
    }

    /// Authenticate with Xbox Live
    #[instrument(skip(self, ms_access_token))]
    pub async fn xbl_authenticate(&self, ms_access_token: &str) -> Result<XblToken> {
        debug!("Authenticating with Xbox Live");
        let response = self
            .xbl_request(&format!("d={}", ms_access_token))
            .await?;

        // Some token audiences want the ticket without the "d=" prefix;
        // retry once before giving up.
        let response = if response.status() == StatusCode::BAD_REQUEST {
            warn!("XBL authentication failed, retrying without 'd=' prefix");
            let retry = self.xbl_request(ms_access_token).await?;
            if !retry.status().is_success() {
                return Err(AuthError::XblBadRequest);
            }
            retry
        } else if !response.status().is_success() {
            return Err(http_error(response).await);
        } else {
            response
        };

        let xbl_response: XblAuthResponse = response.json().await?;
        let uhs = first_uhs(&xbl_response.display_claims)?;

        Ok(XblToken {
            token: xbl_response.token,
            uhs,
            not_after: xbl_response.not_after,
        })
    }

    async fn xbl_request(&self, rps_ticket: &str) -> Result<reqwest::Response> {
        let request = XblAuthRequest {
            properties: XblAuthProperties {
                auth_method: "RPS".to_string(),
                site_name: "user.auth.xboxlive.com".to_string(),
                rps_ticket: rps_ticket.to_string(),
            },
            relying_party: RP_XBOXLIVE_AUTH.to_string(),
            token_type: "JWT".to_string(),
        };

        Ok(self
            .http
            .post(&self.config.endpoints.xbl_authenticate)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?)
    }

    /// Authorize with XSTS against the Minecraft relying party
    #[instrument(skip(self, xbl_token))]
    pub async fn xsts_authorize(&self, xbl_token: &str) -> Result<XstsToken> {
        let request = XstsAuthRequest {
            properties: XstsAuthProperties {
                sandbox_id: "RETAIL".to_string(),
                user_tokens: vec![xbl_token.to_string()],
            },
            relying_party: RP_MINECRAFT.to_string(),
            token_type: "JWT".to_string(),
        };

        debug!("Authorizing with XSTS");
        let response = self
            .http
            .post(&self.config.endpoints.xsts_authorize)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let error_response: XstsErrorResponse = response.json().await?;
            return Err(XstsError::from_xerr(error_response.xerr).into());
        }

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let xsts_response: XstsAuthResponse = response.json().await?;
        let uhs = first_uhs(&xsts_response.display_claims)?;

        Ok(XstsToken {
            token: xsts_response.token,
            uhs,
            not_after: xsts_response.not_after,
        })
    }

    /// Login to Minecraft services with an XSTS token and its user hash
    #[instrument(skip(self, xsts_token, uhs))]
    pub async fn mc_login(&self, xsts_token: &str, uhs: &str) -> Result<McToken> {
        let identity_token = format!("XBL3.0 x={};{}", uhs, xsts_token);
        let request = McLoginRequest { identity_token };

        debug!("Logging in to Minecraft services");
        let response = self
            .http
            .post(&self.config.endpoints.mc_login)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let mc_response: McLoginResponse = response.json().await?;
        Ok(McToken::new(mc_response.access_token, mc_response.expires_in))
    }

    /// Fetch the Minecraft profile for a game-service token
    #[instrument(skip(self, mc_access_token))]
    pub async fn fetch_profile(&self, mc_access_token: &str) -> Result<McProfile> {
        debug!("Fetching Minecraft profile");
        let response = self
            .http
            .get(&self.config.endpoints.mc_profile)
            .header("Authorization", format!("Bearer {}", mc_access_token))
            .send()
            .await?;

        // No profile resource means the account does not own the game
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AuthError::NoMinecraftProfile);
        }

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        Ok(response.json().await?)
    }
}

fn first_uhs(claims: &XblDisplayClaims) -> Result<String> {
    claims
        .xui
        .first()
        .map(|user| user.uhs.clone())
        .ok_or_else(|| AuthError::InvalidResponse("Missing XUI claims".to_string()))
}

async fn http_error(response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AuthError::Http {
        status,
        body_snippet: body.chars().take(200).collect(),
    }
}
