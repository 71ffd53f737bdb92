//! Login flow orchestration.
//!
//! Both supported flows are driven by the caller: `start_*` performs the
//! initial request and `poll_*` issues exactly one network request per
//! call, so there is no hidden background task and cancellation is simply
//! a matter of not polling again (or calling [`FlowOrchestrator::cancel`]).

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::account::random_hex;
use crate::client::{AuthClient, DevicePollStep};
use crate::errors::{AuthError, Result};
use crate::redirect::RedirectListener;
use crate::session::MsTokens;

/// Challenge returned by [`FlowOrchestrator::start_device_flow`]
#[derive(Debug, Clone)]
pub struct DeviceChallenge {
    pub device_code: String,
    /// Short code the user types at the verification URI
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds the caller should wait between polls
    pub interval: u64,
    pub expires_in: u64,
}

/// Challenge returned by [`FlowOrchestrator::start_code_flow`]
#[derive(Debug, Clone)]
pub struct CodeChallenge {
    /// URL to open in the user's browser
    pub auth_url: Url,
    /// State nonce embedded in the URL; pass it back to `poll_code_flow`
    pub state: String,
    /// Port the redirect listener is bound to
    pub local_port: u16,
}

/// Non-error outcome of a device-flow poll
#[derive(Debug, Clone)]
pub enum DevicePoll {
    Token(MsTokens),
    Pending,
    SlowDown,
}

/// Non-error outcome of a code-flow poll
#[derive(Debug, Clone)]
pub enum CodePoll {
    Token(MsTokens),
    Pending,
}

/// One in-flight login attempt.
///
/// Modeled as a tagged union so illegal combinations (resolved but still
/// polling, listener without a nonce) are unrepresentable.
#[derive(Debug)]
enum FlowSession {
    Polling {
        device_code: String,
        deadline: DateTime<Utc>,
    },
    AwaitingRedirect {
        state: String,
        redirect_uri: String,
        listener: RedirectListener,
        deadline: DateTime<Utc>,
    },
    /// Terminal: the identity token was handed out exactly once
    Resolved,
    Denied,
    Expired,
    Cancelled,
}

/// Drives the two supported login flows as explicit state machines
#[derive(Debug)]
pub struct FlowOrchestrator {
    client: AuthClient,
    session: Option<FlowSession>,
}

impl FlowOrchestrator {
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            session: None,
        }
    }

    /// Request a device code and enter the polling state.
    ///
    /// Starting a new flow discards any previous session, stopping its
    /// listener if one was bound.
    #[instrument(skip(self))]
    pub async fn start_device_flow(&mut self) -> Result<DeviceChallenge> {
        self.session = None;

        let response = self.client.request_device_code().await?;
        let interval = response
            .interval
            .unwrap_or_else(|| self.client.config().poll.fallback_interval.as_secs());
        let deadline = Utc::now() + chrono::Duration::seconds(response.expires_in as i64);

        info!("Device flow started, code expires in {}s", response.expires_in);
        self.session = Some(FlowSession::Polling {
            device_code: response.device_code.clone(),
            deadline,
        });

        Ok(DeviceChallenge {
            device_code: response.device_code,
            user_code: response.user_code,
            verification_uri: response.verification_uri,
            interval,
            expires_in: response.expires_in,
        })
    }

    /// Issue one poll against the token endpoint.
    ///
    /// The caller is responsible for pacing calls by the challenge
    /// interval (plus the slow-down increment after [`DevicePoll::SlowDown`]).
    #[instrument(skip(self, device_code))]
    pub async fn poll_device_flow(&mut self, device_code: &str) -> Result<DevicePoll> {
        match self.session {
            Some(FlowSession::Polling {
                device_code: ref expected,
                deadline,
            }) => {
                if device_code != expected {
                    return Err(AuthError::FlowNotStarted);
                }
                if Utc::now() >= deadline {
                    warn!("Device flow session expired before approval");
                    self.session = Some(FlowSession::Expired);
                    return Err(AuthError::FlowExpired);
                }
            }
            Some(FlowSession::Resolved) => return Err(AuthError::TokenAlreadyConsumed),
            Some(FlowSession::Expired) => return Err(AuthError::FlowExpired),
            Some(FlowSession::Denied) => return Err(AuthError::FlowDenied),
            Some(FlowSession::Cancelled) => return Err(AuthError::FlowCancelled),
            Some(FlowSession::AwaitingRedirect { .. }) | None => {
                return Err(AuthError::FlowNotStarted);
            }
        }

        match self.client.poll_device_token(device_code).await? {
            DevicePollStep::Issued(tokens) => {
                info!("Device flow approved, identity token issued");
                self.session = Some(FlowSession::Resolved);
                Ok(DevicePoll::Token(tokens))
            }
            DevicePollStep::Pending => Ok(DevicePoll::Pending),
            DevicePollStep::SlowDown => Ok(DevicePoll::SlowDown),
            DevicePollStep::Denied => {
                warn!("Device flow denied by the user");
                self.session = Some(FlowSession::Denied);
                Err(AuthError::FlowDenied)
            }
            DevicePollStep::Expired => {
                warn!("Device code rejected as expired");
                self.session = Some(FlowSession::Expired);
                Err(AuthError::FlowExpired)
            }
        }
    }

    /// Bind the redirect listener, generate the state nonce and build the
    /// authorize URL for the caller to open in a browser.
    #[instrument(skip(self))]
    pub async fn start_code_flow(&mut self) -> Result<CodeChallenge> {
        self.session = None;

        let config = self.client.config().clone();
        let listener = RedirectListener::bind(&config.callback_path).await?;
        let local_port = listener.local_port();
        let state = random_hex(16);
        let redirect_uri = format!("http://127.0.0.1:{local_port}{}", config.callback_path);
        let auth_url = self.client.build_authorize_url(&redirect_uri, &state)?;
        let deadline = Utc::now()
            + chrono::Duration::from_std(config.code_flow_timeout)
                .unwrap_or(chrono::Duration::seconds(900));

        info!("Code flow started, listening on port {}", local_port);
        self.session = Some(FlowSession::AwaitingRedirect {
            state: state.clone(),
            redirect_uri,
            listener,
            deadline,
        });

        Ok(CodeChallenge {
            auth_url,
            state,
            local_port,
        })
    }

    /// Check whether the listener captured a matching redirect and, if so,
    /// exchange the authorization code for an identity token.
    #[instrument(skip(self, state))]
    pub async fn poll_code_flow(&mut self, state: &str) -> Result<CodePoll> {
        let (code, redirect_uri) = match self.session {
            Some(FlowSession::AwaitingRedirect {
                state: ref expected,
                ref redirect_uri,
                ref listener,
                deadline,
            }) => {
                if state != expected {
                    return Err(AuthError::StateMismatch);
                }
                if Utc::now() >= deadline {
                    warn!("Code flow session expired before the redirect arrived");
                    self.session = Some(FlowSession::Expired);
                    return Err(AuthError::FlowExpired);
                }

                let Some(capture) = listener.take_capture() else {
                    return Ok(CodePoll::Pending);
                };

                if let Some(error) = capture.error {
                    warn!("Identity platform redirected with error: {}", error);
                    self.session = Some(FlowSession::Denied);
                    return Err(AuthError::FlowDenied);
                }
                if capture.state.as_deref() != Some(expected) {
                    // Stale or forged nonce; the capture is discarded and
                    // the flow keeps waiting for the genuine redirect.
                    warn!("Redirect state nonce mismatch, capture discarded");
                    return Err(AuthError::StateMismatch);
                }
                let Some(code) = capture.code else {
                    return Err(AuthError::RedirectMissingCode);
                };
                (code, redirect_uri.clone())
            }
            Some(FlowSession::Resolved) => return Err(AuthError::TokenAlreadyConsumed),
            Some(FlowSession::Expired) => return Err(AuthError::FlowExpired),
            Some(FlowSession::Denied) => return Err(AuthError::FlowDenied),
            Some(FlowSession::Cancelled) => return Err(AuthError::FlowCancelled),
            Some(FlowSession::Polling { .. }) | None => return Err(AuthError::FlowNotStarted),
        };

        debug!("Redirect captured, exchanging authorization code");
        match self.client.exchange_code(&code, &redirect_uri).await {
            Ok(tokens) => {
                info!("Code flow resolved, identity token issued");
                // Dropping AwaitingRedirect stops the listener
                self.session = Some(FlowSession::Resolved);
                Ok(CodePoll::Token(tokens))
            }
            Err(e) => {
                // The single-use code is spent; this attempt cannot recover
                warn!("Code exchange failed: {}", e);
                self.session = Some(FlowSession::Expired);
                Err(e)
            }
        }
    }

    /// Cancel the in-flight flow. Safe from any state, including after
    /// resolution (no-op) and when no flow was started.
    #[instrument(skip(self))]
    pub fn cancel(&mut self) {
        match self.session {
            Some(FlowSession::Resolved) | None => {}
            _ => {
                info!("Login flow cancelled");
                // Replacing the session drops any bound listener
                self.session = Some(FlowSession::Cancelled);
            }
        }
    }
}
