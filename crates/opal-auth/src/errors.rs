use thiserror::Error;

/// Authentication and token-lifecycle error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body_snippet}")]
    Http {
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("OAuth invalid_grant - refresh token may be expired or revoked")]
    OAuthInvalidGrant,

    #[error("Xbox Live authentication failed after retry")]
    XblBadRequest,

    #[error("XSTS authorization denied: {0}")]
    XstsDenied(#[from] XstsError),

    #[error("No Minecraft profile - this account does not own the game")]
    NoMinecraftProfile,

    #[error("OAuth state mismatch - stale or forged redirect rejected")]
    StateMismatch,

    #[error("Redirect was captured without an authorization code")]
    RedirectMissingCode,

    #[error("No login flow in progress - caller bug, start a flow first")]
    FlowNotStarted,

    #[error("Login flow expired before it was approved")]
    FlowExpired,

    #[error("Login flow was denied by the user")]
    FlowDenied,

    #[error("Login flow was cancelled")]
    FlowCancelled,

    #[error("Identity token was already consumed by a previous poll")]
    TokenAlreadyConsumed,

    #[error("Missing refresh token - cannot refresh this account")]
    MissingRefreshToken,

    #[error("Stored credentials can no longer be refreshed - full login required")]
    ReauthRequired,

    #[error("No account with local id '{0}'")]
    AccountNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// XSTS-specific error codes from the XErr field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XstsError {
    #[error("Account doesn't have an Xbox account (XErr: 2148916233)")]
    NoXboxAccount,

    #[error("Xbox Live not available in this country (XErr: 2148916235)")]
    RegionNotSupported,

    #[error("Adult verification required on Xbox page (XErr: 2148916236/2148916237)")]
    AdultVerificationRequired,

    #[error("Child account requires Family (XErr: 2148916238)")]
    ChildAccountRequiresFamily,

    #[error("Unknown XSTS error code: {0}")]
    Unknown(u64),
}

impl XstsError {
    /// Parse XErr code from XSTS response
    pub fn from_xerr(code: u64) -> Self {
        match code {
            2148916233 => Self::NoXboxAccount,
            2148916235 => Self::RegionNotSupported,
            2148916236 | 2148916237 => Self::AdultVerificationRequired,
            2148916238 => Self::ChildAccountRequiresFamily,
            code => Self::Unknown(code),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
