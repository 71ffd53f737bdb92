use std::time::Duration;

/// Production authentication endpoints.
///
/// Kept as a struct rather than bare constants so tests can point the
/// client at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize: String,
    pub device_code: String,
    pub token: String,
    pub xbl_authenticate: String,
    pub xsts_authorize: String,
    pub mc_login: String,
    pub mc_profile: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize"
                .to_string(),
            device_code: "https://login.microsoftonline.com/consumers/oauth2/v2.0/devicecode"
                .to_string(),
            token: "https://login.microsoftonline.com/consumers/oauth2/v2.0/token".to_string(),
            xbl_authenticate: "https://user.auth.xboxlive.com/user/authenticate".to_string(),
            xsts_authorize: "https://xsts.auth.xboxlive.com/xsts/authorize".to_string(),
            mc_login: "https://api.minecraftservices.com/authentication/login_with_xbox"
                .to_string(),
            mc_profile: "https://api.minecraftservices.com/minecraft/profile".to_string(),
        }
    }
}

impl Endpoints {
    /// Route every endpoint to a single base URL (mock servers in tests).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{base}/oauth2/authorize"),
            device_code: format!("{base}/oauth2/devicecode"),
            token: format!("{base}/oauth2/token"),
            xbl_authenticate: format!("{base}/user/authenticate"),
            xsts_authorize: format!("{base}/xsts/authorize"),
            mc_login: format!("{base}/authentication/login_with_xbox"),
            mc_profile: format!("{base}/minecraft/profile"),
        }
    }
}

/// OAuth scope requested from the Microsoft identity platform
pub const OAUTH_SCOPE: &str = "XboxLive.signin offline_access";

/// Relying parties
pub const RP_MINECRAFT: &str = "rp://api.minecraftservices.com/";
pub const RP_XBOXLIVE_AUTH: &str = "http://auth.xboxlive.com";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Pacing hints for the caller-driven device-code polling loop.
///
/// The orchestrator never sleeps; these values are what a UI should use
/// when the device-code response omits an interval or the platform asks
/// to slow down.
#[derive(Debug, Clone)]
pub struct DevicePollPolicy {
    /// Interval to use when the devicecode response carries none
    pub fallback_interval: Duration,
    /// Added to the current interval after a slow_down response
    pub slow_down_increment: Duration,
}

impl Default for DevicePollPolicy {
    fn default() -> Self {
        Self {
            fallback_interval: Duration::from_secs(5),
            slow_down_increment: Duration::from_secs(5),
        }
    }
}

/// Configuration for [`crate::AuthClient`]
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Azure application (client) ID
    pub client_id: String,

    /// Upstream endpoint URLs
    pub endpoints: Endpoints,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,

    /// How long before expiry a stored game token counts as stale
    pub refresh_margin: Duration,

    /// Device-code polling pace hints
    pub poll: DevicePollPolicy,

    /// Path the loopback redirect listener answers on
    pub callback_path: String,

    /// Maximum lifetime of an authorization-code flow session
    pub code_flow_timeout: Duration,
}

impl AuthConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            endpoints: Endpoints::default(),
            http_timeouts: HttpTimeouts::default(),
            user_agent: Some("opal-launcher".to_string()),
            refresh_margin: Duration::from_secs(60),
            poll: DevicePollPolicy::default(),
            callback_path: "/callback".to_string(),
            code_flow_timeout: Duration::from_secs(900),
        }
    }
}
