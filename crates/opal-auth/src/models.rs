use serde::{Deserialize, Serialize};

/// Device authorization response from the devicecode endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub interval: Option<u64>,
    pub expires_in: u64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Microsoft OAuth token response (code, device_code and refresh_token grants)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body returned by the token endpoint on a non-success status
#[derive(Debug, Clone, Deserialize)]
pub struct MsTokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Xbox Live user.authenticate request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XblAuthRequest {
    pub properties: XblAuthProperties,
    pub relying_party: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XblAuthProperties {
    pub auth_method: String,
    pub site_name: String,
    pub rps_ticket: String,
}

/// Xbox Live user.authenticate response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct XblAuthResponse {
    pub token: String,
    pub display_claims: XblDisplayClaims,
    #[serde(default)]
    pub issue_instant: Option<String>,
    #[serde(default)]
    pub not_after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XblDisplayClaims {
    pub xui: Vec<XblUserInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XblUserInfo {
    pub uhs: String,
}

/// XSTS authorize request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XstsAuthRequest {
    pub properties: XstsAuthProperties,
    pub relying_party: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XstsAuthProperties {
    pub sandbox_id: String,
    pub user_tokens: Vec<String>,
}

/// XSTS authorize response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct XstsAuthResponse {
    pub token: String,
    pub display_claims: XblDisplayClaims,
    #[serde(default)]
    pub issue_instant: Option<String>,
    #[serde(default)]
    pub not_after: Option<String>,
}

/// XSTS error response
#[derive(Debug, Clone, Deserialize)]
pub struct XstsErrorResponse {
    #[serde(rename = "XErr")]
    pub xerr: u64,
    #[serde(default, rename = "Message")]
    pub message: Option<String>,
}

/// Minecraft login_with_xbox request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McLoginRequest {
    pub identity_token: String,
}

/// Minecraft login_with_xbox response
#[derive(Debug, Clone, Deserialize)]
pub struct McLoginResponse {
    pub username: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Minecraft profile response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McProfile {
    /// UUID without dashes
    pub id: String,
    /// Player name
    pub name: String,
}

impl McProfile {
    /// The services API answers some unowned accounts with a reserved
    /// all-zero profile id instead of a 404; such a profile must never
    /// become a playable account.
    pub fn is_placeholder(&self) -> bool {
        is_placeholder_id(&self.id)
    }
}

/// True for empty or all-zero profile ids, dashed or undashed
pub fn is_placeholder_id(id: &str) -> bool {
    let mut digits = id.chars().filter(|c| *c != '-').peekable();
    if digits.peek().is_none() {
        return true;
    }
    digits.all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_ids_are_detected() {
        assert!(is_placeholder_id(""));
        assert!(is_placeholder_id("00000000000000000000000000000000"));
        assert!(is_placeholder_id("00000000-0000-0000-0000-000000000000"));
        assert!(!is_placeholder_id("069a79f444e94726a5befca90e38aaf5"));
    }

    #[test]
    fn xbl_request_serializes_pascal_case() {
        let request = XblAuthRequest {
            properties: XblAuthProperties {
                auth_method: "RPS".to_string(),
                site_name: "user.auth.xboxlive.com".to_string(),
                rps_ticket: "d=token".to_string(),
            },
            relying_party: "http://auth.xboxlive.com".to_string(),
            token_type: "JWT".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Properties"]["RpsTicket"], "d=token");
        assert_eq!(json["RelyingParty"], "http://auth.xboxlive.com");
    }
}
