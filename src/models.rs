//! Wire types for the authentication endpoints.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response shape shared by `POST /login` and `POST /totp/verify`.
///
/// When the account has a second factor enrolled, `/login` answers with
/// `totp_required: true` and a short-lived `totp_token` instead of an
/// access token.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub must_change_password: bool,
    #[serde(default)]
    pub totp_required: bool,
    #[serde(default)]
    pub totp_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotpVerifyRequest {
    pub totp_token: String,
    pub code: String,
}

/// `GET /setup_status` — whether the server still needs its first admin.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SetupStatus {
    pub setup_required: bool,
}
