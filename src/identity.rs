//! Display-only identity decoded from the bearer token.

use base64::engine::general_purpose::URL_SAFE as B64;
use base64::Engine as _;
use serde::Deserialize;

/// User attributes carried in the token payload.
///
/// Decoded client-side purely for display (username in the title bar, the
/// admin section toggle, the 2FA settings hint). The server re-validates the
/// token on every request; nothing in this crate gates an operation on
/// these fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub totp_enabled: bool,
}

/// Decode the payload segment of a JWT without verifying the signature.
///
/// Returns `None` unless the token has exactly three `.`-separated segments
/// and the middle one is valid base64url-encoded JSON. Payload segments come
/// unpadded, so the segment is `=`-padded to a multiple of 4 first.
pub fn decode_identity(token: &str) -> Option<Identity> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let mut payload = segments[1].to_owned();
    while payload.len() % 4 != 0 {
        payload.push('=');
    }

    let bytes = B64.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
