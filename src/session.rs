//! Login/logout state machine and the identity derived from the bearer token.
//!
//! The flow is linear: `LoggedOut` → (`AwaitingTotp`) → `LoggedIn`, with
//! `logout()` reachable from anywhere. A successful login adopts the token
//! into the transport *before* reporting success, so the very next request
//! already carries the new credential. No operation here retries.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::gateway::RequestGateway;
use crate::identity::{decode_identity, Identity};
use crate::models::{LoginRequest, LoginResponse, SetupStatus, TotpVerifyRequest};
use crate::transport::TransportManager;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthFlowState {
    #[default]
    LoggedOut,
    /// Login succeeded but the account has a second factor; holds the
    /// short-lived challenge token until the code is verified.
    AwaitingTotp { pending_token: String },
    LoggedIn { identity: Option<Identity> },
}

/// What a successful `login` call resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    LoggedIn { identity: Option<Identity> },
    /// Not an error; the caller should prompt for a TOTP code and call
    /// [`AuthSession::verify_totp`].
    TotpRequired,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    LoggedIn { identity: Option<Identity> },
    TotpChallenge,
    LoggedOut,
}

#[derive(Debug, Default)]
struct SessionState {
    flow: AuthFlowState,
    must_change_password: bool,
}

pub struct AuthSession {
    gateway: RequestGateway,
    transport: Arc<TransportManager>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl AuthSession {
    pub fn new(gateway: RequestGateway, transport: Arc<TransportManager>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            gateway,
            transport,
            state: Mutex::new(SessionState::default()),
            events,
        }
    }

    /// Subscribe to session state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn flow_state(&self) -> AuthFlowState {
        self.state.lock().unwrap().flow.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.state.lock().unwrap().flow, AuthFlowState::LoggedIn { .. })
    }

    pub fn current_identity(&self) -> Option<Identity> {
        match &self.state.lock().unwrap().flow {
            AuthFlowState::LoggedIn { identity } => identity.clone(),
            _ => None,
        }
    }

    pub fn must_change_password(&self) -> bool {
        self.state.lock().unwrap().must_change_password
    }

    /// Authenticate with username/password.
    ///
    /// Accounts with a second factor get a [`LoginOutcome::TotpRequired`]
    /// back and no token is adopted yet. Any transport or HTTP failure
    /// leaves the session logged out.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let body = LoginRequest {
            username: username.to_owned(),
            password: password.to_owned(),
        };
        let resp: LoginResponse = self.gateway.post("/login", &body).await?;

        if resp.totp_required {
            let pending_token = resp.totp_token.ok_or(ClientError::MissingToken)?;
            self.state.lock().unwrap().flow = AuthFlowState::AwaitingTotp { pending_token };
            info!("login requires a second factor");
            let _ = self.events.send(SessionEvent::TotpChallenge);
            return Ok(LoginOutcome::TotpRequired);
        }

        let identity = self.adopt(resp)?;
        info!("logged in as {username}");
        Ok(LoginOutcome::LoggedIn { identity })
    }

    /// Exchange the pending challenge token and a TOTP code for a full
    /// session. Only valid while a challenge is pending; a failed exchange
    /// keeps the challenge so the user can retry.
    pub async fn verify_totp(&self, code: &str) -> Result<Option<Identity>> {
        let pending_token = match &self.state.lock().unwrap().flow {
            AuthFlowState::AwaitingTotp { pending_token } => pending_token.clone(),
            _ => return Err(ClientError::NotAwaitingTotp),
        };

        let body = TotpVerifyRequest {
            totp_token: pending_token,
            code: code.to_owned(),
        };
        let resp: LoginResponse = self.gateway.post("/totp/verify", &body).await?;

        let identity = self.adopt(resp)?;
        info!("second factor accepted");
        Ok(identity)
    }

    /// Drop the session from any state: clears the token, the identity, the
    /// password-change flag, and any pending challenge. Idempotent.
    pub fn logout(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if matches!(state.flow, AuthFlowState::LoggedOut)
                && self.transport.current_token().is_none()
            {
                return Ok(());
            }
            state.flow = AuthFlowState::LoggedOut;
            state.must_change_password = false;
        }
        self.transport.set_token(None)?;
        info!("logged out");
        let _ = self.events.send(SessionEvent::LoggedOut);
        Ok(())
    }

    /// The active server changed; the token it issued is worthless on the
    /// new one.
    pub fn handle_profile_switch(&self) -> Result<()> {
        debug!("active server changed, dropping session");
        self.logout()
    }

    /// First-run probe, passed through for the login screen.
    pub async fn setup_status(&self) -> Result<SetupStatus> {
        self.gateway.fetch_setup_status().await
    }

    /// Tail shared by `login` and `verify_totp`: adopt the token into the
    /// transport first, then flip the state and notify listeners.
    fn adopt(&self, resp: LoginResponse) -> Result<Option<Identity>> {
        let token = resp.access_token.ok_or(ClientError::MissingToken)?;
        self.transport.set_token(Some(token.clone()))?;

        let identity = decode_identity(&token);
        if identity.is_none() {
            debug!("issued token carried no decodable identity");
        }

        {
            let mut state = self.state.lock().unwrap();
            state.flow = AuthFlowState::LoggedIn {
                identity: identity.clone(),
            };
            state.must_change_password = resp.must_change_password;
        }
        let _ = self.events.send(SessionEvent::LoggedIn {
            identity: identity.clone(),
        });
        Ok(identity)
    }
}
