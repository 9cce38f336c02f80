//! High-level `DepotClient` wiring the store, transport, profiles, and session.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::gateway::RequestGateway;
use crate::profiles::{ProfileStore, ServerProfile};
use crate::session::AuthSession;
use crate::store::SettingsStore;
use crate::transport::{TransportConfig, TransportManager};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// File the profile list and last-used URL persist to.
    pub settings_path: PathBuf,
    pub transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            transport: TransportConfig::default(),
        }
    }
}

/// The assembled client core. UI layers hold one of these and reach the
/// pieces through the accessors; the cross-cutting ordering rules (log out
/// before switching servers) live in the convenience methods here.
pub struct DepotClient {
    transport: Arc<TransportManager>,
    gateway: RequestGateway,
    profiles: ProfileStore,
    session: AuthSession,
}

impl DepotClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store = Arc::new(SettingsStore::open(config.settings_path));
        let transport = Arc::new(TransportManager::new(config.transport, store.clone())?);
        let gateway = RequestGateway::new(transport.clone());
        let profiles = ProfileStore::load(store, transport.clone())?;
        let session = AuthSession::new(gateway.clone(), transport.clone());
        Ok(Self {
            transport,
            gateway,
            profiles,
            session,
        })
    }

    pub fn transport(&self) -> &TransportManager {
        &self.transport
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Switch the active server. The current session is dropped first,
    /// since bearer tokens are scoped to the server that issued them.
    pub fn switch_profile(&self, profile: &ServerProfile) -> Result<()> {
        self.session.handle_profile_switch()?;
        self.profiles.switch_to(profile)
    }

    /// Remove a profile, dropping the session first when it is the active
    /// one.
    pub fn remove_profile(&self, profile: &ServerProfile) -> Result<()> {
        if self.profiles.active_server_id() == Some(profile.id) {
            self.session.handle_profile_switch()?;
        }
        self.profiles.remove(profile)
    }
}
