//! Persisted server profiles and the active-server switch.
//!
//! A profile is a named (name, URL) pair the user can hop between. Every
//! mutation persists the full list eagerly. Switching the active profile
//! pushes its URL into the transport; it deliberately does NOT clear the
//! bearer token. The session layer owns that (tokens are scoped to the
//! server that issued them).

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::store::{SettingsStore, ACTIVE_SERVER_KEY, SERVERS_KEY, SERVER_URL_KEY};
use crate::transport::TransportManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerProfile {
    pub id: Uuid,
    pub name: String,
    /// Stored without a trailing slash.
    pub url: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ProfileEvent {
    Added(ServerProfile),
    Updated(ServerProfile),
    Removed(Uuid),
    ActiveChanged(Option<Uuid>),
}

#[derive(Debug, Default)]
struct ProfileList {
    servers: Vec<ServerProfile>,
    active: Option<Uuid>,
}

pub struct ProfileStore {
    store: Arc<SettingsStore>,
    transport: Arc<TransportManager>,
    inner: Mutex<ProfileList>,
    events: broadcast::Sender<ProfileEvent>,
}

impl ProfileStore {
    /// Load the profile list from the settings store. A missing or corrupt
    /// list yields an empty store. Runs the legacy single-server migration
    /// before anything profile-dependent can happen.
    pub fn load(store: Arc<SettingsStore>, transport: Arc<TransportManager>) -> Result<Self> {
        let servers: Vec<ServerProfile> = store.get(SERVERS_KEY).unwrap_or_default();
        let active: Option<Uuid> = store.get(ACTIVE_SERVER_KEY);
        let (events, _) = broadcast::channel(16);

        let profiles = Self {
            store,
            transport,
            inner: Mutex::new(ProfileList { servers, active }),
            events,
        };
        profiles.migrate_legacy_single_server()?;
        Ok(profiles)
    }

    /// Subscribe to profile-list changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ProfileEvent> {
        self.events.subscribe()
    }

    pub fn servers(&self) -> Vec<ServerProfile> {
        self.inner.lock().unwrap().servers.clone()
    }

    pub fn active_server_id(&self) -> Option<Uuid> {
        self.inner.lock().unwrap().active
    }

    pub fn active_server(&self) -> Option<ServerProfile> {
        let list = self.inner.lock().unwrap();
        let active = list.active?;
        list.servers.iter().find(|p| p.id == active).cloned()
    }

    /// Add a profile. The very first profile becomes active immediately;
    /// adding more never changes the active selection.
    pub fn add(&self, name: &str, url: &str) -> Result<ServerProfile> {
        let profile = ServerProfile {
            id: Uuid::now_v7(),
            name: name.to_owned(),
            url: normalize_url(url),
            added_at: Utc::now(),
        };

        let first = {
            let mut list = self.inner.lock().unwrap();
            list.servers.push(profile.clone());
            self.persist_servers(&list)?;
            list.servers.len() == 1
        };

        info!("added server profile {:?}", profile.name);
        let _ = self.events.send(ProfileEvent::Added(profile.clone()));
        if first {
            self.switch_to(&profile)?;
        }
        Ok(profile)
    }

    /// Edit a profile's name and URL. If it is the active profile, the new
    /// URL is pushed into the transport.
    pub fn update(&self, id: Uuid, name: &str, url: &str) -> Result<ServerProfile> {
        let (profile, is_active) = {
            let mut list = self.inner.lock().unwrap();
            let entry = list
                .servers
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or(ClientError::UnknownProfile)?;
            entry.name = name.to_owned();
            entry.url = normalize_url(url);
            let profile = entry.clone();
            let is_active = list.active == Some(id);
            self.persist_servers(&list)?;
            (profile, is_active)
        };

        if is_active {
            self.transport.update_base_url(&profile.url)?;
        }
        let _ = self.events.send(ProfileEvent::Updated(profile.clone()));
        Ok(profile)
    }

    /// Delete a profile. Removing the active one promotes the first
    /// remaining profile, or clears the base URL entirely when none remain.
    pub fn remove(&self, profile: &ServerProfile) -> Result<()> {
        let (was_active, next) = {
            let mut list = self.inner.lock().unwrap();
            list.servers.retain(|p| p.id != profile.id);
            let was_active = list.active == Some(profile.id);
            let next = if was_active {
                list.servers.first().cloned()
            } else {
                None
            };
            if was_active && next.is_none() {
                list.active = None;
                self.persist_active(&list)?;
            }
            self.persist_servers(&list)?;
            (was_active, next)
        };

        info!("removed server profile {:?}", profile.name);
        let _ = self.events.send(ProfileEvent::Removed(profile.id));
        if was_active {
            match next {
                Some(next) => self.switch_to(&next)?,
                None => {
                    // Unconfigured: requests fail fast until a profile is
                    // added again.
                    self.transport.update_base_url("")?;
                    let _ = self.events.send(ProfileEvent::ActiveChanged(None));
                }
            }
        }
        Ok(())
    }

    /// Make `profile` the active server and point the transport at it.
    pub fn switch_to(&self, profile: &ServerProfile) -> Result<()> {
        {
            let mut list = self.inner.lock().unwrap();
            list.active = Some(profile.id);
            self.persist_active(&list)?;
        }
        self.transport.update_base_url(&profile.url)?;
        info!("active server is now {:?}", profile.name);
        let _ = self.events.send(ProfileEvent::ActiveChanged(Some(profile.id)));
        Ok(())
    }

    /// One-shot migration from the single-URL setting that predates
    /// profiles: synthesize a profile from it and activate it. Idempotent,
    /// since a non-empty profile list makes this a no-op.
    pub fn migrate_legacy_single_server(&self) -> Result<()> {
        {
            let list = self.inner.lock().unwrap();
            if !list.servers.is_empty() {
                return Ok(());
            }
        }
        let legacy = match self.store.get::<String>(SERVER_URL_KEY) {
            Some(url) if !url.is_empty() => url,
            _ => return Ok(()),
        };

        info!("migrating legacy single-server setting into a profile");
        self.add(&display_name_for(&legacy), &legacy)?;
        Ok(())
    }

    fn persist_servers(&self, list: &ProfileList) -> Result<()> {
        self.store.set(SERVERS_KEY, &list.servers)
    }

    fn persist_active(&self, list: &ProfileList) -> Result<()> {
        match list.active {
            Some(id) => self.store.set(ACTIVE_SERVER_KEY, &id),
            None => self.store.remove(ACTIVE_SERVER_KEY),
        }
    }
}

/// Strip a single trailing slash; anything else is stored as typed.
fn normalize_url(url: &str) -> String {
    url.strip_suffix('/').unwrap_or(url).to_owned()
}

/// Display name for a migrated profile, derived from the URL host.
fn display_name_for(url: &str) -> String {
    match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_owned)) {
        Some(host) if host == "localhost" || host == "127.0.0.1" => "Local".to_owned(),
        Some(host) => host,
        None => "Server".to_owned(),
    }
}
