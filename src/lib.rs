//! Depot client core — server profiles, the authenticated HTTP transport,
//! and the login/2FA session state machine.
//!
//! The UI shells (desktop, TUI) consume this crate through four pieces:
//! [`ProfileStore`] for the persisted server list, [`TransportManager`] for
//! the live HTTP client bound to the active server and token,
//! [`RequestGateway`] for typed REST calls, and [`AuthSession`] for the
//! login flow. [`DepotClient`] wires them together.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use depot_client::{ClientConfig, DepotClient, LoginOutcome};
//!
//! #[tokio::main]
//! async fn main() -> depot_client::Result<()> {
//!     let client = DepotClient::new(ClientConfig::new("settings.json"))?;
//!     client.profiles().add("Local", "http://localhost:8080")?;
//!
//!     match client.session().login("admin", "hunter2").await? {
//!         LoginOutcome::LoggedIn { identity } => {
//!             println!("hello {:?}", identity.map(|i| i.username));
//!         }
//!         LoginOutcome::TotpRequired => {
//!             client.session().verify_totp("123456").await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod models;
pub mod profiles;
pub mod session;
pub mod store;
pub mod transport;

pub use client::{ClientConfig, DepotClient};
pub use error::{ClientError, Result};
pub use gateway::RequestGateway;
pub use identity::{decode_identity, Identity};
pub use models::{LoginResponse, SetupStatus};
pub use profiles::{ProfileEvent, ProfileStore, ServerProfile};
pub use session::{AuthFlowState, AuthSession, LoginOutcome, SessionEvent};
pub use store::SettingsStore;
pub use transport::{Transport, TransportConfig, TransportManager};
