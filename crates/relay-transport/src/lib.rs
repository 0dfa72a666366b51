//! Session lifecycle management and the protocol bridge client.
//!
//! The messaging protocol itself runs in an external sidecar process; this
//! crate owns the connection to it (`BridgeTransport`), the single logical
//! session state machine (`SessionManager`), and credential persistence
//! (`FileCredentialStore`).

pub mod bridge;
pub mod credentials;
pub mod session;

pub use bridge::BridgeTransport;
pub use credentials::FileCredentialStore;
pub use session::{ReconnectPolicy, SessionManager};
