//! A cached façade over a remote container engine.
//!
//! [`DaemonSession`] keeps a local, point-in-time [`ResourceSnapshot`] of the
//! engine's containers, images, networks, and volumes. Every mutation goes
//! out through an [`EngineGateway`] and, on success, triggers a refresh of
//! exactly the category it touched, so the snapshot stays consistent with
//! respect to mutations issued through the session.

// Re-export the core crate and the client used in public interfaces
pub use berth_core as core;
pub use berth_core::bollard;
pub use berth_core::{DaemonError, EngineGateway, OptionMap, ResourceKind, Result};

pub mod docker;
pub mod session;
pub mod snapshot;
pub mod testing;

pub use docker::DockerGateway;
pub use session::{DaemonSession, SessionConfig, DEFAULT_SEARCH_LIMIT};
pub use snapshot::{RefreshStamps, ResourceSnapshot};
