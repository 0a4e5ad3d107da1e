//! The async seam between the session and a concrete engine.

use async_trait::async_trait;
use bollard::models::{
    ContainerSummary, ImageSearchResponseItem, ImageSummary, Network, SystemInfo, Volume,
};

use crate::spec::{ContainerSpec, NetworkSpec, VolumeSpec};

/// One call per engine endpoint the session uses. Implementations perform
/// the remote call and nothing else; snapshot bookkeeping, addressing, and
/// error classification all live in the session.
///
/// Methods return `anyhow::Result` so implementations can surface whatever
/// transport error they hit; the session wraps causes into its own error
/// taxonomy.
#[async_trait]
pub trait EngineGateway: Send + Sync {
    async fn list_containers(&self, all: bool) -> anyhow::Result<Vec<ContainerSummary>>;
    /// Creates a container and returns its engine-assigned id. The container
    /// is not started.
    async fn create_container(&self, spec: &ContainerSpec) -> anyhow::Result<String>;
    async fn start_container(&self, id: &str) -> anyhow::Result<()>;
    async fn stop_container(&self, id: &str) -> anyhow::Result<()>;
    async fn restart_container(&self, id: &str) -> anyhow::Result<()>;
    async fn rename_container(&self, id: &str, name: &str) -> anyhow::Result<()>;
    async fn remove_container(&self, id: &str) -> anyhow::Result<()>;
    async fn prune_containers(&self) -> anyhow::Result<()>;

    async fn list_images(&self, all: bool) -> anyhow::Result<Vec<ImageSummary>>;
    /// Pulls an image, consuming the progress stream to completion before
    /// returning.
    async fn pull_image(&self, reference: &str) -> anyhow::Result<()>;
    async fn remove_image(&self, id: &str) -> anyhow::Result<()>;
    /// Registry search. Read-only: results are returned to the caller and
    /// never enter the snapshot.
    async fn search_images(
        &self,
        term: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<ImageSearchResponseItem>>;
    async fn prune_images(&self) -> anyhow::Result<()>;

    async fn list_networks(&self) -> anyhow::Result<Vec<Network>>;
    /// Creates a network and returns its engine-assigned id.
    async fn create_network(&self, spec: &NetworkSpec) -> anyhow::Result<String>;
    async fn remove_network(&self, id: &str) -> anyhow::Result<()>;
    async fn connect_network(&self, network: &str, container: &str) -> anyhow::Result<()>;
    async fn disconnect_network(
        &self,
        network: &str,
        container: &str,
        force: bool,
    ) -> anyhow::Result<()>;
    async fn prune_networks(&self) -> anyhow::Result<()>;

    async fn list_volumes(&self) -> anyhow::Result<Vec<Volume>>;
    /// Creates a volume and returns its name (engine-assigned when the spec
    /// left it empty).
    async fn create_volume(&self, spec: &VolumeSpec) -> anyhow::Result<String>;
    async fn remove_volume(&self, name: &str, force: bool) -> anyhow::Result<()>;
    async fn prune_volumes(&self) -> anyhow::Result<()>;

    async fn info(&self) -> anyhow::Result<SystemInfo>;
}
