//! The daemon session: the mutation-refresh protocol over an engine gateway.
//!
//! Every mutating operation follows the same sequence: resolve addressing
//! against the local snapshot, make exactly one gateway call, then refresh
//! exactly the category the mutation touched. A gateway failure surfaces as
//! [`DaemonError::Gateway`] with the snapshot untouched; a refresh failure
//! after a successful mutation surfaces as [`DaemonError::Refresh`] and is
//! never rolled back, since the remote mutation already happened.

use std::sync::Arc;

use berth_core::error::{DaemonError, ResourceKind, Result};
use berth_core::gateway::EngineGateway;
use berth_core::options::OptionMap;
use berth_core::spec::{ContainerSpec, NetworkSpec, PortBindPolicy, VolumeSpec};
use bollard::models::ImageSearchResponseItem;
use tracing::{debug, info, instrument};

use crate::snapshot::ResourceSnapshot;

/// Default cap on registry search results.
pub const DEFAULT_SEARCH_LIMIT: u64 = 10;

/// Engine ids are truncated to this length in errors and log fields.
const ID_DISPLAY_LEN: usize = 12;

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..ID_DISPLAY_LEN).unwrap_or(id)
}

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Include stopped containers when refreshing the container category.
    pub list_all: bool,
    /// Upper bound on registry search results.
    pub search_limit: u64,
    /// Wildcard policy for published ports that name no host IP.
    pub port_bindings: PortBindPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            list_all: true,
            search_limit: DEFAULT_SEARCH_LIMIT,
            port_bindings: PortBindPolicy::default(),
        }
    }
}

/// A live session against one engine.
///
/// Reads go through [`DaemonSession::snapshot`]; mutations take `&mut self`,
/// which is what makes whole-category replacement atomic for observers: no
/// reader can coexist with a mutation in flight. Callers that want to share
/// a session across tasks wrap it in their own lock.
pub struct DaemonSession {
    gateway: Arc<dyn EngineGateway>,
    snapshot: ResourceSnapshot,
    config: SessionConfig,
}

impl DaemonSession {
    /// Opens a session with default configuration, priming the snapshot
    /// with a full refresh.
    pub async fn connect(gateway: Arc<dyn EngineGateway>) -> Result<Self> {
        Self::connect_with(gateway, SessionConfig::default()).await
    }

    /// Opens a session with explicit configuration. The priming refresh
    /// runs in fixed order (containers, images, info, networks, volumes)
    /// and the first failure aborts construction.
    pub async fn connect_with(
        gateway: Arc<dyn EngineGateway>,
        config: SessionConfig,
    ) -> Result<Self> {
        let mut session = DaemonSession {
            gateway,
            snapshot: ResourceSnapshot::default(),
            config,
        };

        session.refresh_all().await?;
        info!(
            containers = session.snapshot.num_containers(),
            images = session.snapshot.num_images(),
            networks = session.snapshot.num_networks(),
            volumes = session.snapshot.num_volumes(),
            "session connected"
        );
        Ok(session)
    }

    /// Read access to the current snapshot.
    pub fn snapshot(&self) -> &ResourceSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // --- Refreshes ---

    /// Refreshes every category in fixed order: containers, images, info,
    /// networks, volumes. Aborts on the first failure.
    pub async fn refresh_all(&mut self) -> Result<()> {
        self.refresh_containers().await?;
        self.refresh_images().await?;
        self.refresh_info().await?;
        self.refresh_networks().await?;
        self.refresh_volumes().await?;
        Ok(())
    }

    /// Replaces the container category with a fresh listing.
    pub async fn refresh_containers(&mut self) -> Result<()> {
        let containers = self
            .gateway
            .list_containers(self.config.list_all)
            .await
            .map_err(|source| DaemonError::Refresh {
                kind: ResourceKind::Containers,
                source,
            })?;

        debug!(count = containers.len(), "containers refreshed");
        self.snapshot.replace_containers(containers);
        Ok(())
    }

    /// Replaces the image category with a fresh listing.
    pub async fn refresh_images(&mut self) -> Result<()> {
        let images = self
            .gateway
            .list_images(self.config.list_all)
            .await
            .map_err(|source| DaemonError::Refresh {
                kind: ResourceKind::Images,
                source,
            })?;

        debug!(count = images.len(), "images refreshed");
        self.snapshot.replace_images(images);
        Ok(())
    }

    /// Replaces the cached daemon information.
    pub async fn refresh_info(&mut self) -> Result<()> {
        let info = self
            .gateway
            .info()
            .await
            .map_err(|source| DaemonError::Refresh {
                kind: ResourceKind::Info,
                source,
            })?;

        self.snapshot.replace_info(info);
        Ok(())
    }

    /// Replaces the network category with a fresh listing.
    pub async fn refresh_networks(&mut self) -> Result<()> {
        let networks = self
            .gateway
            .list_networks()
            .await
            .map_err(|source| DaemonError::Refresh {
                kind: ResourceKind::Networks,
                source,
            })?;

        debug!(count = networks.len(), "networks refreshed");
        self.snapshot.replace_networks(networks);
        Ok(())
    }

    /// Replaces the volume category with a fresh listing.
    pub async fn refresh_volumes(&mut self) -> Result<()> {
        let volumes = self
            .gateway
            .list_volumes()
            .await
            .map_err(|source| DaemonError::Refresh {
                kind: ResourceKind::Volumes,
                source,
            })?;

        debug!(count = volumes.len(), "volumes refreshed");
        self.snapshot.replace_volumes(volumes);
        Ok(())
    }

    // --- Containers ---

    /// Creates a container from `opts` and returns its engine-assigned id.
    /// See [`ContainerSpec::from_options`] for the recognized options. The
    /// id is resolvable in the snapshot once this returns.
    #[instrument(skip(self, opts))]
    pub async fn new_container(&mut self, opts: &OptionMap) -> Result<String> {
        let spec = ContainerSpec::from_options(opts, self.config.port_bindings);
        let target = if spec.name.is_empty() {
            "container".to_string()
        } else {
            format!("container {}", spec.name)
        };

        let id = self
            .gateway
            .create_container(&spec)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "create",
                target,
                source,
            })?;

        info!(id = %short_id(&id), "container created");
        self.refresh_containers().await?;
        Ok(id)
    }

    /// Starts a stopped container. The engine is the authority on state:
    /// starting a running container surfaces its rejection unchanged.
    #[instrument(skip(self, id), fields(id = %short_id(id)))]
    pub async fn start_container(&mut self, id: &str) -> Result<()> {
        self.gateway
            .start_container(id)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "start",
                target: format!("container {}", short_id(id)),
                source,
            })?;

        self.refresh_containers().await
    }

    /// Stops a running container.
    #[instrument(skip(self, id), fields(id = %short_id(id)))]
    pub async fn stop_container(&mut self, id: &str) -> Result<()> {
        self.gateway
            .stop_container(id)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "stop",
                target: format!("container {}", short_id(id)),
                source,
            })?;

        self.refresh_containers().await
    }

    /// Restarts a container.
    #[instrument(skip(self, id), fields(id = %short_id(id)))]
    pub async fn restart_container(&mut self, id: &str) -> Result<()> {
        self.gateway
            .restart_container(id)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "restart",
                target: format!("container {}", short_id(id)),
                source,
            })?;

        self.refresh_containers().await
    }

    /// Renames a container.
    #[instrument(skip(self, id, name), fields(id = %short_id(id), name = %name))]
    pub async fn rename_container(&mut self, id: &str, name: &str) -> Result<()> {
        self.gateway
            .rename_container(id, name)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "rename",
                target: format!("container {} to {}", short_id(id), name),
                source,
            })?;

        self.refresh_containers().await
    }

    /// Removes a container. Verification is count-based: after the refresh
    /// the removed id is simply absent from the snapshot.
    #[instrument(skip(self, id), fields(id = %short_id(id)))]
    pub async fn remove_container(&mut self, id: &str) -> Result<()> {
        self.gateway
            .remove_container(id)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "remove",
                target: format!("container {}", short_id(id)),
                source,
            })?;

        info!("container removed");
        self.refresh_containers().await
    }

    /// Deletes unused container data.
    #[instrument(skip(self))]
    pub async fn prune_containers(&mut self) -> Result<()> {
        self.gateway
            .prune_containers()
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "prune",
                target: "containers".to_string(),
                source,
            })?;

        self.refresh_containers().await
    }

    // --- Images ---

    /// Pulls `reference`, waiting for the engine to finish the download
    /// before the image category is refreshed.
    #[instrument(skip(self, reference), fields(image = %reference))]
    pub async fn pull_image(&mut self, reference: &str) -> Result<()> {
        self.gateway
            .pull_image(reference)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "pull",
                target: format!("image {reference}"),
                source,
            })?;

        info!("image pulled");
        self.refresh_images().await
    }

    /// Removes an image.
    #[instrument(skip(self, id), fields(id = %short_id(id)))]
    pub async fn remove_image(&mut self, id: &str) -> Result<()> {
        self.gateway
            .remove_image(id)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "remove",
                target: format!("image {}", short_id(id)),
                source,
            })?;

        self.refresh_images().await
    }

    /// Searches the registry for `term`, returning at most
    /// [`SessionConfig::search_limit`] results. Results go to the caller,
    /// never into the snapshot.
    #[instrument(skip(self, term), fields(term = %term))]
    pub async fn search_images(&self, term: &str) -> Result<Vec<ImageSearchResponseItem>> {
        self.gateway
            .search_images(term, self.config.search_limit)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "search for",
                target: format!("image {term}"),
                source,
            })
    }

    /// Removes unused image data.
    #[instrument(skip(self))]
    pub async fn prune_images(&mut self) -> Result<()> {
        self.gateway
            .prune_images()
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "prune",
                target: "images".to_string(),
                source,
            })?;

        self.refresh_images().await
    }

    // --- Networks ---

    /// Creates a network from `opts` and returns its engine-assigned id.
    /// See [`NetworkSpec::from_options`] for the recognized options.
    #[instrument(skip(self, opts))]
    pub async fn new_network(&mut self, opts: &OptionMap) -> Result<String> {
        let spec = NetworkSpec::from_options(opts);
        let target = if spec.name.is_empty() {
            "network".to_string()
        } else {
            format!("network {}", spec.name)
        };

        let id = self
            .gateway
            .create_network(&spec)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "create",
                target,
                source,
            })?;

        info!(id = %short_id(&id), "network created");
        self.refresh_networks().await?;
        Ok(id)
    }

    /// Removes a network.
    #[instrument(skip(self, id), fields(id = %short_id(id)))]
    pub async fn remove_network(&mut self, id: &str) -> Result<()> {
        self.gateway
            .remove_network(id)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "remove",
                target: format!("network {}", short_id(id)),
                source,
            })?;

        self.refresh_networks().await
    }

    /// Connects a container to a network. Membership changes neither
    /// category's existence, so no refresh happens and `&self` suffices.
    #[instrument(
        skip(self, network, container),
        fields(network = %short_id(network), container = %short_id(container))
    )]
    pub async fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        self.gateway
            .connect_network(network, container)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "connect",
                target: format!("{} to {}", short_id(container), short_id(network)),
                source,
            })
    }

    /// Disconnects a container from a network, forcibly. As with
    /// [`DaemonSession::connect_network`], no refresh happens.
    #[instrument(
        skip(self, network, container),
        fields(network = %short_id(network), container = %short_id(container))
    )]
    pub async fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        self.gateway
            .disconnect_network(network, container, true)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "disconnect",
                target: format!("{} from network {}", short_id(container), short_id(network)),
                source,
            })
    }

    /// Removes unused networks.
    #[instrument(skip(self))]
    pub async fn prune_networks(&mut self) -> Result<()> {
        self.gateway
            .prune_networks()
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "prune",
                target: "networks".to_string(),
                source,
            })?;

        self.refresh_networks().await
    }

    // --- Volumes ---

    /// Creates a volume from `opts` and returns its name. See
    /// [`VolumeSpec::from_options`] for the recognized options.
    #[instrument(skip(self, opts))]
    pub async fn new_volume(&mut self, opts: &OptionMap) -> Result<String> {
        let spec = VolumeSpec::from_options(opts);
        let target = if spec.name.is_empty() {
            "volume".to_string()
        } else {
            format!("volume {}", spec.name)
        };

        let name = self
            .gateway
            .create_volume(&spec)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "create",
                target,
                source,
            })?;

        info!(name = %name, "volume created");
        self.refresh_volumes().await?;
        Ok(name)
    }

    /// Removes a volume, forcibly. Volumes are addressed by their full
    /// name; nothing is truncated.
    #[instrument(skip(self, name), fields(name = %name))]
    pub async fn remove_volume(&mut self, name: &str) -> Result<()> {
        self.gateway
            .remove_volume(name, true)
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "remove",
                target: format!("volume {name}"),
                source,
            })?;

        self.refresh_volumes().await
    }

    /// Removes unused volumes.
    #[instrument(skip(self))]
    pub async fn prune_volumes(&mut self) -> Result<()> {
        self.gateway
            .prune_volumes()
            .await
            .map_err(|source| DaemonError::Gateway {
                op: "prune",
                target: "volumes".to_string(),
                source,
            })?;

        self.refresh_volumes().await
    }

    // --- Index addressing ---
    //
    // Index addressing is a resolving convenience over the snapshot's
    // current order. Resolution happens before any gateway call, so an
    // out-of-range index never reaches the engine.

    /// Resolves the container at `index` to its stable engine id.
    pub fn container_id_at(&self, index: usize) -> Result<String> {
        let containers = self.snapshot.containers();
        containers
            .get(index)
            .and_then(|c| c.id.clone())
            .ok_or(DaemonError::InvalidAddress {
                kind: ResourceKind::Containers,
                index,
                len: containers.len(),
            })
    }

    /// Resolves the image at `index` to its stable engine id.
    pub fn image_id_at(&self, index: usize) -> Result<String> {
        let images = self.snapshot.images();
        images
            .get(index)
            .map(|i| i.id.clone())
            .ok_or(DaemonError::InvalidAddress {
                kind: ResourceKind::Images,
                index,
                len: images.len(),
            })
    }

    /// Resolves the network at `index` to its stable engine id.
    pub fn network_id_at(&self, index: usize) -> Result<String> {
        let networks = self.snapshot.networks();
        networks
            .get(index)
            .and_then(|n| n.id.clone())
            .ok_or(DaemonError::InvalidAddress {
                kind: ResourceKind::Networks,
                index,
                len: networks.len(),
            })
    }

    /// Resolves the volume at `index` to its name.
    pub fn volume_name_at(&self, index: usize) -> Result<String> {
        let volumes = self.snapshot.volumes();
        volumes
            .get(index)
            .map(|v| v.name.clone())
            .ok_or(DaemonError::InvalidAddress {
                kind: ResourceKind::Volumes,
                index,
                len: volumes.len(),
            })
    }
}
