//! The bollard-backed engine gateway.

use std::sync::Arc;

use async_trait::async_trait;
use berth_core::gateway::EngineGateway;
use berth_core::spec::{ContainerSpec, NetworkSpec, VolumeSpec};
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, PruneContainersOptions,
    RemoveContainerOptions, RenameContainerOptions, StartContainerOptions,
};
use bollard::image::{
    CreateImageOptions, ListImagesOptions, PruneImagesOptions, SearchImagesOptions,
};
use bollard::models::{
    ContainerSummary, EndpointSettings, HostConfig, ImageSearchResponseItem, ImageSummary,
    Network, SystemInfo, Volume,
};
use bollard::network::{
    ConnectNetworkOptions, CreateNetworkOptions, DisconnectNetworkOptions, ListNetworksOptions,
    PruneNetworksOptions,
};
use bollard::volume::{
    CreateVolumeOptions, ListVolumesOptions, PruneVolumesOptions, RemoveVolumeOptions,
};
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, warn};

/// [`EngineGateway`] over a live Docker daemon.
#[derive(Clone)]
pub struct DockerGateway {
    docker: Arc<Docker>,
}

impl DockerGateway {
    pub fn new(docker: Arc<Docker>) -> Self {
        Self { docker }
    }

    /// Connects using the environment (`DOCKER_HOST` and friends), falling
    /// back to the platform default socket.
    pub fn from_env() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_defaults()?;
        Ok(Self::new(Arc::new(docker)))
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn create_options(spec: &ContainerSpec) -> Option<CreateContainerOptions<String>> {
    if spec.name.is_empty() {
        // Unnamed: let the engine pick one.
        None
    } else {
        Some(CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        })
    }
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    let host_config = if spec.port_bindings.is_empty() {
        None
    } else {
        Some(HostConfig {
            port_bindings: Some(spec.port_bindings.clone()),
            ..Default::default()
        })
    };

    Config {
        image: Some(spec.image.clone()),
        attach_stdin: Some(spec.attach_stdin),
        attach_stdout: Some(spec.attach_stdout),
        attach_stderr: Some(spec.attach_stderr),
        env: non_empty(&spec.env),
        cmd: non_empty(&spec.cmd),
        entrypoint: non_empty(&spec.entrypoint),
        host_config,
        ..Default::default()
    }
}

#[async_trait]
impl EngineGateway for DockerGateway {
    async fn list_containers(&self, all: bool) -> anyhow::Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        Ok(self.docker.list_containers(Some(options)).await?)
    }

    async fn create_container(&self, spec: &ContainerSpec) -> anyhow::Result<String> {
        let response = self
            .docker
            .create_container(create_options(spec), container_config(spec))
            .await?;

        debug!(id = %response.id, "container created");
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> anyhow::Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> anyhow::Result<()> {
        // No timeout override; the engine default applies.
        self.docker.stop_container(id, None).await?;
        Ok(())
    }

    async fn restart_container(&self, id: &str) -> anyhow::Result<()> {
        self.docker.restart_container(id, None).await?;
        Ok(())
    }

    async fn rename_container(&self, id: &str, name: &str) -> anyhow::Result<()> {
        let options = RenameContainerOptions {
            name: name.to_string(),
        };
        self.docker.rename_container(id, options).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> anyhow::Result<()> {
        let options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });
        self.docker.remove_container(id, options).await?;
        Ok(())
    }

    async fn prune_containers(&self) -> anyhow::Result<()> {
        self.docker
            .prune_containers(None::<PruneContainersOptions<String>>)
            .await?;
        Ok(())
    }

    async fn list_images(&self, all: bool) -> anyhow::Result<Vec<ImageSummary>> {
        let options = ListImagesOptions::<String> {
            all,
            ..Default::default()
        };
        Ok(self.docker.list_images(Some(options)).await?)
    }

    async fn pull_image(&self, reference: &str) -> anyhow::Result<()> {
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };

        // The pull is done when the progress stream ends.
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(update) = progress.next().await {
            update?;
        }

        debug!(image = %reference, "pull complete");
        Ok(())
    }

    async fn remove_image(&self, id: &str) -> anyhow::Result<()> {
        self.docker.remove_image(id, None, None).await?;
        Ok(())
    }

    async fn search_images(
        &self,
        term: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<ImageSearchResponseItem>> {
        let options = SearchImagesOptions {
            term: term.to_string(),
            limit: Some(limit),
            ..Default::default()
        };
        Ok(self.docker.search_images(options).await?)
    }

    async fn prune_images(&self) -> anyhow::Result<()> {
        self.docker
            .prune_images(None::<PruneImagesOptions<String>>)
            .await?;
        Ok(())
    }

    async fn list_networks(&self) -> anyhow::Result<Vec<Network>> {
        Ok(self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await?)
    }

    async fn create_network(&self, spec: &NetworkSpec) -> anyhow::Result<String> {
        // spec.scope is advisory; the engine assigns the effective scope.
        let options = CreateNetworkOptions {
            name: spec.name.clone(),
            driver: spec.driver.clone(),
            internal: spec.internal,
            attachable: spec.attachable,
            ingress: spec.ingress,
            enable_ipv6: spec.enable_ipv6,
            ..Default::default()
        };

        let response = self.docker.create_network(options).await?;
        debug!(id = %response.id, "network created");
        Ok(response.id)
    }

    async fn remove_network(&self, id: &str) -> anyhow::Result<()> {
        self.docker.remove_network(id).await?;
        Ok(())
    }

    async fn connect_network(&self, network: &str, container: &str) -> anyhow::Result<()> {
        let options = ConnectNetworkOptions {
            container: container.to_string(),
            endpoint_config: EndpointSettings::default(),
        };
        self.docker.connect_network(network, options).await?;
        Ok(())
    }

    async fn disconnect_network(
        &self,
        network: &str,
        container: &str,
        force: bool,
    ) -> anyhow::Result<()> {
        let options = DisconnectNetworkOptions {
            container: container.to_string(),
            force,
        };
        self.docker.disconnect_network(network, options).await?;
        Ok(())
    }

    async fn prune_networks(&self) -> anyhow::Result<()> {
        self.docker
            .prune_networks(None::<PruneNetworksOptions<String>>)
            .await?;
        Ok(())
    }

    async fn list_volumes(&self) -> anyhow::Result<Vec<Volume>> {
        let response = self
            .docker
            .list_volumes(None::<ListVolumesOptions<String>>)
            .await?;

        for warning in response.warnings.unwrap_or_default() {
            warn!(%warning, "volume listing warning");
        }
        Ok(response.volumes.unwrap_or_default())
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> anyhow::Result<String> {
        let options = CreateVolumeOptions {
            name: spec.name.clone(),
            driver: spec.driver.clone(),
            driver_opts: spec.options.clone(),
            labels: spec.labels.clone(),
        };

        let volume = self.docker.create_volume(options).await?;
        Ok(volume.name)
    }

    async fn remove_volume(&self, name: &str, force: bool) -> anyhow::Result<()> {
        self.docker
            .remove_volume(name, Some(RemoveVolumeOptions { force }))
            .await?;
        Ok(())
    }

    async fn prune_volumes(&self) -> anyhow::Result<()> {
        self.docker
            .prune_volumes(None::<PruneVolumesOptions<String>>)
            .await?;
        Ok(())
    }

    async fn info(&self) -> anyhow::Result<SystemInfo> {
        Ok(self.docker.info().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_core::options::OptionMap;
    use berth_core::spec::PortBindPolicy;

    fn spec(pairs: &[(&str, &str)]) -> ContainerSpec {
        let opts: OptionMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ContainerSpec::from_options(&opts, PortBindPolicy::V4Only)
    }

    #[test]
    fn unnamed_containers_get_no_create_options() {
        assert!(create_options(&spec(&[("image", "alpine")])).is_none());

        let options = create_options(&spec(&[("image", "alpine"), ("name", "web")]));
        assert_eq!(options.unwrap().name, "web");
    }

    #[test]
    fn empty_spec_fields_stay_unset_in_the_wire_config() {
        let config = container_config(&spec(&[("image", "alpine")]));

        assert_eq!(config.image.as_deref(), Some("alpine"));
        assert!(config.env.is_none());
        assert!(config.cmd.is_none());
        assert!(config.entrypoint.is_none());
        assert!(config.host_config.is_none());
        assert_eq!(config.attach_stdout, Some(true));
    }

    #[test]
    fn port_bindings_land_in_the_host_config() {
        let config = container_config(&spec(&[
            ("image", "nginx"),
            ("port", "80"),
            ("hostPort", "8080"),
        ]));

        let host_config = config.host_config.expect("host config populated");
        let bindings = host_config.port_bindings.expect("bindings populated");
        assert!(bindings.contains_key("80/tcp"));
    }
}
