//! Test support: an in-memory engine plus environment checks for the
//! live-daemon suite.

use std::collections::HashMap;
use std::process::Command;
use std::sync::{Mutex, MutexGuard, OnceLock};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use berth_core::gateway::EngineGateway;
use berth_core::spec::{ContainerSpec, NetworkSpec, VolumeSpec};
use bollard::models::{
    ContainerSummary, ImageSearchResponseItem, ImageSummary, Network, NetworkContainer, Port,
    SystemInfo, Volume,
};
use chrono::Utc;
use uuid::Uuid;

/// True when a Docker daemon answers on this host. The check runs once per
/// process; later calls reuse the answer.
pub fn has_docker() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("docker")
            .arg("info")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    })
}

/// Skips the surrounding test when no Docker daemon is available.
#[macro_export]
macro_rules! require_docker {
    () => {
        if !$crate::testing::has_docker() {
            eprintln!("Test skipped: Docker not available");
            return;
        }
    };
}

/// How many hits the mock registry can produce per search term.
const SEARCH_POOL: u64 = 25;

fn mint_id() -> String {
    // 32 hex chars, close enough to an engine id.
    Uuid::new_v4().simple().to_string()
}

#[derive(Default)]
struct MockState {
    containers: Vec<ContainerSummary>,
    images: Vec<ImageSummary>,
    networks: Vec<Network>,
    volumes: Vec<Volume>,
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, String>,
}

/// An [`EngineGateway`] that runs entirely in memory.
///
/// The mock is strict about container state transitions (the engine is the
/// authority a session defers to) and records every gateway call, so tests
/// can assert not just what an operation did but which engine calls it made
/// along the way.
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Makes the next call to `method` fail with `message`. One-shot: the
    /// injected failure is consumed by the call it fails.
    pub fn fail_next(&self, method: &'static str, message: &str) {
        self.lock().failures.insert(method, message.to_string());
    }

    /// Every gateway call made so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Inserts a listing entry directly, bypassing create. Lets tests model
    /// engine responses the session has to defend against, such as entries
    /// that carry no id.
    pub fn seed_container(&self, container: ContainerSummary) {
        self.lock().containers.push(container);
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Records the call and applies any injected failure.
    fn begin(&self, method: &'static str) -> anyhow::Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(method);
        if let Some(message) = state.failures.remove(method) {
            return Err(anyhow!(message));
        }
        Ok(state)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn find_container_mut<'a>(
    containers: &'a mut [ContainerSummary],
    id: &str,
) -> anyhow::Result<&'a mut ContainerSummary> {
    containers
        .iter_mut()
        .find(|c| c.id.as_deref() == Some(id))
        .ok_or_else(|| anyhow!("no such container: {id}"))
}

fn ports_from_spec(spec: &ContainerSpec) -> Option<Vec<Port>> {
    let mut ports = Vec::new();

    for (key, bindings) in &spec.port_bindings {
        let private_port = match key.split('/').next().and_then(|p| p.parse().ok()) {
            Some(port) => port,
            None => continue,
        };
        for binding in bindings.iter().flatten() {
            ports.push(Port {
                ip: binding.host_ip.clone(),
                private_port,
                public_port: binding.host_port.as_deref().and_then(|p| p.parse().ok()),
                ..Default::default()
            });
        }
    }

    if ports.is_empty() {
        None
    } else {
        Some(ports)
    }
}

#[async_trait]
impl EngineGateway for MockEngine {
    async fn list_containers(&self, all: bool) -> anyhow::Result<Vec<ContainerSummary>> {
        let state = self.begin("list_containers")?;
        if all {
            Ok(state.containers.clone())
        } else {
            Ok(state
                .containers
                .iter()
                .filter(|c| c.state.as_deref() == Some("running"))
                .cloned()
                .collect())
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> anyhow::Result<String> {
        let mut state = self.begin("create_container")?;

        if !spec.name.is_empty() {
            let wanted = format!("/{}", spec.name);
            let taken = state.containers.iter().any(|c| {
                c.names
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .any(|n| n == &wanted)
            });
            if taken {
                bail!("container name {} is already in use", spec.name);
            }
        }

        let id = mint_id();
        let name = if spec.name.is_empty() {
            format!("mock_{}", &id[..8])
        } else {
            spec.name.clone()
        };

        state.containers.push(ContainerSummary {
            id: Some(id.clone()),
            names: Some(vec![format!("/{name}")]),
            image: Some(spec.image.clone()),
            created: Some(Utc::now().timestamp()),
            ports: ports_from_spec(spec),
            state: Some("created".to_string()),
            status: Some("Created".to_string()),
            ..Default::default()
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.begin("start_container")?;
        let container = find_container_mut(&mut state.containers, id)?;

        if container.state.as_deref() == Some("running") {
            bail!("container {id} is already running");
        }
        container.state = Some("running".to_string());
        container.status = Some("Up Less than a second".to_string());
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.begin("stop_container")?;
        let container = find_container_mut(&mut state.containers, id)?;

        if container.state.as_deref() != Some("running") {
            bail!("container {id} is not running");
        }
        container.state = Some("exited".to_string());
        container.status = Some("Exited (0) Less than a second ago".to_string());
        Ok(())
    }

    async fn restart_container(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.begin("restart_container")?;
        let container = find_container_mut(&mut state.containers, id)?;

        // A restart is valid from any state.
        container.state = Some("running".to_string());
        container.status = Some("Up Less than a second".to_string());
        Ok(())
    }

    async fn rename_container(&self, id: &str, name: &str) -> anyhow::Result<()> {
        let mut state = self.begin("rename_container")?;
        let wanted = format!("/{name}");
        let taken = state.containers.iter().any(|c| {
            c.id.as_deref() != Some(id)
                && c.names
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .any(|n| n == &wanted)
        });
        if taken {
            bail!("container name {name} is already in use");
        }

        let container = find_container_mut(&mut state.containers, id)?;
        container.names = Some(vec![wanted]);
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.begin("remove_container")?;
        let before = state.containers.len();
        state.containers.retain(|c| c.id.as_deref() != Some(id));
        if state.containers.len() == before {
            bail!("no such container: {id}");
        }
        Ok(())
    }

    async fn prune_containers(&self) -> anyhow::Result<()> {
        let mut state = self.begin("prune_containers")?;
        state
            .containers
            .retain(|c| c.state.as_deref() == Some("running"));
        Ok(())
    }

    async fn list_images(&self, _all: bool) -> anyhow::Result<Vec<ImageSummary>> {
        let state = self.begin("list_images")?;
        Ok(state.images.clone())
    }

    async fn pull_image(&self, reference: &str) -> anyhow::Result<()> {
        let mut state = self.begin("pull_image")?;
        let tag = if reference.contains(':') {
            reference.to_string()
        } else {
            format!("{reference}:latest")
        };

        if state.images.iter().any(|i| i.repo_tags.contains(&tag)) {
            return Ok(());
        }

        state.images.push(ImageSummary {
            id: format!("sha256:{}", mint_id()),
            repo_tags: vec![tag],
            created: Utc::now().timestamp(),
            ..Default::default()
        });
        Ok(())
    }

    async fn remove_image(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.begin("remove_image")?;
        let tagged = format!("{id}:latest");
        let before = state.images.len();

        state.images.retain(|image| {
            image.id != id && !image.repo_tags.iter().any(|t| t == id || t == &tagged)
        });
        if state.images.len() == before {
            bail!("no such image: {id}");
        }
        Ok(())
    }

    async fn search_images(
        &self,
        term: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<ImageSearchResponseItem>> {
        let _guard = self.begin("search_images")?;

        let hits = SEARCH_POOL.min(limit);
        Ok((0..hits)
            .map(|i| ImageSearchResponseItem {
                name: Some(format!("{term}-{i}")),
                description: Some(format!("registry hit {i} for {term}")),
                star_count: Some((SEARCH_POOL - i) as i64),
                ..Default::default()
            })
            .collect())
    }

    async fn prune_images(&self) -> anyhow::Result<()> {
        let mut state = self.begin("prune_images")?;
        // Nothing in the mock holds a reference to an image.
        state.images.clear();
        Ok(())
    }

    async fn list_networks(&self) -> anyhow::Result<Vec<Network>> {
        let state = self.begin("list_networks")?;
        Ok(state.networks.clone())
    }

    async fn create_network(&self, spec: &NetworkSpec) -> anyhow::Result<String> {
        let mut state = self.begin("create_network")?;
        let id = mint_id();

        // Engine-side defaulting: empty driver means bridge, and a single
        // daemon always reports local scope.
        let driver = if spec.driver.is_empty() {
            "bridge".to_string()
        } else {
            spec.driver.clone()
        };

        state.networks.push(Network {
            id: Some(id.clone()),
            name: Some(spec.name.clone()),
            driver: Some(driver),
            scope: Some("local".to_string()),
            internal: Some(spec.internal),
            attachable: Some(spec.attachable),
            ingress: Some(spec.ingress),
            enable_ipv6: Some(spec.enable_ipv6),
            created: Some(Utc::now().to_rfc3339()),
            containers: Some(HashMap::new()),
            ..Default::default()
        });
        Ok(id)
    }

    async fn remove_network(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.begin("remove_network")?;

        let network = state
            .networks
            .iter()
            .find(|n| n.id.as_deref() == Some(id))
            .ok_or_else(|| anyhow!("no such network: {id}"))?;
        let connected = network
            .containers
            .as_ref()
            .map(|members| !members.is_empty())
            .unwrap_or(false);
        if connected {
            bail!("network {id} has active endpoints");
        }

        state.networks.retain(|n| n.id.as_deref() != Some(id));
        Ok(())
    }

    async fn connect_network(&self, network: &str, container: &str) -> anyhow::Result<()> {
        let mut guard = self.begin("connect_network")?;
        let state = &mut *guard;

        let endpoint_name = state
            .containers
            .iter()
            .find(|c| c.id.as_deref() == Some(container))
            .ok_or_else(|| anyhow!("no such container: {container}"))?
            .names
            .as_deref()
            .and_then(|names| names.first())
            .map(|name| name.trim_start_matches('/').to_string());

        let net = state
            .networks
            .iter_mut()
            .find(|n| n.id.as_deref() == Some(network))
            .ok_or_else(|| anyhow!("no such network: {network}"))?;

        let members = net.containers.get_or_insert_with(HashMap::new);
        if members.contains_key(container) {
            bail!("container {container} is already connected to network {network}");
        }
        members.insert(
            container.to_string(),
            NetworkContainer {
                name: endpoint_name,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn disconnect_network(
        &self,
        network: &str,
        container: &str,
        _force: bool,
    ) -> anyhow::Result<()> {
        let mut state = self.begin("disconnect_network")?;

        let net = state
            .networks
            .iter_mut()
            .find(|n| n.id.as_deref() == Some(network))
            .ok_or_else(|| anyhow!("no such network: {network}"))?;

        let members = net.containers.get_or_insert_with(HashMap::new);
        if members.remove(container).is_none() {
            bail!("container {container} is not connected to network {network}");
        }
        Ok(())
    }

    async fn prune_networks(&self) -> anyhow::Result<()> {
        let mut state = self.begin("prune_networks")?;
        state.networks.retain(|n| {
            n.containers
                .as_ref()
                .map(|members| !members.is_empty())
                .unwrap_or(false)
        });
        Ok(())
    }

    async fn list_volumes(&self) -> anyhow::Result<Vec<Volume>> {
        let state = self.begin("list_volumes")?;
        Ok(state.volumes.clone())
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> anyhow::Result<String> {
        let mut state = self.begin("create_volume")?;
        let name = if spec.name.is_empty() {
            mint_id()
        } else {
            spec.name.clone()
        };

        // Volume creation is idempotent by name, as on the real engine.
        if state.volumes.iter().any(|v| v.name == name) {
            return Ok(name);
        }

        let driver = if spec.driver.is_empty() {
            "local".to_string()
        } else {
            spec.driver.clone()
        };

        state.volumes.push(Volume {
            name: name.clone(),
            driver,
            mountpoint: format!("/var/lib/docker/volumes/{name}/_data"),
            labels: spec.labels.clone(),
            options: spec.options.clone(),
            created_at: Some(Utc::now().to_rfc3339()),
            ..Default::default()
        });
        Ok(name)
    }

    async fn remove_volume(&self, name: &str, _force: bool) -> anyhow::Result<()> {
        let mut state = self.begin("remove_volume")?;
        let before = state.volumes.len();
        state.volumes.retain(|v| v.name != name);
        if state.volumes.len() == before {
            bail!("no such volume: {name}");
        }
        Ok(())
    }

    async fn prune_volumes(&self) -> anyhow::Result<()> {
        let mut state = self.begin("prune_volumes")?;
        // Nothing in the mock mounts a volume, so every volume is unused.
        state.volumes.clear();
        Ok(())
    }

    async fn info(&self) -> anyhow::Result<SystemInfo> {
        let state = self.begin("info")?;
        Ok(SystemInfo {
            id: Some("mock-engine".to_string()),
            name: Some("mock".to_string()),
            server_version: Some("0.0.0-mock".to_string()),
            containers: Some(state.containers.len() as i64),
            images: Some(state.images.len() as i64),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_core::options::OptionMap;
    use berth_core::spec::PortBindPolicy;

    fn container_spec(name: &str) -> ContainerSpec {
        let opts: OptionMap = [("name", name), ("image", "alpine")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ContainerSpec::from_options(&opts, PortBindPolicy::V4Only)
    }

    #[tokio::test]
    async fn state_transitions_are_strict() {
        let engine = MockEngine::new();
        let id = engine.create_container(&container_spec("t")).await.unwrap();

        // Not running yet.
        assert!(engine.stop_container(&id).await.is_err());

        engine.start_container(&id).await.unwrap();
        assert!(engine.start_container(&id).await.is_err());

        engine.stop_container(&id).await.unwrap();
        assert!(engine.stop_container(&id).await.is_err());
    }

    #[tokio::test]
    async fn injected_failures_are_one_shot() {
        let engine = MockEngine::new();
        engine.fail_next("list_containers", "boom");

        assert!(engine.list_containers(true).await.is_err());
        assert!(engine.list_containers(true).await.is_ok());
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let engine = MockEngine::new();
        engine.list_containers(true).await.unwrap();
        engine.list_volumes().await.unwrap();

        assert_eq!(engine.calls(), vec!["list_containers", "list_volumes"]);
    }
}
