//! The local point-in-time view of engine resources.

use bollard::models::{ContainerSummary, ImageSummary, Network, SystemInfo, Volume};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// State string the engine reports for a running container.
const RUNNING: &str = "running";

/// When each category was last refreshed successfully.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStamps {
    pub containers: Option<DateTime<Utc>>,
    pub images: Option<DateTime<Utc>>,
    pub networks: Option<DateTime<Utc>>,
    pub volumes: Option<DateTime<Utc>>,
    pub info: Option<DateTime<Utc>>,
}

/// What the engine held the last time each category was listed.
///
/// Categories only change by whole replacement. There is no per-element
/// mutation and no merging, so a category is always exactly what one list
/// call returned, in the order the engine returned it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceSnapshot {
    containers: Vec<ContainerSummary>,
    images: Vec<ImageSummary>,
    networks: Vec<Network>,
    volumes: Vec<Volume>,
    info: SystemInfo,
    refreshed: RefreshStamps,
}

impl ResourceSnapshot {
    pub(crate) fn replace_containers(&mut self, containers: Vec<ContainerSummary>) {
        self.containers = containers;
        self.refreshed.containers = Some(Utc::now());
    }

    pub(crate) fn replace_images(&mut self, images: Vec<ImageSummary>) {
        self.images = images;
        self.refreshed.images = Some(Utc::now());
    }

    pub(crate) fn replace_networks(&mut self, networks: Vec<Network>) {
        self.networks = networks;
        self.refreshed.networks = Some(Utc::now());
    }

    pub(crate) fn replace_volumes(&mut self, volumes: Vec<Volume>) {
        self.volumes = volumes;
        self.refreshed.volumes = Some(Utc::now());
    }

    pub(crate) fn replace_info(&mut self, info: SystemInfo) {
        self.info = info;
        self.refreshed.info = Some(Utc::now());
    }

    /// All cached containers, in engine order.
    pub fn containers(&self) -> &[ContainerSummary] {
        &self.containers
    }

    /// All cached images, in engine order.
    pub fn images(&self) -> &[ImageSummary] {
        &self.images
    }

    /// All cached networks, in engine order.
    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    /// All cached volumes, in engine order.
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Daemon-wide information from the last info refresh.
    pub fn info(&self) -> &SystemInfo {
        &self.info
    }

    /// When each category was last refreshed.
    pub fn refreshed(&self) -> &RefreshStamps {
        &self.refreshed
    }

    pub fn num_containers(&self) -> usize {
        self.containers.len()
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn num_networks(&self) -> usize {
        self.networks.len()
    }

    pub fn num_volumes(&self) -> usize {
        self.volumes.len()
    }

    /// Cached containers the engine reported as running.
    pub fn running(&self) -> Vec<&ContainerSummary> {
        self.containers
            .iter()
            .filter(|c| c.state.as_deref() == Some(RUNNING))
            .collect()
    }

    /// Cached containers in any non-running state.
    pub fn stopped(&self) -> Vec<&ContainerSummary> {
        self.containers
            .iter()
            .filter(|c| c.state.as_deref() != Some(RUNNING))
            .collect()
    }

    /// Looks up a container by its full engine id.
    pub fn container(&self, id: &str) -> Option<&ContainerSummary> {
        self.containers.iter().find(|c| c.id.as_deref() == Some(id))
    }

    /// Looks up an image by its full engine id.
    pub fn image(&self, id: &str) -> Option<&ImageSummary> {
        self.images.iter().find(|i| i.id == id)
    }

    /// Looks up a network by its full engine id.
    pub fn network(&self, id: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.id.as_deref() == Some(id))
    }

    /// Looks up a volume by name.
    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(id: &str, state: &str) -> ContainerSummary {
        ContainerSummary {
            id: Some(id.to_string()),
            state: Some(state.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn replacement_swaps_the_whole_category() {
        let mut snapshot = ResourceSnapshot::default();
        assert_eq!(snapshot.num_containers(), 0);
        assert!(snapshot.refreshed().containers.is_none());

        snapshot.replace_containers(vec![container("a", "running"), container("b", "exited")]);
        assert_eq!(snapshot.num_containers(), 2);
        assert!(snapshot.refreshed().containers.is_some());

        snapshot.replace_containers(vec![container("c", "created")]);
        assert_eq!(snapshot.num_containers(), 1);
        assert!(snapshot.container("a").is_none());
        assert!(snapshot.container("c").is_some());
    }

    #[test]
    fn running_and_stopped_partition_by_state() {
        let mut snapshot = ResourceSnapshot::default();
        snapshot.replace_containers(vec![
            container("a", "running"),
            container("b", "exited"),
            container("c", "created"),
        ]);

        let running: Vec<_> = snapshot
            .running()
            .iter()
            .map(|c| c.id.clone().unwrap())
            .collect();
        let stopped: Vec<_> = snapshot
            .stopped()
            .iter()
            .map(|c| c.id.clone().unwrap())
            .collect();

        assert_eq!(running, vec!["a"]);
        assert_eq!(stopped, vec!["b", "c"]);
    }

    #[test]
    fn lookups_match_on_exact_identifiers() {
        let mut snapshot = ResourceSnapshot::default();
        snapshot.replace_volumes(vec![Volume {
            name: "data".to_string(),
            driver: "local".to_string(),
            ..Default::default()
        }]);

        assert!(snapshot.volume("data").is_some());
        assert!(snapshot.volume("dat").is_none());
    }

    #[test]
    fn snapshot_serializes_for_state_dumps() {
        let mut snapshot = ResourceSnapshot::default();
        snapshot.replace_containers(vec![container("a", "running")]);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"containers\""));
        assert!(json.contains("running"));
    }
}
