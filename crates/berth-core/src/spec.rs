//! Create-request builders for containers, networks, and volumes.
//!
//! A builder takes a flat option set and produces the record one create call
//! consumes. Builders are pure and never fail: missing options default,
//! malformed `key=value` entries drop out, and anything else (an unknown
//! image, a non-numeric port) is passed through for the engine to reject.

use std::collections::HashMap;

use bollard::models::{PortBinding, PortMap};
use serde::{Deserialize, Serialize};

use crate::options::{flag_opt, list_opt, map_opt, string_opt, OptionMap};

/// Host-side wildcard used when a port binding names no host IP.
pub const WILDCARD_V4: &str = "0.0.0.0";
/// IPv6 counterpart, bound in addition to [`WILDCARD_V4`] under
/// [`PortBindPolicy::DualStack`].
pub const WILDCARD_V6: &str = "::";

/// How a published port with no explicit host IP is bound on the host.
///
/// Engines on dual-stack hosts report the effective binding as `::` even
/// when only `0.0.0.0` was requested, so the policy is explicit rather than
/// guessed from the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortBindPolicy {
    /// Bind the IPv4 wildcard only.
    #[default]
    V4Only,
    /// Bind both the IPv4 and IPv6 wildcards.
    DualStack,
}

/// Everything one container create call needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub entrypoint: Vec<String>,
    pub port_bindings: PortMap,
}

impl ContainerSpec {
    /// Builds a container spec from a flat option set.
    ///
    /// Recognized options: `image`, `name`, `port`, `hostPort`, `hostIP`,
    /// `env`, `cmd`, `entrypoint`. A port binding is created only when both
    /// `port` and `hostPort` are present; `hostIP` defaults to the wildcard
    /// given by `policy`. The protocol is fixed at tcp.
    pub fn from_options(opts: &OptionMap, policy: PortBindPolicy) -> Self {
        let mut port_bindings = PortMap::new();

        let port = string_opt(opts, "port");
        let host_port = string_opt(opts, "hostPort");
        let host_ip = string_opt(opts, "hostIP");

        if !port.is_empty() && !host_port.is_empty() {
            let mut bindings = Vec::new();

            if host_ip.is_empty() {
                bindings.push(PortBinding {
                    host_ip: Some(WILDCARD_V4.to_string()),
                    host_port: Some(host_port.clone()),
                });
                if policy == PortBindPolicy::DualStack {
                    bindings.push(PortBinding {
                        host_ip: Some(WILDCARD_V6.to_string()),
                        host_port: Some(host_port.clone()),
                    });
                }
            } else {
                bindings.push(PortBinding {
                    host_ip: Some(host_ip),
                    host_port: Some(host_port),
                });
            }

            port_bindings.insert(format!("{port}/tcp"), Some(bindings));
        }

        ContainerSpec {
            image: string_opt(opts, "image"),
            name: string_opt(opts, "name"),
            attach_stdin: true,
            attach_stdout: true,
            attach_stderr: true,
            env: list_opt(opts, "env"),
            cmd: list_opt(opts, "cmd"),
            entrypoint: list_opt(opts, "entrypoint"),
            port_bindings,
        }
    }
}

/// Everything one network create call needs.
///
/// `scope` is advisory; the engine assigns the effective scope. Networks are
/// always created attachable so containers can join after the fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    /// Empty means the engine default (bridge/local).
    pub driver: String,
    pub scope: String,
    pub attachable: bool,
    pub enable_ipv6: bool,
    pub ingress: bool,
    pub internal: bool,
}

impl NetworkSpec {
    /// Builds a network spec from a flat option set.
    ///
    /// Recognized options: `name`, `driver`, `scope`, and the flags `ipv6`,
    /// `ingress`, `internal`. Flags are presence-based: any non-empty value
    /// enables them.
    pub fn from_options(opts: &OptionMap) -> Self {
        NetworkSpec {
            name: string_opt(opts, "name"),
            driver: string_opt(opts, "driver"),
            scope: string_opt(opts, "scope"),
            attachable: true,
            enable_ipv6: flag_opt(opts, "ipv6"),
            ingress: flag_opt(opts, "ingress"),
            internal: flag_opt(opts, "internal"),
        }
    }
}

/// Everything one volume create call needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    /// Empty means the engine default (local).
    pub driver: String,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
}

impl VolumeSpec {
    /// Builds a volume spec from a flat option set.
    ///
    /// Recognized options: `name`, `driver`, `labels`, `options`. The two
    /// maps are comma-separated `key=value` lists.
    pub fn from_options(opts: &OptionMap) -> Self {
        VolumeSpec {
            name: string_opt(opts, "name"),
            driver: string_opt(opts, "driver"),
            labels: map_opt(opts, "labels"),
            options: map_opt(opts, "options"),
        }
    }
}
