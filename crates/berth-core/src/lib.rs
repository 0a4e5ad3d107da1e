// Re-export dependencies used in public interfaces of the core types

pub use bollard;

pub mod error;
pub mod gateway;
pub mod options;
pub mod spec;

pub use error::{DaemonError, ResourceKind, Result};
pub use gateway::EngineGateway;
pub use options::OptionMap;
pub use spec::{ContainerSpec, NetworkSpec, PortBindPolicy, VolumeSpec};
