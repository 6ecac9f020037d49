// Cluster Connection Configuration
//
// Value objects describing how a node reaches the cluster and which
// server-side resources it expects. The cluster URI is validated before
// any store is opened.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod store_config;

pub use store_config::{StoreBackend, StoreConfig};

/// The only URI scheme accepted for cluster connections.
pub const CLUSTER_SCHEME: &str = "terracotta";

/// Name of the service this configuration is consumed by.
pub const SERVICE_TYPE: &str = "clustering";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cluster Uri must not be null")]
    MissingClusterUri,

    #[error("Cluster Uri is not valid, clusterUri : {uri}")]
    InvalidClusterUri { uri: String },

    #[error("shard count must be a non-zero power of two, got {0}")]
    InvalidShardCount(usize),

    #[error("pool `{name}` must have a non-zero size")]
    EmptyPool { name: String },
}

/// A named server-side resource pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Pool size in bytes.
    pub size: u64,

    /// Server resource backing this pool; the server default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_resource: Option<String>,
}

/// Resources the client expects the server to provide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSideConfig {
    #[serde(default)]
    pub pools: BTreeMap<String, Pool>,
}

impl ServerSideConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.pools.iter().find(|(_, pool)| pool.size == 0) {
            Some((name, _)) => Err(ConfigError::EmptyPool { name: name.clone() }),
            None => Ok(()),
        }
    }
}

/// Validated cluster connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawClusterConfig")]
pub struct ClusterConfig {
    cluster_uri: String,
    auto_create: bool,
    server_config: ServerSideConfig,
}

#[derive(Deserialize)]
struct RawClusterConfig {
    cluster_uri: Option<String>,
    #[serde(default)]
    auto_create: bool,
    #[serde(default)]
    server_config: ServerSideConfig,
}

impl TryFrom<RawClusterConfig> for ClusterConfig {
    type Error = ConfigError;

    fn try_from(raw: RawClusterConfig) -> Result<Self, Self::Error> {
        Self::with_server_config(raw.cluster_uri.as_deref(), raw.auto_create, raw.server_config)
    }
}

impl ClusterConfig {
    pub fn new(cluster_uri: Option<&str>) -> Result<Self, ConfigError> {
        Self::with_server_config(cluster_uri, false, ServerSideConfig::default())
    }

    pub fn with_server_config(
        cluster_uri: Option<&str>,
        auto_create: bool,
        server_config: ServerSideConfig,
    ) -> Result<Self, ConfigError> {
        let uri = cluster_uri.ok_or(ConfigError::MissingClusterUri)?;
        validate_cluster_uri(uri)?;
        server_config.validate()?;

        Ok(Self {
            cluster_uri: uri.to_owned(),
            auto_create,
            server_config,
        })
    }

    pub fn cluster_uri(&self) -> &str {
        &self.cluster_uri
    }

    pub fn is_auto_create(&self) -> bool {
        self.auto_create
    }

    pub fn server_config(&self) -> &ServerSideConfig {
        &self.server_config
    }

    pub fn service_type(&self) -> &'static str {
        SERVICE_TYPE
    }
}

fn validate_cluster_uri(uri: &str) -> Result<(), ConfigError> {
    match uri.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(CLUSTER_SCHEME) && !rest.is_empty() => {
            Ok(())
        }
        _ => Err(ConfigError::InvalidClusterUri {
            uri: uri.to_owned(),
        }),
    }
}

/// Everything a node needs at startup, as loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub store: StoreConfig,
}
