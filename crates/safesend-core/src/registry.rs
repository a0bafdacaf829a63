//! Static table of supported networks.
//!
//! Loaded once at startup, either from the embedded `assets/networks.json`
//! or from an operator-supplied document with the same shape.

use std::collections::HashSet;

use alloy::json_abi::JsonAbi;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::NetworkConfig;
use crate::error::ConnectionError;

const BUILTIN_NETWORKS: &str = include_str!("../assets/networks.json");

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("network table decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("network table is empty")]
    Empty,
    #[error("duplicate network id: {0}")]
    DuplicateNetwork(String),
    #[error("network {network} has an invalid chain id: {reason}")]
    InvalidChainId { network: String, reason: String },
    #[error("network {network} has an invalid contract ABI: {reason}")]
    InvalidAbi { network: String, reason: String },
    #[error("default network is not registered: {0}")]
    UnknownDefault(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkTable {
    default_network: String,
    networks: Vec<NetworkConfig>,
}

#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: Vec<NetworkConfig>,
    default_index: usize,
}

impl NetworkRegistry {
    pub fn new(networks: Vec<NetworkConfig>, default_id: &str) -> Result<Self, RegistryError> {
        if networks.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for network in &networks {
            if !seen.insert(network.id.as_str()) {
                return Err(RegistryError::DuplicateNetwork(network.id.clone()));
            }
            network
                .chain_id_u64()
                .map_err(|e| RegistryError::InvalidChainId {
                    network: network.id.clone(),
                    reason: e.to_string(),
                })?;
            serde_json::from_value::<JsonAbi>(network.contract.abi.clone()).map_err(|e| {
                RegistryError::InvalidAbi {
                    network: network.id.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        let default_index = networks
            .iter()
            .position(|n| n.id == default_id)
            .ok_or_else(|| RegistryError::UnknownDefault(default_id.to_owned()))?;
        Ok(Self {
            networks,
            default_index,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let table: NetworkTable = serde_json::from_str(raw)?;
        Self::new(table.networks, &table.default_network)
    }

    /// SafeSend on Linea and EduChain on Open Campus Codex.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_NETWORKS)
    }

    pub fn with_default(mut self, id: &str) -> Result<Self, RegistryError> {
        self.default_index = self
            .networks
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| RegistryError::UnknownDefault(id.to_owned()))?;
        Ok(self)
    }

    pub fn resolve(&self, id: &str) -> Result<&NetworkConfig, ConnectionError> {
        self.networks
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| ConnectionError::UnknownNetwork(id.to_owned()))
    }

    pub fn default_network(&self) -> &NetworkConfig {
        &self.networks[self.default_index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.networks.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
