use alloy::primitives::Address;
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AddChainParams, ContractBinding};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("no injected wallet provider found")]
    ProviderUnavailable,
    #[error("user rejected the wallet request")]
    UserRejected,
    #[error("wallet does not recognize chain {0}")]
    ChainNotRecognized(String),
    #[error("chain switch rejected: {0}")]
    SwitchRejected(String),
    #[error("add chain rejected: {0}")]
    AddRejected(String),
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEventKind {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub sequence: u64,
    pub kind: ProviderEventKind,
}

/// The injected wallet provider. Every async call may stay pending until the
/// user acts in the wallet UI; there is no timeout at this layer.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ProviderPort {
    fn is_available(&self) -> bool;
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError>;
    async fn chain_id(&self) -> Result<u64, PortError>;
    /// Fails with `ChainNotRecognized` when the wallet lacks the chain,
    /// `SwitchRejected` otherwise.
    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), PortError>;
    /// Fails with `AddRejected`.
    async fn add_chain(&self, params: &AddChainParams) -> Result<(), PortError>;
    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError>;
}

/// Binds a contract for invocation by the connected account.
pub trait ContractPort {
    type Handle: Clone + std::fmt::Debug;

    fn bind(&self, binding: &ContractBinding, account: Address) -> Result<Self::Handle, PortError>;
}
