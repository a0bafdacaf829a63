use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ports::PortError;

/// Wallets are always told the native currency has 18 decimals.
pub const NATIVE_CURRENCY_DECIMALS: u8 = 18;

/// A category of value transfer a network's contract supports
/// (native currency, a token, an NFT collection).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferKind(String);

impl TransferKind {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransferKind {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Error)]
#[error("a network must allow at least one transfer kind")]
pub struct EmptyTransferKinds;

/// Ordered, non-empty list of transfer kinds. The first entry is the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TransferKind>", into = "Vec<TransferKind>")]
pub struct TransferKinds(Vec<TransferKind>);

impl TryFrom<Vec<TransferKind>> for TransferKinds {
    type Error = EmptyTransferKinds;

    fn try_from(kinds: Vec<TransferKind>) -> Result<Self, Self::Error> {
        if kinds.is_empty() {
            return Err(EmptyTransferKinds);
        }
        Ok(Self(kinds))
    }
}

impl From<TransferKinds> for Vec<TransferKind> {
    fn from(kinds: TransferKinds) -> Self {
        kinds.0
    }
}

impl TransferKinds {
    pub fn default_kind(&self) -> &TransferKind {
        // Non-empty by construction.
        &self.0[0]
    }

    pub fn find(&self, label: &str) -> Option<&TransferKind> {
        self.0.iter().find(|k| k.as_str() == label)
    }

    pub fn contains(&self, kind: &TransferKind) -> bool {
        self.0.contains(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferKind> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// ABI descriptor and deployed address, forwarded verbatim to the
/// contract-call capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractBinding {
    pub abi: Value,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub id: String,
    pub display_name: String,
    /// Hex string as exchanged with wallets, e.g. `0xE708`.
    pub chain_id: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub currency: String,
    pub transfer_kinds: TransferKinds,
    pub contract: ContractBinding,
}

impl NetworkConfig {
    pub fn chain_id_u64(&self) -> Result<u64, PortError> {
        parse_chain_id(&self.chain_id)
    }

    /// Canonical lowercase `0x` form sent in wallet requests.
    pub fn chain_id_hex(&self) -> Result<String, PortError> {
        self.chain_id_u64().map(format_chain_id)
    }

    pub fn default_transfer_kind(&self) -> &TransferKind {
        self.transfer_kinds.default_kind()
    }

    pub fn add_chain_params(&self) -> Result<AddChainParams, PortError> {
        Ok(AddChainParams {
            chain_id: self.chain_id_hex()?,
            chain_name: self.id.clone(),
            rpc_urls: vec![self.rpc_url.clone()],
            block_explorer_urls: vec![self.explorer_url.clone()],
            native_currency: NativeCurrency {
                name: self.currency.clone(),
                symbol: self.currency.clone(),
                decimals: NATIVE_CURRENCY_DECIMALS,
            },
        })
    }
}

/// `wallet_addEthereumChain` parameter object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
    pub native_currency: NativeCurrency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-facing notification published by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Session state behind the UI boundary.
///
/// `account` is present only while `Connected`. `contract_handle` is present
/// only while `Connected` and the wallet is on `active_network_id`.
#[derive(Debug, Clone)]
pub struct ConnectionState<H> {
    pub phase: ConnectionPhase,
    pub account: Option<Address>,
    pub active_network_id: String,
    pub contract_handle: Option<H>,
    pub transfer_kind: TransferKind,
    /// Bumped on every connect attempt, network commit and disconnect.
    pub generation: u64,
    pub notice: Option<Notice>,
}

impl<H> ConnectionState<H> {
    pub fn new(network: &NetworkConfig) -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            account: None,
            active_network_id: network.id.clone(),
            contract_handle: None,
            transfer_kind: network.default_transfer_kind().clone(),
            generation: 0,
            notice: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    pub(crate) fn next_generation(&mut self) -> u64 {
        self.generation = self.generation.saturating_add(1);
        self.generation
    }

    pub(crate) fn clear_connection(&mut self, phase: ConnectionPhase) {
        self.phase = phase;
        self.account = None;
        self.contract_handle = None;
    }
}

pub fn parse_chain_id(raw: &str) -> Result<u64, PortError> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| PortError::Validation(format!("invalid hex chain id '{raw}': {e}")))
    } else {
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid chain id '{raw}': {e}")))
    }
}

pub fn format_chain_id(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}
