use thiserror::Error;

use crate::ports::PortError;

#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error("transfer kind '{kind}' is not available on {network}")]
    InvalidTransferKind { kind: String, network: String },
    #[error(transparent)]
    Provider(#[from] PortError),
    #[error("wallet chain not reconciled with {network}: {source}")]
    Unreconciled { network: String, source: PortError },
    #[error("connection state lock poisoned: {0}")]
    StatePoisoned(String),
}
