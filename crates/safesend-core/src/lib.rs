pub mod controller;
pub mod domain;
pub mod error;
pub mod ports;
pub mod reconciler;
pub mod registry;
pub mod state_machine;
pub mod transfer;

pub use controller::{ConnectOutcome, ConnectionController, NetworkChange};
pub use domain::{
    format_chain_id, parse_chain_id, AddChainParams, ConnectionPhase, ConnectionState,
    ContractBinding, EmptyTransferKinds, NativeCurrency, NetworkConfig, Notice, NoticeLevel,
    TransferKind, TransferKinds, NATIVE_CURRENCY_DECIMALS,
};
pub use error::ConnectionError;
pub use ports::{ContractPort, PortError, ProviderEvent, ProviderEventKind, ProviderPort};
pub use reconciler::{ChainReconciler, ReconcileOutcome, ReconcileVia, Reconciliation};
pub use registry::{NetworkRegistry, RegistryError};
pub use state_machine::{
    reconcile_transition, IllegalTransition, ReconcileEvent, ReconcileState, StateTransition,
};
pub use transfer::{NetworkObserver, TransferTypeResolver};
