use crate::domain::{ConnectionState, NetworkConfig, TransferKind};

/// Invoked synchronously, under the state lock, each time the controller
/// commits a new active network.
pub trait NetworkObserver<H>: Send {
    fn network_committed(&self, network: &NetworkConfig, state: &mut ConnectionState<H>);
}

/// Keeps the selected transfer kind valid for the active network.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferTypeResolver;

impl TransferTypeResolver {
    pub fn default_kind_for(network: &NetworkConfig) -> TransferKind {
        network.default_transfer_kind().clone()
    }
}

impl<H> NetworkObserver<H> for TransferTypeResolver {
    fn network_committed(&self, network: &NetworkConfig, state: &mut ConnectionState<H>) {
        state.transfer_kind = Self::default_kind_for(network);
    }
}
