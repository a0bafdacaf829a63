use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Comparing,
    Switching,
    Adding,
    Reconciled,
    Unreconciled,
}

impl ReconcileState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reconciled | Self::Unreconciled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileEvent {
    Start,
    ChainMatched,
    ChainMismatched,
    /// The wallet's active chain id could not be read.
    ReadFailed,
    /// The desired network's configured chain id does not decode.
    NetworkInvalid,
    SwitchSucceeded,
    SwitchNotRecognized,
    SwitchFailed,
    AddSucceeded,
    AddFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ReconcileState,
    pub to: ReconcileState,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal reconcile transition: {from:?} on {event:?}")]
pub struct IllegalTransition {
    pub from: ReconcileState,
    pub event: ReconcileEvent,
}

pub fn reconcile_transition(
    from: ReconcileState,
    event: ReconcileEvent,
) -> Result<StateTransition, IllegalTransition> {
    use ReconcileEvent as E;
    use ReconcileState as S;

    // A finished run is never resumed; a new run starts from Idle.
    if from.is_terminal() {
        return Err(IllegalTransition { from, event });
    }
    let (to, reason) = match (from, event) {
        (S::Idle, E::Start) => (S::Comparing, "reconcile_started"),
        (S::Comparing, E::ChainMatched) => (S::Reconciled, "chain_already_active"),
        (S::Comparing, E::ChainMismatched) => (S::Switching, "chain_mismatch"),
        (S::Comparing, E::ReadFailed) => (S::Unreconciled, "chain_id_unreadable"),
        (S::Comparing, E::NetworkInvalid) => (S::Unreconciled, "network_chain_id_invalid"),
        (S::Switching, E::SwitchSucceeded) => (S::Reconciled, "switch_succeeded"),
        (S::Switching, E::SwitchNotRecognized) => (S::Adding, "chain_not_recognized"),
        (S::Switching, E::SwitchFailed) => (S::Unreconciled, "switch_rejected"),
        (S::Adding, E::AddSucceeded) => (S::Reconciled, "add_succeeded"),
        (S::Adding, E::AddFailed) => (S::Unreconciled, "add_rejected"),
        _ => return Err(IllegalTransition { from, event }),
    };
    Ok(StateTransition { from, to, reason })
}
