use tracing::{debug, info, warn};

use crate::domain::{format_chain_id, NetworkConfig};
use crate::ports::{PortError, ProviderPort};
use crate::state_machine::{reconcile_transition, ReconcileEvent, ReconcileState, StateTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileVia {
    AlreadyActive,
    Switched,
    Added,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Reconciled(ReconcileVia),
    Unreconciled(PortError),
}

/// Result of one reconciliation run, with every transition taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub network_id: String,
    pub outcome: ReconcileOutcome,
    pub trail: Vec<StateTransition>,
}

impl Reconciliation {
    pub fn is_reconciled(&self) -> bool {
        matches!(self.outcome, ReconcileOutcome::Reconciled(_))
    }

    pub fn final_state(&self) -> ReconcileState {
        self.trail
            .last()
            .map(|t| t.to)
            .unwrap_or(ReconcileState::Idle)
    }
}

/// Aligns the wallet's active chain with a desired network: compare, then
/// switch, then fall back to adding the chain when the wallet lacks it.
/// Runs once per call and never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainReconciler;

impl ChainReconciler {
    pub async fn reconcile<P>(&self, provider: &P, network: &NetworkConfig) -> Reconciliation
    where
        P: ProviderPort + ?Sized,
    {
        let mut trail = Trail::default();
        let outcome = match drive(provider, network, &mut trail).await {
            Ok(via) => {
                info!(network = %network.id, ?via, "wallet chain reconciled");
                ReconcileOutcome::Reconciled(via)
            }
            Err(err) => {
                warn!(network = %network.id, error = %err, "wallet chain unreconciled");
                ReconcileOutcome::Unreconciled(err)
            }
        };
        Reconciliation {
            network_id: network.id.clone(),
            outcome,
            trail: trail.steps,
        }
    }
}

async fn drive<P>(
    provider: &P,
    network: &NetworkConfig,
    trail: &mut Trail,
) -> Result<ReconcileVia, PortError>
where
    P: ProviderPort + ?Sized,
{
    trail.advance(ReconcileEvent::Start)?;

    let desired = match network.chain_id_u64() {
        Ok(id) => id,
        Err(err) => return trail.fail(ReconcileEvent::NetworkInvalid, err),
    };
    let active = match provider.chain_id().await {
        Ok(id) => id,
        Err(err) => return trail.fail(ReconcileEvent::ReadFailed, err),
    };
    if active == desired {
        trail.advance(ReconcileEvent::ChainMatched)?;
        return Ok(ReconcileVia::AlreadyActive);
    }
    trail.advance(ReconcileEvent::ChainMismatched)?;

    match provider.switch_chain(&format_chain_id(desired)).await {
        Ok(()) => {
            trail.advance(ReconcileEvent::SwitchSucceeded)?;
            Ok(ReconcileVia::Switched)
        }
        Err(PortError::ChainNotRecognized(_)) => {
            trail.advance(ReconcileEvent::SwitchNotRecognized)?;
            let added = match network.add_chain_params() {
                Ok(params) => provider.add_chain(&params).await,
                Err(err) => Err(err),
            };
            match added {
                Ok(()) => {
                    trail.advance(ReconcileEvent::AddSucceeded)?;
                    Ok(ReconcileVia::Added)
                }
                Err(err) => trail.fail(ReconcileEvent::AddFailed, into_add_rejected(err)),
            }
        }
        Err(err) => trail.fail(ReconcileEvent::SwitchFailed, into_switch_rejected(err)),
    }
}

fn into_switch_rejected(err: PortError) -> PortError {
    match err {
        PortError::SwitchRejected(_) => err,
        other => PortError::SwitchRejected(other.to_string()),
    }
}

fn into_add_rejected(err: PortError) -> PortError {
    match err {
        PortError::AddRejected(_) => err,
        other => PortError::AddRejected(other.to_string()),
    }
}

#[derive(Debug)]
struct Trail {
    state: ReconcileState,
    steps: Vec<StateTransition>,
}

impl Default for Trail {
    fn default() -> Self {
        Self {
            state: ReconcileState::Idle,
            steps: Vec::with_capacity(4),
        }
    }
}

impl Trail {
    fn advance(&mut self, event: ReconcileEvent) -> Result<(), PortError> {
        let transition = reconcile_transition(self.state, event)
            .map_err(|e| PortError::Validation(e.to_string()))?;
        debug!(
            from = ?transition.from,
            to = ?transition.to,
            reason = transition.reason,
            "reconcile transition"
        );
        self.state = transition.to;
        self.steps.push(transition);
        Ok(())
    }

    fn fail(&mut self, event: ReconcileEvent, err: PortError) -> Result<ReconcileVia, PortError> {
        self.advance(event)?;
        Err(err)
    }
}
