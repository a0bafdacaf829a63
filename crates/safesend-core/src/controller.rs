use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::Address;
use tracing::{error, info, warn};

use crate::domain::{ConnectionPhase, ConnectionState, NetworkConfig, Notice};
use crate::error::ConnectionError;
use crate::ports::{ContractPort, PortError, ProviderEventKind, ProviderPort};
use crate::reconciler::{ChainReconciler, ReconcileOutcome, ReconcileVia, Reconciliation};
use crate::registry::NetworkRegistry;
use crate::transfer::{NetworkObserver, TransferTypeResolver};

const INSTALL_WALLET: &str = "Please install a browser wallet such as MetaMask.";

#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Connected {
        account: Address,
        reconciliation: Reconciliation,
    },
    /// A disconnect or network change happened while the attempt was pending;
    /// its result was discarded.
    Superseded,
}

#[derive(Debug, Clone)]
pub enum NetworkChange {
    /// Selection committed; no wallet session to reconcile.
    Selected,
    Reconciled(Reconciliation),
    Superseded,
}

struct Session<H> {
    state: ConnectionState<H>,
    observers: Vec<Box<dyn NetworkObserver<H>>>,
}

struct Inner<P, C: ContractPort> {
    provider: P,
    contracts: C,
    registry: NetworkRegistry,
    reconciler: ChainReconciler,
    session: Mutex<Session<C::Handle>>,
}

/// Sole writer of [`ConnectionState`].
///
/// Wallet calls run without holding the state lock. Every attempt is tagged
/// with the state generation it started from, and its result is applied only
/// if no disconnect, reconnect or network change bumped the generation since.
pub struct ConnectionController<P, C: ContractPort> {
    inner: Arc<Inner<P, C>>,
}

impl<P, C: ContractPort> Clone for ConnectionController<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, C> ConnectionController<P, C>
where
    P: ProviderPort,
    C: ContractPort,
{
    pub fn new(provider: P, contracts: C, registry: NetworkRegistry) -> Self {
        let state = ConnectionState::new(registry.default_network());
        Self {
            inner: Arc::new(Inner {
                provider,
                contracts,
                registry,
                reconciler: ChainReconciler,
                session: Mutex::new(Session {
                    state,
                    observers: vec![Box::new(TransferTypeResolver)],
                }),
            }),
        }
    }

    pub fn provider(&self) -> &P {
        &self.inner.provider
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.inner.registry
    }

    pub fn snapshot(&self) -> Result<ConnectionState<C::Handle>, ConnectionError> {
        Ok(self.session()?.state.clone())
    }

    pub fn active_network(&self) -> Result<&NetworkConfig, ConnectionError> {
        let id = self.session()?.state.active_network_id.clone();
        self.inner.registry.resolve(&id)
    }

    pub fn subscribe(
        &self,
        observer: Box<dyn NetworkObserver<C::Handle>>,
    ) -> Result<(), ConnectionError> {
        self.session()?.observers.push(observer);
        Ok(())
    }

    pub async fn connect(&self) -> Result<ConnectOutcome, ConnectionError> {
        if !self.inner.provider.is_available() {
            let mut session = self.session()?;
            session.state.next_generation();
            session.state.clear_connection(ConnectionPhase::Failed);
            session.state.notice = Some(Notice::error(INSTALL_WALLET));
            warn!("no wallet provider injected");
            return Err(PortError::ProviderUnavailable.into());
        }

        let (generation, network) = {
            let mut session = self.session()?;
            let network = self
                .inner
                .registry
                .resolve(&session.state.active_network_id)?
                .clone();
            let generation = session.state.next_generation();
            session.state.clear_connection(ConnectionPhase::Connecting);
            session.state.notice = None;
            (generation, network)
        };
        info!(network = %network.id, generation, "connecting wallet");

        let accounts = match self.inner.provider.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                let notice = Notice::error(format!("Wallet connection failed: {err}"));
                return self.fail_attempt(generation, err.into(), notice);
            }
        };
        let Some(account) = accounts.first().copied() else {
            let err = PortError::Validation("wallet returned no accounts".to_owned());
            let notice = Notice::error(format!("Wallet connection failed: {err}"));
            return self.fail_attempt(generation, err.into(), notice);
        };
        if self.is_stale(generation)? {
            warn!(generation, "discarding superseded account request");
            return Ok(ConnectOutcome::Superseded);
        }

        let reconciliation = self
            .inner
            .reconciler
            .reconcile(&self.inner.provider, &network)
            .await;
        let via = match &reconciliation.outcome {
            ReconcileOutcome::Reconciled(via) => *via,
            ReconcileOutcome::Unreconciled(source) => {
                let notice = failure_notice(&network, source);
                let err = ConnectionError::Unreconciled {
                    network: network.id.clone(),
                    source: source.clone(),
                };
                return self.fail_attempt(generation, err, notice);
            }
        };

        let mut session = self.session()?;
        if session.state.generation != generation {
            warn!(generation, "discarding superseded connection");
            return Ok(ConnectOutcome::Superseded);
        }
        let handle = match self.inner.contracts.bind(&network.contract, account) {
            Ok(handle) => handle,
            Err(err) => {
                session.state.clear_connection(ConnectionPhase::Failed);
                session.state.notice = Some(bind_failure_notice(&network, &err));
                return Err(err.into());
            }
        };
        session.state.phase = ConnectionPhase::Connected;
        session.state.account = Some(account);
        session.state.contract_handle = Some(handle);
        session.state.notice = success_notice(&network, via);
        info!(network = %network.id, %account, "wallet connected");

        Ok(ConnectOutcome::Connected {
            account,
            reconciliation,
        })
    }

    /// Idempotent. Any pending connect or reconciliation result is discarded.
    pub fn disconnect(&self) -> Result<(), ConnectionError> {
        let mut session = self.session()?;
        session.state.next_generation();
        session.state.clear_connection(ConnectionPhase::Disconnected);
        session.state.notice = Some(Notice::info("Wallet disconnected"));
        info!("wallet disconnected");
        Ok(())
    }

    pub async fn set_active_network(&self, id: &str) -> Result<NetworkChange, ConnectionError> {
        let network = match self.inner.registry.resolve(id) {
            Ok(network) => network.clone(),
            Err(err) => {
                error!(network = id, "network selection rejected: not registered");
                return Err(err);
            }
        };

        let generation = {
            let mut guard = self.session()?;
            let session = &mut *guard;
            let generation = session.state.next_generation();
            session.state.active_network_id = network.id.clone();
            for observer in &session.observers {
                observer.network_committed(&network, &mut session.state);
            }
            info!(network = %network.id, "active network committed");

            match session.state.phase {
                ConnectionPhase::Connected => {
                    // The bound handle belongs to the previous network.
                    session.state.contract_handle = None;
                }
                ConnectionPhase::Connecting => {
                    session.state.clear_connection(ConnectionPhase::Disconnected);
                    session.state.notice = Some(Notice::info(
                        "Connection attempt cancelled by network change",
                    ));
                    return Ok(NetworkChange::Selected);
                }
                ConnectionPhase::Disconnected | ConnectionPhase::Failed => {
                    return Ok(NetworkChange::Selected);
                }
            }
            generation
        };

        let reconciliation = self
            .inner
            .reconciler
            .reconcile(&self.inner.provider, &network)
            .await;

        let mut session = self.session()?;
        if session.state.generation != generation {
            warn!(generation, network = %network.id, "discarding superseded reconciliation");
            return Ok(NetworkChange::Superseded);
        }
        let Some(account) = session.state.account else {
            return Ok(NetworkChange::Superseded);
        };
        match &reconciliation.outcome {
            ReconcileOutcome::Reconciled(via) => {
                match self.inner.contracts.bind(&network.contract, account) {
                    Ok(handle) => {
                        session.state.contract_handle = Some(handle);
                        session.state.notice = success_notice(&network, *via);
                        Ok(NetworkChange::Reconciled(reconciliation))
                    }
                    Err(err) => {
                        error!(network = %network.id, error = %err, "contract bind failed");
                        session.state.notice = Some(bind_failure_notice(&network, &err));
                        Err(err.into())
                    }
                }
            }
            ReconcileOutcome::Unreconciled(source) => {
                // Account stays connected; no handle until a later reconciliation succeeds.
                session.state.notice = Some(failure_notice(&network, source));
                Err(ConnectionError::Unreconciled {
                    network: network.id.clone(),
                    source: source.clone(),
                })
            }
        }
    }

    pub fn set_transfer_kind(&self, kind: &str) -> Result<(), ConnectionError> {
        let mut session = self.session()?;
        let network = self.inner.registry.resolve(&session.state.active_network_id)?;
        let Some(selected) = network.transfer_kinds.find(kind) else {
            error!(kind, network = %network.id, "transfer kind rejected");
            return Err(ConnectionError::InvalidTransferKind {
                kind: kind.to_owned(),
                network: network.id.clone(),
            });
        };
        session.state.transfer_kind = selected.clone();
        Ok(())
    }

    /// Applies wallet-side account and chain changes reported by the provider.
    ///
    /// A contract that fails to bind leaves the session without a handle and
    /// an error notice; later events in the batch are still applied.
    pub fn sync_provider_events(&self) -> Result<usize, ConnectionError> {
        let events = self.inner.provider.drain_events()?;
        if events.is_empty() {
            return Ok(0);
        }

        let mut session = self.session()?;
        let network = self.inner.registry.resolve(&session.state.active_network_id)?;
        let desired = network.chain_id_u64()?;
        for event in &events {
            if !session.state.is_connected() {
                continue;
            }
            match &event.kind {
                ProviderEventKind::AccountsChanged(accounts) => match accounts.first() {
                    None => {
                        session.state.next_generation();
                        session
                            .state
                            .clear_connection(ConnectionPhase::Disconnected);
                        session.state.notice = Some(Notice::info("Wallet disconnected"));
                        info!("wallet revoked account access");
                    }
                    Some(&account) if session.state.account != Some(account) => {
                        session.state.account = Some(account);
                        if session.state.contract_handle.is_some() {
                            match self.inner.contracts.bind(&network.contract, account) {
                                Ok(handle) => session.state.contract_handle = Some(handle),
                                Err(err) => {
                                    warn!(network = %network.id, error = %err, "rebind failed");
                                    session.state.contract_handle = None;
                                    session.state.notice = Some(bind_failure_notice(network, &err));
                                }
                            }
                        }
                        info!(%account, "wallet account changed");
                    }
                    Some(_) => {}
                },
                ProviderEventKind::ChainChanged(chain_id) if *chain_id == desired => {
                    if session.state.contract_handle.is_none() {
                        if let Some(account) = session.state.account {
                            match self.inner.contracts.bind(&network.contract, account) {
                                Ok(handle) => {
                                    session.state.contract_handle = Some(handle);
                                    session.state.notice = None;
                                }
                                Err(err) => {
                                    warn!(network = %network.id, error = %err, "rebind failed");
                                    session.state.notice = Some(bind_failure_notice(network, &err));
                                }
                            }
                        }
                    }
                }
                ProviderEventKind::ChainChanged(chain_id) => {
                    if session.state.contract_handle.take().is_some() {
                        warn!(chain_id, network = %network.id, "wallet left the active network");
                        session.state.notice = Some(Notice::error(format!(
                            "Wallet switched away from {}. Reconnect or switch back.",
                            network.id
                        )));
                    }
                }
            }
        }
        Ok(events.len())
    }

    fn fail_attempt(
        &self,
        generation: u64,
        err: ConnectionError,
        notice: Notice,
    ) -> Result<ConnectOutcome, ConnectionError> {
        let mut session = self.session()?;
        if session.state.generation != generation {
            warn!(generation, error = %err, "discarding superseded connection failure");
            return Ok(ConnectOutcome::Superseded);
        }
        session.state.clear_connection(ConnectionPhase::Failed);
        session.state.notice = Some(notice);
        warn!(error = %err, "wallet connection failed");
        Err(err)
    }

    fn is_stale(&self, generation: u64) -> Result<bool, ConnectionError> {
        Ok(self.session()?.state.generation != generation)
    }

    fn session(&self) -> Result<MutexGuard<'_, Session<C::Handle>>, ConnectionError> {
        self.inner
            .session
            .lock()
            .map_err(|e| ConnectionError::StatePoisoned(e.to_string()))
    }
}

fn success_notice(network: &NetworkConfig, via: ReconcileVia) -> Option<Notice> {
    match via {
        ReconcileVia::AlreadyActive => None,
        ReconcileVia::Switched => Some(Notice::info(format!("Network switched to {}", network.id))),
        ReconcileVia::Added => Some(Notice::info(format!(
            "Network added and switched to {}",
            network.id
        ))),
    }
}

fn failure_notice(network: &NetworkConfig, source: &PortError) -> Notice {
    match source {
        PortError::AddRejected(_) => Notice::error(format!(
            "Failed to add the {} network. Please try adding it manually.",
            network.id
        )),
        PortError::SwitchRejected(_) => Notice::error(format!(
            "Failed to switch to the {} network. Please switch manually.",
            network.id
        )),
        other => Notice::error(format!(
            "Could not check the wallet network for {}: {other}",
            network.id
        )),
    }
}

fn bind_failure_notice(network: &NetworkConfig, err: &PortError) -> Notice {
    Notice::error(format!("Could not bind the {} contract: {err}", network.id))
}
