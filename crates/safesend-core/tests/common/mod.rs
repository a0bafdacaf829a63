#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::oneshot;

use safesend_core::{
    parse_chain_id, AddChainParams, ConnectionController, ContractBinding, ContractPort,
    NetworkRegistry, PortError, ProviderEvent, ProviderEventKind, ProviderPort,
};

pub const SAFESEND_CHAIN: u64 = 0xE708;
pub const EDUCHAIN_CHAIN: u64 = 0xA045C;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RequestAccounts,
    ChainId,
    SwitchChain(String),
    AddChain(AddChainParams),
}

#[derive(Debug)]
struct Script {
    available: bool,
    accounts: Result<Vec<Address>, PortError>,
    active_chain: u64,
    known_chains: HashSet<u64>,
    switch_error: Option<PortError>,
    add_error: Option<PortError>,
    calls: Vec<Call>,
    event_seq: u64,
    events: Vec<ProviderEvent>,
}

/// In-memory wallet whose calls can be held open until a test releases them.
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Mutex<Script>,
    accounts_gate: Mutex<Option<oneshot::Receiver<()>>>,
    chain_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ScriptedProvider {
    pub fn on_chain(chain_id: u64) -> Self {
        Self {
            script: Mutex::new(Script {
                available: true,
                accounts: Ok(vec![account()]),
                active_chain: chain_id,
                known_chains: HashSet::from([1, chain_id]),
                switch_error: None,
                add_error: None,
                calls: Vec::new(),
                event_seq: 0,
                events: Vec::new(),
            }),
            accounts_gate: Mutex::new(None),
            chain_gate: Mutex::new(None),
        }
    }

    pub fn unavailable() -> Self {
        let provider = Self::on_chain(SAFESEND_CHAIN);
        provider.script.lock().expect("script").available = false;
        provider
    }

    pub fn knows_chain(self, chain_id: u64) -> Self {
        self.script
            .lock()
            .expect("script")
            .known_chains
            .insert(chain_id);
        self
    }

    pub fn reject_accounts(self) -> Self {
        self.script.lock().expect("script").accounts = Err(PortError::UserRejected);
        self
    }

    pub fn fail_switch(self, err: PortError) -> Self {
        self.script.lock().expect("script").switch_error = Some(err);
        self
    }

    pub fn fail_add(self, err: PortError) -> Self {
        self.script.lock().expect("script").add_error = Some(err);
        self
    }

    pub fn gate_accounts(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.accounts_gate.lock().expect("gate") = Some(rx);
        tx
    }

    pub fn gate_chain_id(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.chain_gate.lock().expect("gate") = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().expect("script").calls.clone()
    }

    pub fn active_chain(&self) -> u64 {
        self.script.lock().expect("script").active_chain
    }

    pub fn emit(&self, kind: ProviderEventKind) {
        let mut script = self.script.lock().expect("script");
        if let ProviderEventKind::ChainChanged(chain_id) = &kind {
            script.active_chain = *chain_id;
        }
        script.event_seq += 1;
        let sequence = script.event_seq;
        script.events.push(ProviderEvent { sequence, kind });
    }

    fn record(&self, call: Call) {
        self.script.lock().expect("script").calls.push(call);
    }
}

#[async_trait]
impl ProviderPort for ScriptedProvider {
    fn is_available(&self) -> bool {
        self.script.lock().expect("script").available
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        self.record(Call::RequestAccounts);
        let gate = self.accounts_gate.lock().expect("gate").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.script.lock().expect("script").accounts.clone()
    }

    async fn chain_id(&self) -> Result<u64, PortError> {
        self.record(Call::ChainId);
        let gate = self.chain_gate.lock().expect("gate").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(self.script.lock().expect("script").active_chain)
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), PortError> {
        self.record(Call::SwitchChain(chain_id_hex.to_owned()));
        let mut script = self.script.lock().expect("script");
        if let Some(err) = script.switch_error.clone() {
            return Err(err);
        }
        let chain_id = parse_chain_id(chain_id_hex)?;
        if !script.known_chains.contains(&chain_id) {
            return Err(PortError::ChainNotRecognized(chain_id_hex.to_owned()));
        }
        script.active_chain = chain_id;
        Ok(())
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), PortError> {
        self.record(Call::AddChain(params.clone()));
        let mut script = self.script.lock().expect("script");
        if let Some(err) = script.add_error.clone() {
            return Err(err);
        }
        let chain_id = parse_chain_id(&params.chain_id)?;
        script.known_chains.insert(chain_id);
        script.active_chain = chain_id;
        Ok(())
    }

    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError> {
        Ok(std::mem::take(&mut self.script.lock().expect("script").events))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestHandle {
    pub contract: Address,
    pub account: Address,
}

/// Binds any contract except for accounts it has been told to refuse.
#[derive(Debug, Clone, Default)]
pub struct TestContracts {
    refused: Arc<Mutex<HashSet<Address>>>,
}

impl TestContracts {
    pub fn refuse(&self, account: Address) {
        self.refused.lock().expect("refused").insert(account);
    }
}

impl ContractPort for TestContracts {
    type Handle = TestHandle;

    fn bind(&self, binding: &ContractBinding, account: Address) -> Result<TestHandle, PortError> {
        if self.refused.lock().expect("refused").contains(&account) {
            return Err(PortError::Validation(format!("cannot bind for {account}")));
        }
        Ok(TestHandle {
            contract: binding.address,
            account,
        })
    }
}

pub type TestController = ConnectionController<ScriptedProvider, TestContracts>;

pub fn new_controller(provider: ScriptedProvider) -> TestController {
    new_controller_with(provider, TestContracts::default())
}

pub fn new_controller_with(provider: ScriptedProvider, contracts: TestContracts) -> TestController {
    ConnectionController::new(
        provider,
        contracts,
        NetworkRegistry::builtin().expect("builtin registry"),
    )
}

pub fn account() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid account")
}

pub fn other_account() -> Address {
    "0x2000000000000000000000000000000000000002"
        .parse()
        .expect("valid account")
}

pub fn educhain_contract() -> Address {
    "0xFEc667D65b61Edc7f664766B50D3aC32420718Eb"
        .parse()
        .expect("valid contract address")
}
