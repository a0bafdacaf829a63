#![allow(dead_code)]

use std::collections::BTreeSet;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use alloy::primitives::Address;
use serde_json::{json, Value};
use tiny_http::{Method, Response, Server, StatusCode};

use safesend_adapters::{ContractAdapter, Eip1193Adapter, RuntimeProfile, WalletConfig};
use safesend_core::{parse_chain_id, ConnectionController, NetworkRegistry};

pub type WalletController = ConnectionController<Eip1193Adapter, ContractAdapter>;

pub const WALLET_ACCOUNT: &str = "0x1000000000000000000000000000000000000001";

pub fn wallet_account() -> Address {
    WALLET_ACCOUNT.parse().expect("wallet account")
}

pub fn controller_on(adapter: Eip1193Adapter, default_network: &str) -> WalletController {
    let registry = NetworkRegistry::builtin()
        .expect("builtin registry")
        .with_default(default_network)
        .expect("default network");
    ConnectionController::new(adapter, ContractAdapter, registry)
}

pub fn proxy_config(base_url: &str) -> WalletConfig {
    WalletConfig {
        runtime_profile: RuntimeProfile::Production,
        eip1193_proxy_url: Some(base_url.to_owned()),
        proxy_connect_timeout_ms: 200,
        ..WalletConfig::default()
    }
}

/// Scripted behavior of the wallet behind the proxy.
#[derive(Debug, Clone)]
pub struct WalletSim {
    pub chain_id: u64,
    pub known_chains: BTreeSet<u64>,
    /// JSON-RPC error returned for `eth_requestAccounts`, if any.
    pub accounts_error: Option<Value>,
    /// JSON-RPC error returned for a switch to an unknown chain.
    pub unknown_chain_error: Value,
    /// Overrides every switch outcome when set.
    pub switch_error: Option<Value>,
    pub add_error: Option<Value>,
    /// HTTP status sent with error responses.
    pub error_status: u16,
    /// How long the user takes to answer a switch prompt. The wallet state
    /// changes at once; only the response is held back.
    pub switch_delay: Duration,
}

impl WalletSim {
    pub fn on_chain(chain_id: u64) -> Self {
        Self {
            chain_id,
            known_chains: BTreeSet::from([chain_id]),
            accounts_error: None,
            unknown_chain_error: json!({"code": 4902, "message": "Unrecognized chain ID"}),
            switch_error: None,
            add_error: None,
            error_status: 200,
            switch_delay: Duration::ZERO,
        }
    }

    fn handle(&mut self, method: &str, params: &Value) -> Result<Value, Value> {
        match method {
            "eth_requestAccounts" => match &self.accounts_error {
                Some(err) => Err(err.clone()),
                None => Ok(json!([WALLET_ACCOUNT])),
            },
            "eth_chainId" => Ok(json!(format!("{:#x}", self.chain_id))),
            "wallet_switchEthereumChain" => {
                if let Some(err) = &self.switch_error {
                    return Err(err.clone());
                }
                let target = requested_chain(params);
                if !self.known_chains.contains(&target) {
                    return Err(self.unknown_chain_error.clone());
                }
                self.chain_id = target;
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                if let Some(err) = &self.add_error {
                    return Err(err.clone());
                }
                let target = requested_chain(params);
                self.known_chains.insert(target);
                self.chain_id = target;
                Ok(Value::Null)
            }
            _ => Err(json!({"code": -32601, "message": "method not found"})),
        }
    }
}

fn requested_chain(params: &Value) -> u64 {
    params
        .pointer("/0/chainId")
        .and_then(Value::as_str)
        .and_then(|raw| parse_chain_id(raw).ok())
        .unwrap_or_default()
}

pub struct MockWallet {
    pub base_url: String,
    pub sim: Arc<Mutex<WalletSim>>,
    pub requests: Arc<Mutex<Vec<Value>>>,
    _join: thread::JoinHandle<()>,
}

impl MockWallet {
    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("requests")
            .iter()
            .filter_map(|r| r.get("method").and_then(Value::as_str).map(str::to_owned))
            .collect()
    }

    pub fn params_of(&self, method: &str) -> Option<Value> {
        self.requests
            .lock()
            .expect("requests")
            .iter()
            .find(|r| r.get("method").and_then(Value::as_str) == Some(method))
            .and_then(|r| r.get("params").cloned())
    }

    pub fn chain_id(&self) -> u64 {
        self.sim.lock().expect("sim").chain_id
    }
}

/// JSON-RPC wallet proxy that serves until it has been idle for a few seconds.
pub fn spawn_wallet_proxy(sim: WalletSim) -> MockWallet {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let base_url = format!("http://{}", server.server_addr());
    let sim = Arc::new(Mutex::new(sim));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let thread_sim = Arc::clone(&sim);
    let thread_requests = Arc::clone(&requests);
    let join = thread::spawn(move || {
        while let Ok(Some(mut req)) = server.recv_timeout(Duration::from_secs(5)) {
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

            let mut delay = Duration::ZERO;
            let (code, response) = if *req.method() != Method::Post {
                (405, json!({"error": "method not allowed"}))
            } else {
                let method = payload
                    .get("method")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let params = payload.get("params").cloned().unwrap_or(Value::Null);
                thread_requests.lock().expect("requests").push(payload.clone());

                let mut sim = thread_sim.lock().expect("sim");
                if method == "wallet_switchEthereumChain" {
                    delay = sim.switch_delay;
                }
                match sim.handle(&method, &params) {
                    Ok(result) => (200, json!({"jsonrpc": "2.0", "id": 1, "result": result})),
                    Err(error) => (
                        sim.error_status,
                        json!({"jsonrpc": "2.0", "id": 1, "error": error}),
                    ),
                }
            };

            thread::sleep(delay);
            let response =
                Response::from_string(response.to_string()).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    MockWallet {
        base_url,
        sim,
        requests,
        _join: join,
    }
}
