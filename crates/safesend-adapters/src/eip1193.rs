use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{address, Address};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use safesend_core::{
    parse_chain_id, AddChainParams, PortError, ProviderEvent, ProviderEventKind, ProviderPort,
};

use crate::WalletConfig;

/// EIP-1193: the user rejected the request.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-3326: the wallet has no such chain configured.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

const DETERMINISTIC_ACCOUNT: Address = address!("1000000000000000000000000000000000000001");

#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
    #[cfg(target_arch = "wasm32")]
    hooks: Arc<Mutex<BrowserHooks>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    #[cfg(not(target_arch = "wasm32"))]
    Proxy(ProxyRuntime),
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[derive(Debug, Clone)]
#[cfg(not(target_arch = "wasm32"))]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
struct ProviderState {
    accounts: Vec<Address>,
    chain_id: u64,
    known_chains: BTreeSet<u64>,
    reject_accounts: bool,
    switch_rejection: Option<String>,
    add_rejection: Option<String>,
    event_seq: u64,
    events: Vec<ProviderEvent>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            accounts: vec![DETERMINISTIC_ACCOUNT],
            chain_id: 1,
            known_chains: BTreeSet::from([1]),
            reject_accounts: false,
            switch_rejection: None,
            add_rejection: None,
            event_seq: 0,
            events: Vec::new(),
        }
    }
}

impl ProviderState {
    fn push_event(&mut self, kind: ProviderEventKind) {
        self.event_seq = self.event_seq.saturating_add(1);
        let sequence = self.event_seq;
        self.events.push(ProviderEvent { sequence, kind });
    }

    fn set_accounts(&mut self, accounts: Vec<Address>) {
        if self.accounts != accounts {
            self.accounts = accounts.clone();
            self.push_event(ProviderEventKind::AccountsChanged(accounts));
        }
    }

    fn set_chain(&mut self, chain_id: u64) {
        self.known_chains.insert(chain_id);
        if self.chain_id != chain_id {
            self.chain_id = chain_id;
            self.push_event(ProviderEventKind::ChainChanged(chain_id));
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
struct BrowserHooks {
    accounts_changed: Option<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>>,
    chain_changed: Option<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>>,
}

/// Error object returned by the wallet for a rejected request.
#[derive(Debug, Clone)]
struct RpcFailure {
    code: Option<i64>,
    /// Some mobile wallets wrap the real code in `data.originalError.code`.
    nested_code: Option<i64>,
    message: String,
}

impl RpcFailure {
    fn from_json(err: &Value) -> Self {
        Self {
            code: err.get("code").and_then(Value::as_i64),
            nested_code: err
                .pointer("/data/originalError/code")
                .and_then(Value::as_i64),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| err.to_string()),
        }
    }

    fn has_code(&self, code: i64) -> bool {
        self.code == Some(code) || self.nested_code == Some(code)
    }
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug)]
enum CallError {
    Rpc(RpcFailure),
    Port(PortError),
}

impl CallError {
    fn into_request_error(self) -> PortError {
        match self {
            CallError::Rpc(rpc) if rpc.has_code(USER_REJECTED_CODE) => PortError::UserRejected,
            CallError::Rpc(rpc) => PortError::Transport(format!("wallet error: {rpc}")),
            CallError::Port(err) => err,
        }
    }

    fn into_switch_error(self, chain_id_hex: &str) -> PortError {
        match self {
            CallError::Rpc(rpc) if rpc.has_code(UNRECOGNIZED_CHAIN_CODE) => {
                PortError::ChainNotRecognized(chain_id_hex.to_owned())
            }
            CallError::Rpc(rpc) => PortError::SwitchRejected(rpc.to_string()),
            CallError::Port(err) => PortError::SwitchRejected(err.to_string()),
        }
    }

    fn into_add_error(self) -> PortError {
        match self {
            CallError::Rpc(rpc) => PortError::AddRejected(rpc.to_string()),
            CallError::Port(err) => PortError::AddRejected(err.to_string()),
        }
    }
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(WalletConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: WalletConfig) -> Self {
        // The injected provider may appear after startup, so availability is
        // checked per call rather than here.
        #[cfg(target_arch = "wasm32")]
        let mode = {
            let _ = &config;
            ProviderMode::Browser
        };

        #[cfg(not(target_arch = "wasm32"))]
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            // No request timeout: a switch or add resolves only when the user
            // answers the wallet prompt.
            let connect_timeout =
                std::time::Duration::from_millis(config.proxy_connect_timeout_ms);
            match reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .build()
            {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        warn!(error = %e, "EIP-1193 proxy unavailable; using deterministic wallet");
                        ProviderMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        Self {
            mode,
            state: Arc::new(Mutex::new(ProviderState::default())),
            #[cfg(target_arch = "wasm32")]
            hooks: Arc::new(Mutex::new(BrowserHooks::default())),
        }
    }

    /// In-memory wallet on chain 1 with a single fixed account.
    pub fn deterministic() -> Self {
        Self {
            mode: ProviderMode::Deterministic,
            state: Arc::new(Mutex::new(ProviderState::default())),
            #[cfg(target_arch = "wasm32")]
            hooks: Arc::new(Mutex::new(BrowserHooks::default())),
        }
    }

    fn is_deterministic(&self) -> bool {
        matches!(self.mode, ProviderMode::Deterministic)
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    pub fn debug_inject_accounts_changed(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        self.lock_state()?.set_accounts(accounts);
        Ok(())
    }

    /// Simulates the user switching chains inside the wallet.
    pub fn debug_inject_chain_changed(&self, chain_id: u64) -> Result<(), PortError> {
        self.lock_state()?.set_chain(chain_id);
        Ok(())
    }

    pub fn debug_reject_account_requests(&self, reject: bool) -> Result<(), PortError> {
        self.lock_state()?.reject_accounts = reject;
        Ok(())
    }

    pub fn debug_reject_switch(&self, reason: Option<String>) -> Result<(), PortError> {
        self.lock_state()?.switch_rejection = reason;
        Ok(())
    }

    pub fn debug_reject_add(&self, reason: Option<String>) -> Result<(), PortError> {
        self.lock_state()?.add_rejection = reason;
        Ok(())
    }

    pub fn debug_known_chains(&self) -> Result<Vec<u64>, PortError> {
        Ok(self.lock_state()?.known_chains.iter().copied().collect())
    }

    async fn remote_request(&self, method: &str, params: Value) -> Result<Value, CallError> {
        debug!(method, "eip1193 request");
        match &self.mode {
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(proxy) => proxy.call(method, params).await,
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => wasm_request(method, params).await,
            ProviderMode::Disabled(reason) => {
                Err(CallError::Port(PortError::Policy(reason.clone())))
            }
            ProviderMode::Deterministic => Err(CallError::Port(PortError::NotImplemented(
                "deterministic wallet has no remote transport",
            ))),
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn register_browser_hooks(&self) -> Result<(), PortError> {
        use wasm_bindgen::{closure::Closure, JsCast, JsValue};

        let provider = browser_provider()?;
        let on_fn = get_prop(&provider, "on")
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .or_else(|| {
                get_prop(&provider, "addListener")
                    .ok()
                    .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            })
            .ok_or(PortError::NotImplemented(
                "provider does not expose on/addListener",
            ))?;

        let mut hooks = self
            .hooks
            .lock()
            .map_err(|e| PortError::Transport(format!("provider hooks lock poisoned: {e}")))?;
        if hooks.accounts_changed.is_some() && hooks.chain_changed.is_some() {
            return Ok(());
        }

        let state_for_accounts = Arc::clone(&self.state);
        let accounts_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            let mut accounts = Vec::new();
            if js_sys::Array::is_array(&value) {
                for item in js_sys::Array::from(&value).iter() {
                    if let Some(addr) = item.as_string().and_then(|raw| raw.parse().ok()) {
                        accounts.push(addr);
                    }
                }
            }
            if let Ok(mut g) = state_for_accounts.lock() {
                g.set_accounts(accounts);
            }
        });

        let state_for_chain = Arc::clone(&self.state);
        let chain_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            if let Ok(chain_id) = js_chain_id_to_u64(value) {
                if let Ok(mut g) = state_for_chain.lock() {
                    g.set_chain(chain_id);
                }
            }
        });

        on_fn
            .call2(
                &provider,
                &JsValue::from_str("accountsChanged"),
                accounts_cb.as_ref().unchecked_ref(),
            )
            .map_err(|e| PortError::Transport(format!("register accountsChanged failed: {e:?}")))?;
        on_fn
            .call2(
                &provider,
                &JsValue::from_str("chainChanged"),
                chain_cb.as_ref().unchecked_ref(),
            )
            .map_err(|e| PortError::Transport(format!("register chainChanged failed: {e:?}")))?;

        hooks.accounts_changed = Some(accounts_cb);
        hooks.chain_changed = Some(chain_cb);
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ProviderPort for Eip1193Adapter {
    fn is_available(&self) -> bool {
        match &self.mode {
            ProviderMode::Disabled(_) => false,
            ProviderMode::Deterministic => true,
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(_) => true,
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => browser_provider().is_ok(),
        }
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        self.check_mode()?;

        if self.is_deterministic() {
            let g = self.lock_state()?;
            if g.reject_accounts {
                return Err(PortError::UserRejected);
            }
            return Ok(g.accounts.clone());
        }

        let result = self
            .remote_request("eth_requestAccounts", serde_json::json!([]))
            .await
            .map_err(CallError::into_request_error)?;
        let accounts = parse_accounts(&result)?;
        self.lock_state()?.set_accounts(accounts.clone());

        // Registering listeners before the first account grant can leave some
        // wallets' permission prompt pending, so it happens here.
        #[cfg(target_arch = "wasm32")]
        if let Err(e) = self.register_browser_hooks() {
            warn!(error = %e, "wallet event listeners unavailable");
        }

        Ok(accounts)
    }

    async fn chain_id(&self) -> Result<u64, PortError> {
        self.check_mode()?;

        if self.is_deterministic() {
            return Ok(self.lock_state()?.chain_id);
        }

        let result = self
            .remote_request("eth_chainId", serde_json::json!([]))
            .await
            .map_err(CallError::into_request_error)?;
        let chain_id = json_chain_id_to_u64(&result)?;
        self.lock_state()?.set_chain(chain_id);
        Ok(chain_id)
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), PortError> {
        self.check_mode()?;
        let chain_id = parse_chain_id(chain_id_hex)?;

        if self.is_deterministic() {
            let mut g = self.lock_state()?;
            if let Some(reason) = g.switch_rejection.clone() {
                return Err(PortError::SwitchRejected(reason));
            }
            if !g.known_chains.contains(&chain_id) {
                return Err(PortError::ChainNotRecognized(chain_id_hex.to_owned()));
            }
            g.set_chain(chain_id);
            return Ok(());
        }

        self.remote_request(
            "wallet_switchEthereumChain",
            serde_json::json!([{ "chainId": chain_id_hex }]),
        )
        .await
        .map_err(|e| e.into_switch_error(chain_id_hex))?;
        self.lock_state()?.set_chain(chain_id);
        Ok(())
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), PortError> {
        self.check_mode()?;
        let chain_id = parse_chain_id(&params.chain_id)?;

        if self.is_deterministic() {
            let mut g = self.lock_state()?;
            if let Some(reason) = g.add_rejection.clone() {
                return Err(PortError::AddRejected(reason));
            }
            g.set_chain(chain_id);
            return Ok(());
        }

        let payload = serde_json::to_value(params)
            .map_err(|e| PortError::Validation(format!("add chain params: {e}")))?;
        self.remote_request("wallet_addEthereumChain", serde_json::json!([payload]))
            .await
            .map_err(CallError::into_add_error)?;
        self.lock_state()?.set_chain(chain_id);
        Ok(())
    }

    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError> {
        let mut g = self.lock_state()?;
        Ok(std::mem::take(&mut g.events))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ProxyRuntime {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                CallError::Port(PortError::Transport(format!(
                    "eip1193 proxy request failed: {e}"
                )))
            })?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            CallError::Port(PortError::Transport(format!(
                "eip1193 proxy json decode failed: {e}"
            )))
        })?;
        // Wallet errors travel as JSON-RPC error objects whatever the HTTP status.
        if let Some(err) = body.get("error") {
            return Err(CallError::Rpc(RpcFailure::from_json(err)));
        }
        if !status.is_success() {
            return Err(CallError::Port(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            ))));
        }
        body.get("result").cloned().ok_or_else(|| {
            CallError::Port(PortError::Transport(
                "eip1193 proxy missing result".to_owned(),
            ))
        })
    }
}

fn parse_accounts(result: &Value) -> Result<Vec<Address>, PortError> {
    let arr = result.as_array().ok_or_else(|| {
        PortError::Transport("eth_requestAccounts result must be array".to_owned())
    })?;
    let mut accounts = Vec::with_capacity(arr.len());
    for item in arr {
        let raw = item.as_str().ok_or_else(|| {
            PortError::Transport("eth_requestAccounts item must be string".to_owned())
        })?;
        let parsed: Address = raw
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid account: {e}")))?;
        accounts.push(parsed);
    }
    Ok(accounts)
}

fn json_chain_id_to_u64(value: &Value) -> Result<u64, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| PortError::Validation("chain id must be string or number".to_owned()))?;
    parse_chain_id(s)
}

#[cfg(target_arch = "wasm32")]
async fn wasm_request(method: &str, params: Value) -> Result<Value, CallError> {
    use wasm_bindgen::JsCast;

    let provider = browser_provider().map_err(CallError::Port)?;
    let request_fn = get_prop(&provider, "request")
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
        .ok_or(CallError::Port(PortError::NotImplemented(
            "window.ethereum.request is unavailable",
        )))?;

    let request = serde_json::json!({
        "method": method,
        "params": params,
    });
    let request_js = serde_wasm_bindgen::to_value(&request).map_err(|e| {
        CallError::Port(PortError::Transport(format!(
            "failed to encode wasm request: {e}"
        )))
    })?;
    let promise_js = request_fn.call1(&provider, &request_js).map_err(|e| {
        CallError::Port(PortError::Transport(format!(
            "provider request dispatch failed: {e:?}"
        )))
    })?;
    let promise = promise_js.dyn_into::<js_sys::Promise>().map_err(|_| {
        CallError::Port(PortError::Transport(
            "provider request did not return Promise".to_owned(),
        ))
    })?;
    let result_js = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| CallError::Rpc(js_rpc_failure(&e)))?;
    if result_js.is_null() || result_js.is_undefined() {
        return Ok(Value::Null);
    }
    serde_wasm_bindgen::from_value(result_js).map_err(|e| {
        CallError::Port(PortError::Transport(format!(
            "failed to decode wasm response: {e}"
        )))
    })
}

#[cfg(target_arch = "wasm32")]
fn js_rpc_failure(err: &wasm_bindgen::JsValue) -> RpcFailure {
    let code_of = |target: &wasm_bindgen::JsValue| {
        get_prop(target, "code")
            .ok()
            .and_then(|v| v.as_f64())
            .map(|c| c as i64)
    };
    let nested_code = get_prop(err, "data")
        .ok()
        .filter(|d| d.is_object())
        .and_then(|d| get_prop(&d, "originalError").ok())
        .filter(|o| o.is_object())
        .and_then(|o| code_of(&o));
    RpcFailure {
        code: if err.is_object() { code_of(err) } else { None },
        nested_code,
        message: get_prop(err, "message")
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_else(|| format!("{err:?}")),
    }
}

#[cfg(target_arch = "wasm32")]
fn browser_provider() -> Result<wasm_bindgen::JsValue, PortError> {
    let window = web_sys::window().ok_or(PortError::ProviderUnavailable)?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(PortError::ProviderUnavailable);
    }
    Ok(provider)
}

#[cfg(target_arch = "wasm32")]
fn get_prop(target: &wasm_bindgen::JsValue, key: &str) -> Result<wasm_bindgen::JsValue, PortError> {
    js_sys::Reflect::get(target, &wasm_bindgen::JsValue::from_str(key))
        .map_err(|e| PortError::Transport(format!("read provider property {key} failed: {e:?}")))
}

#[cfg(target_arch = "wasm32")]
fn js_chain_id_to_u64(value: wasm_bindgen::JsValue) -> Result<u64, PortError> {
    if let Some(s) = value.as_string() {
        return parse_chain_id(&s);
    }
    if let Some(num) = value.as_f64() {
        return Ok(num as u64);
    }
    Err(PortError::Validation("invalid JS chain id".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_failures_classify_by_code() {
        let rejected = RpcFailure::from_json(&serde_json::json!({
            "code": 4001,
            "message": "User rejected the request."
        }));
        assert!(matches!(
            CallError::Rpc(rejected).into_request_error(),
            PortError::UserRejected
        ));

        let unknown = RpcFailure::from_json(&serde_json::json!({
            "code": 4902,
            "message": "Unrecognized chain ID"
        }));
        assert_eq!(
            CallError::Rpc(unknown).into_switch_error("0xa045c"),
            PortError::ChainNotRecognized("0xa045c".to_owned())
        );

        let wrapped = RpcFailure::from_json(&serde_json::json!({
            "code": -32603,
            "message": "Internal error",
            "data": {"originalError": {"code": 4902}}
        }));
        assert!(matches!(
            CallError::Rpc(wrapped).into_switch_error("0xa045c"),
            PortError::ChainNotRecognized(_)
        ));

        let denied = RpcFailure::from_json(&serde_json::json!({"code": 4001, "message": "nope"}));
        assert_eq!(
            CallError::Rpc(denied).into_switch_error("0xa045c"),
            PortError::SwitchRejected("nope (code 4001)".to_owned())
        );
    }

    #[test]
    fn add_failures_are_always_add_rejected() {
        let err = CallError::Port(PortError::Transport("timeout".to_owned())).into_add_error();
        assert!(matches!(err, PortError::AddRejected(ref m) if m.contains("timeout")));
    }
}
