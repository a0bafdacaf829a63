use std::str::FromStr;
use std::sync::Arc;

use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, Bytes, FixedBytes, I256, U256};
use serde_json::Value;
use tracing::{debug, warn};

use safesend_core::{ContractBinding, ContractPort, PortError};

/// Parses a network's ABI once per bind and hands out call-ready handles.
#[derive(Debug, Clone, Default)]
pub struct ContractAdapter;

/// A contract bound to the connected account.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    abi: Arc<JsonAbi>,
    address: Address,
    account: Address,
}

impl ContractPort for ContractAdapter {
    type Handle = ContractHandle;

    fn bind(
        &self,
        binding: &ContractBinding,
        account: Address,
    ) -> Result<ContractHandle, PortError> {
        let abi: JsonAbi = serde_json::from_value(binding.abi.clone())
            .map_err(|e| PortError::Validation(format!("invalid abi json: {e}")))?;
        if binding.address == Address::ZERO {
            warn!("binding contract at the zero address; calls will not reach a deployment");
        }
        debug!(contract = %binding.address, %account, "contract bound");
        Ok(ContractHandle {
            abi: Arc::new(abi),
            address: binding.address,
            account,
        })
    }
}

impl ContractHandle {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.abi.function(name).is_some_and(|f| !f.is_empty())
    }

    /// ABI-encodes a call. `method_signature` is a bare name or a full
    /// signature like `sendEdu(address)` to pick an overload. Each argument
    /// is JSON when it parses as JSON, otherwise a plain string.
    pub fn encode_call(
        &self,
        method_signature: &str,
        args: &[String],
    ) -> Result<Bytes, PortError> {
        let function = select_function(&self.abi, method_signature)?;
        if function.inputs.len() != args.len() {
            return Err(PortError::Validation(format!(
                "argument count mismatch: expected {}, got {}",
                function.inputs.len(),
                args.len()
            )));
        }

        let mut dyn_args = Vec::with_capacity(args.len());
        for (input, arg) in function.inputs.iter().zip(args.iter()) {
            let ty: DynSolType = input.ty.parse().map_err(|e| {
                PortError::Validation(format!("unsupported type '{}': {e}", input.ty))
            })?;
            let parsed = serde_json::from_str::<Value>(arg).unwrap_or(Value::String(arg.clone()));
            let value = parse_dyn_value(&parsed, &ty).map_err(|e| {
                PortError::Validation(format!("arg '{}' parse failed: {e}", input.name))
            })?;
            dyn_args.push(value);
        }

        let encoded = function
            .abi_encode_input(&dyn_args)
            .map_err(|e| PortError::Validation(format!("abi encoding failed: {e}")))?;
        Ok(Bytes::from(encoded))
    }

    /// `eth_sendTransaction` parameters for a call from the bound account.
    pub fn transaction_request(
        &self,
        method_signature: &str,
        args: &[String],
        value: U256,
    ) -> Result<Value, PortError> {
        let data = self.encode_call(method_signature, args)?;
        Ok(serde_json::json!({
            "from": self.account,
            "to": self.address,
            "data": data,
            "value": format!("{value:#x}"),
        }))
    }
}

fn select_function<'a>(
    abi: &'a JsonAbi,
    method_signature: &str,
) -> Result<&'a Function, PortError> {
    let (method_name, full_sig) = match method_signature.split_once('(') {
        Some((name, _)) => (name, Some(method_signature)),
        None => (method_signature, None),
    };

    let candidates = abi
        .function(method_name)
        .ok_or_else(|| PortError::Validation(format!("method not found: {method_name}")))?;

    if let Some(full_sig) = full_sig {
        return candidates
            .iter()
            .find(|f| function_signature(f) == full_sig)
            .ok_or_else(|| {
                PortError::Validation(format!("method signature not found: {full_sig}"))
            });
    }

    candidates
        .first()
        .ok_or_else(|| PortError::Validation(format!("method has no overloads: {method_name}")))
}

fn function_signature(function: &Function) -> String {
    let inputs: Vec<&str> = function.inputs.iter().map(|i| i.ty.as_str()).collect();
    format!("{}({})", function.name, inputs.join(","))
}

fn parse_dyn_value(value: &Value, ty: &DynSolType) -> Result<DynSolValue, String> {
    match ty {
        DynSolType::Bool => value
            .as_bool()
            .map(DynSolValue::Bool)
            .ok_or_else(|| "expected bool".to_owned()),
        DynSolType::Uint(bits) => match value {
            Value::String(s) => U256::from_str(s)
                .map(|x| DynSolValue::Uint(x, *bits))
                .map_err(|e| format!("invalid uint: {e}")),
            Value::Number(n) => U256::from_str(&n.to_string())
                .map(|x| DynSolValue::Uint(x, *bits))
                .map_err(|e| format!("invalid uint: {e}")),
            _ => Err("expected uint string/number".to_owned()),
        },
        DynSolType::Int(bits) => match value {
            Value::String(s) => I256::from_str(s)
                .map(|x| DynSolValue::Int(x, *bits))
                .map_err(|e| format!("invalid int: {e}")),
            Value::Number(n) => I256::from_str(&n.to_string())
                .map(|x| DynSolValue::Int(x, *bits))
                .map_err(|e| format!("invalid int: {e}")),
            _ => Err("expected int string/number".to_owned()),
        },
        DynSolType::Address => value
            .as_str()
            .ok_or_else(|| "expected address string".to_owned())
            .and_then(|s| {
                Address::from_str(s)
                    .map(DynSolValue::Address)
                    .map_err(|e| format!("invalid address: {e}"))
            }),
        DynSolType::FixedBytes(size) => value
            .as_str()
            .ok_or_else(|| "expected fixed bytes string".to_owned())
            .and_then(|s| {
                FixedBytes::from_str(s)
                    .map(|x| DynSolValue::FixedBytes(x, *size))
                    .map_err(|e| format!("invalid fixed bytes: {e}"))
            }),
        DynSolType::Bytes => value
            .as_str()
            .ok_or_else(|| "expected bytes string".to_owned())
            .and_then(|s| {
                Bytes::from_str(s)
                    .map(|x| DynSolValue::Bytes(x.into()))
                    .map_err(|e| format!("invalid bytes: {e}"))
            }),
        DynSolType::String => value
            .as_str()
            .map(|s| DynSolValue::String(s.to_owned()))
            .ok_or_else(|| "expected string".to_owned()),
        DynSolType::Array(inner) => {
            let arr = value
                .as_array()
                .ok_or_else(|| "expected array".to_owned())?;
            arr.iter()
                .map(|v| parse_dyn_value(v, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Array)
        }
        DynSolType::Tuple(inner) => {
            let arr = value
                .as_array()
                .ok_or_else(|| "expected tuple array".to_owned())?;
            if arr.len() != inner.len() {
                return Err(format!(
                    "tuple length mismatch: expected {}, got {}",
                    inner.len(),
                    arr.len()
                ));
            }
            arr.iter()
                .zip(inner.iter())
                .map(|(v, t)| parse_dyn_value(v, t))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Tuple)
        }
        _ => Err(format!("unsupported argument type {ty:?}")),
    }
}
