//! Read-only contract calls against the two chains, normalized to comparable strings.

use crate::config::chains::ChainEndpoint;
use crate::error::{Result, VerifyError};
use crate::utils::hex::{encode_call_input, normalize_call_output};
use crate::utils::rpc::ChainCaller;
use alloy::primitives::Address;
use serde::Serialize;
use std::sync::Arc;

/// Call signature used when none is given.
pub const LATEST_ANSWER: &str = "latestAnswer()";

/// One contract call: where, what, and whether to truncate the raw result.
#[derive(Debug, Clone, Serialize)]
pub struct ChainCallSpec {
    pub contract: Address,
    pub call_data: String,
    pub endpoint: ChainEndpoint,
    pub truncate: bool,
}

impl ChainCallSpec {
    pub fn latest_answer(contract: Address, endpoint: &ChainEndpoint) -> Self {
        Self {
            contract,
            call_data: LATEST_ANSWER.to_string(),
            endpoint: endpoint.clone(),
            truncate: false,
        }
    }

    pub fn raw(contract: Address, calldata: &str, endpoint: &ChainEndpoint, truncate: bool) -> Self {
        Self {
            contract,
            call_data: calldata.to_string(),
            endpoint: endpoint.clone(),
            truncate,
        }
    }
}

#[derive(Clone)]
pub struct ChainCallAdapter {
    caller: Arc<dyn ChainCaller>,
    sepolia: ChainEndpoint,
    ink: ChainEndpoint,
}

impl ChainCallAdapter {
    pub fn new(caller: Arc<dyn ChainCaller>, sepolia: ChainEndpoint, ink: ChainEndpoint) -> Self {
        Self {
            caller,
            sepolia,
            ink,
        }
    }

    /// Issue the call and return the normalized value (decimal when the raw result was hex).
    pub async fn call(
        &self,
        contract: Address,
        call_data: &str,
        endpoint: &ChainEndpoint,
        truncate: bool,
    ) -> Result<String> {
        let failed = |cause: String| VerifyError::ContractCallFailed {
            network: endpoint.network,
            contract: format!("{contract:#x}"),
            cause,
        };

        let input = encode_call_input(call_data).map_err(failed)?;
        let raw = self
            .caller
            .call(&endpoint.rpc_url, contract, input)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let value = normalize_call_output(&raw, truncate).map_err(failed)?;

        tracing::info!(
            "[CHAIN] ✓ {} contract {:#x} responded: {}",
            endpoint.network,
            contract,
            value
        );
        Ok(value)
    }

    pub async fn execute(&self, spec: &ChainCallSpec) -> Result<String> {
        self.call(spec.contract, &spec.call_data, &spec.endpoint, spec.truncate)
            .await
    }

    pub async fn call_sepolia(&self, contract: Address, call_data: &str, truncate: bool) -> Result<String> {
        self.call(contract, call_data, &self.sepolia, truncate).await
    }

    pub async fn call_ink(&self, contract: Address, call_data: &str, truncate: bool) -> Result<String> {
        self.call(contract, call_data, &self.ink, truncate).await
    }

    pub fn sepolia(&self) -> &ChainEndpoint {
        &self.sepolia
    }

    pub fn ink(&self) -> &ChainEndpoint {
        &self.ink
    }
}
