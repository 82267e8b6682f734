use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::transports::http::Http;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{timeout, Duration};

const RPC_ERR_MAX_LEN: usize = 260;

pub type HttpProvider = RootProvider<Http<Client>>;

/// Read-only contract call against an RPC endpoint.
///
/// Implementations return the call result as text: the 0x-prefixed hex of the returned bytes
/// for an ABI call.
#[async_trait]
pub trait ChainCaller: Send + Sync {
    async fn call(&self, rpc_url: &str, to: Address, input: Bytes) -> anyhow::Result<String>;
}

/// `eth_call` through alloy HTTP providers, one cached provider per RPC URL.
pub struct AlloyChainCaller {
    call_timeout: Duration,
    providers: Mutex<HashMap<String, Arc<HttpProvider>>>,
}

impl AlloyChainCaller {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            call_timeout,
            providers: Mutex::new(HashMap::new()),
        }
    }

    fn provider_for(&self, rpc_url: &str) -> anyhow::Result<Arc<HttpProvider>> {
        let mut providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(provider) = providers.get(rpc_url) {
            return Ok(provider.clone());
        }
        let url = rpc_url
            .parse::<reqwest::Url>()
            .map_err(|e| anyhow::anyhow!("invalid RPC URL `{rpc_url}`: {e}"))?;
        let provider = Arc::new(ProviderBuilder::new().on_http(url));
        providers.insert(rpc_url.to_string(), provider.clone());
        Ok(provider)
    }
}

#[async_trait]
impl ChainCaller for AlloyChainCaller {
    async fn call(&self, rpc_url: &str, to: Address, input: Bytes) -> anyhow::Result<String> {
        let provider = self.provider_for(rpc_url)?;
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(input));
        let raw = timeout(self.call_timeout, provider.call(&request))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "eth_call timed out after {}ms for to={:#x}",
                    self.call_timeout.as_millis(),
                    to
                )
            })?
            .map_err(|err| {
                anyhow::anyhow!(
                    "eth_call failed for to={:#x}: {}",
                    to,
                    compact_rpc_error_message(&err.to_string())
                )
            })?;
        Ok(alloy::hex::encode_prefixed(&raw))
    }
}

fn compact_rpc_error_message(message: &str) -> String {
    crate::utils::error::compact_error_message(message, RPC_ERR_MAX_LEN)
}
