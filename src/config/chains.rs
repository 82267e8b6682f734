use serde::Serialize;
use std::fmt;

/// The two chains the sequencer publishes to. `Unknown` covers ad-hoc endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Network {
    Sepolia,
    Ink,
    Unknown,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sepolia => "Sepolia",
            Self::Ink => "Ink",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An RPC endpoint with its network identity fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEndpoint {
    pub network: Network,
    pub rpc_url: String,
}

impl ChainEndpoint {
    pub fn new(network: Network, rpc_url: impl Into<String>) -> Self {
        Self {
            network,
            rpc_url: rpc_url.into(),
        }
    }

    pub fn sepolia(rpc_url: impl Into<String>) -> Self {
        Self::new(Network::Sepolia, rpc_url)
    }

    pub fn ink(rpc_url: impl Into<String>) -> Self {
        Self::new(Network::Ink, rpc_url)
    }

    /// Resolve an arbitrary RPC URL against the known endpoints by exact match.
    pub fn resolve(rpc_url: &str, known: &[&ChainEndpoint]) -> Self {
        known
            .iter()
            .find(|endpoint| endpoint.rpc_url == rpc_url)
            .map(|endpoint| (*endpoint).clone())
            .unwrap_or_else(|| Self::new(Network::Unknown, rpc_url))
    }
}
