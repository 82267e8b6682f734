use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::chains::Network;

pub type Result<T> = std::result::Result<T, VerifyError>;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("missing required configuration: {0}")]
    MissingConfig(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("host command `{command}` failed: {detail}")]
    HostCommand { command: String, detail: String },
    #[error("service `{service}` not active after {}s (last state: {last_state})", .waited.as_secs())]
    ServiceNotReady {
        service: String,
        waited: Duration,
        last_state: String,
    },
    #[error("port {port} on `{host}` not accepting connections after {}s", .waited.as_secs())]
    PortUnreachable {
        host: String,
        port: u16,
        waited: Duration,
    },
    #[error("endpoint `{url}` did not return 2xx within {}s (last failure: {last_failure})", .waited.as_secs())]
    EndpointTimeout {
        url: String,
        waited: Duration,
        last_failure: String,
    },
    #[error("endpoint `{endpoint}` returned an invalid response: {violation}")]
    InvalidResponseShape {
        endpoint: String,
        violation: ShapeViolation,
    },
    #[error(
        "found unwanted pattern '{pattern}' in logs for {service}. Matched text: '{matched_text}' at line {line_number}"
    )]
    UnwantedLogPattern {
        service: String,
        pattern: String,
        matched_text: String,
        line_number: usize,
    },
    #[error("{network} contract {contract} failed to respond: {cause}")]
    ContractCallFailed {
        network: Network,
        contract: String,
        cause: String,
    },
    #[error("{} not reached within {}s (last observation: {last_observation})", describe_condition(.condition, .network.as_deref()), .waited.as_secs())]
    ConvergenceTimeout {
        condition: &'static str,
        network: Option<String>,
        waited: Duration,
        last_observation: String,
    },
    #[error("value did not change from {initial} within {timeout_secs}s timeout")]
    ValueDidNotChange { initial: String, timeout_secs: u64 },
}

fn describe_condition(condition: &str, network: Option<&str>) -> String {
    match network {
        Some(network) => format!("convergence condition `{condition}` for network `{network}`"),
        None => format!("convergence condition `{condition}`"),
    }
}

/// What an endpoint body got wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeViolation {
    InvalidJson(String),
    UnexpectedBody(String),
    MissingKey(String),
}

impl fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(f, "invalid JSON: {err}"),
            Self::UnexpectedBody(body) => write!(f, "expected an empty body, got '{body}'"),
            Self::MissingKey(key) => write!(f, "metrics output is missing '{key}'"),
        }
    }
}

impl VerifyError {
    /// Short machine-friendly kind, used by the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingConfig(_) => "missing_config",
            Self::InvalidConfig(_) => "invalid_config",
            Self::HostCommand { .. } => "host_command",
            Self::ServiceNotReady { .. } => "service_not_ready",
            Self::PortUnreachable { .. } => "port_unreachable",
            Self::EndpointTimeout { .. } => "endpoint_timeout",
            Self::InvalidResponseShape { .. } => "invalid_response_shape",
            Self::UnwantedLogPattern { .. } => "unwanted_log_pattern",
            Self::ContractCallFailed { .. } => "contract_call_failed",
            Self::ConvergenceTimeout { .. } => "convergence_timeout",
            Self::ValueDidNotChange { .. } => "value_did_not_change",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_metrics_key_is_named_in_message() {
        let err = VerifyError::InvalidResponseShape {
            endpoint: "metrics".to_string(),
            violation: ShapeViolation::MissingKey("updates_to_networks".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("`metrics`"), "{message}");
        assert!(message.contains("'updates_to_networks'"), "{message}");
        assert_eq!(err.kind(), "invalid_response_shape");
    }

    #[test]
    fn convergence_timeout_mentions_network_when_present() {
        let err = VerifyError::ConvergenceTimeout {
            condition: "updates",
            network: Some("ink_sepolia".to_string()),
            waited: Duration::from_secs(30),
            last_observation: "counter=1".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("`updates` for network `ink_sepolia`"), "{message}");
        assert!(message.contains("30s"), "{message}");
    }
}
