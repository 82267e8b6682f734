use crate::config::chains::ChainEndpoint;
use crate::error::{Result, VerifyError};
use crate::utils::retry::{AttemptBudget, PollPolicy};
use alloy::primitives::Address;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PROBE_POLL_INTERVAL_MS: u64 = 1_000;
// Same budget the VM test driver gives `wait_for_unit` / `wait_for_open_port`.
const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 900;
const DEFAULT_CHAIN_CALL_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_UPDATE_NETWORK_LABEL: &str = "ink_sepolia";
const DEFAULT_MIN_NETWORK_UPDATES: u64 = 2;

/// Contract addresses probed on the two chains.
#[derive(Debug, Clone, Serialize)]
pub struct Contracts {
    pub upgradeable_proxy: Address,
    pub chainlink_proxy: Address,
    pub upgradeable_proxy_adfs: Address,
    pub cl_aggregator_adapter: Address,
}

/// systemd units making up the environment under test.
#[derive(Debug, Clone, Serialize)]
pub struct Services {
    pub reporter: String,
    pub anvil_sepolia: String,
    pub anvil_ink: String,
    pub sequencer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timeouts {
    pub endpoint_existence: Duration,
    pub history_population: Duration,
    pub network_update: Duration,
    pub value_change: Duration,
    pub value_change_poll_interval: Duration,
    pub probe_poll_interval: Duration,
    pub boot: Duration,
    pub service_ready: Duration,
    pub port_open: Duration,
    pub chain_call: Duration,
}

/// Immutable run parameters. Derived URLs are computed once in [`RunConfig::from_lookup`].
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub base_url: String,
    pub host_name: String,
    pub sepolia_port: u16,
    pub ink_port: u16,
    pub sequencer_admin_port: u16,
    pub sequencer_metrics_port: u16,
    pub contracts: Contracts,
    pub services: Services,
    pub timeouts: Timeouts,
    pub update_network_label: String,
    pub min_network_updates: u64,
    pub verify_metrics: bool,
    pub host_ssh_target: Option<String>,
    pub report_path: Option<String>,

    pub sepolia: ChainEndpoint,
    pub ink: ChainEndpoint,
    pub admin_url: String,
    pub metrics_url: String,
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| VerifyError::MissingConfig(format!("{key} must be set")))
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_value<T>(key: &str, raw: &str, expected: &str) -> Result<T>
where
    T: FromStr,
{
    raw.parse::<T>().map_err(|_| {
        VerifyError::InvalidConfig(format!("{key} must be {expected}, got `{raw}`"))
    })
}

fn required_port<F>(lookup: &F, key: &str) -> Result<u16>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, key)?;
    parse_value(key, &raw, "a TCP port")
}

fn required_secs<F>(lookup: &F, key: &str) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, key)?;
    parse_value::<u64>(key, &raw, "a whole number of seconds").map(Duration::from_secs)
}

fn optional_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key) {
        Some(raw) => parse_value(key, &raw, "an unsigned integer"),
        None => Ok(default),
    }
}

fn optional_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = optional(lookup, key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(VerifyError::InvalidConfig(format!(
            "{key} must be a boolean flag, got `{raw}`"
        ))),
    }
}

fn required_address<F>(lookup: &F, key: &str) -> Result<Address>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, key)?;
    Address::from_str(&raw).map_err(|e| {
        VerifyError::InvalidConfig(format!(
            "{key} must be a 0x-prefixed contract address, got `{raw}`: {e}"
        ))
    })
}

/// Checks the base URL and returns its host component.
fn validate_base_url(raw: &str) -> Result<String> {
    let parsed = raw.parse::<reqwest::Url>().map_err(|e| {
        VerifyError::InvalidConfig(format!("BASE_URL must be a valid URL, got `{raw}`: {e}"))
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(VerifyError::InvalidConfig(format!(
                "BASE_URL must use http(s) scheme, got `{other}`"
            )))
        }
    }
    if parsed.port().is_some() {
        return Err(VerifyError::InvalidConfig(format!(
            "BASE_URL must not carry a port (ports are configured per service), got `{raw}`"
        )));
    }
    parsed
        .host_str()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| VerifyError::InvalidConfig(format!("BASE_URL has no host: `{raw}`")))
}

impl RunConfig {
    /// Resolve from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = required(&lookup, "BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let host_name = validate_base_url(&base_url)?;

        let sepolia_port = required_port(&lookup, "SEPOLIA_PORT")?;
        let ink_port = required_port(&lookup, "INK_PORT")?;
        let sequencer_admin_port = required_port(&lookup, "SEQUENCER_ADMIN_PORT")?;
        let sequencer_metrics_port = match optional(&lookup, "SEQUENCER_METRICS_PORT") {
            Some(raw) => parse_value("SEQUENCER_METRICS_PORT", &raw, "a TCP port")?,
            None => sequencer_admin_port,
        };

        let contracts = Contracts {
            upgradeable_proxy: required_address(&lookup, "UPGRADEABLE_PROXY_CONTRACT")?,
            chainlink_proxy: required_address(&lookup, "CHAINLINK_PROXY_CONTRACT")?,
            upgradeable_proxy_adfs: required_address(&lookup, "UPGRADEABLE_PROXY_ADFS_CONTRACT")?,
            cl_aggregator_adapter: required_address(&lookup, "CL_AGGREGATOR_ADAPTER_CONTRACT")?,
        };

        let services = Services {
            reporter: required(&lookup, "REPORTER_SERVICE")?,
            anvil_sepolia: required(&lookup, "ANVIL_SEPOLIA_SERVICE")?,
            anvil_ink: required(&lookup, "ANVIL_INK_SERVICE")?,
            sequencer: required(&lookup, "SEQUENCER_SERVICE")?,
        };

        let value_change_poll_interval = required_secs(&lookup, "VALUE_CHANGE_POLL_INTERVAL")?;
        if value_change_poll_interval.is_zero() {
            return Err(VerifyError::InvalidConfig(
                "VALUE_CHANGE_POLL_INTERVAL must be greater than zero".to_string(),
            ));
        }
        let probe_poll_interval_ms =
            optional_u64(&lookup, "PROBE_POLL_INTERVAL_MS", DEFAULT_PROBE_POLL_INTERVAL_MS)?;
        if probe_poll_interval_ms == 0 {
            return Err(VerifyError::InvalidConfig(
                "PROBE_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        let timeouts = Timeouts {
            endpoint_existence: required_secs(&lookup, "ENDPOINT_EXISTENCE_TIMEOUT")?,
            history_population: required_secs(&lookup, "HISTORY_POPULATION_TIMEOUT")?,
            network_update: required_secs(&lookup, "NETWORK_UPDATE_TIMEOUT")?,
            value_change: required_secs(&lookup, "VALUE_CHANGE_TIMEOUT")?,
            value_change_poll_interval,
            probe_poll_interval: Duration::from_millis(probe_poll_interval_ms),
            boot: Duration::from_secs(optional_u64(
                &lookup,
                "BOOT_TIMEOUT",
                DEFAULT_READINESS_TIMEOUT_SECS,
            )?),
            service_ready: Duration::from_secs(optional_u64(
                &lookup,
                "SERVICE_READY_TIMEOUT",
                DEFAULT_READINESS_TIMEOUT_SECS,
            )?),
            port_open: Duration::from_secs(optional_u64(
                &lookup,
                "PORT_OPEN_TIMEOUT",
                DEFAULT_READINESS_TIMEOUT_SECS,
            )?),
            chain_call: Duration::from_millis(optional_u64(
                &lookup,
                "CHAIN_CALL_TIMEOUT_MS",
                DEFAULT_CHAIN_CALL_TIMEOUT_MS,
            )?),
        };

        let sepolia = ChainEndpoint::sepolia(format!("{base_url}:{sepolia_port}"));
        let ink = ChainEndpoint::ink(format!("{base_url}:{ink_port}"));
        let admin_url = format!("{base_url}:{sequencer_admin_port}");
        let metrics_url = format!("{base_url}:{sequencer_metrics_port}");

        Ok(Self {
            host_name,
            sepolia_port,
            ink_port,
            sequencer_admin_port,
            sequencer_metrics_port,
            contracts,
            services,
            timeouts,
            update_network_label: optional(&lookup, "UPDATE_NETWORK_LABEL")
                .unwrap_or_else(|| DEFAULT_UPDATE_NETWORK_LABEL.to_string()),
            min_network_updates: optional_u64(
                &lookup,
                "MIN_NETWORK_UPDATES",
                DEFAULT_MIN_NETWORK_UPDATES,
            )?,
            verify_metrics: optional_bool(&lookup, "VERIFY_METRICS", true)?,
            host_ssh_target: optional(&lookup, "HOST_SSH_TARGET"),
            report_path: optional(&lookup, "VERIFY_REPORT_PATH"),
            sepolia,
            ink,
            admin_url,
            metrics_url,
            base_url,
        })
    }

    /// Units that must be active before anything else is probed.
    pub fn services_to_wait_for(&self) -> Vec<&str> {
        vec![
            self.services.anvil_sepolia.as_str(),
            self.services.anvil_ink.as_str(),
            self.services.sequencer.as_str(),
            self.services.reporter.as_str(),
        ]
    }

    pub fn ports_to_wait_for(&self) -> Vec<u16> {
        let mut ports = vec![self.sepolia_port, self.ink_port, self.sequencer_admin_port];
        if self.sequencer_metrics_port != self.sequencer_admin_port {
            ports.push(self.sequencer_metrics_port);
        }
        ports
    }

    /// Map an RPC URL to its configured endpoint, `Network::Unknown` when it matches neither.
    pub fn endpoint_for_url(&self, rpc_url: &str) -> ChainEndpoint {
        ChainEndpoint::resolve(rpc_url, &[&self.sepolia, &self.ink])
    }

    pub fn boot_policy(&self) -> PollPolicy {
        PollPolicy::new(self.timeouts.boot, self.timeouts.probe_poll_interval)
    }

    pub fn service_policy(&self) -> PollPolicy {
        PollPolicy::new(self.timeouts.service_ready, self.timeouts.probe_poll_interval)
    }

    pub fn port_policy(&self) -> PollPolicy {
        PollPolicy::new(self.timeouts.port_open, self.timeouts.probe_poll_interval)
    }

    pub fn endpoint_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.timeouts.endpoint_existence,
            self.timeouts.probe_poll_interval,
        )
    }

    pub fn history_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.timeouts.history_population,
            self.timeouts.probe_poll_interval,
        )
    }

    pub fn update_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.timeouts.network_update,
            self.timeouts.probe_poll_interval,
        )
    }

    pub fn value_change_budget(&self) -> AttemptBudget {
        AttemptBudget::from_timeout(
            self.timeouts.value_change,
            self.timeouts.value_change_poll_interval,
        )
    }
}
