//! Polling until downstream effects catch up: history records, per-network update counters and
//! on-chain values.

use crate::chain::{ChainCallAdapter, ChainCallSpec};
use crate::error::{Result, VerifyError};
use crate::probes::http::fetch_success_body;
use crate::utils::retry::{poll_until, Attempt, AttemptBudget, PollPolicy};
use reqwest::Client;
use serde_json::Value;
use tokio::time::sleep;

const UPDATES_METRIC: &str = "updates_to_networks";

/// An entry that is not an array counts as populated.
pub fn assess_history(body: &str) -> std::result::Result<(), String> {
    let doc: Value = serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;
    let history = doc
        .get("aggregate_history")
        .ok_or_else(|| "no aggregate_history field".to_string())?;
    let is_empty_array = |entry: &Value| entry.as_array().is_some_and(|items| items.is_empty());

    let empty: Vec<String> = match history {
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| is_empty_array(entry))
            .map(|(idx, _)| idx.to_string())
            .collect(),
        Value::Object(entries) => entries
            .iter()
            .filter(|(_, entry)| is_empty_array(entry))
            .map(|(key, _)| key.clone())
            .collect(),
        other => return Err(format!("aggregate_history is not a collection: {other}")),
    };
    if empty.is_empty() {
        Ok(())
    } else {
        Err(format!("empty history for feeds [{}]", empty.join(", ")))
    }
}

pub fn network_update_count(metrics: &str, network: &str) -> Option<f64> {
    metrics
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let rest = line.strip_prefix(UPDATES_METRIC)?.strip_prefix('{')?;
            let (labels, value) = rest.split_once('}')?;
            let matches_network = labels.split(',').any(|pair| {
                pair.split_once('=').is_some_and(|(key, val)| {
                    key.trim() == "network" && val.trim().trim_matches('"') == network
                })
            });
            if !matches_network {
                return None;
            }
            value.split_whitespace().next()?.parse::<f64>().ok()
        })
}

pub struct ConvergenceMonitor<'a> {
    pub client: &'a Client,
    pub admin_url: &'a str,
    pub metrics_url: &'a str,
}

impl ConvergenceMonitor<'_> {
    pub async fn wait_for_history(&self, policy: PollPolicy) -> Result<()> {
        let url = format!("{}/get_history", self.admin_url);
        poll_until(policy, |_| {
            let url = url.as_str();
            async move {
                match fetch_success_body(self.client, url).await {
                    Ok(body) => match assess_history(&body) {
                        Ok(()) => Attempt::Ready(()),
                        Err(observation) => Attempt::Pending(observation),
                    },
                    Err(failure) => Attempt::Pending(failure),
                }
            }
        })
        .await
        .map_err(|failure| {
            failure.into_error(|exhausted| VerifyError::ConvergenceTimeout {
                condition: "history",
                network: None,
                waited: exhausted.waited,
                last_observation: exhausted.last_observation,
            })
        })?;
        tracing::info!("[CONVERGE] ✓ sequencer history is populated for every feed");
        Ok(())
    }

    pub async fn wait_for_network_updates(
        &self,
        network: &str,
        min_updates: u64,
        policy: PollPolicy,
    ) -> Result<f64> {
        let url = format!("{}/metrics", self.metrics_url);
        let threshold = min_updates as f64;
        let count = poll_until(policy, |_| {
            let url = url.as_str();
            async move {
                let body = match fetch_success_body(self.client, url).await {
                    Ok(body) => body,
                    Err(failure) => return Attempt::Pending(failure),
                };
                match network_update_count(&body, network) {
                    Some(count) if count > threshold => Attempt::Ready(count),
                    Some(count) => Attempt::Pending(format!(
                        "{UPDATES_METRIC}{{network=\"{network}\"}} = {count}, need > {min_updates}"
                    )),
                    None => Attempt::Pending(format!(
                        "no {UPDATES_METRIC} sample for network {network}"
                    )),
                }
            }
        })
        .await
        .map_err(|failure| {
            failure.into_error(|exhausted| VerifyError::ConvergenceTimeout {
                condition: "updates",
                network: Some(network.to_string()),
                waited: exhausted.waited,
                last_observation: exhausted.last_observation,
            })
        })?;
        tracing::info!(
            "[CONVERGE] ✓ {} updates published to {} (threshold {})",
            count,
            network,
            min_updates
        );
        Ok(count)
    }
}

/// No wall-clock cutoff: slow calls can stretch the run past `budget.timeout`.
pub async fn wait_for_value_change(
    adapter: &ChainCallAdapter,
    spec: &ChainCallSpec,
    initial: &str,
    budget: AttemptBudget,
) -> Result<String> {
    for attempt in 1..=budget.attempts {
        let value = adapter.execute(spec).await?;
        if value != initial {
            tracing::info!(
                "[CONVERGE] ✓ {} contract {:#x} value changed: {} -> {} (attempt {})",
                spec.endpoint.network,
                spec.contract,
                initial,
                value,
                attempt
            );
            return Ok(value);
        }
        tracing::debug!(
            "[CONVERGE] value still {} after attempt {}/{}",
            value,
            attempt,
            budget.attempts
        );
        sleep(budget.interval).await;
    }

    Err(VerifyError::ValueDidNotChange {
        initial: initial.to_string(),
        timeout_secs: budget.timeout.as_secs(),
    })
}
