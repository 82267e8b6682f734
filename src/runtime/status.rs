use crate::utils::config::RunConfig;

fn secs(duration: std::time::Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Key/value view of the resolved configuration, sorted by key.
pub fn config_summary(config: &RunConfig) -> Vec<(&'static str, String)> {
    let t = &config.timeouts;
    let mut entries = vec![
        ("admin_url", config.admin_url.clone()),
        ("metrics_url", config.metrics_url.clone()),
        ("sepolia_rpc", config.sepolia.rpc_url.clone()),
        ("ink_rpc", config.ink.rpc_url.clone()),
        ("services", config.services_to_wait_for().join(",")),
        (
            "ports",
            config
                .ports_to_wait_for()
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        ("endpoint_timeout", secs(t.endpoint_existence)),
        ("history_timeout", secs(t.history_population)),
        ("update_timeout", secs(t.network_update)),
        ("value_change_timeout", secs(t.value_change)),
        ("value_change_interval", secs(t.value_change_poll_interval)),
        ("probe_interval", secs(t.probe_poll_interval)),
        ("boot_timeout", secs(t.boot)),
        ("service_timeout", secs(t.service_ready)),
        ("port_timeout", secs(t.port_open)),
        ("chain_call_timeout", secs(t.chain_call)),
        (
            "update_threshold",
            format!("{}>{}", config.update_network_label, config.min_network_updates),
        ),
        ("verify_metrics", config.verify_metrics.to_string()),
        (
            "host",
            config
                .host_ssh_target
                .clone()
                .map(|target| format!("ssh:{target}"))
                .unwrap_or_else(|| "local".to_string()),
        ),
        (
            "report_path",
            config.report_path.clone().unwrap_or_else(|| "-".to_string()),
        ),
    ];
    entries.sort_by_key(|(key, _)| *key);
    entries
}

pub fn emit_run_config_status(config: &RunConfig) {
    tracing::info!(
        "[VERIFY] Run config resolved: base_url={} sepolia={} ink={} admin={} metrics={}",
        config.base_url,
        config.sepolia.rpc_url,
        config.ink.rpc_url,
        config.admin_url,
        config.metrics_url
    );
    let entries = config_summary(config)
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>();
    tracing::info!(
        "[VERIFY] Run parameters ({} keys): {}",
        entries.len(),
        entries.join(", ")
    );
    if !config.verify_metrics {
        tracing::warn!(
            "[VERIFY] VERIFY_METRICS=false: /metrics shape and update counter checks will be skipped."
        );
    }
}

/// Multi-line rendering for `VERIFY_EXPLAIN_CONFIG`.
pub fn render_config_explanation(config: &RunConfig) -> String {
    let mut out = String::from("Resolved verifier configuration:\n");
    for (key, value) in config_summary(config) {
        out.push_str(&format!("  {key:<22} {value}\n"));
    }
    out.push_str("Contracts:\n");
    let contracts = &config.contracts;
    for (name, address) in [
        ("upgradeable_proxy", contracts.upgradeable_proxy),
        ("chainlink_proxy", contracts.chainlink_proxy),
        ("upgradeable_proxy_adfs", contracts.upgradeable_proxy_adfs),
        ("cl_aggregator_adapter", contracts.cl_aggregator_adapter),
    ] {
        out.push_str(&format!("  {name:<22} {address:#x}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::tests::base_env;

    fn config() -> RunConfig {
        let env = base_env();
        RunConfig::from_lookup(|key| env.get(key).cloned()).expect("config loads")
    }

    #[test]
    fn summary_is_sorted_and_complete() {
        let summary = config_summary(&config());
        let keys: Vec<_> = summary.iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        let lookup: std::collections::HashMap<_, _> = summary.into_iter().collect();
        assert_eq!(lookup["ports"], "8547,8546,5556");
        assert_eq!(lookup["value_change_timeout"], "120s");
        assert_eq!(lookup["probe_interval"], "1s");
        assert_eq!(lookup["chain_call_timeout"], "5s");
        assert_eq!(lookup["update_threshold"], "ink_sepolia>2");
        assert_eq!(lookup["host"], "local");
    }

    #[test]
    fn explanation_lists_contracts() {
        let text = render_config_explanation(&config());
        assert!(text.starts_with("Resolved verifier configuration:"));
        assert!(text.contains("0xcbd6fc059bebdde30f3ce3d4b3e6a8b8b8a1d8b3"), "{text}");
        assert!(text.contains("admin_url"), "{text}");
    }
}
