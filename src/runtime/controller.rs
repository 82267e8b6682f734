//! Sequential stage runner. Each stage is a barrier; the first failure ends the run.

use crate::chain::{ChainCallAdapter, ChainCallSpec};
use crate::error::{Result, VerifyError};
use crate::probes::{
    scan_log_for_pattern, wait_for_port_open, wait_for_unit_active, Host,
    NON_200_SEQUENCER_STATUS_PATTERN, PANIC_PATTERN,
};
use crate::runtime::report::{RunReport, StageStatus};
use crate::utils::config::RunConfig;
use crate::utils::rpc::ChainCaller;
use crate::verifier::{wait_for_value_change, ConvergenceMonitor, EndpointVerifier};
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

const BOOT_TARGET: &str = "multi-user.target";
const UPGRADEABLE_PROXY_CALLDATA: &str = "0x80000000";
const UPGRADEABLE_PROXY_ADFS_CALLDATA: &str = "0x8200000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Boot,
    Readiness,
    EndpointShape,
    PipelineConvergence,
    CrossChainConsistency,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Boot,
        Stage::Readiness,
        Stage::EndpointShape,
        Stage::PipelineConvergence,
        Stage::CrossChainConsistency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Readiness => "readiness",
            Self::EndpointShape => "endpoint_shape",
            Self::PipelineConvergence => "pipeline_convergence",
            Self::CrossChainConsistency => "cross_chain_consistency",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first error of a run, tagged with the stage it stopped.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: VerifyError,
}

pub struct RunController {
    config: RunConfig,
    host: Arc<dyn Host>,
    adapter: ChainCallAdapter,
    client: Client,
}

impl RunController {
    pub fn new(config: RunConfig, host: Arc<dyn Host>, caller: Arc<dyn ChainCaller>) -> Self {
        let adapter = ChainCallAdapter::new(caller, config.sepolia.clone(), config.ink.clone());
        Self {
            config,
            host,
            adapter,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every stage in order, filling `report` as checks pass.
    pub async fn run(&self, report: &mut RunReport) -> std::result::Result<(), StageFailure> {
        for stage in Stage::ALL {
            tracing::info!("[VERIFY] stage {} starting", stage);
            let started = Instant::now();
            let outcome = match stage {
                Stage::Boot => self.boot().await,
                Stage::Readiness => self.readiness().await,
                Stage::EndpointShape => self.endpoint_shape(report).await,
                Stage::PipelineConvergence => self.pipeline_convergence(report).await,
                Stage::CrossChainConsistency => self.cross_chain_consistency(report).await,
            };
            match outcome {
                Ok(()) => {
                    report.record_stage(stage, StageStatus::Passed, started.elapsed());
                    tracing::info!("[VERIFY] ✓ stage {} passed", stage);
                }
                Err(error) => {
                    report.record_stage(stage, StageStatus::Failed, started.elapsed());
                    let failure = StageFailure { stage, error };
                    report.record_failure(&failure);
                    return Err(failure);
                }
            }
        }
        report.passed = true;
        Ok(())
    }

    async fn boot(&self) -> Result<()> {
        self.host.start().await?;
        tracing::info!("[BOOT] host reachable, waiting for {}", BOOT_TARGET);
        wait_for_unit_active(self.host.as_ref(), BOOT_TARGET, self.config.boot_policy()).await
    }

    async fn readiness(&self) -> Result<()> {
        for service in self.config.services_to_wait_for() {
            wait_for_unit_active(self.host.as_ref(), service, self.config.service_policy())
                .await?;
        }
        for port in self.config.ports_to_wait_for() {
            wait_for_port_open(&self.config.host_name, port, self.config.port_policy()).await?;
        }
        Ok(())
    }

    async fn endpoint_shape(&self, report: &mut RunReport) -> Result<()> {
        let verifier = EndpointVerifier {
            client: &self.client,
            admin_url: &self.config.admin_url,
            metrics_url: &self.config.metrics_url,
            policy: self.config.endpoint_policy(),
            verify_metrics: self.config.verify_metrics,
        };
        report.endpoints = verifier.verify_all().await?;
        Ok(())
    }

    async fn pipeline_convergence(&self, report: &mut RunReport) -> Result<()> {
        let contracts = &self.config.contracts;
        let feed = ChainCallSpec::latest_answer(contracts.chainlink_proxy, self.adapter.sepolia());

        let baseline = self.adapter.execute(&feed).await?;
        tracing::info!("[CONVERGE] baseline latestAnswer on Sepolia: {}", baseline);
        report.record_value(
            "baseline",
            feed.endpoint.network,
            format!("{:#x}", feed.contract),
            baseline.as_str(),
        );

        let monitor = ConvergenceMonitor {
            client: &self.client,
            admin_url: &self.config.admin_url,
            metrics_url: &self.config.metrics_url,
        };
        monitor.wait_for_history(self.config.history_policy()).await?;

        if self.config.verify_metrics {
            let count = monitor
                .wait_for_network_updates(
                    &self.config.update_network_label,
                    self.config.min_network_updates,
                    self.config.update_policy(),
                )
                .await?;
            report.network_updates = Some(count);
        } else {
            tracing::warn!(
                "[CONVERGE] update counter for {} not checked (VERIFY_METRICS=false)",
                self.config.update_network_label
            );
        }

        let reporter = self.config.services.reporter.as_str();
        scan_log_for_pattern(self.host.as_ref(), reporter, PANIC_PATTERN).await?;
        scan_log_for_pattern(
            self.host.as_ref(),
            reporter,
            NON_200_SEQUENCER_STATUS_PATTERN,
        )
        .await?;

        let changed = wait_for_value_change(
            &self.adapter,
            &feed,
            &baseline,
            self.config.value_change_budget(),
        )
        .await?;
        report.record_value(
            "changed",
            feed.endpoint.network,
            format!("{:#x}", feed.contract),
            changed,
        );
        Ok(())
    }

    /// The four contract calls that must answer on both chains. Values are recorded, not compared.
    pub fn cross_chain_calls(&self) -> [(&'static str, ChainCallSpec); 4] {
        let contracts = &self.config.contracts;
        let sepolia = self.adapter.sepolia();
        let ink = self.adapter.ink();
        [
            (
                "upgradeable_proxy",
                ChainCallSpec::raw(
                    contracts.upgradeable_proxy,
                    UPGRADEABLE_PROXY_CALLDATA,
                    sepolia,
                    true,
                ),
            ),
            (
                "chainlink_proxy",
                ChainCallSpec::latest_answer(contracts.chainlink_proxy, sepolia),
            ),
            (
                "upgradeable_proxy_adfs",
                ChainCallSpec::raw(
                    contracts.upgradeable_proxy_adfs,
                    UPGRADEABLE_PROXY_ADFS_CALLDATA,
                    ink,
                    true,
                ),
            ),
            (
                "cl_aggregator_adapter",
                ChainCallSpec::latest_answer(contracts.cl_aggregator_adapter, ink),
            ),
        ]
    }

    async fn cross_chain_consistency(&self, report: &mut RunReport) -> Result<()> {
        tracing::info!("[CHAIN] Checking contracts on both chains...");
        for (label, spec) in self.cross_chain_calls() {
            let value = self.adapter.execute(&spec).await?;
            report.record_value(
                label,
                spec.endpoint.network,
                format!("{:#x}", spec.contract),
                value,
            );
        }
        tracing::info!("[CHAIN] ✓ All contracts responded on Sepolia and Ink");
        Ok(())
    }
}
