//! Machine-readable summary of one verification run.

use crate::config::chains::Network;
use crate::runtime::controller::{Stage, StageFailure};
use crate::utils::error::compact_error_message;
use crate::verifier::EndpointCheck;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DIAGNOSTIC_MAX_LEN: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractValue {
    pub label: String,
    pub network: Network,
    pub contract: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub stage: Stage,
    pub kind: &'static str,
    pub diagnostic: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub started_at_unix_ms: u64,
    pub passed: bool,
    pub stages: Vec<StageRecord>,
    pub endpoints: Vec<EndpointCheck>,
    pub network_updates: Option<f64>,
    pub contract_values: Vec<ContractValue>,
    pub failure: Option<FailureRecord>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            started_at_unix_ms: now_ms(),
            ..Self::default()
        }
    }

    pub fn record_stage(&mut self, stage: Stage, status: StageStatus, elapsed: Duration) {
        self.stages.push(StageRecord {
            stage,
            status,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }

    pub fn record_value(
        &mut self,
        label: impl Into<String>,
        network: Network,
        contract: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.contract_values.push(ContractValue {
            label: label.into(),
            network,
            contract: contract.into(),
            value: value.into(),
        });
    }

    pub fn record_failure(&mut self, failure: &StageFailure) {
        self.passed = false;
        self.failure = Some(FailureRecord {
            stage: failure.stage,
            kind: failure.error.kind(),
            diagnostic: compact_error_message(&failure.error.to_string(), DIAGNOSTIC_MAX_LEN),
        });
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| {
            anyhow::anyhow!("failed to write run report to {}: {}", path.display(), e)
        })
    }

    /// One line per stage, logged at the end of the run.
    pub fn log_summary(&self) {
        for record in &self.stages {
            tracing::info!(
                "[VERIFY] stage={} status={:?} duration_ms={}",
                record.stage,
                record.status,
                record.duration_ms
            );
        }
        match &self.failure {
            Some(failure) => tracing::error!(
                "[VERIFY] run failed at stage={} kind={}: {}",
                failure.stage,
                failure.kind,
                failure.diagnostic
            ),
            None => tracing::info!(
                "[VERIFY] ✓ run passed ({} stages, {} contract values observed)",
                self.stages.len(),
                self.contract_values.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerifyError;
    use crate::verifier::EndpointOutcome;

    #[test]
    fn failure_is_compacted_into_the_report() {
        let mut report = RunReport::start();
        report.record_stage(Stage::Boot, StageStatus::Passed, Duration::from_millis(1_250));
        let failure = StageFailure {
            stage: Stage::Readiness,
            error: VerifyError::PortUnreachable {
                host: "127.0.0.1".to_string(),
                port: 8547,
                waited: Duration::from_secs(3),
            },
        };
        report.record_stage(failure.stage, StageStatus::Failed, Duration::from_secs(3));
        report.record_failure(&failure);

        assert!(!report.passed);
        assert_eq!(report.stages[0].duration_ms, 1_250);
        assert_eq!(report.stages[1].status, StageStatus::Failed);
        let recorded = report.failure.as_ref().expect("failure recorded");
        assert_eq!(recorded.stage, Stage::Readiness);
        assert_eq!(recorded.kind, "port_unreachable");
        assert!(recorded.diagnostic.contains("8547"), "{}", recorded.diagnostic);
    }

    #[test]
    fn report_serializes_with_snake_case_tags() {
        let mut report = RunReport::start();
        report.passed = true;
        report.endpoints.push(EndpointCheck {
            endpoint: "metrics",
            outcome: EndpointOutcome::Skipped,
        });
        report.record_value("baseline", Network::Sepolia, "0xcbd6", "100");

        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("serializable")).expect("valid json");
        assert_eq!(json["passed"], true);
        assert_eq!(json["endpoints"][0]["outcome"], "skipped");
        assert_eq!(json["contract_values"][0]["value"], "100");
        assert!(json["failure"].is_null());
    }

    #[test]
    fn report_is_written_to_disk() {
        let path = std::env::temp_dir().join(format!(
            "sequencer_verifier_report_{}_{}.json",
            std::process::id(),
            now_ms()
        ));
        let report = RunReport::start();
        report.write_to(&path).expect("write report");
        let raw = std::fs::read_to_string(&path).expect("read report");
        assert!(raw.contains("\"stages\""));
        let _ = std::fs::remove_file(&path);
    }
}
