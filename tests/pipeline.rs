use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use sequencer_verifier::error::{Result, VerifyError};
use sequencer_verifier::probes::{Host, UnitState};
use sequencer_verifier::runtime::{RunController, RunReport, Stage};
use sequencer_verifier::utils::config::RunConfig;
use sequencer_verifier::utils::rpc::ChainCaller;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPORTER: &str = "blocksense-reporter-a";

struct FakeHost {
    reporter_journal: String,
    started: Mutex<bool>,
}

#[async_trait]
impl Host for FakeHost {
    async fn start(&self) -> Result<()> {
        *self.started.lock().expect("started lock") = true;
        Ok(())
    }

    async fn unit_state(&self, _unit: &str) -> Result<UnitState> {
        Ok(UnitState::Active)
    }

    async fn journal(&self, unit: &str) -> Result<String> {
        if unit == REPORTER {
            Ok(self.reporter_journal.clone())
        } else {
            Ok(String::new())
        }
    }
}

struct FakeChains {
    by_url: Mutex<HashMap<String, VecDeque<String>>>,
}

impl FakeChains {
    fn new(sepolia_url: &str, sepolia: &[&str], ink_url: &str, ink: &[&str]) -> Self {
        let mut by_url = HashMap::new();
        by_url.insert(
            sepolia_url.to_string(),
            sepolia.iter().map(|v| v.to_string()).collect(),
        );
        by_url.insert(
            ink_url.to_string(),
            ink.iter().map(|v| v.to_string()).collect(),
        );
        Self {
            by_url: Mutex::new(by_url),
        }
    }
}

#[async_trait]
impl ChainCaller for FakeChains {
    async fn call(&self, rpc_url: &str, _to: Address, _input: Bytes) -> anyhow::Result<String> {
        self.by_url
            .lock()
            .expect("chains lock")
            .get_mut(rpc_url)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| anyhow::anyhow!("no node listening at {rpc_url}"))
    }
}

struct Deployment {
    server: MockServer,
    _sepolia: TcpListener,
    _ink: TcpListener,
    env: HashMap<&'static str, String>,
}

impl Deployment {
    async fn start(verify_metrics: bool) -> Self {
        let server = MockServer::start().await;
        let sepolia = TcpListener::bind("127.0.0.1:0").await.expect("bind sepolia");
        let ink = TcpListener::bind("127.0.0.1:0").await.expect("bind ink");
        let env: HashMap<&'static str, String> = [
            ("BASE_URL", "http://127.0.0.1".to_string()),
            (
                "SEPOLIA_PORT",
                sepolia.local_addr().expect("addr").port().to_string(),
            ),
            ("INK_PORT", ink.local_addr().expect("addr").port().to_string()),
            ("SEQUENCER_ADMIN_PORT", server.address().port().to_string()),
            (
                "UPGRADEABLE_PROXY_CONTRACT",
                "0xee5a4826068c5326a7f06fd6c7cbf816f096846c".to_string(),
            ),
            (
                "CHAINLINK_PROXY_CONTRACT",
                "0xcbd6fc059bebdde30f3ce3d4b3e6a8b8b8a1d8b3".to_string(),
            ),
            (
                "UPGRADEABLE_PROXY_ADFS_CONTRACT",
                "0xadf5aad6fae0d58e5c8e3e3e84d6b7d3a4e6c8f1".to_string(),
            ),
            (
                "CL_AGGREGATOR_ADAPTER_CONTRACT",
                "0xcbd6fc059bebdde30f3ce3d4b3e6a8b8b8a1d8b4".to_string(),
            ),
            ("REPORTER_SERVICE", REPORTER.to_string()),
            (
                "ANVIL_SEPOLIA_SERVICE",
                "blocksense-anvil-ethereum-sepolia".to_string(),
            ),
            ("ANVIL_INK_SERVICE", "blocksense-anvil-ink-sepolia".to_string()),
            ("SEQUENCER_SERVICE", "blocksense-sequencer".to_string()),
            ("ENDPOINT_EXISTENCE_TIMEOUT", "2".to_string()),
            ("HISTORY_POPULATION_TIMEOUT", "2".to_string()),
            ("NETWORK_UPDATE_TIMEOUT", "2".to_string()),
            ("VALUE_CHANGE_TIMEOUT", "3".to_string()),
            ("VALUE_CHANGE_POLL_INTERVAL", "1".to_string()),
            ("PROBE_POLL_INTERVAL_MS", "25".to_string()),
            ("BOOT_TIMEOUT", "2".to_string()),
            ("SERVICE_READY_TIMEOUT", "2".to_string()),
            ("PORT_OPEN_TIMEOUT", "2".to_string()),
            ("VERIFY_METRICS", verify_metrics.to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            server,
            _sepolia: sepolia,
            _ink: ink,
            env,
        }
    }

    fn config(&self) -> RunConfig {
        RunConfig::from_lookup(|key| self.env.get(key).cloned()).expect("config loads")
    }

    async fn mount(&self, endpoint: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/{endpoint}")))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    async fn mount_admin_surface(&self) {
        for endpoint in [
            "get_feeds_config",
            "get_sequencer_config",
            "list_provider_status",
            "get_oracle_scripts",
        ] {
            self.mount(endpoint, ResponseTemplate::new(200).set_body_string("{\"feeds\":[]}"))
                .await;
        }
        self.mount(
            "get_history",
            ResponseTemplate::new(200)
                .set_body_string(r#"{"aggregate_history":[[{"value":"100"}],[{"value":"7"}]]}"#),
        )
        .await;
        self.mount("health", ResponseTemplate::new(200)).await;
    }
}

#[tokio::test]
async fn report_records_skipped_metrics_and_every_contract() {
    let deployment = Deployment::start(false).await;
    deployment.mount_admin_surface().await;
    Mock::given(path("/metrics"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&deployment.server)
        .await;

    let config = deployment.config();
    let chains = Arc::new(FakeChains::new(
        &config.sepolia.rpc_url,
        &["0x64", "0x64", "0x64", "0x96", "0x2a", "0x96"],
        &config.ink.rpc_url,
        &["0x3e8", "0x96"],
    ));
    let host = Arc::new(FakeHost {
        reporter_journal: "Sequencer responded with status=200\nbatch accepted\n".to_string(),
        started: Mutex::new(false),
    });
    let controller = RunController::new(config, host.clone(), chains);

    let mut report = RunReport::start();
    controller.run(&mut report).await.expect("run passes");

    assert!(*host.started.lock().expect("started lock"));
    let json: serde_json::Value =
        serde_json::from_str(&report.to_json().expect("serializable")).expect("valid json");
    assert_eq!(json["passed"], true);
    assert_eq!(json["stages"].as_array().map(Vec::len), Some(5));
    assert_eq!(json["endpoints"][5]["endpoint"], "metrics");
    assert_eq!(json["endpoints"][5]["outcome"], "skipped");
    assert!(json["network_updates"].is_null());

    let values: Vec<_> = report
        .contract_values
        .iter()
        .map(|v| (v.label.as_str(), v.value.as_str()))
        .collect();
    assert_eq!(
        values,
        vec![
            ("baseline", "100"),
            ("changed", "150"),
            ("upgradeable_proxy", "42"),
            ("chainlink_proxy", "150"),
            ("upgradeable_proxy_adfs", "1000"),
            ("cl_aggregator_adapter", "150"),
        ]
    );
}

#[tokio::test]
async fn non_200_sequencer_status_in_reporter_logs_fails_the_run() {
    let deployment = Deployment::start(true).await;
    deployment.mount_admin_surface().await;
    deployment
        .mount(
            "metrics",
            ResponseTemplate::new(200).set_body_string(
                "sequencer_active_feeds 2\nupdates_to_networks{network=\"ink_sepolia\"} 3\n",
            ),
        )
        .await;

    let config = deployment.config();
    let chains = Arc::new(FakeChains::new(
        &config.sepolia.rpc_url,
        &["0x64"],
        &config.ink.rpc_url,
        &[],
    ));
    let host = Arc::new(FakeHost {
        reporter_journal: "Sequencer responded with status=200\n\
                           Sequencer responded with status=200\n\
                           Sequencer responded with status=503\n"
            .to_string(),
        started: Mutex::new(false),
    });
    let controller = RunController::new(config, host, chains);

    let mut report = RunReport::start();
    let failure = controller.run(&mut report).await.expect_err("503 in logs");

    assert_eq!(failure.stage, Stage::PipelineConvergence);
    match &failure.error {
        VerifyError::UnwantedLogPattern {
            service,
            matched_text,
            line_number,
            ..
        } => {
            assert_eq!(service, REPORTER);
            assert_eq!(matched_text, "Sequencer responded with status=503");
            assert_eq!(*line_number, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(report.network_updates, Some(3.0));
    assert_eq!(
        report.failure.as_ref().map(|f| f.kind),
        Some("unwanted_log_pattern")
    );
}

#[tokio::test]
async fn stale_feed_value_fails_with_value_did_not_change() {
    let deployment = Deployment::start(false).await;
    deployment.mount_admin_surface().await;

    let config = deployment.config();
    let chains = Arc::new(FakeChains::new(
        &config.sepolia.rpc_url,
        &["0x64", "0x64", "0x64", "0x64"],
        &config.ink.rpc_url,
        &[],
    ));
    let host = Arc::new(FakeHost {
        reporter_journal: String::new(),
        started: Mutex::new(false),
    });
    let controller = RunController::new(config, host, chains);

    let mut report = RunReport::start();
    let failure = controller.run(&mut report).await.expect_err("value never moves");

    assert_eq!(failure.stage, Stage::PipelineConvergence);
    assert!(
        matches!(
            &failure.error,
            VerifyError::ValueDidNotChange { initial, timeout_secs: 3 } if initial == "100"
        ),
        "{}",
        failure.error
    );
}
