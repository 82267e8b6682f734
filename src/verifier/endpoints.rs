use crate::error::{Result, ShapeViolation, VerifyError};
use crate::probes::http::wait_for_http_success;
use crate::utils::error::compact_error_message;
use crate::utils::retry::PollPolicy;
use reqwest::Client;
use serde::Serialize;

const BODY_EXCERPT_MAX_LEN: usize = 120;

/// Substrings a healthy `/metrics` body must contain.
pub const REQUIRED_METRICS_KEYS: [&str; 2] = ["sequencer_active_feeds", "updates_to_networks"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpectedShape {
    Json,
    ExactEmptyBody,
    MetricsText,
}

/// Which listener serves the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Surface {
    Admin,
    Metrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointSpec {
    pub path: &'static str,
    pub shape: ExpectedShape,
    pub surface: Surface,
}

const fn json(path: &'static str) -> EndpointSpec {
    EndpointSpec {
        path,
        shape: ExpectedShape::Json,
        surface: Surface::Admin,
    }
}

/// Checked in this order; the first violation stops the run.
pub const ENDPOINT_SPECS: [EndpointSpec; 7] = [
    json("get_feeds_config"),
    json("get_sequencer_config"),
    json("list_provider_status"),
    json("get_history"),
    json("get_oracle_scripts"),
    EndpointSpec {
        path: "metrics",
        shape: ExpectedShape::MetricsText,
        surface: Surface::Metrics,
    },
    EndpointSpec {
        path: "health",
        shape: ExpectedShape::ExactEmptyBody,
        surface: Surface::Admin,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointOutcome {
    Passed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointCheck {
    pub endpoint: &'static str,
    pub outcome: EndpointOutcome,
}

/// Assert `body` has the shape `shape` demands.
pub fn check_shape(endpoint: &str, shape: ExpectedShape, body: &str) -> Result<()> {
    let violation = match shape {
        ExpectedShape::Json => serde_json::from_str::<serde_json::Value>(body)
            .err()
            .map(|e| ShapeViolation::InvalidJson(e.to_string())),
        ExpectedShape::ExactEmptyBody => (!body.is_empty()).then(|| {
            ShapeViolation::UnexpectedBody(compact_error_message(body, BODY_EXCERPT_MAX_LEN))
        }),
        ExpectedShape::MetricsText => REQUIRED_METRICS_KEYS
            .iter()
            .find(|key| !body.contains(**key))
            .map(|key| ShapeViolation::MissingKey((*key).to_string())),
    };
    match violation {
        Some(violation) => Err(VerifyError::InvalidResponseShape {
            endpoint: endpoint.to_string(),
            violation,
        }),
        None => Ok(()),
    }
}

pub struct EndpointVerifier<'a> {
    pub client: &'a Client,
    pub admin_url: &'a str,
    pub metrics_url: &'a str,
    pub policy: PollPolicy,
    pub verify_metrics: bool,
}

impl EndpointVerifier<'_> {
    fn url_for(&self, spec: &EndpointSpec) -> String {
        let base = match spec.surface {
            Surface::Admin => self.admin_url,
            Surface::Metrics => self.metrics_url,
        };
        format!("{}/{}", base, spec.path)
    }

    /// Fetch one endpoint (retrying until 2xx) and assert its shape.
    pub async fn verify(&self, spec: &EndpointSpec) -> Result<()> {
        let body = wait_for_http_success(self.client, &self.url_for(spec), self.policy).await?;
        check_shape(spec.path, spec.shape, &body)?;
        match spec.shape {
            ExpectedShape::Json => {
                tracing::info!("[ENDPOINT] ✓ {} endpoint is responding with valid JSON", spec.path)
            }
            ExpectedShape::ExactEmptyBody => {
                tracing::info!("[ENDPOINT] ✓ {} endpoint is responding correctly", spec.path)
            }
            ExpectedShape::MetricsText => tracing::info!(
                "[ENDPOINT] ✓ {} endpoint is responding with valid metrics",
                spec.path
            ),
        }
        Ok(())
    }

    /// Every declared endpoint, in order, fail-fast.
    pub async fn verify_all(&self) -> Result<Vec<EndpointCheck>> {
        tracing::info!("[ENDPOINT] Checking all sequencer endpoints...");
        let mut checks = Vec::with_capacity(ENDPOINT_SPECS.len());
        for spec in &ENDPOINT_SPECS {
            if spec.shape == ExpectedShape::MetricsText && !self.verify_metrics {
                tracing::warn!(
                    "[ENDPOINT] {} check skipped (VERIFY_METRICS=false)",
                    spec.path
                );
                checks.push(EndpointCheck {
                    endpoint: spec.path,
                    outcome: EndpointOutcome::Skipped,
                });
                continue;
            }
            self.verify(spec).await?;
            checks.push(EndpointCheck {
                endpoint: spec.path,
                outcome: EndpointOutcome::Passed,
            });
        }
        tracing::info!("[ENDPOINT] ✓ All sequencer endpoints are responding correctly");
        Ok(checks)
    }
}
